//! Session Middleware
//! Mission: Protect owner endpoints with session validation

use crate::auth::models::Claims;
use crate::error::CoreError;
use crate::service::AdminService;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that validates the bearer token and stashes the claims
/// in request extensions for handlers to pick up.
pub async fn auth_middleware(
    State(service): State<Arc<AdminService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, CoreError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(CoreError::SessionInvalid)?;

    // Signature, expiry, and revocation checks all happen here.
    let claims = service.authorize(token)?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extract claims from a request (use after auth middleware)
pub fn extract_claims(req: &Request) -> Option<&Claims> {
    req.extensions().get::<Claims>()
}
