//! Authentication API Endpoints
//! Mission: Provide login, logout, and code rotation endpoints

use crate::auth::models::{
    Claims, LoginRequest, LoginResponse, OwnerResponse, RotateCodeRequest,
};
use crate::error::CoreResult;
use crate::service::AdminService;
use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    Extension, Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Login endpoint - POST /api/auth/login
///
/// Rate limiting keys on client address plus owner name, so one noisy
/// client cannot lock an owner out from everywhere.
pub async fn login(
    State(service): State<Arc<AdminService>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> CoreResult<Json<LoginResponse>> {
    info!("🔐 Login attempt: {}", payload.owner);

    let client_id = addr.ip().to_string();
    let outcome = service
        .login(&payload.owner, &payload.code, &client_id)
        .await?;

    Ok(Json(LoginResponse {
        token: outcome.token,
        expires_in: outcome.expires_in,
        owner: OwnerResponse::from_owner(&outcome.owner),
    }))
}

/// Logout endpoint - POST /api/auth/logout
pub async fn logout(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
) -> StatusCode {
    service.logout(&claims);
    StatusCode::NO_CONTENT
}

/// Current session info - GET /api/auth/me
/// Built entirely from the validated claims, no store lookup.
pub async fn get_current_owner(
    Extension(claims): Extension<Claims>,
) -> Json<OwnerResponse> {
    Json(OwnerResponse {
        id: claims.sub,
        name: claims.name,
        created_at: String::new(),
    })
}

/// Rotate access code - POST /api/auth/rotate
/// Every outstanding session for the owner is revoked, including the
/// one making this request.
pub async fn rotate_code(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RotateCodeRequest>,
) -> CoreResult<StatusCode> {
    service.rotate_code(claims.sub, &payload.new_code).await?;

    info!("🔑 Access code rotated for owner {}", claims.name);
    Ok(StatusCode::NO_CONTENT)
}
