//! Core Error Types
//! Mission: One terminal result kind per failure, mapped to HTTP at the edge

use crate::calendar::models::BookingRange;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use tracing::error;

/// Result alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;

/// Every failure the core can produce. These are values, never control flow:
/// a single call produces at most one of them and the caller decides what to
/// do with it.
///
/// `OwnerNotFound` and `InvalidCode` stay distinct for logging, but both map
/// to the same generic 401 so an unauthenticated caller cannot tell them
/// apart (the verifier also equalizes their latency).
#[derive(Debug)]
pub enum CoreError {
    OwnerNotFound,
    InvalidCode,
    /// Access code rejected by validation before it ever reached the verifier.
    WeakCode,
    RateLimited { retry_after: Duration },
    SessionExpired,
    SessionRevoked,
    SessionInvalid,
    /// Valid session, but the villa belongs to a different owner.
    Forbidden,
    RangeConflict { existing: BookingRange },
    InvalidRange,
    BookingNotFound,
    VillaNotFound,
    /// The operation exceeded its configured deadline.
    Timeout,
    /// Persistence failure. Never retried by the core itself.
    StoreUnavailable(anyhow::Error),
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::OwnerNotFound => write!(f, "owner not found"),
            CoreError::InvalidCode => write!(f, "invalid access code"),
            CoreError::WeakCode => write!(f, "access code too weak"),
            CoreError::RateLimited { retry_after } => {
                write!(f, "rate limited, retry after {}s", retry_after.as_secs())
            }
            CoreError::SessionExpired => write!(f, "session expired"),
            CoreError::SessionRevoked => write!(f, "session revoked"),
            CoreError::SessionInvalid => write!(f, "session invalid"),
            CoreError::Forbidden => write!(f, "forbidden"),
            CoreError::RangeConflict { existing } => write!(
                f,
                "range conflicts with booking {} [{}, {})",
                existing.id, existing.start, existing.end
            ),
            CoreError::InvalidRange => write!(f, "invalid date range"),
            CoreError::BookingNotFound => write!(f, "booking not found"),
            CoreError::VillaNotFound => write!(f, "villa not found"),
            CoreError::Timeout => write!(f, "operation timed out"),
            CoreError::StoreUnavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::StoreUnavailable(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(e: anyhow::Error) -> Self {
        CoreError::StoreUnavailable(e)
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::StoreUnavailable(anyhow::Error::new(e))
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        match self {
            // Same body for both so owner existence cannot be inferred.
            CoreError::OwnerNotFound | CoreError::InvalidCode => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid owner or access code" })),
            )
                .into_response(),
            CoreError::WeakCode => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Access code must be at least 4 characters" })),
            )
                .into_response(),
            CoreError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after.as_secs().max(1).to_string())],
                Json(json!({
                    "error": "too_many_attempts",
                    "message": "Too many login attempts. Please wait.",
                    "retry_after_seconds": retry_after.as_secs().max(1),
                })),
            )
                .into_response(),
            CoreError::SessionExpired | CoreError::SessionRevoked | CoreError::SessionInvalid => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid or expired token" })),
            )
                .into_response(),
            CoreError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "You do not own this villa" })),
            )
                .into_response(),
            CoreError::RangeConflict { existing } => (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "booking_conflict",
                    "message": "Requested dates overlap an existing booking",
                    "conflict": existing,
                })),
            )
                .into_response(),
            CoreError::InvalidRange => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Start date must be before end date" })),
            )
                .into_response(),
            CoreError::BookingNotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Booking not found" })),
            )
                .into_response(),
            CoreError::VillaNotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Villa not found" })),
            )
                .into_response(),
            CoreError::Timeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Operation timed out" })),
            )
                .into_response(),
            CoreError::StoreUnavailable(e) => {
                // Log the cause, never leak it to the caller.
                error!("💥 Store failure: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn sample_booking() -> BookingRange {
        BookingRange {
            id: Uuid::new_v4(),
            villa_id: Uuid::new_v4(),
            start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
            reference: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            CoreError::OwnerNotFound.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CoreError::InvalidCode.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CoreError::RateLimited {
                retry_after: Duration::from_secs(30)
            }
            .into_response()
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            CoreError::SessionExpired.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CoreError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            CoreError::RangeConflict {
                existing: sample_booking()
            }
            .into_response()
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CoreError::InvalidRange.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CoreError::BookingNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CoreError::Timeout.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_rate_limited_includes_retry_after_header() {
        let resp = CoreError::RateLimited {
            retry_after: Duration::from_secs(42),
        }
        .into_response();
        assert_eq!(resp.headers().get("Retry-After").unwrap(), "42");
    }

    #[test]
    fn test_credential_failures_share_one_message() {
        // Body must not let a caller distinguish unknown owner from bad code.
        let not_found = format!("{:?}", CoreError::OwnerNotFound.into_response().status());
        let bad_code = format!("{:?}", CoreError::InvalidCode.into_response().status());
        assert_eq!(not_found, bad_code);
    }
}
