//! Calendar API Endpoints
//! Mission: Villa and booking management for authenticated owners

use crate::auth::models::Claims;
use crate::calendar::models::{
    BookingRange, CreateVillaRequest, ModifyBookingRequest, ReserveRequest, Villa,
};
use crate::error::CoreResult;
use crate::service::AdminService;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Create villa - POST /api/villas
pub async fn create_villa(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateVillaRequest>,
) -> CoreResult<(StatusCode, Json<Villa>)> {
    let villa = service
        .create_villa(&claims, payload.name, payload.address, payload.capacity)
        .await?;

    info!("🏠 Villa created: {} ({})", villa.name, villa.id);
    Ok((StatusCode::CREATED, Json(villa)))
}

/// List own villas - GET /api/villas
pub async fn list_villas(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
) -> CoreResult<Json<Vec<Villa>>> {
    let villas = service.list_villas(&claims).await?;
    Ok(Json(villas))
}

/// Delete villa and its bookings - DELETE /api/villas/:id
pub async fn delete_villa(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
    Path(villa_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    service.delete_villa(&claims, villa_id).await?;

    info!("🗑️  Villa deleted: {}", villa_id);
    Ok(StatusCode::NO_CONTENT)
}

/// List bookings for a villa - GET /api/villas/:id/bookings
/// Returned in ascending start-date order.
pub async fn list_bookings(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
    Path(villa_id): Path<Uuid>,
) -> CoreResult<Json<Vec<BookingRange>>> {
    let ranges = service.list_ranges(&claims, villa_id).await?;
    Ok(Json(ranges))
}

/// Reserve a date range - POST /api/villas/:id/bookings
///
/// Half-open range: check-out day is free for the next arrival. A
/// conflicting range is a 409 naming the booking already in the way.
pub async fn reserve(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
    Path(villa_id): Path<Uuid>,
    Json(payload): Json<ReserveRequest>,
) -> CoreResult<(StatusCode, Json<BookingRange>)> {
    let booking = service
        .reserve(&claims, villa_id, payload.start, payload.end, payload.reference)
        .await?;

    info!(
        "📅 Booking created: {} [{}, {})",
        booking.id, booking.start, booking.end
    );
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Move a booking to new dates - PUT /api/villas/:id/bookings/:booking_id
pub async fn modify_booking(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
    Path((villa_id, booking_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ModifyBookingRequest>,
) -> CoreResult<Json<BookingRange>> {
    let booking = service
        .modify(&claims, villa_id, booking_id, payload.start, payload.end)
        .await?;

    info!(
        "📅 Booking moved: {} [{}, {})",
        booking.id, booking.start, booking.end
    );
    Ok(Json(booking))
}

/// Cancel a booking - DELETE /api/villas/:id/bookings/:booking_id
pub async fn cancel_booking(
    State(service): State<Arc<AdminService>>,
    Extension(claims): Extension<Claims>,
    Path((villa_id, booking_id)): Path<(Uuid, Uuid)>,
) -> CoreResult<StatusCode> {
    service.cancel(&claims, villa_id, booking_id).await?;

    info!("🗑️  Booking cancelled: {}", booking_id);
    Ok(StatusCode::NO_CONTENT)
}
