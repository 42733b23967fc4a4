//! Calendar Models
//! Mission: Villas and their booked date ranges

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A villa listing. Descriptive fields are opaque to the booking core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Villa {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: String,
    pub capacity: u32,
    pub created_at: String,
}

/// A committed booking, half-open: `start` is booked, `end` is not.
/// Adjacent ranges (one ending where the next starts) never conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRange {
    pub id: Uuid,
    pub villa_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Optional external reference (channel booking id, guest name, ...).
    pub reference: Option<String>,
    pub created_at: String,
}

impl BookingRange {
    /// Half-open overlap test against another span.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start < self.end && self.start < end
    }
}

/// Villa creation request body
#[derive(Debug, Deserialize)]
pub struct CreateVillaRequest {
    pub name: String,
    pub address: String,
    pub capacity: u32,
}

/// Reservation request body
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reference: Option<String>,
}

/// Booking modification request body
#[derive(Debug, Deserialize)]
pub struct ModifyBookingRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
}
