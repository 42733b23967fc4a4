//! Calendar Module
//! Mission: Villas and conflict-checked booking ranges

pub mod api;
pub mod models;
pub mod store;

pub use store::CalendarStore;
