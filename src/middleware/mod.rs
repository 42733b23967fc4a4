//! HTTP Middleware Module

pub mod logging;

pub use logging::request_logging;
