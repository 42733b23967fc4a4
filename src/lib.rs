//! Villahost Backend Library
//! Mission: Owner-facing villa administration with authenticated booking management

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod middleware;
pub mod service;
