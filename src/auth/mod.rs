//! Authentication Module
//! Mission: Access-code login, rate limiting, and revocable sessions

pub mod api;
pub mod middleware;
pub mod models;
pub mod owner_store;
pub mod rate_limiter;
pub mod sessions;
pub mod verifier;

pub use middleware::auth_middleware;
pub use owner_store::OwnerStore;
pub use rate_limiter::RateLimiter;
pub use sessions::SessionHandler;
pub use verifier::CodeVerifier;
