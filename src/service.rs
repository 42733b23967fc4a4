//! Auth-and-Booking Service
//! Mission: Orchestrate limiter, verifier, sessions, and calendar
//!
//! The only entry point the HTTP layer talks to. Login runs the gate
//! before any hashing; calendar mutations require a valid session whose
//! owner matches the villa's owner. Store work runs on the blocking pool
//! under a deadline; a timed-out operation is reported failed and, because
//! every mutation is transactional, leaves no partial state behind.

use crate::auth::{
    models::{Claims, Owner},
    owner_store::OwnerStore,
    rate_limiter::{InMemoryAttemptStore, RateDecision, RateLimiter, RateLimiterConfig},
    sessions::{InMemoryRevocationStore, SessionHandler},
    verifier::CodeVerifier,
};
use crate::calendar::{
    models::{BookingRange, Villa},
    store::CalendarStore,
};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of a successful login
pub struct LoginOutcome {
    pub token: String,
    pub expires_in: usize,
    pub owner: Owner,
}

/// Orchestration layer over the auth and calendar components
pub struct AdminService {
    config: Config,
    owners: Arc<OwnerStore>,
    verifier: Arc<CodeVerifier>,
    limiter: RateLimiter,
    sessions: Arc<SessionHandler>,
    calendar: Arc<CalendarStore>,
}

impl AdminService {
    pub fn new(
        config: Config,
        owners: Arc<OwnerStore>,
        verifier: Arc<CodeVerifier>,
        limiter: RateLimiter,
        sessions: Arc<SessionHandler>,
        calendar: Arc<CalendarStore>,
    ) -> Self {
        Self {
            config,
            owners,
            verifier,
            limiter,
            sessions,
            calendar,
        }
    }

    /// Build the whole stack from configuration with in-process counter
    /// and revocation stores.
    pub fn from_config(config: Config) -> Result<Self> {
        let owners = Arc::new(OwnerStore::new(&config.database_path, config.bcrypt_cost)?);
        let verifier = Arc::new(CodeVerifier::new(owners.clone(), config.bcrypt_cost)?);
        let limiter = RateLimiter::new(
            RateLimiterConfig {
                max_attempts: config.max_attempts,
                window: config.attempt_window,
            },
            Arc::new(InMemoryAttemptStore::default()),
        );
        let sessions = Arc::new(SessionHandler::new(
            config.jwt_secret.clone(),
            config.session_ttl_hours,
            Arc::new(InMemoryRevocationStore::default()),
        ));
        let calendar = Arc::new(CalendarStore::new(&config.database_path)?);

        Ok(Self::new(config, owners, verifier, limiter, sessions, calendar))
    }

    pub fn owners(&self) -> &Arc<OwnerStore> {
        &self.owners
    }

    pub fn sessions(&self) -> &Arc<SessionHandler> {
        &self.sessions
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    // ---- auth ----

    /// Authenticate an owner and mint a session.
    ///
    /// The limiter is consulted first: a blocked key is rejected without
    /// touching the verifier, so no expensive hashing happens and the
    /// verifier's timing guarantees stay intact.
    pub async fn login(
        &self,
        owner_name: &str,
        code: &str,
        client_id: &str,
    ) -> CoreResult<LoginOutcome> {
        let key = format!("{client_id}:{owner_name}");

        if let RateDecision::Blocked { retry_after } = self.limiter.check_and_record(&key) {
            return Err(CoreError::RateLimited { retry_after });
        }

        let verifier = self.verifier.clone();
        let name = owner_name.to_string();
        let presented = code.to_string();
        let verified = self
            .run_store(move || verifier.verify(&name, &presented))
            .await;

        match verified {
            Ok(owner) => {
                self.limiter.record_success(&key);
                let (token, expires_in) = self.sessions.issue(&owner)?;
                info!("✅ Login successful: {}", owner.name);
                Ok(LoginOutcome {
                    token,
                    expires_in,
                    owner,
                })
            }
            Err(err) => {
                // Kind is for the log only; both credential failures reach
                // the caller as the same generic rejection. The code itself
                // is never logged.
                warn!(owner = %owner_name, kind = %err, "❌ Login rejected");
                Err(err)
            }
        }
    }

    /// Validate a session token and return its claims.
    pub fn authorize(&self, token: &str) -> CoreResult<Claims> {
        self.sessions.validate(token)
    }

    /// Revoke the presented session.
    pub fn logout(&self, claims: &Claims) {
        self.sessions.revoke(claims);
        info!("👋 Session revoked for owner {}", claims.name);
    }

    /// Replace the owner's access code and invalidate every outstanding
    /// session for that owner.
    pub async fn rotate_code(&self, owner_id: Uuid, new_code: &str) -> CoreResult<()> {
        if new_code.len() < 4 {
            return Err(CoreError::WeakCode);
        }

        let owners = self.owners.clone();
        let code = new_code.to_string();
        self.run_store(move || {
            owners
                .rotate_code(&owner_id, &code)
                .map_err(CoreError::from)
        })
        .await?;

        self.sessions.revoke_all(owner_id);
        Ok(())
    }

    // ---- villas ----

    pub async fn create_villa(
        &self,
        claims: &Claims,
        name: String,
        address: String,
        capacity: u32,
    ) -> CoreResult<Villa> {
        let calendar = self.calendar.clone();
        let owner_id = claims.sub;
        self.run_store(move || calendar.create_villa(&owner_id, &name, &address, capacity))
            .await
    }

    pub async fn list_villas(&self, claims: &Claims) -> CoreResult<Vec<Villa>> {
        let calendar = self.calendar.clone();
        let owner_id = claims.sub;
        self.run_store(move || calendar.list_villas(&owner_id)).await
    }

    pub async fn delete_villa(&self, claims: &Claims, villa_id: Uuid) -> CoreResult<()> {
        let calendar = self.calendar.clone();
        let owner_id = claims.sub;
        self.run_store(move || {
            guard_ownership(&calendar, &villa_id, &owner_id)?;
            calendar.delete_villa(&villa_id)
        })
        .await
    }

    // ---- bookings ----

    pub async fn list_ranges(
        &self,
        claims: &Claims,
        villa_id: Uuid,
    ) -> CoreResult<Vec<BookingRange>> {
        let calendar = self.calendar.clone();
        let owner_id = claims.sub;
        self.run_store(move || {
            guard_ownership(&calendar, &villa_id, &owner_id)?;
            calendar.list_ranges(&villa_id)
        })
        .await
    }

    pub async fn reserve(
        &self,
        claims: &Claims,
        villa_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        reference: Option<String>,
    ) -> CoreResult<BookingRange> {
        let calendar = self.calendar.clone();
        let owner_id = claims.sub;
        self.run_store(move || {
            guard_ownership(&calendar, &villa_id, &owner_id)?;
            calendar.reserve(&villa_id, start, end, reference)
        })
        .await
    }

    pub async fn modify(
        &self,
        claims: &Claims,
        villa_id: Uuid,
        booking_id: Uuid,
        new_start: NaiveDate,
        new_end: NaiveDate,
    ) -> CoreResult<BookingRange> {
        let calendar = self.calendar.clone();
        let owner_id = claims.sub;
        self.run_store(move || {
            guard_ownership(&calendar, &villa_id, &owner_id)?;
            calendar.modify(&villa_id, &booking_id, new_start, new_end)
        })
        .await
    }

    pub async fn cancel(
        &self,
        claims: &Claims,
        villa_id: Uuid,
        booking_id: Uuid,
    ) -> CoreResult<()> {
        let calendar = self.calendar.clone();
        let owner_id = claims.sub;
        self.run_store(move || {
            guard_ownership(&calendar, &villa_id, &owner_id)?;
            calendar.cancel(&villa_id, &booking_id)
        })
        .await
    }

    /// Run store work on the blocking pool under the configured deadline.
    async fn run_store<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce() -> CoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.config.op_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(CoreError::StoreUnavailable(anyhow::anyhow!(
                "store task failed: {join_err}"
            ))),
            Err(_) => Err(CoreError::Timeout),
        }
    }
}

/// Cross-owner mutation attempts are `Forbidden`, distinct from the
/// `Unauthorized` produced by a bad session.
fn guard_ownership(
    calendar: &CalendarStore,
    villa_id: &Uuid,
    owner_id: &Uuid,
) -> CoreResult<()> {
    let villa = calendar.get_villa(villa_id)?;
    if villa.owner_id != *owner_id {
        return Err(CoreError::Forbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn test_config(db_path: &str) -> Config {
        Config {
            database_path: db_path.to_string(),
            port: 0,
            jwt_secret: "service-test-secret".to_string(),
            session_ttl_hours: 1,
            bcrypt_cost: 4,
            max_attempts: 4,
            attempt_window: Duration::from_secs(300),
            op_timeout: Duration::from_secs(5),
        }
    }

    fn create_test_service() -> (AdminService, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let service = AdminService::from_config(test_config(db_path)).unwrap();
        (service, temp_file)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_login_and_authorize() {
        let (service, _temp) = create_test_service();
        let owner = service.owners().create_owner("o1", "7734").unwrap();

        let outcome = service.login("o1", "7734", "client-a").await.unwrap();
        assert!(outcome.expires_in > 0);

        let claims = service.authorize(&outcome.token).unwrap();
        assert_eq!(claims.sub, owner.id);
        assert_eq!(claims.name, "o1");
    }

    #[tokio::test]
    async fn test_bad_code_and_unknown_owner_both_rejected() {
        let (service, _temp) = create_test_service();
        service.owners().create_owner("o1", "7734").unwrap();

        assert!(matches!(
            service.login("o1", "0000", "client-a").await,
            Err(CoreError::InvalidCode)
        ));
        assert!(matches!(
            service.login("ghost", "7734", "client-a").await,
            Err(CoreError::OwnerNotFound)
        ));
    }

    #[tokio::test]
    async fn test_limiter_blocks_before_verifier() {
        let (service, _temp) = create_test_service();
        service.owners().create_owner("o1", "7734").unwrap();

        for _ in 0..4 {
            let result = service.login("o1", "0000", "client-a").await;
            assert!(matches!(result, Err(CoreError::InvalidCode)));
        }

        // Fifth attempt in the window is blocked before any hashing,
        // even with the correct code.
        match service.login("o1", "7734", "client-a").await {
            Err(CoreError::RateLimited { retry_after }) => {
                assert!(retry_after > Duration::ZERO)
            }
            other => panic!("expected rate limit, got {:?}", other.is_ok()),
        }

        // A different client is unaffected.
        assert!(service.login("o1", "7734", "client-b").await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let (service, _temp) = create_test_service();
        service.owners().create_owner("o1", "7734").unwrap();

        let outcome = service.login("o1", "7734", "client-a").await.unwrap();
        let claims = service.authorize(&outcome.token).unwrap();

        service.logout(&claims);

        assert!(matches!(
            service.authorize(&outcome.token),
            Err(CoreError::SessionRevoked)
        ));
    }

    #[tokio::test]
    async fn test_rotation_invalidates_sessions_and_old_code() {
        let (service, _temp) = create_test_service();
        let owner = service.owners().create_owner("o1", "7734").unwrap();

        let outcome = service.login("o1", "7734", "client-a").await.unwrap();
        service.rotate_code(owner.id, "9999").await.unwrap();

        assert!(matches!(
            service.authorize(&outcome.token),
            Err(CoreError::SessionRevoked)
        ));
        assert!(matches!(
            service.login("o1", "7734", "client-b").await,
            Err(CoreError::InvalidCode)
        ));
        assert!(service.login("o1", "9999", "client-c").await.is_ok());
    }

    #[tokio::test]
    async fn test_weak_rotation_code_rejected() {
        let (service, _temp) = create_test_service();
        let owner = service.owners().create_owner("o1", "7734").unwrap();

        assert!(matches!(
            service.rotate_code(owner.id, "12").await,
            Err(CoreError::WeakCode)
        ));
    }

    #[tokio::test]
    async fn test_cross_owner_mutation_forbidden() {
        let (service, _temp) = create_test_service();
        service.owners().create_owner("o1", "7734").unwrap();
        service.owners().create_owner("o2", "4242").unwrap();

        let a = service.login("o1", "7734", "client-a").await.unwrap();
        let b = service.login("o2", "4242", "client-b").await.unwrap();
        let claims_a = service.authorize(&a.token).unwrap();
        let claims_b = service.authorize(&b.token).unwrap();

        let villa = service
            .create_villa(&claims_a, "Villa Azul".into(), "1 Beach Rd".into(), 6)
            .await
            .unwrap();

        assert!(matches!(
            service
                .reserve(&claims_b, villa.id, day(1), day(5), None)
                .await,
            Err(CoreError::Forbidden)
        ));
        assert!(matches!(
            service.delete_villa(&claims_b, villa.id).await,
            Err(CoreError::Forbidden)
        ));

        // The rightful owner proceeds.
        assert!(service
            .reserve(&claims_a, villa.id, day(1), day(5), None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_booking_round_trip_through_service() {
        let (service, _temp) = create_test_service();
        service.owners().create_owner("o1", "7734").unwrap();
        let outcome = service.login("o1", "7734", "client-a").await.unwrap();
        let claims = service.authorize(&outcome.token).unwrap();

        let villa = service
            .create_villa(&claims, "V".into(), "addr".into(), 4)
            .await
            .unwrap();

        let booking = service
            .reserve(&claims, villa.id, day(1), day(5), None)
            .await
            .unwrap();

        let moved = service
            .modify(&claims, villa.id, booking.id, day(2), day(6))
            .await
            .unwrap();
        assert_eq!(moved.start, day(2));

        service.cancel(&claims, villa.id, booking.id).await.unwrap();
        assert!(service.list_ranges(&claims, villa.id).await.unwrap().is_empty());
    }
}
