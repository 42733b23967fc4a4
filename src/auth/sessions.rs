//! Session Token Handler
//! Mission: Issue and validate signed, revocable session tokens

use crate::auth::models::{Claims, Owner};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Storage port for revocation state.
///
/// Two mechanisms back the two revocation flavors:
/// - single-token revocation (logout) records the token id until the token
///   would have expired anyway;
/// - revoke-all (code rotation) bumps the owner's session epoch, so every
///   token minted under an older epoch fails validation, with no clock
///   comparison and therefore no same-second edge.
///
/// The in-memory implementation loses both on restart; deployments running
/// several processes must back this port with a centralized store.
pub trait RevocationStore: Send + Sync {
    fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>);
    fn is_token_revoked(&self, jti: &Uuid) -> bool;
    /// Bump and return the owner's session epoch.
    fn bump_epoch(&self, owner_id: Uuid) -> u64;
    /// Current epoch for the owner, 0 if never bumped.
    fn current_epoch(&self, owner_id: &Uuid) -> u64;
    /// Drop token entries that have outlived their own expiry.
    fn prune(&self, now: DateTime<Utc>);
}

/// In-process revocation table.
#[derive(Default)]
pub struct InMemoryRevocationStore {
    tokens: RwLock<HashMap<Uuid, DateTime<Utc>>>,
    epochs: RwLock<HashMap<Uuid, u64>>,
}

impl RevocationStore for InMemoryRevocationStore {
    fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) {
        self.tokens.write().insert(jti, expires_at);
    }

    fn is_token_revoked(&self, jti: &Uuid) -> bool {
        self.tokens.read().contains_key(jti)
    }

    fn bump_epoch(&self, owner_id: Uuid) -> u64 {
        let mut epochs = self.epochs.write();
        let epoch = epochs.entry(owner_id).or_insert(0);
        *epoch += 1;
        *epoch
    }

    fn current_epoch(&self, owner_id: &Uuid) -> u64 {
        self.epochs.read().get(owner_id).copied().unwrap_or(0)
    }

    fn prune(&self, now: DateTime<Utc>) {
        self.tokens.write().retain(|_, expires_at| *expires_at > now);
    }
}

/// Handler for session token operations
pub struct SessionHandler {
    secret: String,
    ttl_hours: i64,
    revoked: Arc<dyn RevocationStore>,
}

impl SessionHandler {
    pub fn new(secret: String, ttl_hours: i64, revoked: Arc<dyn RevocationStore>) -> Self {
        Self {
            secret,
            ttl_hours,
            revoked,
        }
    }

    /// Issue a signed token for an owner
    pub fn issue(&self, owner: &Owner) -> CoreResult<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(self.ttl_hours))
            .ok_or(CoreError::StoreUnavailable(anyhow::anyhow!(
                "Invalid session expiry timestamp"
            )))?;

        let claims = Claims {
            sub: owner.id,
            name: owner.name.clone(),
            jti: Uuid::new_v4(),
            sv: self.revoked.current_epoch(&owner.id),
            iat: now.timestamp().max(0) as usize,
            exp: expiration.timestamp().max(0) as usize,
        };

        debug!(
            "Issuing session for owner {} ({}), expires in {}h",
            owner.name, owner.id, self.ttl_hours
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| CoreError::StoreUnavailable(anyhow::Error::new(e)))?;

        let expires_in = (self.ttl_hours * 3600).max(0) as usize;
        Ok((token, expires_in))
    }

    /// Validate a token: signature, expiry against the current clock, and
    /// both revocation mechanisms.
    pub fn validate(&self, token: &str) -> CoreResult<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => CoreError::SessionExpired,
            _ => CoreError::SessionInvalid,
        })?;

        let claims = decoded.claims;

        if self.revoked.is_token_revoked(&claims.jti) {
            return Err(CoreError::SessionRevoked);
        }
        if claims.sv < self.revoked.current_epoch(&claims.sub) {
            return Err(CoreError::SessionRevoked);
        }

        Ok(claims)
    }

    /// Revoke a single token until its natural expiry
    pub fn revoke(&self, claims: &Claims) {
        let expires_at = DateTime::from_timestamp(claims.exp as i64, 0).unwrap_or_else(Utc::now);
        self.revoked.revoke_token(claims.jti, expires_at);
    }

    /// Invalidate every outstanding session for an owner
    pub fn revoke_all(&self, owner_id: Uuid) {
        let epoch = self.revoked.bump_epoch(owner_id);
        debug!("Revoked all sessions for owner {owner_id} (epoch {epoch})");
    }

    /// Drop revocation entries that no live token can reference anymore
    /// (call from a background task).
    pub fn prune(&self) {
        self.revoked.prune(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_owner() -> Owner {
        Owner {
            id: Uuid::new_v4(),
            name: "o1".to_string(),
            code_hash: "hash".to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    fn handler(ttl_hours: i64) -> SessionHandler {
        SessionHandler::new(
            "test-secret-key-12345".to_string(),
            ttl_hours,
            Arc::new(InMemoryRevocationStore::default()),
        )
    }

    #[test]
    fn test_issue_then_validate_round_trip() {
        let handler = handler(12);
        let owner = test_owner();

        let (token, expires_in) = handler.issue(&owner).unwrap();
        assert!(!token.is_empty());
        assert_eq!(expires_in, 12 * 3600);

        let claims = handler.validate(&token).unwrap();
        assert_eq!(claims.sub, owner.id);
        assert_eq!(claims.name, "o1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let handler = handler(12);
        assert!(matches!(
            handler.validate("not.a.token"),
            Err(CoreError::SessionInvalid)
        ));
    }

    #[test]
    fn test_tampering_invalidates() {
        let handler = handler(12);
        let owner = test_owner();
        let (token, _) = handler.issue(&owner).unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });

        assert!(matches!(
            handler.validate(&tampered),
            Err(CoreError::SessionInvalid)
        ));
    }

    #[test]
    fn test_different_secrets_reject() {
        let issuer = handler(12);
        let other = SessionHandler::new(
            "a-different-secret".to_string(),
            12,
            Arc::new(InMemoryRevocationStore::default()),
        );
        let owner = test_owner();

        let (token, _) = issuer.issue(&owner).unwrap();
        assert!(matches!(
            other.validate(&token),
            Err(CoreError::SessionInvalid)
        ));
    }

    #[test]
    fn test_expired_token_distinct_kind() {
        // Negative TTL backdates the expiry past now.
        let handler = handler(-1);
        let owner = test_owner();

        let (token, expires_in) = handler.issue(&owner).unwrap();
        assert_eq!(expires_in, 0);
        assert!(matches!(
            handler.validate(&token),
            Err(CoreError::SessionExpired)
        ));
    }

    #[test]
    fn test_revoke_single_token() {
        let handler = handler(12);
        let owner = test_owner();

        let (token, _) = handler.issue(&owner).unwrap();
        let claims = handler.validate(&token).unwrap();

        handler.revoke(&claims);

        assert!(matches!(
            handler.validate(&token),
            Err(CoreError::SessionRevoked)
        ));
    }

    #[test]
    fn test_revoke_all_then_reissue() {
        let handler = handler(12);
        let owner = test_owner();

        let (old_token, _) = handler.issue(&owner).unwrap();
        handler.revoke_all(owner.id);

        // Old session dead even though its TTL has not elapsed.
        assert!(matches!(
            handler.validate(&old_token),
            Err(CoreError::SessionRevoked)
        ));

        // A token minted after the bump carries the new epoch and is valid
        // immediately, even within the same second.
        let (new_token, _) = handler.issue(&owner).unwrap();
        assert!(handler.validate(&new_token).is_ok());
    }

    #[test]
    fn test_revoke_all_scoped_to_one_owner() {
        let handler = handler(12);
        let owner_a = test_owner();
        let owner_b = Owner {
            id: Uuid::new_v4(),
            name: "o2".to_string(),
            code_hash: "hash".to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let (token_a, _) = handler.issue(&owner_a).unwrap();
        let (token_b, _) = handler.issue(&owner_b).unwrap();

        handler.revoke_all(owner_a.id);

        assert!(handler.validate(&token_a).is_err());
        assert!(handler.validate(&token_b).is_ok());
    }

    #[test]
    fn test_prune_clears_expired_revocations() {
        let store = Arc::new(InMemoryRevocationStore::default());
        let jti = Uuid::new_v4();

        store.revoke_token(jti, Utc::now() - chrono::Duration::hours(1));
        assert!(store.is_token_revoked(&jti));

        store.prune(Utc::now());
        assert!(!store.is_token_revoked(&jti));
    }
}
