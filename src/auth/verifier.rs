//! Access Code Verifier
//! Mission: Check presented codes without leaking timing or owner existence

use crate::auth::{models::Owner, owner_store::OwnerStore};
use crate::error::{CoreError, CoreResult};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Verifies presented access codes against stored bcrypt hashes.
///
/// bcrypt's verify compares digests in constant time; the remaining leak is
/// the unknown-owner path, which would return without hashing at all. To
/// close it, a miss runs a full bcrypt verification against a dummy hash of
/// the same cost before returning, so `OwnerNotFound` and `InvalidCode` are
/// indistinguishable by latency.
pub struct CodeVerifier {
    owners: Arc<OwnerStore>,
    dummy_hash: String,
}

impl CodeVerifier {
    pub fn new(owners: Arc<OwnerStore>, bcrypt_cost: u32) -> Result<Self> {
        // Hashed once at startup with the configured cost so the dummy
        // verification below costs the same as a real one.
        let dummy_hash = bcrypt::hash("villahost-equalizer", bcrypt_cost)
            .context("Failed to prepare dummy hash")?;
        Ok(Self { owners, dummy_hash })
    }

    /// Verify a presented code for the named owner.
    ///
    /// Returns the owner on success, `InvalidCode` on mismatch and
    /// `OwnerNotFound` for unknown owners. The presented code is never
    /// logged. Blocking: run on the blocking pool.
    pub fn verify(&self, owner_name: &str, presented: &str) -> CoreResult<Owner> {
        match self.owners.get_owner_by_name(owner_name)? {
            Some(owner) => {
                let ok = bcrypt::verify(presented, &owner.code_hash)
                    .map_err(|e| CoreError::StoreUnavailable(anyhow::Error::new(e)))?;
                if ok {
                    Ok(owner)
                } else {
                    Err(CoreError::InvalidCode)
                }
            }
            None => {
                // Burn the same bcrypt work as the hit path.
                let _ = bcrypt::verify(presented, &self.dummy_hash);
                Err(CoreError::OwnerNotFound)
            }
        }
    }
}
