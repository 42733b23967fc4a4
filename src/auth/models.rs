//! Authentication Models
//! Mission: Owner identity and session data structures

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A villa owner account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: Uuid,
    /// Login handle, unique across owners.
    pub name: String,
    #[serde(skip_serializing)]
    pub code_hash: String, // bcrypt hash - never serialize
    pub created_at: String,
}

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owner id.
    pub sub: Uuid,
    pub name: String,
    /// Token id, target of single-token revocation.
    pub jti: Uuid,
    /// Owner session epoch at issuance. A revoke-all bumps the owner's
    /// current epoch, invalidating every token carrying an older one.
    pub sv: u64,
    pub iat: usize,
    pub exp: usize,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub owner: String,
    pub code: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: usize, // seconds until expiration
    pub owner: OwnerResponse,
}

/// Owner response (sanitized)
#[derive(Debug, Serialize)]
pub struct OwnerResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
}

impl OwnerResponse {
    pub fn from_owner(owner: &Owner) -> Self {
        Self {
            id: owner.id,
            name: owner.name.clone(),
            created_at: owner.created_at.clone(),
        }
    }
}

/// Code rotation request body
#[derive(Debug, Deserialize)]
pub struct RotateCodeRequest {
    pub new_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_never_serializes_code_hash() {
        let owner = Owner {
            id: Uuid::new_v4(),
            name: "o1".to_string(),
            code_hash: "$2b$12$secret".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&owner).unwrap();
        assert!(!json.contains("code_hash"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_owner_response_drops_hash() {
        let owner = Owner {
            id: Uuid::new_v4(),
            name: "o1".to_string(),
            code_hash: "hash".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        let resp = OwnerResponse::from_owner(&owner);
        assert_eq!(resp.name, "o1");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("hash"));
    }
}
