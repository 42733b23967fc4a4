//! Owner Credential Store
//! Mission: Persist owner accounts and hashed access codes with SQLite

use crate::auth::models::Owner;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{info, warn};
use uuid::Uuid;

/// Credential store with SQLite backend.
///
/// Writes to a single owner row are serialized by SQLite itself; callers
/// never touch hashes directly, they go through [`create_owner`] and
/// [`rotate_code`].
///
/// [`create_owner`]: OwnerStore::create_owner
/// [`rotate_code`]: OwnerStore::rotate_code
pub struct OwnerStore {
    db_path: String,
    bcrypt_cost: u32,
}

impl OwnerStore {
    /// Create a new owner store and initialize the schema
    pub fn new(db_path: &str, bcrypt_cost: u32) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
            bcrypt_cost,
        };
        store.init_db()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open database at {}", self.db_path))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS owners (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                code_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.create_default_owner(&conn)?;

        Ok(())
    }

    /// Create a default owner for initial setup
    fn create_default_owner(&self, conn: &Connection) -> Result<()> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM owners", [], |row| row.get(0))
            .context("Failed to count owners")?;

        if count == 0 {
            let code_hash =
                bcrypt::hash("admin123", self.bcrypt_cost).context("Failed to hash code")?;

            conn.execute(
                "INSERT INTO owners (id, name, code_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    "admin",
                    code_hash,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to insert default owner")?;

            info!("🔐 Default owner created (name: admin, code: admin123)");
            warn!("⚠️  CHANGE DEFAULT ACCESS CODE IN PRODUCTION!");
        }

        Ok(())
    }

    /// Create a new owner with a freshly hashed access code
    pub fn create_owner(&self, name: &str, code: &str) -> Result<Owner> {
        let code_hash = bcrypt::hash(code, self.bcrypt_cost).context("Failed to hash code")?;

        let owner = Owner {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code_hash,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.open()?;
        conn.execute(
            "INSERT INTO owners (id, name, code_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                owner.id.to_string(),
                owner.name,
                owner.code_hash,
                owner.created_at,
            ],
        )
        .context("Failed to insert owner")?;

        info!("✅ Created owner: {}", owner.name);

        Ok(owner)
    }

    /// Get owner by id
    pub fn get_owner(&self, id: &Uuid) -> Result<Option<Owner>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, code_hash, created_at FROM owners WHERE id = ?1",
        )?;
        let result = stmt.query_row(params![id.to_string()], row_to_raw);
        Self::finish_lookup(result)
    }

    /// Get owner by login name
    pub fn get_owner_by_name(&self, name: &str) -> Result<Option<Owner>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, code_hash, created_at FROM owners WHERE name = ?1",
        )?;
        let result = stmt.query_row(params![name], row_to_raw);
        Self::finish_lookup(result)
    }

    fn finish_lookup(
        result: rusqlite::Result<(String, String, String, String)>,
    ) -> Result<Option<Owner>> {
        match result {
            Ok(raw) => Ok(Some(owner_from_raw(raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace an owner's stored hash. The caller is responsible for
    /// revoking outstanding sessions afterwards.
    pub fn set_code_hash(&self, id: &Uuid, new_hash: &str) -> Result<()> {
        let conn = self.open()?;
        let rows = conn.execute(
            "UPDATE owners SET code_hash = ?1 WHERE id = ?2",
            params![new_hash, id.to_string()],
        )?;
        if rows == 0 {
            anyhow::bail!("Owner not found");
        }
        Ok(())
    }

    /// Hash and store a new access code for an owner
    pub fn rotate_code(&self, id: &Uuid, new_code: &str) -> Result<()> {
        let new_hash =
            bcrypt::hash(new_code, self.bcrypt_cost).context("Failed to hash code")?;
        self.set_code_hash(id, &new_hash)?;
        info!("🔄 Access code rotated for owner {}", id);
        Ok(())
    }
}

type RawOwner = (String, String, String, String);

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawOwner> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn owner_from_raw((id, name, code_hash, created_at): RawOwner) -> Result<Owner> {
    Ok(Owner {
        id: Uuid::parse_str(&id).context("Corrupt owner id in store")?,
        name,
        code_hash,
        created_at,
    })
}
