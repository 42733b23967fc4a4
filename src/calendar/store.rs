//! Calendar Store
//! Mission: Conflict-checked booking calendar on SQLite
//!
//! All mutation goes through this API; every conflict check and its
//! mutation run inside one transaction on a mutex-guarded connection,
//! so per villa there is at most one in-flight check-and-mutate and two
//! overlapping reservations can never both commit.

use crate::calendar::models::{BookingRange, Villa};
use crate::error::{CoreError, CoreResult};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Schema for villas and bookings.
///
/// Dates are stored as ISO-8601 TEXT, which compares correctly under
/// SQLite's lexicographic ordering.
const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS villas (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    name TEXT NOT NULL,
    address TEXT NOT NULL,
    capacity INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_villas_owner ON villas(owner_id);

CREATE TABLE IF NOT EXISTS bookings (
    id TEXT PRIMARY KEY,
    villa_id TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    reference TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (villa_id) REFERENCES villas(id)
);

CREATE INDEX IF NOT EXISTS idx_bookings_villa_start
    ON bookings(villa_id, start_date);
"#;

/// Booking calendar with SQLite backend.
#[derive(Clone)]
pub struct CalendarStore {
    conn: Arc<Mutex<Connection>>,
}

impl CalendarStore {
    /// Open (or create) the calendar database
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to apply calendar schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ---- villas ----

    pub fn create_villa(
        &self,
        owner_id: &Uuid,
        name: &str,
        address: &str,
        capacity: u32,
    ) -> CoreResult<Villa> {
        let villa = Villa {
            id: Uuid::new_v4(),
            owner_id: *owner_id,
            name: name.to_string(),
            address: address.to_string(),
            capacity,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO villas (id, owner_id, name, address, capacity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                villa.id.to_string(),
                villa.owner_id.to_string(),
                villa.name,
                villa.address,
                villa.capacity,
                villa.created_at,
            ],
        )?;

        info!("🏡 Created villa {} for owner {}", villa.name, owner_id);
        Ok(villa)
    }

    pub fn get_villa(&self, villa_id: &Uuid) -> CoreResult<Villa> {
        let conn = self.conn.lock();
        fetch_villa(&conn, villa_id)
    }

    pub fn list_villas(&self, owner_id: &Uuid) -> CoreResult<Vec<Villa>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name, address, capacity, created_at
             FROM villas WHERE owner_id = ?1 ORDER BY created_at",
        )?;

        let raw: Vec<RawVilla> = stmt
            .query_map(params![owner_id.to_string()], villa_row)?
            .collect::<rusqlite::Result<_>>()?;

        raw.into_iter().map(villa_from_raw).collect()
    }

    /// Delete a villa and, cascading, its whole calendar.
    pub fn delete_villa(&self, villa_id: &Uuid) -> CoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM bookings WHERE villa_id = ?1",
            params![villa_id.to_string()],
        )?;
        let rows = tx.execute(
            "DELETE FROM villas WHERE id = ?1",
            params![villa_id.to_string()],
        )?;
        if rows == 0 {
            return Err(CoreError::VillaNotFound);
        }

        tx.commit()?;
        info!("🗑️  Deleted villa {} and its bookings", villa_id);
        Ok(())
    }

    // ---- bookings ----

    /// All committed ranges for a villa, ordered by start date.
    pub fn list_ranges(&self, villa_id: &Uuid) -> CoreResult<Vec<BookingRange>> {
        let conn = self.conn.lock();
        fetch_villa(&conn, villa_id)?;

        let mut stmt = conn.prepare(
            "SELECT id, villa_id, start_date, end_date, reference, created_at
             FROM bookings WHERE villa_id = ?1 ORDER BY start_date",
        )?;

        let raw: Vec<RawBooking> = stmt
            .query_map(params![villa_id.to_string()], booking_row)?
            .collect::<rusqlite::Result<_>>()?;

        raw.into_iter().map(booking_from_raw).collect()
    }

    /// Insert a booking iff `[start, end)` overlaps nothing already
    /// committed for this villa. Check and insert are one transaction.
    pub fn reserve(
        &self,
        villa_id: &Uuid,
        start: NaiveDate,
        end: NaiveDate,
        reference: Option<String>,
    ) -> CoreResult<BookingRange> {
        if start >= end {
            return Err(CoreError::InvalidRange);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        fetch_villa(&tx, villa_id)?;
        if let Some(existing) = find_conflict(&tx, villa_id, start, end, None)? {
            debug!(
                "Reservation [{start}, {end}) on villa {villa_id} conflicts with {}",
                existing.id
            );
            return Err(CoreError::RangeConflict { existing });
        }

        let booking = BookingRange {
            id: Uuid::new_v4(),
            villa_id: *villa_id,
            start,
            end,
            reference,
            created_at: Utc::now().to_rfc3339(),
        };

        tx.execute(
            "INSERT INTO bookings (id, villa_id, start_date, end_date, reference, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                booking.id.to_string(),
                booking.villa_id.to_string(),
                booking.start.to_string(),
                booking.end.to_string(),
                booking.reference,
                booking.created_at,
            ],
        )?;
        tx.commit()?;

        info!("📅 Reserved [{start}, {end}) on villa {villa_id}");
        Ok(booking)
    }

    /// Remove a committed booking.
    pub fn cancel(&self, villa_id: &Uuid, booking_id: &Uuid) -> CoreResult<()> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM bookings WHERE id = ?1 AND villa_id = ?2",
            params![booking_id.to_string(), villa_id.to_string()],
        )?;
        if rows == 0 {
            return Err(CoreError::BookingNotFound);
        }

        info!("📅 Cancelled booking {booking_id} on villa {villa_id}");
        Ok(())
    }

    /// Move a committed booking to a new span, atomically. Equivalent to
    /// cancel-then-reserve: the booking's own prior span is excluded from
    /// the conflict check, so shrinking or shifting within itself succeeds.
    pub fn modify(
        &self,
        villa_id: &Uuid,
        booking_id: &Uuid,
        new_start: NaiveDate,
        new_end: NaiveDate,
    ) -> CoreResult<BookingRange> {
        if new_start >= new_end {
            return Err(CoreError::InvalidRange);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let current = fetch_booking(&tx, villa_id, booking_id)?;
        if let Some(existing) = find_conflict(&tx, villa_id, new_start, new_end, Some(booking_id))?
        {
            return Err(CoreError::RangeConflict { existing });
        }

        tx.execute(
            "UPDATE bookings SET start_date = ?1, end_date = ?2 WHERE id = ?3",
            params![
                new_start.to_string(),
                new_end.to_string(),
                booking_id.to_string()
            ],
        )?;
        tx.commit()?;

        info!(
            "📅 Moved booking {booking_id} on villa {villa_id} to [{new_start}, {new_end})"
        );
        Ok(BookingRange {
            start: new_start,
            end: new_end,
            ..current
        })
    }
}

// ---- row mapping ----

type RawVilla = (String, String, String, String, u32, String);
type RawBooking = (String, String, String, String, Option<String>, String);

fn villa_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVilla> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn booking_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBooking> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn villa_from_raw(
    (id, owner_id, name, address, capacity, created_at): RawVilla,
) -> CoreResult<Villa> {
    Ok(Villa {
        id: parse_uuid(&id)?,
        owner_id: parse_uuid(&owner_id)?,
        name,
        address,
        capacity,
        created_at,
    })
}

fn booking_from_raw(
    (id, villa_id, start, end, reference, created_at): RawBooking,
) -> CoreResult<BookingRange> {
    Ok(BookingRange {
        id: parse_uuid(&id)?,
        villa_id: parse_uuid(&villa_id)?,
        start: parse_date(&start)?,
        end: parse_date(&end)?,
        reference,
        created_at,
    })
}

fn parse_uuid(s: &str) -> CoreResult<Uuid> {
    Uuid::parse_str(s)
        .context("Corrupt id in calendar store")
        .map_err(CoreError::from)
}

fn parse_date(s: &str) -> CoreResult<NaiveDate> {
    s.parse::<NaiveDate>()
        .context("Corrupt date in calendar store")
        .map_err(CoreError::from)
}

fn fetch_villa(conn: &Connection, villa_id: &Uuid) -> CoreResult<Villa> {
    let result = conn.query_row(
        "SELECT id, owner_id, name, address, capacity, created_at
         FROM villas WHERE id = ?1",
        params![villa_id.to_string()],
        villa_row,
    );
    match result {
        Ok(raw) => villa_from_raw(raw),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(CoreError::VillaNotFound),
        Err(e) => Err(e.into()),
    }
}

fn fetch_booking(
    conn: &Connection,
    villa_id: &Uuid,
    booking_id: &Uuid,
) -> CoreResult<BookingRange> {
    let result = conn.query_row(
        "SELECT id, villa_id, start_date, end_date, reference, created_at
         FROM bookings WHERE id = ?1 AND villa_id = ?2",
        params![booking_id.to_string(), villa_id.to_string()],
        booking_row,
    );
    match result {
        Ok(raw) => booking_from_raw(raw),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(CoreError::BookingNotFound),
        Err(e) => Err(e.into()),
    }
}

/// First committed range overlapping `[start, end)` under half-open
/// semantics, skipping `exclude` (the booking being modified). Touching
/// boundaries are not conflicts.
fn find_conflict(
    conn: &Connection,
    villa_id: &Uuid,
    start: NaiveDate,
    end: NaiveDate,
    exclude: Option<&Uuid>,
) -> CoreResult<Option<BookingRange>> {
    let result = match exclude {
        Some(id) => conn.query_row(
            "SELECT id, villa_id, start_date, end_date, reference, created_at
             FROM bookings
             WHERE villa_id = ?1 AND start_date < ?3 AND ?2 < end_date AND id != ?4
             ORDER BY start_date LIMIT 1",
            params![
                villa_id.to_string(),
                start.to_string(),
                end.to_string(),
                id.to_string()
            ],
            booking_row,
        ),
        None => conn.query_row(
            "SELECT id, villa_id, start_date, end_date, reference, created_at
             FROM bookings
             WHERE villa_id = ?1 AND start_date < ?3 AND ?2 < end_date
             ORDER BY start_date LIMIT 1",
            params![villa_id.to_string(), start.to_string(), end.to_string()],
            booking_row,
        ),
    };

    match result {
        Ok(raw) => Ok(Some(booking_from_raw(raw)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
