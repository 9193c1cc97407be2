//! Fameish Store
//!
//! The entrant record store. Addresses are stored in canonical lowercase
//! hex with a database-level UNIQUE constraint; that constraint is the
//! sole mechanism preventing duplicate entrant creation under concurrent
//! signups. A denormalized `record_count` table is kept current by
//! store-native triggers for UI display.

use std::path::Path;
use std::sync::Mutex;

use fameish_core::{Address, VerificationSource};
use rusqlite::{params, Connection, ErrorCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    Read(String),
    #[error("store write failed: {0}")]
    Write(String),
    #[error("duplicate entrant: {0}")]
    Duplicate(String),
}

/// A full entrant row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entrant {
    pub id: i64,
    pub account: Address,
    pub eligible: bool,
    pub should_unfollow: bool,
    pub verification_source: Option<VerificationSource>,
    pub created_at: i64,
}

/// Projection used by the rotation job's eligibility snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibleEntrant {
    pub account: Address,
    pub should_unfollow: bool,
}

/// Record store seam for the two core workflows.
pub trait EntrantStore: Send + Sync {
    /// All eligible entrants, projecting address and should-unfollow flag.
    fn eligible_entrants(&self) -> Result<Vec<EligibleEntrant>, StoreError>;
    /// Case-insensitive lookup by account address.
    fn find_by_account(&self, account: Address) -> Result<Option<Entrant>, StoreError>;
    /// Insert a new eligible entrant. [`StoreError::Duplicate`] when the
    /// address already exists.
    fn insert_entrant(
        &self,
        account: Address,
        source: VerificationSource,
    ) -> Result<Entrant, StoreError>;
    /// Flag the given accounts for unfollow next cycle.
    fn mark_should_unfollow(&self, accounts: &[Address]) -> Result<(), StoreError>;
    /// Denormalized entrant count.
    fn record_count(&self) -> Result<u64, StoreError>;
}

/// Accounts per `UPDATE ... IN (...)` statement, well under SQLite's
/// host-parameter limit.
const MARK_CHUNK_SIZE: usize = 500;

/// SQLite-backed entrant store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Read(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!(path = %path.display(), "entrant store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Read(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entrant (
                id INTEGER PRIMARY KEY,
                account TEXT NOT NULL UNIQUE,
                eligible INTEGER NOT NULL DEFAULT 1,
                should_unfollow INTEGER NOT NULL DEFAULT 0,
                verification_source INTEGER,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
            );

            CREATE TABLE IF NOT EXISTS record_count (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                count INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO record_count (id, count) VALUES (1, 0);

            CREATE TRIGGER IF NOT EXISTS entrant_count_after_insert
            AFTER INSERT ON entrant
            BEGIN
                UPDATE record_count SET count = count + 1 WHERE id = 1;
            END;",
        )
        .map_err(|e| StoreError::Write(e.to_string()))
    }

    fn row_to_entrant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entrant> {
        let account: String = row.get(1)?;
        let source: Option<u8> = row.get(4)?;
        Ok(Entrant {
            id: row.get(0)?,
            account: account.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(1, "account".into(), rusqlite::types::Type::Text)
            })?,
            eligible: row.get::<_, i64>(2)? != 0,
            should_unfollow: row.get::<_, i64>(3)? != 0,
            verification_source: source.and_then(VerificationSource::from_u8),
            created_at: row.get(5)?,
        })
    }
}

impl EntrantStore for SqliteStore {
    fn eligible_entrants(&self) -> Result<Vec<EligibleEntrant>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT account, should_unfollow FROM entrant WHERE eligible = 1 ORDER BY id")
            .map_err(|e| StoreError::Read(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                let account: String = row.get(0)?;
                let should_unfollow: i64 = row.get(1)?;
                Ok((account, should_unfollow != 0))
            })
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let mut entrants = Vec::new();
        for row in rows {
            let (account, should_unfollow) = row.map_err(|e| StoreError::Read(e.to_string()))?;
            let account = account
                .parse()
                .map_err(|e: fameish_core::AddressParseError| StoreError::Read(e.to_string()))?;
            entrants.push(EligibleEntrant {
                account,
                should_unfollow,
            });
        }
        debug!(count = entrants.len(), "loaded eligibility snapshot");
        Ok(entrants)
    }

    fn find_by_account(&self, account: Address) -> Result<Option<Entrant>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, account, eligible, should_unfollow, verification_source, created_at
                 FROM entrant WHERE account = ?1",
            )
            .map_err(|e| StoreError::Read(e.to_string()))?;
        // to_hex() is canonical lowercase, so equality is case-insensitive
        // for any caller-supplied casing.
        let mut rows = stmt
            .query_map(params![account.to_hex()], Self::row_to_entrant)
            .map_err(|e| StoreError::Read(e.to_string()))?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e| StoreError::Read(e.to_string()))?)),
            None => Ok(None),
        }
    }

    fn insert_entrant(
        &self,
        account: Address,
        source: VerificationSource,
    ) -> Result<Entrant, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO entrant (account, verification_source) VALUES (?1, ?2)",
            params![account.to_hex(), source.as_u8()],
        )
        .map_err(|e| match &e {
            rusqlite::Error::SqliteFailure(inner, _)
                if inner.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Duplicate(account.to_hex())
            }
            _ => StoreError::Write(e.to_string()),
        })?;
        let id = conn.last_insert_rowid();
        let entrant = conn
            .query_row(
                "SELECT id, account, eligible, should_unfollow, verification_source, created_at
                 FROM entrant WHERE id = ?1",
                params![id],
                Self::row_to_entrant,
            )
            .map_err(|e| StoreError::Read(e.to_string()))?;
        info!(account = %entrant.account, id, "entrant created");
        Ok(entrant)
    }

    fn mark_should_unfollow(&self, accounts: &[Address]) -> Result<(), StoreError> {
        if accounts.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        // One bound variable per account; chunk to stay under SQLite's
        // host-parameter limit for large not-yet-following sets.
        for chunk in accounts.chunks(MARK_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "UPDATE entrant SET should_unfollow = 1 WHERE account IN ({placeholders})"
            );
            let values: Vec<String> = chunk.iter().map(Address::to_hex).collect();
            conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
                .map_err(|e| StoreError::Write(e.to_string()))?;
        }
        debug!(count = accounts.len(), "marked accounts for unfollow");
        Ok(())
    }

    fn record_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT count FROM record_count WHERE id = 1", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|count| count as u64)
        .map_err(|e| StoreError::Read(e.to_string()))
    }
}
