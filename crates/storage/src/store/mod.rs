#![forbid(unsafe_code)]

mod agents;
mod commanders;
mod error;
mod jobs;
mod services;
mod support;
mod sweep;
mod types;

pub use commanders::{JobCommander, ServiceCommander, TimeoutSweeper};
pub use error::{ErrorKind, StoreError};
pub use types::*;

use fulcrum_core::policy::ReconcilePolicy;
use fulcrum_core::properties::{JsonShapeValidator, PropertiesValidator};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use support::*;

const DB_FILE_NAME: &str = "fulcrum.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_LIST_LIMIT: usize = 200;

pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
    policy: ReconcilePolicy,
    validator: Box<dyn PropertiesValidator + Send>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("storage_dir", &self.storage_dir)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_policy(storage_dir, ReconcilePolicy::default())
    }

    pub fn open_with_policy(
        storage_dir: impl AsRef<Path>,
        policy: ReconcilePolicy,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;

        Ok(Self {
            conn,
            storage_dir,
            policy,
            validator: Box::new(JsonShapeValidator),
        })
    }

    /// Replaces the default JSON shape check on service properties and
    /// attributes.
    pub fn with_validator(mut self, validator: impl PropertiesValidator + Send + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }
}

/// Write transactions take the database write lock up front so that the
/// guard reads inside them cannot go stale before the write.
fn begin_write(conn: &mut Connection) -> Result<Transaction<'_>, StoreError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIST_LIMIT)
}

fn normalize_name(raw: &str, field: &'static str) -> Result<String, StoreError> {
    const MAX_NAME_LEN: usize = 256;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput(field));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(StoreError::InvalidInput("name is too long"));
    }
    Ok(trimmed.to_string())
}
