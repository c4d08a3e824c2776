//! Library table schema and its upgrade steps.
//!
//! # Invariants
//! - Step `n` of `STEPS` moves the schema from version `n` to `n + 1`.
//! - The stored version lives in `PRAGMA user_version` and only grows.
//! - A database written by a newer build is never touched.

use crate::repo::library_repo::{RepoError, RepoResult};
use log::info;
use rusqlite::Connection;

const STEPS: &[&str] = &[include_str!("0001_library_items.sql")];

/// Schema version this build reads and writes.
pub fn target_version() -> u32 {
    STEPS.len() as u32
}

/// Reads the version recorded in the database header.
pub fn stored_version(conn: &Connection) -> RepoResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Fails unless `conn` is exactly at [`target_version`].
pub fn ensure_current(conn: &Connection) -> RepoResult<()> {
    let actual = stored_version(conn)?;
    if actual != target_version() {
        return Err(RepoError::SchemaVersion {
            expected: target_version(),
            actual,
        });
    }
    Ok(())
}

/// Runs every pending step, each in its own transaction.
///
/// Returns how many steps were applied.
pub fn upgrade(conn: &mut Connection) -> RepoResult<usize> {
    let from = stored_version(conn)?;
    if from > target_version() {
        return Err(RepoError::SchemaVersion {
            expected: target_version(),
            actual: from,
        });
    }

    let pending = &STEPS[from as usize..];
    for (offset, sql) in pending.iter().enumerate() {
        let version = from + offset as u32 + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        info!("event=schema_upgrade module=db status=ok version={version}");
    }
    Ok(pending.len())
}
