//! Library repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist committed library changes as one batch per operation.
//! - Load stored items back for library bootstrap.
//!
//! # Invariants
//! - `commit` writes a whole batch or nothing.
//! - Read paths reject malformed rows instead of masking them.

use crate::db::schema;
use crate::model::collection::Collection;
use crate::model::item::{Item, ItemId, ItemKind};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from library persistence.
#[derive(Debug)]
pub enum RepoError {
    Sqlite(rusqlite::Error),
    /// Stored schema version is not the one this build reads and writes.
    SchemaVersion { expected: u32, actual: u32 },
    /// Persisted data cannot be converted to a valid library state.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::SchemaVersion { expected, actual } => write!(
                f,
                "library schema version {actual} does not match supported version {expected}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted library data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::SchemaVersion { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Flat persisted shape shared by every item kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub kind: ItemKind,
    pub item: Item,
    /// Always `None` for non-tree kinds.
    pub parent: Option<ItemId>,
    /// Always empty for non-tree kinds.
    pub children: Vec<ItemId>,
}

impl ItemRecord {
    pub fn from_collection(collection: &Collection) -> Self {
        Self {
            kind: ItemKind::Collection,
            item: collection.item.clone(),
            parent: collection.parent.clone(),
            children: collection.children.clone(),
        }
    }

    pub fn from_graph(item: &Item) -> Self {
        Self {
            kind: ItemKind::Graph,
            item: item.clone(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn into_collection(self) -> Collection {
        Collection {
            item: self.item,
            parent: self.parent,
            children: self.children,
        }
    }
}

/// Items written and removed by one committed operation of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemBatch {
    pub kind: ItemKind,
    pub upserts: Vec<ItemRecord>,
    pub removals: Vec<ItemId>,
}

impl ItemBatch {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            upserts: Vec::new(),
            removals: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Persistence seam behind a library.
pub trait LibraryRepository: Send {
    /// Loads every stored item of one kind.
    fn load_items(&self, kind: ItemKind) -> RepoResult<Vec<ItemRecord>>;
    /// Writes one batch atomically.
    fn commit(&mut self, batch: &ItemBatch) -> RepoResult<()>;
}

/// SQLite-backed library repository.
pub struct SqliteLibraryRepository {
    conn: Connection,
}

impl SqliteLibraryRepository {
    /// Wraps a connection already upgraded by [`crate::db::open_db`].
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        schema::ensure_current(&conn)?;
        Ok(Self { conn })
    }
}

impl LibraryRepository for SqliteLibraryRepository {
    fn load_items(&self, kind: ItemKind) -> RepoResult<Vec<ItemRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, parent_id, children, modified
             FROM library_items
             WHERE kind = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([kind.as_str()])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_item_row(kind, row)?);
        }
        Ok(records)
    }

    fn commit(&mut self, batch: &ItemBatch) -> RepoResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for record in &batch.upserts {
            if record.kind != batch.kind {
                return Err(RepoError::InvalidData(format!(
                    "{} record `{}` in {} batch",
                    record.kind, record.item.id, batch.kind
                )));
            }
            let children = serde_json::to_string(&record.children)
                .map_err(|err| RepoError::InvalidData(format!("children encode: {err}")))?;
            tx.execute(
                "INSERT INTO library_items (
                    kind,
                    id,
                    name,
                    description,
                    parent_id,
                    children,
                    modified
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT (kind, id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    parent_id = excluded.parent_id,
                    children = excluded.children,
                    modified = excluded.modified;",
                params![
                    batch.kind.as_str(),
                    record.item.id.as_str(),
                    record.item.name.as_str(),
                    record.item.description.as_str(),
                    record.parent.as_deref(),
                    children,
                    record.item.modified.to_rfc3339(),
                ],
            )?;
        }
        for id in &batch.removals {
            tx.execute(
                "DELETE FROM library_items WHERE kind = ?1 AND id = ?2;",
                params![batch.kind.as_str(), id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_item_row(kind: ItemKind, row: &Row<'_>) -> RepoResult<ItemRecord> {
    let id: String = row.get("id")?;
    let children_text: String = row.get("children")?;
    let children: Vec<ItemId> = serde_json::from_str(&children_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid children `{children_text}` for {kind} {id}: {err}"
        ))
    })?;
    let modified_text: String = row.get("modified")?;
    let modified = DateTime::parse_from_rfc3339(&modified_text)
        .map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid modified `{modified_text}` for {kind} {id}: {err}"
            ))
        })?
        .with_timezone(&Utc);

    Ok(ItemRecord {
        kind,
        item: Item {
            id,
            name: row.get("name")?,
            description: row.get("description")?,
            modified,
        },
        parent: row.get("parent_id")?,
        children,
    })
}
