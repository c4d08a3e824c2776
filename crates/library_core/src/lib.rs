//! Core item library for dashboard collections.
//! This crate owns tree consistency and list query semantics.

pub mod db;
pub mod library;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use library::error::{LibraryError, LibraryResult, ValidationError};
pub use library::tree::{TreeChange, TreeInvariantError};
pub use library::Library;
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LoggingConfig,
};
pub use model::collection::{Collection, CollectionStoreRequest, ParentPolicy};
pub use model::item::{format_timestamp, Item, ItemId, ItemKind, LibraryItem};
pub use query::filter::NameFilter;
pub use query::{CollectionListQuery, CollectionPage, CollectionResponse, ParentScope};
pub use repo::library_repo::{
    ItemBatch, ItemRecord, LibraryRepository, RepoError, RepoResult, SqliteLibraryRepository,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
