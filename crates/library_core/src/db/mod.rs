//! SQLite storage for a persistent library.
//!
//! Connections returned here are upgraded to the schema version this build
//! understands; failures surface as [`RepoError`](crate::repo::library_repo::RepoError).

mod open;
pub mod schema;

pub use open::{open_db, open_db_in_memory};
