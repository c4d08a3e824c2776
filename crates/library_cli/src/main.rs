//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `library_core` linkage without any HTTP host.
//! - Print the collection tree of an optional SQLite library file.
//!
//! Usage: `library_cli [DB_PATH]`

use library_core::db::open_db;
use library_core::{
    CollectionListQuery, Library, LibraryResult, ParentScope, SqliteLibraryRepository,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("library_core ping={}", library_core::ping());
    println!("library_core version={}", library_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    let library = match open_library(&db_path) {
        Ok(library) => library,
        Err(err) => {
            eprintln!("failed to open library `{db_path}`: {err}");
            return ExitCode::FAILURE;
        }
    };

    match print_level(&library, ParentScope::Root, 0) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("failed to list collections: {err}");
            ExitCode::FAILURE
        }
    }
}

fn open_library(db_path: &str) -> Result<Library, Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    let repository = SqliteLibraryRepository::try_new(conn)?;
    Ok(Library::with_repository(repository)?)
}

fn print_level(library: &Library, scope: ParentScope, depth: usize) -> LibraryResult<()> {
    let query = CollectionListQuery {
        parent: scope,
        ..CollectionListQuery::default()
    };
    for entry in library.list_collections(&query)?.items {
        println!("{}{} ({})", "  ".repeat(depth), entry.name, entry.id);
        if entry.has_children {
            print_level(library, ParentScope::Parent(entry.id), depth + 1)?;
        }
    }
    Ok(())
}
