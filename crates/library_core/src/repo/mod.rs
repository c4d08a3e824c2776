//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistence seam a library writes committed changes through.
//! - Isolate SQLite query details from tree and query logic.
//!
//! # Invariants
//! - Repositories store what the library committed; they never relink trees.

pub mod library_repo;
