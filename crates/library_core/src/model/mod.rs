//! Library domain model for dashboard items.
//!
//! # Responsibility
//! - Define the base item record shared by every library item kind.
//! - Define the tree-capable `Collection` shape and store request payloads.
//!
//! # Invariants
//! - Every stored item is identified by a non-empty id unique within its kind.
//! - `Collection::parent`/`Collection::children` hold identifiers, never
//!   references, and are edited only by the tree consistency layer.

pub mod collection;
pub mod item;
