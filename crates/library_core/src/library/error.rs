//! Library error contracts.
//!
//! # Responsibility
//! - Define the error kinds returned by every library operation.
//! - Map persistence failures into the `Io` kind without losing the source.
//!
//! # Invariants
//! - Errors are returned as values; library operations never panic on bad input.
//! - An operation returning an error has left library state unchanged.

use crate::model::item::{ItemId, ItemKind};
use crate::repo::library_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by library operations.
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Rejected payload or structural request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Item name is blank after trim.
    BlankName(ItemKind),
    /// Submitted parent id does not resolve under strict parent policy.
    ParentNotFound(ItemId),
    /// Re-parenting would make a collection its own ancestor.
    CycleDetected { id: ItemId, parent: ItemId },
    /// Name filter pattern cannot be compiled.
    InvalidFilter { pattern: String, message: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName(kind) => write!(f, "{kind} name must not be blank"),
            Self::ParentNotFound(id) => write!(f, "parent collection not found: {id}"),
            Self::CycleDetected { id, parent } => write!(
                f,
                "re-parent would create cycle: collection {id} under parent {parent}"
            ),
            Self::InvalidFilter { pattern, message } => {
                write!(f, "invalid name filter `{pattern}`: {message}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Errors from library operations.
#[derive(Debug)]
pub enum LibraryError {
    /// No item of `kind` has identifier `id`.
    NotFound { kind: ItemKind, id: ItemId },
    /// Malformed payload or forbidden tree edit.
    Validation(ValidationError),
    /// Persistence backend failure.
    Io(RepoError),
    /// Reserved for optimistic concurrency checks.
    Conflict(String),
}

impl LibraryError {
    pub(crate) fn not_found(kind: ItemKind, id: impl Into<ItemId>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "library persistence failed: {err}"),
            Self::Conflict(message) => write!(f, "library conflict: {message}"),
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::Validation(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Conflict(_) => None,
        }
    }
}

impl From<ValidationError> for LibraryError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for LibraryError {
    fn from(value: RepoError) -> Self {
        Self::Io(value)
    }
}
