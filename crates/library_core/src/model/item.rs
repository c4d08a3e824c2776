//! Base library item model.
//!
//! # Responsibility
//! - Define fields common to every library item kind.
//! - Provide the tagged union returned by kind-generic library calls.
//!
//! # Invariants
//! - An empty `id` means "not yet assigned"; the library assigns it on first
//!   successful store and never changes it afterwards.

use crate::model::collection::Collection;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable library item identifier.
///
/// Kept as a plain string so ids coming from external layers stay opaque.
pub type ItemId = String;

/// Item kinds held by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Tree-capable folder grouping dashboard content.
    Collection,
    /// Plain dashboard graph definition.
    Graph,
}

impl ItemKind {
    /// Returns the stable storage name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Graph => "graph",
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every library item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Library-assigned identifier. Empty until first store.
    #[serde(default)]
    pub id: ItemId,
    /// User-facing label.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Refreshed on every successful store.
    pub modified: DateTime<Utc>,
}

impl Item {
    /// Creates an unsaved item with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            description: String::new(),
            modified: Utc::now(),
        }
    }

    /// Formats `modified` the way list responses expose it.
    pub fn modified_text(&self) -> String {
        format_timestamp(&self.modified)
    }
}

/// Formats a timestamp as RFC 3339 with second precision and `Z` suffix.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Kind-tagged library item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LibraryItem {
    Collection(Collection),
    Graph(Item),
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, ItemKind, LibraryItem};
    use crate::model::collection::Collection;
    use chrono::{TimeZone, Utc};

    #[test]
    fn kind_storage_names_match_serde_tags() {
        for kind in [ItemKind::Collection, ItemKind::Graph] {
            let tagged = serde_json::to_string(&kind).unwrap();
            assert_eq!(tagged, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn library_item_is_tagged_by_kind() {
        let value = serde_json::to_value(LibraryItem::Collection(Collection::new("Home"))).unwrap();
        assert_eq!(value["kind"], "collection");
        assert_eq!(value["name"], "Home");
    }

    #[test]
    fn timestamp_uses_seconds_and_zulu_suffix() {
        let value = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_timestamp(&value), "2024-03-09T07:05:01Z");
    }
}
