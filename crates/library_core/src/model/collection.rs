//! Tree-capable collection model.
//!
//! # Responsibility
//! - Define the collection node shape with parent/children links.
//! - Define the decoded store payload handed over by external layers.
//!
//! # Invariants
//! - `c.children` contains `x` exactly once iff `x.parent == Some(c.id)`.
//! - Following `parent` links never revisits a node.
//! - Callers never set `children` directly; submitted children are discarded.

use crate::model::item::{Item, ItemId};
use serde::{Deserialize, Deserializer, Serialize};

/// Collection node stored in the library tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(flatten)]
    pub item: Item,
    /// Parent collection id. `None` means root-level node.
    #[serde(default)]
    pub parent: Option<ItemId>,
    /// Child collection ids in attach order.
    #[serde(default)]
    pub children: Vec<ItemId>,
}

impl Collection {
    /// Creates an unsaved root collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            item: Item::new(name),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.item.id.as_str()
    }

    pub fn name(&self) -> &str {
        self.item.name.as_str()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Handling of a submitted parent id that does not resolve to a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentPolicy {
    /// Unresolved parent ids make the collection a root.
    #[default]
    Lenient,
    /// Unresolved parent ids are rejected with a validation error.
    Strict,
}

/// Decoded collection store payload.
///
/// An empty `id` creates a new collection; a non-empty `id` upserts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CollectionStoreRequest {
    #[serde(default)]
    pub id: ItemId,
    /// `None` keeps the base value (inherited source or empty).
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Submitted parent id. Empty, missing or `null` means root.
    #[serde(default, deserialize_with = "null_as_root")]
    pub parent: ItemId,
    /// Accepted for payload compatibility and always discarded.
    #[serde(default)]
    pub children: Vec<ItemId>,
    /// Source collection to copy fields from on create.
    #[serde(skip)]
    pub inherit: Option<ItemId>,
    #[serde(skip)]
    pub parent_policy: ParentPolicy,
}

impl CollectionStoreRequest {
    /// Creates a create-request with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Creates an update-request targeting an existing id.
    pub fn update(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<ItemId>) -> Self {
        self.parent = parent.into();
        self
    }

    pub fn with_children(mut self, children: Vec<ItemId>) -> Self {
        self.children = children;
        self
    }

    /// Copies fields from `source` when this request creates a collection.
    pub fn inheriting(mut self, source: impl Into<ItemId>) -> Self {
        self.inherit = Some(source.into());
        self
    }

    pub fn strict_parent(mut self) -> Self {
        self.parent_policy = ParentPolicy::Strict;
        self
    }

    pub fn is_create(&self) -> bool {
        self.id.is_empty()
    }
}

impl From<Collection> for CollectionStoreRequest {
    fn from(value: Collection) -> Self {
        Self {
            id: value.item.id,
            name: Some(value.item.name),
            description: Some(value.item.description),
            parent: value.parent.unwrap_or_default(),
            children: value.children,
            inherit: None,
            parent_policy: ParentPolicy::Lenient,
        }
    }
}

fn null_as_root<'de, D>(deserializer: D) -> Result<ItemId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ItemId>::deserialize(deserializer)?.unwrap_or_default())
}
