//! Collection list query engine.
//!
//! # Responsibility
//! - Evaluate parent scope, name filter and subtree exclusion over a tree view.
//! - Project matches into response records with deterministic order and paging.
//!
//! # Invariants
//! - Queries never mutate the tree.
//! - Result order is `name ASC, id ASC` regardless of arena iteration order.
//! - An unknown `exclude` id excludes nothing.

pub mod filter;

use crate::library::error::LibraryResult;
use crate::library::tree::CollectionTree;
use crate::model::collection::Collection;
use crate::model::item::ItemId;
use filter::NameFilter;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Parent criterion of a list query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentScope {
    /// No parent criterion.
    #[default]
    Any,
    /// Only root-level collections.
    Root,
    /// Only direct children of the given collection.
    Parent(ItemId),
}

impl ParentScope {
    fn admits(&self, parent: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Root => parent.is_none(),
            Self::Parent(expected) => parent == Some(expected.as_str()),
        }
    }
}

/// Options for listing collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionListQuery {
    pub parent: ParentScope,
    /// Name filter pattern; empty means no filter.
    pub filter: Option<String>,
    /// Collection whose whole subtree is left out of results.
    pub exclude: Option<ItemId>,
    pub offset: usize,
    /// `None` returns everything after `offset`.
    pub limit: Option<usize>,
}

impl CollectionListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: impl Into<ItemId>) -> Self {
        self.parent = ParentScope::Parent(parent.into());
        self
    }

    pub fn roots_only(mut self) -> Self {
        self.parent = ParentScope::Root;
        self
    }

    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    pub fn excluding(mut self, id: impl Into<ItemId>) -> Self {
        self.exclude = Some(id.into());
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// Collection list entry handed to serializers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionResponse {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    /// RFC 3339, second precision.
    pub modified: String,
    pub parent: Option<ItemId>,
    pub has_children: bool,
}

impl From<&Collection> for CollectionResponse {
    fn from(value: &Collection) -> Self {
        Self {
            id: value.item.id.clone(),
            name: value.item.name.clone(),
            description: value.item.description.clone(),
            modified: value.item.modified_text(),
            parent: value.parent.clone(),
            has_children: value.has_children(),
        }
    }
}

/// One page of list results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionPage {
    pub items: Vec<CollectionResponse>,
    /// Match count before pagination.
    pub total: usize,
}

/// Runs one list query against a locked tree view.
pub(crate) fn query_collections(
    tree: &CollectionTree,
    query: &CollectionListQuery,
) -> LibraryResult<CollectionPage> {
    let name_filter = match query.filter.as_deref() {
        Some(pattern) if !pattern.is_empty() => Some(NameFilter::parse(pattern)?),
        _ => None,
    };
    let excluded = match query.exclude.as_deref() {
        Some(id) if !id.is_empty() => exclude_set(tree, id),
        _ => HashSet::new(),
    };

    let mut items: Vec<CollectionResponse> = tree
        .iter()
        .filter(|collection| query.parent.admits(collection.parent.as_deref()))
        .filter(|collection| {
            name_filter
                .as_ref()
                .map_or(true, |filter| filter.matches(collection.name()))
        })
        .filter(|collection| !excluded.contains(collection.id()))
        .map(CollectionResponse::from)
        .collect();

    items.sort_by(|left, right| {
        left.name
            .as_bytes()
            .cmp(right.name.as_bytes())
            .then_with(|| left.id.cmp(&right.id))
    });

    let total = items.len();
    let page = items
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    Ok(CollectionPage { items: page, total })
}

/// Collects `root` and all of its descendants.
///
/// Breadth-first over `children`; each node is visited at most once, so
/// duplicate child entries cannot stall the walk.
pub(crate) fn exclude_set(tree: &CollectionTree, root: &str) -> HashSet<ItemId> {
    let mut visited = HashSet::new();
    let Some(start) = tree.get(root) else {
        return visited;
    };

    let mut queue = VecDeque::from([start]);
    visited.insert(start.item.id.clone());
    while let Some(collection) = queue.pop_front() {
        for child_id in &collection.children {
            if !visited.insert(child_id.clone()) {
                continue;
            }
            if let Some(child) = tree.get(child_id) {
                queue.push_back(child);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::{exclude_set, query_collections, CollectionListQuery};
    use crate::library::tree::CollectionTree;
    use crate::model::collection::Collection;

    fn node(id: &str, name: &str, parent: Option<&str>, children: &[&str]) -> Collection {
        let mut collection = Collection::new(name);
        collection.item.id = id.to_string();
        collection.parent = parent.map(str::to_string);
        collection.children = children.iter().map(|id| id.to_string()).collect();
        collection
    }

    #[test]
    fn exclude_set_terminates_on_duplicate_and_cyclic_child_links() {
        let mut tree = CollectionTree::new();
        tree.insert_unchecked(node("r", "R", None, &["a", "a", "b"]));
        tree.insert_unchecked(node("a", "A", Some("r"), &["r"]));
        tree.insert_unchecked(node("b", "B", Some("r"), &["c"]));
        tree.insert_unchecked(node("c", "C", Some("b"), &[]));

        let set = exclude_set(&tree, "r");
        assert_eq!(set.len(), 4);
        for id in ["r", "a", "b", "c"] {
            assert!(set.contains(id));
        }
    }

    #[test]
    fn exclude_set_is_empty_for_unknown_root() {
        let tree = CollectionTree::new();
        assert!(exclude_set(&tree, "missing").is_empty());
    }

    #[test]
    fn equal_names_are_ordered_by_id() {
        let mut tree = CollectionTree::new();
        tree.insert_unchecked(node("b", "Same", None, &[]));
        tree.insert_unchecked(node("a", "Same", None, &[]));
        tree.insert_unchecked(node("c", "Other", None, &[]));

        let page = query_collections(&tree, &CollectionListQuery::new()).unwrap();
        let ids: Vec<_> = page.items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn offset_past_end_yields_empty_page_with_total() {
        let mut tree = CollectionTree::new();
        tree.insert_unchecked(node("a", "A", None, &[]));

        let page = query_collections(&tree, &CollectionListQuery::new().page(5, 10)).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
    }
}
