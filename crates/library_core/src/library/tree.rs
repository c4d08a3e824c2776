//! Collection tree consistency manager.
//!
//! # Responsibility
//! - Own the id-indexed arena of collections for one library.
//! - Plan store/delete edits that keep parent/children links consistent.
//! - Apply planned edits only after the caller has committed them.
//!
//! # Invariants
//! - `c.children` contains `x` exactly once iff `x.parent == Some(c.id)`.
//! - No collection is its own ancestor.
//! - Planning never mutates the arena; `apply` is the only write path.

use crate::library::error::{LibraryError, LibraryResult, ValidationError};
use crate::model::collection::{Collection, CollectionStoreRequest, ParentPolicy};
use crate::model::item::{Item, ItemId, ItemKind};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Planned collection edits for one logical operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeChange {
    /// Collections written back in full, in first-touch order.
    pub upserts: Vec<Collection>,
    /// Collection ids removed from the arena.
    pub removals: Vec<ItemId>,
}

/// Broken link found while validating a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeInvariantError {
    /// Arena key and stored id differ, or the id is empty.
    IdMismatch { key: ItemId, id: ItemId },
    /// `child.parent` names a collection that does not exist.
    DanglingParent { child: ItemId, parent: ItemId },
    /// `child.parent` is set but the parent does not list it.
    MissingChildLink { child: ItemId, parent: ItemId },
    /// A children entry is unknown, duplicated, or does not point back.
    StrayChildLink { parent: ItemId, child: ItemId },
    /// Following parent links revisits `id`.
    Cycle { id: ItemId },
}

impl Display for TreeInvariantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdMismatch { key, id } => {
                write!(f, "collection stored under `{key}` carries id `{id}`")
            }
            Self::DanglingParent { child, parent } => {
                write!(f, "collection {child} points to missing parent {parent}")
            }
            Self::MissingChildLink { child, parent } => {
                write!(f, "collection {parent} does not list child {child}")
            }
            Self::StrayChildLink { parent, child } => {
                write!(f, "collection {parent} lists stray child {child}")
            }
            Self::Cycle { id } => write!(f, "collection {id} is its own ancestor"),
        }
    }
}

impl std::error::Error for TreeInvariantError {}

/// Id-indexed arena of collections.
#[derive(Debug, Default)]
pub struct CollectionTree {
    nodes: HashMap<ItemId, Collection>,
}

impl CollectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from loaded collections and validates every link.
    pub fn from_collections(
        collections: impl IntoIterator<Item = Collection>,
    ) -> Result<Self, TreeInvariantError> {
        let nodes = collections
            .into_iter()
            .map(|collection| (collection.item.id.clone(), collection))
            .collect();
        let tree = Self { nodes };
        tree.check_invariants()?;
        Ok(tree)
    }

    pub fn get(&self, id: &str) -> Option<&Collection> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.nodes.values()
    }

    /// Plans one store request.
    ///
    /// Returns the id the collection is stored under and the edits to commit.
    ///
    /// # Errors
    /// - `NotFound` when `inherit` names a missing collection on create.
    /// - `Validation` for blank names, strict unresolved parents and cycles.
    pub fn plan_store(
        &self,
        request: &CollectionStoreRequest,
        now: DateTime<Utc>,
    ) -> LibraryResult<(ItemId, TreeChange)> {
        let existing = if request.is_create() {
            None
        } else {
            self.nodes.get(request.id.as_str())
        };

        let mut node = match request.inherit.as_deref() {
            Some(source_id) if request.is_create() => {
                let source = self
                    .nodes
                    .get(source_id)
                    .ok_or_else(|| LibraryError::not_found(ItemKind::Collection, source_id))?;
                let mut copy = source.clone();
                copy.item.id.clear();
                copy.children.clear();
                copy
            }
            _ => Collection {
                item: Item {
                    id: ItemId::new(),
                    name: String::new(),
                    description: String::new(),
                    modified: now,
                },
                parent: None,
                children: Vec::new(),
            },
        };

        if let Some(name) = &request.name {
            node.item.name = name.clone();
        }
        if let Some(description) = &request.description {
            node.item.description = description.clone();
        }
        if node.item.name.trim().is_empty() {
            return Err(ValidationError::BlankName(ItemKind::Collection).into());
        }

        let id = if request.is_create() {
            self.fresh_id()
        } else {
            request.id.clone()
        };
        let new_parent = self.resolve_parent(request.parent.as_str(), request.parent_policy)?;
        if let Some(parent) = &new_parent {
            if self.is_self_or_descendant(parent, &id) {
                return Err(ValidationError::CycleDetected {
                    id,
                    parent: parent.clone(),
                }
                .into());
            }
        }

        // Stored children are authoritative; the submitted list is dropped.
        node.children = existing
            .map(|stored| stored.children.clone())
            .unwrap_or_default();
        node.item.id = id.clone();
        node.item.modified = now;

        let previous_parent = existing.and_then(|stored| stored.parent.clone());
        let mut staging = Staging::new(self);
        if previous_parent != new_parent {
            if let Some(former) = &previous_parent {
                staging.detach(former, &id);
            }
        }
        if let Some(parent) = &new_parent {
            staging.attach(parent, &id);
        }
        node.parent = new_parent;
        staging.put(node);

        Ok((id, staging.finish(Vec::new())))
    }

    /// Plans deletion of one collection.
    ///
    /// Returns the removed collection, already detached, and the edits to commit.
    /// Children of the removed collection become roots.
    pub fn plan_delete(&self, id: &str) -> LibraryResult<(Collection, TreeChange)> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| LibraryError::not_found(ItemKind::Collection, id))?;

        let mut staging = Staging::new(self);
        if let Some(parent) = &node.parent {
            staging.detach(parent, id);
        }
        for child in &node.children {
            if let Some(child_node) = staging.node_mut(child) {
                child_node.parent = None;
            }
        }

        let mut removed = node.clone();
        removed.parent = None;
        removed.children.clear();
        Ok((removed, staging.finish(vec![id.to_string()])))
    }

    /// Applies a committed change.
    pub fn apply(&mut self, change: TreeChange) {
        for node in change.upserts {
            self.nodes.insert(node.item.id.clone(), node);
        }
        for id in change.removals {
            self.nodes.remove(id.as_str());
        }
    }

    /// Verifies id, link and acyclicity invariants over the whole arena.
    pub fn check_invariants(&self) -> Result<(), TreeInvariantError> {
        for (key, node) in &self.nodes {
            if key.is_empty() || *key != node.item.id {
                return Err(TreeInvariantError::IdMismatch {
                    key: key.clone(),
                    id: node.item.id.clone(),
                });
            }

            if let Some(parent_id) = &node.parent {
                let parent = self.nodes.get(parent_id).ok_or_else(|| {
                    TreeInvariantError::DanglingParent {
                        child: key.clone(),
                        parent: parent_id.clone(),
                    }
                })?;
                if !parent.children.contains(key) {
                    return Err(TreeInvariantError::MissingChildLink {
                        child: key.clone(),
                        parent: parent_id.clone(),
                    });
                }
            }

            let mut seen = HashSet::new();
            for child_id in &node.children {
                let points_back = self
                    .nodes
                    .get(child_id)
                    .is_some_and(|child| child.parent.as_deref() == Some(key.as_str()));
                if !points_back || !seen.insert(child_id) {
                    return Err(TreeInvariantError::StrayChildLink {
                        parent: key.clone(),
                        child: child_id.clone(),
                    });
                }
            }
        }

        for id in self.nodes.keys() {
            if self.has_cycle_from(id) {
                return Err(TreeInvariantError::Cycle { id: id.clone() });
            }
        }
        Ok(())
    }

    fn resolve_parent(
        &self,
        parent: &str,
        policy: ParentPolicy,
    ) -> Result<Option<ItemId>, ValidationError> {
        if parent.is_empty() {
            return Ok(None);
        }
        if self.nodes.contains_key(parent) {
            return Ok(Some(parent.to_string()));
        }
        match policy {
            ParentPolicy::Lenient => Ok(None),
            ParentPolicy::Strict => Err(ValidationError::ParentNotFound(parent.to_string())),
        }
    }

    /// Returns whether `candidate` is `id` or lies below it.
    fn is_self_or_descendant(&self, candidate: &str, id: &str) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == id {
                return true;
            }
            if !visited.insert(current) {
                return true;
            }
            cursor = self
                .nodes
                .get(current)
                .and_then(|node| node.parent.as_deref());
        }
        false
    }

    fn has_cycle_from(&self, start: &str) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(start);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return true;
            }
            cursor = self
                .nodes
                .get(current)
                .and_then(|node| node.parent.as_deref());
        }
        false
    }

    fn fresh_id(&self) -> ItemId {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.nodes.contains_key(id.as_str()) {
                return id;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_unchecked(&mut self, node: Collection) {
        self.nodes.insert(node.item.id.clone(), node);
    }
}

/// Copy-on-touch view used while planning one change.
struct Staging<'a> {
    tree: &'a CollectionTree,
    staged: HashMap<ItemId, Collection>,
    order: Vec<ItemId>,
}

impl<'a> Staging<'a> {
    fn new(tree: &'a CollectionTree) -> Self {
        Self {
            tree,
            staged: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut Collection> {
        if !self.staged.contains_key(id) {
            let node = self.tree.get(id)?.clone();
            self.order.push(id.to_string());
            self.staged.insert(id.to_string(), node);
        }
        self.staged.get_mut(id)
    }

    fn put(&mut self, node: Collection) {
        let id = node.item.id.clone();
        if !self.staged.contains_key(id.as_str()) {
            self.order.push(id.clone());
        }
        self.staged.insert(id, node);
    }

    /// Appends `child` to `parent.children` unless already listed.
    fn attach(&mut self, parent: &str, child: &str) {
        if let Some(node) = self.node_mut(parent) {
            if !node.children.iter().any(|id| id == child) {
                node.children.push(child.to_string());
            }
        }
    }

    /// Removes exactly one `child` entry from `parent.children`.
    fn detach(&mut self, parent: &str, child: &str) {
        if let Some(node) = self.node_mut(parent) {
            if let Some(index) = node.children.iter().position(|id| id == child) {
                node.children.remove(index);
            }
        }
    }

    fn finish(self, removals: Vec<ItemId>) -> TreeChange {
        let Staging {
            mut staged, order, ..
        } = self;
        let upserts = order
            .iter()
            .filter_map(|id| staged.remove(id.as_str()))
            .collect();
        TreeChange { upserts, removals }
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectionTree, TreeInvariantError};
    use crate::library::error::{LibraryError, ValidationError};
    use crate::model::collection::{Collection, CollectionStoreRequest};
    use chrono::Utc;

    fn store(tree: &mut CollectionTree, request: CollectionStoreRequest) -> String {
        let (id, change) = tree.plan_store(&request, Utc::now()).unwrap();
        tree.apply(change);
        id
    }

    #[test]
    fn plan_store_does_not_touch_arena_until_applied() {
        let mut tree = CollectionTree::new();
        let root = store(&mut tree, CollectionStoreRequest::new("Root"));

        let (child, change) = tree
            .plan_store(
                &CollectionStoreRequest::new("Child").with_parent(root.as_str()),
                Utc::now(),
            )
            .unwrap();
        assert!(!tree.contains(&child));
        assert!(tree.get(&root).unwrap().children.is_empty());

        assert_eq!(change.upserts.len(), 2);
        tree.apply(change);
        assert_eq!(tree.get(&root).unwrap().children, vec![child]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn restoring_same_parent_keeps_single_entry_and_position() {
        let mut tree = CollectionTree::new();
        let root = store(&mut tree, CollectionStoreRequest::new("Root"));
        let first = store(
            &mut tree,
            CollectionStoreRequest::new("First").with_parent(root.as_str()),
        );
        let second = store(
            &mut tree,
            CollectionStoreRequest::new("Second").with_parent(root.as_str()),
        );

        store(
            &mut tree,
            CollectionStoreRequest::update(first.as_str(), "First renamed")
                .with_parent(root.as_str()),
        );

        assert_eq!(tree.get(&root).unwrap().children, vec![first, second]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn self_parent_is_rejected_as_cycle() {
        let mut tree = CollectionTree::new();
        let node = store(&mut tree, CollectionStoreRequest::new("Loop"));

        let err = tree
            .plan_store(
                &CollectionStoreRequest::update(node.as_str(), "Loop").with_parent(node.as_str()),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Validation(ValidationError::CycleDetected { ref id, ref parent })
                if *id == node && *parent == node
        ));
    }

    #[test]
    fn plan_delete_orphans_children_and_detaches_from_parent() {
        let mut tree = CollectionTree::new();
        let root = store(&mut tree, CollectionStoreRequest::new("Root"));
        let middle = store(
            &mut tree,
            CollectionStoreRequest::new("Middle").with_parent(root.as_str()),
        );
        let leaf = store(
            &mut tree,
            CollectionStoreRequest::new("Leaf").with_parent(middle.as_str()),
        );

        let (removed, change) = tree.plan_delete(&middle).unwrap();
        assert!(removed.parent.is_none());
        assert!(removed.children.is_empty());
        tree.apply(change);

        assert!(!tree.contains(&middle));
        assert!(tree.get(&root).unwrap().children.is_empty());
        assert!(tree.get(&leaf).unwrap().parent.is_none());
        tree.check_invariants().unwrap();
    }

    #[test]
    fn check_invariants_reports_missing_back_link() {
        let mut tree = CollectionTree::new();
        let mut parent = Collection::new("Parent");
        parent.item.id = "p".to_string();
        let mut child = Collection::new("Child");
        child.item.id = "c".to_string();
        child.parent = Some("p".to_string());
        tree.insert_unchecked(parent);
        tree.insert_unchecked(child);

        assert_eq!(
            tree.check_invariants(),
            Err(TreeInvariantError::MissingChildLink {
                child: "c".to_string(),
                parent: "p".to_string(),
            })
        );
    }

    #[test]
    fn check_invariants_reports_cycle() {
        let mut tree = CollectionTree::new();
        let mut a = Collection::new("A");
        a.item.id = "a".to_string();
        a.parent = Some("b".to_string());
        a.children = vec!["b".to_string()];
        let mut b = Collection::new("B");
        b.item.id = "b".to_string();
        b.parent = Some("a".to_string());
        b.children = vec!["a".to_string()];
        tree.insert_unchecked(a);
        tree.insert_unchecked(b);

        assert!(matches!(
            tree.check_invariants(),
            Err(TreeInvariantError::Cycle { .. })
        ));
    }
}
