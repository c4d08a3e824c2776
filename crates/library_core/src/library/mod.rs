//! Shared library item store.
//!
//! # Responsibility
//! - Own every library item, one map per item kind.
//! - Route collection writes through the tree consistency manager.
//! - Serialize writers per kind and hand out snapshot copies to readers.
//!
//! # Invariants
//! - One store/delete is one critical section under the kind's write lock:
//!   plan, persist, then apply. A failed step leaves state untouched.
//! - Readers never observe a collection between detach and attach.
//! - Lock order is kind lock first, repository lock second.

pub mod error;
pub mod tree;

use crate::model::collection::{Collection, CollectionStoreRequest};
use crate::model::item::{Item, ItemId, ItemKind, LibraryItem};
use crate::query::{query_collections, CollectionListQuery, CollectionPage};
use crate::repo::library_repo::{ItemBatch, ItemRecord, LibraryRepository, RepoError};
use chrono::Utc;
use error::{LibraryError, LibraryResult, ValidationError};
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tree::{CollectionTree, TreeChange, TreeInvariantError};
use uuid::Uuid;

/// In-memory library of dashboard items.
///
/// Share one instance between request handlers, e.g. behind an `Arc`.
pub struct Library {
    collections: RwLock<CollectionTree>,
    graphs: RwLock<HashMap<ItemId, Item>>,
    repository: Option<Mutex<Box<dyn LibraryRepository>>>,
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl Library {
    /// Creates an empty, memory-only library.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(CollectionTree::new()),
            graphs: RwLock::new(HashMap::new()),
            repository: None,
        }
    }

    /// Creates a library backed by `repository`.
    ///
    /// Stored items are loaded first; every later commit is written through.
    ///
    /// # Errors
    /// - `Io` when loading fails or the stored collection tree is inconsistent.
    pub fn with_repository(repository: impl LibraryRepository + 'static) -> LibraryResult<Self> {
        let collections = repository
            .load_items(ItemKind::Collection)?
            .into_iter()
            .map(ItemRecord::into_collection);
        let tree = CollectionTree::from_collections(collections)
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;

        let graphs: HashMap<ItemId, Item> = repository
            .load_items(ItemKind::Graph)?
            .into_iter()
            .map(|record| (record.item.id.clone(), record.item))
            .collect();

        info!(
            "event=library_load module=library status=ok collections={} graphs={}",
            tree.len(),
            graphs.len()
        );

        Ok(Self {
            collections: RwLock::new(tree),
            graphs: RwLock::new(graphs),
            repository: Some(Mutex::new(Box::new(repository))),
        })
    }

    /// Returns one item by id and kind.
    pub fn get_item(&self, id: &str, kind: ItemKind) -> LibraryResult<LibraryItem> {
        match kind {
            ItemKind::Collection => self.get_collection(id).map(LibraryItem::Collection),
            ItemKind::Graph => self.get_graph(id).map(LibraryItem::Graph),
        }
    }

    /// Stores one item, assigning an id when it has none.
    ///
    /// Collections are stored with their `parent` as the submitted parent id;
    /// their `children` are ignored.
    pub fn store_item(&self, item: LibraryItem) -> LibraryResult<ItemId> {
        match item {
            LibraryItem::Collection(collection) => self.store_collection(collection.into()),
            LibraryItem::Graph(graph) => self.store_graph(graph),
        }
    }

    /// Deletes one item by id and kind.
    pub fn delete_item(&self, id: &str, kind: ItemKind) -> LibraryResult<()> {
        match kind {
            ItemKind::Collection => self.delete_collection(id).map(|_| ()),
            ItemKind::Graph => self.delete_graph(id),
        }
    }

    /// Returns a snapshot of every item of one kind, in no particular order.
    pub fn list_items(&self, kind: ItemKind) -> Vec<LibraryItem> {
        match kind {
            ItemKind::Collection => self
                .collections
                .read()
                .iter()
                .cloned()
                .map(LibraryItem::Collection)
                .collect(),
            ItemKind::Graph => self
                .graphs
                .read()
                .values()
                .cloned()
                .map(LibraryItem::Graph)
                .collect(),
        }
    }

    pub fn len(&self, kind: ItemKind) -> usize {
        match kind {
            ItemKind::Collection => self.collections.read().len(),
            ItemKind::Graph => self.graphs.read().len(),
        }
    }

    pub fn is_empty(&self, kind: ItemKind) -> bool {
        self.len(kind) == 0
    }

    pub fn get_collection(&self, id: &str) -> LibraryResult<Collection> {
        self.collections
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::not_found(ItemKind::Collection, id))
    }

    /// Creates or updates one collection and relinks the tree.
    ///
    /// # Contract
    /// - Empty `request.id` creates; `inherit` then seeds fields from a source.
    /// - Stored children are kept; `request.children` is discarded.
    /// - The collection moves under `request.parent` or becomes a root.
    ///
    /// # Errors
    /// - `NotFound` for a missing `inherit` source.
    /// - `Validation` for blank names, cycles and strict unresolved parents.
    /// - `Io` when the repository rejects the commit.
    pub fn store_collection(&self, request: CollectionStoreRequest) -> LibraryResult<ItemId> {
        let mut tree = self.collections.write();
        let (id, change) = tree.plan_store(&request, Utc::now())?;
        self.persist(collection_batch(&change))?;

        let parent = change
            .upserts
            .iter()
            .find(|node| node.item.id == id)
            .and_then(|node| node.parent.clone());
        tree.apply(change);

        debug!(
            "event=item_store module=library status=ok kind=collection id={} created={} parent={}",
            id,
            request.is_create(),
            parent.as_deref().unwrap_or("-")
        );
        Ok(id)
    }

    /// Deletes one collection.
    ///
    /// Returns the removed collection with its links cleared. Its children
    /// become roots; nothing below it is deleted.
    pub fn delete_collection(&self, id: &str) -> LibraryResult<Collection> {
        let mut tree = self.collections.write();
        let (removed, change) = tree.plan_delete(id)?;
        let orphaned = tree.get(id).map_or(0, |node| node.children.len());
        self.persist(collection_batch(&change))?;
        tree.apply(change);

        debug!(
            "event=item_delete module=library status=ok kind=collection id={} orphaned={}",
            id, orphaned
        );
        Ok(removed)
    }

    /// Lists collections through the filter, exclusion and paging pipeline.
    ///
    /// # Errors
    /// - `Validation` when the name filter pattern is invalid.
    pub fn list_collections(&self, query: &CollectionListQuery) -> LibraryResult<CollectionPage> {
        let tree = self.collections.read();
        query_collections(&tree, query)
    }

    /// Re-checks parent/children links and acyclicity of the whole tree.
    pub fn verify_tree(&self) -> Result<(), TreeInvariantError> {
        self.collections.read().check_invariants()
    }

    pub fn get_graph(&self, id: &str) -> LibraryResult<Item> {
        self.graphs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::not_found(ItemKind::Graph, id))
    }

    /// Creates or replaces one graph.
    pub fn store_graph(&self, mut graph: Item) -> LibraryResult<ItemId> {
        if graph.name.trim().is_empty() {
            return Err(ValidationError::BlankName(ItemKind::Graph).into());
        }

        let mut graphs = self.graphs.write();
        let created = graph.id.is_empty();
        if created {
            graph.id = loop {
                let id = Uuid::new_v4().to_string();
                if !graphs.contains_key(id.as_str()) {
                    break id;
                }
            };
        }
        graph.modified = Utc::now();

        let mut batch = ItemBatch::new(ItemKind::Graph);
        batch.upserts.push(ItemRecord::from_graph(&graph));
        self.persist(batch)?;

        let id = graph.id.clone();
        graphs.insert(id.clone(), graph);
        debug!(
            "event=item_store module=library status=ok kind=graph id={} created={}",
            id, created
        );
        Ok(id)
    }

    fn delete_graph(&self, id: &str) -> LibraryResult<()> {
        let mut graphs = self.graphs.write();
        if !graphs.contains_key(id) {
            return Err(LibraryError::not_found(ItemKind::Graph, id));
        }

        let mut batch = ItemBatch::new(ItemKind::Graph);
        batch.removals.push(id.to_string());
        self.persist(batch)?;

        graphs.remove(id);
        debug!("event=item_delete module=library status=ok kind=graph id={id}");
        Ok(())
    }

    fn persist(&self, batch: ItemBatch) -> LibraryResult<()> {
        let Some(repository) = &self.repository else {
            return Ok(());
        };
        repository.lock().commit(&batch).map_err(|err| {
            error!(
                "event=item_commit module=library status=error kind={} upserts={} removals={} error_code=persist_failed error={}",
                batch.kind,
                batch.upserts.len(),
                batch.removals.len(),
                err
            );
            LibraryError::Io(err)
        })
    }
}

fn collection_batch(change: &TreeChange) -> ItemBatch {
    ItemBatch {
        kind: ItemKind::Collection,
        upserts: change
            .upserts
            .iter()
            .map(ItemRecord::from_collection)
            .collect(),
        removals: change.removals.clone(),
    }
}
