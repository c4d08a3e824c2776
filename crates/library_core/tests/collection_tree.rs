use library_core::{
    Collection, CollectionStoreRequest, ItemKind, Library, LibraryError, LibraryItem,
    ValidationError,
};

fn create(library: &Library, name: &str, parent: &str) -> String {
    library
        .store_collection(CollectionStoreRequest::new(name).with_parent(parent))
        .unwrap()
}

#[test]
fn create_assigns_fresh_id_and_links_parent() {
    let library = Library::new();
    let home = create(&library, "Home", "");
    let team = create(&library, "Team", &home);

    assert!(!home.is_empty());
    assert_ne!(home, team);

    let home_node = library.get_collection(&home).unwrap();
    assert!(home_node.is_root());
    assert_eq!(home_node.children, vec![team.clone()]);
    assert_eq!(library.get_collection(&team).unwrap().parent, Some(home));
    library.verify_tree().unwrap();
}

#[test]
fn store_refreshes_modified_timestamp() {
    let library = Library::new();
    let mut payload = Collection::new("Home");
    payload.item.modified = chrono::DateTime::from_timestamp(0, 0).unwrap();

    let id = library.store_item(LibraryItem::Collection(payload)).unwrap();
    let stored = library.get_collection(&id).unwrap();
    assert!(stored.item.modified.timestamp() > 0);
}

#[test]
fn update_preserves_children_and_ignores_submitted_list() {
    let library = Library::new();
    let parent = create(&library, "Parent", "");
    let a = create(&library, "A", &parent);
    let b = create(&library, "B", &parent);

    library
        .store_collection(
            CollectionStoreRequest::update(parent.as_str(), "Parent renamed")
                .with_description("new description")
                .with_children(vec!["bogus".to_string()]),
        )
        .unwrap();

    let stored = library.get_collection(&parent).unwrap();
    assert_eq!(stored.item.name, "Parent renamed");
    assert_eq!(stored.item.description, "new description");
    assert_eq!(stored.children, vec![a, b]);
    library.verify_tree().unwrap();
}

#[test]
fn reparent_moves_node_between_parents() {
    let library = Library::new();
    let left = create(&library, "Left", "");
    let right = create(&library, "Right", "");
    let sibling = create(&library, "Sibling", &left);
    let moving = create(&library, "Moving", &left);

    library
        .store_collection(
            CollectionStoreRequest::update(moving.as_str(), "Moving").with_parent(right.as_str()),
        )
        .unwrap();

    assert_eq!(library.get_collection(&left).unwrap().children, vec![sibling]);
    assert_eq!(library.get_collection(&right).unwrap().children, vec![moving.clone()]);
    assert_eq!(library.get_collection(&moving).unwrap().parent, Some(right));
    library.verify_tree().unwrap();
}

#[test]
fn empty_or_unknown_parent_detaches_under_lenient_policy() {
    let library = Library::new();
    let root = create(&library, "Root", "");
    let first = create(&library, "First", &root);
    let second = create(&library, "Second", &root);

    library
        .store_collection(CollectionStoreRequest::update(first.as_str(), "First"))
        .unwrap();
    library
        .store_collection(
            CollectionStoreRequest::update(second.as_str(), "Second").with_parent("missing"),
        )
        .unwrap();

    assert!(library.get_collection(&root).unwrap().children.is_empty());
    assert!(library.get_collection(&first).unwrap().is_root());
    assert!(library.get_collection(&second).unwrap().is_root());
    library.verify_tree().unwrap();
}

#[test]
fn strict_policy_rejects_unknown_parent_without_changes() {
    let library = Library::new();
    let err = library
        .store_collection(
            CollectionStoreRequest::new("Orphan")
                .with_parent("missing")
                .strict_parent(),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        LibraryError::Validation(ValidationError::ParentNotFound(ref id)) if id == "missing"
    ));
    assert!(library.is_empty(ItemKind::Collection));
}

#[test]
fn reparent_onto_descendant_is_rejected_and_tree_unchanged() {
    let library = Library::new();
    let a = create(&library, "A", "");
    let b = create(&library, "B", &a);
    let c = create(&library, "C", &b);

    let before: Vec<_> = [&a, &b, &c]
        .iter()
        .map(|id| library.get_collection(id).unwrap())
        .collect();

    let err = library
        .store_collection(CollectionStoreRequest::update(a.as_str(), "A").with_parent(c.as_str()))
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Validation(ValidationError::CycleDetected { ref id, ref parent })
            if *id == a && *parent == c
    ));

    let after: Vec<_> = [&a, &b, &c]
        .iter()
        .map(|id| library.get_collection(id).unwrap())
        .collect();
    assert_eq!(before, after);
    library.verify_tree().unwrap();
}

#[test]
fn inherit_copies_fields_but_not_id_or_children() {
    let library = Library::new();
    let source = library
        .store_collection(CollectionStoreRequest::new("Template").with_description("shared layout"))
        .unwrap();
    create(&library, "Child", &source);

    let copy = library
        .store_collection(CollectionStoreRequest::default().inheriting(source.as_str()))
        .unwrap();

    assert_ne!(copy, source);
    let copied = library.get_collection(&copy).unwrap();
    assert_eq!(copied.item.name, "Template");
    assert_eq!(copied.item.description, "shared layout");
    assert!(copied.children.is_empty());
    assert_eq!(library.get_collection(&source).unwrap().children.len(), 1);
}

#[test]
fn inherit_from_missing_source_is_not_found() {
    let library = Library::new();
    let err = library
        .store_collection(CollectionStoreRequest::new("Copy").inheriting("missing"))
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::NotFound {
            kind: ItemKind::Collection,
            ref id
        } if id == "missing"
    ));
}

#[test]
fn store_with_unknown_id_upserts() {
    let library = Library::new();
    let id = library
        .store_collection(CollectionStoreRequest::update("fixed-id", "Pinned"))
        .unwrap();
    assert_eq!(id, "fixed-id");
    assert_eq!(library.get_collection("fixed-id").unwrap().item.name, "Pinned");
}

#[test]
fn blank_name_is_rejected() {
    let library = Library::new();
    let err = library
        .store_collection(CollectionStoreRequest::new("   "))
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Validation(ValidationError::BlankName(ItemKind::Collection))
    ));
}

#[test]
fn delete_detaches_from_parent_and_orphans_children() {
    let library = Library::new();
    let root = create(&library, "Root", "");
    let keep = create(&library, "Keep", &root);
    let doomed = create(&library, "Doomed", &root);
    let grandchild = create(&library, "Grandchild", &doomed);

    let removed = library.delete_collection(&doomed).unwrap();
    assert!(removed.parent.is_none());
    assert!(removed.children.is_empty());

    assert!(library.get_collection(&doomed).unwrap_err().is_not_found());
    assert_eq!(library.get_collection(&root).unwrap().children, vec![keep]);
    assert!(library.get_collection(&grandchild).unwrap().is_root());
    library.verify_tree().unwrap();
}

#[test]
fn delete_missing_collection_is_not_found() {
    let library = Library::new();
    let err = library
        .delete_item("missing", ItemKind::Collection)
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn deleted_ids_are_not_reused() {
    let library = Library::new();
    let mut seen = std::collections::HashSet::new();
    for round in 0..50 {
        let id = create(&library, &format!("Item {round}"), "");
        assert!(seen.insert(id.clone()));
        library.delete_item(&id, ItemKind::Collection).unwrap();
    }
}

#[test]
fn list_items_returns_detached_snapshots() {
    let library = Library::new();
    let root = create(&library, "Root", "");
    create(&library, "Child", &root);

    let mut snapshot = library.list_items(ItemKind::Collection);
    for item in &mut snapshot {
        if let LibraryItem::Collection(collection) = item {
            collection.children.clear();
            collection.parent = None;
        }
    }

    assert_eq!(library.get_collection(&root).unwrap().children.len(), 1);
    library.verify_tree().unwrap();
}

#[test]
fn invariants_hold_across_mixed_operations() {
    let library = Library::new();
    let mut ids: Vec<String> = Vec::new();
    for index in 0..20 {
        let parent = if index == 0 {
            String::new()
        } else {
            ids[(index * 7) % ids.len()].clone()
        };
        ids.push(create(&library, &format!("Node {index}"), &parent));
    }

    for (step, id) in ids.clone().iter().enumerate() {
        let target = ids[(step * 3 + 1) % ids.len()].clone();
        let result = library.store_collection(
            CollectionStoreRequest::update(id.as_str(), format!("Node {step}")).with_parent(target),
        );
        if let Err(err) = result {
            assert!(matches!(
                err,
                LibraryError::Validation(ValidationError::CycleDetected { .. })
            ));
        }
        library.verify_tree().unwrap();
    }

    for id in ids.iter().step_by(3) {
        library.delete_collection(id).unwrap();
        library.verify_tree().unwrap();
    }
}
