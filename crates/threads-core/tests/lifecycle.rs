//! End-to-end flows through a real store on disk: every test builds its
//! document through the public operations and asserts on what lands in the
//! file.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use threads_core::criteria::BatchAction;
use threads_core::model::{Status, Temperature};
use threads_core::ops::{
    self, BatchRequest, ContainerPatch, DependencyMeta, NewContainer, NewThread, OpError,
    RefChange, StrategyArg,
};
use threads_core::store::{Store, StoreError};
use threads_core::views;

fn store() -> (TempDir, Store) {
    let home = TempDir::new().expect("temp dir");
    let store = Store::at(home.path());
    (home, store)
}

fn new_thread(store: &Store, name: &str) -> threads_core::model::Thread {
    ops::create_thread(
        store,
        NewThread {
            name: name.to_string(),
            ..NewThread::default()
        },
    )
    .expect("create thread")
}

fn new_container(store: &Store, name: &str, parent: Option<&str>) -> threads_core::model::Container {
    ops::create_container(
        store,
        NewContainer {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            ..NewContainer::default()
        },
    )
    .expect("create container")
}

#[test]
fn every_save_backs_up_the_previous_document() {
    let (_home, store) = store();
    new_thread(&store, "First");
    new_thread(&store, "Second");

    let backup = std::fs::read_to_string(store.backup_path()).expect("backup file");
    let backup: serde_json::Value = serde_json::from_str(&backup).expect("backup json");
    let names: Vec<&str> = backup["threads"]
        .as_array()
        .expect("threads array")
        .iter()
        .map(|thread| thread["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["First"]);

    let doc = store.load().expect("load");
    assert_eq!(doc.threads.len(), 2);
}

#[test]
fn corrupt_document_is_an_error_not_a_reset() {
    let (_home, store) = store();
    std::fs::write(store.data_path(), b"{ not json").expect("write garbage");

    let err = ops::create_thread(
        &store,
        NewThread {
            name: "Doomed".to_string(),
            ..NewThread::default()
        },
    )
    .expect_err("corrupt file must refuse writes");
    assert!(matches!(err, OpError::Store(StoreError::Parse { .. })));

    let raw = std::fs::read(store.data_path()).expect("read back");
    assert_eq!(raw, b"{ not json");
}

#[test]
fn config_can_relocate_the_data_file() {
    let home = TempDir::new().expect("temp dir");
    std::fs::write(home.path().join("config.toml"), "data_file = \"work.json\"\n")
        .expect("write config");
    let store = Store::at(home.path());
    new_thread(&store, "Relocated");

    assert!(home.path().join("work.json").exists());
    assert!(!home.path().join("threads.json").exists());
}

#[test]
fn cascade_removes_descendants_before_the_node() {
    let (_home, store) = store();
    let top = new_container(&store, "Box", None);
    let mid = ops::create_thread(
        &store,
        NewThread {
            name: "Mid".to_string(),
            parent: Some(top.id.clone()),
            ..NewThread::default()
        },
    )
    .expect("mid");
    ops::create_thread(
        &store,
        NewThread {
            name: "Deep".to_string(),
            parent: Some(mid.id.clone()),
            ..NewThread::default()
        },
    )
    .expect("deep");

    let plan = ops::plan_entity_delete(&store, "Box", Some(&StrategyArg::Cascade)).expect("plan");
    let order: Vec<&str> = plan.removed.iter().map(|target| target.name.as_str()).collect();
    assert_eq!(order, vec!["Deep", "Mid", "Box"]);

    ops::apply_entity_delete(&store, "Box", Some(&StrategyArg::Cascade)).expect("apply");
    let doc = store.load().expect("load");
    assert!(doc.threads.is_empty());
    assert!(doc.containers.is_empty());
}

#[test]
fn orphan_promotes_children_to_the_grandparent() {
    let (_home, store) = store();
    let grandparent = new_container(&store, "Grandparent", None);
    let middle = new_container(&store, "Middle", Some(&grandparent.id));
    let child = ops::create_thread(
        &store,
        NewThread {
            name: "Child".to_string(),
            parent: Some(middle.id.clone()),
            ..NewThread::default()
        },
    )
    .expect("child");

    ops::apply_entity_delete(&store, "Middle", Some(&StrategyArg::Orphan)).expect("orphan");

    let doc = store.load().expect("load");
    assert!(doc.container(&middle.id).is_none());
    let child = doc.thread(&child.id).expect("child survives");
    assert_eq!(child.parent_id.as_deref(), Some(grandparent.id.as_str()));
}

#[test]
fn merge_unions_tags_and_prefers_target_dependencies() {
    let (_home, store) = store();
    let dep = new_thread(&store, "Shared dep");
    let source = ops::create_thread(
        &store,
        NewThread {
            name: "Source".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
            ..NewThread::default()
        },
    )
    .expect("source");
    let target = ops::create_thread(
        &store,
        NewThread {
            name: "Target".to_string(),
            tags: vec!["b".to_string(), "c".to_string()],
            ..NewThread::default()
        },
    )
    .expect("target");
    ops::add_dependency(
        &store,
        &source.id,
        &dep.id,
        DependencyMeta {
            why: Some("source reason".to_string()),
            ..DependencyMeta::default()
        },
    )
    .expect("source dep");
    ops::add_dependency(
        &store,
        &target.id,
        &dep.id,
        DependencyMeta {
            why: Some("target reason".to_string()),
            ..DependencyMeta::default()
        },
    )
    .expect("target dep");

    ops::apply_merge_op(&store, "Source", "Target", false).expect("merge");

    let doc = store.load().expect("load");
    let merged = doc.thread(&target.id).expect("target");
    let mut tags = merged.tags.clone();
    tags.sort();
    assert_eq!(tags, vec!["a", "b", "c"]);
    assert_eq!(merged.dependencies.len(), 1);
    assert_eq!(merged.dependencies[0].thread_id, dep.id);
    assert_eq!(merged.dependencies[0].why.as_deref(), Some("target reason"));

    let archived = doc.thread(&source.id).expect("source kept in storage");
    assert_eq!(archived.status, Status::Archived);
}

#[test]
fn batch_importance_filter_selects_bounds() {
    let (_home, store) = store();
    for importance in 1..=5u8 {
        ops::create_thread(
            &store,
            NewThread {
                name: format!("Thread {importance}"),
                importance: Some(importance),
                ..NewThread::default()
            },
        )
        .expect("thread");
    }

    let at_least = BatchRequest {
        importance: Some("4+".to_string()),
        ..BatchRequest::default()
    };
    let report = ops::run_batch(&store, &at_least, &BatchAction::Archive, true).expect("4+");
    assert_eq!(report.matched, 2);

    let at_most = BatchRequest {
        importance: Some("3-".to_string()),
        ..BatchRequest::default()
    };
    let report = ops::run_batch(&store, &at_most, &BatchAction::Archive, true).expect("3-");
    assert_eq!(report.matched, 3);
}

#[test]
fn dry_run_leaves_the_document_untouched() {
    let (_home, store) = store();
    new_thread(&store, "Alpha");
    new_thread(&store, "Beta");
    let before = std::fs::read(store.data_path()).expect("before");

    let report = ops::run_batch(
        &store,
        &BatchRequest::default(),
        &BatchAction::Archive,
        true,
    )
    .expect("dry run");
    assert_eq!(report.matched, 2);
    assert_eq!(report.changed, 2);

    let after = std::fs::read(store.data_path()).expect("after");
    assert_eq!(before, after);
}

#[test]
fn next_ranks_important_hot_above_frozen_trivial() {
    let (_home, store) = store();
    let strong = ops::create_thread(
        &store,
        NewThread {
            name: "Strong".to_string(),
            importance: Some(5),
            temperature: Some(Temperature::Hot),
            ..NewThread::default()
        },
    )
    .expect("strong");
    ops::create_thread(
        &store,
        NewThread {
            name: "Weak".to_string(),
            importance: Some(1),
            temperature: Some(Temperature::Frozen),
            ..NewThread::default()
        },
    )
    .expect("weak");

    let doc = store.load().expect("load");
    let next = views::next_threads(&doc, 5, chrono::Utc::now());
    assert_eq!(next.len(), 2);
    assert_eq!(next[0].id, strong.id);
    assert!(next[0].score > next[1].score);
}

#[test]
fn delete_scrubs_dependencies_on_survivors() {
    let (_home, store) = store();
    let gone = new_thread(&store, "Gone");
    let survivor = new_thread(&store, "Survivor");
    ops::add_dependency(&store, &survivor.id, &gone.id, DependencyMeta::default())
        .expect("dependency");

    let plan = ops::apply_entity_delete(&store, &gone.id, None).expect("delete leaf");
    assert_eq!(plan.dependencies_scrubbed, 1);

    let doc = store.load().expect("load");
    let survivor = doc.thread(&survivor.id).expect("survivor");
    assert!(survivor.dependencies.is_empty());
}

#[test]
fn group_change_cascades_to_descendants() {
    let (_home, store) = store();
    ops::create_group(&store, "Bucket", None).expect("group");
    let top = new_container(&store, "Box", None);
    let child = ops::create_thread(
        &store,
        NewThread {
            name: "Inside".to_string(),
            parent: Some(top.id.clone()),
            ..NewThread::default()
        },
    )
    .expect("inside");

    ops::update_container(
        &store,
        "Box",
        ContainerPatch {
            group: Some(RefChange::Set("Bucket".to_string())),
            ..ContainerPatch::default()
        },
    )
    .expect("regroup");

    let doc = store.load().expect("load");
    let bucket = doc.groups[0].id.clone();
    assert_eq!(
        doc.container(&top.id).expect("box").group_id.as_deref(),
        Some(bucket.as_str())
    );
    assert_eq!(
        doc.thread(&child.id).expect("inside").group_id.as_deref(),
        Some(bucket.as_str())
    );
}

#[test]
fn cycle_guard_rejects_reparenting_into_a_descendant() {
    let (_home, store) = store();
    let top = new_container(&store, "Top", None);
    let child = ops::create_thread(
        &store,
        NewThread {
            name: "Child".to_string(),
            parent: Some(top.id.clone()),
            ..NewThread::default()
        },
    )
    .expect("child");

    let err = ops::update_container(
        &store,
        &top.id,
        ContainerPatch {
            parent: Some(RefChange::Set(child.id.clone())),
            ..ContainerPatch::default()
        },
    )
    .expect_err("cycle must be rejected");
    assert!(matches!(err, OpError::ParentCycle { .. }));
}

#[test]
fn group_delete_clears_membership() {
    let (_home, store) = store();
    let group = ops::create_group(&store, "Season", None).expect("group");
    let member = ops::create_thread(
        &store,
        NewThread {
            name: "Member".to_string(),
            group: Some(group.id.clone()),
            ..NewThread::default()
        },
    )
    .expect("member");

    let plan = ops::apply_group_delete(&store, "Season").expect("delete group");
    assert_eq!(plan.members, 1);

    let doc = store.load().expect("load");
    assert!(doc.groups.is_empty());
    assert!(doc.thread(&member.id).expect("member").group_id.is_none());
}
