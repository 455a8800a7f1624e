use std::fs;

use chrono::{Duration, TimeZone, Utc};
use hashtodo_core::datastore::{DataStore, TaskPersistence, decode_tasks};
use hashtodo_core::filter::{ViewCategory, filter};
use hashtodo_core::notifier::Notifier;
use hashtodo_core::store::{COMPLETED_CLEARED_MESSAGE, TaskStore};
use tempfile::tempdir;

#[test]
fn tasks_survive_a_restart() {
    let temp = tempdir().expect("tempdir");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let (milk, dog) = {
        let datastore = DataStore::open(temp.path(), "tasks").expect("open datastore");
        let mut store = TaskStore::load(datastore, Notifier::default());
        let milk = store.add("Buy milk", now).expect("add milk");
        let dog = store.add("Walk dog", now).expect("add dog");
        store.toggle(dog.id).expect("toggle dog");
        (milk, dog)
    };

    let datastore = DataStore::open(temp.path(), "tasks").expect("reopen datastore");
    let store = TaskStore::load(datastore, Notifier::default());
    assert_eq!(store.len(), 2);
    assert_eq!(store.tasks()[0], milk);
    assert_eq!(store.tasks()[1].id, dog.id);
    assert!(!store.tasks()[1].active);
}

#[test]
fn snapshot_on_disk_matches_memory_after_each_step() {
    let temp = tempdir().expect("tempdir");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let datastore = DataStore::open(temp.path(), "tasks").expect("open datastore");
    let mut store = TaskStore::load(datastore, Notifier::default());

    let on_disk = |store: &TaskStore<DataStore>| {
        let raw = store
            .persistence()
            .read()
            .expect("read")
            .expect("snapshot present");
        decode_tasks(&raw).expect("decode")
    };

    let a = store.add("a", now).expect("add a");
    assert_eq!(on_disk(&store), store.tasks());
    let b = store.add("b", now).expect("add b");
    store.toggle(a.id).expect("toggle a");
    assert_eq!(on_disk(&store), store.tasks());
    store.delete(b.id).expect("delete b");
    assert_eq!(on_disk(&store), store.tasks());

    assert_eq!(store.delete_completed(now).expect("clear"), 1);
    assert_eq!(on_disk(&store), store.tasks());
    assert!(store.is_empty());
    assert_eq!(
        store.notifier().message_at(now + Duration::milliseconds(500)),
        Some(COMPLETED_CLEARED_MESSAGE)
    );
}

#[test]
fn corrupt_snapshot_starts_empty_and_is_replaced() {
    let temp = tempdir().expect("tempdir");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    fs::write(temp.path().join("tasks.json"), "[{\"id\": 1, \"text\": ").expect("seed file");

    let datastore = DataStore::open(temp.path(), "tasks").expect("open datastore");
    let mut store = TaskStore::load(datastore, Notifier::default());
    assert!(store.is_empty());

    store.add("fresh start", now).expect("add");
    let raw = fs::read_to_string(temp.path().join("tasks.json")).expect("read file");
    let tasks = decode_tasks(&raw).expect("decode");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "fresh start");
}

#[test]
fn snapshot_written_by_the_browser_app_loads() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("tasks.json"),
        r#"[{"id":1740819600000,"text":"Buy milk","active":true},{"id":1740819600123,"text":"Call mom","active":false}]"#,
    )
    .expect("seed file");

    let datastore = DataStore::open(temp.path(), "tasks").expect("open datastore");
    let store = TaskStore::load(datastore, Notifier::default());

    let active = filter(store.tasks(), ViewCategory::Active);
    let completed = filter(store.tasks(), ViewCategory::Completed);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].text, "Buy milk");
    assert_eq!(completed.len(), 1);
    assert!(completed[0].is_checked());
    assert_eq!(filter(store.tasks(), ViewCategory::All).len(), 2);
}

#[test]
fn separate_keys_do_not_share_state() {
    let temp = tempdir().expect("tempdir");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let mut home = TaskStore::load(
        DataStore::open(temp.path(), "home").expect("open home"),
        Notifier::default(),
    );
    home.add("water plants", now).expect("add");

    let work = TaskStore::load(
        DataStore::open(temp.path(), "work").expect("open work"),
        Notifier::default(),
    );
    assert!(work.is_empty());
}
