//! Integration tests for the shared counter cell and its views.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::Semaphore;

use shared_counter::{
    App, CountAction, Error, JsonFileStorage, MemoryStorage, PersistedCell, Phase, ReducerHandle, ReducerView, SimpleView,
    Snapshot, Storage, StorageError, View, count_reducer,
};

/// Memory storage whose loads wait for a permit and are counted.
struct GatedStorage {
    inner: MemoryStorage,
    gate: Semaphore,
    loads: AtomicUsize,
}

impl GatedStorage {
    fn with_value(value: Value) -> Self {
        Self {
            inner: MemoryStorage::with_records([("count", value)]),
            gate: Semaphore::new(0),
            loads: AtomicUsize::new(0),
        }
    }

    fn open(&self) {
        self.gate.add_permits(16);
    }
}

#[async_trait]
impl Storage for GatedStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.inner.set(key, value).await
    }
}

struct ReadOnlyStorage;

#[async_trait]
impl Storage for ReadOnlyStorage {
    async fn get(&self, _key: &str) -> Result<Option<Value>, StorageError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Value) -> Result<(), StorageError> {
        Err(StorageError::Backend("read only".into()))
    }
}

struct BrokenStorage;

#[async_trait]
impl Storage for BrokenStorage {
    async fn get(&self, _key: &str) -> Result<Option<Value>, StorageError> {
        Err(StorageError::Backend("unreachable".into()))
    }

    async fn set(&self, _key: &str, _value: Value) -> Result<(), StorageError> {
        Ok(())
    }
}

async fn ready_cell(initial: i64) -> PersistedCell<i64> {
    let cell = PersistedCell::new("count", initial, Arc::new(MemoryStorage::new()));
    cell.hydrate().await.unwrap();
    cell
}

#[tokio::test]
async fn net_sum_of_steps() {
    let cell = ready_cell(0).await;
    let simple = SimpleView::new(cell.clone());
    let reducer = ReducerView::new(cell.clone());

    let steps = ["inc", "inc", "dec", "inc", "inc", "inc", "dec"];
    let mut expected = 0;
    for (i, step) in steps.iter().enumerate() {
        let view: &dyn View = if i % 2 == 0 { &simple } else { &reducer };
        view.press(step).unwrap();
        expected += if *step == "inc" { 1 } else { -1 };
        assert_eq!(cell.read(), Snapshot::Ready(expected));
    }
    assert_eq!(expected, 3);
}

#[tokio::test]
async fn reads_before_load_share_one_request() {
    let storage = Arc::new(GatedStorage::with_value(json!(12)));
    let cell = PersistedCell::new("count", 0i64, storage.clone());

    for _ in 0..5 {
        assert_eq!(cell.read(), Snapshot::Loading);
    }
    tokio::task::yield_now().await;
    assert_eq!(cell.phase(), Phase::Hydrating);

    let (a, b) = {
        let first = cell.hydrate();
        let second = cell.hydrate();
        storage.open();
        tokio::join!(first, second)
    };
    assert_eq!(a.unwrap(), 12);
    assert_eq!(b.unwrap(), 12);
    assert_eq!(cell.read(), Snapshot::Ready(12));
    assert_eq!(cell.phase(), Phase::Ready);

    // Let the background hydration task finish before counting.
    tokio::task::yield_now().await;
    cell.hydrate().await.unwrap();
    assert_eq!(storage.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn written_value_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let cell = PersistedCell::new("count", 0i64, Arc::new(JsonFileStorage::new(&path)));
    cell.hydrate().await.unwrap();
    cell.set(5).unwrap();
    cell.flush().await;
    drop(cell);

    let fresh = PersistedCell::new("count", 0i64, Arc::new(JsonFileStorage::new(&path)));
    assert_eq!(fresh.hydrate().await.unwrap(), 5);
}

#[tokio::test]
async fn last_write_reaches_storage() {
    let storage = Arc::new(MemoryStorage::new());
    let cell = PersistedCell::new("count", 0i64, storage.clone());
    cell.hydrate().await.unwrap();

    for _ in 0..20 {
        cell.update(|c| c + 1).unwrap();
    }
    cell.flush().await;
    assert_eq!(storage.peek("count"), Some(json!(20)));
}

#[tokio::test]
async fn increment_then_decrement_from_zero() {
    let cell = ready_cell(0).await;
    let handle = ReducerHandle::new(cell.clone(), count_reducer);

    handle.dispatch(CountAction::Increment).unwrap();
    handle.dispatch(CountAction::Decrement).unwrap();
    assert_eq!(cell.read(), Snapshot::Ready(0));
}

#[tokio::test]
async fn reset_tag_is_an_error() {
    let storage = Arc::new(MemoryStorage::new());
    let cell = PersistedCell::new("count", 0i64, storage.clone());
    cell.hydrate().await.unwrap();
    let reducer = ReducerView::new(cell.clone());

    reducer.press("inc").unwrap();
    cell.flush().await;

    let err = reducer.press("reset").unwrap_err();
    assert!(matches!(err, Error::UnknownAction(ref tag) if tag == "reset"));
    assert!(serde_json::from_value::<CountAction>(json!({ "type": "reset" })).is_err());

    cell.flush().await;
    assert_eq!(cell.read(), Snapshot::Ready(1));
    assert_eq!(storage.peek("count"), Some(json!(1)));
}

#[tokio::test]
async fn views_never_diverge() {
    let cell = ready_cell(0).await;
    let simple = SimpleView::new(cell.clone());
    let reducer = ReducerView::new(cell.clone());
    let mut rx = cell.subscribe();

    simple.press("inc").unwrap();
    assert_eq!(simple.snapshot(), reducer.snapshot());
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), Snapshot::Ready(1));

    reducer.press("dec").unwrap();
    reducer.press("dec").unwrap();
    assert_eq!(simple.snapshot(), Snapshot::Ready(-1));
    assert_eq!(simple.snapshot(), reducer.snapshot());
}

#[tokio::test]
async fn stored_value_survives_early_write() {
    let storage = Arc::new(GatedStorage::with_value(json!(100)));
    let cell = PersistedCell::new("count", 0i64, storage.clone());

    assert_eq!(cell.read(), Snapshot::Loading);
    tokio::task::yield_now().await;

    let err = cell.update(|c| c + 1).unwrap_err();
    assert!(matches!(err, Error::NotHydrated { ref key } if key == "count"));
    assert!(SimpleView::new(cell.clone()).press("inc").is_err());
    assert!(ReducerView::new(cell.clone()).press("inc").is_err());

    storage.open();
    assert_eq!(cell.hydrate().await.unwrap(), 100);
    cell.flush().await;
    assert_eq!(cell.read(), Snapshot::Ready(100));
    assert_eq!(storage.inner.peek("count"), Some(json!(100)));

    assert_eq!(cell.update(|c| c + 1).unwrap(), 101);
    cell.flush().await;
    assert_eq!(storage.inner.peek("count"), Some(json!(101)));
}

/// Counter value that takes a while to encode when it is 1.
#[derive(Clone, Debug, PartialEq, Deserialize)]
struct Slow(i64);

impl Serialize for Slow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 == 1 {
            std::thread::sleep(Duration::from_millis(200));
        }
        serializer.serialize_i64(self.0)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_writers_store_the_final_value() {
    let storage = Arc::new(MemoryStorage::new());
    let cell = PersistedCell::new("count", Slow(0), storage.clone());
    cell.hydrate().await.unwrap();

    let slow = tokio::spawn({
        let cell = cell.clone();
        async move { cell.set(Slow(1)).unwrap() }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cell.set(Slow(2)).unwrap();
    slow.await.unwrap();
    cell.flush().await;

    assert_eq!(cell.read(), Snapshot::Ready(Slow(2)));
    assert_eq!(storage.peek("count"), Some(json!(2)));
}

#[tokio::test]
async fn app_redraws_when_hydration_lands() {
    let storage = Arc::new(GatedStorage::with_value(json!(7)));
    let cell = PersistedCell::new("count", 0i64, storage.clone());
    let app = App::new(cell.clone())
        .with_view(SimpleView::new(cell.clone()))
        .with_view(ReducerView::new(cell.clone()));

    let (mut client, server) = tokio::io::duplex(256);
    let mut out = Vec::new();
    let driver = async {
        tokio::task::yield_now().await;
        storage.open();
        cell.hydrate().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.write_all(b"quit\n").await.unwrap();
    };
    let (ran, ()) = tokio::join!(app.run(BufReader::new(server), &mut out), driver);
    ran.unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("loading...\n"), "{out}");
    assert!(out.ends_with("Count with storage: 7\nCount with storage and reducer: 7\n"), "{out}");
    assert_eq!(out.matches("loading...").count(), 1);
}

#[tokio::test]
async fn failed_persist_is_counted() {
    let cell = PersistedCell::new("count", 0i64, Arc::new(ReadOnlyStorage));
    cell.hydrate().await.unwrap();

    cell.set(3).unwrap();
    cell.set(4).unwrap();
    cell.flush().await;

    assert_eq!(cell.read(), Snapshot::Ready(4));
    assert_eq!(cell.persist_failures(), 2);
}

#[tokio::test]
async fn failed_load_can_be_retried() {
    let cell = PersistedCell::new("count", 0i64, Arc::new(BrokenStorage));

    let err = cell.hydrate().await.unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::Backend(_))));
    assert_eq!(cell.phase(), Phase::Uninitialized);
    assert!(cell.hydrate().await.is_err());
}
