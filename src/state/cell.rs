use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, OnceCell, watch};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use super::{Phase, Snapshot};
use crate::error::{Error, Result};
use crate::storage::Storage;

/// A new value for a cell: either the value itself or a function of the
/// current one.
pub enum Write<T> {
    Value(T),
    Apply(Box<dyn FnOnce(&T) -> T + Send>),
}

impl<T> Write<T> {
    pub fn apply(f: impl FnOnce(&T) -> T + Send + 'static) -> Self {
        Write::Apply(Box::new(f))
    }

    fn resolve(self, current: &T) -> T {
        match self {
            Write::Value(v) => v,
            Write::Apply(f) => f(current),
        }
    }
}

/// A shared, observable value persisted under a fixed storage key.
///
/// Cloning yields another handle to the same cell. The in-memory value is
/// the source of truth for readers; storage is hydrated from once and then
/// written to on every change without waiting for the write to land.
pub struct PersistedCell<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    key: String,
    initial: T,
    storage: Option<Arc<dyn Storage>>,

    state: watch::Sender<Snapshot<T>>,
    hydrated: OnceCell<()>,
    hydrating: AtomicBool,

    // Persist bookkeeping: every write takes a sequence number, the newest one
    // handed to storage is kept under the mutex so stale writes are skipped.
    next_seq: AtomicU64,
    attempted_seq: Arc<Mutex<u64>>,
    persists: TaskTracker,
    persist_failures: Arc<AtomicU64>,
}

/// A value ready to be written to storage.
struct Pending {
    seq: u64,
    raw: Value,
}

impl<T> Clone for PersistedCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PersistedCell<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a cell backed by `storage`. Nothing is loaded until the cell
    /// is first read or [`hydrate`](Self::hydrate)d.
    pub fn new(key: impl Into<String>, initial: T, storage: Arc<dyn Storage>) -> Self {
        Self::build(key.into(), initial, Some(storage), Snapshot::Loading)
    }

    /// A cell with no storage behind it. It is ready immediately and never
    /// persists.
    pub fn detached(initial: T) -> Self {
        let ready = Snapshot::Ready(initial.clone());
        Self::build(String::new(), initial, None, ready)
    }

    fn build(key: String, initial: T, storage: Option<Arc<dyn Storage>>, state: Snapshot<T>) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            inner: Arc::new(Inner {
                key,
                initial,
                storage,
                state,
                hydrated: OnceCell::new(),
                hydrating: AtomicBool::new(false),
                next_seq: AtomicU64::new(0),
                attempted_seq: Arc::new(Mutex::new(0)),
                persists: TaskTracker::new(),
                persist_failures: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn initial(&self) -> &T {
        &self.inner.initial
    }

    pub fn phase(&self) -> Phase {
        if self.inner.state.borrow().is_ready() {
            Phase::Ready
        } else if self.inner.hydrating.load(Ordering::Acquire) {
            Phase::Hydrating
        } else {
            Phase::Uninitialized
        }
    }

    /// Current value, or `Loading` while storage has not answered yet.
    ///
    /// Reading an unhydrated cell kicks off hydration in the background.
    pub fn read(&self) -> Snapshot<T> {
        let snapshot = (*self.inner.state.borrow()).clone();
        if snapshot.is_loading() {
            self.spawn_hydration();
        }
        snapshot
    }

    /// Receive every change to the cell, hydration included.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.inner.state.subscribe()
    }

    /// Load the stored value if that has not happened yet and return the
    /// current value. Concurrent callers share a single storage load.
    pub async fn hydrate(&self) -> Result<T> {
        self.inner.hydrated.get_or_try_init(|| self.load()).await?;
        Ok(self.current())
    }

    /// Alias for [`hydrate`](Self::hydrate) that reads better at call sites
    /// which only want the value.
    pub async fn get(&self) -> Result<T> {
        self.hydrate().await
    }

    /// Apply `write` to the current value.
    ///
    /// Fails with [`Error::NotHydrated`] while a storage-backed cell is still
    /// loading; the stored value is never overwritten by a guess.
    pub fn write(&self, write: Write<T>) -> Result<T> {
        self.try_update(|current| Ok(write.resolve(current)))
    }

    pub fn set(&self, value: T) -> Result<T> {
        self.write(Write::Value(value))
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T + Send + 'static) -> Result<T> {
        self.write(Write::apply(f))
    }

    /// Compute the next value from the current one. On `Err` the cell is
    /// left untouched and nothing is persisted.
    pub fn try_update<E>(&self, f: impl FnOnce(&T) -> Result<T, E>) -> Result<T, E>
    where
        E: From<Error>,
    {
        // Stays as is when the cell is still loading.
        let mut outcome: Result<(T, Option<Pending>), E> = Err(Error::NotHydrated {
            key: self.inner.key.clone(),
        }
        .into());

        self.inner.state.send_if_modified(|snapshot| {
            let Snapshot::Ready(current) = &*snapshot else {
                return false;
            };
            match f(current) {
                Ok(next) => {
                    // Sequenced under the channel lock so persist order matches apply order.
                    let pending = self.stage_persist(&next);
                    *snapshot = Snapshot::Ready(next.clone());
                    outcome = Ok((next, pending));
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });

        let (next, pending) = outcome?;
        if let Some(pending) = pending {
            self.persist(pending);
        }
        Ok(next)
    }

    /// Wait for every persist scheduled so far to finish.
    pub async fn flush(&self) {
        let persists = &self.inner.persists;
        persists.close();
        persists.wait().await;
        persists.reopen();
    }

    /// Number of persists that failed since the cell was created.
    pub fn persist_failures(&self) -> u64 {
        self.inner.persist_failures.load(Ordering::Relaxed)
    }

    fn current(&self) -> T {
        match &*self.inner.state.borrow() {
            Snapshot::Ready(value) => value.clone(),
            Snapshot::Loading => self.inner.initial.clone(),
        }
    }

    async fn load(&self) -> Result<()> {
        if self.inner.state.borrow().is_ready() {
            return Ok(());
        }
        let Some(storage) = &self.inner.storage else {
            self.settle(self.inner.initial.clone());
            return Ok(());
        };

        self.inner.hydrating.store(true, Ordering::Release);
        debug!(key = %self.inner.key, "hydrating");
        let outcome = self.fetch(storage.as_ref()).await.map(|value| self.settle(value));
        self.inner.hydrating.store(false, Ordering::Release);
        outcome
    }

    async fn fetch(&self, storage: &dyn Storage) -> Result<T> {
        match storage.get(&self.inner.key).await? {
            None | Some(Value::Null) => Ok(self.inner.initial.clone()),
            Some(raw) => serde_json::from_value(raw).map_err(|source| Error::Decode {
                key: self.inner.key.clone(),
                source,
            }),
        }
    }

    fn settle(&self, value: T) {
        let applied = self.inner.state.send_if_modified(|snapshot| {
            if snapshot.is_loading() {
                *snapshot = Snapshot::Ready(value);
                true
            } else {
                false
            }
        });
        if applied {
            debug!(key = %self.inner.key, "hydrated");
        }
    }

    fn spawn_hydration(&self) {
        if self
            .inner
            .hydrating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            self.inner.hydrating.store(false, Ordering::Release);
            warn!(key = %self.inner.key, "no async runtime, cell stays unhydrated");
            return;
        };

        let cell = self.clone();
        handle.spawn(async move {
            if let Err(err) = cell.hydrate().await {
                error!(key = %cell.inner.key, error = %err, "hydration failed");
            }
            cell.inner.hydrating.store(false, Ordering::Release);
        });
    }

    /// Serialize `value` and give it the next sequence number. Runs inside
    /// the channel lock.
    fn stage_persist(&self, value: &T) -> Option<Pending> {
        self.inner.storage.as_ref()?;
        match serde_json::to_value(value) {
            Ok(raw) => Some(Pending {
                seq: self.inner.next_seq.fetch_add(1, Ordering::AcqRel) + 1,
                raw,
            }),
            Err(err) => {
                warn!(key = %self.inner.key, error = %err, "value not serializable, skipping persist");
                None
            }
        }
    }

    fn persist(&self, pending: Pending) {
        let Some(storage) = self.inner.storage.clone() else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            warn!(key = %self.inner.key, "no async runtime, skipping persist");
            return;
        };

        let Pending { seq, raw } = pending;
        let key = self.inner.key.clone();
        let attempted = Arc::clone(&self.inner.attempted_seq);
        let failures = Arc::clone(&self.inner.persist_failures);

        self.inner.persists.spawn_on(
            async move {
                let mut attempted = attempted.lock().await;
                if seq <= *attempted {
                    debug!(%key, seq, "skipping stale persist");
                    return;
                }
                // Claimed before the write so an older persist never lands
                // after this one, even if this one fails.
                *attempted = seq;
                match storage.set(&key, raw).await {
                    Ok(()) => debug!(%key, seq, "persisted"),
                    Err(err) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(%key, seq, error = %err, "persist failed");
                    }
                }
            },
            &handle,
        );
    }
}
