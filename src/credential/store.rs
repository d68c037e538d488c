use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, warn};

use super::{AccessCredential, CredentialRecord, MemoryRecord};

type Subscriber = Arc<dyn Fn(Option<&AccessCredential>) + Send + Sync>;

/// Handle returned by [`CredentialStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Holds the current access credential and notifies dependents of changes.
///
/// Cloning yields another handle to the same store. Subscribers run
/// synchronously inside [`set`](Self::set) and [`clear`](Self::clear), after
/// the new value is visible through [`get`](Self::get).
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    current: RwLock<Option<AccessCredential>>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
    record: Arc<dyn CredentialRecord>,
}

impl CredentialStore {
    /// Empty store backed by an in-memory record.
    pub fn new() -> Self {
        Self::with_record(Arc::new(MemoryRecord::default()), None)
    }

    /// Loads whatever credential the record holds from a previous run.
    pub fn restore(record: Arc<dyn CredentialRecord>) -> Self {
        let initial = match record.load() {
            Ok(token) => token.map(AccessCredential::new),
            Err(err) => {
                warn!(error = %err, "credential.restore_failed");
                None
            }
        };
        debug!(restored = initial.is_some(), "credential.restore");
        Self::with_record(record, initial)
    }

    fn with_record(record: Arc<dyn CredentialRecord>, initial: Option<AccessCredential>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                current: RwLock::new(initial),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                record,
            }),
        }
    }

    pub fn get(&self) -> Option<AccessCredential> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, credential: AccessCredential) {
        if let Err(err) = self.inner.record.save(credential.value()) {
            warn!(error = %err, "credential.persist_failed");
        }
        *self
            .inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        self.notify(Some(&credential));
    }

    pub fn clear(&self) {
        if let Err(err) = self.inner.record.remove() {
            warn!(error = %err, "credential.purge_failed");
        }
        self.inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.notify(None);
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Option<&AccessCredential>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns false when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    fn notify(&self, credential: Option<&AccessCredential>) {
        // Snapshot so callbacks may call back into the store.
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(credential);
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
