//! The persisted token slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::storage::{KeyValueStore, MemoryStore, StorageError};

/// Storage key holding the raw token. Absence means logged out.
pub const TOKEN_KEY: &str = "token";

/// A single named durable value: the current token.
///
/// Operations never fail from the caller's point of view. The first time the
/// backend errors, the slot logs a warning and switches to a process-lifetime
/// in-memory value for good; callers only notice that the value no longer
/// survives a restart.
///
/// Clones share the backend *and* the fallback value, so every controller in
/// the process keeps seeing one token even after degradation.
#[derive(Clone)]
pub struct PersistentSlot {
    inner: Arc<SlotInner>,
}

struct SlotInner {
    key: String,
    backend: Arc<dyn KeyValueStore>,
    degraded: AtomicBool,
    fallback: Mutex<Option<String>>,
}

impl PersistentSlot {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(backend, TOKEN_KEY)
    }

    pub fn with_key(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                key: key.into(),
                backend,
                degraded: AtomicBool::new(false),
                fallback: Mutex::new(None),
            }),
        }
    }

    /// Slot with no durable backend at all.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Whether the slot has fallen back to memory-only storage.
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded.load(Ordering::SeqCst)
    }

    pub async fn get(&self) -> Option<String> {
        if !self.is_degraded() {
            match self.inner.backend.get(&self.inner.key).await {
                Ok(value) => return value,
                Err(err) => self.degrade(&err),
            }
        }
        (*self.fallback()).clone()
    }

    pub async fn set(&self, value: impl Into<String>) {
        let value = value.into();
        if !self.is_degraded() {
            match self.inner.backend.set(&self.inner.key, &value).await {
                Ok(()) => return,
                Err(err) => self.degrade(&err),
            }
        }
        *self.fallback() = Some(value);
    }

    pub async fn remove(&self) {
        if !self.is_degraded() {
            match self.inner.backend.remove(&self.inner.key).await {
                Ok(()) => return,
                Err(err) => self.degrade(&err),
            }
        }
        *self.fallback() = None;
    }

    fn fallback(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.inner
            .fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn degrade(&self, err: &StorageError) {
        if !self.inner.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                key = %self.inner.key,
                error = %err,
                "durable storage unavailable; keeping value in memory for this process"
            );
        }
    }
}

impl core::fmt::Debug for PersistentSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PersistentSlot")
            .field("key", &self.inner.key)
            .field("degraded", &self.is_degraded())
            .finish_non_exhaustive()
    }
}
