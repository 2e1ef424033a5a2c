//! In-memory event bus.

use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;

use crate::bus::{EventBus, Listener, Subscription};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Publish failed due to internal lock poisoning.
    #[error("event bus lock poisoned")]
    Poisoned,
}

struct Registry<M> {
    next_id: u64,
    listeners: Vec<(u64, Listener<M>)>,
}

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Synchronous fan-out in subscription order
/// - Listeners may subscribe or unsubscribe from inside a callback; the
///   listener list is snapshotted before dispatch
///
/// Clones share the same listener registry.
pub struct InMemoryEventBus<M> {
    registry: Arc<Mutex<Registry<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.listeners.len())
            .unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<M> Clone for InMemoryEventBus<M> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<M> core::fmt::Debug for InMemoryEventBus<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: 'static,
{
    type Error = BusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let snapshot: Vec<Listener<M>> = {
            let registry = self.registry.lock().map_err(|_| BusError::Poisoned)?;
            registry
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        for listener in snapshot {
            listener(&message);
        }

        Ok(())
    }

    fn subscribe(&self, listener: Listener<M>) -> Subscription {
        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages.
        let id = match self.registry.lock() {
            Ok(mut registry) => {
                let id = registry.next_id;
                registry.next_id += 1;
                registry.listeners.push((id, listener));
                id
            }
            Err(_) => {
                tracing::error!("event bus lock poisoned; listener not registered");
                return Subscription::detached();
            }
        };

        let registry: Weak<Mutex<Registry<M>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            // The listener is dropped after the lock is released.
            let removed = registry.lock().ok().and_then(|mut registry| {
                let pos = registry
                    .listeners
                    .iter()
                    .position(|(existing, _)| *existing == id)?;
                Some(registry.listeners.remove(pos))
            });
            drop(removed);
        })
    }
}
