//! Event publishing/subscription abstraction (mechanics only).
//!
//! This module provides the **event bus pattern** used inside a single client
//! process: a publisher fans a message out to every registered listener.
//!
//! ## Delivery
//!
//! - **Synchronous**: `publish()` returns only after every listener ran.
//! - **Ordered**: listeners are called in the order they subscribed.
//! - **At-least-once**: the same logical message may be published more than
//!   once; listeners must be idempotent.
//! - **In-process only**: nothing crosses an OS process boundary. Durable state
//!   shared between processes lives in storage, not on the bus.

use std::sync::Arc;

/// Callback invoked for each published message.
pub type Listener<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Handle to a registered listener.
///
/// Dropping the handle unsubscribes, so the lifetime of a subscriber (e.g. an
/// auth controller) bounds the lifetime of its listener.
///
/// ```ignore
/// let subscription = bus.subscribe(Arc::new(|msg: &Msg| handle(msg)));
/// // ...
/// subscription.unsubscribe();
/// ```
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that was never registered (nothing to cancel).
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Remove the listener from the bus. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// The trait requires `Send + Sync`: a bus is shared between every component
/// of the process that needs to hear about a message.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self, listener: Listener<M>) -> Subscription;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self, listener: Listener<M>) -> Subscription {
        (**self).subscribe(listener)
    }
}
