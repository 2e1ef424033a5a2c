//! Process-wide forced-logout channel.
//!
//! Any component may publish a logout; every auth controller that shares the
//! bus drops its in-memory identity when it hears one.

use std::sync::Arc;

use crate::bus::{EventBus, Subscription};
use crate::in_memory_bus::{BusError, InMemoryEventBus};

/// Name of the logout event, as seen in logs.
pub const AUTH_LOGOUT_EVENT: &str = "auth:logout";

/// "A logout occurred." Carries no payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct LogoutSignal;

/// In-process broadcast of [`LogoutSignal`].
///
/// Clones share listeners, so hand a clone to every controller that should
/// converge on the same session.
#[derive(Debug, Clone, Default)]
pub struct LogoutBus {
    inner: InMemoryEventBus<LogoutSignal>,
}

impl LogoutBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast a logout to every current listener, synchronously.
    pub fn publish(&self) -> Result<(), BusError> {
        tracing::debug!(
            event = AUTH_LOGOUT_EVENT,
            listeners = self.inner.listener_count(),
            "publishing logout"
        );
        self.inner.publish(LogoutSignal)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .subscribe(Arc::new(move |_: &LogoutSignal| listener()))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listener_count()
    }
}
