//! `slotbook-events`: in-process pub/sub.
//!
//! Carries the forced-logout signal between auth controllers and the
//! state-change notifications those controllers emit to observers.

pub mod bus;
pub mod in_memory_bus;
pub mod logout;

pub use bus::{EventBus, Listener, Subscription};
pub use in_memory_bus::{BusError, InMemoryEventBus};
pub use logout::{AUTH_LOGOUT_EVENT, LogoutBus, LogoutSignal};
