//! SlotBook client session core.
//!
//! Holds the token the server issued, derives a display identity from its
//! unverified claims, and keeps every [`AuthController`] in the process in
//! step through a shared [`PersistentSlot`] and logout bus.
//!
//! ```no_run
//! # async fn demo() {
//! use std::sync::Arc;
//! use slotbook_client::{AuthController, PersistentSlot, SqliteStore};
//! use slotbook_events::LogoutBus;
//!
//! let slot = PersistentSlot::new(Arc::new(SqliteStore::open("/tmp/slotbook/client.db")));
//! let controller = AuthController::new(slot, LogoutBus::new());
//! let state = controller.init().await;
//! println!("{:?}", state.phase());
//! # }
//! ```

pub mod api;
pub mod config;
pub mod controller;
pub mod slot;
pub mod state;
pub mod storage;

pub use api::{ApiError, CredentialIssuer, Credentials, HttpAuthApi, Registration};
pub use config::{ClientConfig, ConfigError};
pub use controller::AuthController;
pub use slot::{PersistentSlot, TOKEN_KEY};
pub use state::{AuthPhase, AuthState, LoginOutcome, LoginWarning};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError};
