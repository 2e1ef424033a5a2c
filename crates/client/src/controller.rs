//! Session lifecycle state machine.
//!
//! ```text
//! Uninitialized ──init──▶ Initializing ──▶ Authenticated | Unauthenticated
//!                                              ▲    │ login / logout / logout signal
//!                                              └────┘
//! ```
//!
//! Controllers are cheap and may be constructed several times in one process.
//! Instances built over the same [`PersistentSlot`] and [`LogoutBus`] behave
//! as one logical session: a new instance's `init()` re-reads the slot, and a
//! `logout()` on any instance is broadcast to all of them.
//!
//! # Fail-open login
//!
//! `login()` always ends `Authenticated`, even for an expired token (a warning
//! is reported) or an undecodable one (the fallback identity is used). The
//! resulting identity is UI state only and must never gate an authorization
//! decision; the server checks every request.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use slotbook_auth::{Identity, decode, is_expired};
use slotbook_events::{EventBus, InMemoryEventBus, LogoutBus, Subscription};

use crate::api::{ApiError, CredentialIssuer, Credentials};
use crate::slot::PersistentSlot;
use crate::state::{AuthPhase, AuthState, LoginOutcome, LoginWarning};

/// Owns one [`AuthState`] and keeps it in step with the shared slot and bus.
///
/// Dropping the controller unsubscribes it from the logout bus.
#[derive(Debug)]
pub struct AuthController {
    shared: Arc<Shared>,
    _logout_subscription: Subscription,
}

#[derive(Debug)]
struct Shared {
    slot: PersistentSlot,
    logout_bus: LogoutBus,
    current: Mutex<Current>,
    observers: InMemoryEventBus<AuthState>,
}

/// The state plus a counter bumped on every change, so an `init` that was
/// suspended on storage can tell whether someone else moved the state on.
#[derive(Debug, Default)]
struct Current {
    state: AuthState,
    generation: u64,
}

impl Current {
    /// Replace the state; returns the previous one if it actually changed.
    fn replace(&mut self, next: &AuthState) -> Option<AuthState> {
        if self.state == *next {
            return None;
        }
        self.generation += 1;
        Some(std::mem::replace(&mut self.state, next.clone()))
    }
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Current> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> AuthState {
        self.lock().state.clone()
    }

    fn is_generation(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Replace the state and notify observers if it changed.
    fn transition(&self, next: AuthState) -> AuthState {
        let previous = self.lock().replace(&next);
        if let Some(previous) = previous {
            self.notify(&previous, &next);
        }
        next
    }

    /// Apply `next` only if nothing changed the state since `generation`.
    /// Otherwise the newer state is kept and returned.
    fn transition_from(&self, generation: u64, next: AuthState) -> AuthState {
        let previous = {
            let mut current = self.lock();
            if current.generation != generation {
                tracing::debug!(
                    phase = ?current.state.phase(),
                    "state changed while restoring session; keeping newer state"
                );
                return current.state.clone();
            }
            current.replace(&next)
        };
        if let Some(previous) = previous {
            self.notify(&previous, &next);
        }
        next
    }

    /// Enter `Initializing` unless already settled. Returns the generation to
    /// finish from, or the settled state.
    fn begin_init(&self) -> Result<u64, AuthState> {
        let next = AuthState::initializing();
        let (previous, generation) = {
            let mut current = self.lock();
            if current.state.phase().is_settled() {
                return Err(current.state.clone());
            }
            let previous = current.replace(&next);
            (previous, current.generation)
        };
        if let Some(previous) = previous {
            self.notify(&previous, &next);
        }
        Ok(generation)
    }

    fn notify(&self, previous: &AuthState, next: &AuthState) {
        tracing::debug!(from = ?previous.phase(), to = ?next.phase(), "auth state changed");

        if let Err(err) = self.observers.publish(next.clone()) {
            tracing::error!(error = %err, "failed to notify auth state observers");
        }
    }

    fn on_logout_signal(&self) {
        if self.snapshot() == AuthState::unauthenticated() {
            return;
        }
        tracing::info!("logout signal received; clearing identity");
        self.transition(AuthState::unauthenticated());
    }
}

impl AuthController {
    /// Build a controller in the `Uninitialized` phase and subscribe it to
    /// `logout_bus`. Call [`init`](Self::init) next.
    pub fn new(slot: PersistentSlot, logout_bus: LogoutBus) -> Self {
        let shared = Arc::new(Shared {
            slot,
            logout_bus: logout_bus.clone(),
            current: Mutex::new(Current::default()),
            observers: InMemoryEventBus::new(),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let subscription = logout_bus.subscribe(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_logout_signal();
            }
        });

        Self {
            shared,
            _logout_subscription: subscription,
        }
    }

    /// Restore the session from the persisted token.
    ///
    /// - no token: `Unauthenticated`
    /// - valid token: `Authenticated` with its claims
    /// - expired or undecodable token: slot cleared, `Unauthenticated`
    ///
    /// Once the controller has settled (by a previous `init`, `login` or
    /// `logout`) this is a no-op returning the current state.
    pub async fn init(&self) -> AuthState {
        let generation = match self.shared.begin_init() {
            Ok(generation) => generation,
            Err(settled) => return settled,
        };

        let next = match self.shared.slot.get().await {
            None => {
                tracing::debug!("no stored token");
                AuthState::unauthenticated()
            }
            Some(token) => match decode(&token) {
                Ok(claims) if is_expired(&claims) => {
                    tracing::info!(user_id = ?claims.id(), "stored token expired; clearing session");
                    self.discard_stored_token(generation).await;
                    AuthState::unauthenticated()
                }
                Ok(claims) => {
                    tracing::info!(user_id = ?claims.id(), role = ?claims.role(), "session restored");
                    AuthState::authenticated(Identity::from_claims(claims), token)
                }
                Err(err) => {
                    tracing::warn!(
                        kind = err.kind(),
                        error = %err,
                        "stored token could not be decoded; clearing session"
                    );
                    self.discard_stored_token(generation).await;
                    AuthState::unauthenticated()
                }
            },
        };

        self.shared.transition_from(generation, next)
    }

    /// Clear the slot for a failed restore, unless a login or logout has
    /// already replaced what was read.
    async fn discard_stored_token(&self, generation: u64) {
        if self.shared.is_generation(generation) {
            self.shared.slot.remove().await;
        }
    }

    /// Adopt a server-issued token.
    ///
    /// The token is persisted before it is inspected so a credential the
    /// server just issued is never thrown away by the client. Never fails; see
    /// the module docs for the fail-open policy.
    pub async fn login(&self, token: impl Into<String>) -> LoginOutcome {
        let token = token.into();
        self.shared.slot.set(token.clone()).await;

        let (identity, warning) = match decode(&token) {
            Ok(claims) => {
                let warning = if is_expired(&claims) {
                    tracing::warn!(user_id = ?claims.id(), "logged in with an already expired token");
                    Some(LoginWarning::Expired)
                } else {
                    None
                };
                (Identity::from_claims(claims), warning)
            }
            Err(err) => {
                tracing::warn!(
                    kind = err.kind(),
                    error = %err,
                    "issued token could not be decoded; using fallback identity"
                );
                (Identity::fallback(), Some(LoginWarning::Undecodable))
            }
        };

        self.shared
            .transition(AuthState::authenticated(identity.clone(), token));

        tracing::info!(
            user_id = ?identity.id(),
            role = ?identity.role(),
            fallback = identity.is_fallback(),
            "logged in"
        );

        LoginOutcome {
            success: true,
            identity,
            warning,
        }
    }

    /// Obtain a token from `issuer` and log in with it.
    ///
    /// Only the issuer can fail this (network trouble, bad credentials).
    pub async fn login_with<I>(
        &self,
        issuer: &I,
        credentials: &Credentials,
    ) -> Result<LoginOutcome, ApiError>
    where
        I: CredentialIssuer + ?Sized,
    {
        let token = issuer.issue_token(credentials).await.inspect_err(|err| {
            tracing::warn!(email = %credentials.email, error = %err, "credential exchange failed");
        })?;
        Ok(self.login(token).await)
    }

    /// Forget the session here and in every controller sharing the bus.
    pub async fn logout(&self) {
        self.shared.slot.remove().await;
        self.shared.transition(AuthState::unauthenticated());
        tracing::info!("logged out");

        if let Err(err) = self.shared.logout_bus.publish() {
            tracing::error!(error = %err, "failed to broadcast logout");
        }
    }

    /// Register `listener` to receive every new state.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(Arc::new(listener))
    }

    pub fn state(&self) -> AuthState {
        self.shared.snapshot()
    }

    pub fn phase(&self) -> AuthPhase {
        self.state().phase()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state().identity().cloned()
    }

    pub fn token(&self) -> Option<String> {
        self.state().token().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == AuthPhase::Authenticated
    }

    pub fn slot(&self) -> &PersistentSlot {
        &self.shared.slot
    }

    pub fn logout_bus(&self) -> &LogoutBus {
        &self.shared.logout_bus
    }
}
