//! Auth state snapshots exposed to the rest of the client.

use serde::Serialize;

use slotbook_auth::Identity;

/// Lifecycle phase of an [`AuthController`](crate::AuthController).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
}

impl AuthPhase {
    /// `Authenticated` or `Unauthenticated`: `init()` has finished (or been
    /// overtaken by `login`/`logout`).
    pub fn is_settled(&self) -> bool {
        matches!(self, AuthPhase::Authenticated | AuthPhase::Unauthenticated)
    }
}

/// Snapshot of a controller's state.
///
/// Constructors keep `phase == Authenticated` exactly when both an identity and
/// a token are present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthState {
    phase: AuthPhase,
    identity: Option<Identity>,
    #[serde(skip)]
    token: Option<String>,
}

impl AuthState {
    pub fn uninitialized() -> Self {
        Self::empty(AuthPhase::Uninitialized)
    }

    pub fn initializing() -> Self {
        Self::empty(AuthPhase::Initializing)
    }

    pub fn unauthenticated() -> Self {
        Self::empty(AuthPhase::Unauthenticated)
    }

    pub fn authenticated(identity: Identity, token: impl Into<String>) -> Self {
        Self {
            phase: AuthPhase::Authenticated,
            identity: Some(identity),
            token: Some(token.into()),
        }
    }

    fn empty(phase: AuthPhase) -> Self {
        Self {
            phase,
            identity: None,
            token: None,
        }
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::uninitialized()
    }
}

/// Non-blocking problem noticed while logging in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginWarning {
    /// The token's `exp` is already in the past.
    Expired,
    /// The payload could not be decoded; the fallback identity is in use.
    Undecodable,
}

/// Result of [`AuthController::login`](crate::AuthController::login).
///
/// `success` is always `true`: once a token is in hand, login does not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginOutcome {
    pub success: bool,
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<LoginWarning>,
}
