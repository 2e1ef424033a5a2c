use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Claims, Role, UserId};

/// Where an [`Identity`] came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Claims decoded from the token payload.
    Token,
    /// Fixed placeholder used when a freshly issued token could not be decoded.
    Fallback,
}

/// The user the rest of the application sees.
///
/// This is UI state derived from unverified claims. It must never be used to
/// make authorization decisions; the server re-checks every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    claims: Claims,
    source: IdentitySource,
}

impl Identity {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            claims,
            source: IdentitySource::Token,
        }
    }

    /// The placeholder identity substituted when login receives a token
    /// whose payload cannot be decoded.
    pub fn fallback() -> Self {
        Self {
            claims: Claims::new(UserId::new(1), "user@example.com", Role::Trainer).with_name("User"),
            source: IdentitySource::Fallback,
        }
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn into_claims(self) -> Claims {
        self.claims
    }

    pub fn source(&self) -> IdentitySource {
        self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == IdentitySource::Fallback
    }

    /// The raw `id` claim.
    pub fn id(&self) -> Option<&Value> {
        self.claims.id()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.claims.user_id()
    }

    pub fn email(&self) -> Option<&str> {
        self.claims.email()
    }

    pub fn role(&self) -> Option<Role> {
        self.claims.role()
    }

    pub fn name(&self) -> Option<&str> {
        self.claims.name()
    }
}
