//! `slotbook-auth`: client-side token decoding and identity model.
//!
//! This crate is decoupled from storage and transport. It does **not** verify
//! token signatures; the server is the only trust authority.

pub mod claims;
pub mod codec;
pub mod identity;
pub mod principal;
pub mod roles;

pub use claims::{
    CLAIM_EMAIL, CLAIM_EXP, CLAIM_ID, CLAIM_NAME, CLAIM_ROLE, Claims, is_expired, is_expired_at,
};
pub use codec::{DecodeError, TokenParts, decode};
pub use identity::{Identity, IdentitySource};
pub use principal::UserId;
pub use roles::{Role, UnknownRole};
