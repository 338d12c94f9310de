//! Persisted identity and the store trait around it

use anyhow::Result;

use super::AuthError;
use crate::models::{Identity, UserId};

/// Storage for the logged-in identity and the resume partner.
pub trait IdentityStore {
    fn identity(&self) -> Option<Identity>;
    fn set_identity(&mut self, identity: Identity);
    fn resume_partner(&self) -> Option<UserId>;
    fn set_resume_partner(&mut self, partner: Option<UserId>);
    /// Forget the identity and everything tied to it.
    fn clear_identity(&mut self);
    /// Write the current state to durable storage.
    fn persist(&self) -> Result<()>;
}

/// Guard for every chat operation: no identity, no requests.
pub fn require_identity<S: IdentityStore + ?Sized>(store: &S) -> Result<Identity, AuthError> {
    store.identity().ok_or(AuthError::NotLoggedIn)
}
