use thiserror::Error;

use crate::roles::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: requires role '{0}'")]
    Forbidden(Role),
}

/// Authorize an actor role against a required capability.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
///
/// This is the single reusable gate behind every role-restricted operation;
/// handlers call it instead of comparing roles inline.
pub fn authorize(actor: Role, required: Role) -> Result<(), AuthzError> {
    if actor.grants(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}
