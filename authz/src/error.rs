//! Error types for the authorization engine.
//!
//! # Security Note
//! A failed compilation must read as a denial, never as a grant. The
//! variants here cover malformed *input* to compilation; a `can()`
//! check answering "no" is an ordinary boolean, not an error.

use thiserror::Error;

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

/// Errors that can occur while compiling an authorization policy.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The acting user has no id. A policy cannot be scoped to nobody.
    #[error("Acting user has no id; refusing to compile a policy")]
    MissingUser,

    /// The acting user carries no role. Compiling anyway would let a
    /// half-loaded user row silently bypass every check.
    #[error("Acting user '{0}' has no role assigned")]
    MissingRole(String),
}
