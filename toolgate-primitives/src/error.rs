//! Shared error definitions for toolgate primitives.

use thiserror::Error;

/// Result alias used throughout the primitives crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The provided trace identifier failed validation.
    #[error("invalid trace id `{id}`: {reason}")]
    InvalidTraceId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },

    /// The provided user identifier failed validation.
    #[error("invalid user id: {reason}")]
    InvalidUserId {
        /// Human-readable reason for rejection.
        reason: &'static str,
    },
}
