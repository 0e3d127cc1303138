//! Shared error types for patching operations.

use thiserror::Error;

/// Main error type for patchkit operations
#[derive(Debug, Error)]
pub enum PatchError {
    /// A proxy patch was opened without a test instance to resolve against
    #[error("proxy patch requires a test instance before it can be opened")]
    MissingInstance,

    /// An attribute path could not be walked to its container
    #[error("cannot resolve `{path}`: missing attribute `{missing}`")]
    UnresolvedPath { path: String, missing: String },

    /// The target attribute does not exist and `create` was not set
    #[error("attribute `{attribute}` does not exist on target (pass `create` to substitute anyway)")]
    MissingAttribute { attribute: String },

    /// A dotted path names a root that was never registered
    #[error("no registered root named `{root}`")]
    UnknownRoot { root: String },

    /// A dotted path string could not be parsed into tokens
    #[error("invalid attribute path `{0}`")]
    InvalidPath(String),

    /// A value that is neither a function nor a mock was invoked
    #[error("value of kind `{kind}` is not callable")]
    NotCallable { kind: &'static str },

    /// A spec was opened while its previous substitution was still live
    #[error("substitution already active; close the previous patch first")]
    AlreadyActive,

    /// A configured side effect reported a failure
    #[error("side effect failed: {0}")]
    SideEffect(String),

    /// A user setup callback failed after the patch was opened
    #[error("setup callback failed: {0}")]
    Setup(String),
}

impl PatchError {
    /// Create an unresolved-path error from a path display and the token
    /// that failed to resolve.
    pub fn unresolved(path: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::UnresolvedPath {
            path: path.into(),
            missing: missing.into(),
        }
    }

    /// Create a side-effect error.
    pub fn side_effect(message: impl Into<String>) -> Self {
        Self::SideEffect(message.into())
    }
}

/// Result type alias for patchkit operations
pub type PatchResult<T> = Result<T, PatchError>;
