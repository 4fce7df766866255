//! Crate-level error taxonomy.
//!
//! Layer errors (`GitError`, `StoreError`, `ReviewError`) bubble up into this
//! enum; the remaining variants are the user-facing outcomes a single `sync`
//! or `land` invocation can end in.

use thiserror::Error;

use crate::git::GitError;
use crate::review::ReviewError;
use crate::store::StoreError;
use crate::types::DiffId;

/// Errors surfaced by `sync`, `land`, and the supporting plumbing.
#[derive(Debug, Error)]
pub enum Error {
    /// The user asked for something the tool cannot act on: a commit without
    /// a `DiffID:` trailer, a diff that was never synced, a land without a PR.
    /// Fatal, no retry.
    #[error("{0}")]
    Usage(String),

    /// Cherry-picking the diff onto its base conflicted. The cherry-pick was
    /// aborted, the working copy restored, and the store left untouched.
    #[error("cherry-pick conflict while syncing {id}:\n{details}")]
    SyncConflict { id: DiffId, details: String },

    /// A diff was asked to land while an ancestor is still open. Diffs land
    /// strictly base-most first.
    #[error("diff {id} is stacked on {parent}, which has not landed yet")]
    DependencyBlocked { id: DiffId, parent: DiffId },

    /// A push or review-API call failed. Surfaced verbatim, no automatic
    /// retry.
    #[error("remote operation failed: {details}")]
    Remote { details: String },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<ReviewError> for Error {
    fn from(err: ReviewError) -> Self {
        Error::Remote {
            details: err.to_string(),
        }
    }
}

/// Result type for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Convenience constructor for usage errors.
    pub fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }
}
