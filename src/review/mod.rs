//! The review-request gateway.
//!
//! The core only needs three operations from the review side: open a PR for
//! a branch, squash-merge an existing PR, and name the trunk branch. The
//! trait seam keeps the engine testable against a local fake; production
//! shells out to the `gh` CLI.

#[cfg(test)]
pub(crate) mod fake;
mod gh;

pub use gh::GhCli;

use thiserror::Error;

use crate::types::PrNumber;

/// Errors from the review API.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The API call itself failed.
    #[error("review API call failed: {details}")]
    Api { details: String },

    /// The API responded with something unparseable.
    #[error("unexpected review API output: {details}")]
    Malformed { details: String },

    /// IO error spawning the client.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for review operations.
pub type ReviewResult<T> = Result<T, ReviewError>;

/// Remote review-request operations consumed by the core.
pub trait ReviewGateway {
    /// Open a review request for `head` against `base`; returns its handle.
    fn create_pr(
        &self,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> ReviewResult<PrNumber>;

    /// Squash-merge the review request into its base.
    fn merge_squash(&self, handle: PrNumber) -> ReviewResult<()>;

    /// The repository's default (trunk) branch name.
    fn default_branch(&self) -> ReviewResult<String>;
}
