//! Stacked diffs: one reviewable branch and PR per commit.
//!
//! Each commit in the open range (`origin/<trunk>..HEAD`) carries a durable
//! `DiffID:` trailer. This library materializes each such commit onto its own
//! remote branch via cherry-pick, opens a PR for it, reconstructs the stack
//! ordering from a small persisted relation, and lands diffs base-most first.

pub mod config;
pub mod diff;
pub mod error;
pub mod git;
pub mod init;
pub mod land;
pub mod resolve;
pub mod review;
pub mod session;
pub mod stack;
pub mod store;
pub mod sync;
pub mod trailer;
pub mod types;

pub use error::{Error, Result};
pub use session::Session;
