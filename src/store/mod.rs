//! The persisted diff relation.
//!
//! One row per synced diff: `id -> {branch, review_handle, parent_id}`. The
//! stack ordering is not persisted; it is rebuilt from the `parent_id` links
//! on every operation that needs it.

mod json;

pub use json::JsonStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DiffId, PrNumber};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error reading or writing the store file.
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file is not valid JSON of the expected shape.
    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The store file was written by an incompatible version.
    #[error("store schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },

    /// A record with this id already exists.
    #[error("diff {id} already exists in the store")]
    DuplicateId { id: DiffId },

    /// Another record already claims this parent. Parent links form a simple
    /// chain; a second child would make downstream ordering undefined.
    #[error("diff {existing} is already stacked on {parent}")]
    ParentTaken { parent: DiffId, existing: DiffId },

    /// More than one record claims the same parent (a hand-edited store
    /// file); child resolution would be order-dependent.
    #[error("multiple diffs are stacked on {parent}")]
    AmbiguousChild { parent: DiffId },

    /// The record to update does not exist.
    #[error("diff {id} not found in the store")]
    NotFound { id: DiffId },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// One persisted diff row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRecord {
    /// The durable diff id (unique key).
    pub id: DiffId,

    /// The branch that materializes this diff's content.
    pub branch: String,

    /// The associated review request, once one has been opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_handle: Option<PrNumber>,

    /// The diff this one is stacked on; None means based directly on trunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<DiffId>,
}

/// The persisted relation over diff records.
///
/// `get`/`get_child` return `Ok(None)` when absent rather than erroring. No
/// multi-row transactional guarantees beyond single-row atomicity.
pub trait DiffStore {
    /// Look up a record by id.
    fn get(&self, id: &DiffId) -> StoreResult<Option<DiffRecord>>;

    /// Insert a new record. Fails if the id exists or the parent link is
    /// already claimed by another record.
    fn create(&mut self, record: DiffRecord) -> StoreResult<()>;

    /// Attach a review handle to an existing record.
    fn update_review_handle(&mut self, id: &DiffId, handle: PrNumber) -> StoreResult<()>;

    /// Reverse lookup: the record whose `parent_id` is `id`.
    fn get_child(&self, id: &DiffId) -> StoreResult<Option<DiffRecord>>;

    /// Remove a record. Removing an absent record is not an error.
    fn delete(&mut self, id: &DiffId) -> StoreResult<()>;
}
