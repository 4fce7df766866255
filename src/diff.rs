//! The diff entity and its merge status.

use crate::error::Result;
use crate::git;
use crate::session::Session;
use crate::store::DiffRecord;
use crate::types::{DiffId, PrNumber, Sha};

/// A diff as seen by one invocation: the durable id, the commit it currently
/// resolves to (if any), and its store record (if it has been synced).
///
/// The four combinations of `commit`/`record` presence are all meaningful:
/// a transient diff (commit, no record), a persisted one (both), a gone one
/// (record, no commit), and an unknown id (neither).
#[derive(Debug, Clone)]
pub struct Diff {
    pub id: DiffId,
    pub commit: Option<Sha>,
    pub record: Option<DiffRecord>,
}

impl Diff {
    /// Whether the diff has ever been synced.
    pub fn is_persisted(&self) -> bool {
        self.record.is_some()
    }

    pub fn branch(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.branch.as_str())
    }

    pub fn review_handle(&self) -> Option<PrNumber> {
        self.record.as_ref().and_then(|r| r.review_handle)
    }

    pub fn parent_id(&self) -> Option<&DiffId> {
        self.record.as_ref().and_then(|r| r.parent_id.as_ref())
    }
}

/// Where a diff's content stands relative to trunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    /// Still in flight: resolvable, content not yet on trunk.
    Open,
    /// Every change the diff carries is already patch-equivalent to trunk.
    Merged,
    /// No open commit carries the id any more (dropped or squashed away),
    /// and its content is not on trunk either.
    Gone,
}

/// Classify a diff against the trunk tracking ref.
///
/// Uses patch-equivalence (`git cherry`), not commit identity: landing
/// rewrites the SHA, so only content comparison survives a squash-merge.
pub fn merge_status(session: &Session, diff: &Diff) -> Result<MergeStatus> {
    let commit = match &diff.commit {
        Some(commit) => commit,
        None => return Ok(MergeStatus::Gone),
    };
    let unapplied = git::unapplied_count(session.root(), &session.trunk_ref(), commit)?;
    if unapplied == 0 {
        Ok(MergeStatus::Merged)
    } else {
        Ok(MergeStatus::Open)
    }
}
