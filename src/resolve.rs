//! Mapping durable diff ids to commits.
//!
//! A diff's commit is never stored; it is re-derived on every run by walking
//! the open range (`origin/<trunk>..HEAD`) and reading each commit's
//! `DiffID:` trailer. Commits on trunk are deliberately outside the range:
//! a landed diff no longer resolves, which is how the rest of the tool
//! observes "gone".

use std::path::Path;

use crate::error::Result;
use crate::git;
use crate::trailer;
use crate::types::{DiffId, Sha};

/// Find the open-range commit carrying `id`, oldest first.
///
/// Returns `Ok(None)` when no open commit carries the id: the diff was
/// dropped, squashed away, or already landed.
pub fn resolve_commit(repo: &Path, trunk_ref: &str, id: &DiffId) -> Result<Option<Sha>> {
    for sha in git::rev_list(repo, trunk_ref, "HEAD")? {
        let message = git::commit_message(repo, &sha)?;
        if trailer::diff_id_from_message(&message).as_ref() == Some(id) {
            return Ok(Some(sha));
        }
    }
    Ok(None)
}
