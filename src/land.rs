//! The land orchestrator.
//!
//! Landing squash-merges one diff's review request into trunk, pulls the
//! rewritten trunk back, and re-syncs every diff stacked above it. Diffs
//! land strictly base-most first; landing above an open ancestor is refused
//! before any side effect happens.

use crate::diff::{merge_status, Diff, MergeStatus};
use crate::error::{Error, Result};
use crate::git;
use crate::review::ReviewGateway;
use crate::session::Session;
use crate::stack::build_stack;
use crate::sync;
use crate::types::DiffId;

/// Land one diff and re-sync its dependants.
pub fn land(session: &mut Session, diff: &Diff) -> Result<()> {
    let commit = diff.commit.clone().ok_or_else(|| {
        Error::usage(format!(
            "cannot find an open commit for diff {}; nothing to land",
            diff.id
        ))
    })?;
    let record = diff.record.clone().ok_or_else(|| {
        Error::usage(format!("diff {} has not been synced yet", diff.id))
    })?;
    let handle = record.review_handle.ok_or_else(|| {
        Error::usage(format!(
            "diff {} has no review request; sync it first",
            diff.id
        ))
    })?;

    if merge_status(session, diff)? == MergeStatus::Merged {
        return Err(Error::usage(format!(
            "diff {} has already landed",
            diff.id
        )));
    }

    // Dependency check before any side effect. An open parent commit blocks
    // the land even when its record has been pruned: the ordering constraint
    // lives in history, not in the store.
    if let Some(parent_id) = &record.parent_id {
        let parent = session.diff_from_id(parent_id)?;
        if merge_status(session, &parent)? == MergeStatus::Open {
            return Err(Error::DependencyBlocked {
                id: diff.id.clone(),
                parent: parent_id.clone(),
            });
        }
    }

    tracing::info!(id = %diff.id, pr = %handle, "landing diff");
    session.review.merge_squash(handle)?;

    // Pull the squashed trunk back. This rewrites local history: the landed
    // commit evaporates and every dependant gets a new SHA, so the commit
    // memo is stale from here on.
    let trunk = session.default_branch().to_string();
    git::pull_rebase(session.root(), &trunk)?;
    session.invalidate_commits();

    let landed = Diff {
        id: diff.id.clone(),
        commit: Some(commit),
        record: Some(record),
    };
    let stack = build_stack(session, &landed)?;
    let dependants: Vec<DiffId> = stack
        .dependants(&landed.id)
        .iter()
        .map(|d| d.id.clone())
        .collect();

    for id in dependants {
        let dependant = session.diff_from_id(&id)?;
        if dependant.commit.is_none() {
            tracing::warn!(id = %id, "dependant no longer resolves, skipping re-sync");
            continue;
        }
        sync::sync(session, &dependant)?;
    }

    Ok(())
}
