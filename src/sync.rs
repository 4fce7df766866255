//! The sync engine.
//!
//! Syncing republishes one diff: its commit is cherry-picked onto a fresh
//! local branch cut from its base (the parent diff's branch, or trunk), the
//! branch is force-pushed, and a review request is opened if none exists.
//! The working copy is returned to whatever branch it started on, on every
//! exit path.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::diff::{merge_status, Diff, MergeStatus};
use crate::error::{Error, Result};
use crate::git::{self, GitError, GitResult};
use crate::review::ReviewGateway;
use crate::session::Session;
use crate::stack::{self, build_stack};
use crate::store::{DiffRecord, DiffStore};
use crate::trailer;
use crate::types::{DiffId, Sha};

/// What a new diff whose VCS parent is an open persisted diff should be
/// based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseChoice {
    StackOnParent,
    Trunk,
}

/// The open parent a basing decision is about.
#[derive(Debug)]
pub struct BaseCandidate<'a> {
    pub id: &'a DiffId,
    pub branch: &'a str,
    pub subject: &'a str,
}

/// Decides whether a first-time sync stacks on its parent diff.
///
/// Injected so the engine stays non-interactive; a front-end that wants to
/// prompt supplies its own implementation.
pub trait BaseStrategy {
    fn choose(&self, parent: &BaseCandidate<'_>) -> BaseChoice;
}

/// Default strategy: a child commit always stacks on its open parent.
pub struct AlwaysStack;

impl BaseStrategy for AlwaysStack {
    fn choose(&self, _parent: &BaseCandidate<'_>) -> BaseChoice {
        BaseChoice::StackOnParent
    }
}

/// Drop guard that switches the working copy back to the branch it was on
/// when the guard was created. Runs on success, error, and unwind.
struct BranchRestore {
    root: PathBuf,
    branch: String,
}

impl BranchRestore {
    fn new(root: &Path) -> GitResult<BranchRestore> {
        Ok(BranchRestore {
            root: root.to_path_buf(),
            branch: git::current_branch(root)?,
        })
    }
}

impl Drop for BranchRestore {
    fn drop(&mut self) {
        if let Err(err) = git::switch(&self.root, &self.branch) {
            tracing::warn!(branch = %self.branch, error = %err, "could not restore original branch");
        }
    }
}

/// Sync one diff: materialize its branch, push it, and make sure a review
/// request exists. Returns the up-to-date record.
pub fn sync(session: &mut Session, diff: &Diff) -> Result<DiffRecord> {
    let commit = diff.commit.clone().ok_or_else(|| {
        Error::usage(format!("cannot find an open commit for diff {}", diff.id))
    })?;

    let _restore = BranchRestore::new(session.root())?;
    tracing::info!(id = %diff.id, commit = %commit.short(), "syncing diff");

    let record = match &diff.record {
        Some(record) => sync_saved(session, record, &commit)?,
        None => sync_new(session, &diff.id, &commit)?,
    };
    ensure_review(session, record, &commit)
}

/// Sync a diff and then every diff stacked above it, base-most first.
pub fn sync_with_dependants(session: &mut Session, diff: &Diff) -> Result<DiffRecord> {
    let record = sync(session, diff)?;
    let synced = Diff {
        id: diff.id.clone(),
        commit: diff.commit.clone(),
        record: Some(record.clone()),
    };
    let stack = build_stack(session, &synced)?;
    let dependants: Vec<DiffId> = stack
        .dependants(&diff.id)
        .iter()
        .map(|d| d.id.clone())
        .collect();
    for id in dependants {
        let dependant = session.diff_from_id(&id)?;
        sync(session, &dependant)?;
    }
    Ok(record)
}

/// First-time sync: pick a branch name and a base, then persist the record.
fn sync_new(session: &mut Session, id: &DiffId, commit: &Sha) -> Result<DiffRecord> {
    let subject = git::commit_subject(session.root(), commit)?;
    let branch = branch_name(id, &subject);

    let mut base = session.trunk_ref();
    let mut parent_link = None;

    // A new diff stacks only when its VCS parent is itself an open,
    // persisted diff; anything else (untracked, merged, gone) means trunk.
    if let Some(parent_commit) = git::first_parent(session.root(), commit)? {
        let message = git::commit_message(session.root(), &parent_commit)?;
        if let Some(parent_id) = trailer::diff_id_from_message(&message) {
            let parent = session.diff_from_id(&parent_id)?;
            if parent.is_persisted() && merge_status(session, &parent)? == MergeStatus::Open {
                let parent_branch = parent.branch().unwrap_or_default().to_string();
                let parent_subject = git::commit_subject(session.root(), &parent_commit)?;
                let candidate = BaseCandidate {
                    id: &parent_id,
                    branch: &parent_branch,
                    subject: &parent_subject,
                };
                match session.base_strategy.choose(&candidate) {
                    BaseChoice::StackOnParent => {
                        tracing::info!(id = %id, parent = %parent_id, "stacking on parent");
                        base = parent_branch;
                        parent_link = Some(parent_id);
                    }
                    BaseChoice::Trunk => {
                        tracing::info!(id = %id, "basing on trunk by strategy choice");
                    }
                }
            }
        }
    }

    materialize(session, id, commit, &branch, &base)?;

    let record = DiffRecord {
        id: id.clone(),
        branch,
        review_handle: None,
        parent_id: parent_link,
    };
    session.store.create(record.clone())?;
    Ok(record)
}

/// Re-sync of a persisted diff: keep the branch name, recompute the base.
/// A merged, gone, or unlinked parent deflates the base back to trunk.
fn sync_saved(session: &mut Session, record: &DiffRecord, commit: &Sha) -> Result<DiffRecord> {
    let mut base = session.trunk_ref();
    if let Some(parent_id) = &record.parent_id {
        let parent = session.diff_from_id(parent_id)?;
        if parent.is_persisted() && merge_status(session, &parent)? == MergeStatus::Open {
            if let Some(branch) = parent.branch() {
                base = branch.to_string();
            }
        } else {
            tracing::info!(id = %record.id, "parent no longer open, rebasing onto trunk");
        }
    }
    materialize(session, &record.id, commit, &record.branch, &base)?;
    Ok(record.clone())
}

/// Cherry-pick the commit onto a fresh branch cut from `base` and push it.
///
/// Conflict leaves the store untouched and surfaces as a per-diff sync
/// conflict; a failed push surfaces as a remote error.
fn materialize(
    session: &Session,
    id: &DiffId,
    commit: &Sha,
    branch: &str,
    base: &str,
) -> Result<()> {
    let root = session.root();
    tracing::info!(id = %id, branch, base, "materializing branch");

    let identity = git::committer_identity(root, commit)?;
    git::delete_branch_if_exists(root, branch);
    git::create_branch(root, branch, base)?;
    git::switch(root, branch)?;
    git::cherry_pick(root, commit, &identity).map_err(|err| match err {
        GitError::CherryPickConflict { details } => Error::SyncConflict {
            id: id.clone(),
            details,
        },
        other => Error::Git(other),
    })?;
    git::force_push(root, branch).map_err(|err| Error::Remote {
        details: err.to_string(),
    })?;
    Ok(())
}

/// Open a review request if the record does not carry one yet.
fn ensure_review(session: &mut Session, record: DiffRecord, commit: &Sha) -> Result<DiffRecord> {
    if record.review_handle.is_some() {
        return Ok(record);
    }

    let diff = Diff {
        id: record.id.clone(),
        commit: Some(commit.clone()),
        record: Some(record.clone()),
    };
    let stack = build_stack(session, &diff)?;

    let mut title = git::commit_subject(session.root(), commit)?;
    if stack.len() > 1 {
        let position = stack.position(&record.id).unwrap_or(0) + 1;
        let _ = write!(title, " ({}/{})", position, stack.len());
    }

    let mut body = git::commit_body(session.root(), commit)?.trim().to_string();
    let table = stack::synopsis(session, &stack)?;
    if !table.is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&table);
    }

    let base = match &record.parent_id {
        Some(parent_id) => {
            let parent = session.diff_from_id(parent_id)?;
            if parent.is_persisted() && merge_status(session, &parent)? == MergeStatus::Open {
                parent.branch().unwrap_or(session.default_branch()).to_string()
            } else {
                session.default_branch().to_string()
            }
        }
        None => session.default_branch().to_string(),
    };

    let handle = session.review.create_pr(&base, &record.branch, &title, &body)?;
    session.store.update_review_handle(&record.id, handle)?;
    tracing::info!(id = %record.id, pr = %handle, "opened review request");

    let mut record = record;
    record.review_handle = Some(handle);
    Ok(record)
}

/// Branch name for a diff: the slug of its subject, with the id as a
/// fallback for subjects that slug to nothing.
fn branch_name(id: &DiffId, subject: &str) -> String {
    let slug = trailer::slug(subject);
    if slug.is_empty() {
        format!("diff-{}", id)
    } else {
        slug
    }
}
