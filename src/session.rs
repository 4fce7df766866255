//! The per-invocation session object.
//!
//! One `Session` is built per command and passed explicitly to every
//! operation: repository root, config, the diff store, the review gateway,
//! the basing strategy, and the per-run commit memo all live here rather
//! than in process-wide state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::diff::Diff;
use crate::error::{Error, Result};
use crate::git;
use crate::resolve;
use crate::review::{GhCli, ReviewGateway};
use crate::store::{DiffStore, JsonStore};
use crate::sync::{AlwaysStack, BaseStrategy};
use crate::trailer;
use crate::types::{DiffId, Sha};

/// Everything a single `sync`/`land` invocation needs.
///
/// Concurrent invocations are unsupported: a session assumes sole ownership
/// of the working copy and the store for its lifetime.
pub struct Session {
    root: PathBuf,
    config: Config,
    pub store: Box<dyn DiffStore>,
    pub review: Box<dyn ReviewGateway>,
    pub base_strategy: Box<dyn BaseStrategy>,
    /// id -> resolved commit, memoized per run. Amendments within one run are
    /// not expected; the memo is dropped explicitly when history is rewritten
    /// (the post-land `pull --rebase`).
    commit_memo: HashMap<DiffId, Option<Sha>>,
}

impl Session {
    /// Assemble a session from parts (tests inject fakes here).
    pub fn new(
        root: impl Into<PathBuf>,
        config: Config,
        store: Box<dyn DiffStore>,
        review: Box<dyn ReviewGateway>,
        base_strategy: Box<dyn BaseStrategy>,
    ) -> Session {
        Session {
            root: root.into(),
            config,
            store,
            review,
            base_strategy,
            commit_memo: HashMap::new(),
        }
    }

    /// Open the session for the repository containing `workdir`, with the
    /// production store, `gh` gateway, and stacking default.
    pub fn open(workdir: &Path) -> Result<Session> {
        let root = git::toplevel(workdir)?;
        let config = Config::load(&root)?;
        let store = JsonStore::open(config::store_path(&root))?;
        let review = GhCli::new(&root);
        Ok(Session::new(
            root,
            config,
            Box::new(store),
            Box::new(review),
            Box::new(AlwaysStack),
        ))
    }

    /// The repository root (the working copy all git operations run in).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The trunk branch name (e.g. "main").
    pub fn default_branch(&self) -> &str {
        &self.config.default_branch
    }

    /// The remote-tracking trunk ref (e.g. "origin/main") used as the base
    /// for trunk-based diffs and as the open-range boundary.
    pub fn trunk_ref(&self) -> String {
        format!("origin/{}", self.config.default_branch)
    }

    /// Map a durable id to its current commit by scanning the open range.
    ///
    /// `None` means the diff is gone: dropped, squashed, or landed.
    pub fn resolve_commit(&mut self, id: &DiffId) -> Result<Option<Sha>> {
        if let Some(cached) = self.commit_memo.get(id) {
            return Ok(cached.clone());
        }
        let resolved = resolve::resolve_commit(&self.root, &self.trunk_ref(), id)?;
        self.commit_memo.insert(id.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Drop the commit memo. Required after any operation that rewrites
    /// local history, or resolutions would be stale.
    pub fn invalidate_commits(&mut self) {
        self.commit_memo.clear();
    }

    /// Build the diff for a user-supplied revision.
    ///
    /// Usage errors: the revision does not name a commit, or its message has
    /// no `DiffID:` trailer.
    pub fn diff_from_rev(&mut self, rev: &str) -> Result<Diff> {
        if !git::commit_exists(&self.root, rev)? {
            return Err(Error::usage(format!("{} is not a commit", rev)));
        }
        let commit = git::rev_parse(&self.root, rev)?;
        let message = git::commit_message(&self.root, &commit)?;
        let id = trailer::diff_id_from_message(&message).ok_or_else(|| {
            Error::usage(format!(
                "commit {} is missing a {} trailer",
                commit.short(),
                trailer::TRAILER_KEY
            ))
        })?;
        let record = self.store.get(&id)?;
        // The supplied revision is authoritative for this run.
        self.commit_memo.insert(id.clone(), Some(commit.clone()));
        Ok(Diff {
            id,
            commit: Some(commit),
            record,
        })
    }

    /// Build the diff for a durable id, resolving its current commit.
    pub fn diff_from_id(&mut self, id: &DiffId) -> Result<Diff> {
        let record = self.store.get(id)?;
        let commit = self.resolve_commit(id)?;
        Ok(Diff {
            id: id.clone(),
            commit,
            record,
        })
    }
}
