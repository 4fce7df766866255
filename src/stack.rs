//! Stack reconstruction from the persisted parent relation.
//!
//! Ordering is never persisted. Every operation that needs it rebuilds the
//! stack by walking `parent_id` links up and `get_child` lookups down from
//! some persisted diff, pruning links that no longer lead anywhere.

use std::fmt::Write as _;

use crate::diff::{merge_status, Diff, MergeStatus};
use crate::error::{Error, Result};
use crate::git;
use crate::session::Session;
use crate::store::DiffStore;
use crate::types::DiffId;

/// A chain of diffs, trunk-most first.
#[derive(Debug)]
pub struct Stack {
    diffs: Vec<Diff>,
}

impl Stack {
    pub fn diffs(&self) -> &[Diff] {
        &self.diffs
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Zero-based position of a diff within the stack.
    pub fn position(&self, id: &DiffId) -> Option<usize> {
        self.diffs.iter().position(|d| &d.id == id)
    }

    /// The diffs stacked strictly above `id`, base-most first.
    pub fn dependants(&self, id: &DiffId) -> &[Diff] {
        match self.position(id) {
            Some(pos) => self.diffs.get(pos + 1..).unwrap_or(&[]),
            None => &[],
        }
    }
}

/// Rebuild the stack containing `diff`.
///
/// Upward walk: stop at a diff with no parent link; when a parent's record
/// has vanished the chain simply ends; when a parent's commit no longer
/// resolves its record is deleted and the walk stops; a merged parent is
/// excluded and the walk stops (the stack has deflated past it). Downward
/// walk mirrors the prune rule over `get_child`.
///
/// The result contains `diff` exactly once and no duplicate ids.
pub fn build_stack(session: &mut Session, diff: &Diff) -> Result<Stack> {
    if !diff.is_persisted() {
        return Err(Error::usage(format!(
            "diff {} has not been synced yet",
            diff.id
        )));
    }

    let mut parents = Vec::new();
    let mut cursor = diff.parent_id().cloned();
    while let Some(parent_id) = cursor {
        let parent = session.diff_from_id(&parent_id)?;
        if !parent.is_persisted() {
            break;
        }
        match merge_status(session, &parent)? {
            MergeStatus::Gone => {
                tracing::warn!(id = %parent_id, "pruning unresolvable diff record");
                session.store.delete(&parent_id)?;
                break;
            }
            MergeStatus::Merged => break,
            MergeStatus::Open => {}
        }
        cursor = parent.parent_id().cloned();
        parents.push(parent);
    }
    parents.reverse();

    let mut diffs = parents;
    diffs.push(diff.clone());

    let mut cursor = diff.id.clone();
    while let Some(child_record) = session.store.get_child(&cursor)? {
        let child = session.diff_from_id(&child_record.id)?;
        if child.commit.is_none() {
            tracing::warn!(id = %child.id, "pruning unresolvable diff record");
            session.store.delete(&child.id)?;
            break;
        }
        cursor = child.id.clone();
        diffs.push(child);
    }

    Ok(Stack { diffs })
}

/// Markdown table summarizing the stack, for review-request bodies.
///
/// Empty for single-diff stacks; otherwise one row per diff in stack order,
/// with a placeholder for diffs whose review is not open yet.
pub fn synopsis(session: &Session, stack: &Stack) -> Result<String> {
    if stack.len() <= 1 {
        return Ok(String::new());
    }

    let mut table = String::from("### 📚 Stack\n\n| PR | Title |\n| -- | -- |\n");
    for diff in stack.diffs() {
        let subject = match &diff.commit {
            Some(commit) => git::commit_subject(session.root(), commit)?,
            None => continue,
        };
        let handle = match diff.review_handle() {
            Some(handle) => handle.to_string(),
            None => "(pending)".to_string(),
        };
        // Writing into a String cannot fail.
        let _ = writeln!(table, "| {} | {} |", handle, subject);
    }
    Ok(table)
}
