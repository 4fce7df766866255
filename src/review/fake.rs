//! In-memory review gateway for tests.
//!
//! Records every call, hands out sequential PR numbers, and (when pointed at
//! a fixture origin) performs the squash-merge locally so land tests run
//! without any network.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{ReviewError, ReviewGateway, ReviewResult};
use crate::git;
use crate::types::PrNumber;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPr {
    pub number: PrNumber,
    pub base: String,
    pub head: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct State {
    next_number: u64,
    pub created: Vec<CreatedPr>,
    pub merged: Vec<PrNumber>,
    /// When set, `merge_squash` squash-merges the PR's head into its base on
    /// this bare repository, emulating the server side of a merge.
    pub merge_origin: Option<PathBuf>,
    pub default_branch: String,
}

/// Shared-state fake: clones observe the same call log, so a test can keep a
/// handle while the session owns the gateway.
#[derive(Debug, Clone)]
pub struct FakeReview {
    state: Rc<RefCell<State>>,
}

impl FakeReview {
    pub fn new() -> FakeReview {
        FakeReview {
            state: Rc::new(RefCell::new(State {
                next_number: 1,
                default_branch: "main".to_string(),
                ..State::default()
            })),
        }
    }

    pub fn merging_into(origin: &Path) -> FakeReview {
        let fake = FakeReview::new();
        fake.state.borrow_mut().merge_origin = Some(origin.to_path_buf());
        fake
    }

    pub fn created(&self) -> Vec<CreatedPr> {
        self.state.borrow().created.clone()
    }

    pub fn merged(&self) -> Vec<PrNumber> {
        self.state.borrow().merged.clone()
    }
}

/// Squash-merge `head` into `base` on the bare origin, via a scratch clone.
fn squash_merge_on_origin(origin: &Path, base: &str, head: &str, title: &str) -> ReviewResult<()> {
    let scratch = tempfile::TempDir::new()?;
    let run = |dir: &Path, args: &[&str]| {
        git::run_git(dir, args).map_err(|err| ReviewError::Api {
            details: err.to_string(),
        })
    };

    run(
        scratch.path(),
        &["clone", origin.to_str().unwrap_or_default(), "clone"],
    )?;
    let clone = scratch.path().join("clone");
    run(&clone, &["config", "user.name", "Fake Review"])?;
    run(&clone, &["config", "user.email", "review@test.invalid"])?;
    run(&clone, &["switch", base])?;
    run(&clone, &["merge", "--squash", &format!("origin/{}", head)])?;
    run(&clone, &["commit", "-m", title])?;
    run(&clone, &["push", "origin", base])?;
    Ok(())
}

impl ReviewGateway for FakeReview {
    fn create_pr(
        &self,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> ReviewResult<PrNumber> {
        let mut state = self.state.borrow_mut();
        let number = PrNumber(state.next_number);
        state.next_number += 1;
        state.created.push(CreatedPr {
            number,
            base: base.to_string(),
            head: head.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(number)
    }

    fn merge_squash(&self, handle: PrNumber) -> ReviewResult<()> {
        let (origin, trunk, pr) = {
            let mut state = self.state.borrow_mut();
            let pr = state
                .created
                .iter()
                .find(|pr| pr.number == handle)
                .cloned()
                .ok_or_else(|| ReviewError::Malformed {
                    details: format!("no such PR: {}", handle),
                })?;
            // Only a merge that found its PR counts as a call.
            state.merged.push(handle);
            (state.merge_origin.clone(), state.default_branch.clone(), pr)
        };
        // Merges land on the default branch: the hosted side retargets a
        // PR's base when the base branch itself merges.
        match origin {
            Some(origin) => squash_merge_on_origin(&origin, &trunk, &pr.head, &pr.title),
            None => Ok(()),
        }
    }

    fn default_branch(&self) -> ReviewResult<String> {
        Ok(self.state.borrow().default_branch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merging_an_unknown_handle_fails_and_is_not_recorded() {
        let fake = FakeReview::new();
        assert!(fake.merge_squash(PrNumber(9)).is_err());
        assert!(fake.merged().is_empty());
    }

    #[test]
    fn created_prs_get_sequential_numbers() {
        let fake = FakeReview::new();
        let first = fake.create_pr("main", "a", "A", "").unwrap();
        let second = fake.create_pr("main", "b", "B", "").unwrap();
        assert_eq!(first, PrNumber(1));
        assert_eq!(second, PrNumber(2));
    }
}
