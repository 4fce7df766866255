//! Local git operations, run as subprocesses.
//!
//! Everything here shells out to `git` with a scrubbed environment (no
//! system/user config, no terminal prompts) so behavior is identical across
//! machines. Operations that touch the remote (`push`, `pull`) are the only
//! ones with network effects; their failures are mapped to remote errors by
//! the callers.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;

use crate::types::Sha;

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Git command failed.
    #[error("git command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Cherry-pick hit a conflict. The cherry-pick has already been aborted.
    #[error("cherry-pick conflict:\n{details}")]
    CherryPickConflict { details: String },

    /// IO error spawning git.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Committer identity pinned onto a republished commit.
///
/// Cherry-picking normally stamps the current time and the local committer.
/// Re-materializing a diff must not alter recorded authorship, so the
/// original commit's committer fields are carried over via environment
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitterIdentity {
    pub name: String,
    pub email: String,
    /// ISO 8601 committer date (git `%ci`).
    pub date: String,
}

/// Create a git Command with a clean environment (no system/user config).
///
/// Ignoring system and user git configuration (rerere, hooks, aliases) keeps
/// the subprocess behavior reproducible.
fn git_command(workdir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);

    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    cmd
}

/// Run a git command in the given working directory.
///
/// Returns the command output on success, or a GitError on failure.
pub fn run_git(workdir: &Path, args: &[&str]) -> GitResult<Output> {
    let output = git_command(workdir).args(args).output()?;

    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let command = format!("git {}", args.join(" "));
        Err(GitError::CommandFailed { command, stderr })
    }
}

/// Run a git command and return trimmed stdout as a string.
pub fn run_git_stdout(workdir: &Path, args: &[&str]) -> GitResult<String> {
    let output = run_git(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The branch the working copy currently has checked out.
pub fn current_branch(workdir: &Path) -> GitResult<String> {
    run_git_stdout(workdir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Resolve a revision to a full SHA.
pub fn rev_parse(workdir: &Path, rev: &str) -> GitResult<Sha> {
    let sha = run_git_stdout(workdir, &["rev-parse", rev])?;
    Ok(Sha::new(sha))
}

/// Whether the given revision names an object in this repository.
pub fn commit_exists(workdir: &Path, rev: &str) -> GitResult<bool> {
    let output = git_command(workdir)
        .args(["cat-file", "-e", &format!("{}^{{commit}}", rev)])
        .output()?;
    Ok(output.status.success())
}

/// The first parent of a commit, or None for a root commit.
pub fn first_parent(workdir: &Path, commit: &Sha) -> GitResult<Option<Sha>> {
    let output = git_command(workdir)
        .args(["rev-parse", "--verify", "--quiet", &format!("{}^", commit)])
        .output()?;
    if output.status.success() {
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(Sha::new(sha)))
    } else {
        Ok(None)
    }
}

/// Commits in `base..head`, oldest first.
pub fn rev_list(workdir: &Path, base: &str, head: &str) -> GitResult<Vec<Sha>> {
    let range = format!("{}..{}", base, head);
    let output = run_git_stdout(workdir, &["rev-list", "--reverse", &range])?;
    Ok(output
        .lines()
        .filter(|l| !l.is_empty())
        .map(Sha::new)
        .collect())
}

fn show_format(workdir: &Path, commit: &Sha, format: &str) -> GitResult<String> {
    run_git_stdout(
        workdir,
        &["show", "-s", &format!("--format={}", format), commit.as_str()],
    )
}

/// Full commit message (subject + body + trailers).
pub fn commit_message(workdir: &Path, commit: &Sha) -> GitResult<String> {
    show_format(workdir, commit, "%B")
}

/// Commit subject line.
pub fn commit_subject(workdir: &Path, commit: &Sha) -> GitResult<String> {
    show_format(workdir, commit, "%s")
}

/// Commit body (everything after the subject).
pub fn commit_body(workdir: &Path, commit: &Sha) -> GitResult<String> {
    show_format(workdir, commit, "%b")
}

/// The committer name/email/date recorded on a commit.
pub fn committer_identity(workdir: &Path, commit: &Sha) -> GitResult<CommitterIdentity> {
    Ok(CommitterIdentity {
        name: show_format(workdir, commit, "%cn")?,
        email: show_format(workdir, commit, "%ce")?,
        date: show_format(workdir, commit, "%ci")?,
    })
}

/// Delete a local branch. Failure is ignored: the branch may not exist.
pub fn delete_branch_if_exists(workdir: &Path, name: &str) {
    let _ = run_git(workdir, &["branch", "-D", name]);
}

/// Create a branch at `base` without upstream tracking.
pub fn create_branch(workdir: &Path, name: &str, base: &str) -> GitResult<()> {
    run_git(workdir, &["branch", "--no-track", name, base])?;
    Ok(())
}

/// Switch the working copy to a branch.
pub fn switch(workdir: &Path, name: &str) -> GitResult<()> {
    run_git(workdir, &["switch", name])?;
    Ok(())
}

/// Cherry-pick a commit onto HEAD, pinning the committer identity to the
/// original commit's values.
///
/// On conflict the cherry-pick is aborted before returning
/// [`GitError::CherryPickConflict`], leaving the working copy clean.
pub fn cherry_pick(workdir: &Path, commit: &Sha, identity: &CommitterIdentity) -> GitResult<()> {
    let output = git_command(workdir)
        .args(["cherry-pick", commit.as_str()])
        .env("GIT_COMMITTER_NAME", &identity.name)
        .env("GIT_COMMITTER_EMAIL", &identity.email)
        .env("GIT_COMMITTER_DATE", &identity.date)
        .output()?;

    if output.status.success() {
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let details = format!("{}{}", stdout, stderr).trim().to_string();

    // Leave nothing in progress before reporting the conflict.
    run_git(workdir, &["cherry-pick", "--abort"])?;

    Err(GitError::CherryPickConflict { details })
}

/// Force-push a branch to origin.
pub fn force_push(workdir: &Path, branch: &str) -> GitResult<()> {
    run_git(workdir, &["push", "origin", branch, "--force"])?;
    Ok(())
}

/// Pull a branch from origin with rebase, updating the local trunk tracking
/// state after a land.
pub fn pull_rebase(workdir: &Path, branch: &str) -> GitResult<()> {
    run_git(workdir, &["pull", "origin", branch, "--rebase"])?;
    Ok(())
}

/// Number of commits in `upstream..commit` that are not patch-equivalent to
/// something already on `upstream` (`git cherry`, `+` lines).
///
/// Zero means every change the commit carries is already upstream, i.e. the
/// diff has been merged.
pub fn unapplied_count(workdir: &Path, upstream: &str, commit: &Sha) -> GitResult<usize> {
    let output = run_git_stdout(workdir, &["cherry", upstream, commit.as_str()])?;
    Ok(output.lines().filter(|l| l.starts_with('+')).count())
}

/// The root directory of the repository containing `workdir`.
pub fn toplevel(workdir: &Path) -> GitResult<PathBuf> {
    let path = run_git_stdout(workdir, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(path))
}

/// Set a repository-local config value.
pub fn set_config(workdir: &Path, key: &str, value: &str) -> GitResult<()> {
    run_git(workdir, &["config", key, value])?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Real-git fixtures: a bare origin plus a working clone in a tempdir.

    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use super::run_git;
    use crate::types::Sha;

    pub struct TestRepo {
        pub dir: TempDir,
        pub work: PathBuf,
        pub origin: PathBuf,
    }

    impl TestRepo {
        /// A repo with a `main` trunk, one initial commit, and a bare origin
        /// that `main` tracks.
        pub fn new() -> TestRepo {
            let dir = TempDir::new().unwrap();
            let origin = dir.path().join("origin.git");
            let work = dir.path().join("work");

            std::fs::create_dir_all(&origin).unwrap();
            run_git(&origin, &["init", "--bare", "--initial-branch=main"]).unwrap();

            std::fs::create_dir_all(&work).unwrap();
            run_git(&work, &["init", "--initial-branch=main"]).unwrap();
            run_git(&work, &["config", "user.name", "Test"]).unwrap();
            run_git(&work, &["config", "user.email", "test@test.invalid"]).unwrap();
            run_git(&work, &["remote", "add", "origin", origin.to_str().unwrap()]).unwrap();

            std::fs::write(work.join("README.md"), "# test\n").unwrap();
            run_git(&work, &["add", "."]).unwrap();
            run_git(&work, &["commit", "-m", "Initial commit"]).unwrap();
            run_git(&work, &["push", "-u", "origin", "main"]).unwrap();

            TestRepo { dir, work, origin }
        }

        /// Commit a file change on the current branch with the given message.
        pub fn commit_file(&self, filename: &str, content: &str, message: &str) -> Sha {
            std::fs::write(self.work.join(filename), content).unwrap();
            run_git(&self.work, &["add", filename]).unwrap();
            run_git(&self.work, &["commit", "-m", message]).unwrap();
            super::rev_parse(&self.work, "HEAD").unwrap()
        }

        pub fn work(&self) -> &Path {
            &self.work
        }
    }
}
