//! `gh` CLI implementation of the review gateway.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{ReviewError, ReviewGateway, ReviewResult};
use crate::types::PrNumber;

/// Review gateway backed by the GitHub CLI.
#[derive(Debug)]
pub struct GhCli {
    workdir: PathBuf,
}

impl GhCli {
    pub fn new(workdir: impl Into<PathBuf>) -> GhCli {
        GhCli {
            workdir: workdir.into(),
        }
    }

    fn run(&self, args: &[&str]) -> ReviewResult<String> {
        run_gh(&self.workdir, args)
    }
}

fn run_gh(workdir: &Path, args: &[&str]) -> ReviewResult<String> {
    let output = Command::new("gh")
        .current_dir(workdir)
        .args(args)
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(ReviewError::Api {
            details: format!("gh {}: {}", args.join(" "), stderr),
        })
    }
}

/// Extract the PR number from the URL `gh pr create` prints
/// (`https://github.com/<owner>/<repo>/pull/<n>`).
fn pr_number_from_url(url: &str) -> ReviewResult<PrNumber> {
    url.rsplit('/')
        .next()
        .and_then(|tail| tail.parse::<u64>().ok())
        .map(PrNumber)
        .ok_or_else(|| ReviewError::Malformed {
            details: format!("expected a PR URL, got {:?}", url),
        })
}

impl ReviewGateway for GhCli {
    fn create_pr(
        &self,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> ReviewResult<PrNumber> {
        let url = self.run(&[
            "pr", "create", "--base", base, "--head", head, "--title", title, "--body", body,
        ])?;
        // gh prints the PR URL on the last stdout line.
        let last = url.lines().last().unwrap_or("");
        pr_number_from_url(last)
    }

    fn merge_squash(&self, handle: PrNumber) -> ReviewResult<()> {
        self.run(&["pr", "merge", &handle.0.to_string(), "--squash"])?;
        Ok(())
    }

    fn default_branch(&self) -> ReviewResult<String> {
        let name = self.run(&[
            "repo",
            "view",
            "--json=defaultBranchRef",
            "--jq=.defaultBranchRef.name",
        ])?;
        if name.is_empty() {
            return Err(ReviewError::Malformed {
                details: "empty default branch name".to_string(),
            });
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pr_url() {
        let n = pr_number_from_url("https://github.com/owner/repo/pull/123").unwrap();
        assert_eq!(n, PrNumber(123));
    }

    #[test]
    fn rejects_non_url_output() {
        assert!(pr_number_from_url("").is_err());
        assert!(pr_number_from_url("not a url").is_err());
        assert!(pr_number_from_url("https://github.com/owner/repo/pull/abc").is_err());
    }
}
