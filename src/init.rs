//! Workspace initialisation (`stacked init`).

use std::fs;
use std::path::Path;

use crate::config::{self, Config, DATA_DIR};
use crate::error::Result;
use crate::git;
use crate::review::{GhCli, ReviewGateway};
use crate::store::JsonStore;

/// Installed as `commit-msg`: tags every new commit with a `DiffID:` trailer
/// so the rest of the tool can assume one is present.
const COMMIT_MSG_HOOK: &str = r#"#!/bin/sh
# Appends a DiffID trailer when the commit message does not carry one.
if ! git interpret-trailers --parse "$1" | grep -q "^DiffID:"; then
    git interpret-trailers --in-place --trailer "DiffID: $(stacked generate-id)" "$1"
fi
"#;

/// Initialise the repository containing `workdir`, detecting the trunk
/// branch through the hosted review API.
pub fn run(workdir: &Path) -> Result<()> {
    let root = git::toplevel(workdir)?;
    let review = GhCli::new(&root);
    run_with(&root, &review)
}

/// Initialisation against an injected review gateway.
///
/// Idempotent: existing config, store, and hook are left alone.
pub fn run_with(root: &Path, review: &dyn ReviewGateway) -> Result<()> {
    fs::create_dir_all(root.join(DATA_DIR))?;

    if config::config_path(root).exists() {
        tracing::info!("config already present, leaving it unchanged");
    } else {
        let default_branch = review.default_branch()?;
        tracing::info!(branch = %default_branch, "detected trunk branch");
        Config::new(default_branch).save(root)?;
    }

    if !config::store_path(root).exists() {
        JsonStore::init(config::store_path(root))?;
    }

    // Landing relies on rebase-style pulls to drop merged commits.
    git::set_config(root, "pull.rebase", "true")?;

    install_hook(root)
}

fn install_hook(root: &Path) -> Result<()> {
    let hook = root.join(".git").join("hooks").join("commit-msg");
    if hook.exists() {
        tracing::warn!(path = %hook.display(), "commit-msg hook already exists, not overwriting");
        return Ok(());
    }
    if let Some(dir) = hook.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&hook, COMMIT_MSG_HOOK)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
