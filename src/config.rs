//! Workspace configuration (`.stacked/config.json`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Directory under the repository root holding the store and config.
pub const DATA_DIR: &str = ".stacked";

const CONFIG_FILE: &str = "config.json";
const STORE_FILE: &str = "diffs.json";

/// Per-repository configuration, written once by `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The trunk branch diffs are based on and landed into.
    pub default_branch: String,
}

impl Config {
    pub fn new(default_branch: impl Into<String>) -> Config {
        Config {
            default_branch: default_branch.into(),
        }
    }

    /// Load the config for the repository rooted at `root`.
    pub fn load(root: &Path) -> Result<Config> {
        let path = config_path(root);
        let contents = fs::read_to_string(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::usage("not initialized: run `stacked init` first")
            } else {
                Error::Io(err)
            }
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the config under `root`, creating the data directory if needed.
    pub fn save(&self, root: &Path) -> Result<()> {
        fs::create_dir_all(root.join(DATA_DIR))?;
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(config_path(root), contents)?;
        Ok(())
    }
}

/// Path of the config file under a repository root.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join(CONFIG_FILE)
}

/// Path of the store file under a repository root.
pub fn store_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join(STORE_FILE)
}
