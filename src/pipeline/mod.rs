//! Orchestration over a directory of target files.
//!
//! Target files are discovered by name under a root directory (non-recursive)
//! and trimmed one by one against a shared reference catalog, either once
//! ([`batch`]) or continuously as new files arrive ([`watch`]). [`count`]
//! tallies matches over the same set of files without writing anything.

pub mod batch;
pub mod count;
pub mod watch;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SkytrimError};
use crate::trim::{is_trimmed_output, trimmed_path};

pub use batch::{run_batch, BatchOutcome, BatchReport};
pub use count::{count_matches, CountConfig, FileCount, MatchTally};
pub use watch::{poll_once, run_watch, PollReport, WatchConfig, WatchState};

/// Which file names count as target files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub prefix: String,
    pub suffix: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            prefix: "coadd-".to_string(),
            suffix: ".fits".to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// True if `path` names a target file (and not a trimmed output).
    pub fn matches(&self, path: &Path) -> bool {
        if is_trimmed_output(path) {
            return false;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(&self.prefix) && n.ends_with(&self.suffix))
            .unwrap_or(false)
    }
}

/// Target files directly under `root`, sorted by path.
pub fn discover(root: &Path, config: &DiscoveryConfig) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| SkytrimError::io(root, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && config.matches(p))
        .collect();
    files.sort();
    Ok(files)
}

/// True once `path` has a trimmed companion next to it.
pub fn has_trimmed_companion(path: &Path) -> bool {
    trimmed_path(path).exists()
}
