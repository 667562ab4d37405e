//! One-shot trimming of every target file under a root.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::{discover, DiscoveryConfig};
use crate::error::{Result, SkytrimError};
use crate::trim::{trim_file, TrimConfig, TrimReport};
use crate::Catalog;

/// What happened to one file of a batch.
#[derive(Debug)]
pub enum BatchOutcome {
    Trimmed(TrimReport),
    Failed(SkytrimError),
}

/// Per-file outcomes, in discovery order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<(PathBuf, BatchOutcome)>,
}

impl BatchReport {
    pub fn trimmed(&self) -> impl Iterator<Item = &TrimReport> {
        self.files.iter().filter_map(|(_, o)| match o {
            BatchOutcome::Trimmed(r) => Some(r),
            BatchOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &SkytrimError)> {
        self.files.iter().filter_map(|(p, o)| match o {
            BatchOutcome::Failed(e) => Some((p.as_path(), e)),
            BatchOutcome::Trimmed(_) => None,
        })
    }

    pub fn num_failed(&self) -> usize {
        self.failures().count()
    }
}

/// Trim every target file under `root` against `reference`.
///
/// A failure on one file is logged and recorded; the remaining files are still
/// processed. Only a failure to list `root` itself is returned as an error.
pub fn run_batch(
    root: &Path,
    reference: &Catalog,
    discovery: &DiscoveryConfig,
    config: &TrimConfig,
) -> Result<BatchReport> {
    let files = discover(root, discovery)?;
    info!(
        "batch: {} target files under {}",
        files.len(),
        root.display()
    );

    // Per-file outputs are always derived from the input name.
    let config = TrimConfig {
        output: None,
        ..config.clone()
    };

    let mut report = BatchReport::default();
    for path in files {
        let outcome = match trim_file(&path, reference, &config) {
            Ok(r) => BatchOutcome::Trimmed(r),
            Err(e) => {
                error!("{}: {}", path.display(), e);
                BatchOutcome::Failed(e)
            }
        };
        report.files.push((path, outcome));
    }

    info!(
        "batch done: {} trimmed, {} failed",
        report.files.len() - report.num_failed(),
        report.num_failed()
    );
    Ok(report)
}
