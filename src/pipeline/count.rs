//! Counting crossmatches over many target files without writing anything.
//!
//! For each file the reference points within the threshold of any of its
//! target positions are found with the radius matcher; the matched reference
//! indices also feed a running set of unique matches across all files.
//!
//! With `cross_check` set, the count is repeated with the chunked separation
//! engine. That pass compares every reference point with every target, so it
//! is meant for small catalogs only.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{Result, SkytrimError};
use crate::fits::read_fits;
use crate::matcher::{search_around_sky, MatchConfig};
use crate::separation::{count_within, SeparationConfig};
use crate::trim::{read_positions, PositionColumns};
use crate::Catalog;

#[derive(Debug, Clone)]
pub struct CountConfig {
    pub max_arcsec: f64,
    pub primary_segment: String,
    pub position_columns: Vec<PositionColumns>,
    pub match_config: MatchConfig,
    /// Recount each file with the all-pairs separation engine. Default off.
    pub cross_check: bool,
    pub separation: SeparationConfig,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            max_arcsec: 1.0,
            primary_segment: "FIBERMAP".to_string(),
            position_columns: PositionColumns::defaults(),
            match_config: MatchConfig::default(),
            cross_check: false,
            separation: SeparationConfig::default(),
        }
    }
}

/// Counts for one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCount {
    pub path: PathBuf,
    /// Rows of the primary segment.
    pub targets: usize,
    /// Distinct reference points matched by this file.
    pub reference_matches: usize,
    /// Same count from the separation engine, when cross-checked.
    pub chunked_matches: Option<usize>,
}

/// Running totals over a set of target files.
#[derive(Debug, Default)]
pub struct MatchTally {
    pub files: Vec<FileCount>,
    pub failed: Vec<(PathBuf, SkytrimError)>,
    unique: BTreeSet<usize>,
}

impl MatchTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the reference indices matched by one file.
    pub fn add_file<I>(
        &mut self,
        path: &Path,
        targets: usize,
        reference_indices: I,
    ) -> &mut FileCount
    where
        I: IntoIterator<Item = usize>,
    {
        let matched: BTreeSet<usize> = reference_indices.into_iter().collect();
        let count = FileCount {
            path: path.to_path_buf(),
            targets,
            reference_matches: matched.len(),
            chunked_matches: None,
        };
        self.unique.extend(matched);
        self.files.push(count);
        let last = self.files.len() - 1;
        &mut self.files[last]
    }

    /// Distinct reference points matched by any file so far.
    pub fn unique_reference_matches(&self) -> usize {
        self.unique.len()
    }

    pub fn total_targets(&self) -> usize {
        self.files.iter().map(|f| f.targets).sum()
    }
}

/// Count reference matches for each of `files`. A file that cannot be read is
/// recorded in `failed` and the rest are still counted.
pub fn count_matches(files: &[PathBuf], reference: &Catalog, config: &CountConfig) -> MatchTally {
    let mut tally = MatchTally::new();
    for path in files {
        if let Err(e) = count_file(&mut tally, path, reference, config) {
            error!("{}: {}", path.display(), e);
            tally.failed.push((path.clone(), e));
        }
    }
    info!(
        "TOTAL unique reference matches <= {}\": {} over {} files ({} targets)",
        config.max_arcsec,
        tally.unique_reference_matches(),
        tally.files.len(),
        tally.total_targets()
    );
    tally
}

fn count_file(
    tally: &mut MatchTally,
    path: &Path,
    reference: &Catalog,
    config: &CountConfig,
) -> Result<()> {
    let file = read_fits(path)?;
    let (_, primary) = file.find(&config.primary_segment).ok_or_else(|| {
        SkytrimError::MalformedInput(format!(
            "{}: no {} segment",
            path.display(),
            config.primary_segment
        ))
    })?;
    let targets = read_positions(primary, &config.position_columns)?;

    let result = search_around_sky(&targets, reference, config.max_arcsec, &config.match_config)?;
    let chunked = if config.cross_check {
        Some(count_within(
            reference.points(),
            targets.points(),
            config.max_arcsec,
            &config.separation,
        )?)
    } else {
        None
    };

    let count = tally.add_file(path, targets.len(), result.pairs.iter().map(|p| p.b_idx));
    count.chunked_matches = chunked;
    if let Some(chunked) = chunked.filter(|&n| n != count.reference_matches) {
        // Only expected for pairs sitting on the threshold itself.
        warn!(
            "{}: matcher found {} reference matches, separation engine {}",
            path.display(),
            count.reference_matches,
            chunked
        );
    }
    info!(
        "{}: targets={} reference matches <= {}\" = {}",
        path.display(),
        count.targets,
        config.max_arcsec,
        count.reference_matches
    );
    Ok(())
}
