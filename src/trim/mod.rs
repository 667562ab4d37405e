//! Row-preserving trimming of multi-segment target files.
//!
//! A target file has one primary segment (a binary table with a position per
//! row, `FIBERMAP` by default) and any number of other HDUs. Every HDU whose
//! first dimension equals the primary row count `R` is row-aligned and is cut
//! down to the keep set; everything else (the empty primary HDU, wavelength
//! grids, resolution tables of a different length) is copied unchanged.
//!
//! Steps for one file:
//! 1. Read the file and locate the primary segment.
//! 2. Read its positions and match them against the reference catalog at the
//!    acceptance threshold (keep set) and at the wider report threshold.
//! 3. Build the trimmed file and check the row-count invariant.
//! 4. Write it durably, then optionally delete the original.

pub mod positions;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, SkytrimError};
use crate::fits::{read_fits, write_fits, FitsFile};
use crate::matcher::{find_keep_set, KeepSet, MatchConfig};
use crate::Catalog;

pub use positions::{read_positions, resolve_position_columns, PositionColumns};

/// Suffix that marks a trimmed output, and the companion of an input file.
pub const TRIMMED_SUFFIX: &str = ".trimmed.fits";

/// Parameters controlling a trim.
#[derive(Debug, Clone)]
pub struct TrimConfig {
    /// Name of the HDU holding one row per object. Default `FIBERMAP`.
    pub primary_segment: String,
    /// Position column pairs, in priority order.
    pub position_columns: Vec<PositionColumns>,
    /// Acceptance threshold in arcseconds. Default 1.0.
    pub max_arcsec: f64,
    /// Wider threshold only reported, never used for trimming. Default 3.0.
    pub report_arcsec: f64,
    /// Output path. None = `<stem>.trimmed.fits` next to the input.
    pub output: Option<PathBuf>,
    /// Delete the input after the output is written. Default false.
    pub delete_original: bool,
    pub match_config: MatchConfig,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            primary_segment: "FIBERMAP".to_string(),
            position_columns: PositionColumns::defaults(),
            max_arcsec: 1.0,
            report_arcsec: 3.0,
            output: None,
            delete_original: false,
            match_config: MatchConfig::default(),
        }
    }
}

/// Outcome of trimming one file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Primary rows before trimming.
    pub total_rows: usize,
    /// Rows within `max_arcsec` (the rows written).
    pub kept_rows: usize,
    /// Rows within `report_arcsec`.
    pub report_rows: usize,
    pub max_arcsec: f64,
    pub report_arcsec: f64,
    /// HDUs filtered to the keep set.
    pub segments_trimmed: usize,
    /// HDUs copied unchanged.
    pub segments_copied: usize,
    pub deleted_original: bool,
}

/// A trimmed file plus which HDUs were filtered.
#[derive(Debug, Clone)]
pub struct TrimmedFile {
    pub file: FitsFile,
    /// Indices of HDUs that were filtered to the keep set.
    pub trimmed_hdus: Vec<usize>,
}

/// Default output path: `coadd-X.fits` -> `coadd-X.trimmed.fits`.
pub fn trimmed_path(path: &Path) -> PathBuf {
    path.with_extension(&TRIMMED_SUFFIX[1..])
}

/// True for files that are themselves trimmed outputs.
pub fn is_trimmed_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TRIMMED_SUFFIX))
}

/// Restrict every row-aligned HDU of `file` to the rows in `keep`.
///
/// `keep` indexes the rows of the HDU named `primary_segment`. The result is a
/// new file; `file` is not modified. Fails with `InvariantViolation` if any
/// filtered HDU does not end up with exactly `keep.len()` rows.
pub fn trim_segments(file: &FitsFile, primary_segment: &str, keep: &KeepSet) -> Result<TrimmedFile> {
    let (primary_idx, primary) = file.find(primary_segment).ok_or_else(|| {
        SkytrimError::MalformedInput(format!("no {primary_segment} segment in file"))
    })?;
    let n_rows = primary.row_count().ok_or_else(|| {
        SkytrimError::MalformedInput(format!("{primary_segment} segment has no rows"))
    })?;
    keep.check_bounds(n_rows)?;

    let mut hdus = Vec::with_capacity(file.hdus.len());
    let mut trimmed_hdus = Vec::new();
    for (idx, hdu) in file.hdus.iter().enumerate() {
        if hdu.row_count() == Some(n_rows) {
            hdus.push(hdu.select_rows(keep)?);
            trimmed_hdus.push(idx);
        } else {
            hdus.push(hdu.clone());
        }
    }

    for &idx in &trimmed_hdus {
        let got = hdus[idx].row_count();
        if got != Some(keep.len()) {
            return Err(SkytrimError::InvariantViolation(format!(
                "HDU {} ({:?}) has {:?} rows after trimming, expected {}",
                idx,
                hdus[idx].name().unwrap_or_default(),
                got,
                keep.len()
            )));
        }
    }
    if !trimmed_hdus.contains(&primary_idx) {
        return Err(SkytrimError::InvariantViolation(format!(
            "{primary_segment} segment was not trimmed"
        )));
    }

    Ok(TrimmedFile {
        file: FitsFile::new(hdus),
        trimmed_hdus,
    })
}

/// Trim one target file against a reference catalog.
pub fn trim_file(path: &Path, reference: &Catalog, config: &TrimConfig) -> Result<TrimReport> {
    for (label, value) in [("max", config.max_arcsec), ("report", config.report_arcsec)] {
        if !value.is_finite() || value < 0.0 {
            return Err(SkytrimError::InvalidConfig(format!(
                "{label} threshold must be a non-negative number of arcseconds, got {value}"
            )));
        }
    }
    let output = config
        .output
        .clone()
        .unwrap_or_else(|| trimmed_path(path));
    if output == path {
        return Err(SkytrimError::InvalidConfig(format!(
            "output path {} is the input path",
            output.display()
        )));
    }

    let file = read_fits(path)?;
    let (_, primary) = file.find(&config.primary_segment).ok_or_else(|| {
        SkytrimError::MalformedInput(format!(
            "{}: no {} segment",
            path.display(),
            config.primary_segment
        ))
    })?;
    let targets = read_positions(primary, &config.position_columns)?;

    let keep = find_keep_set(&targets, reference, config.max_arcsec, &config.match_config)?;
    let report_rows = find_keep_set(
        &targets,
        reference,
        config.report_arcsec,
        &config.match_config,
    )?
    .len();

    let trimmed = trim_segments(&file, &config.primary_segment, &keep)?;
    write_fits(&output, &trimmed.file)?;

    info!("{}: rows: {}", path.display(), targets.len());
    info!("matched rows (<= {}\"): {}", config.max_arcsec, keep.len());
    info!("matched rows (<= {}\"): {}", config.report_arcsec, report_rows);
    info!("wrote: {}", output.display());

    let mut deleted_original = false;
    if config.delete_original {
        verify_written(&output, &config.primary_segment, keep.len())?;
        std::fs::remove_file(path).map_err(|e| SkytrimError::io(path, e))?;
        deleted_original = true;
        info!("deleted original: {}", path.display());
    }

    Ok(TrimReport {
        input: path.to_path_buf(),
        output,
        total_rows: targets.len(),
        kept_rows: keep.len(),
        report_rows,
        max_arcsec: config.max_arcsec,
        report_arcsec: config.report_arcsec,
        segments_trimmed: trimmed.trimmed_hdus.len(),
        segments_copied: trimmed.file.len() - trimmed.trimmed_hdus.len(),
        deleted_original,
    })
}

/// Re-read a written output and check its primary row count.
fn verify_written(output: &Path, primary_segment: &str, expected_rows: usize) -> Result<()> {
    let written = read_fits(output)?;
    let rows = written
        .find(primary_segment)
        .and_then(|(_, hdu)| hdu.row_count());
    if rows != Some(expected_rows) {
        return Err(SkytrimError::InvariantViolation(format!(
            "{} has {:?} {} rows on disk, expected {}",
            output.display(),
            rows,
            primary_segment,
            expected_rows
        )));
    }
    Ok(())
}
