//! CLI argument definitions for skytrim

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use skytrim::matcher::MatchConfig;
use skytrim::pipeline::WatchConfig;
use skytrim::separation::SeparationConfig;
use skytrim::trim::PositionColumns;
use skytrim::{CatalogConfig, TrimConfig};

#[derive(Parser)]
#[command(name = "skytrim")]
#[command(about = "Crossmatch survey catalogs and trim FITS coadds to matched rows")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Trim one coadd file to rows matching the catalog
    Trim(TrimArgs),

    /// Trim every coadd file under a directory
    Batch(BatchArgs),

    /// Poll a directory and trim coadd files as they arrive
    Watch(WatchArgs),

    /// Count catalog matches over coadd files without writing anything
    Count(CountArgs),
}

#[derive(Args)]
pub struct CatalogArgs {
    /// RA column of the reference CSV
    #[arg(long, default_value = "RA_DESI")]
    pub ra_col: String,

    /// Dec column of the reference CSV
    #[arg(long, default_value = "DEC_DESI")]
    pub dec_col: String,

    /// Read only the first N catalog rows (for quick tests)
    #[arg(long)]
    pub csv_limit: Option<usize>,
}

impl CatalogArgs {
    pub fn config(&self) -> CatalogConfig {
        CatalogConfig {
            ra_column: self.ra_col.clone(),
            dec_column: self.dec_col.clone(),
            row_limit: self.csv_limit,
        }
    }
}

#[derive(Args)]
pub struct TrimFlags {
    /// Keep rows within this many arcseconds of a catalog position
    #[arg(long, default_value = "1.0")]
    pub max_arcsec: f64,

    /// Also report the number of rows within this wider radius
    #[arg(long, default_value = "3.0")]
    pub report_arcsec: f64,

    /// Delete the input after the trimmed file is written
    #[arg(long)]
    pub delete_original: bool,

    /// Name of the row table HDU
    #[arg(long, default_value = "FIBERMAP")]
    pub primary: String,

    /// Cell index resolution for matching
    #[arg(long, default_value = "128")]
    pub nside: u32,
}

impl TrimFlags {
    pub fn config(&self, output: Option<PathBuf>) -> TrimConfig {
        TrimConfig {
            primary_segment: self.primary.clone(),
            position_columns: PositionColumns::defaults(),
            max_arcsec: self.max_arcsec,
            report_arcsec: self.report_arcsec,
            output,
            delete_original: self.delete_original,
            match_config: MatchConfig { nside: self.nside },
        }
    }
}

#[derive(Args)]
pub struct TrimArgs {
    /// Coadd FITS file
    pub file: PathBuf,

    /// Reference catalog CSV
    pub catalog: PathBuf,

    /// Output path (default: <stem>.trimmed.fits)
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub catalog_args: CatalogArgs,

    #[command(flatten)]
    pub trim: TrimFlags,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Directory containing coadd-*.fits files
    pub root: PathBuf,

    /// Reference catalog CSV
    pub catalog: PathBuf,

    #[command(flatten)]
    pub catalog_args: CatalogArgs,

    #[command(flatten)]
    pub trim: TrimFlags,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Directory to poll for coadd-*.fits files
    pub root: PathBuf,

    /// Reference catalog CSV
    pub catalog: PathBuf,

    /// Seconds between polls
    #[arg(long, default_value = "5")]
    pub poll_seconds: u64,

    /// Only trim files unmodified for at least this many seconds
    #[arg(long, default_value = "30")]
    pub min_age_seconds: u64,

    #[command(flatten)]
    pub catalog_args: CatalogArgs,

    #[command(flatten)]
    pub trim: TrimFlags,
}

impl WatchArgs {
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            poll_interval: Duration::from_secs(self.poll_seconds),
            min_age: Duration::from_secs(self.min_age_seconds),
            ..Default::default()
        }
    }
}

#[derive(Args)]
pub struct CountArgs {
    /// Reference catalog CSV
    pub catalog: PathBuf,

    /// Directories containing coadd-*.fits files
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Match radius in arcseconds
    #[arg(long, default_value = "1.0")]
    pub max_arcsec: f64,

    /// Count only the first N files (for quick tests)
    #[arg(long)]
    pub limit_files: Option<usize>,

    /// Recount every file with the all-pairs separation engine (slow)
    #[arg(long)]
    pub cross_check: bool,

    /// Catalog rows per separation chunk (with --cross-check)
    #[arg(long, default_value = "1000")]
    pub chunk_size: usize,

    #[command(flatten)]
    pub catalog_args: CatalogArgs,
}

impl CountArgs {
    pub fn separation_config(&self) -> SeparationConfig {
        SeparationConfig {
            chunk_size: self.chunk_size,
        }
    }
}
