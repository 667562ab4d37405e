//! skytrim: crossmatch a reference catalog against FITS coadds and trim them
//! to the matched rows.

mod cli;

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{BatchArgs, CatalogArgs, Cli, Commands, CountArgs, TrimArgs, WatchArgs};
use skytrim::pipeline::{count_matches, discover, run_batch, run_watch, CountConfig};
use skytrim::{trim_file, Catalog, DiscoveryConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Trim(args) => trim(args),
        Commands::Batch(args) => batch(args),
        Commands::Watch(args) => watch(args),
        Commands::Count(args) => count(args),
    }
}

fn load_catalog(path: &Path, args: &CatalogArgs) -> anyhow::Result<Catalog> {
    Catalog::from_csv_path(path, &args.config())
        .with_context(|| format!("Failed to load catalog {}", path.display()))
}

fn trim(args: &TrimArgs) -> anyhow::Result<()> {
    let reference = load_catalog(&args.catalog, &args.catalog_args)?;
    let config = args.trim.config(args.out.clone());
    trim_file(&args.file, &reference, &config)
        .with_context(|| format!("Failed to trim {}", args.file.display()))?;
    Ok(())
}

fn batch(args: &BatchArgs) -> anyhow::Result<()> {
    let reference = load_catalog(&args.catalog, &args.catalog_args)?;
    let config = args.trim.config(None);
    let report = run_batch(&args.root, &reference, &DiscoveryConfig::default(), &config)
        .with_context(|| format!("Failed to scan {}", args.root.display()))?;
    let failed = report.num_failed();
    if failed > 0 {
        bail!("{failed} of {} files failed", report.files.len());
    }
    Ok(())
}

fn watch(args: &WatchArgs) -> anyhow::Result<()> {
    let reference = load_catalog(&args.catalog, &args.catalog_args)?;
    let config = args.trim.config(None);
    run_watch(&args.root, &args.watch_config(), |path| {
        trim_file(path, &reference, &config)
    })
}

fn count(args: &CountArgs) -> anyhow::Result<()> {
    let reference = load_catalog(&args.catalog, &args.catalog_args)?;
    let mut files = Vec::new();
    for root in &args.roots {
        let found = discover(root, &DiscoveryConfig::default())
            .with_context(|| format!("Failed to scan {}", root.display()))?;
        files.extend(found);
    }
    if let Some(limit) = args.limit_files {
        files.truncate(limit);
    }
    info!("coadd files found: {}", files.len());

    let config = CountConfig {
        max_arcsec: args.max_arcsec,
        cross_check: args.cross_check,
        separation: args.separation_config(),
        ..Default::default()
    };
    let tally = count_matches(&files, &reference, &config);
    if !tally.failed.is_empty() {
        bail!("{} of {} files failed", tally.failed.len(), files.len());
    }
    Ok(())
}
