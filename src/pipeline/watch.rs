//! Continuous mode: poll a directory and trim target files as they settle.
//!
//! Each poll lists the root, skips files already handled (in the seen set, or
//! with a trimmed companion on disk) and files modified less than `min_age`
//! ago, and trims the rest exactly once. Files that fail are left out of the
//! seen set and are tried again on a later poll.
//!
//! The age check assumes a writer that has not touched a file for `min_age`
//! is done with it. Nothing stronger is checked.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use super::{discover, has_trimmed_companion, DiscoveryConfig};
use crate::error::{Result, SkytrimError};
use crate::trim::TrimReport;

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Sleep between polls. Default 5 s.
    pub poll_interval: Duration,
    /// Minimum time since last modification before a file is trimmed.
    /// Default 30 s.
    pub min_age: Duration,
    pub discovery: DiscoveryConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            min_age: Duration::from_secs(30),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Files already trimmed by this watcher. Owned by the loop and threaded
/// through every poll.
#[derive(Debug, Clone, Default)]
pub struct WatchState {
    pub seen: HashSet<PathBuf>,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What one poll did.
#[derive(Debug, Default)]
pub struct PollReport {
    pub trimmed: Vec<TrimReport>,
    /// Modified too recently; revisited on a later poll.
    pub waiting: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, SkytrimError)>,
    /// Already seen or already carrying a trimmed companion.
    pub skipped: usize,
}

/// Run one scan of `root`, trimming every settled, unhandled file with `trim`.
///
/// `now` is the reference time for the age check.
pub fn poll_once<F>(
    state: &mut WatchState,
    root: &Path,
    now: SystemTime,
    config: &WatchConfig,
    mut trim: F,
) -> Result<PollReport>
where
    F: FnMut(&Path) -> Result<TrimReport>,
{
    let mut report = PollReport::default();
    for path in discover(root, &config.discovery)? {
        if state.seen.contains(&path) || has_trimmed_companion(&path) {
            report.skipped += 1;
            continue;
        }

        match file_age(&path, now) {
            Ok(age) if age < config.min_age => {
                debug!("{}: modified {:?} ago, waiting", path.display(), age);
                report.waiting.push(path);
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                // Vanished or unreadable between listing and stat.
                warn!("{}: {}", path.display(), e);
                report.failed.push((path, e));
                continue;
            }
        }

        info!("new file: {}", path.display());
        match trim(&path) {
            Ok(r) => {
                state.seen.insert(path);
                report.trimmed.push(r);
            }
            Err(e) => {
                error!("{}: {}", path.display(), e);
                report.failed.push((path, e));
            }
        }
    }
    Ok(report)
}

/// Poll `root` forever, sleeping `poll_interval` between scans.
///
/// A failure to list `root` is logged and the loop carries on.
pub fn run_watch<F>(root: &Path, config: &WatchConfig, mut trim: F) -> !
where
    F: FnMut(&Path) -> Result<TrimReport>,
{
    info!(
        "watching {} every {:?}",
        root.display(),
        config.poll_interval
    );
    warn!(
        "files are trimmed once unmodified for {:?}; this is a heuristic and a slow writer can be read early",
        config.min_age
    );

    let mut state = WatchState::new();
    loop {
        match poll_once(&mut state, root, SystemTime::now(), config, &mut trim) {
            Ok(report) if !report.trimmed.is_empty() || !report.failed.is_empty() => {
                info!(
                    "poll: {} trimmed, {} failed, {} waiting",
                    report.trimmed.len(),
                    report.failed.len(),
                    report.waiting.len()
                );
            }
            Ok(_) => {}
            Err(e) => error!("poll of {} failed: {}", root.display(), e),
        }
        thread::sleep(config.poll_interval);
    }
}

fn file_age(path: &Path, now: SystemTime) -> Result<Duration> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| SkytrimError::io(path, e))?;
    // A timestamp in the future counts as just modified.
    Ok(now.duration_since(modified).unwrap_or(Duration::ZERO))
}
