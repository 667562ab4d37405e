//! Chunked minimum angular separation between two point sets.
//!
//! For every point of the first set, the minimum great-circle separation to any
//! point of the second set is computed with the spherical law of cosines. The
//! first set is processed in blocks of at most `chunk_size` points, so only a
//! `chunk_size × M` block of separations exists at any time. Chunking bounds
//! memory only; the result does not depend on it.

use tracing::debug;

use crate::error::{Result, SkytrimError};
use crate::SkyPoint;

/// Arcseconds per radian.
pub const ARCSEC_PER_RAD: f64 = 180.0 * 3600.0 / std::f64::consts::PI;

/// Parameters for the chunked separation engine.
#[derive(Debug, Clone, Copy)]
pub struct SeparationConfig {
    /// Number of first-set points per block. Must be > 0. Default 1000.
    pub chunk_size: usize,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self { chunk_size: 1000 }
    }
}

/// Precomputed trigonometry for one side of the separation product.
struct Trig {
    ra: Vec<f64>,
    sin_dec: Vec<f64>,
    cos_dec: Vec<f64>,
}

impl Trig {
    fn new(points: &[SkyPoint]) -> Self {
        let mut ra = Vec::with_capacity(points.len());
        let mut sin_dec = Vec::with_capacity(points.len());
        let mut cos_dec = Vec::with_capacity(points.len());
        for p in points {
            let (s, c) = p.dec_rad().sin_cos();
            ra.push(p.ra_rad());
            sin_dec.push(s);
            cos_dec.push(c);
        }
        Self { ra, sin_dec, cos_dec }
    }
}

/// Separation in arcseconds between two points via the spherical law of cosines.
///
/// The cosine is clamped to `[-1, 1]` before `acos`, so coincident points give
/// a tiny non-negative separation instead of NaN.
pub fn separation_arcsec(a: &SkyPoint, b: &SkyPoint) -> f64 {
    let (sa, ca) = a.dec_rad().sin_cos();
    let (sb, cb) = b.dec_rad().sin_cos();
    cos_law_arcsec(sa, ca, a.ra_rad(), sb, cb, b.ra_rad())
}

#[inline]
fn cos_law_arcsec(sin1: f64, cos1: f64, ra1: f64, sin2: f64, cos2: f64, ra2: f64) -> f64 {
    let cos_sep = sin1 * sin2 + cos1 * cos2 * (ra1 - ra2).cos();
    cos_sep.clamp(-1.0, 1.0).acos() * ARCSEC_PER_RAD
}

/// Minimum separation (arcseconds) from each point of `a` to any point of `b`.
///
/// Returns one value per point of `a`. When `b` is empty every entry is
/// `f64::INFINITY`.
pub fn min_separation_arcsec(
    a: &[SkyPoint],
    b: &[SkyPoint],
    config: &SeparationConfig,
) -> Result<Vec<f64>> {
    if config.chunk_size == 0 {
        return Err(SkytrimError::InvalidConfig(
            "separation chunk size must be > 0".to_string(),
        ));
    }

    let mut min_sep = vec![f64::INFINITY; a.len()];
    if a.is_empty() || b.is_empty() {
        return Ok(min_sep);
    }

    let tb = Trig::new(b);
    // One row of the block; reused for every point of every chunk.
    let mut row = vec![0.0f64; b.len()];

    for (chunk_idx, (chunk, out)) in a
        .chunks(config.chunk_size)
        .zip(min_sep.chunks_mut(config.chunk_size))
        .enumerate()
    {
        let ta = Trig::new(chunk);
        for (k, slot) in out.iter_mut().enumerate() {
            for (j, sep) in row.iter_mut().enumerate() {
                *sep = cos_law_arcsec(
                    ta.sin_dec[k],
                    ta.cos_dec[k],
                    ta.ra[k],
                    tb.sin_dec[j],
                    tb.cos_dec[j],
                    tb.ra[j],
                );
            }
            *slot = row.iter().copied().fold(f64::INFINITY, f64::min);
        }
        debug!(
            "separation chunk {} ({} x {}) done",
            chunk_idx,
            chunk.len(),
            b.len()
        );
    }

    Ok(min_sep)
}

/// Number of points of `a` whose minimum separation to `b` is within `max_arcsec`.
pub fn count_within(
    a: &[SkyPoint],
    b: &[SkyPoint],
    max_arcsec: f64,
    config: &SeparationConfig,
) -> Result<usize> {
    Ok(min_separation_arcsec(a, b, config)?
        .into_iter()
        .filter(|&s| s <= max_arcsec)
        .count())
}
