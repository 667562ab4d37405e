//! Radius-bounded crossmatching between two catalogs.
//!
//! `search_around_sky` returns every `(i, j)` pair whose great-circle
//! separation is within the threshold, not only the nearest neighbour, so one
//! target row may match several reference rows and vice versa. The second
//! catalog is binned into a [`SkyIndex`] and each point of the first catalog
//! runs a cone query against it.

use tracing::debug;

use crate::error::{Result, SkytrimError};
use crate::separation::ARCSEC_PER_RAD;
use crate::{Catalog, SkyIndex};

/// Parameters for the radius matcher.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    /// Resolution of the spatial index built over the second catalog.
    /// The sky is split into `12 * nside^2` cells. Default 128 (~0.46° cells).
    pub nside: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { nside: 128 }
    }
}

/// One correspondence between the two catalogs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPair {
    /// Row in the first catalog.
    pub a_idx: usize,
    /// Row in the second catalog.
    pub b_idx: usize,
    /// Great-circle separation in arcseconds.
    pub sep_arcsec: f64,
}

/// All pairs within the threshold, sorted by `(a_idx, b_idx)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub max_arcsec: f64,
    pub pairs: Vec<MatchPair>,
}

impl MatchResult {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `(a_idx, b_idx)` pairs without separations.
    pub fn index_pairs(&self) -> Vec<(usize, usize)> {
        self.pairs.iter().map(|p| (p.a_idx, p.b_idx)).collect()
    }

    /// Unique first-catalog rows that took part in any match.
    pub fn keep_set_a(&self) -> KeepSet {
        KeepSet::from_indices(self.pairs.iter().map(|p| p.a_idx))
    }

    /// Unique second-catalog rows that took part in any match.
    pub fn keep_set_b(&self) -> KeepSet {
        KeepSet::from_indices(self.pairs.iter().map(|p| p.b_idx))
    }
}

/// Distinct row indices into a primary segment, stored ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepSet {
    indices: Vec<usize>,
}

impl KeepSet {
    /// Build a keep set from any index sequence; duplicates are dropped.
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    /// Every row of an `n_rows` segment.
    pub fn all(n_rows: usize) -> Self {
        Self {
            indices: (0..n_rows).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.indices.binary_search(&idx).is_ok()
    }

    /// Indices in ascending order.
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Check every index is below `n_rows`.
    pub fn check_bounds(&self, n_rows: usize) -> Result<()> {
        match self.indices.last() {
            Some(&max) if max >= n_rows => Err(SkytrimError::InvariantViolation(format!(
                "keep set index {max} out of range for {n_rows} rows"
            ))),
            _ => Ok(()),
        }
    }
}

/// Find every pair `(i, j)` with separation(a[i], b[j]) <= `max_arcsec`.
pub fn search_around_sky(
    a: &Catalog,
    b: &Catalog,
    max_arcsec: f64,
    config: &MatchConfig,
) -> Result<MatchResult> {
    if !max_arcsec.is_finite() || max_arcsec < 0.0 {
        return Err(SkytrimError::InvalidConfig(format!(
            "match threshold must be a non-negative number of arcseconds, got {max_arcsec}"
        )));
    }
    if config.nside == 0 {
        return Err(SkytrimError::InvalidConfig("nside must be > 0".to_string()));
    }

    let mut pairs = Vec::new();
    if a.is_empty() || b.is_empty() {
        return Ok(MatchResult { max_arcsec, pairs });
    }

    let index = SkyIndex::new(config.nside, b.points());
    let radius_rad = max_arcsec / ARCSEC_PER_RAD;
    for (a_idx, point) in a.points().iter().enumerate() {
        for (b_idx, sep_rad) in index.query_with_distance(point, radius_rad) {
            pairs.push(MatchPair {
                a_idx,
                b_idx,
                sep_arcsec: sep_rad * ARCSEC_PER_RAD,
            });
        }
    }
    debug!(
        "search_around_sky: {} x {} within {}\" -> {} pairs",
        a.len(),
        b.len(),
        max_arcsec,
        pairs.len()
    );

    Ok(MatchResult { max_arcsec, pairs })
}

/// Rows of `targets` within `max_arcsec` of any point of `reference`.
pub fn find_keep_set(
    targets: &Catalog,
    reference: &Catalog,
    max_arcsec: f64,
    config: &MatchConfig,
) -> Result<KeepSet> {
    Ok(search_around_sky(targets, reference, max_arcsec, config)?.keep_set_a())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skyindex::great_circle_rad;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn clustered(rng: &mut StdRng, n: usize) -> Catalog {
        (0..n)
            .map(|_| {
                crate::SkyPoint::new(
                    rng.random_range(149.99..150.01),
                    rng.random_range(2.19..2.21),
                )
            })
            .collect()
    }

    #[test]
    fn end_to_end_example_keep_set() {
        let reference = Catalog::from_radec(&[(10.0, 5.0), (10.0001, 5.0001)]);
        let targets = Catalog::from_radec(&[(10.0, 5.0), (50.0, 50.0), (10.00005, 5.00005)]);
        let keep = find_keep_set(&targets, &reference, 1.0, &MatchConfig::default()).unwrap();
        assert_eq!(keep.as_slice(), &[0, 2]);
    }

    #[test]
    fn many_to_many_pairs() {
        let reference = Catalog::from_radec(&[(10.0, 5.0), (10.0001, 5.0001)]);
        let targets = Catalog::from_radec(&[(10.0, 5.0), (50.0, 50.0), (10.00005, 5.00005)]);
        let result = search_around_sky(&targets, &reference, 1.0, &MatchConfig::default()).unwrap();
        assert_eq!(result.index_pairs(), vec![(0, 0), (0, 1), (2, 0), (2, 1)]);
        assert_eq!(result.keep_set_b().as_slice(), &[0, 1]);
        assert!(result.pairs.iter().all(|p| p.sep_arcsec <= 1.0));
    }

    #[test]
    fn radius_match_is_monotonic() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = clustered(&mut rng, 400);
        let b = clustered(&mut rng, 400);
        let config = MatchConfig { nside: 64 };
        let mut previous: Vec<(usize, usize)> = Vec::new();
        for theta in [0.5, 1.0, 3.0, 10.0, 30.0] {
            let pairs = search_around_sky(&a, &b, theta, &config)
                .unwrap()
                .index_pairs();
            assert!(previous.iter().all(|p| pairs.binary_search(p).is_ok()));
            assert!(pairs.len() >= previous.len());
            previous = pairs;
        }
    }

    #[test]
    fn agrees_with_brute_force_for_any_nside() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = clustered(&mut rng, 300);
        let b = clustered(&mut rng, 250);
        let theta = 8.0;
        let radius = theta / ARCSEC_PER_RAD;
        let mut expected = Vec::new();
        for (i, pa) in a.points().iter().enumerate() {
            for (j, pb) in b.points().iter().enumerate() {
                if great_circle_rad(&pa.uvec(), &pb.uvec()) <= radius {
                    expected.push((i, j));
                }
            }
        }
        assert!(!expected.is_empty());
        for nside in [1, 16, 1024] {
            let got = search_around_sky(&a, &b, theta, &MatchConfig { nside })
                .unwrap()
                .index_pairs();
            assert_eq!(got, expected, "nside {}", nside);
        }
    }

    #[test]
    fn far_catalogs_give_empty_keep_set() {
        let reference = Catalog::from_radec(&[(200.0, -30.0)]);
        let targets = Catalog::from_radec(&[(200.1, -30.0), (10.0, 10.0)]);
        let keep = find_keep_set(&targets, &reference, 100.0, &MatchConfig::default()).unwrap();
        assert!(keep.is_empty());
    }

    #[test]
    fn invalid_threshold_rejected() {
        let c = Catalog::from_radec(&[(0.0, 0.0)]);
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(search_around_sky(&c, &c, bad, &MatchConfig::default()).is_err());
        }
    }

    #[test]
    fn keep_set_dedups_and_sorts() {
        let keep = KeepSet::from_indices([5, 1, 5, 3, 1]);
        assert_eq!(keep.as_slice(), &[1, 3, 5]);
        assert!(keep.contains(3));
        assert!(!keep.contains(2));
        assert!(keep.check_bounds(6).is_ok());
        assert!(matches!(
            keep.check_bounds(5),
            Err(SkytrimError::InvariantViolation(_))
        ));
        assert_eq!(KeepSet::all(3).as_slice(), &[0, 1, 2]);
    }
}
