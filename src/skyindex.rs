//! Spatial index over sky positions for fast cone (angular-radius) searches.
//!
//! `SkyIndex` bins points with an equal-area spherical grid: latitude is
//! partitioned into `3 * nside` bands in `z = sin(dec)`, and longitude into
//! `4 * nside` sectors in right ascension, for a total of `12 * nside^2` cells.
//! Each cell maps to a compact slice of point indices.
//!
//! Query flow:
//! 1. Compute the cells a cap of the requested radius can touch.
//! 2. Scan only points in those cells.
//! 3. Apply the exact great-circle test to each candidate.
//!
//! The cell enumeration is conservative (the cap's true RA half-width and
//! declination extent are used), so a point is returned if and only if its
//! separation from the query direction is within the radius.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::{SkyPoint, Vector3};

/// Slack added to cell bounds so points sitting exactly on a cell edge are not
/// lost to rounding.
const BOUND_EPS: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct SkyIndex {
    nside: u32,
    n_lat: u32,
    n_lon: u32,
    uvecs: Vec<Vector3>,
    cell_offsets: Vec<u32>,
    point_indices: Vec<u32>,
}

impl SkyIndex {
    /// Build an index over `points`.
    ///
    /// `nside` controls resolution and must be greater than zero.
    /// The number of sky cells is `12 * nside^2`.
    pub fn new(nside: u32, points: &[SkyPoint]) -> Self {
        let nside = nside.max(1);
        let n_lat = 3 * nside;
        let n_lon = 4 * nside;
        let n_cells = (n_lat as usize) * (n_lon as usize);

        let uvecs: Vec<Vector3> = points.iter().map(SkyPoint::uvec).collect();

        let mut bins: Vec<Vec<u32>> = vec![Vec::new(); n_cells];
        for (idx, v) in uvecs.iter().enumerate() {
            let cell = Self::cell_for_uvec(n_lat, n_lon, v);
            bins[cell].push(idx as u32);
        }

        let mut cell_offsets = Vec::with_capacity(n_cells + 1);
        let mut point_indices = Vec::with_capacity(points.len());
        cell_offsets.push(0);
        for cell_bin in bins {
            point_indices.extend(cell_bin);
            cell_offsets.push(point_indices.len() as u32);
        }

        Self {
            nside,
            n_lat,
            n_lon,
            uvecs,
            cell_offsets,
            point_indices,
        }
    }

    /// Return the index resolution parameter.
    pub fn nside(&self) -> u32 {
        self.nside
    }

    /// Return the number of indexed points.
    pub fn len(&self) -> usize {
        self.uvecs.len()
    }

    /// Return `true` when the index contains no points.
    pub fn is_empty(&self) -> bool {
        self.uvecs.is_empty()
    }

    /// Indices (ascending) of indexed points within `radius_rad` of `center`.
    pub fn query(&self, center: &SkyPoint, radius_rad: f64) -> Vec<usize> {
        self.query_with_distance(center, radius_rad)
            .into_iter()
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Like [`SkyIndex::query`], also returning each hit's separation in radians.
    pub fn query_with_distance(&self, center: &SkyPoint, radius_rad: f64) -> Vec<(usize, f64)> {
        if self.is_empty() || radius_rad.is_nan() || radius_rad < 0.0 {
            return Vec::new();
        }
        let radius = radius_rad.min(PI);
        let dir = center.uvec();

        let dec0 = dir.z.clamp(-1.0, 1.0).asin();
        let dec_lo = dec0 - radius;
        let dec_hi = dec0 + radius;
        let z_min = (dec_lo.max(-FRAC_PI_2).sin() - BOUND_EPS).max(-1.0);
        let z_max = (dec_hi.min(FRAC_PI_2).sin() + BOUND_EPS).min(1.0);

        // A cap that reaches a pole spans every RA.
        let full_ring = dec_hi >= FRAC_PI_2 || dec_lo <= -FRAC_PI_2 || radius >= FRAC_PI_2;
        let lon_half_span = if full_ring {
            PI
        } else {
            let ratio = radius.sin() / dec0.cos();
            if ratio >= 1.0 {
                PI
            } else {
                ratio.asin() + BOUND_EPS
            }
        };

        let phi = wrap_angle(dir.y.atan2(dir.x));

        let mut out = Vec::new();
        for lat_bin in Self::z_bin_range(self.n_lat, z_min, z_max) {
            if lon_half_span >= PI {
                for lon_bin in 0..self.n_lon {
                    self.collect_cell_matches(lat_bin, lon_bin, &dir, radius, &mut out);
                }
                continue;
            }
            self.for_each_wrapped_lon_bin(phi - lon_half_span, phi + lon_half_span, |lon_bin| {
                self.collect_cell_matches(lat_bin, lon_bin, &dir, radius, &mut out);
            });
        }

        out.sort_unstable_by_key(|&(idx, _)| idx);
        out.dedup_by_key(|&mut (idx, _)| idx);
        out
    }

    fn collect_cell_matches(
        &self,
        lat_bin: u32,
        lon_bin: u32,
        dir: &Vector3,
        radius: f64,
        out: &mut Vec<(usize, f64)>,
    ) {
        let cell = (lat_bin * self.n_lon + lon_bin) as usize;
        let start = self.cell_offsets[cell] as usize;
        let end = self.cell_offsets[cell + 1] as usize;

        for &idx in &self.point_indices[start..end] {
            let idx = idx as usize;
            let sep = great_circle_rad(dir, &self.uvecs[idx]);
            if sep <= radius {
                out.push((idx, sep));
            }
        }
    }

    fn for_each_wrapped_lon_bin<F>(&self, lon_min: f64, lon_max: f64, mut f: F)
    where
        F: FnMut(u32),
    {
        let start_bin = Self::phi_to_lon_bin(self.n_lon, wrap_angle(lon_min));
        let end_bin = Self::phi_to_lon_bin(self.n_lon, wrap_angle(lon_max));

        if lon_min >= 0.0 && lon_max < TAU {
            for lon_bin in start_bin..=end_bin {
                f(lon_bin);
            }
            return;
        }

        // Interval crosses RA = 0; overlapping bins are deduplicated by the caller.
        for lon_bin in start_bin..self.n_lon {
            f(lon_bin);
        }
        for lon_bin in 0..=end_bin {
            f(lon_bin);
        }
    }

    fn z_bin_range(n_lat: u32, z_min: f64, z_max: f64) -> std::ops::RangeInclusive<u32> {
        let start = Self::z_to_lat_bin(n_lat, z_min);
        let end = Self::z_to_lat_bin(n_lat, z_max);
        start..=end
    }

    fn cell_for_uvec(n_lat: u32, n_lon: u32, v: &Vector3) -> usize {
        let phi = wrap_angle(v.y.atan2(v.x));
        let lat_bin = Self::z_to_lat_bin(n_lat, v.z);
        let lon_bin = Self::phi_to_lon_bin(n_lon, phi);
        (lat_bin * n_lon + lon_bin) as usize
    }

    fn z_to_lat_bin(n_lat: u32, z: f64) -> u32 {
        let u = ((z.clamp(-1.0, 1.0) + 1.0) * 0.5).clamp(0.0, 1.0);
        let idx = (u * n_lat as f64).floor() as u32;
        idx.min(n_lat - 1)
    }

    fn phi_to_lon_bin(n_lon: u32, phi: f64) -> u32 {
        let u = (phi / TAU).clamp(0.0, 1.0);
        let idx = (u * n_lon as f64).floor() as u32;
        idx.min(n_lon - 1)
    }
}

/// Great-circle angle between two unit vectors, via the chord length.
///
/// `2 asin(|a - b| / 2)` stays accurate for sub-arcsecond separations where
/// the law of cosines loses most of its digits.
pub fn great_circle_rad(a: &Vector3, b: &Vector3) -> f64 {
    let half_chord = ((a - b).norm() * 0.5).min(1.0);
    2.0 * half_chord.asin()
}

fn wrap_angle(theta_rad: f64) -> f64 {
    let t = theta_rad.rem_euclid(TAU);
    if t >= TAU {
        0.0
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn deg2rad(d: f64) -> f64 {
        d.to_radians()
    }

    fn brute_force(points: &[SkyPoint], center: &SkyPoint, radius: f64) -> Vec<usize> {
        let c = center.uvec();
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| great_circle_rad(&c, &p.uvec()) <= radius)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn cone_query_finds_nearby_points() {
        let points = vec![
            SkyPoint::new(0.0, 0.0),
            SkyPoint::new(2.0, 1.0),
            SkyPoint::new(40.0, -10.0),
        ];
        let index = SkyIndex::new(8, &points);
        let hits = index.query(&SkyPoint::new(0.5, 0.25), deg2rad(3.0));
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn cone_query_handles_ra_wraparound() {
        let points = vec![
            SkyPoint::new(359.0, 0.0),
            SkyPoint::new(1.0, 0.0),
            SkyPoint::new(180.0, 0.0),
        ];
        let index = SkyIndex::new(8, &points);
        let hits = index.query(&SkyPoint::new(0.0, 0.0), deg2rad(3.0));
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn cone_query_across_the_pole() {
        let points = vec![
            SkyPoint::new(0.0, 89.5),
            SkyPoint::new(180.0, 89.5),
            SkyPoint::new(90.0, 80.0),
        ];
        let index = SkyIndex::new(16, &points);
        let hits = index.query(&SkyPoint::new(0.0, 90.0), deg2rad(1.0));
        assert_eq!(hits, vec![0, 1]);
        // 1 degree apart through the pole
        let hits = index.query(&SkyPoint::new(0.0, 89.5), deg2rad(1.0 + 1e-9));
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn random_queries_agree_with_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<SkyPoint> = (0..3000)
            .map(|_| {
                let ra = rng.random_range(0.0..360.0);
                let z: f64 = rng.random_range(-1.0..1.0);
                SkyPoint::new(ra, z.asin().to_degrees())
            })
            .collect();
        for nside in [1, 4, 32] {
            let index = SkyIndex::new(nside, &points);
            for _ in 0..200 {
                let z: f64 = rng.random_range(-1.0..1.0);
                let center = SkyPoint::new(rng.random_range(0.0..360.0), z.asin().to_degrees());
                let radius = deg2rad(rng.random_range(0.0..12.0));
                assert_eq!(
                    index.query(&center, radius),
                    brute_force(&points, &center, radius)
                );
            }
        }
    }

    #[test]
    fn distances_are_reported() {
        let points = vec![SkyPoint::new(10.0, 0.0)];
        let index = SkyIndex::new(4, &points);
        let hits = index.query_with_distance(&SkyPoint::new(10.5, 0.0), deg2rad(1.0));
        assert_eq!(hits.len(), 1);
        assert!((hits[0].1 - deg2rad(0.5)).abs() < 1e-12);
    }

    #[test]
    fn empty_index_and_negative_radius() {
        let index = SkyIndex::new(4, &[]);
        assert!(index.is_empty());
        assert!(index.query(&SkyPoint::new(0.0, 0.0), 1.0).is_empty());

        let index = SkyIndex::new(4, &[SkyPoint::new(0.0, 0.0)]);
        assert!(index.query(&SkyPoint::new(0.0, 0.0), -1.0).is_empty());
        assert_eq!(index.query(&SkyPoint::new(0.0, 0.0), 0.0), vec![0]);
    }

    #[test]
    fn chord_separation_is_accurate_at_arcsecond_scale() {
        let a = SkyPoint::new(10.0, 5.0).uvec();
        let b = SkyPoint::new(10.0, 5.0 + 1.0 / 3600.0).uvec();
        let sep_arcsec = great_circle_rad(&a, &b).to_degrees() * 3600.0;
        assert!((sep_arcsec - 1.0).abs() < 1e-6);
    }
}
