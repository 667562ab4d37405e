/// A position on the celestial sphere, in degrees.
///
/// Right ascension is normalized into `[0, 360)` on construction. Declination is
/// expected in `[-90, 90]`; it is not validated, out-of-range values are the
/// caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPoint {
    ra_deg: f64,
    dec_deg: f64,
}

impl SkyPoint {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        let mut ra = ra_deg.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if ra >= 360.0 {
            ra = 0.0;
        }
        Self {
            ra_deg: ra,
            dec_deg,
        }
    }

    pub fn ra_deg(&self) -> f64 {
        self.ra_deg
    }

    pub fn dec_deg(&self) -> f64 {
        self.dec_deg
    }

    pub fn ra_rad(&self) -> f64 {
        self.ra_deg.to_radians()
    }

    pub fn dec_rad(&self) -> f64 {
        self.dec_deg.to_radians()
    }

    /// Unit vector pointing to the position on the celestial sphere.
    pub fn uvec(&self) -> crate::Vector3 {
        // fast cosine, sine at once:
        let (rasin, racos) = self.ra_rad().sin_cos();
        let (decsin, deccos) = self.dec_rad().sin_cos();
        crate::Vector3::new(deccos * racos, deccos * rasin, decsin)
    }
}

impl From<(f64, f64)> for SkyPoint {
    fn from((ra_deg, dec_deg): (f64, f64)) -> Self {
        Self::new(ra_deg, dec_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ra_is_wrapped_into_range() {
        assert_eq!(SkyPoint::new(370.0, 0.0).ra_deg(), 10.0);
        assert_eq!(SkyPoint::new(-10.0, 0.0).ra_deg(), 350.0);
        assert_eq!(SkyPoint::new(360.0, 0.0).ra_deg(), 0.0);
        let tiny = SkyPoint::new(-1e-20, 0.0).ra_deg();
        assert!((0.0..360.0).contains(&tiny));
    }

    #[test]
    fn declination_passes_through() {
        let p = SkyPoint::new(10.0, -45.5);
        assert_eq!(p.dec_deg(), -45.5);
    }

    #[test]
    fn uvec_is_unit_length() {
        let v = SkyPoint::new(123.4, -56.7).uvec();
        assert!((v.norm() - 1.0).abs() < 1e-12);
        let pole = SkyPoint::new(0.0, 90.0).uvec();
        assert!((pole.z - 1.0).abs() < 1e-12);
    }
}
