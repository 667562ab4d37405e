//! Reference catalogs: ordered sky positions loaded from a headered CSV file.
//!
//! Only the two configured coordinate columns are read; all other columns are
//! ignored. The row index of each point is its position in the file (after the
//! header), which is how matches are mapped back to caller data.

use std::fs::File;
use std::path::Path;

use tracing::info;

use crate::error::{Result, SkytrimError};
use crate::SkyPoint;

/// Column selection for CSV catalogs.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Header name of the right ascension column (degrees).
    pub ra_column: String,
    /// Header name of the declination column (degrees).
    pub dec_column: String,
    /// Read at most this many data rows. None = read the whole file.
    pub row_limit: Option<usize>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ra_column: "RA_DESI".to_string(),
            dec_column: "DEC_DESI".to_string(),
            row_limit: None,
        }
    }
}

/// An ordered set of sky positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    points: Vec<SkyPoint>,
}

impl Catalog {
    pub fn new(points: Vec<SkyPoint>) -> Self {
        Self { points }
    }

    /// Build a catalog from `(ra_deg, dec_deg)` pairs.
    pub fn from_radec(coords: &[(f64, f64)]) -> Self {
        Self::new(coords.iter().copied().map(SkyPoint::from).collect())
    }

    /// Build a catalog from parallel RA and Dec columns.
    pub fn from_columns(ra_deg: &[f64], dec_deg: &[f64]) -> Result<Self> {
        if ra_deg.len() != dec_deg.len() {
            return Err(SkytrimError::MalformedInput(format!(
                "RA column has {} values but DEC column has {}",
                ra_deg.len(),
                dec_deg.len()
            )));
        }
        Ok(Self::new(
            ra_deg
                .iter()
                .zip(dec_deg)
                .map(|(&ra, &dec)| SkyPoint::new(ra, dec))
                .collect(),
        ))
    }

    /// Load a catalog from a CSV file with a header row.
    pub fn from_csv_path<P: AsRef<Path>>(path: P, config: &CatalogConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SkytrimError::io(path, e))?;
        let catalog = Self::from_csv_reader(file, config)?;
        info!(
            "Loaded {} catalog rows from {} ({}/{})",
            catalog.len(),
            path.display(),
            config.ra_column,
            config.dec_column
        );
        Ok(catalog)
    }

    /// Load a catalog from any CSV byte stream with a header row.
    pub fn from_csv_reader<R: std::io::Read>(reader: R, config: &CatalogConfig) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let column_index = |name: &str| {
            headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
                SkytrimError::MalformedInput(format!("catalog has no column named {name:?}"))
            })
        };
        let ra_idx = column_index(&config.ra_column)?;
        let dec_idx = column_index(&config.dec_column)?;

        let limit = config.row_limit.unwrap_or(usize::MAX);
        let mut points = Vec::new();
        for (row, record) in rdr.records().take(limit).enumerate() {
            let record = record?;
            let ra = parse_coordinate(record.get(ra_idx), &config.ra_column, row)?;
            let dec = parse_coordinate(record.get(dec_idx), &config.dec_column, row)?;
            points.push(SkyPoint::new(ra, dec));
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SkyPoint] {
        &self.points
    }

    pub fn get(&self, idx: usize) -> Option<&SkyPoint> {
        self.points.get(idx)
    }
}

impl FromIterator<SkyPoint> for Catalog {
    fn from_iter<I: IntoIterator<Item = SkyPoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn parse_coordinate(field: Option<&str>, column: &str, row: usize) -> Result<f64> {
    let raw = field.unwrap_or("").trim();
    raw.parse::<f64>().map_err(|_| {
        SkytrimError::Catalog(format!(
            "row {row}: column {column:?} value {raw:?} is not a number"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
ID,RA_DESI,DEC_DESI,healpix
1,10.0,5.0,100
2,10.0001,5.0001,100
3,359.5,-12.25,7
";

    #[test]
    fn reads_configured_columns() {
        let cat = Catalog::from_csv_reader(CSV.as_bytes(), &CatalogConfig::default()).unwrap();
        assert_eq!(cat.len(), 3);
        assert_eq!(cat.points()[1], SkyPoint::new(10.0001, 5.0001));
        assert_eq!(cat.points()[2].dec_deg(), -12.25);
    }

    #[test]
    fn honours_row_limit() {
        let config = CatalogConfig {
            row_limit: Some(2),
            ..Default::default()
        };
        let cat = Catalog::from_csv_reader(CSV.as_bytes(), &config).unwrap();
        assert_eq!(cat.len(), 2);
    }

    #[test]
    fn custom_column_names() {
        let csv = "ra,dec\n1.5,2.5\n";
        let config = CatalogConfig {
            ra_column: "ra".to_string(),
            dec_column: "dec".to_string(),
            row_limit: None,
        };
        let cat = Catalog::from_csv_reader(csv.as_bytes(), &config).unwrap();
        assert_eq!(cat.points(), &[SkyPoint::new(1.5, 2.5)]);
    }

    #[test]
    fn missing_column_is_malformed() {
        let csv = "RA,DEC\n1,2\n";
        let err = Catalog::from_csv_reader(csv.as_bytes(), &CatalogConfig::default()).unwrap_err();
        assert!(matches!(err, SkytrimError::MalformedInput(_)));
    }

    #[test]
    fn non_numeric_value_names_the_row() {
        let csv = "RA_DESI,DEC_DESI\n1,2\nabc,3\n";
        let err = Catalog::from_csv_reader(csv.as_bytes(), &CatalogConfig::default()).unwrap_err();
        assert!(matches!(err, SkytrimError::Catalog(_)));
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn missing_file_is_io_failure() {
        let err = Catalog::from_csv_path("does/not/exist.csv", &CatalogConfig::default())
            .unwrap_err();
        assert!(err.is_io_failure());
    }

    #[test]
    fn mismatched_columns_rejected() {
        assert!(Catalog::from_columns(&[1.0, 2.0], &[3.0]).is_err());
    }
}
