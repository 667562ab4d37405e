//! Locating the position columns of a primary segment.
//!
//! Files use either the specific `TARGET_RA`/`TARGET_DEC` pair or the generic
//! `RA`/`DEC` pair. Candidates are tried in priority order and the first pair
//! with both columns present wins.

use crate::error::{Result, SkytrimError};
use crate::fits::{Hdu, HduKind};
use crate::Catalog;

/// An `(ra, dec)` column-name pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionColumns {
    pub ra: String,
    pub dec: String,
}

impl PositionColumns {
    pub fn new(ra: &str, dec: &str) -> Self {
        Self {
            ra: ra.to_string(),
            dec: dec.to_string(),
        }
    }

    /// `TARGET_RA`/`TARGET_DEC`, then `RA`/`DEC`.
    pub fn defaults() -> Vec<PositionColumns> {
        vec![
            PositionColumns::new("TARGET_RA", "TARGET_DEC"),
            PositionColumns::new("RA", "DEC"),
        ]
    }
}

/// First candidate whose columns are both present in `hdu`. A segment that is
/// not a binary table has no columns and is malformed input.
pub fn resolve_position_columns<'a>(
    hdu: &Hdu,
    candidates: &'a [PositionColumns],
) -> Result<&'a PositionColumns> {
    if hdu.kind() != HduKind::BinTable {
        return Err(SkytrimError::MalformedInput(format!(
            "segment {:?} is not a binary table; no position columns",
            hdu.name().unwrap_or_default()
        )));
    }
    let names = hdu.column_names()?;
    let has = |name: &str| names.iter().any(|n| n.eq_ignore_ascii_case(name));
    candidates
        .iter()
        .find(|c| has(&c.ra) && has(&c.dec))
        .ok_or_else(|| {
            let tried: Vec<String> = candidates
                .iter()
                .map(|c| format!("{}/{}", c.ra, c.dec))
                .collect();
            SkytrimError::MalformedInput(format!(
                "segment {:?} has none of the position column pairs [{}]",
                hdu.name().unwrap_or_default(),
                tried.join(", ")
            ))
        })
}

/// Positions of every row of `hdu`, one catalog entry per row.
pub fn read_positions(hdu: &Hdu, candidates: &[PositionColumns]) -> Result<Catalog> {
    let cols = resolve_position_columns(hdu, candidates)?;
    let ra = hdu.read_column_f64(&cols.ra)?;
    let dec = hdu.read_column_f64(&cols.dec)?;
    Catalog::from_columns(&ra, &dec)
}
