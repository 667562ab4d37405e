//! Header-data units and row selection.

use super::header::{Card, Header, HeaderValue};
use super::CARD_SIZE;
use crate::error::{Result, SkytrimError};
use crate::KeepSet;

/// Structural kind of an HDU, from `SIMPLE`/`XTENSION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HduKind {
    Primary,
    Image,
    BinTable,
    AsciiTable,
    Other(String),
}

/// How the data array of an HDU splits into rows along its first
/// (slowest-varying) dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    /// Number of rows (first-dimension length).
    pub rows: usize,
    /// Bytes per row.
    pub row_bytes: usize,
    /// Axis number (1-based) that holds the row count: 2 for tables, NAXIS for images.
    pub axis: usize,
}

/// A header plus its unpadded data bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdu {
    header: Header,
    data: Vec<u8>,
}

impl Hdu {
    /// Pair a header with its data, checking the size the header declares.
    pub fn new(header: Header, data: Vec<u8>) -> Result<Self> {
        let expected = data_len(&header)?;
        if data.len() != expected {
            return Err(SkytrimError::Fits(format!(
                "header declares {} data bytes, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self { header, data })
    }

    /// A data-less primary HDU, as written ahead of table extensions.
    pub fn empty_primary() -> Self {
        let header = Header::from_cards(vec![
            fixed_card("SIMPLE", "T"),
            fixed_card("BITPIX", "8"),
            fixed_card("NAXIS", "0"),
            fixed_card("EXTEND", "T"),
        ]);
        Self {
            header,
            data: Vec::new(),
        }
    }

    /// An `IMAGE` extension from big-endian element bytes.
    ///
    /// `shape` is given slowest-varying first (row-major), so `shape[0]` is the
    /// row count; FITS stores the axes reversed.
    pub fn image(name: &str, bitpix: i64, shape: &[usize], data: Vec<u8>) -> Result<Self> {
        let mut header = Header::new();
        header.set("XTENSION", HeaderValue::Str("IMAGE".to_string()))?;
        header.set("BITPIX", HeaderValue::Int(bitpix))?;
        header.set("NAXIS", HeaderValue::Int(shape.len() as i64))?;
        for (i, &n) in shape.iter().rev().enumerate() {
            header.set(&format!("NAXIS{}", i + 1), HeaderValue::Int(n as i64))?;
        }
        header.set("PCOUNT", HeaderValue::Int(0))?;
        header.set("GCOUNT", HeaderValue::Int(1))?;
        header.set("EXTNAME", HeaderValue::Str(name.to_string()))?;
        Self::new(header, data)
    }

    /// A 32-bit float `IMAGE` extension.
    pub fn image_f32(name: &str, shape: &[usize], values: &[f32]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        Self::image(name, -32, shape, data)
    }

    /// A 32-bit integer `IMAGE` extension.
    pub fn image_i32(name: &str, shape: &[usize], values: &[i32]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        Self::image(name, 32, shape, data)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn kind(&self) -> HduKind {
        if self.header.contains("SIMPLE") {
            return HduKind::Primary;
        }
        match self.header.get_str("XTENSION").as_deref().map(str::trim) {
            Some("IMAGE") => HduKind::Image,
            Some("BINTABLE") => HduKind::BinTable,
            Some("TABLE") => HduKind::AsciiTable,
            Some(other) => HduKind::Other(other.to_string()),
            None => HduKind::Other(String::new()),
        }
    }

    /// `EXTNAME`, or `PRIMARY` for an unnamed primary HDU.
    pub fn name(&self) -> Option<String> {
        match self.header.get_str("EXTNAME") {
            Some(name) => Some(name.trim().to_string()),
            None if self.kind() == HduKind::Primary => Some("PRIMARY".to_string()),
            None => None,
        }
    }

    /// Case-insensitive name comparison, as FITS extension names are matched.
    pub fn is_named(&self, name: &str) -> bool {
        self.name().is_some_and(|n| n.eq_ignore_ascii_case(name))
    }

    /// Axis lengths in FITS order (`NAXIS1` first).
    pub fn axes(&self) -> Vec<usize> {
        let naxis = self.header.get_int("NAXIS").unwrap_or(0).max(0) as usize;
        (1..=naxis)
            .map(|i| {
                self.header
                    .get_int(&format!("NAXIS{}", i))
                    .unwrap_or(0)
                    .max(0) as usize
            })
            .collect()
    }

    /// Row structure of the data array, if it has one.
    ///
    /// Tables split on `NAXIS2`; image arrays split on their last FITS axis,
    /// which is the first dimension in row-major order. `NAXIS = 0` HDUs,
    /// `GCOUNT != 1` HDUs and opaque extensions have no row layout, nor does
    /// one whose row size overflows. A table with zero rows still has one.
    pub fn row_layout(&self) -> Option<RowLayout> {
        if self.header.get_int("GCOUNT").unwrap_or(1) != 1 {
            return None;
        }
        let axes = self.axes();
        let layout = match self.kind() {
            HduKind::BinTable | HduKind::AsciiTable if axes.len() == 2 => RowLayout {
                rows: axes[1],
                row_bytes: axes[0],
                axis: 2,
            },
            HduKind::Primary | HduKind::Image if !axes.is_empty() => {
                let bytes_per_element = (self.header.get_int("BITPIX")?.unsigned_abs() / 8) as usize;
                let row_bytes = axes[..axes.len() - 1]
                    .iter()
                    .try_fold(bytes_per_element, |acc, &n| acc.checked_mul(n))?;
                RowLayout {
                    rows: axes[axes.len() - 1],
                    row_bytes,
                    axis: axes.len(),
                }
            }
            _ => return None,
        };
        layout.rows.checked_mul(layout.row_bytes)?;
        Some(layout)
    }

    /// First-dimension length, if the HDU has a row structure.
    pub fn row_count(&self) -> Option<usize> {
        self.row_layout().map(|l| l.rows)
    }

    /// Bytes of row `row`, if the HDU has a row structure.
    pub fn row(&self, row: usize) -> Option<&[u8]> {
        let layout = self.row_layout()?;
        if row >= layout.rows {
            return None;
        }
        let start = row * layout.row_bytes;
        self.data.get(start..start + layout.row_bytes)
    }

    /// A new HDU holding only the rows in `keep`, in their original order.
    ///
    /// The header is unchanged apart from the row-count axis, `THEAP` (when a
    /// binary table declares one) and the now-stale `CHECKSUM`/`DATASUM`
    /// cards. A binary-table heap is carried over untouched, so
    /// variable-length array descriptors stay valid.
    pub fn select_rows(&self, keep: &KeepSet) -> Result<Hdu> {
        let layout = self.row_layout().ok_or_else(|| {
            SkytrimError::Fits(format!(
                "HDU {:?} has no row structure to select from",
                self.name().unwrap_or_default()
            ))
        })?;
        keep.check_bounds(layout.rows)?;

        let main_len = layout.rows * layout.row_bytes;
        let mut data = Vec::with_capacity(keep.len() * layout.row_bytes + self.data.len() - main_len);
        for row in keep.iter() {
            let start = row * layout.row_bytes;
            data.extend_from_slice(&self.data[start..start + layout.row_bytes]);
        }
        let new_main_len = data.len();
        // Gap and heap that follow the main table.
        data.extend_from_slice(&self.data[main_len..]);

        let mut header = self.header.clone();
        header.set(
            &format!("NAXIS{}", layout.axis),
            HeaderValue::Int(keep.len() as i64),
        )?;
        if let Some(theap) = header.get_int("THEAP") {
            let gap = (theap.max(0) as usize).saturating_sub(main_len);
            header.set("THEAP", HeaderValue::Int((new_main_len + gap) as i64))?;
        }
        header.remove("CHECKSUM");
        header.remove("DATASUM");

        Hdu::new(header, data)
    }
}

/// A card with a value already in fixed format (right-justified to column 30).
fn fixed_card(keyword: &str, value: &str) -> Card {
    let text = format!("{keyword:<8}= {value:>20}");
    let mut card = [b' '; CARD_SIZE];
    let n = text.len().min(CARD_SIZE);
    card[..n].copy_from_slice(&text.as_bytes()[..n]);
    card
}

/// Data size in bytes declared by a header (before block padding):
/// `|BITPIX|/8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISn)`.
pub fn data_len(header: &Header) -> Result<usize> {
    let naxis = header
        .get_int("NAXIS")
        .ok_or_else(|| SkytrimError::Fits("missing NAXIS keyword".to_string()))?;
    if !(0..=999).contains(&naxis) {
        return Err(SkytrimError::Fits(format!("invalid NAXIS {naxis}")));
    }
    if naxis == 0 {
        return Ok(0);
    }
    let bitpix = header
        .get_int("BITPIX")
        .ok_or_else(|| SkytrimError::Fits("missing BITPIX keyword".to_string()))?;
    if ![8, 16, 32, 64, -32, -64].contains(&bitpix) {
        return Err(SkytrimError::Fits(format!("invalid BITPIX {bitpix}")));
    }

    let mut axes = Vec::with_capacity(naxis as usize);
    for i in 1..=naxis {
        let n = header
            .get_int(&format!("NAXIS{}", i))
            .ok_or_else(|| SkytrimError::Fits(format!("missing NAXIS{} keyword", i)))?;
        if n < 0 {
            return Err(SkytrimError::Fits(format!("negative NAXIS{i}")));
        }
        axes.push(n as u64);
    }
    if header.get("GROUPS") == Some(HeaderValue::Bool(true)) {
        return Err(SkytrimError::Fits(
            "random-groups HDUs are not supported".to_string(),
        ));
    }
    let overflow = || SkytrimError::Fits(format!("data size of {axes:?} overflows"));
    let pcount = header.get_int("PCOUNT").unwrap_or(0).max(0) as u64;
    let gcount = header.get_int("GCOUNT").unwrap_or(1).max(0) as u64;

    // Any zero-length axis means no data, however large the others are.
    let elements = if axes.contains(&0) {
        Some(0)
    } else {
        axes.iter().try_fold(1u64, |acc, &n| acc.checked_mul(n))
    };
    let bytes = elements
        .and_then(|elements| elements.checked_add(pcount))
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bitpix.unsigned_abs() / 8))
        .ok_or_else(overflow)?;
    usize::try_from(bytes).map_err(|_| overflow())
}
