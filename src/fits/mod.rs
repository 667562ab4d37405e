//! Minimal FITS container support: enough to read a multi-HDU spectral file,
//! select rows from its tables and image arrays, and write it back.
//!
//! Headers are kept as raw cards and data as raw big-endian bytes, so HDUs the
//! trimmer does not touch are written back byte-for-byte.

pub mod hdu;
pub mod header;
pub mod io;
pub mod table;

pub use hdu::{Hdu, HduKind, RowLayout};
pub use header::{Header, HeaderValue};
pub use io::{encode_fits, parse_fits, read_fits, write_fits};
pub use table::{BinTableBuilder, Column, ColumnFormat};

/// Size of a FITS logical record.
pub const BLOCK_SIZE: usize = 2880;
/// Size of one header card.
pub const CARD_SIZE: usize = 80;
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// An ordered list of HDUs; the first is the primary HDU.
#[derive(Debug, Clone, PartialEq)]
pub struct FitsFile {
    pub hdus: Vec<Hdu>,
}

impl FitsFile {
    pub fn new(hdus: Vec<Hdu>) -> Self {
        Self { hdus }
    }

    /// Index and HDU of the first HDU named `name` (case-insensitive).
    pub fn find(&self, name: &str) -> Option<(usize, &Hdu)> {
        self.hdus.iter().enumerate().find(|(_, h)| h.is_named(name))
    }

    pub fn len(&self) -> usize {
        self.hdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hdus.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_is_case_insensitive() {
        let file = FitsFile::new(vec![
            Hdu::empty_primary(),
            Hdu::image_f32("B_FLUX", &[1, 1], &[0.0]).unwrap(),
        ]);
        assert_eq!(file.find("b_flux").map(|(i, _)| i), Some(1));
        assert_eq!(file.find("primary").map(|(i, _)| i), Some(0));
        assert!(file.find("FIBERMAP").is_none());
    }
}
