//! Reading and writing whole FITS files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::hdu::{data_len, Hdu, HduKind};
use super::header::{card_keyword, is_end_card, Card, Header};
use super::{FitsFile, BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
use crate::error::{Result, SkytrimError};

/// Parse every HDU of an in-memory FITS file.
pub fn parse_fits(bytes: &[u8]) -> Result<FitsFile> {
    let mut hdus = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        // Trailing all-zero or all-blank filler after the last HDU is tolerated.
        if !hdus.is_empty() && bytes[offset..].iter().all(|&b| b == 0 || b == b' ') {
            break;
        }

        let (header, header_len) = read_header(&bytes[offset..], hdus.len())?;
        offset += header_len;

        let len = data_len(&header)?;
        let end = offset.checked_add(len).ok_or_else(|| {
            SkytrimError::Fits(format!("HDU {} data size {} overflows", hdus.len(), len))
        })?;
        let data = bytes.get(offset..end).ok_or_else(|| {
            SkytrimError::Fits(format!(
                "HDU {} data truncated: need {} bytes at offset {}, file has {}",
                hdus.len(),
                len,
                offset,
                bytes.len()
            ))
        })?;
        let hdu = Hdu::new(header, data.to_vec())?;
        debug!(
            "HDU {}: {:?} {:?} ({} data bytes)",
            hdus.len(),
            hdu.name().unwrap_or_default(),
            hdu.kind(),
            len
        );
        hdus.push(hdu);

        // Pad to 2880-byte boundary; a missing final pad is tolerated.
        offset = end.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    }

    if hdus.is_empty() {
        return Err(SkytrimError::Fits("file contains no HDUs".to_string()));
    }
    Ok(FitsFile { hdus })
}

/// Read header blocks until the `END` card. Returns the header and the number
/// of bytes consumed (a whole number of blocks).
fn read_header(bytes: &[u8], index: usize) -> Result<(Header, usize)> {
    let mut cards: Vec<Card> = Vec::new();
    let mut consumed = 0;

    loop {
        let block = bytes.get(consumed..consumed + BLOCK_SIZE).ok_or_else(|| {
            SkytrimError::Fits(format!("HDU {index} header has no END card"))
        })?;
        consumed += BLOCK_SIZE;

        for i in 0..CARDS_PER_BLOCK {
            let mut card = [0u8; CARD_SIZE];
            card.copy_from_slice(&block[i * CARD_SIZE..(i + 1) * CARD_SIZE]);
            if cards.is_empty() {
                let first = card_keyword(&card);
                let expected = if index == 0 { "SIMPLE" } else { "XTENSION" };
                if first != expected {
                    return Err(SkytrimError::Fits(format!(
                        "HDU {index} starts with {first:?}, expected {expected}"
                    )));
                }
            }
            if is_end_card(&card) {
                return Ok((Header::from_cards(cards), consumed));
            }
            cards.push(card);
        }
    }
}

/// Read and parse a FITS file.
pub fn read_fits<P: AsRef<Path>>(path: P) -> Result<FitsFile> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| SkytrimError::io(path, e))?;
    parse_fits(&bytes).map_err(|e| match e {
        SkytrimError::Fits(msg) => SkytrimError::Fits(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Serialize a FITS file: each header blank-padded and each data block
/// padded to 2880 bytes (blanks for ASCII tables, zeros otherwise).
pub fn encode_fits(file: &FitsFile) -> Vec<u8> {
    let mut out = Vec::new();
    for hdu in &file.hdus {
        out.extend_from_slice(&hdu.header().to_bytes());
        out.extend_from_slice(hdu.data());
        let fill = if hdu.kind() == HduKind::AsciiTable {
            b' '
        } else {
            0u8
        };
        let padded = out.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        out.resize(padded, fill);
    }
    out
}

/// Write a FITS file durably.
///
/// Bytes go to a sibling `<name>.partial` file which is synced and then renamed
/// over `path`, so `path` never holds a half-written file.
pub fn write_fits<P: AsRef<Path>>(path: P, file: &FitsFile) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_fits(file);
    let tmp = partial_path(path);

    let result = (|| -> std::io::Result<()> {
        let mut f = File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(SkytrimError::io(path, e));
    }
    debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
