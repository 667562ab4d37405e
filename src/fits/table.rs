//! Binary-table columns: `TFORMn` parsing, numeric column extraction and a
//! small builder for writing tables.

use super::hdu::{Hdu, HduKind};
use super::header::{Header, HeaderValue};
use crate::error::{Result, SkytrimError};

/// A parsed `TFORMn` value such as `1D`, `20A` or `1PE(30)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnFormat {
    pub repeat: usize,
    pub code: char,
}

impl ColumnFormat {
    pub fn new(repeat: usize, code: char) -> Self {
        Self { repeat, code }
    }

    pub fn parse(format: &str) -> Result<Self> {
        let format = format.trim();
        let digits: String = format.chars().take_while(|c| c.is_ascii_digit()).collect();
        let code = format[digits.len()..].chars().next().ok_or_else(|| {
            SkytrimError::Fits(format!("column format {format:?} has no data type"))
        })?;
        let repeat = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| {
                SkytrimError::Fits(format!("invalid repeat count in format {format:?}"))
            })?
        };
        let parsed = Self { repeat, code };
        parsed.element_size()?;
        Ok(parsed)
    }

    fn element_size(&self) -> Result<usize> {
        match self.code {
            'L' | 'B' | 'A' => Ok(1),
            'I' => Ok(2),
            'J' | 'E' => Ok(4),
            'K' | 'D' | 'C' | 'P' => Ok(8),
            'M' | 'Q' => Ok(16),
            // Bits are packed, handled in `width`.
            'X' => Ok(1),
            other => Err(SkytrimError::Fits(format!(
                "unknown binary table format code {other:?}"
            ))),
        }
    }

    /// Bytes occupied by the field in each row.
    pub fn width(&self) -> usize {
        match self.code {
            'X' => self.repeat.div_ceil(8),
            // Variable-length descriptors: one per field regardless of repeat.
            'P' => 8 * self.repeat.min(1),
            'Q' => 16 * self.repeat.min(1),
            _ => self.repeat * self.element_size().unwrap_or(0),
        }
    }

    fn render(&self) -> String {
        format!("{}{}", self.repeat, self.code)
    }
}

/// One field of a binary table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub format: ColumnFormat,
    /// Byte offset of the field within a row.
    pub offset: usize,
}

/// Column descriptions of a binary-table HDU, in field order.
pub fn columns(hdu: &Hdu) -> Result<Vec<Column>> {
    if hdu.kind() != HduKind::BinTable {
        return Err(SkytrimError::Fits(format!(
            "HDU {:?} is not a binary table",
            hdu.name().unwrap_or_default()
        )));
    }
    let header = hdu.header();
    let tfields = header
        .get_int("TFIELDS")
        .ok_or_else(|| SkytrimError::Fits("missing TFIELDS keyword".to_string()))?;

    let mut out = Vec::with_capacity(tfields.max(0) as usize);
    let mut offset = 0;
    for i in 1..=tfields {
        let tform = header
            .get_str(&format!("TFORM{i}"))
            .ok_or_else(|| SkytrimError::Fits(format!("missing TFORM{i} keyword")))?;
        let format = ColumnFormat::parse(&tform)?;
        let name = header
            .get_str(&format!("TTYPE{i}"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        out.push(Column {
            name,
            format,
            offset,
        });
        offset += format.width();
    }
    Ok(out)
}

impl Hdu {
    /// Names of the binary-table columns (`TTYPEn`), in field order.
    pub fn column_names(&self) -> Result<Vec<String>> {
        Ok(columns(self)?.into_iter().map(|c| c.name).collect())
    }

    /// Values of a scalar numeric column converted to f64.
    ///
    /// Supports `D`, `E`, `K`, `J`, `I` and `B` columns with a repeat count of
    /// one. Column names match case-insensitively. `TSCALn`/`TZEROn` are applied
    /// when present.
    pub fn read_column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let cols = columns(self)?;
        let (index, col) = cols
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SkytrimError::MalformedInput(format!("no column named {name:?}")))?;
        if col.format.repeat != 1 {
            return Err(SkytrimError::Fits(format!(
                "column {name:?} has repeat count {}, expected a scalar",
                col.format.repeat
            )));
        }

        let header = self.header();
        let scale = header
            .get(&format!("TSCAL{}", index + 1))
            .and_then(|v| v.as_float())
            .unwrap_or(1.0);
        let zero = header
            .get(&format!("TZERO{}", index + 1))
            .and_then(|v| v.as_float())
            .unwrap_or(0.0);

        let rows = self.row_count().unwrap_or(0);
        let mut values = Vec::with_capacity(rows);
        for row in 0..rows {
            let bytes = self
                .row(row)
                .and_then(|r| r.get(col.offset..col.offset + col.format.width()))
                .ok_or_else(|| SkytrimError::Fits(format!("row {row} is truncated")))?;
            let raw = decode_scalar(col.format.code, bytes).ok_or_else(|| {
                SkytrimError::Fits(format!(
                    "column {name:?} has non-numeric format {}",
                    col.format.render()
                ))
            })?;
            values.push(zero + scale * raw);
        }
        Ok(values)
    }
}

fn decode_scalar(code: char, b: &[u8]) -> Option<f64> {
    Some(match code {
        'D' => f64::from_be_bytes(b.try_into().ok()?),
        'E' => f32::from_be_bytes(b.try_into().ok()?) as f64,
        'K' => i64::from_be_bytes(b.try_into().ok()?) as f64,
        'J' => i32::from_be_bytes(b.try_into().ok()?) as f64,
        'I' => i16::from_be_bytes(b.try_into().ok()?) as f64,
        'B' => *b.first()? as f64,
        _ => return None,
    })
}

/// Builds a `BINTABLE` extension column by column.
///
/// Every column must have the same number of rows.
#[derive(Debug, Clone)]
pub struct BinTableBuilder {
    name: String,
    columns: Vec<(String, ColumnFormat, Vec<Vec<u8>>)>,
}

impl BinTableBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
        }
    }

    fn push<T, F>(mut self, name: &str, format: ColumnFormat, values: &[T], encode: F) -> Self
    where
        F: Fn(&T) -> Vec<u8>,
    {
        let cells = values.iter().map(encode).collect();
        self.columns.push((name.to_string(), format, cells));
        self
    }

    pub fn column_f64(self, name: &str, values: &[f64]) -> Self {
        self.push(name, ColumnFormat::new(1, 'D'), values, |v| {
            v.to_be_bytes().to_vec()
        })
    }

    pub fn column_f32(self, name: &str, values: &[f32]) -> Self {
        self.push(name, ColumnFormat::new(1, 'E'), values, |v| {
            v.to_be_bytes().to_vec()
        })
    }

    pub fn column_i64(self, name: &str, values: &[i64]) -> Self {
        self.push(name, ColumnFormat::new(1, 'K'), values, |v| {
            v.to_be_bytes().to_vec()
        })
    }

    pub fn column_i32(self, name: &str, values: &[i32]) -> Self {
        self.push(name, ColumnFormat::new(1, 'J'), values, |v| {
            v.to_be_bytes().to_vec()
        })
    }

    /// Fixed-width string column; values are space-padded or truncated.
    pub fn column_str(self, name: &str, width: usize, values: &[&str]) -> Self {
        self.push(name, ColumnFormat::new(width, 'A'), values, move |v| {
            let mut cell = v.as_bytes().to_vec();
            cell.resize(width, b' ');
            cell
        })
    }

    pub fn build(self) -> Result<Hdu> {
        let rows = self.columns.first().map(|c| c.2.len()).unwrap_or(0);
        if let Some((name, _, cells)) = self.columns.iter().find(|c| c.2.len() != rows) {
            return Err(SkytrimError::MalformedInput(format!(
                "column {name:?} has {} rows, expected {rows}",
                cells.len()
            )));
        }
        let row_bytes: usize = self.columns.iter().map(|c| c.1.width()).sum();

        let mut header = Header::new();
        header.set("XTENSION", HeaderValue::Str("BINTABLE".to_string()))?;
        header.set("BITPIX", HeaderValue::Int(8))?;
        header.set("NAXIS", HeaderValue::Int(2))?;
        header.set("NAXIS1", HeaderValue::Int(row_bytes as i64))?;
        header.set("NAXIS2", HeaderValue::Int(rows as i64))?;
        header.set("PCOUNT", HeaderValue::Int(0))?;
        header.set("GCOUNT", HeaderValue::Int(1))?;
        header.set("TFIELDS", HeaderValue::Int(self.columns.len() as i64))?;
        for (i, (name, format, _)) in self.columns.iter().enumerate() {
            header.set(&format!("TTYPE{}", i + 1), HeaderValue::Str(name.clone()))?;
            header.set(&format!("TFORM{}", i + 1), HeaderValue::Str(format.render()))?;
        }
        header.set("EXTNAME", HeaderValue::Str(self.name.clone()))?;

        let mut data = Vec::with_capacity(rows * row_bytes);
        for row in 0..rows {
            for (_, _, cells) in &self.columns {
                data.extend_from_slice(&cells[row]);
            }
        }
        Hdu::new(header, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fibermap() -> Hdu {
        BinTableBuilder::new("FIBERMAP")
            .column_i64("TARGETID", &[100, 200, 300])
            .column_f64("TARGET_RA", &[10.0, 50.0, 10.00005])
            .column_f32("TARGET_DEC", &[5.0, 50.0, -1.5])
            .column_str("OBJTYPE", 3, &["TGT", "SKY", "TGT"])
            .column_i32("FIBER", &[7, 8, 9])
            .build()
            .unwrap()
    }

    #[test]
    fn parses_formats() {
        assert_eq!(ColumnFormat::parse("D").unwrap(), ColumnFormat::new(1, 'D'));
        assert_eq!(ColumnFormat::parse("20A").unwrap(), ColumnFormat::new(20, 'A'));
        assert_eq!(ColumnFormat::parse("1PE(30)").unwrap().width(), 8);
        assert_eq!(ColumnFormat::parse("13X").unwrap().width(), 2);
        assert!(ColumnFormat::parse("3Z").is_err());
        assert!(ColumnFormat::parse("").is_err());
    }

    #[test]
    fn builder_lays_out_rows() {
        let hdu = fibermap();
        assert_eq!(hdu.kind(), HduKind::BinTable);
        assert_eq!(hdu.row_count(), Some(3));
        assert_eq!(hdu.header().get_int("NAXIS1"), Some(8 + 8 + 4 + 3 + 4));
        let cols = columns(&hdu).unwrap();
        assert_eq!(cols[3].offset, 20);
        assert_eq!(&hdu.row(1).unwrap()[20..23], b"SKY");
    }

    #[test]
    fn reads_numeric_columns() {
        let hdu = fibermap();
        assert_eq!(hdu.read_column_f64("TARGET_RA").unwrap(), vec![10.0, 50.0, 10.00005]);
        assert_eq!(hdu.read_column_f64("target_dec").unwrap(), vec![5.0, 50.0, -1.5]);
        assert_eq!(hdu.read_column_f64("TARGETID").unwrap(), vec![100.0, 200.0, 300.0]);
        assert_eq!(hdu.read_column_f64("FIBER").unwrap(), vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn string_and_missing_columns_fail() {
        let hdu = fibermap();
        assert!(matches!(
            hdu.read_column_f64("OBJTYPE"),
            Err(SkytrimError::Fits(_))
        ));
        assert!(matches!(
            hdu.read_column_f64("RA"),
            Err(SkytrimError::MalformedInput(_))
        ));
    }

    #[test]
    fn ragged_columns_rejected() {
        let err = BinTableBuilder::new("T")
            .column_f64("A", &[1.0, 2.0])
            .column_f64("B", &[1.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, SkytrimError::MalformedInput(_)));
    }

    #[test]
    fn column_names_in_order() {
        assert_eq!(
            fibermap().column_names().unwrap(),
            vec!["TARGETID", "TARGET_RA", "TARGET_DEC", "OBJTYPE", "FIBER"]
        );
    }
}
