//! FITS header cards.
//!
//! Cards are kept as raw 80-byte records so a header that is never edited is
//! written back byte-for-byte. Keyword values are parsed on demand.

use super::{BLOCK_SIZE, CARD_SIZE};
use crate::error::{Result, SkytrimError};

pub type Card = [u8; CARD_SIZE];

/// Parsed FITS header keyword value (simplified).
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl HeaderValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            HeaderValue::Str(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{:<8}'", escaped)
            }
            HeaderValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
            HeaderValue::Int(i) => format!("{:>20}", i),
            HeaderValue::Float(f) => format!("{:>20}", format!("{:?}", f).to_uppercase()),
        }
    }
}

/// An ordered list of header cards, excluding the terminating `END` card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Look up the value of the first card with `keyword`.
    pub fn get(&self, keyword: &str) -> Option<HeaderValue> {
        self.position(keyword)
            .and_then(|i| parse_header_card(&self.cards[i]))
            .map(|(_, v)| v)
    }

    pub fn get_int(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(|v| v.as_int())
    }

    pub fn get_str(&self, keyword: &str) -> Option<String> {
        self.get(keyword).and_then(|v| match v {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        })
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.position(keyword).is_some()
    }

    /// Set `keyword` to `value`.
    ///
    /// An existing card is rewritten in place and keeps its comment; a new card
    /// is appended.
    pub fn set(&mut self, keyword: &str, value: HeaderValue) -> Result<()> {
        match self.position(keyword) {
            Some(i) => {
                let comment = card_comment(&self.cards[i]);
                self.cards[i] = format_card(keyword, &value, comment.as_deref())?;
            }
            None => self.cards.push(format_card(keyword, &value, None)?),
        }
        Ok(())
    }

    /// Remove every card with `keyword`. Returns how many were removed.
    pub fn remove(&mut self, keyword: &str) -> usize {
        let before = self.cards.len();
        self.cards.retain(|c| card_keyword(c) != keyword);
        before - self.cards.len()
    }

    /// Header bytes including the `END` card, blank-padded to a whole block.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity((self.cards.len() + 1) * CARD_SIZE + BLOCK_SIZE);
        for card in &self.cards {
            out.extend_from_slice(card);
        }
        let mut end = [b' '; CARD_SIZE];
        end[..3].copy_from_slice(b"END");
        out.extend_from_slice(&end);
        let padded = out.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        out.resize(padded, b' ');
        out
    }

    fn position(&self, keyword: &str) -> Option<usize> {
        self.cards.iter().position(|c| card_keyword(c) == keyword)
    }
}

/// Keyword name of a card (first 8 columns, trimmed).
pub fn card_keyword(card: &Card) -> &str {
    std::str::from_utf8(&card[..8]).unwrap_or("").trim_end()
}

pub fn is_end_card(card: &Card) -> bool {
    card_keyword(card) == "END"
}

/// Parse a single 80-char FITS header card.
pub fn parse_header_card(card: &Card) -> Option<(String, HeaderValue)> {
    let keyword = card_keyword(card).to_string();
    if keyword.is_empty() || keyword == "COMMENT" || keyword == "HISTORY" || keyword == "END" {
        return None;
    }

    // Value indicator "= " at columns 9-10
    if &card[8..10] != b"= " {
        return None;
    }

    let text = String::from_utf8_lossy(&card[10..]);
    let (value_str, _) = split_value_comment(&text);
    let value_str = value_str.trim();

    let value = if let Some(rest) = value_str.strip_prefix('\'') {
        HeaderValue::Str(parse_quoted(rest).trim_end().to_string())
    } else if value_str == "T" {
        HeaderValue::Bool(true)
    } else if value_str == "F" {
        HeaderValue::Bool(false)
    } else if let Ok(i) = value_str.parse::<i64>() {
        HeaderValue::Int(i)
    } else if let Ok(f) = value_str.replace(['D', 'd'], "E").parse::<f64>() {
        HeaderValue::Float(f)
    } else {
        HeaderValue::Str(value_str.to_string())
    };

    Some((keyword, value))
}

/// Contents of a quoted string whose opening quote has been stripped.
/// Doubled quotes are an escaped quote.
fn parse_quoted(rest: &str) -> String {
    let mut out = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                out.push('\'');
                chars.next();
            } else {
                break;
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split the value field of a card at the first `/` outside a quoted string.
fn split_value_comment(text: &str) -> (&str, Option<&str>) {
    let mut in_string = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '/' if !in_string => return (&text[..i], Some(text[i + 1..].trim())),
            _ => {}
        }
    }
    (text, None)
}

fn card_comment(card: &Card) -> Option<String> {
    if &card[8..10] != b"= " {
        return None;
    }
    let text = String::from_utf8_lossy(&card[10..]);
    split_value_comment(&text)
        .1
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Format a fixed-format `KEYWORD = value / comment` card.
pub fn format_card(keyword: &str, value: &HeaderValue, comment: Option<&str>) -> Result<Card> {
    if keyword.is_empty() || keyword.len() > 8 || !keyword.is_ascii() {
        return Err(SkytrimError::Fits(format!("invalid keyword {keyword:?}")));
    }
    let mut text = format!("{:<8}= {}", keyword, value.render());
    if let Some(comment) = comment {
        text.push_str(" / ");
        text.push_str(comment);
    }
    if !text.is_ascii() {
        return Err(SkytrimError::Fits(format!(
            "non-ASCII value for keyword {keyword}"
        )));
    }
    if text.len() > CARD_SIZE {
        // Values must fit; comments are truncated.
        if format!("{:<8}= {}", keyword, value.render()).len() > CARD_SIZE {
            return Err(SkytrimError::Fits(format!(
                "value for keyword {keyword} does not fit in one card"
            )));
        }
        text.truncate(CARD_SIZE);
    }
    let mut card = [b' '; CARD_SIZE];
    card[..text.len()].copy_from_slice(text.as_bytes());
    Ok(card)
}
