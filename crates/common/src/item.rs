//! Record model: typed attribute values and their canonical byte encoding.
//!
//! The JSON form follows the DynamoDB attribute-value convention
//! (`{"S": "text"}`, `{"N": "12"}`, `{"B": "<base64>"}` ...), so items can be
//! exchanged with existing tooling unchanged.
//!
//! # Canonical encoding
//!
//! ```text
//! u16 type id (big-endian) || body
//! ```
//!
//! Scalars carry their raw bytes. Sets are a `u32` count followed by
//! `u32`-length-prefixed members in their given order. Lists and maps nest
//! full `type id || u32 length || body` entries; map entries are sorted by key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A database record: attribute name to typed value.
pub type Item = BTreeMap<String, AttributeValue>;

pub const TYPE_NULL: u16 = 0x0000;
pub const TYPE_STRING: u16 = 0x0001;
pub const TYPE_NUMBER: u16 = 0x0002;
pub const TYPE_BOOL: u16 = 0x0004;
pub const TYPE_BINARY: u16 = 0xFFFF;
pub const TYPE_STRING_SET: u16 = 0x0101;
pub const TYPE_NUMBER_SET: u16 = 0x0102;
pub const TYPE_BINARY_SET: u16 = 0x01FF;
pub const TYPE_MAP: u16 = 0x0200;
pub const TYPE_LIST: u16 = 0x0300;

/// Largest decimal exponent accepted by [`normalize_number`].
const MAX_NUMBER_EXPONENT: i64 = 400;

/// Errors produced while decoding or canonicalising attribute values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    /// The encoded value ended before a complete structure was read.
    #[error("encoded value is truncated")]
    Truncated,

    /// Bytes remained after a complete value was decoded.
    #[error("encoded value has {0} trailing bytes")]
    TrailingBytes(usize),

    /// The type id is not one of the known attribute types.
    #[error("unknown attribute type id 0x{0:04x}")]
    UnknownType(u16),

    /// A string or number body is not valid UTF-8.
    #[error("encoded text is not valid UTF-8")]
    InvalidUtf8,

    /// A boolean body is not a single `0x00` / `0x01` byte.
    #[error("invalid boolean encoding")]
    InvalidBool,

    /// A number attribute does not hold a decimal number.
    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Decimal number kept in its textual form.
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "B", with = "b64")]
    B(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS", with = "b64_list")]
    Bs(Vec<Vec<u8>>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Two-byte type id used in the canonical encoding.
    pub fn type_id(&self) -> u16 {
        match self {
            AttributeValue::S(_) => TYPE_STRING,
            AttributeValue::N(_) => TYPE_NUMBER,
            AttributeValue::B(_) => TYPE_BINARY,
            AttributeValue::Bool(_) => TYPE_BOOL,
            AttributeValue::Null(_) => TYPE_NULL,
            AttributeValue::Ss(_) => TYPE_STRING_SET,
            AttributeValue::Ns(_) => TYPE_NUMBER_SET,
            AttributeValue::Bs(_) => TYPE_BINARY_SET,
            AttributeValue::L(_) => TYPE_LIST,
            AttributeValue::M(_) => TYPE_MAP,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(
            self,
            AttributeValue::Ss(_) | AttributeValue::Ns(_) | AttributeValue::Bs(_)
        )
    }

    /// Split a set value into its scalar members, preserving order and duplicates.
    ///
    /// Returns `None` for non-set values.
    pub fn set_members(&self) -> Option<Vec<AttributeValue>> {
        match self {
            AttributeValue::Ss(v) => Some(v.iter().cloned().map(AttributeValue::S).collect()),
            AttributeValue::Ns(v) => Some(v.iter().cloned().map(AttributeValue::N).collect()),
            AttributeValue::Bs(v) => Some(v.iter().cloned().map(AttributeValue::B).collect()),
            _ => None,
        }
    }

    /// Canonical encoding: type id followed by the body.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.type_id().to_be_bytes());
        self.write_body(&mut out);
        out
    }

    /// Encode only the body (no type id).
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_body(&mut out);
        out
    }

    /// Decode a value from the output of [`AttributeValue::canonical_bytes`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] on truncation, trailing bytes or unknown types.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, ValueError> {
        let mut r = Reader::new(bytes);
        let type_id = r.u16()?;
        let value = Self::decode_body(type_id, r.rest())?;
        Ok(value)
    }

    /// Decode a body for a known type id. The whole slice must be consumed.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] on truncation, trailing bytes or unknown types.
    pub fn decode_body(type_id: u16, body: &[u8]) -> Result<Self, ValueError> {
        let mut r = Reader::new(body);
        let value = match type_id {
            TYPE_STRING => AttributeValue::S(utf8(r.rest())?),
            TYPE_NUMBER => AttributeValue::N(utf8(r.rest())?),
            TYPE_BINARY => AttributeValue::B(r.rest().to_vec()),
            TYPE_NULL => {
                if !r.rest().is_empty() {
                    return Err(ValueError::TrailingBytes(body.len()));
                }
                AttributeValue::Null(true)
            }
            TYPE_BOOL => match r.rest() {
                [0x00] => AttributeValue::Bool(false),
                [0x01] => AttributeValue::Bool(true),
                _ => return Err(ValueError::InvalidBool),
            },
            TYPE_STRING_SET => {
                AttributeValue::Ss(read_members(&mut r)?.into_iter().map(utf8_owned).collect::<Result<_, _>>()?)
            }
            TYPE_NUMBER_SET => {
                AttributeValue::Ns(read_members(&mut r)?.into_iter().map(utf8_owned).collect::<Result<_, _>>()?)
            }
            TYPE_BINARY_SET => AttributeValue::Bs(read_members(&mut r)?),
            TYPE_LIST => {
                let count = r.u32()?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(read_nested(&mut r)?);
                }
                r.finish()?;
                AttributeValue::L(items)
            }
            TYPE_MAP => {
                let count = r.u32()?;
                let mut map = BTreeMap::new();
                for _ in 0..count {
                    let len = r.u32()? as usize;
                    let key = utf8(r.take(len)?)?;
                    map.insert(key, read_nested(&mut r)?);
                }
                r.finish()?;
                AttributeValue::M(map)
            }
            other => return Err(ValueError::UnknownType(other)),
        };
        Ok(value)
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        match self {
            AttributeValue::S(s) | AttributeValue::N(s) => out.extend_from_slice(s.as_bytes()),
            AttributeValue::B(b) => out.extend_from_slice(b),
            AttributeValue::Bool(b) => out.push(u8::from(*b)),
            AttributeValue::Null(_) => {}
            AttributeValue::Ss(v) | AttributeValue::Ns(v) => {
                write_members(out, v.iter().map(|s| s.as_bytes()), v.len())
            }
            AttributeValue::Bs(v) => write_members(out, v.iter().map(|b| b.as_slice()), v.len()),
            AttributeValue::L(items) => {
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    write_nested(out, item);
                }
            }
            AttributeValue::M(map) => {
                out.extend_from_slice(&(map.len() as u32).to_be_bytes());
                for (key, value) in map {
                    out.extend_from_slice(&(key.len() as u32).to_be_bytes());
                    out.extend_from_slice(key.as_bytes());
                    write_nested(out, value);
                }
            }
        }
    }
}

fn write_members<'a>(out: &mut Vec<u8>, members: impl Iterator<Item = &'a [u8]>, count: usize) {
    out.extend_from_slice(&(count as u32).to_be_bytes());
    for m in members {
        out.extend_from_slice(&(m.len() as u32).to_be_bytes());
        out.extend_from_slice(m);
    }
}

fn write_nested(out: &mut Vec<u8>, value: &AttributeValue) {
    let body = value.body_bytes();
    out.extend_from_slice(&value.type_id().to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
}

fn read_members(r: &mut Reader<'_>) -> Result<Vec<Vec<u8>>, ValueError> {
    let count = r.u32()?;
    let mut members = Vec::new();
    for _ in 0..count {
        let len = r.u32()? as usize;
        members.push(r.take(len)?.to_vec());
    }
    r.finish()?;
    Ok(members)
}

fn read_nested(r: &mut Reader<'_>) -> Result<AttributeValue, ValueError> {
    let type_id = r.u16()?;
    let len = r.u32()? as usize;
    AttributeValue::decode_body(type_id, r.take(len)?)
}

fn utf8(bytes: &[u8]) -> Result<String, ValueError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| ValueError::InvalidUtf8)
}

fn utf8_owned(bytes: Vec<u8>) -> Result<String, ValueError> {
    String::from_utf8(bytes).map_err(|_| ValueError::InvalidUtf8)
}

/// Bounds-checked big-endian cursor.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ValueError> {
        let end = self.pos.checked_add(n).ok_or(ValueError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(ValueError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, ValueError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ValueError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }

    fn finish(&self) -> Result<(), ValueError> {
        match self.buf.len() - self.pos {
            0 => Ok(()),
            n => Err(ValueError::TrailingBytes(n)),
        }
    }
}

/// Normalise a decimal number so that equal values share one textual form.
///
/// `"1.0"`, `"01"` and `"1e0"` all become `"1"`; `"-0.0"` becomes `"0"`.
/// The result never uses exponent notation.
///
/// # Errors
///
/// Returns [`ValueError::InvalidNumber`] if `raw` is not a decimal number or its
/// exponent is out of range.
pub fn normalize_number(raw: &str) -> Result<String, ValueError> {
    let invalid = || ValueError::InvalidNumber(raw.to_owned());
    let s = raw.trim();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(i) => {
            let exp: i64 = rest[i + 1..].parse().map_err(|_| invalid())?;
            (&rest[..i], exp)
        }
        None => (rest, 0),
    };
    if exponent.unsigned_abs() > MAX_NUMBER_EXPONENT.unsigned_abs() {
        return Err(invalid());
    }
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = int_part
        .bytes()
        .chain(frac_part.bytes())
        .all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits {
        return Err(invalid());
    }

    let joined = format!("{int_part}{frac_part}");
    let mut digits = joined.trim_start_matches('0').to_owned();
    if digits.is_empty() {
        return Ok("0".to_owned());
    }
    // value = digits * 10^scale
    let mut scale = i64::try_from(frac_part.len())
        .ok()
        .and_then(|len| exponent.checked_sub(len))
        .ok_or_else(invalid)?;
    while digits.ends_with('0') {
        digits.pop();
        scale = scale.checked_add(1).ok_or_else(invalid)?;
    }

    let body = if scale >= 0 {
        format!("{digits}{}", "0".repeat(scale as usize))
    } else {
        let point = i64::try_from(digits.len())
            .ok()
            .and_then(|len| len.checked_add(scale))
            .ok_or_else(invalid)?;
        if point > 0 {
            let (whole, frac) = digits.split_at(point as usize);
            format!("{whole}.{frac}")
        } else {
            format!("0.{}{digits}", "0".repeat((-point) as usize))
        }
    };
    Ok(if negative { format!("-{body}") } else { body })
}

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

mod b64_list {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&STANDARD.encode(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(d)?
            .into_iter()
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .collect()
    }
}
