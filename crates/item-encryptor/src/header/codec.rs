//! Binary header layout.
//!
//! ```text
//! u8   format version (0x01)
//! u16  algorithm suite id
//! u16  encrypted data key count (>= 1)
//!      u16 len + provider id | u16 len + provider info | u16 len + wrapped key
//! u16  attribute action count
//!      u16 len + attribute name | u8 action code
//! u16  stored context count
//!      u16 len + key | u16 len + value
//! ```
//!
//! All integers are big-endian. Map entries are written in sorted key order so
//! the same header always serialises to the same bytes. Field order here must
//! match [`parse`] exactly.

use std::collections::BTreeMap;

use common::CryptoAction;

use super::{HeaderError, ParsedHeader};
use crate::keys::EncryptedDataKey;
use crate::suite::SuiteRegistry;

/// Current header format version.
pub const HEADER_VERSION: u8 = 0x01;

/// Serialise `header` to its stored bytes.
///
/// # Errors
///
/// Returns [`HeaderError::TooLong`] if any count or length exceeds `u16::MAX`.
pub fn serialize(header: &ParsedHeader) -> Result<Vec<u8>, HeaderError> {
    let mut w = Writer::default();
    w.u8(HEADER_VERSION);
    w.u16(header.algorithm_suite_id().wire_id());

    w.count(header.encrypted_data_keys().len(), "encryptedDataKeys")?;
    for edk in header.encrypted_data_keys() {
        w.bytes(edk.provider_id.as_bytes(), "providerId")?;
        w.bytes(&edk.provider_info, "providerInfo")?;
        w.bytes(&edk.ciphertext, "wrappedKey")?;
    }

    w.count(header.attribute_actions_on_encrypt().len(), "attributeActionsOnEncrypt")?;
    for (name, action) in header.attribute_actions_on_encrypt() {
        let code = action
            .wire_code()
            .ok_or_else(|| HeaderError::DoNothingEntry(name.clone()))?;
        w.bytes(name.as_bytes(), "attributeName")?;
        w.u8(code);
    }

    w.count(header.stored_encryption_context().len(), "storedEncryptionContext")?;
    for (key, value) in header.stored_encryption_context() {
        w.bytes(key.as_bytes(), "contextKey")?;
        w.bytes(value.as_bytes(), "contextValue")?;
    }
    Ok(w.buf)
}

/// Parse stored header bytes, resolving the suite through `registry`.
///
/// # Errors
///
/// Returns a [`HeaderError`] on truncation, unknown version or suite, an empty
/// key list, invalid action codes, duplicate names, invalid UTF-8 or trailing
/// bytes. No partial header is ever returned.
pub fn parse(bytes: &[u8], registry: &SuiteRegistry) -> Result<ParsedHeader, HeaderError> {
    let mut r = Reader::new(bytes);

    let version = r.u8("version")?;
    if version != HEADER_VERSION {
        return Err(HeaderError::UnsupportedVersion(version));
    }

    let suite_wire_id = r.u16("algorithmSuiteId")?;
    let suite = registry
        .by_wire_id(suite_wire_id)
        .ok_or(HeaderError::UnknownSuite(suite_wire_id))?;

    let edk_count = r.u16("encryptedDataKeys")?;
    if edk_count == 0 {
        return Err(HeaderError::NoEncryptedDataKeys);
    }
    let mut edks = Vec::with_capacity(edk_count as usize);
    for _ in 0..edk_count {
        edks.push(EncryptedDataKey {
            provider_id: r.string("providerId")?,
            provider_info: r.bytes("providerInfo")?.to_vec(),
            ciphertext: r.bytes("wrappedKey")?.to_vec(),
        });
    }

    let action_count = r.u16("attributeActionsOnEncrypt")?;
    let mut actions = BTreeMap::new();
    for _ in 0..action_count {
        let name = r.string("attributeName")?;
        let code = r.u8("actionCode")?;
        let action = CryptoAction::from_wire_code(code).ok_or_else(|| HeaderError::InvalidAction {
            attribute: name.clone(),
            code,
        })?;
        if actions.insert(name.clone(), action).is_some() {
            return Err(HeaderError::Duplicate {
                field: "attributeActionsOnEncrypt",
                name,
            });
        }
    }

    let context_count = r.u16("storedEncryptionContext")?;
    let mut context = BTreeMap::new();
    for _ in 0..context_count {
        let key = r.string("contextKey")?;
        let value = r.string("contextValue")?;
        if context.insert(key.clone(), value).is_some() {
            return Err(HeaderError::Duplicate {
                field: "storedEncryptionContext",
                name: key,
            });
        }
    }

    r.finish()?;

    ParsedHeader::builder()
        .attribute_actions_on_encrypt(actions)
        .algorithm_suite_id(suite.id)
        .encrypted_data_keys(edks)
        .stored_encryption_context(context)
        .build()
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn count(&mut self, n: usize, field: &'static str) -> Result<(), HeaderError> {
        let n = u16::try_from(n).map_err(|_| HeaderError::TooLong { field })?;
        self.u16(n);
        Ok(())
    }

    fn bytes(&mut self, b: &[u8], field: &'static str) -> Result<(), HeaderError> {
        self.count(b.len(), field)?;
        self.buf.extend_from_slice(b);
        Ok(())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], HeaderError> {
        let slice = self
            .buf
            .get(self.pos..self.pos + n)
            .ok_or(HeaderError::Truncated { field })?;
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, HeaderError> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, HeaderError> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn bytes(&mut self, field: &'static str) -> Result<&'a [u8], HeaderError> {
        let len = self.u16(field)? as usize;
        self.take(len, field)
    }

    fn string(&mut self, field: &'static str) -> Result<String, HeaderError> {
        let raw = self.bytes(field)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| HeaderError::InvalidUtf8 { field })
    }

    fn finish(&self) -> Result<(), HeaderError> {
        match self.buf.len() - self.pos {
            0 => Ok(()),
            n => Err(HeaderError::TrailingBytes(n)),
        }
    }
}
