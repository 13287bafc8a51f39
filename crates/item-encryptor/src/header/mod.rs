//! The self-describing header stored on every protected item.
//!
//! A [`ParsedHeader`] records everything decrypt needs without outside metadata:
//! the algorithm suite, the non-DO_NOTHING action of every protected attribute,
//! the wrapped data keys and the persisted part of the encryption context.
//!
//! Headers are only ever produced by [`ParsedHeaderBuilder::build`], which
//! refuses to hand out a partially initialised value.

pub mod codec;

pub use codec::{parse, serialize, HEADER_VERSION};

use std::collections::BTreeMap;

use common::protocol::HeaderSummary;
use common::CryptoAction;
use thiserror::Error;

use crate::keys::EncryptedDataKey;
use crate::suite::AlgorithmSuiteId;

/// Errors produced while building, serialising or parsing a header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// The input ended while `field` was being read.
    #[error("header is truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("unsupported header version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown algorithm suite 0x{0:04x}")]
    UnknownSuite(u16),

    #[error("header must carry at least one encrypted data key")]
    NoEncryptedDataKeys,

    /// The action byte is not a known non-DO_NOTHING code.
    #[error("invalid action code 0x{code:02x} for attribute {attribute}")]
    InvalidAction { attribute: String, code: u8 },

    /// DO_NOTHING entries are implicit and must never be recorded.
    #[error("attribute {0} is recorded as DO_NOTHING")]
    DoNothingEntry(String),

    #[error("duplicate {field} entry {name}")]
    Duplicate { field: &'static str, name: String },

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("header has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("{field} is too long to encode")]
    TooLong { field: &'static str },

    #[error("missing value for required field `{0}`")]
    MissingField(&'static str),
}

/// Validated view of an item header. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    attribute_actions_on_encrypt: BTreeMap<String, CryptoAction>,
    algorithm_suite_id: AlgorithmSuiteId,
    encrypted_data_keys: Vec<EncryptedDataKey>,
    stored_encryption_context: BTreeMap<String, String>,
}

impl ParsedHeader {
    pub fn builder() -> ParsedHeaderBuilder {
        ParsedHeaderBuilder::default()
    }

    /// Non-DO_NOTHING actions in force when the item was encrypted.
    ///
    /// A name missing from this map was DO_NOTHING at encrypt time.
    pub fn attribute_actions_on_encrypt(&self) -> &BTreeMap<String, CryptoAction> {
        &self.attribute_actions_on_encrypt
    }

    /// Recorded action for `name`, DO_NOTHING when absent.
    pub fn action_for(&self, name: &str) -> CryptoAction {
        self.attribute_actions_on_encrypt
            .get(name)
            .copied()
            .unwrap_or(CryptoAction::DoNothing)
    }

    pub fn algorithm_suite_id(&self) -> AlgorithmSuiteId {
        self.algorithm_suite_id
    }

    /// Wrapped data keys in header order. Never empty.
    pub fn encrypted_data_keys(&self) -> &[EncryptedDataKey] {
        &self.encrypted_data_keys
    }

    pub fn stored_encryption_context(&self) -> &BTreeMap<String, String> {
        &self.stored_encryption_context
    }

    /// Public summary with no key material.
    pub fn summary(&self) -> HeaderSummary {
        HeaderSummary {
            algorithm_suite_id: self.algorithm_suite_id.wire_id(),
            attribute_actions_on_encrypt: self.attribute_actions_on_encrypt.clone(),
            key_providers: self
                .encrypted_data_keys
                .iter()
                .map(|edk| edk.provider_id.clone())
                .collect(),
            stored_encryption_context: self.stored_encryption_context.clone(),
        }
    }
}

/// Builder for [`ParsedHeader`]; all four fields are required.
#[derive(Debug, Default)]
pub struct ParsedHeaderBuilder {
    attribute_actions_on_encrypt: Option<BTreeMap<String, CryptoAction>>,
    algorithm_suite_id: Option<AlgorithmSuiteId>,
    encrypted_data_keys: Option<Vec<EncryptedDataKey>>,
    stored_encryption_context: Option<BTreeMap<String, String>>,
}

impl ParsedHeaderBuilder {
    pub fn attribute_actions_on_encrypt(mut self, actions: BTreeMap<String, CryptoAction>) -> Self {
        self.attribute_actions_on_encrypt = Some(actions);
        self
    }

    pub fn algorithm_suite_id(mut self, id: AlgorithmSuiteId) -> Self {
        self.algorithm_suite_id = Some(id);
        self
    }

    pub fn encrypted_data_keys(mut self, edks: Vec<EncryptedDataKey>) -> Self {
        self.encrypted_data_keys = Some(edks);
        self
    }

    pub fn stored_encryption_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.stored_encryption_context = Some(context);
        self
    }

    /// Validate and build the header.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::MissingField`] for the first unset field,
    /// [`HeaderError::NoEncryptedDataKeys`] for an empty key list and
    /// [`HeaderError::DoNothingEntry`] if a DO_NOTHING action was supplied.
    pub fn build(self) -> Result<ParsedHeader, HeaderError> {
        let attribute_actions_on_encrypt = self
            .attribute_actions_on_encrypt
            .ok_or(HeaderError::MissingField("attributeActionsOnEncrypt"))?;
        let algorithm_suite_id = self
            .algorithm_suite_id
            .ok_or(HeaderError::MissingField("algorithmSuiteId"))?;
        let encrypted_data_keys = self
            .encrypted_data_keys
            .ok_or(HeaderError::MissingField("encryptedDataKeys"))?;
        let stored_encryption_context = self
            .stored_encryption_context
            .ok_or(HeaderError::MissingField("storedEncryptionContext"))?;

        if encrypted_data_keys.is_empty() {
            return Err(HeaderError::NoEncryptedDataKeys);
        }
        if let Some((name, _)) = attribute_actions_on_encrypt
            .iter()
            .find(|(_, action)| **action == CryptoAction::DoNothing)
        {
            return Err(HeaderError::DoNothingEntry(name.clone()));
        }

        Ok(ParsedHeader {
            attribute_actions_on_encrypt,
            algorithm_suite_id,
            encrypted_data_keys,
            stored_encryption_context,
        })
    }
}
