//! Request and response types exchanged with the `dbe-item` host.
//!
//! Each line on stdin is one [`ItemRequest`]; each line on stdout is either an
//! [`ItemResponse`] or an [`ErrorResponse`], in input order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::CryptoAction;
use crate::item::Item;

/// Which direction a request runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Encrypt,
    Decrypt,
}

/// One record to encrypt or decrypt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRequest {
    pub op: Operation,
    /// Plaintext item for `encrypt`, stored item for `decrypt`.
    pub item: Item,
    /// Caller-supplied encryption context. On decrypt, supplies the entries
    /// that were not persisted in the header.
    #[serde(default)]
    pub encryption_context: BTreeMap<String, String>,
}

/// Public view of a parsed header, safe to log or return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSummary {
    pub algorithm_suite_id: u16,
    pub attribute_actions_on_encrypt: BTreeMap<String, CryptoAction>,
    /// Provider ids of the wrapped data keys, in header order.
    pub key_providers: Vec<String>,
    pub stored_encryption_context: BTreeMap<String, String>,
}

/// Successful result for one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse {
    pub item: Item,
    pub header: HeaderSummary,
    /// Attributes that were only weakly protected relative to the current
    /// configuration (decrypt only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weakly_protected: Vec<String>,
}

/// Error line for one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"integrity_failure"`).
    pub code: String,
    /// Human-readable description. Never contains plaintext values.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
