use common::{ServiceError, ValueError};
use thiserror::Error;

use crate::actions::ActionError;
use crate::beacon::BeaconError;
use crate::config::ConfigError;
use crate::crypto::CipherError;
use crate::header::HeaderError;
use crate::keys::KeyError;
use crate::suite::AlgorithmSuiteId;

/// Errors produced while encrypting or decrypting an item.
///
/// Every variant that concerns one attribute or header field names it. No
/// variant carries plaintext values or key material.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("malformed header: {0}")]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Action(#[from] ActionError),

    /// Authentication failed. `field` is `dbe_foot`, an attribute name or a
    /// context key.
    #[error("integrity check failed for {field}")]
    Integrity { field: String },

    #[error(transparent)]
    Beacon(#[from] BeaconError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("attribute {attribute} has an invalid value")]
    Value {
        attribute: String,
        #[source]
        source: ValueError,
    },

    #[error("attribute name {0} uses the reserved prefix `dbe_`")]
    ReservedAttribute(String),

    #[error("context key {0} uses the reserved prefix `dbe:`")]
    ReservedContextKey(String),

    #[error("key attribute {0} is missing from the item")]
    MissingKeyAttribute(String),

    #[error("required context key {0} was not supplied")]
    MissingContextKey(String),

    /// The item lacks the named protection attribute or it is not binary.
    #[error("item has no valid {0} attribute")]
    NotEncrypted(&'static str),

    #[error("algorithm suite {0:?} is not registered")]
    UnsupportedSuite(AlgorithmSuiteId),

    #[error("cryptographic operation failed for {field}")]
    Crypto {
        field: String,
        #[source]
        source: CipherError,
    },
}

impl ItemError {
    pub(crate) fn integrity(field: impl Into<String>) -> Self {
        ItemError::Integrity {
            field: field.into(),
        }
    }
}

impl From<&ItemError> for ServiceError {
    fn from(err: &ItemError) -> Self {
        let message = err.to_string();
        match err {
            ItemError::Integrity { .. } => ServiceError::IntegrityFailure(message),
            ItemError::Key(_) => ServiceError::KeyUnavailable(message),
            ItemError::Crypto { .. } | ItemError::UnsupportedSuite(_) => {
                ServiceError::Internal(message)
            }
            ItemError::Header(_)
            | ItemError::Action(_)
            | ItemError::Beacon(_)
            | ItemError::Config(_)
            | ItemError::Value { .. }
            | ItemError::ReservedAttribute(_)
            | ItemError::ReservedContextKey(_)
            | ItemError::MissingKeyAttribute(_)
            | ItemError::MissingContextKey(_)
            | ItemError::NotEncrypted(_) => ServiceError::BadRequest(message),
        }
    }
}
