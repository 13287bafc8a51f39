//! Envelope key management: data key generation, wrap and unwrap.
//!
//! # Lifecycle
//!
//! 1. On encrypt, [`DataKey::generate`] draws a fresh 32-byte data key.
//! 2. [`wrap_data_key`] hands it to the configured [`Keyring`] and records every
//!    [`EncryptedDataKey`] it returns, in provider order, for the header.
//! 3. On decrypt, [`unwrap_data_key`] walks the header's keys in order and
//!    returns the first one the keyring can unwrap.
//!
//! # Security invariants
//!
//! - The plaintext data key is **never** logged or included in errors.
//! - Data keys are scoped to one item and zeroised on drop.

pub mod data_key;
pub mod keyring;

pub use data_key::DataKey;
pub use keyring::{Keyring, KeyringError, MultiKeyring, RawAesKeyring};

use thiserror::Error;
use tracing::{debug, warn};

/// Wrapped key material plus the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDataKey {
    /// Identifier of the wrapping mechanism (e.g. a keyring namespace).
    pub provider_id: String,
    /// Provider-specific locator for the wrapping key.
    pub provider_info: Vec<u8>,
    /// Opaque wrapped key bytes.
    pub ciphertext: Vec<u8>,
}

/// One failed unwrap attempt, kept so every cause stays inspectable.
#[derive(Debug)]
pub struct UnwrapAttempt {
    /// Position of the key in the header.
    pub index: usize,
    pub provider_id: String,
    pub provider_info: Vec<u8>,
    pub cause: KeyringError,
}

/// Errors produced by the key manager.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Every encrypted data key failed to unwrap.
    #[error("no encrypted data key could be unwrapped ({} attempts)", .attempts.len())]
    Unwrap { attempts: Vec<UnwrapAttempt> },

    /// The keyring returned an empty key list on encrypt.
    #[error("keyring produced no encrypted data keys")]
    NoKeyProduced,

    /// The keyring failed to wrap the data key.
    #[error("keyring failed to wrap the data key")]
    Wrap(#[source] KeyringError),
}

impl KeyError {
    /// Whether the failure points at altered key material rather than at an
    /// unavailable provider.
    ///
    /// True when at least one attempt failed authentication and every other
    /// attempt was declined as belonging to another provider.
    pub fn is_forgery(&self) -> bool {
        let KeyError::Unwrap { attempts } = self else {
            return false;
        };
        attempts
            .iter()
            .any(|a| matches!(a.cause, KeyringError::Authentication))
            && attempts.iter().all(|a| {
                matches!(
                    a.cause,
                    KeyringError::Authentication | KeyringError::NotMine { .. }
                )
            })
    }
}

/// Wrap `data_key` with `keyring`, preserving the keyring's provider order.
///
/// # Errors
///
/// Returns [`KeyError::NoKeyProduced`] if the keyring returns no entries and
/// [`KeyError::Wrap`] if it fails outright.
pub fn wrap_data_key(
    keyring: &dyn Keyring,
    data_key: &DataKey,
) -> Result<Vec<EncryptedDataKey>, KeyError> {
    let edks = keyring.wrap_key(data_key).map_err(KeyError::Wrap)?;
    if edks.is_empty() {
        return Err(KeyError::NoKeyProduced);
    }
    debug!(count = edks.len(), "data key wrapped");
    Ok(edks)
}

/// Unwrap the first encrypted data key that `keyring` accepts.
///
/// Keys are attempted in header order and iteration stops at the first success.
///
/// # Errors
///
/// Returns [`KeyError::Unwrap`] carrying one [`UnwrapAttempt`] per key if none
/// unwraps.
pub fn unwrap_data_key(
    keyring: &dyn Keyring,
    edks: &[EncryptedDataKey],
) -> Result<DataKey, KeyError> {
    let mut attempts = Vec::new();
    for (index, edk) in edks.iter().enumerate() {
        match keyring.unwrap_key(edk) {
            Ok(key) => {
                debug!(index, provider_id = %edk.provider_id, "data key unwrapped");
                return Ok(key);
            }
            Err(cause) => {
                debug!(index, provider_id = %edk.provider_id, error = %cause, "unwrap attempt failed");
                attempts.push(UnwrapAttempt {
                    index,
                    provider_id: edk.provider_id.clone(),
                    provider_info: edk.provider_info.clone(),
                    cause,
                });
            }
        }
    }
    warn!(attempts = attempts.len(), "no encrypted data key could be unwrapped");
    Err(KeyError::Unwrap { attempts })
}
