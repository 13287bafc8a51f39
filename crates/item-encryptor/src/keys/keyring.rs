//! Keyrings: the capability that wraps and unwraps data keys.
//!
//! The item encryptor never inspects how a keyring protects a data key. It
//! hands over plaintext keys to wrap and [`EncryptedDataKey`]s to unwrap, and
//! treats every failure as opaque.

use std::sync::Arc;

use thiserror::Error;
use zeroize::Zeroizing;

use super::data_key::DataKey;
use super::EncryptedDataKey;
use crate::crypto::cipher::{self, KEY_LEN, NONCE_LEN};

/// Errors reported by a keyring.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// The encrypted data key was produced by a different provider.
    #[error("encrypted data key belongs to another provider ({provider_id})")]
    NotMine { provider_id: String },

    /// Wrapping the data key failed.
    #[error("wrap failed: {0}")]
    Wrap(String),

    /// The wrapped key did not authenticate under the provider's key.
    #[error("wrapped key failed authentication")]
    Authentication,

    /// Unwrapping the encrypted data key failed.
    #[error("unwrap failed: {0}")]
    Unwrap(String),
}

/// Wraps and unwraps data keys.
///
/// Implementations may block (for example on a remote key service); hosts that
/// care run item operations on a blocking worker pool.
#[cfg_attr(test, mockall::automock)]
pub trait Keyring: Send + Sync {
    /// Wrap `data_key`, returning one entry per provider in provider order.
    fn wrap_key(&self, data_key: &DataKey) -> Result<Vec<EncryptedDataKey>, KeyringError>;

    /// Unwrap a single encrypted data key.
    fn unwrap_key(&self, edk: &EncryptedDataKey) -> Result<DataKey, KeyringError>;
}

/// Keyring that wraps data keys with a local AES-256 wrapping key.
///
/// The namespace becomes the provider id and the key name the provider info;
/// both are bound into the wrapping AAD.
pub struct RawAesKeyring {
    namespace: String,
    name: String,
    wrapping_key: Zeroizing<[u8; KEY_LEN]>,
}

impl RawAesKeyring {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        wrapping_key: [u8; KEY_LEN],
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            wrapping_key: Zeroizing::new(wrapping_key),
        }
    }

    fn aad(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(self.namespace.len() + self.name.len() + 4);
        aad.extend_from_slice(&(self.namespace.len() as u16).to_be_bytes());
        aad.extend_from_slice(self.namespace.as_bytes());
        aad.extend_from_slice(&(self.name.len() as u16).to_be_bytes());
        aad.extend_from_slice(self.name.as_bytes());
        aad
    }

    fn owns(&self, edk: &EncryptedDataKey) -> bool {
        edk.provider_id == self.namespace && edk.provider_info.as_slice() == self.name.as_bytes()
    }
}

impl std::fmt::Debug for RawAesKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawAesKeyring")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Keyring for RawAesKeyring {
    fn wrap_key(&self, data_key: &DataKey) -> Result<Vec<EncryptedDataKey>, KeyringError> {
        let (nonce, sealed) = cipher::seal(&self.wrapping_key[..], &self.aad(), data_key.as_bytes())
            .map_err(|e| KeyringError::Wrap(e.to_string()))?;
        let mut ciphertext = Vec::with_capacity(NONCE_LEN + sealed.len());
        ciphertext.extend_from_slice(&nonce);
        ciphertext.extend_from_slice(&sealed);
        Ok(vec![EncryptedDataKey {
            provider_id: self.namespace.clone(),
            provider_info: self.name.as_bytes().to_vec(),
            ciphertext,
        }])
    }

    fn unwrap_key(&self, edk: &EncryptedDataKey) -> Result<DataKey, KeyringError> {
        if !self.owns(edk) {
            return Err(KeyringError::NotMine {
                provider_id: edk.provider_id.clone(),
            });
        }
        if edk.ciphertext.len() < NONCE_LEN {
            return Err(KeyringError::Authentication);
        }
        let (nonce_bytes, sealed) = edk.ciphertext.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        let plaintext = Zeroizing::new(
            cipher::open(&self.wrapping_key[..], &nonce, &self.aad(), sealed)
                .map_err(|_| KeyringError::Authentication)?,
        );
        DataKey::from_slice(&plaintext).map_err(|e| KeyringError::Unwrap(e.to_string()))
    }
}

/// Fan-out keyring: wraps under every child, unwraps with the first child that can.
pub struct MultiKeyring {
    children: Vec<Arc<dyn Keyring>>,
}

impl MultiKeyring {
    pub fn new(children: Vec<Arc<dyn Keyring>>) -> Self {
        Self { children }
    }
}

impl Keyring for MultiKeyring {
    fn wrap_key(&self, data_key: &DataKey) -> Result<Vec<EncryptedDataKey>, KeyringError> {
        let mut out = Vec::new();
        for child in &self.children {
            out.extend(child.wrap_key(data_key)?);
        }
        Ok(out)
    }

    fn unwrap_key(&self, edk: &EncryptedDataKey) -> Result<DataKey, KeyringError> {
        let mut last_err = KeyringError::NotMine {
            provider_id: edk.provider_id.clone(),
        };
        for child in &self.children {
            match child.unwrap_key(edk) {
                Ok(key) => return Ok(key),
                // A child that does not own the key must not mask a real failure.
                Err(KeyringError::NotMine { .. }) => {}
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}
