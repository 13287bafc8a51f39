//! [`DataKey`]: the plaintext per-item data key.

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::cipher::{random_key, KEY_LEN};

/// Key material of the wrong size was offered as a data key.
#[derive(Debug, Error)]
#[error("data key has invalid length: expected {KEY_LEN} bytes, got {0}")]
pub struct InvalidKeyLength(pub usize);

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// Scoped to a single item operation and never shared between records.
/// When this type is dropped, the memory is overwritten with zeroes to
/// minimise the window during which plaintext key material lives in RAM.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; KEY_LEN]);

impl DataKey {
    /// Generate a fresh random data key.
    pub fn generate() -> Self {
        Self(random_key())
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy key material out of a slice.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidKeyLength`] if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidKeyLength> {
        let array: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| InvalidKeyLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("DataKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = DataKey::generate();
        let b = DataKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(DataKey::from_slice(&[0u8; 16]).is_err());
        let key = DataKey::from_slice(&[0x42u8; KEY_LEN]).unwrap();
        assert_eq!(key.as_bytes(), &[0x42u8; KEY_LEN]);
    }

    #[test]
    fn data_key_redacted_in_debug() {
        let key = DataKey::from_bytes([0xFF; KEY_LEN]);
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
