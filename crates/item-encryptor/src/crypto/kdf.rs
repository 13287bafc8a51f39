//! HKDF derivation of the per-item working keys.
//!
//! ```text
//! field key  = HKDF-<suite hash>(ikm = data key, salt = none, info = "dbe:v1:field-key")
//! footer key = HKDF-<suite hash>(ikm = data key, salt = none, info = "dbe:v1:footer-key")
//! ```
//!
//! The data key itself is never used directly for AEAD or MAC.

use hkdf::Hkdf;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use super::cipher::{CipherError, KEY_LEN};
use crate::suite::KdfHash;

pub const FIELD_KEY_INFO: &[u8] = b"dbe:v1:field-key";
pub const FOOTER_KEY_INFO: &[u8] = b"dbe:v1:footer-key";

/// Expand `ikm` into `N` bytes of key material under `info`.
///
/// # Errors
///
/// Returns [`CipherError::KeyDerivation`] if `N` exceeds what HKDF can expand
/// for the chosen hash.
pub fn derive<const N: usize>(
    hash: KdfHash,
    ikm: &[u8],
    info: &[u8],
) -> Result<Zeroizing<[u8; N]>, CipherError> {
    let mut okm = Zeroizing::new([0u8; N]);
    match hash {
        KdfHash::Sha256 => Hkdf::<Sha256>::new(None, ikm)
            .expand(info, &mut okm[..])
            .map_err(|_| CipherError::KeyDerivation)?,
        KdfHash::Sha512 => Hkdf::<Sha512>::new(None, ikm)
            .expand(info, &mut okm[..])
            .map_err(|_| CipherError::KeyDerivation)?,
    }
    Ok(okm)
}

/// Working keys for one item.
pub struct ItemKeys {
    pub field: Zeroizing<[u8; KEY_LEN]>,
    pub footer: Zeroizing<[u8; KEY_LEN]>,
}

impl ItemKeys {
    /// Derive field and footer keys from a data key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::KeyDerivation`] if HKDF expansion fails.
    pub fn derive(hash: KdfHash, data_key: &[u8]) -> Result<Self, CipherError> {
        Ok(Self {
            field: derive(hash, data_key, FIELD_KEY_INFO)?,
            footer: derive(hash, data_key, FOOTER_KEY_INFO)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a: Zeroizing<[u8; 32]> = derive(KdfHash::Sha256, &[7u8; 32], b"info").unwrap();
        let b: Zeroizing<[u8; 32]> = derive(KdfHash::Sha256, &[7u8; 32], b"info").unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn info_and_hash_separate_keys() {
        let keys256 = ItemKeys::derive(KdfHash::Sha256, &[1u8; 32]).unwrap();
        let keys512 = ItemKeys::derive(KdfHash::Sha512, &[1u8; 32]).unwrap();
        assert_ne!(*keys256.field, *keys256.footer);
        assert_ne!(*keys256.field, *keys512.field);
    }

    #[test]
    fn oversized_output_rejected() {
        // HKDF-SHA256 can expand at most 255 * 32 bytes.
        let out = derive::<{ 255 * 32 + 1 }>(KdfHash::Sha256, &[1u8; 32], b"x");
        assert!(out.is_err());
    }
}
