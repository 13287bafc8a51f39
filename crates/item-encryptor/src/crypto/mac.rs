//! Footer HMAC over the header, the signed attributes and the encryption context.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use super::cipher::CipherError;
use crate::suite::KdfHash;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Compute the footer tag for `message`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if the HMAC rejects the key.
pub fn sign(hash: KdfHash, key: &[u8], message: &[u8]) -> Result<Vec<u8>, CipherError> {
    let tag = match hash {
        KdfHash::Sha256 => {
            let mut mac =
                HmacSha256::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        KdfHash::Sha512 => {
            let mut mac =
                HmacSha512::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(tag)
}

/// Verify a footer tag in constant time.
///
/// # Errors
///
/// Returns [`CipherError::MacMismatch`] if `tag` does not authenticate `message`.
pub fn verify(hash: KdfHash, key: &[u8], message: &[u8], tag: &[u8]) -> Result<(), CipherError> {
    match hash {
        KdfHash::Sha256 => {
            let mut mac =
                HmacSha256::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?;
            mac.update(message);
            mac.verify_slice(tag).map_err(|_| CipherError::MacMismatch)
        }
        KdfHash::Sha512 => {
            let mut mac =
                HmacSha512::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?;
            mac.update(message);
            mac.verify_slice(tag).map_err(|_| CipherError::MacMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_lengths_follow_hash() {
        assert_eq!(sign(KdfHash::Sha256, b"k", b"m").unwrap().len(), 32);
        assert_eq!(sign(KdfHash::Sha512, b"k", b"m").unwrap().len(), 64);
    }

    #[test]
    fn verify_accepts_own_tag() {
        let tag = sign(KdfHash::Sha512, b"key", b"message").unwrap();
        verify(KdfHash::Sha512, b"key", b"message", &tag).unwrap();
    }

    #[test]
    fn verify_rejects_changed_message() {
        let tag = sign(KdfHash::Sha256, b"key", b"message").unwrap();
        assert!(matches!(
            verify(KdfHash::Sha256, b"key", b"messagf", &tag),
            Err(CipherError::MacMismatch)
        ));
    }
}
