//! AES-256-GCM-SIV sealing of attribute values and wrapped data keys.
//!
//! Stored field layout: `type id (u16) ‖ nonce (12) ‖ ciphertext ‖ tag (16)`.
//! The AAD binds the attribute name and the plaintext type id, so a ciphertext
//! moved to another attribute or relabelled with another type fails to open.
//! Every seal draws a fresh nonce from the OS RNG.

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    Aes256GcmSiv, Nonce,
};
use common::AttributeValue;
use thiserror::Error;

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// Nonce length.
pub const NONCE_LEN: usize = 12;

/// Byte length of the AES-GCM-SIV authentication tag.
pub const TAG_LEN: usize = 16;

/// Domain label prefixed to every attribute AAD.
const FIELD_AAD_LABEL: &[u8] = b"dbe:v1:field";

/// A parsed, encrypted attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Type id of the plaintext value.
    pub type_id: u16,
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedField {
    /// Encode this value to its stored binary representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.type_id.to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse a stored binary value back into an [`EncryptedField`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidFormat`] if the value is too short to hold
    /// a type id, a nonce and a tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        if bytes.len() < 2 + NONCE_LEN + TAG_LEN {
            return Err(CipherError::InvalidFormat);
        }
        let type_id = u16::from_be_bytes([bytes[0], bytes[1]]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[2..2 + NONCE_LEN]);
        Ok(Self {
            type_id,
            nonce,
            ciphertext: bytes[2 + NONCE_LEN..].to_vec(),
        })
    }
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// AES-GCM-SIV encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// The stored value does not match the expected layout.
    #[error("invalid encrypted field format")]
    InvalidFormat,

    /// HKDF expansion failed.
    #[error("key derivation failed")]
    KeyDerivation,

    /// The footer MAC did not verify.
    #[error("mac verification failed")]
    MacMismatch,
}

/// Fill a fresh key-sized buffer from the OS CSPRNG.
pub fn random_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Seal `plaintext` under `key` with a random nonce.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
pub fn seal(
    key: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<([u8; NONCE_LEN], Vec<u8>), CipherError> {
    let cipher = build_cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CipherError::AeadFailure)?;
    Ok((nonce_bytes, ciphertext))
}

/// Open a value produced by [`seal`].
///
/// # Errors
///
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key,
/// wrong AAD or tampered data).
pub fn open(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CipherError::AeadFailure)
}

/// Encrypt one attribute value. The attribute name and type id are bound
/// through the AAD, so a ciphertext cannot be moved to another attribute.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
pub fn encrypt_field(
    name: &str,
    value: &AttributeValue,
    key: &[u8],
) -> Result<EncryptedField, CipherError> {
    let type_id = value.type_id();
    let (nonce, ciphertext) = seal(key, &field_aad(name, type_id), &value.body_bytes())?;
    Ok(EncryptedField {
        type_id,
        nonce,
        ciphertext,
    })
}

/// Decrypt an [`EncryptedField`] back to its attribute value.
///
/// # Errors
///
/// Returns [`CipherError::AeadFailure`] if authentication fails and
/// [`CipherError::InvalidFormat`] if the plaintext does not decode.
pub fn decrypt_field(
    name: &str,
    field: &EncryptedField,
    key: &[u8],
) -> Result<AttributeValue, CipherError> {
    let body = open(
        key,
        &field.nonce,
        &field_aad(name, field.type_id),
        &field.ciphertext,
    )?;
    AttributeValue::decode_body(field.type_id, &body).map_err(|_| CipherError::InvalidFormat)
}

fn field_aad(name: &str, type_id: u16) -> Vec<u8> {
    let mut aad = Vec::with_capacity(FIELD_AAD_LABEL.len() + 4 + name.len());
    aad.extend_from_slice(FIELD_AAD_LABEL);
    aad.extend_from_slice(&(name.len() as u16).to_be_bytes());
    aad.extend_from_slice(name.as_bytes());
    aad.extend_from_slice(&type_id.to_be_bytes());
    aad
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = random_key();
        let value = AttributeValue::S("123-45-6789".into());
        let encrypted = encrypt_field("ssn", &value, &key).unwrap();
        assert_eq!(encrypted.type_id, value.type_id());
        let decrypted = decrypt_field("ssn", &encrypted, &key).unwrap();
        assert_eq!(decrypted, value);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let value = AttributeValue::S("secret".into());
        let encrypted = encrypt_field("x", &value, &random_key()).unwrap();
        assert!(decrypt_field("x", &encrypted, &random_key()).is_err());
    }

    #[test]
    fn moved_ciphertext_fails_auth() {
        let key = random_key();
        let encrypted = encrypt_field("ssn", &AttributeValue::S("1".into()), &key).unwrap();
        assert!(matches!(
            decrypt_field("phone", &encrypted, &key),
            Err(CipherError::AeadFailure)
        ));
    }

    #[test]
    fn retyped_ciphertext_fails_auth() {
        let key = random_key();
        let mut encrypted = encrypt_field("n", &AttributeValue::N("12".into()), &key).unwrap();
        encrypted.type_id = common::item::TYPE_STRING;
        assert!(decrypt_field("n", &encrypted, &key).is_err());
    }

    #[test]
    fn invalid_key_length_rejected() {
        let short_key = vec![0u8; 16];
        assert!(matches!(
            seal(&short_key, b"", b"x"),
            Err(CipherError::InvalidKeyLength)
        ));
    }

    #[test]
    fn stored_bytes_round_trip() {
        let key = random_key();
        let field = encrypt_field("b", &AttributeValue::B(vec![9; 40]), &key).unwrap();
        let bytes = field.to_bytes();
        assert_eq!(&bytes[..2], &common::item::TYPE_BINARY.to_be_bytes());
        assert_eq!(EncryptedField::from_bytes(&bytes).unwrap(), field);
    }

    #[test]
    fn from_bytes_rejects_short_input() {
        assert!(EncryptedField::from_bytes(&[0u8; 2 + NONCE_LEN]).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let key = random_key();
        let mut field = encrypt_field("t", &AttributeValue::S("tamper me".into()), &key).unwrap();
        field.ciphertext[0] ^= 0xFF;
        assert!(decrypt_field("t", &field, &key).is_err());
    }
}
