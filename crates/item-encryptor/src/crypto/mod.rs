//! Cryptographic primitives used by the item encryptor.
//!
//! This module is free of item, header and keyring logic. It provides:
//!
//! - [`cipher`]: AES-256-GCM-SIV sealing of single attribute values and wrapped keys.
//! - [`kdf`]: HKDF derivation of per-item field and footer keys.
//! - [`mac`]: the footer HMAC that authenticates header, signed attributes and context.
//!
//! # Encrypted attribute format
//!
//! ```text
//! u16 type id || 12-byte nonce || ciphertext+tag
//! ```
//!
//! The type id travels in the clear and is bound to the ciphertext through the AAD.

pub mod cipher;
pub mod kdf;
pub mod mac;

pub use cipher::{CipherError, EncryptedField, KEY_LEN, NONCE_LEN, TAG_LEN};
