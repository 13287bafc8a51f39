//! Beacon key derivation and truncated keyed hashes.
//!
//! ```text
//! beacon key = HKDF-SHA512(ikm = beacon root key, info = "dbe-beacon:" + name)   64 bytes
//! token      = low `length` bits of HMAC-SHA512(beacon key, tag || value)[0..8]
//! ```
//!
//! Tokens are rendered as zero-padded lowercase hex of `ceil(length / 4)` digits.

use common::item::normalize_number;
use common::AttributeValue;
use zeroize::Zeroizing;

use super::{BeaconError, BeaconKeyMaterial};
use crate::crypto::{kdf, mac};
use crate::suite::KdfHash;

pub const BEACON_KEY_LEN: usize = 64;
const BEACON_KEY_INFO_PREFIX: &str = "dbe-beacon:";

/// Minimum and maximum token length in bits.
pub const MIN_LENGTH: u8 = 1;
pub const MAX_LENGTH: u8 = 63;

const TAG_STRING: u8 = 0x01;
const TAG_NUMBER: u8 = 0x02;
const TAG_BINARY: u8 = 0x03;
const TAG_BOOL: u8 = 0x04;

pub type BeaconKey = Zeroizing<[u8; BEACON_KEY_LEN]>;

/// Derive the HMAC key of beacon `name` from the root material.
///
/// # Errors
///
/// Returns [`BeaconError::KeyDerivation`] if HKDF expansion fails.
pub fn derive_beacon_key(
    material: &BeaconKeyMaterial,
    name: &str,
) -> Result<BeaconKey, BeaconError> {
    let info = format!("{BEACON_KEY_INFO_PREFIX}{name}");
    kdf::derive(KdfHash::Sha512, material.bytes(), info.as_bytes())
        .map_err(|_| BeaconError::KeyDerivation(name.to_owned()))
}

/// Tagged bytes hashed for a scalar value.
///
/// Numbers are normalised first so `1.0` and `1` share a token, and the type
/// tag keeps a number apart from the equal string.
pub fn beacon_bytes(beacon: &str, value: &AttributeValue) -> Result<Vec<u8>, BeaconError> {
    let (tag, body) = match value {
        AttributeValue::S(s) => (TAG_STRING, s.as_bytes().to_vec()),
        AttributeValue::N(n) => {
            let normalized = normalize_number(n).map_err(|source| BeaconError::Value {
                beacon: beacon.to_owned(),
                source,
            })?;
            (TAG_NUMBER, normalized.into_bytes())
        }
        AttributeValue::B(b) => (TAG_BINARY, b.clone()),
        AttributeValue::Bool(b) => (TAG_BOOL, vec![u8::from(*b)]),
        other => {
            return Err(BeaconError::UnsupportedType {
                beacon: beacon.to_owned(),
                type_id: other.type_id(),
            })
        }
    };
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(tag);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Keyed hash of `message`, truncated to `length` bits and hex encoded.
pub fn truncated_token(key: &[u8], message: &[u8], length: u8) -> Result<String, BeaconError> {
    let digest = mac::sign(KdfHash::Sha512, key, message)
        .map_err(|_| BeaconError::KeyDerivation("hmac".to_owned()))?;
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let mask = (1u64 << length) - 1;
    let value = u64::from_be_bytes(head) & mask;
    let width = usize::from(length).div_ceil(4);
    Ok(format!("{value:0width$x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> BeaconKeyMaterial {
        BeaconKeyMaterial::new("root-1", vec![7u8; 32])
    }

    #[test]
    fn extreme_number_exponent_is_a_value_error() {
        let err = beacon_bytes("age", &AttributeValue::N("1e-9223372036854775808".into())).unwrap_err();
        assert!(matches!(
            err,
            BeaconError::Value { beacon, source: common::ValueError::InvalidNumber(_) } if beacon == "age"
        ));
    }

    #[test]
    fn beacon_keys_differ_per_name() {
        let a = derive_beacon_key(&material(), "email").unwrap();
        let b = derive_beacon_key(&material(), "phone").unwrap();
        assert_ne!(*a, *b);
        assert_eq!(*a, *derive_beacon_key(&material(), "email").unwrap());
    }

    #[test]
    fn token_width_follows_length() {
        let key = derive_beacon_key(&material(), "email").unwrap();
        for (length, digits) in [(1u8, 1usize), (4, 1), (5, 2), (16, 4), (63, 16)] {
            let token = truncated_token(&key[..], b"\x01x", length).unwrap();
            assert_eq!(token.len(), digits, "length {length}");
            let value = u64::from_str_radix(&token, 16).unwrap();
            assert!(value < (1u64 << length));
        }
    }

    #[test]
    fn equal_numbers_share_bytes() {
        let a = beacon_bytes("n", &AttributeValue::N("1.0".into())).unwrap();
        let b = beacon_bytes("n", &AttributeValue::N("1".into())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn number_and_string_never_collide() {
        let n = beacon_bytes("n", &AttributeValue::N("1".into())).unwrap();
        let s = beacon_bytes("n", &AttributeValue::S("1".into())).unwrap();
        assert_ne!(n, s);
    }

    #[test]
    fn containers_rejected() {
        let err = beacon_bytes("n", &AttributeValue::L(Vec::new())).unwrap_err();
        assert!(matches!(err, BeaconError::UnsupportedType { .. }));
    }
}
