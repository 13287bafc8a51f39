//! Per-attribute cryptographic treatment.

use serde::{Deserialize, Serialize};

/// What happens to an attribute when an item is encrypted.
///
/// Variants are declared weakest first so the derived [`Ord`] gives
/// `EncryptAndSign > SignOnly > DoNothing`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CryptoAction {
    /// Stored as plaintext and not authenticated.
    #[default]
    DoNothing,
    /// Stored as plaintext, covered by the item's authentication tag.
    SignOnly,
    /// Encrypted and covered by the item's authentication tag.
    EncryptAndSign,
}

impl CryptoAction {
    /// One-byte code written into the header. `DoNothing` is never written.
    pub fn wire_code(self) -> Option<u8> {
        match self {
            CryptoAction::DoNothing => None,
            CryptoAction::EncryptAndSign => Some(0x01),
            CryptoAction::SignOnly => Some(0x02),
        }
    }

    /// Inverse of [`CryptoAction::wire_code`].
    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(CryptoAction::EncryptAndSign),
            0x02 => Some(CryptoAction::SignOnly),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_order() {
        assert!(CryptoAction::EncryptAndSign > CryptoAction::SignOnly);
        assert!(CryptoAction::SignOnly > CryptoAction::DoNothing);
    }

    #[test]
    fn do_nothing_has_no_wire_code() {
        assert_eq!(CryptoAction::DoNothing.wire_code(), None);
        assert_eq!(CryptoAction::from_wire_code(0x00), None);
        assert_eq!(CryptoAction::from_wire_code(0x03), None);
    }

    #[test]
    fn wire_codes_are_inverse() {
        for action in [CryptoAction::EncryptAndSign, CryptoAction::SignOnly] {
            let code = action.wire_code().unwrap();
            assert_eq!(CryptoAction::from_wire_code(code), Some(action));
        }
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&CryptoAction::EncryptAndSign).unwrap();
        assert_eq!(json, "\"ENCRYPT_AND_SIGN\"");
        let parsed: CryptoAction = serde_json::from_str("\"SIGN_ONLY\"").unwrap();
        assert_eq!(parsed, CryptoAction::SignOnly);
    }
}
