//! Algorithm suite registry.
//!
//! A suite fixes every structural parameter of a protected item: data key
//! length, AEAD nonce and tag sizes, the hash behind HKDF and the footer MAC,
//! and whether an asymmetric signature is required. The registry is read-only
//! after construction; [`SuiteRegistry::standard`] is the process-wide default
//! and custom registries can be injected wherever a parse happens.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::crypto::cipher::{KEY_LEN, NONCE_LEN, TAG_LEN};

/// Identifier of a registered algorithm suite.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum AlgorithmSuiteId {
    #[serde(rename = "AES_256_GCM_SIV_HKDF_SHA256_HMAC_SHA256")]
    Aes256GcmSivHkdfSha256,
    #[default]
    #[serde(rename = "AES_256_GCM_SIV_HKDF_SHA512_HMAC_SHA512")]
    Aes256GcmSivHkdfSha512,
}

impl AlgorithmSuiteId {
    /// Two-byte id written into the header.
    pub fn wire_id(self) -> u16 {
        match self {
            AlgorithmSuiteId::Aes256GcmSivHkdfSha256 => 0x6710,
            AlgorithmSuiteId::Aes256GcmSivHkdfSha512 => 0x6711,
        }
    }

    pub fn from_wire_id(id: u16) -> Option<Self> {
        match id {
            0x6710 => Some(AlgorithmSuiteId::Aes256GcmSivHkdfSha256),
            0x6711 => Some(AlgorithmSuiteId::Aes256GcmSivHkdfSha512),
            _ => None,
        }
    }
}

/// Hash function used for key derivation and the footer MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    Sha256,
    Sha512,
}

impl KdfHash {
    /// Digest size in bytes, which is also the HMAC tag size.
    pub fn output_len(self) -> usize {
        match self {
            KdfHash::Sha256 => 32,
            KdfHash::Sha512 => 64,
        }
    }
}

/// Structural parameters of one suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmSuite {
    pub id: AlgorithmSuiteId,
    /// Data key length in bytes.
    pub key_len: usize,
    pub nonce_len: usize,
    /// AEAD authentication tag length in bytes.
    pub tag_len: usize,
    pub kdf: KdfHash,
    /// Footer MAC length in bytes.
    pub mac_len: usize,
    /// Whether an asymmetric signature must accompany the footer.
    pub signature: bool,
    /// Whether the header is bound to the data key by the footer MAC.
    pub key_commitment: bool,
}

impl AlgorithmSuite {
    /// Whether the item encryptor can run this suite.
    ///
    /// The field cipher is AES-256-GCM-SIV and the footer is an untruncated
    /// HMAC that commits to the data key. Suites that ask for other sizes, an
    /// asymmetric signature or no key commitment are rejected.
    pub fn is_supported(&self) -> bool {
        self.key_len == KEY_LEN
            && self.nonce_len == NONCE_LEN
            && self.tag_len == TAG_LEN
            && self.mac_len == self.kdf.output_len()
            && !self.signature
            && self.key_commitment
    }
}

/// Read-only catalogue of suites keyed by wire id.
#[derive(Debug, Clone)]
pub struct SuiteRegistry {
    suites: BTreeMap<u16, AlgorithmSuite>,
}

impl SuiteRegistry {
    pub fn new(suites: impl IntoIterator<Item = AlgorithmSuite>) -> Self {
        Self {
            suites: suites
                .into_iter()
                .map(|suite| (suite.id.wire_id(), suite))
                .collect(),
        }
    }

    /// The process-wide registry of built-in suites, initialised on first use.
    pub fn standard() -> &'static SuiteRegistry {
        static STANDARD: OnceLock<SuiteRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            SuiteRegistry::new([
                AlgorithmSuite {
                    id: AlgorithmSuiteId::Aes256GcmSivHkdfSha256,
                    key_len: 32,
                    nonce_len: 12,
                    tag_len: 16,
                    kdf: KdfHash::Sha256,
                    mac_len: 32,
                    signature: false,
                    key_commitment: true,
                },
                AlgorithmSuite {
                    id: AlgorithmSuiteId::Aes256GcmSivHkdfSha512,
                    key_len: 32,
                    nonce_len: 12,
                    tag_len: 16,
                    kdf: KdfHash::Sha512,
                    mac_len: 64,
                    signature: false,
                    key_commitment: true,
                },
            ])
        })
    }

    /// Look up a suite by its wire id.
    pub fn by_wire_id(&self, wire_id: u16) -> Option<&AlgorithmSuite> {
        self.suites.get(&wire_id)
    }

    pub fn get(&self, id: AlgorithmSuiteId) -> Option<&AlgorithmSuite> {
        self.by_wire_id(id.wire_id())
    }
}
