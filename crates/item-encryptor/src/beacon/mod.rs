//! Searchable beacons: deterministic keyed tokens over plaintext values.
//!
//! Beacon keys are derived from a stable root key ([`BeaconKeyMaterial`]) that
//! is supplied separately from the per-item data keys, so the same plaintext
//! yields the same token on every item and tokens can be matched by the
//! database. Tokens are truncated on purpose: shorter tokens leak less about
//! the value distribution at the cost of more false positives.
//!
//! Beacon outputs are stored next to the protected item under
//! `dbe_b_<beacon name>`. Set styles and range beacons are stored as a list of
//! strings so duplicate tokens are kept.

pub mod cache;
pub mod compound;
pub mod engine;
pub mod location;
pub mod model;
pub mod range;
pub mod standard;
pub mod virtual_field;

pub use cache::BeaconKeyCache;
pub use engine::{BeaconEngine, BeaconPlan, BeaconSource, SourceRequirement};
pub use location::Location;
pub use model::{
    BeaconStyle, BeaconVersion, CompoundBeacon, CompoundPart, Constructor, ConstructorPart,
    RangeBeacon, StandardBeacon, Transform, VirtualField, VirtualPart,
};
pub use standard::derive_beacon_key;

use std::fmt;

use common::ValueError;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

/// Attribute name prefix under which beacon outputs are stored.
pub const BEACON_ATTRIBUTE_PREFIX: &str = "dbe_b_";

/// Stored attribute name for beacon `name`.
pub fn beacon_attribute(name: &str) -> String {
    format!("{BEACON_ATTRIBUTE_PREFIX}{name}")
}

/// Errors produced by the beacon engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeaconError {
    #[error("unknown beacon {0}")]
    UnknownBeacon(String),

    #[error("beacon or virtual field name {0} is used more than once")]
    DuplicateName(String),

    #[error("beacon {beacon} has length {length}, expected 1..=63 bits")]
    InvalidLength { beacon: String, length: u8 },

    #[error("beacon {beacon} is misconfigured: {reason}")]
    InvalidConfig { beacon: String, reason: String },

    #[error("invalid attribute location {0:?}")]
    InvalidLocation(String),

    /// A set-style beacon was given a scalar value.
    #[error("beacon {0} expects a set value")]
    ExpectedSet(String),

    /// A non-set beacon was given a set value.
    #[error("beacon {0} does not accept set values")]
    UnexpectedSet(String),

    #[error("beacon {beacon} cannot hash values of type 0x{type_id:04x}")]
    UnsupportedType { beacon: String, type_id: u16 },

    #[error("beacon {beacon} source value is invalid")]
    Value {
        beacon: String,
        #[source]
        source: ValueError,
    },

    #[error("range beacon {0} requires an integer value")]
    NotAnInteger(String),

    #[error("range beacon {beacon} query has lo {lo} greater than hi {hi}")]
    InvalidRange { beacon: String, lo: i64, hi: i64 },

    #[error("range beacon {beacon} query needs {needed} tokens, limit is {max}")]
    RangeTooWide {
        beacon: String,
        needed: usize,
        max: usize,
    },

    #[error("value of part {part} in compound beacon {beacon} contains the split character")]
    SplitInValue { beacon: String, part: String },

    #[error("failed to derive key for beacon {0}")]
    KeyDerivation(String),
}

const FINGERPRINT_LABEL: &[u8] = b"dbe-beacon-root:";

/// Root key from which every beacon key is derived.
pub struct BeaconKeyMaterial {
    key_id: String,
    bytes: Zeroizing<Vec<u8>>,
    fingerprint: [u8; 32],
}

impl BeaconKeyMaterial {
    pub fn new(key_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        let fingerprint = Sha256::new()
            .chain_update(FINGERPRINT_LABEL)
            .chain_update(&bytes)
            .finalize()
            .into();
        Self {
            key_id: key_id.into(),
            bytes: Zeroizing::new(bytes),
            fingerprint,
        }
    }

    /// Label of the root key; safe to log.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Digest identifying the key bytes. Two materials share cached beacon
    /// keys only if their fingerprints match.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for BeaconKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeaconKeyMaterial")
            .field("key_id", &self.key_id)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
