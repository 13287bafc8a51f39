//! Field-level encryption of database items with self-describing headers and
//! searchable beacons.
//!
//! Encrypt: resolve actions → wrap a fresh data key → compute beacons →
//! encrypt fields → serialise header → sign footer.
//!
//! Decrypt: parse header → unwrap data key → resolve actions → rebuild context →
//! verify footer → decrypt fields.
//!
//! The entry point is [`ItemEncryptor`]; [`host::run`] drives it over JSON lines
//! for the `dbe-item` binary.

pub mod actions;
pub mod beacon;
pub mod config;
pub mod crypto;
pub mod encryptor;
pub mod error;
pub mod header;
pub mod host;
pub mod keys;
pub mod suite;
pub mod telemetry;

pub use actions::{ActionError, ActionResolver, ResolvedActions};
pub use beacon::{BeaconEngine, BeaconError, BeaconKeyCache, BeaconKeyMaterial};
pub use config::{Config, ConfigError, TableConfig};
pub use encryptor::{DecryptItemOutput, EncryptItemOutput, ItemEncryptor};
pub use error::ItemError;
pub use header::{HeaderError, ParsedHeader};
pub use keys::{EncryptedDataKey, KeyError, Keyring, KeyringError, MultiKeyring, RawAesKeyring};
pub use suite::{AlgorithmSuite, AlgorithmSuiteId, SuiteRegistry};
