//! Configuration loading and validation.
//!
//! Two layers:
//!
//! - [`TableConfig`] describes one table: key attributes, the action of every
//!   protected attribute, the algorithm suite and the beacons. It is read from a
//!   JSON file. Attribute names are case-sensitive, so the file is decoded with
//!   `serde_json` directly.
//! - [`Config`] holds the `dbe-item` runtime settings and is read from `DBE_*`
//!   environment variables. The process exits with a clear message if a required
//!   variable is missing or invalid.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::CryptoAction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::ActionResolver;
use crate::beacon::{BeaconError, BeaconKeyMaterial, BeaconPlan, BeaconVersion, SourceRequirement};
use crate::crypto::KEY_LEN;
use crate::suite::AlgorithmSuiteId;

/// Attribute names with this prefix are reserved for header, footer and beacons.
pub const RESERVED_ATTRIBUTE_PREFIX: &str = "dbe_";
/// Context keys with this prefix are reserved for the base context.
pub const RESERVED_CONTEXT_PREFIX: &str = "dbe:";

/// Minimum beacon root key length in bytes.
const MIN_BEACON_KEY_LEN: usize = 32;

/// Errors produced by [`TableConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Key attributes must be SIGN_ONLY so the item stays addressable.
    #[error("key attribute {attribute} must be SIGN_ONLY, found {action:?}")]
    KeyAttributeAction {
        attribute: String,
        action: CryptoAction,
    },

    #[error("attribute name {0} uses the reserved prefix `dbe_`")]
    ReservedAttribute(String),

    #[error("context key {0} uses the reserved prefix `dbe:`")]
    ReservedContextKey(String),

    #[error("beacon {beacon} reads {attribute} which must be {required:?}, found {actual:?}")]
    BeaconSourceAction {
        beacon: String,
        attribute: String,
        required: CryptoAction,
        actual: CryptoAction,
    },

    #[error("table {0} configures beacons but no beacon key was supplied")]
    MissingBeaconKey(String),

    #[error(transparent)]
    Beacon(#[from] BeaconError),
}

/// Encryption configuration of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Logical table name, bound into every item's encryption context.
    pub table_name: String,

    pub partition_key_name: String,

    #[serde(default)]
    pub sort_key_name: Option<String>,

    /// Action of every attribute; missing names are DO_NOTHING.
    pub attribute_actions_on_encrypt: BTreeMap<String, CryptoAction>,

    #[serde(default)]
    pub algorithm_suite_id: AlgorithmSuiteId,

    /// Context keys authenticated but not stored; callers supply them on decrypt.
    #[serde(default)]
    pub required_context_keys: BTreeSet<String>,

    /// Fail decrypt instead of warning when the configuration protects an
    /// attribute the header does not.
    #[serde(default)]
    pub strict_action_drift: bool,

    /// Fail decrypt when a header-listed attribute is missing from the item.
    #[serde(default)]
    pub require_complete_header: bool,

    #[serde(default)]
    pub beacons: BeaconVersion,
}

impl TableConfig {
    /// Read and validate a table configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON or fails
    /// [`TableConfig::validate`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read table config {}", path.display()))?;
        let table: TableConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse table config {}", path.display()))?;
        table
            .validate()
            .with_context(|| format!("invalid table config {}", path.display()))?;
        Ok(table)
    }

    pub fn action_for(&self, name: &str) -> CryptoAction {
        self.attribute_actions_on_encrypt
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Names of the partition key and, if set, the sort key.
    pub fn key_attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key_name.as_str()).chain(self.sort_key_name.as_deref())
    }

    pub fn resolver(&self) -> ActionResolver<'_> {
        ActionResolver::new(
            &self.attribute_actions_on_encrypt,
            self.strict_action_drift,
            self.require_complete_header,
        )
    }

    /// Validate the table, returning the first failure.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for empty names, key attributes that are not
    /// SIGN_ONLY, reserved names, beacons fed by attributes with the wrong
    /// action and any beacon configuration error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_name.trim().is_empty() {
            return Err(ConfigError::Empty("table_name"));
        }
        if self.partition_key_name.trim().is_empty() {
            return Err(ConfigError::Empty("partition_key_name"));
        }
        if self.sort_key_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ConfigError::Empty("sort_key_name"));
        }

        for name in self.attribute_actions_on_encrypt.keys().map(String::as_str).chain(self.key_attributes()) {
            if name.starts_with(RESERVED_ATTRIBUTE_PREFIX) {
                return Err(ConfigError::ReservedAttribute(name.to_owned()));
            }
        }
        for key in self.key_attributes() {
            let action = self.action_for(key);
            if action != CryptoAction::SignOnly {
                return Err(ConfigError::KeyAttributeAction {
                    attribute: key.to_owned(),
                    action,
                });
            }
        }
        if let Some(key) = self
            .required_context_keys
            .iter()
            .find(|k| k.starts_with(RESERVED_CONTEXT_PREFIX))
        {
            return Err(ConfigError::ReservedContextKey(key.clone()));
        }

        let plan = BeaconPlan::compile(&self.beacons)?;
        for source in plan.sources() {
            let required = match source.requirement {
                SourceRequirement::EncryptAndSign => CryptoAction::EncryptAndSign,
                SourceRequirement::SignOnly => CryptoAction::SignOnly,
            };
            let actual = self.action_for(source.attribute);
            if actual != required {
                return Err(ConfigError::BeaconSourceAction {
                    beacon: source.beacon.to_owned(),
                    attribute: source.attribute.to_owned(),
                    required,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Validated `dbe-item` runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path of the table configuration JSON file. **Required.**
    pub table_config_path: String,

    /// Base64 of the 32-byte local wrapping key. **Required.**
    pub wrapping_key: String,

    /// Key namespace recorded as the provider id of wrapped data keys.
    #[serde(default = "default_key_namespace")]
    pub key_namespace: String,

    /// Key name recorded as the provider info of wrapped data keys.
    #[serde(default = "default_key_name")]
    pub key_name: String,

    /// Hex of the beacon root key. Required when the table has beacons.
    #[serde(default)]
    pub beacon_key: Option<String>,

    #[serde(default = "default_beacon_key_id")]
    pub beacon_key_id: String,

    /// Overrides the table's `strict_action_drift` when set.
    #[serde(default)]
    pub strict_action_drift: Option<bool>,

    /// Overrides the table's `require_complete_header` when set.
    #[serde(default)]
    pub require_complete_header: Option<bool>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_key_namespace() -> String {
    "dbe-local".into()
}
fn default_key_name() -> String {
    "default".into()
}
fn default_beacon_key_id() -> String {
    "beacon-root".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from `DBE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("DBE"))
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.table_config_path, "DBE_TABLE_CONFIG_PATH")?;
        ensure_non_empty(&self.key_namespace, "DBE_KEY_NAMESPACE")?;
        ensure_non_empty(&self.key_name, "DBE_KEY_NAME")?;
        ensure_non_empty(&self.beacon_key_id, "DBE_BEACON_KEY_ID")?;
        self.wrapping_key_bytes()?;
        self.beacon_material()?;
        Ok(())
    }

    /// Decoded wrapping key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not base64 or not 32 bytes long.
    pub fn wrapping_key_bytes(&self) -> Result<[u8; KEY_LEN]> {
        let bytes = STANDARD
            .decode(self.wrapping_key.trim())
            .context("DBE_WRAPPING_KEY must be base64")?;
        <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
            anyhow::anyhow!(
                "DBE_WRAPPING_KEY must decode to {KEY_LEN} bytes, got {}",
                bytes.len()
            )
        })
    }

    /// Beacon root key, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not hex or shorter than 32 bytes.
    pub fn beacon_material(&self) -> Result<Option<BeaconKeyMaterial>> {
        let Some(encoded) = self.beacon_key.as_deref() else {
            return Ok(None);
        };
        let bytes = hex::decode(encoded.trim()).context("DBE_BEACON_KEY must be hex")?;
        if bytes.len() < MIN_BEACON_KEY_LEN {
            anyhow::bail!(
                "DBE_BEACON_KEY must be at least {MIN_BEACON_KEY_LEN} bytes, got {}",
                bytes.len()
            );
        }
        Ok(Some(BeaconKeyMaterial::new(self.beacon_key_id.clone(), bytes)))
    }

    /// Load the table configuration and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the table file is unreadable or invalid.
    pub fn load_table(&self) -> Result<TableConfig> {
        let mut table = TableConfig::from_path(&self.table_config_path)?;
        if let Some(strict) = self.strict_action_drift {
            table.strict_action_drift = strict;
        }
        if let Some(complete) = self.require_complete_header {
            table.require_complete_header = complete;
        }
        Ok(table)
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::{BeaconStyle, CompoundBeacon, CompoundPart, StandardBeacon};

    fn table() -> TableConfig {
        serde_json::from_str(
            r#"{
                "table_name": "customers",
                "partition_key_name": "id",
                "sort_key_name": "region",
                "attribute_actions_on_encrypt": {
                    "id": "SIGN_ONLY",
                    "region": "SIGN_ONLY",
                    "ssn": "ENCRYPT_AND_SIGN",
                    "email": "ENCRYPT_AND_SIGN",
                    "note": "DO_NOTHING"
                },
                "beacons": {
                    "standard_beacons": [{"name": "email", "length": 16}]
                }
            }"#,
        )
        .unwrap()
    }

    fn runtime() -> Config {
        Config {
            table_config_path: "/etc/dbe/table.json".into(),
            wrapping_key: STANDARD.encode([7u8; KEY_LEN]),
            key_namespace: default_key_namespace(),
            key_name: default_key_name(),
            beacon_key: None,
            beacon_key_id: default_beacon_key_id(),
            strict_action_drift: None,
            require_complete_header: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_key_namespace(), "dbe-local");
        assert_eq!(default_key_name(), "default");
        assert_eq!(default_beacon_key_id(), "beacon-root");
        assert_eq!(default_log_level(), "info");

        let t = table();
        assert_eq!(t.algorithm_suite_id, AlgorithmSuiteId::Aes256GcmSivHkdfSha512);
        assert!(!t.strict_action_drift);
        assert!(!t.require_complete_header);
        assert!(t.required_context_keys.is_empty());
    }

    #[test]
    fn valid_table_passes() {
        assert_eq!(table().validate(), Ok(()));
    }

    #[test]
    fn key_attributes_must_be_sign_only() {
        let mut t = table();
        t.attribute_actions_on_encrypt
            .insert("region".into(), CryptoAction::EncryptAndSign);
        assert_eq!(
            t.validate(),
            Err(ConfigError::KeyAttributeAction {
                attribute: "region".into(),
                action: CryptoAction::EncryptAndSign
            })
        );

        let mut t = table();
        t.attribute_actions_on_encrypt.remove("id");
        assert!(matches!(t.validate(), Err(ConfigError::KeyAttributeAction { .. })));
    }

    #[test]
    fn reserved_names_rejected() {
        let mut t = table();
        t.attribute_actions_on_encrypt
            .insert("dbe_head".into(), CryptoAction::SignOnly);
        assert_eq!(
            t.validate(),
            Err(ConfigError::ReservedAttribute("dbe_head".into()))
        );

        let mut t = table();
        t.required_context_keys.insert("dbe:table".into());
        assert_eq!(
            t.validate(),
            Err(ConfigError::ReservedContextKey("dbe:table".into()))
        );
    }

    #[test]
    fn beacon_source_must_be_encrypted() {
        let mut t = table();
        t.beacons.standard_beacons.push(StandardBeacon {
            name: "by_note".into(),
            length: 8,
            loc: Some("note".into()),
            style: BeaconStyle::Single,
        });
        assert_eq!(
            t.validate(),
            Err(ConfigError::BeaconSourceAction {
                beacon: "by_note".into(),
                attribute: "note".into(),
                required: CryptoAction::EncryptAndSign,
                actual: CryptoAction::DoNothing
            })
        );
    }

    #[test]
    fn signed_compound_part_must_be_sign_only() {
        let mut t = table();
        t.beacons.compound_beacons.push(CompoundBeacon {
            name: "by_ssn".into(),
            split: '.',
            parts: vec![CompoundPart::Signed {
                name: "ssn".into(),
                prefix: "S-".into(),
                loc: None,
            }],
            constructors: Vec::new(),
        });
        assert!(matches!(
            t.validate(),
            Err(ConfigError::BeaconSourceAction {
                required: CryptoAction::SignOnly,
                ..
            })
        ));
    }

    #[test]
    fn beacon_errors_surface() {
        let mut t = table();
        t.beacons.standard_beacons[0].length = 0;
        assert!(matches!(
            t.validate(),
            Err(ConfigError::Beacon(BeaconError::InvalidLength { .. }))
        ));
    }

    #[test]
    fn runtime_validation() {
        assert!(runtime().validate().is_ok());

        let mut cfg = runtime();
        cfg.table_config_path = " ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = runtime();
        cfg.wrapping_key = STANDARD.encode([7u8; 16]);
        assert!(cfg.validate().is_err());

        let mut cfg = runtime();
        cfg.beacon_key = Some("zz".into());
        assert!(cfg.validate().is_err());

        let mut cfg = runtime();
        cfg.beacon_key = Some(hex::encode([1u8; 16]));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn beacon_material_decodes_hex() {
        let mut cfg = runtime();
        assert!(cfg.beacon_material().unwrap().is_none());
        cfg.beacon_key = Some(hex::encode([1u8; 32]));
        let material = cfg.beacon_material().unwrap().unwrap();
        assert_eq!(material.key_id(), "beacon-root");
        assert_eq!(material.bytes(), &[1u8; 32]);
    }

    #[test]
    fn load_table_applies_overrides() {
        let dir = std::env::temp_dir().join(format!("dbe-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("table.json");
        std::fs::write(&path, serde_json::to_string(&table()).unwrap()).unwrap();

        let mut cfg = runtime();
        cfg.table_config_path = path.display().to_string();
        cfg.strict_action_drift = Some(true);
        let loaded = cfg.load_table().unwrap();
        assert!(loaded.strict_action_drift);
        assert!(!loaded.require_complete_header);
        assert_eq!(loaded.attribute_actions_on_encrypt, table().attribute_actions_on_encrypt);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_table_file_is_an_error() {
        let mut cfg = runtime();
        cfg.table_config_path = "/nonexistent/dbe/table.json".into();
        assert!(cfg.load_table().is_err());
    }
}
