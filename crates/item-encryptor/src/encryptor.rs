//! Item encryption and decryption.
//!
//! # Stored item layout
//!
//! | Attribute      | Content                                             |
//! |----------------|-----------------------------------------------------|
//! | user names     | plaintext, or `B` = type id ‖ nonce ‖ ct+tag        |
//! | `dbe_head`     | serialised header                                   |
//! | `dbe_foot`     | footer HMAC                                         |
//! | `dbe_b_<name>` | beacon output                                       |
//!
//! # Encryption context
//!
//! Every item is bound to a context made of a base part rebuilt from the item
//! itself (`dbe:table`, `dbe:pk`, `dbe:pk-value`, and `dbe:sk`, `dbe:sk-value`
//! for tables with a sort key) and the caller's context. The caller's entries
//! are stored in the header except those listed in `required_context_keys`,
//! which the caller must supply again on decrypt.
//!
//! # Footer
//!
//! The footer HMAC, keyed by a key derived from the data key, covers the header
//! bytes, the stored form of every header-listed attribute (or an absence
//! marker) and the full context. Changing any of them, or swapping wrapped keys
//! between items, fails verification.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::item::normalize_number;
use common::{AttributeValue, CryptoAction, Item, ValueError};
use tracing::{debug, info};

use crate::beacon::{BeaconEngine, BeaconKeyCache, BeaconKeyMaterial};
use crate::config::{ConfigError, TableConfig, RESERVED_ATTRIBUTE_PREFIX, RESERVED_CONTEXT_PREFIX};
use crate::crypto::cipher::{decrypt_field, encrypt_field};
use crate::crypto::kdf::ItemKeys;
use crate::crypto::{mac, CipherError, EncryptedField};
use crate::error::ItemError;
use crate::header::{self, ParsedHeader};
use crate::keys::{unwrap_data_key, wrap_data_key, DataKey, Keyring};
use crate::suite::{AlgorithmSuite, AlgorithmSuiteId, SuiteRegistry};

pub const HEADER_ATTRIBUTE: &str = "dbe_head";
pub const FOOTER_ATTRIBUTE: &str = "dbe_foot";

pub const CONTEXT_TABLE: &str = "dbe:table";
pub const CONTEXT_PARTITION_KEY: &str = "dbe:pk";
pub const CONTEXT_PARTITION_VALUE: &str = "dbe:pk-value";
pub const CONTEXT_SORT_KEY: &str = "dbe:sk";
pub const CONTEXT_SORT_VALUE: &str = "dbe:sk-value";

const FOOTER_LABEL: &[u8] = b"dbe:v1:footer";

/// Result of [`ItemEncryptor::encrypt_item`].
#[derive(Debug, Clone)]
pub struct EncryptItemOutput {
    pub encrypted_item: Item,
    pub parsed_header: ParsedHeader,
}

/// Result of [`ItemEncryptor::decrypt_item`].
#[derive(Debug, Clone)]
pub struct DecryptItemOutput {
    pub plaintext_item: Item,
    pub parsed_header: ParsedHeader,
    /// Attributes the configuration protects but the header does not.
    pub weakly_protected: Vec<String>,
}

/// Encrypts and decrypts items of one table.
///
/// Immutable after construction and safe to share across threads.
pub struct ItemEncryptor {
    config: TableConfig,
    keyring: Arc<dyn Keyring>,
    beacons: Option<BeaconEngine>,
    registry: Arc<SuiteRegistry>,
}

impl ItemEncryptor {
    /// Encryptor for a table without beacons.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::Config`] if the table is invalid or configures
    /// beacons.
    pub fn new(config: TableConfig, keyring: Arc<dyn Keyring>) -> Result<Self, ItemError> {
        config.validate()?;
        if !config.beacons.is_empty() {
            return Err(ConfigError::MissingBeaconKey(config.table_name.clone()).into());
        }
        Ok(Self {
            config,
            keyring,
            beacons: None,
            registry: Arc::new(SuiteRegistry::standard().clone()),
        })
    }

    /// Encryptor whose beacons are keyed by `material`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::Config`] if the table is invalid.
    pub fn with_beacons(
        config: TableConfig,
        keyring: Arc<dyn Keyring>,
        material: BeaconKeyMaterial,
        cache: Arc<BeaconKeyCache>,
    ) -> Result<Self, ItemError> {
        config.validate()?;
        let engine = BeaconEngine::new(&config.beacons, material, cache)?;
        Ok(Self {
            config,
            keyring,
            beacons: Some(engine),
            registry: Arc::new(SuiteRegistry::standard().clone()),
        })
    }

    /// Replace the suite registry used to encrypt and to parse headers.
    pub fn with_registry(mut self, registry: Arc<SuiteRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Beacon engine, for computing query tokens.
    pub fn beacons(&self) -> Option<&BeaconEngine> {
        self.beacons.as_ref()
    }

    /// Protect `item` for storage.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError`] for reserved names, malformed numbers, missing key
    /// attributes or context keys, keyring failures and beacon errors. Nothing is returned on
    /// failure.
    pub fn encrypt_item(
        &self,
        item: &Item,
        context: &BTreeMap<String, String>,
    ) -> Result<EncryptItemOutput, ItemError> {
        if let Some(name) = item.keys().find(|n| n.starts_with(RESERVED_ATTRIBUTE_PREFIX)) {
            return Err(ItemError::ReservedAttribute(name.clone()));
        }
        for (name, value) in item {
            check_numbers(value).map_err(|source| ItemError::Value {
                attribute: name.clone(),
                source,
            })?;
        }
        check_context_keys(context)?;
        if let Some(key) = self
            .config
            .required_context_keys
            .iter()
            .find(|k| !context.contains_key(*k))
        {
            return Err(ItemError::MissingContextKey(key.clone()));
        }

        let suite = self.suite(self.config.algorithm_suite_id)?;
        let mut full_context = self.base_context(item)?;
        full_context.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));

        let actions = self.config.resolver().for_encrypt(item);

        let data_key = DataKey::generate();
        let edks = wrap_data_key(self.keyring.as_ref(), &data_key)?;

        let beacons = match &self.beacons {
            Some(engine) => engine.compute(item)?,
            None => BTreeMap::new(),
        };

        let keys = item_keys(suite, &data_key)?;
        let mut encrypted = item.clone();
        for (name, action) in &actions {
            if *action != CryptoAction::EncryptAndSign {
                continue;
            }
            let Some(value) = item.get(name) else {
                continue;
            };
            let field = encrypt_field(name, value, &keys.field[..]).map_err(|source| ItemError::Crypto {
                field: name.clone(),
                source,
            })?;
            encrypted.insert(name.clone(), AttributeValue::B(field.to_bytes()));
        }

        let stored_context = context
            .iter()
            .filter(|(k, _)| !self.config.required_context_keys.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let parsed_header = ParsedHeader::builder()
            .attribute_actions_on_encrypt(actions)
            .algorithm_suite_id(suite.id)
            .encrypted_data_keys(edks)
            .stored_encryption_context(stored_context)
            .build()?;
        let header_bytes = header::serialize(&parsed_header)?;

        let footer = mac::sign(
            suite.kdf,
            &keys.footer[..],
            &footer_message(&header_bytes, &parsed_header, &encrypted, &full_context),
        )
        .map_err(|source| ItemError::Crypto {
            field: FOOTER_ATTRIBUTE.into(),
            source,
        })?;

        encrypted.insert(HEADER_ATTRIBUTE.into(), AttributeValue::B(header_bytes));
        encrypted.insert(FOOTER_ATTRIBUTE.into(), AttributeValue::B(footer));
        let beacon_count = beacons.len();
        encrypted.extend(beacons);

        info!(
            table = %self.config.table_name,
            protected = parsed_header.attribute_actions_on_encrypt().len(),
            beacons = beacon_count,
            "item encrypted"
        );
        Ok(EncryptItemOutput {
            encrypted_item: encrypted,
            parsed_header,
        })
    }

    /// Restore a stored item.
    ///
    /// `external_context` supplies the required context keys and may repeat
    /// stored ones; a value that disagrees with the stored one fails.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::Header`] for an unparseable header,
    /// [`ItemError::Key`] if no keyring can reach a data key,
    /// [`ItemError::Action`] for drift or missing attributes under strict
    /// settings and [`ItemError::Integrity`] if any authenticated part,
    /// wrapped keys included, was altered. No partial item is ever returned.
    pub fn decrypt_item(
        &self,
        item: &Item,
        external_context: &BTreeMap<String, String>,
    ) -> Result<DecryptItemOutput, ItemError> {
        let header_bytes = binary(item, HEADER_ATTRIBUTE)?;
        let footer = binary(item, FOOTER_ATTRIBUTE)?;
        check_context_keys(external_context)?;

        let parsed_header = header::parse(header_bytes, &self.registry)?;
        let suite = self.suite(parsed_header.algorithm_suite_id())?;

        let user_item: Item = item
            .iter()
            .filter(|(name, _)| !name.starts_with(RESERVED_ATTRIBUTE_PREFIX))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut context = self.base_context(&user_item)?;
        let data_key = unwrap_data_key(self.keyring.as_ref(), parsed_header.encrypted_data_keys())
            .map_err(|err| {
                if err.is_forgery() {
                    ItemError::integrity(HEADER_ATTRIBUTE)
                } else {
                    ItemError::Key(err)
                }
            })?;
        let resolved = self.config.resolver().for_decrypt(&parsed_header, &user_item)?;

        context.extend(
            parsed_header
                .stored_encryption_context()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        for (key, value) in external_context {
            match parsed_header.stored_encryption_context().get(key) {
                Some(stored) if stored != value => return Err(ItemError::integrity(key.clone())),
                _ => {
                    context.insert(key.clone(), value.clone());
                }
            }
        }
        if let Some(key) = self
            .config
            .required_context_keys
            .iter()
            .find(|k| !context.contains_key(*k))
        {
            return Err(ItemError::MissingContextKey(key.clone()));
        }

        if footer.len() != suite.mac_len {
            return Err(ItemError::integrity(FOOTER_ATTRIBUTE));
        }
        let keys = item_keys(suite, &data_key)?;
        mac::verify(
            suite.kdf,
            &keys.footer[..],
            &footer_message(header_bytes, &parsed_header, &user_item, &context),
            footer,
        )
        .map_err(|_| ItemError::integrity(FOOTER_ATTRIBUTE))?;

        let mut plaintext = user_item;
        for (name, action) in &resolved.actions {
            if *action != CryptoAction::EncryptAndSign {
                continue;
            }
            let value = match plaintext.get(name) {
                Some(AttributeValue::B(bytes)) => open_field(name, bytes, &keys.field[..])?,
                _ => return Err(ItemError::integrity(name.clone())),
            };
            plaintext.insert(name.clone(), value);
        }

        debug!(
            table = %self.config.table_name,
            weakly_protected = resolved.weakly_protected.len(),
            "item decrypted"
        );
        Ok(DecryptItemOutput {
            plaintext_item: plaintext,
            parsed_header,
            weakly_protected: resolved.weakly_protected,
        })
    }

    /// Registered suite for `id`, if this encryptor can run it.
    fn suite(&self, id: AlgorithmSuiteId) -> Result<&AlgorithmSuite, ItemError> {
        self.registry
            .get(id)
            .filter(|suite| suite.is_supported())
            .ok_or(ItemError::UnsupportedSuite(id))
    }

    /// Context entries rebuilt from the item's key attributes.
    fn base_context(&self, item: &Item) -> Result<BTreeMap<String, String>, ItemError> {
        let mut context = BTreeMap::new();
        context.insert(CONTEXT_TABLE.to_owned(), self.config.table_name.clone());

        let pk = &self.config.partition_key_name;
        let pk_value = item
            .get(pk)
            .ok_or_else(|| ItemError::MissingKeyAttribute(pk.clone()))?;
        context.insert(CONTEXT_PARTITION_KEY.to_owned(), pk.clone());
        context.insert(
            CONTEXT_PARTITION_VALUE.to_owned(),
            STANDARD.encode(pk_value.canonical_bytes()),
        );

        if let Some(sk) = &self.config.sort_key_name {
            let sk_value = item
                .get(sk)
                .ok_or_else(|| ItemError::MissingKeyAttribute(sk.clone()))?;
            context.insert(CONTEXT_SORT_KEY.to_owned(), sk.clone());
            context.insert(
                CONTEXT_SORT_VALUE.to_owned(),
                STANDARD.encode(sk_value.canonical_bytes()),
            );
        }
        Ok(context)
    }
}

impl std::fmt::Debug for ItemEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemEncryptor")
            .field("table", &self.config.table_name)
            .field("beacons", &self.beacons.is_some())
            .finish_non_exhaustive()
    }
}

fn check_context_keys(context: &BTreeMap<String, String>) -> Result<(), ItemError> {
    match context.keys().find(|k| k.starts_with(RESERVED_CONTEXT_PREFIX)) {
        Some(key) => Err(ItemError::ReservedContextKey(key.clone())),
        None => Ok(()),
    }
}

/// Reject number values, at any depth, that do not normalise.
fn check_numbers(value: &AttributeValue) -> Result<(), ValueError> {
    match value {
        AttributeValue::N(n) => normalize_number(n).map(drop),
        AttributeValue::Ns(ns) => ns.iter().try_for_each(|n| normalize_number(n).map(drop)),
        AttributeValue::L(values) => values.iter().try_for_each(check_numbers),
        AttributeValue::M(map) => map.values().try_for_each(check_numbers),
        _ => Ok(()),
    }
}

fn binary<'a>(item: &'a Item, name: &'static str) -> Result<&'a [u8], ItemError> {
    match item.get(name) {
        Some(AttributeValue::B(bytes)) => Ok(bytes),
        _ => Err(ItemError::NotEncrypted(name)),
    }
}

fn item_keys(suite: &AlgorithmSuite, data_key: &DataKey) -> Result<ItemKeys, ItemError> {
    ItemKeys::derive(suite.kdf, data_key.as_bytes()).map_err(|source| ItemError::Crypto {
        field: "dataKey".into(),
        source,
    })
}

fn open_field(name: &str, bytes: &[u8], key: &[u8]) -> Result<AttributeValue, ItemError> {
    let field = EncryptedField::from_bytes(bytes).map_err(|_| ItemError::integrity(name))?;
    decrypt_field(name, &field, key).map_err(|err| match err {
        CipherError::InvalidKeyLength => ItemError::Crypto {
            field: name.to_owned(),
            source: err,
        },
        _ => ItemError::integrity(name),
    })
}

/// Bytes authenticated by the footer.
///
/// ```text
/// "dbe:v1:footer"
/// u32 len + header bytes
/// u32 count, per header-listed attribute in name order:
///     u32 len + name, then 0x00 if absent or 0x01 + u32 len + canonical bytes
/// u32 count, per context entry in key order:
///     u32 len + key, u32 len + value
/// ```
fn footer_message(
    header_bytes: &[u8],
    header: &ParsedHeader,
    item: &Item,
    context: &BTreeMap<String, String>,
) -> Vec<u8> {
    fn put(out: &mut Vec<u8>, bytes: &[u8]) {
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(bytes);
    }

    let mut out = Vec::with_capacity(FOOTER_LABEL.len() + header_bytes.len() + 256);
    out.extend_from_slice(FOOTER_LABEL);
    put(&mut out, header_bytes);

    let actions = header.attribute_actions_on_encrypt();
    out.extend_from_slice(&(actions.len() as u32).to_be_bytes());
    for name in actions.keys() {
        put(&mut out, name.as_bytes());
        match item.get(name) {
            Some(value) => {
                out.push(0x01);
                put(&mut out, &value.canonical_bytes());
            }
            None => out.push(0x00),
        }
    }

    out.extend_from_slice(&(context.len() as u32).to_be_bytes());
    for (key, value) in context {
        put(&mut out, key.as_bytes());
        put(&mut out, value.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keyring::MockKeyring;
    use crate::keys::{KeyError, KeyringError, RawAesKeyring};

    fn table() -> TableConfig {
        serde_json::from_str(
            r#"{
                "table_name": "customers",
                "partition_key_name": "id",
                "attribute_actions_on_encrypt": {
                    "id": "SIGN_ONLY",
                    "ssn": "ENCRYPT_AND_SIGN",
                    "age": "SIGN_ONLY"
                }
            }"#,
        )
        .unwrap()
    }

    fn keyring() -> Arc<dyn Keyring> {
        Arc::new(RawAesKeyring::new("local", "k1", [3u8; 32]))
    }

    fn encryptor() -> ItemEncryptor {
        ItemEncryptor::new(table(), keyring()).unwrap()
    }

    fn item() -> Item {
        Item::from([
            ("id".to_owned(), AttributeValue::S("c-1".into())),
            ("ssn".to_owned(), AttributeValue::S("123-45-6789".into())),
            ("age".to_owned(), AttributeValue::N("42".into())),
            ("note".to_owned(), AttributeValue::S("hello".into())),
        ])
    }

    fn no_context() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn encrypt_adds_header_and_footer_and_hides_ssn() {
        let out = encryptor().encrypt_item(&item(), &no_context()).unwrap();
        let stored = &out.encrypted_item;
        assert!(matches!(stored.get(HEADER_ATTRIBUTE), Some(AttributeValue::B(_))));
        assert!(matches!(stored.get(FOOTER_ATTRIBUTE), Some(AttributeValue::B(_))));
        assert!(matches!(stored.get("ssn"), Some(AttributeValue::B(_))));
        assert_eq!(stored.get("age"), item().get("age"));
        assert_eq!(stored.get("note"), item().get("note"));
        assert_eq!(
            out.parsed_header.attribute_actions_on_encrypt().len(),
            3,
            "id, ssn and age are recorded"
        );
    }

    #[test]
    fn base_context_is_not_stored() {
        let context = BTreeMap::from([("tenant".to_owned(), "acme".to_owned())]);
        let out = encryptor().encrypt_item(&item(), &context).unwrap();
        assert_eq!(out.parsed_header.stored_encryption_context(), &context);
    }

    #[test]
    fn footer_is_sized_by_suite() {
        let out = encryptor().encrypt_item(&item(), &no_context()).unwrap();
        let Some(AttributeValue::B(footer)) = out.encrypted_item.get(FOOTER_ATTRIBUTE) else {
            panic!("missing footer");
        };
        assert_eq!(footer.len(), 64);
    }

    #[test]
    fn reserved_names_rejected() {
        let mut bad = item();
        bad.insert("dbe_head".into(), AttributeValue::Null(true));
        assert!(matches!(
            encryptor().encrypt_item(&bad, &no_context()),
            Err(ItemError::ReservedAttribute(n)) if n == "dbe_head"
        ));

        let context = BTreeMap::from([("dbe:table".to_owned(), "other".to_owned())]);
        assert!(matches!(
            encryptor().encrypt_item(&item(), &context),
            Err(ItemError::ReservedContextKey(_))
        ));
    }

    #[test]
    fn missing_partition_key_rejected() {
        let mut bad = item();
        bad.remove("id");
        assert!(matches!(
            encryptor().encrypt_item(&bad, &no_context()),
            Err(ItemError::MissingKeyAttribute(n)) if n == "id"
        ));
    }

    #[test]
    fn beacon_table_needs_beacon_key() {
        let mut t = table();
        t.beacons.standard_beacons.push(crate::beacon::StandardBeacon {
            name: "ssn".into(),
            length: 8,
            loc: None,
            style: crate::beacon::BeaconStyle::Single,
        });
        assert!(matches!(
            ItemEncryptor::new(t, keyring()),
            Err(ItemError::Config(ConfigError::MissingBeaconKey(_)))
        ));
    }

    #[test]
    fn keyring_failures_surface() {
        let mut kr = MockKeyring::new();
        kr.expect_wrap_key().returning(|_| Ok(Vec::new()));
        let enc = ItemEncryptor::new(table(), Arc::new(kr)).unwrap();
        assert!(matches!(
            enc.encrypt_item(&item(), &no_context()),
            Err(ItemError::Key(KeyError::NoKeyProduced))
        ));
    }

    #[test]
    fn foreign_keyring_cannot_decrypt() {
        let stored = encryptor()
            .encrypt_item(&item(), &no_context())
            .unwrap()
            .encrypted_item;

        let mut kr = MockKeyring::new();
        kr.expect_unwrap_key()
            .times(1)
            .returning(|edk| Err(KeyringError::NotMine {
                provider_id: edk.provider_id.clone(),
            }));
        let enc = ItemEncryptor::new(table(), Arc::new(kr)).unwrap();
        assert!(matches!(
            enc.decrypt_item(&stored, &no_context()),
            Err(ItemError::Key(KeyError::Unwrap { .. }))
        ));
    }

    #[test]
    fn forged_wrapped_key_is_an_integrity_failure() {
        let stored = encryptor()
            .encrypt_item(&item(), &no_context())
            .unwrap()
            .encrypted_item;

        let mut forged = MockKeyring::new();
        forged
            .expect_unwrap_key()
            .returning(|_| Err(KeyringError::Authentication));
        let enc = ItemEncryptor::new(table(), Arc::new(forged)).unwrap();
        assert!(matches!(
            enc.decrypt_item(&stored, &no_context()),
            Err(ItemError::Integrity { field }) if field == HEADER_ATTRIBUTE
        ));

        let mut down = MockKeyring::new();
        down.expect_unwrap_key()
            .returning(|_| Err(KeyringError::Unwrap("provider unreachable".into())));
        let enc = ItemEncryptor::new(table(), Arc::new(down)).unwrap();
        assert!(matches!(
            enc.decrypt_item(&stored, &no_context()),
            Err(ItemError::Key(KeyError::Unwrap { .. }))
        ));
    }

    #[test]
    fn malformed_numbers_are_rejected_before_any_work() {
        let mut kr = MockKeyring::new();
        kr.expect_wrap_key().never();
        let enc = ItemEncryptor::new(table(), Arc::new(kr)).unwrap();

        let mut bad = item();
        bad.insert("age".into(), AttributeValue::N("1e-9223372036854775808".into()));
        assert!(matches!(
            enc.encrypt_item(&bad, &no_context()),
            Err(ItemError::Value { attribute, source: ValueError::InvalidNumber(_) }) if attribute == "age"
        ));

        let mut nested = item();
        nested.insert(
            "prefs".into(),
            AttributeValue::M(BTreeMap::from([(
                "limits".to_owned(),
                AttributeValue::L(vec![AttributeValue::Ns(vec!["1".into(), "one".into()])]),
            )])),
        );
        assert!(matches!(
            enc.encrypt_item(&nested, &no_context()),
            Err(ItemError::Value { attribute, .. }) if attribute == "prefs"
        ));
    }

    #[test]
    fn unsupported_suite_parameters_are_refused() {
        let mut suite = SuiteRegistry::standard()
            .get(AlgorithmSuiteId::default())
            .unwrap()
            .clone();
        suite.mac_len = 32;
        let enc = encryptor().with_registry(Arc::new(SuiteRegistry::new([suite])));
        assert!(matches!(
            enc.encrypt_item(&item(), &no_context()),
            Err(ItemError::UnsupportedSuite(id)) if id == AlgorithmSuiteId::default()
        ));
    }

    #[test]
    fn short_footer_is_an_integrity_failure() {
        let enc = encryptor();
        let mut stored = enc.encrypt_item(&item(), &no_context()).unwrap().encrypted_item;
        if let Some(AttributeValue::B(footer)) = stored.get_mut(FOOTER_ATTRIBUTE) {
            assert_eq!(footer.len(), 64);
            footer.truncate(32);
        }
        assert!(matches!(
            enc.decrypt_item(&stored, &no_context()),
            Err(ItemError::Integrity { field }) if field == FOOTER_ATTRIBUTE
        ));
    }

    #[test]
    fn plaintext_item_is_not_encrypted() {
        assert!(matches!(
            encryptor().decrypt_item(&item(), &no_context()),
            Err(ItemError::NotEncrypted(HEADER_ATTRIBUTE))
        ));
    }

    #[test]
    fn footer_message_marks_absent_attributes() {
        let out = encryptor().encrypt_item(&item(), &no_context()).unwrap();
        let header_bytes = header::serialize(&out.parsed_header).unwrap();
        let ctx = BTreeMap::new();
        let present = footer_message(&header_bytes, &out.parsed_header, &out.encrypted_item, &ctx);
        let mut without_age = out.encrypted_item.clone();
        without_age.remove("age");
        let absent = footer_message(&header_bytes, &out.parsed_header, &without_age, &ctx);
        assert_ne!(present, absent);
    }
}
