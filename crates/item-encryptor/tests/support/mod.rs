#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{AttributeValue, Item};
use item_encryptor::{ItemEncryptor, Keyring, RawAesKeyring, TableConfig};

pub const TABLE_JSON: &str = r#"{
    "table_name": "customers",
    "partition_key_name": "id",
    "sort_key_name": "created",
    "attribute_actions_on_encrypt": {
        "id": "SIGN_ONLY",
        "created": "SIGN_ONLY",
        "ssn": "ENCRYPT_AND_SIGN",
        "email": "ENCRYPT_AND_SIGN",
        "address": "ENCRYPT_AND_SIGN",
        "tags": "ENCRYPT_AND_SIGN",
        "age": "ENCRYPT_AND_SIGN",
        "site": "SIGN_ONLY",
        "status": "SIGN_ONLY"
    }
}"#;

pub fn table() -> TableConfig {
    serde_json::from_str(TABLE_JSON).expect("test table config")
}

pub fn keyring() -> Arc<dyn Keyring> {
    Arc::new(RawAesKeyring::new("local", "k1", [0x11; 32]))
}

pub fn encryptor() -> ItemEncryptor {
    ItemEncryptor::new(table(), keyring()).expect("encryptor")
}

pub fn s(v: &str) -> AttributeValue {
    AttributeValue::S(v.to_owned())
}

pub fn n(v: &str) -> AttributeValue {
    AttributeValue::N(v.to_owned())
}

pub fn customer() -> Item {
    Item::from([
        ("id".to_owned(), s("cust-001")),
        ("created".to_owned(), n("1700000000")),
        ("ssn".to_owned(), s("123-45-6789")),
        ("email".to_owned(), s("ada@example.com")),
        (
            "address".to_owned(),
            AttributeValue::M(BTreeMap::from([
                ("street".to_owned(), s("12 St James's Square")),
                ("zip".to_owned(), s("SW1Y 4JH")),
            ])),
        ),
        (
            "tags".to_owned(),
            AttributeValue::Ss(vec!["vip".into(), "beta".into()]),
        ),
        ("age".to_owned(), n("36")),
        ("site".to_owned(), s("london")),
        ("status".to_owned(), s("active")),
        ("note".to_owned(), s("called on tuesday")),
        ("avatar".to_owned(), AttributeValue::B(vec![0xFF, 0xD8, 0xFF])),
    ])
}

pub fn context(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
