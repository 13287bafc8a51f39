//! Beacon configuration, deserialised from the table configuration.

use serde::{Deserialize, Serialize};

/// Every beacon and virtual field configured for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconVersion {
    #[serde(default)]
    pub standard_beacons: Vec<StandardBeacon>,
    #[serde(default)]
    pub compound_beacons: Vec<CompoundBeacon>,
    #[serde(default)]
    pub range_beacons: Vec<RangeBeacon>,
    #[serde(default)]
    pub virtual_fields: Vec<VirtualField>,
}

impl BeaconVersion {
    pub fn is_empty(&self) -> bool {
        self.standard_beacons.is_empty()
            && self.compound_beacons.is_empty()
            && self.range_beacons.is_empty()
    }

    pub fn standard(&self, name: &str) -> Option<&StandardBeacon> {
        self.standard_beacons.iter().find(|b| b.name == name)
    }

    pub fn virtual_field(&self, name: &str) -> Option<&VirtualField> {
        self.virtual_fields.iter().find(|v| v.name == name)
    }

    /// Names of every beacon and virtual field, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.standard_beacons
            .iter()
            .map(|b| b.name.as_str())
            .chain(self.compound_beacons.iter().map(|b| b.name.as_str()))
            .chain(self.range_beacons.iter().map(|b| b.name.as_str()))
            .chain(self.virtual_fields.iter().map(|v| v.name.as_str()))
    }
}

/// Keyed, truncated hash of one attribute or virtual field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardBeacon {
    pub name: String,
    /// Token length in bits, 1..=63.
    pub length: u8,
    /// Source location or virtual field name; defaults to `name`.
    #[serde(default)]
    pub loc: Option<String>,
    #[serde(default)]
    pub style: BeaconStyle,
}

impl StandardBeacon {
    pub fn source(&self) -> &str {
        self.loc.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BeaconStyle {
    #[default]
    Single,
    /// Hash with `other`'s key and length so both share one token space.
    Twinned { other: String },
    /// One token per set member.
    AsSet,
    TwinnedSet { other: String },
}

impl BeaconStyle {
    pub fn is_set(&self) -> bool {
        matches!(self, BeaconStyle::AsSet | BeaconStyle::TwinnedSet { .. })
    }

    /// Name of the beacon whose key this style borrows.
    pub fn twin(&self) -> Option<&str> {
        match self {
            BeaconStyle::Twinned { other } | BeaconStyle::TwinnedSet { other } => Some(other),
            BeaconStyle::Single | BeaconStyle::AsSet => None,
        }
    }
}

/// Ordered, prefixed concatenation of beacon tokens and signed plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundBeacon {
    pub name: String,
    #[serde(default = "default_split")]
    pub split: char,
    pub parts: Vec<CompoundPart>,
    /// Tried in order; empty means one constructor requiring every part.
    #[serde(default)]
    pub constructors: Vec<Constructor>,
}

fn default_split() -> char {
    '.'
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompoundPart {
    /// Token of the standard beacon `beacon`.
    Encrypted {
        name: String,
        prefix: String,
        beacon: String,
    },
    /// Plaintext of a SIGN_ONLY attribute.
    Signed {
        name: String,
        prefix: String,
        #[serde(default)]
        loc: Option<String>,
    },
}

impl CompoundPart {
    pub fn name(&self) -> &str {
        match self {
            CompoundPart::Encrypted { name, .. } | CompoundPart::Signed { name, .. } => name,
        }
    }

    pub fn prefix(&self) -> &str {
        match self {
            CompoundPart::Encrypted { prefix, .. } | CompoundPart::Signed { prefix, .. } => prefix,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    pub parts: Vec<ConstructorPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorPart {
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Hierarchical bucket beacon over an integer attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBeacon {
    pub name: String,
    #[serde(default)]
    pub loc: Option<String>,
    /// Token length in bits, 1..=63.
    pub length: u8,
    #[serde(default)]
    pub origin: i64,
    pub bucket_width: u64,
    pub fanout: u32,
    pub levels: u8,
    #[serde(default = "default_max_query_tokens")]
    pub max_query_tokens: usize,
}

impl RangeBeacon {
    pub fn source(&self) -> &str {
        self.loc.as_deref().unwrap_or(&self.name)
    }
}

fn default_max_query_tokens() -> usize {
    64
}

/// Named concatenation of transformed attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualField {
    pub name: String,
    pub parts: Vec<VirtualPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualPart {
    pub loc: String,
    #[serde(default)]
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    Lower,
    Upper,
    /// First `n` characters.
    Prefix(usize),
    /// Last `n` characters.
    Suffix(usize),
}
