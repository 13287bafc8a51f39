//! Virtual fields: beacon sources built from other attributes.
//!
//! Each part reads a string or number at a location, applies its transforms
//! in order and the results are concatenated. If any part is missing or null
//! the field has no value and its beacons are skipped.

use common::item::normalize_number;
use common::{AttributeValue, Item};

use super::location::Location;
use super::model::{Transform, VirtualField};
use super::BeaconError;

/// A virtual field with its part locations parsed.
#[derive(Debug, Clone)]
pub struct CompiledVirtualField {
    name: String,
    parts: Vec<(Location, Vec<Transform>)>,
}

impl CompiledVirtualField {
    pub fn compile(field: &VirtualField) -> Result<Self, BeaconError> {
        if field.parts.is_empty() {
            return Err(BeaconError::InvalidConfig {
                beacon: field.name.clone(),
                reason: "virtual field has no parts".into(),
            });
        }
        let parts = field
            .parts
            .iter()
            .map(|part| Ok((Location::parse(&part.loc)?, part.transforms.clone())))
            .collect::<Result<_, BeaconError>>()?;
        Ok(Self {
            name: field.name.clone(),
            parts,
        })
    }

    /// Top-level attributes the field reads from.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(loc, _)| loc.root())
    }

    /// Concatenated value, or `None` when any part is absent or null.
    pub fn evaluate(&self, item: &Item) -> Result<Option<AttributeValue>, BeaconError> {
        let mut out = String::new();
        for (loc, transforms) in &self.parts {
            let text = match loc.resolve(item) {
                None | Some(AttributeValue::Null(_)) => return Ok(None),
                Some(AttributeValue::S(s)) => s.clone(),
                Some(AttributeValue::N(n)) => {
                    normalize_number(n).map_err(|source| BeaconError::Value {
                        beacon: self.name.clone(),
                        source,
                    })?
                }
                Some(other) => {
                    return Err(BeaconError::UnsupportedType {
                        beacon: self.name.clone(),
                        type_id: other.type_id(),
                    })
                }
            };
            out.push_str(&apply(text, transforms));
        }
        Ok(Some(AttributeValue::S(out)))
    }
}

fn apply(mut text: String, transforms: &[Transform]) -> String {
    for transform in transforms {
        text = match *transform {
            Transform::Lower => text.to_lowercase(),
            Transform::Upper => text.to_uppercase(),
            Transform::Prefix(n) => text.chars().take(n).collect(),
            Transform::Suffix(n) => {
                let skip = text.chars().count().saturating_sub(n);
                text.chars().skip(skip).collect()
            }
        };
    }
    text
}
