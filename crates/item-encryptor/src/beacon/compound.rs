//! Compound beacons: `prefix + value` parts joined by a split character.
//!
//! Encrypted parts contribute the token of a standard beacon, signed parts the
//! plaintext of a SIGN_ONLY attribute. Constructors are tried in order and the
//! first one whose required parts are all present produces the value.

use std::collections::HashSet;

use common::item::normalize_number;
use common::{AttributeValue, Item};

use super::location::Location;
use super::model::{BeaconVersion, CompoundBeacon, CompoundPart};
use super::BeaconError;

#[derive(Debug, Clone)]
enum Source {
    Encrypted { beacon: String },
    Signed { loc: Location },
}

#[derive(Debug, Clone)]
struct Part {
    name: String,
    prefix: String,
    source: Source,
}

#[derive(Debug, Clone)]
pub struct CompiledCompound {
    name: String,
    split: char,
    parts: Vec<Part>,
    /// Per constructor: (part index, required).
    constructors: Vec<Vec<(usize, bool)>>,
}

impl CompiledCompound {
    pub fn compile(beacon: &CompoundBeacon, version: &BeaconVersion) -> Result<Self, BeaconError> {
        let invalid = |reason: String| BeaconError::InvalidConfig {
            beacon: beacon.name.clone(),
            reason,
        };
        if beacon.parts.is_empty() {
            return Err(invalid("compound beacon has no parts".into()));
        }

        let mut names = HashSet::new();
        let mut parts = Vec::with_capacity(beacon.parts.len());
        for part in &beacon.parts {
            if !names.insert(part.name()) {
                return Err(invalid(format!("duplicate part {}", part.name())));
            }
            if part.prefix().is_empty() || part.prefix().contains(beacon.split) {
                return Err(invalid(format!(
                    "part {} needs a non-empty prefix without the split character",
                    part.name()
                )));
            }
            let source = match part {
                CompoundPart::Encrypted { beacon: target, .. } => {
                    match version.standard(target) {
                        Some(standard) if !standard.style.is_set() => Source::Encrypted {
                            beacon: target.clone(),
                        },
                        Some(_) => {
                            return Err(invalid(format!("part {} uses set beacon {target}", part.name())))
                        }
                        None => return Err(BeaconError::UnknownBeacon(target.clone())),
                    }
                }
                CompoundPart::Signed { name, loc, .. } => Source::Signed {
                    loc: Location::parse(loc.as_deref().unwrap_or(name))?,
                },
            };
            parts.push(Part {
                name: part.name().to_owned(),
                prefix: part.prefix().to_owned(),
                source,
            });
        }

        for (i, a) in parts.iter().enumerate() {
            if let Some(b) = parts[i + 1..]
                .iter()
                .find(|b| a.prefix.starts_with(&b.prefix) || b.prefix.starts_with(&a.prefix))
            {
                return Err(invalid(format!(
                    "prefixes of parts {} and {} overlap",
                    a.name, b.name
                )));
            }
        }

        let constructors = if beacon.constructors.is_empty() {
            vec![(0..parts.len()).map(|i| (i, true)).collect()]
        } else {
            beacon
                .constructors
                .iter()
                .map(|ctor| {
                    if ctor.parts.is_empty() {
                        return Err(invalid("constructor has no parts".into()));
                    }
                    ctor.parts
                        .iter()
                        .map(|cp| {
                            parts
                                .iter()
                                .position(|p| p.name == cp.name)
                                .map(|i| (i, cp.required))
                                .ok_or_else(|| invalid(format!("constructor names unknown part {}", cp.name)))
                        })
                        .collect()
                })
                .collect::<Result<_, _>>()?
        };

        Ok(Self {
            name: beacon.name.clone(),
            split: beacon.split,
            parts,
            constructors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-level attributes read by signed parts.
    pub fn signed_roots(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match &p.source {
            Source::Signed { loc } => Some(loc.root()),
            Source::Encrypted { .. } => None,
        })
    }

    /// Build the compound value for `item`.
    ///
    /// `token` computes the standard beacon token named by an encrypted part,
    /// returning `None` when its source is absent.
    pub fn assemble<F>(&self, item: &Item, mut token: F) -> Result<Option<String>, BeaconError>
    where
        F: FnMut(&str, &Item) -> Result<Option<String>, BeaconError>,
    {
        'constructors: for ctor in &self.constructors {
            let mut pieces = Vec::with_capacity(ctor.len());
            for &(index, required) in ctor {
                let part = &self.parts[index];
                let value = match &part.source {
                    Source::Encrypted { beacon } => token(beacon, item)?,
                    Source::Signed { loc } => self.signed_value(part, loc, item)?,
                };
                match value {
                    Some(value) => pieces.push(format!("{}{value}", part.prefix)),
                    None if required => continue 'constructors,
                    None => {}
                }
            }
            return Ok(Some(pieces.join(&self.split.to_string())));
        }
        Ok(None)
    }

    fn signed_value(&self, part: &Part, loc: &Location, item: &Item) -> Result<Option<String>, BeaconError> {
        let text = match loc.resolve(item) {
            None | Some(AttributeValue::Null(_)) => return Ok(None),
            Some(AttributeValue::S(s)) => s.clone(),
            Some(AttributeValue::N(n)) => normalize_number(n).map_err(|source| BeaconError::Value {
                beacon: self.name.clone(),
                source,
            })?,
            Some(other) => {
                return Err(BeaconError::UnsupportedType {
                    beacon: self.name.clone(),
                    type_id: other.type_id(),
                })
            }
        };
        if text.contains(self.split) {
            return Err(BeaconError::SplitInValue {
                beacon: self.name.clone(),
                part: part.name.clone(),
            });
        }
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::model::{BeaconStyle, Constructor, ConstructorPart, StandardBeacon};

    fn version() -> BeaconVersion {
        BeaconVersion {
            standard_beacons: vec![
                StandardBeacon {
                    name: "email".into(),
                    length: 16,
                    loc: None,
                    style: BeaconStyle::Single,
                },
                StandardBeacon {
                    name: "tags".into(),
                    length: 8,
                    loc: None,
                    style: BeaconStyle::AsSet,
                },
            ],
            ..BeaconVersion::default()
        }
    }

    fn compound(constructors: Vec<Constructor>) -> CompoundBeacon {
        CompoundBeacon {
            name: "by_site".into(),
            split: '.',
            parts: vec![
                CompoundPart::Signed {
                    name: "site".into(),
                    prefix: "S-".into(),
                    loc: None,
                },
                CompoundPart::Encrypted {
                    name: "mail".into(),
                    prefix: "E-".into(),
                    beacon: "email".into(),
                },
            ],
            constructors,
        }
    }

    fn fake_token(beacon: &str, item: &Item) -> Result<Option<String>, BeaconError> {
        Ok(item.get(beacon).map(|_| "abcd".to_owned()))
    }

    fn item(pairs: &[(&str, &str)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::S(v.to_string())))
            .collect()
    }

    #[test]
    fn default_constructor_requires_every_part() {
        let c = CompiledCompound::compile(&compound(Vec::new()), &version()).unwrap();
        assert_eq!(
            c.assemble(&item(&[("site", "nyc"), ("email", "a@b")]), fake_token)
                .unwrap(),
            Some("S-nyc.E-abcd".into())
        );
        assert_eq!(c.assemble(&item(&[("site", "nyc")]), fake_token).unwrap(), None);
    }

    #[test]
    fn first_satisfied_constructor_wins() {
        let ctor = |parts: &[(&str, bool)]| Constructor {
            parts: parts
                .iter()
                .map(|(n, r)| ConstructorPart {
                    name: n.to_string(),
                    required: *r,
                })
                .collect(),
        };
        let c = CompiledCompound::compile(
            &compound(vec![
                ctor(&[("mail", true), ("site", true)]),
                ctor(&[("site", true), ("mail", false)]),
            ]),
            &version(),
        )
        .unwrap();

        assert_eq!(
            c.assemble(&item(&[("site", "nyc"), ("email", "a@b")]), fake_token)
                .unwrap(),
            Some("E-abcd.S-nyc".into())
        );
        assert_eq!(
            c.assemble(&item(&[("site", "nyc")]), fake_token).unwrap(),
            Some("S-nyc".into())
        );
    }

    #[test]
    fn split_character_in_signed_value_rejected() {
        let c = CompiledCompound::compile(&compound(Vec::new()), &version()).unwrap();
        let err = c
            .assemble(&item(&[("site", "n.y"), ("email", "a@b")]), fake_token)
            .unwrap_err();
        assert_eq!(
            err,
            BeaconError::SplitInValue {
                beacon: "by_site".into(),
                part: "site".into()
            }
        );
    }

    #[test]
    fn invalid_configurations_rejected() {
        let mut overlapping = compound(Vec::new());
        if let CompoundPart::Encrypted { prefix, .. } = &mut overlapping.parts[1] {
            *prefix = "S-x".into();
        }
        assert!(CompiledCompound::compile(&overlapping, &version()).is_err());

        let mut set_part = compound(Vec::new());
        if let CompoundPart::Encrypted { beacon, .. } = &mut set_part.parts[1] {
            *beacon = "tags".into();
        }
        assert!(CompiledCompound::compile(&set_part, &version()).is_err());

        let mut unknown = compound(Vec::new());
        if let CompoundPart::Encrypted { beacon, .. } = &mut unknown.parts[1] {
            *beacon = "nope".into();
        }
        assert_eq!(
            CompiledCompound::compile(&unknown, &version()).unwrap_err(),
            BeaconError::UnknownBeacon("nope".into())
        );

        let bad_ctor = compound(vec![Constructor {
            parts: vec![ConstructorPart {
                name: "zip".into(),
                required: true,
            }],
        }]);
        assert!(CompiledCompound::compile(&bad_ctor, &version()).is_err());
    }
}
