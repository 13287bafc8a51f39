use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use common::{AttributeValue, Item};
use tracing::debug;

use super::cache::BeaconKeyCache;
use super::compound::CompiledCompound;
use super::location::Location;
use super::model::{BeaconVersion, RangeBeacon, StandardBeacon};
use super::range;
use super::standard::{beacon_bytes, truncated_token, MAX_LENGTH, MIN_LENGTH};
use super::virtual_field::CompiledVirtualField;
use super::{beacon_attribute, BeaconError, BeaconKeyMaterial};

#[derive(Debug, Clone)]
enum Source {
    Location(Location),
    Virtual(CompiledVirtualField),
}

impl Source {
    /// Source value, `None` when absent or null.
    fn value<'a>(&self, item: &'a Item) -> Result<Option<Cow<'a, AttributeValue>>, BeaconError> {
        let value = match self {
            Source::Location(loc) => loc.resolve(item).map(Cow::Borrowed),
            Source::Virtual(vf) => vf.evaluate(item)?.map(Cow::Owned),
        };
        Ok(value.filter(|v| !v.is_null()))
    }

    fn roots(&self) -> Vec<&str> {
        match self {
            Source::Location(loc) => vec![loc.root()],
            Source::Virtual(vf) => vf.roots().collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledStandard {
    name: String,
    source: Source,
    set: bool,
    /// Beacon whose key and length are used: the twin, or the beacon itself.
    key_name: String,
    length: u8,
}

#[derive(Debug, Clone)]
struct CompiledRange {
    config: RangeBeacon,
    loc: Location,
}

/// Action an attribute must carry to feed a beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRequirement {
    EncryptAndSign,
    SignOnly,
}

/// One attribute read by a beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconSource<'a> {
    pub beacon: &'a str,
    pub attribute: &'a str,
    pub requirement: SourceRequirement,
}

/// Validated beacon configuration with locations parsed. Holds no keys.
#[derive(Debug, Clone, Default)]
pub struct BeaconPlan {
    standard: Vec<CompiledStandard>,
    compound: Vec<CompiledCompound>,
    range: Vec<CompiledRange>,
}

impl BeaconPlan {
    /// Validate `version` and parse every location in it.
    ///
    /// # Errors
    ///
    /// Returns a [`BeaconError`] for duplicate names, lengths outside 1..=63,
    /// unknown or chained twins, malformed locations, invalid compound or range
    /// parameters.
    pub fn compile(version: &BeaconVersion) -> Result<Self, BeaconError> {
        let mut seen = HashSet::new();
        for name in version.names() {
            if name.is_empty() || !seen.insert(name) {
                return Err(BeaconError::DuplicateName(name.to_owned()));
            }
        }

        let mut virtual_fields = BTreeMap::new();
        for field in &version.virtual_fields {
            virtual_fields.insert(field.name.as_str(), CompiledVirtualField::compile(field)?);
        }

        let standard = version
            .standard_beacons
            .iter()
            .map(|beacon| compile_standard(beacon, version, &virtual_fields))
            .collect::<Result<_, _>>()?;

        let compound = version
            .compound_beacons
            .iter()
            .map(|beacon| CompiledCompound::compile(beacon, version))
            .collect::<Result<_, _>>()?;

        let range = version
            .range_beacons
            .iter()
            .map(|beacon| {
                range::validate(beacon)?;
                Ok(CompiledRange {
                    config: beacon.clone(),
                    loc: Location::parse(beacon.source())?,
                })
            })
            .collect::<Result<_, BeaconError>>()?;

        Ok(Self {
            standard,
            compound,
            range,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.compound.is_empty() && self.range.is_empty()
    }

    /// Every top-level attribute read by a beacon, with the action it needs.
    pub fn sources(&self) -> Vec<BeaconSource<'_>> {
        let mut out = Vec::new();
        for s in &self.standard {
            for root in s.source.roots() {
                out.push(BeaconSource {
                    beacon: &s.name,
                    attribute: root,
                    requirement: SourceRequirement::EncryptAndSign,
                });
            }
        }
        for c in &self.compound {
            out.extend(c.signed_roots().map(|root| BeaconSource {
                beacon: c.name(),
                attribute: root,
                requirement: SourceRequirement::SignOnly,
            }));
        }
        for r in &self.range {
            out.push(BeaconSource {
                beacon: &r.config.name,
                attribute: r.loc.root(),
                requirement: SourceRequirement::EncryptAndSign,
            });
        }
        out
    }

    fn standard(&self, name: &str) -> Result<&CompiledStandard, BeaconError> {
        self.standard
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| BeaconError::UnknownBeacon(name.to_owned()))
    }
}

fn compile_standard(
    beacon: &StandardBeacon,
    version: &BeaconVersion,
    virtual_fields: &BTreeMap<&str, CompiledVirtualField>,
) -> Result<CompiledStandard, BeaconError> {
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&beacon.length) {
        return Err(BeaconError::InvalidLength {
            beacon: beacon.name.clone(),
            length: beacon.length,
        });
    }

    let (key_name, length) = match beacon.style.twin() {
        None => (beacon.name.clone(), beacon.length),
        Some(other) if other == beacon.name => {
            return Err(BeaconError::InvalidConfig {
                beacon: beacon.name.clone(),
                reason: "beacon is twinned with itself".into(),
            })
        }
        Some(other) => {
            let twin = version
                .standard(other)
                .ok_or_else(|| BeaconError::UnknownBeacon(other.to_owned()))?;
            if twin.style.twin().is_some() {
                return Err(BeaconError::InvalidConfig {
                    beacon: beacon.name.clone(),
                    reason: format!("twin {other} is itself twinned"),
                });
            }
            (twin.name.clone(), twin.length)
        }
    };

    let source = match virtual_fields.get(beacon.source()) {
        Some(vf) => Source::Virtual(vf.clone()),
        None => Source::Location(Location::parse(beacon.source())?),
    };

    Ok(CompiledStandard {
        name: beacon.name.clone(),
        source,
        set: beacon.style.is_set(),
        key_name,
        length,
    })
}

/// Computes beacon outputs for items and tokens for queries.
#[derive(Debug)]
pub struct BeaconEngine {
    plan: BeaconPlan,
    material: BeaconKeyMaterial,
    cache: Arc<BeaconKeyCache>,
}

impl BeaconEngine {
    /// # Errors
    ///
    /// Returns a [`BeaconError`] if `version` does not compile.
    pub fn new(
        version: &BeaconVersion,
        material: BeaconKeyMaterial,
        cache: Arc<BeaconKeyCache>,
    ) -> Result<Self, BeaconError> {
        Ok(Self {
            plan: BeaconPlan::compile(version)?,
            material,
            cache,
        })
    }

    pub fn plan(&self) -> &BeaconPlan {
        &self.plan
    }

    pub fn cache(&self) -> &BeaconKeyCache {
        &self.cache
    }

    /// Beacon attributes for `item`, keyed by stored attribute name.
    ///
    /// Beacons whose source is absent or null are omitted.
    pub fn compute(&self, item: &Item) -> Result<BTreeMap<String, AttributeValue>, BeaconError> {
        let mut out = BTreeMap::new();

        for s in &self.plan.standard {
            let Some(value) = s.source.value(item)? else {
                continue;
            };
            let stored = match (s.set, value.set_members()) {
                (false, None) => AttributeValue::S(self.hash(s, &value)?),
                (true, Some(members)) => AttributeValue::L(
                    members
                        .iter()
                        .map(|m| self.hash(s, m).map(AttributeValue::S))
                        .collect::<Result<_, _>>()?,
                ),
                (false, Some(_)) => return Err(BeaconError::UnexpectedSet(s.name.clone())),
                (true, None) => return Err(BeaconError::ExpectedSet(s.name.clone())),
            };
            out.insert(beacon_attribute(&s.name), stored);
        }

        for c in &self.plan.compound {
            if let Some(value) = c.assemble(item, |beacon, item| self.scalar_token(beacon, item))? {
                out.insert(beacon_attribute(c.name()), AttributeValue::S(value));
            }
        }

        for r in &self.plan.range {
            let Some(value) = r.loc.resolve(item).filter(|v| !v.is_null()) else {
                continue;
            };
            let n = range::integer_value(&r.config.name, value)?;
            let key = self.cache.get_or_derive(&self.material, &r.config.name)?;
            let tokens = range::item_buckets(&r.config, n)
                .into_iter()
                .map(|bucket| range::bucket_token(&key[..], &r.config, bucket).map(AttributeValue::S))
                .collect::<Result<_, _>>()?;
            out.insert(beacon_attribute(&r.config.name), AttributeValue::L(tokens));
        }

        debug!(count = out.len(), "beacons computed");
        Ok(out)
    }

    /// Token to compare against standard beacon `beacon` for `value`.
    ///
    /// For set-style beacons `value` is a single member, matched with a
    /// `contains` predicate. Returns `None` for null values.
    pub fn equality_token(
        &self,
        beacon: &str,
        value: &AttributeValue,
    ) -> Result<Option<String>, BeaconError> {
        let s = self.plan.standard(beacon)?;
        if value.is_null() {
            return Ok(None);
        }
        if value.is_set() {
            return Err(BeaconError::UnexpectedSet(beacon.to_owned()));
        }
        self.hash(s, value).map(Some)
    }

    /// Compound value for the attributes in `values`, as it would be stored.
    pub fn compound_token(&self, beacon: &str, values: &Item) -> Result<Option<String>, BeaconError> {
        let c = self
            .plan
            .compound
            .iter()
            .find(|c| c.name() == beacon)
            .ok_or_else(|| BeaconError::UnknownBeacon(beacon.to_owned()))?;
        c.assemble(values, |name, item| self.scalar_token(name, item))
    }

    /// Tokens covering `[lo, hi]`; an item matches if it stores any of them.
    pub fn range_query_tokens(&self, beacon: &str, lo: i64, hi: i64) -> Result<Vec<String>, BeaconError> {
        let r = self
            .plan
            .range
            .iter()
            .find(|r| r.config.name == beacon)
            .ok_or_else(|| BeaconError::UnknownBeacon(beacon.to_owned()))?;
        let key = self.cache.get_or_derive(&self.material, beacon)?;
        range::query_cover(&r.config, lo, hi)?
            .into_iter()
            .map(|bucket| range::bucket_token(&key[..], &r.config, bucket))
            .collect()
    }

    fn hash(&self, s: &CompiledStandard, value: &AttributeValue) -> Result<String, BeaconError> {
        let key = self.cache.get_or_derive(&self.material, &s.key_name)?;
        let bytes = beacon_bytes(&s.name, value)?;
        truncated_token(&key[..], &bytes, s.length)
    }

    fn scalar_token(&self, beacon: &str, item: &Item) -> Result<Option<String>, BeaconError> {
        let s = self.plan.standard(beacon)?;
        match s.source.value(item)? {
            None => Ok(None),
            Some(value) if value.is_set() => Err(BeaconError::UnexpectedSet(s.name.clone())),
            Some(value) => self.hash(s, &value).map(Some),
        }
    }
}
