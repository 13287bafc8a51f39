//! Attribute locations inside an item.
//!
//! A location is a top-level attribute name optionally followed by map keys and
//! list indexes: `"email"`, `"address.zip"`, `"phones[0]"`,
//! `"orders[2].card.last4"`.

use std::fmt;

use common::{AttributeValue, Item};

use super::BeaconError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Navigate into a map entry by name.
    Key(String),
    /// Navigate into a list element by position.
    Index(usize),
}

/// A parsed location. Always starts at a top-level attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    raw: String,
    segments: Vec<Segment>,
}

impl Location {
    /// Parse a dotted location with optional `[n]` list indexes.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::InvalidLocation`] for empty names, stray `]`,
    /// malformed indexes or a location that starts with an index.
    pub fn parse(raw: &str) -> Result<Self, BeaconError> {
        let invalid = || BeaconError::InvalidLocation(raw.to_owned());
        let mut segments = Vec::new();

        for part in raw.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if name.is_empty() || name.contains(']') {
                return Err(invalid());
            }
            segments.push(Segment::Key(name.to_owned()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                let index = rest[1..close].parse::<usize>().map_err(|_| invalid())?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid());
                }
            }
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// Name of the top-level attribute this location reads from.
    pub fn root(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Key(name)) => name,
            _ => &self.raw,
        }
    }

    /// Follow the location through `item`. Missing steps resolve to `None`.
    pub fn resolve<'a>(&self, item: &'a Item) -> Option<&'a AttributeValue> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = match first {
            Segment::Key(name) => item.get(name)?,
            Segment::Index(_) => return None,
        };
        for segment in rest {
            current = match (segment, current) {
                (Segment::Key(key), AttributeValue::M(map)) => map.get(key)?,
                (Segment::Index(i), AttributeValue::L(list)) => list.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
