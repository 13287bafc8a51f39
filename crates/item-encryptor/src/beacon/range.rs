//! Hierarchical bucket tokens for range search over integers.
//!
//! Level 0 splits the integer line into buckets of `bucket_width` starting at
//! `origin`. Each coarser level groups `fanout` buckets of the level below, so
//! bucket `b` at level 0 belongs to bucket `b / fanout^l` at level `l`.
//!
//! An item stores one token per level. A query `[lo, hi]` is answered by the
//! smallest set of buckets (across levels) whose union is exactly the level-0
//! buckets touched by the interval.

use common::item::normalize_number;
use common::AttributeValue;

use super::model::RangeBeacon;
use super::standard::{truncated_token, MAX_LENGTH, MIN_LENGTH};
use super::BeaconError;

pub const MAX_LEVELS: u8 = 8;
pub const MAX_FANOUT: u32 = 64;

const TAG_RANGE: u8 = 0x10;

/// `(level, bucket)` pair addressed by a range token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bucket {
    pub level: u8,
    pub index: i128,
}

/// Check the structural parameters of a range beacon.
pub fn validate(beacon: &RangeBeacon) -> Result<(), BeaconError> {
    let reason = if !(MIN_LENGTH..=MAX_LENGTH).contains(&beacon.length) {
        "length must be between 1 and 63 bits"
    } else if beacon.bucket_width == 0 {
        "bucket_width must be positive"
    } else if !(2..=MAX_FANOUT).contains(&beacon.fanout) {
        "fanout must be between 2 and 64"
    } else if !(1..=MAX_LEVELS).contains(&beacon.levels) {
        "levels must be between 1 and 8"
    } else if beacon.max_query_tokens == 0 {
        "max_query_tokens must be positive"
    } else {
        return Ok(());
    };
    Err(BeaconError::InvalidConfig {
        beacon: beacon.name.clone(),
        reason: reason.into(),
    })
}

/// Integer value of a number attribute.
pub fn integer_value(beacon: &str, value: &AttributeValue) -> Result<i64, BeaconError> {
    let AttributeValue::N(raw) = value else {
        return Err(BeaconError::UnsupportedType {
            beacon: beacon.to_owned(),
            type_id: value.type_id(),
        });
    };
    let normalized = normalize_number(raw).map_err(|source| BeaconError::Value {
        beacon: beacon.to_owned(),
        source,
    })?;
    normalized
        .parse::<i64>()
        .map_err(|_| BeaconError::NotAnInteger(beacon.to_owned()))
}

fn level0(beacon: &RangeBeacon, value: i64) -> i128 {
    (i128::from(value) - i128::from(beacon.origin)).div_euclid(i128::from(beacon.bucket_width))
}

fn scale(beacon: &RangeBeacon, level: u8) -> i128 {
    i128::from(beacon.fanout).pow(u32::from(level))
}

/// The bucket at every level that contains `value`.
pub fn item_buckets(beacon: &RangeBeacon, value: i64) -> Vec<Bucket> {
    let b0 = level0(beacon, value);
    (0..beacon.levels)
        .map(|level| Bucket {
            level,
            index: b0.div_euclid(scale(beacon, level)),
        })
        .collect()
}

/// Minimal bucket cover of `[lo, hi]`.
///
/// # Errors
///
/// Returns [`BeaconError::InvalidRange`] if `lo > hi` and
/// [`BeaconError::RangeTooWide`] if the cover exceeds `max_query_tokens`.
pub fn query_cover(beacon: &RangeBeacon, lo: i64, hi: i64) -> Result<Vec<Bucket>, BeaconError> {
    if lo > hi {
        return Err(BeaconError::InvalidRange {
            beacon: beacon.name.clone(),
            lo,
            hi,
        });
    }
    let fanout = i128::from(beacon.fanout);
    let max = beacon.max_query_tokens;
    let too_wide = |needed: i128| BeaconError::RangeTooWide {
        beacon: beacon.name.clone(),
        needed: usize::try_from(needed).unwrap_or(usize::MAX),
        max,
    };

    let mut cover = Vec::new();
    let (mut start, mut end) = (level0(beacon, lo), level0(beacon, hi));

    for level in 0..beacon.levels {
        if level + 1 == beacon.levels {
            let needed = cover.len() as i128 + (end - start + 1);
            if needed > max as i128 {
                return Err(too_wide(needed));
            }
            cover.extend((start..=end).map(|index| Bucket { level, index }));
            break;
        }
        while start <= end && start.rem_euclid(fanout) != 0 {
            cover.push(Bucket { level, index: start });
            start += 1;
        }
        while start <= end && (end + 1).rem_euclid(fanout) != 0 {
            cover.push(Bucket { level, index: end });
            end -= 1;
        }
        if cover.len() > max {
            return Err(too_wide(cover.len() as i128));
        }
        if start > end {
            break;
        }
        start = start.div_euclid(fanout);
        end = end.div_euclid(fanout);
    }

    cover.sort();
    Ok(cover)
}

/// Token for one bucket.
pub fn bucket_token(key: &[u8], beacon: &RangeBeacon, bucket: Bucket) -> Result<String, BeaconError> {
    let mut message = Vec::with_capacity(2 + 16);
    message.push(TAG_RANGE);
    message.push(bucket.level);
    message.extend_from_slice(&bucket.index.to_be_bytes());
    truncated_token(key, &message, beacon.length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(width: u64, fanout: u32, levels: u8, max: usize) -> RangeBeacon {
        RangeBeacon {
            name: "age".into(),
            loc: None,
            length: 16,
            origin: 0,
            bucket_width: width,
            fanout,
            levels,
            max_query_tokens: max,
        }
    }

    /// Expand a cover back into level-0 bucket indexes.
    fn expand(b: &RangeBeacon, cover: &[Bucket]) -> Vec<i128> {
        let mut out: Vec<i128> = cover
            .iter()
            .flat_map(|bucket| {
                let s = scale(b, bucket.level);
                (bucket.index * s)..((bucket.index + 1) * s)
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn item_buckets_nest() {
        let b = beacon(10, 4, 3, 64);
        let buckets = item_buckets(&b, 95);
        assert_eq!(
            buckets,
            vec![
                Bucket { level: 0, index: 9 },
                Bucket { level: 1, index: 2 },
                Bucket { level: 2, index: 0 },
            ]
        );
    }

    #[test]
    fn negative_values_floor() {
        let b = beacon(10, 4, 2, 64);
        assert_eq!(item_buckets(&b, -1)[0].index, -1);
        assert_eq!(item_buckets(&b, -10)[0].index, -1);
        assert_eq!(item_buckets(&b, -11)[0].index, -2);
        assert_eq!(item_buckets(&b, -11)[1].index, -1);
    }

    #[test]
    fn cover_is_exact_and_small() {
        let b = beacon(1, 4, 3, 64);
        let cover = query_cover(&b, 3, 28).unwrap();
        assert_eq!(expand(&b, &cover), (3..=28).collect::<Vec<i128>>());
        // level 0 {3, 28}, level 1 {1..=6}
        assert_eq!(cover.len(), 8);
    }

    #[test]
    fn aligned_range_uses_one_coarse_bucket() {
        let b = beacon(1, 4, 3, 64);
        assert_eq!(
            query_cover(&b, 16, 31).unwrap(),
            vec![Bucket { level: 2, index: 1 }]
        );
    }

    #[test]
    fn single_value_range() {
        let b = beacon(5, 4, 3, 64);
        assert_eq!(
            query_cover(&b, 12, 12).unwrap(),
            vec![Bucket { level: 0, index: 2 }]
        );
    }

    #[test]
    fn cover_matches_item_buckets() {
        let b = beacon(3, 3, 4, 64);
        for (lo, hi) in [(-50, 40), (0, 0), (7, 81), (-3, -1)] {
            let cover = query_cover(&b, lo, hi).unwrap();
            for value in lo..=hi {
                let hits = item_buckets(&b, value)
                    .iter()
                    .filter(|bucket| cover.contains(bucket))
                    .count();
                assert_eq!(hits, 1, "value {value} in [{lo}, {hi}]");
            }
            for outside in [lo - 3 * 81, hi + 3 * 81] {
                assert!(!item_buckets(&b, outside).iter().any(|bk| cover.contains(bk)));
            }
        }
    }

    #[test]
    fn wide_range_rejected() {
        let b = beacon(1, 2, 2, 4);
        assert!(matches!(
            query_cover(&b, 0, 1_000),
            Err(BeaconError::RangeTooWide { max: 4, .. })
        ));
    }

    #[test]
    fn inverted_range_rejected() {
        let b = beacon(1, 2, 2, 4);
        assert!(matches!(
            query_cover(&b, 5, 4),
            Err(BeaconError::InvalidRange { lo: 5, hi: 4, .. })
        ));
    }

    #[test]
    fn integer_values_only() {
        assert_eq!(integer_value("age", &AttributeValue::N("42.0".into())).unwrap(), 42);
        assert!(matches!(
            integer_value("age", &AttributeValue::N("4.5".into())),
            Err(BeaconError::NotAnInteger(_))
        ));
        assert!(matches!(
            integer_value("age", &AttributeValue::S("42".into())),
            Err(BeaconError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn parameters_validated() {
        assert!(validate(&beacon(1, 4, 3, 8)).is_ok());
        assert!(validate(&beacon(0, 4, 3, 8)).is_err());
        assert!(validate(&beacon(1, 1, 3, 8)).is_err());
        assert!(validate(&beacon(1, 65, 3, 8)).is_err());
        assert!(validate(&beacon(1, 4, 9, 8)).is_err());
        assert!(validate(&beacon(1, 4, 0, 8)).is_err());
    }
}
