//! Process-wide cache of derived beacon keys, keyed by
//! `(material fingerprint, beacon name)`.
//!
//! The slot map sits behind [`ArcSwap`] so lookups never block. Each slot
//! derives its key at most once: concurrent first callers serialise on the
//! slot's init lock and all but one find the key already set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use arc_swap::ArcSwap;
use tracing::debug;

use super::standard::{derive_beacon_key, BeaconKey};
use super::{BeaconError, BeaconKeyMaterial};

type CacheKey = ([u8; 32], String);

#[derive(Default)]
struct Slot {
    key: OnceLock<Arc<BeaconKey>>,
    init: Mutex<()>,
}

/// Shared cache of beacon keys.
#[derive(Default)]
pub struct BeaconKeyCache {
    slots: ArcSwap<HashMap<CacheKey, Arc<Slot>>>,
    derivations: AtomicUsize,
}

impl BeaconKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.slots
            .load()
            .values()
            .filter(|slot| slot.key.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total key derivations performed since construction.
    pub fn derivations(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }

    /// Return the key for `name`, deriving it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::KeyDerivation`] if derivation fails. Failures are
    /// not cached.
    pub fn get_or_derive(
        &self,
        material: &BeaconKeyMaterial,
        name: &str,
    ) -> Result<Arc<BeaconKey>, BeaconError> {
        let id = (*material.fingerprint(), name.to_owned());
        let slot = self.slot(&id);
        if let Some(key) = slot.key.get() {
            return Ok(Arc::clone(key));
        }

        let _guard = slot.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = slot.key.get() {
            return Ok(Arc::clone(key));
        }
        let key = Arc::new(derive_beacon_key(material, name)?);
        self.derivations.fetch_add(1, Ordering::Relaxed);
        debug!(key_id = %material.key_id(), beacon = %name, "beacon key derived");
        Ok(Arc::clone(slot.key.get_or_init(|| key)))
    }

    /// Drop every cached key, e.g. after the beacon root key is rotated.
    pub fn clear(&self) {
        self.slots.store(Arc::new(HashMap::new()));
        debug!("beacon key cache cleared");
    }

    fn slot(&self, id: &CacheKey) -> Arc<Slot> {
        if let Some(slot) = self.slots.load().get(id) {
            return Arc::clone(slot);
        }
        let candidate = Arc::new(Slot::default());
        self.slots.rcu(|map| {
            if map.contains_key(id) {
                return Arc::clone(map);
            }
            let mut next = HashMap::clone(map);
            next.insert(id.clone(), Arc::clone(&candidate));
            Arc::new(next)
        });
        // A concurrent clear may have dropped the entry; the candidate is still usable.
        self.slots.load().get(id).cloned().unwrap_or(candidate)
    }
}

impl std::fmt::Debug for BeaconKeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeaconKeyCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
