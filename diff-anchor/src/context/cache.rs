//! Per-run cache of definition lookups.
//!
//! Key: `(tree root, extension, name)`. The tree is immutable for one review
//! run, so a lookup (hit or miss) is computed at most once per key, even when
//! several chunks are assembled concurrently. Owned by the run; never global.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use super::source::{Definition, DefinitionSource};

type CacheKey = (String, String, String);
type Slot = Arc<OnceLock<Option<Definition>>>;

#[derive(Debug, Default)]
pub struct DefinitionCache {
    slots: RwLock<HashMap<CacheKey, Slot>>,
    scans: AtomicUsize,
    hits: AtomicUsize,
}

impl DefinitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name` in `source`, scanning the tree only on first request.
    pub fn lookup<S>(&self, source: &S, extension: &str, name: &str) -> Option<Definition>
    where
        S: DefinitionSource + ?Sized,
    {
        let key = (source.root_key(), extension.to_string(), name.to_string());
        let slot = self.slot(key);

        let mut scanned = false;
        let value = slot.get_or_init(|| {
            scanned = true;
            self.scans.fetch_add(1, Ordering::Relaxed);
            source.find_definition(extension, name)
        });
        if !scanned {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("cache: hit {}{}", name, extension);
        }
        value.clone()
    }

    fn slot(&self, key: CacheKey) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return slot.clone();
        }
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key)
            .or_default()
            .clone()
    }

    /// Number of tree scans performed.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
