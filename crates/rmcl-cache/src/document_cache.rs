use std::sync::Mutex;

/// In-memory cache holding exactly one decoded document blob: the most
/// recently fetched (key, value) pair, process-wide.
///
/// Grounded in `rmcl/documentcache.py`'s module-level `_cached_key` /
/// `_cached_value` pair — a single slot, not an LRU, matching the
/// original's deliberately minimal scope.
pub struct DocumentCache {
    slot: Mutex<Option<(String, Vec<u8>)>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached value if `key` matches the currently held slot.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let slot = self.slot.lock().expect("document cache mutex poisoned");
        slot.as_ref()
            .filter(|(cached_key, _)| cached_key == key)
            .map(|(_, value)| value.clone())
    }

    /// Replaces the single slot with `(key, value)`, evicting whatever was
    /// cached before.
    pub fn set(&self, key: String, value: Vec<u8>) {
        let mut slot = self.slot.lock().expect("document cache mutex poisoned");
        *slot = Some((key, value));
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}
