//! In-memory scan-state cache
//!
//! Bounded LRU map from (checker, address) to the last scan result.
//! Eviction is explicit configuration: the least recently used entry goes
//! once `capacity` is reached. Staleness (TTL) is decided by the checker.

use crate::records::ScanState;
use crate::store::ScanStore;
use alloy_primitives::Address;
use anyhow::Result;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Default number of (checker, address) entries kept in memory.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// LRU-bounded in-memory ScanStore.
pub struct MemoryScanStore {
    entries: Mutex<LruCache<(String, Address), ScanState>>,
}

impl MemoryScanStore {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryScanStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ScanStore for MemoryScanStore {
    fn get(&self, checker: &str, addr: Address) -> Result<Option<ScanState>> {
        let mut entries = self.entries.lock();
        Ok(entries.get(&(checker.to_string(), addr)).cloned())
    }

    fn put(&self, checker: &str, addr: Address, state: &ScanState) -> Result<()> {
        self.entries
            .lock()
            .put((checker.to_string(), addr), state.clone());
        Ok(())
    }

    fn remove(&self, checker: &str, addr: Address) -> Result<bool> {
        Ok(self
            .entries
            .lock()
            .pop(&(checker.to_string(), addr))
            .is_some())
    }

    fn clear_checker(&self, checker: &str) -> Result<usize> {
        let mut entries = self.entries.lock();
        let doomed: Vec<(String, Address)> = entries
            .iter()
            .filter(|((id, _), _)| id == checker)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn state(addr: Address, last: u64) -> ScanState {
        let mut state = ScanState::new(format!("0x{:x}", addr));
        state.advance(last);
        state
    }

    #[test]
    fn test_cache_operations() {
        let cache = MemoryScanStore::default();
        let addr1 = address!("0000000000000000000000000000000000000001");
        let addr2 = address!("0000000000000000000000000000000000000002");

        // Initially not cached
        assert_eq!(cache.get("nft-mint", addr1).unwrap(), None);

        cache.put("nft-mint", addr1, &state(addr1, 10)).unwrap();
        cache.put("vault-stake", addr1, &state(addr1, 20)).unwrap();
        cache.put("nft-mint", addr2, &state(addr2, 30)).unwrap();
        assert_eq!(cache.len(), 3);

        let cached = cache.get("nft-mint", addr1).unwrap().unwrap();
        assert_eq!(cached.last_scanned_block, Some(10));

        assert!(cache.remove("nft-mint", addr1).unwrap());
        assert_eq!(cache.get("nft-mint", addr1).unwrap(), None);
        assert!(cache.get("vault-stake", addr1).unwrap().is_some());
    }

    #[test]
    fn test_clear_checker() {
        let cache = MemoryScanStore::default();
        let addr1 = address!("0000000000000000000000000000000000000001");
        let addr2 = address!("0000000000000000000000000000000000000002");
        cache.put("nft-mint", addr1, &state(addr1, 1)).unwrap();
        cache.put("nft-mint", addr2, &state(addr2, 1)).unwrap();
        cache.put("vault-stake", addr1, &state(addr1, 1)).unwrap();

        assert_eq!(cache.clear_checker("nft-mint").unwrap(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("vault-stake", addr1).unwrap().is_some());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = MemoryScanStore::new(2);
        let a = address!("0000000000000000000000000000000000000001");
        let b = address!("0000000000000000000000000000000000000002");
        let c = address!("0000000000000000000000000000000000000003");
        cache.put("nft-mint", a, &state(a, 1)).unwrap();
        cache.put("nft-mint", b, &state(b, 1)).unwrap();
        // Touch `a` so `b` becomes least recently used
        cache.get("nft-mint", a).unwrap();
        cache.put("nft-mint", c, &state(c, 1)).unwrap();

        assert!(cache.get("nft-mint", a).unwrap().is_some());
        assert!(cache.get("nft-mint", b).unwrap().is_none());
        assert!(cache.get("nft-mint", c).unwrap().is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = MemoryScanStore::new(0);
        let a = address!("0000000000000000000000000000000000000001");
        cache.put("nft-mint", a, &state(a, 1)).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
