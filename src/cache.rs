//! Derived-state caches layered over the ledger
//!
//! Provides:
//! - Address balances (lazily computed, invalidated on every seal touching the address)
//! - Address transaction histories (lazily computed, extended in place on seal)
//!
//! Lookups take `&self` so they can run while the owning engine is only
//! read-locked. A cache entry is only ever written from a value computed against
//! the current ledger, and the ledger cannot change while a reader holds the
//! engine, so a stored balance is never stale.
use crate::blockchain::{AnnotatedTransaction, Block, Ledger};
use crate::crypto::Address;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// Thread-safe map wrapper using a parking_lot RwLock.
pub struct ThreadSafeCache<K, V> {
    cache: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for ThreadSafeCache<K, V> {
    fn default() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ThreadSafeCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value from cache. Uses read lock for non-mutating access.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.read().get(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.read().contains_key(key)
    }

    pub fn put(&self, key: K, value: V) {
        self.cache.write().insert(key, value);
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.write().remove(key)
    }

    /// Applies `update` to an existing entry; returns false if the key is absent.
    pub fn update_existing<Q, F>(&self, key: &Q, update: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut V),
    {
        match self.cache.write().get_mut(key) {
            Some(value) => {
                update(value);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

/// Cache for address balances
pub type BalanceCache = ThreadSafeCache<Address, f64>;

impl BalanceCache {
    pub fn get_balance(&self, address: &str) -> Option<f64> {
        self.get(address)
    }

    /// Invalidate specific address balance
    pub fn invalidate(&self, address: &str) -> Option<f64> {
        self.remove(address)
    }
}

/// Cache for per-address transaction histories
pub type HistoryCache = ThreadSafeCache<Address, Vec<AnnotatedTransaction>>;

impl HistoryCache {
    pub fn get_history(&self, address: &str) -> Option<Vec<AnnotatedTransaction>> {
        self.get(address)
    }

    /// Extends the cached list for `address`, if there is one.
    pub fn append_if_cached(&self, address: &str, entry: &AnnotatedTransaction) -> bool {
        self.update_existing(address, |history| history.push(entry.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub balances: usize,
    pub histories: usize,
}

/// Balance and history caches for a single ledger.
#[derive(Default)]
pub struct DerivedStateCache {
    balances: BalanceCache,
    histories: HistoryCache,
}

impl DerivedStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_balance(&self, ledger: &Ledger, address: &str) -> f64 {
        if let Some(balance) = self.balances.get_balance(address) {
            return balance;
        }
        let balance = ledger.get_balance(address);
        self.balances.put(address.to_string(), balance);
        balance
    }

    pub fn get_transaction_history(
        &self,
        ledger: &Ledger,
        address: &str,
    ) -> Vec<AnnotatedTransaction> {
        if let Some(history) = self.histories.get_history(address) {
            return history;
        }
        let history = ledger.get_transaction_history(address);
        self.histories.put(address.to_string(), history.clone());
        history
    }

    /// Must run in the same critical section as the chain append.
    pub fn on_block_sealed(&self, block: &Block) {
        for tx in block.transactions() {
            let entry = AnnotatedTransaction::new(tx.clone(), block);

            self.balances.invalidate(&tx.to);
            self.histories.append_if_cached(&tx.to, &entry);

            if let Some(from) = tx.from.as_deref().filter(|from| *from != tx.to) {
                self.balances.invalidate(from);
                self.histories.append_if_cached(from, &entry);
            }
        }
        trace!(
            "Cache updated for block {} ({} balances cached)",
            block.index,
            self.balances.len()
        );
    }

    /// Cached balance without computing it.
    pub fn cached_balance(&self, address: &str) -> Option<f64> {
        self.balances.get_balance(address)
    }

    pub fn is_history_cached(&self, address: &str) -> bool {
        self.histories.contains(address)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            balances: self.balances.len(),
            histories: self.histories.len(),
        }
    }

    pub fn clear(&self) {
        self.balances.clear();
        self.histories.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::SealCancel;
    use crate::transaction::Transaction;

    fn seal(ledger: &mut Ledger, cache: &DerivedStateCache, recipient: &str) -> Block {
        let block = ledger
            .seal_block(&recipient.to_string(), &SealCancel::new())
            .unwrap()
            .sealed()
            .unwrap();
        cache.on_block_sealed(&block);
        block
    }

    #[test]
    fn test_balance_cache_roundtrip() {
        let cache = BalanceCache::new();
        cache.put("test_address".to_string(), 100.5);
        assert_eq!(cache.get_balance("test_address"), Some(100.5));
        assert_eq!(cache.invalidate("test_address"), Some(100.5));
        assert!(cache.get_balance("test_address").is_none());
    }

    #[test]
    fn test_balance_is_cached_then_invalidated_by_seal() {
        let mut ledger = Ledger::new(1, 100.0);
        let cache = DerivedStateCache::new();

        seal(&mut ledger, &cache, "x");
        assert_eq!(cache.cached_balance("x"), None);
        assert_eq!(cache.get_balance(&ledger, "x"), 100.0);
        assert_eq!(cache.cached_balance("x"), Some(100.0));

        seal(&mut ledger, &cache, "x");
        assert_eq!(cache.cached_balance("x"), None);
        assert_eq!(cache.get_balance(&ledger, "x"), 200.0);
    }

    #[test]
    fn test_sender_balance_invalidated() {
        let mut ledger = Ledger::new(1, 100.0);
        let cache = DerivedStateCache::new();
        seal(&mut ledger, &cache, "alice");
        assert_eq!(cache.get_balance(&ledger, "alice"), 100.0);
        assert_eq!(cache.get_balance(&ledger, "bystander"), 0.0);

        ledger
            .submit_transaction(Transaction::transfer("alice", "bob", 40.0).sign("ka"))
            .unwrap();
        seal(&mut ledger, &cache, "miner");

        assert_eq!(cache.cached_balance("alice"), None);
        assert_eq!(cache.cached_balance("bystander"), Some(0.0));
        assert_eq!(cache.get_balance(&ledger, "alice"), 60.0);
        assert_eq!(cache.get_balance(&ledger, "bob"), 40.0);
    }

    #[test]
    fn test_history_extended_in_place() {
        let mut ledger = Ledger::new(1, 100.0);
        let cache = DerivedStateCache::new();
        seal(&mut ledger, &cache, "alice");
        assert_eq!(cache.get_transaction_history(&ledger, "alice").len(), 1);
        assert!(cache.is_history_cached("alice"));

        ledger
            .submit_transaction(Transaction::transfer("alice", "alice", 1.0).sign("ka"))
            .unwrap();
        seal(&mut ledger, &cache, "alice");

        let cached = cache.get_transaction_history(&ledger, "alice");
        assert_eq!(cached, ledger.get_transaction_history("alice"));
        assert_eq!(cached.len(), 3);
    }

    #[test]
    fn test_uncached_history_not_created_on_seal() {
        let mut ledger = Ledger::new(1, 100.0);
        let cache = DerivedStateCache::new();
        seal(&mut ledger, &cache, "alice");
        seal(&mut ledger, &cache, "alice");
        assert!(!cache.is_history_cached("alice"));
        assert_eq!(cache.get_transaction_history(&ledger, "alice").len(), 2);
        assert_eq!(cache.stats(), CacheStats { balances: 0, histories: 1 });

        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
