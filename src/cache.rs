//! Last-known values that survive across refresh cycles.

use std::collections::HashMap;
use std::hash::Hash;

use rust_decimal::Decimal;

use crate::models::{AssetKey, NftMetadata, PriceKey, PricePoint, TokenId};

/// Mapping cache with last-write-wins semantics and no expiry.
///
/// Entries are only ever overwritten per key; nothing clears the cache
/// wholesale, so a failed fetch leaves the previous value in place.
#[derive(Debug, Clone)]
pub struct KeyCache<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V: PartialEq> PartialEq for KeyCache<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K, V> Default for KeyCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> KeyCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Apply a batch: keys in the batch overwrite, keys absent from it are
    /// left untouched.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = (K, V)>) {
        for (key, value) in batch {
            self.entries.insert(key, value);
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Results of one fetch stage, applied to the cache as a single batch.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheMerge {
    Balances(HashMap<AssetKey, Decimal>),
    Prices(HashMap<PriceKey, String>),
    History(HashMap<PriceKey, Vec<PricePoint>>),
    Metadata(HashMap<TokenId, NftMetadata>),
}

impl CacheMerge {
    pub fn len(&self) -> usize {
        match self {
            CacheMerge::Balances(batch) => batch.len(),
            CacheMerge::Prices(batch) => batch.len(),
            CacheMerge::History(batch) => batch.len(),
            CacheMerge::Metadata(batch) => batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CacheMerge::Balances(_) => "balances",
            CacheMerge::Prices(_) => "prices",
            CacheMerge::History(_) => "history",
            CacheMerge::Metadata(_) => "metadata",
        }
    }
}

/// The four independent caches behind a portfolio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioCache {
    pub balances: KeyCache<AssetKey, Decimal>,
    pub prices: KeyCache<PriceKey, String>,
    pub history: KeyCache<PriceKey, Vec<PricePoint>>,
    pub metadata: KeyCache<TokenId, NftMetadata>,
}

impl PortfolioCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, merge: CacheMerge) {
        match merge {
            CacheMerge::Balances(batch) => self.balances.merge(batch),
            CacheMerge::Prices(batch) => self.prices.merge(batch),
            CacheMerge::History(batch) => self.history.merge(batch),
            CacheMerge::Metadata(batch) => self.metadata.merge(batch),
        }
    }

    /// Cached balance, zero when nothing has been fetched yet.
    pub fn balance(&self, key: &AssetKey) -> Decimal {
        self.balances.get(key).copied().unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn merge_overwrites_present_keys_and_keeps_absent_ones() {
        let mut cache: KeyCache<&str, i32> = KeyCache::new();
        cache.put("a", 1);
        cache.put("b", 2);

        cache.merge([("b", 20), ("c", 30)]);

        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), Some(&20));
        assert_eq!(cache.get(&"c"), Some(&30));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn empty_merge_is_a_no_op() {
        let mut cache = PortfolioCache::new();
        cache
            .prices
            .put(PriceKey::new("eth"), "2000".to_string());
        let before = cache.clone();

        cache.apply(CacheMerge::Prices(HashMap::new()));

        assert_eq!(cache, before);
    }

    #[test]
    fn caches_compare_by_entries() {
        let mut left: KeyCache<PriceKey, String> = KeyCache::new();
        let mut right = KeyCache::new();
        left.put(PriceKey::new("eth"), "1".to_string());
        left.put(PriceKey::new("btc"), "2".to_string());
        right.merge([
            (PriceKey::new("btc"), "2".to_string()),
            (PriceKey::new("eth"), "1".to_string()),
        ]);
        assert_eq!(left, right);

        right.put(PriceKey::new("eth"), "3".to_string());
        assert_ne!(left, right);
    }

    #[test]
    fn missing_balance_reads_as_zero() {
        let mut cache = PortfolioCache::new();
        let key = AssetKey::new(TokenId::from("eth"), "0x1");
        assert_eq!(cache.balance(&key), Decimal::ZERO);

        let mut batch = HashMap::new();
        batch.insert(key.clone(), Decimal::from_str("1.5").unwrap());
        cache.apply(CacheMerge::Balances(batch));
        assert_eq!(cache.balance(&key), Decimal::from_str("1.5").unwrap());
    }
}
