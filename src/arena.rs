//! Item arena
//!
//! Each factory owns one [`ItemCache`]: items live in a generational slot map
//! and are addressed by the order in which the factory emitted them. Clearing
//! the cache releases every item of the pricing attempt at once; callers still
//! holding an `Arc` keep their item alive.

use std::sync::Arc;

use slotmap::{Key, SlotMap};

/// Emission-ordered store of immutable items.
#[derive(Debug)]
pub struct ItemCache<K: Key, T> {
    items: SlotMap<K, Arc<T>>,
    order: Vec<K>,
    generation: u32,
}

impl<K: Key, T> ItemCache<K, T> {
    /// Creates an empty cache
    pub fn new() -> Self {
        ItemCache {
            items: SlotMap::with_key(),
            order: Vec::new(),
            generation: 0,
        }
    }

    /// Item emitted at `index`
    pub fn get(&self, index: usize) -> Option<&Arc<T>> {
        self.order.get(index).and_then(|key| self.items.get(*key))
    }

    /// Item stored under `key`, if it survived the last clear
    pub fn resolve(&self, key: K) -> Option<&Arc<T>> {
        self.items.get(key)
    }

    /// Stores the next emitted item, returning its index and the shared item.
    pub fn push(&mut self, item: T) -> (usize, Arc<T>) {
        let item = Arc::new(item);
        let key = self.items.insert(Arc::clone(&item));

        self.order.push(key);

        (self.order.len() - 1, item)
    }

    /// Key of the item emitted at `index`
    pub fn key(&self, index: usize) -> Option<K> {
        self.order.get(index).copied()
    }

    /// Items in emission order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.order.iter().filter_map(|key| self.items.get(*key))
    }

    /// Number of emitted items
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of times the cache has been cleared
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Releases every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.generation += 1;
    }
}

impl<K: Key, T> Default for ItemCache<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::DefaultKey;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn items_are_addressed_by_emission_order() -> TestResult {
        let mut cache: ItemCache<DefaultKey, &str> = ItemCache::new();

        let (first, shared) = cache.push("first");
        cache.push("second");

        assert_eq!(first, 0);
        assert_eq!(cache.len(), 2);
        assert!(Arc::ptr_eq(cache.get(0).ok_or("missing item")?, &shared));
        assert_eq!(cache.get(1).map(|item| **item), Some("second"));
        assert!(cache.get(2).is_none());

        Ok(())
    }

    #[test]
    fn clear_releases_items_and_invalidates_keys() -> TestResult {
        let mut cache: ItemCache<DefaultKey, u32> = ItemCache::new();

        let (_, held) = cache.push(7);
        let key = cache.key(0).ok_or("missing key")?;

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.resolve(key).is_none());
        assert_eq!(cache.generation(), 1);
        assert_eq!(*held, 7);

        Ok(())
    }
}
