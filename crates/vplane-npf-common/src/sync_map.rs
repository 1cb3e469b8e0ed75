//! Ordered map wrapper that never creates entries implicitly.
//!
//! `SyncMap` is used for reference-counted object tables (counters shared
//! by rules, for example). Looking up a missing key never inserts a
//! default value, and reference counts can only be adjusted on entries
//! that already exist. Iteration follows key order, so walks over the
//! table are deterministic.

use std::collections::BTreeMap;
use thiserror::Error;

/// Error type for SyncMap operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncMapError {
    #[error("Key not found")]
    KeyNotFound,

    #[error("Reference count underflow")]
    RefCountUnderflow,
}

/// Trait for types that have a reference count.
pub trait HasRefCount {
    /// Increments the reference count and returns the new value.
    fn increment_ref(&mut self) -> u32;

    /// Decrements the reference count and returns the new value.
    ///
    /// Returns `None` if the count would underflow.
    fn decrement_ref(&mut self) -> Option<u32>;

    fn ref_count(&self) -> u32;
}

/// An ordered map that never auto-creates entries.
///
/// ```
/// use vplane_npf_common::SyncMap;
///
/// let mut map: SyncMap<u32, &str> = SyncMap::new();
/// assert!(map.get(&7).is_none());
/// assert!(map.is_empty());
///
/// map.insert(7, "seven");
/// assert_eq!(map.get(&7), Some(&"seven"));
/// ```
#[derive(Debug, Clone)]
pub struct SyncMap<K, V> {
    inner: BTreeMap<K, V>,
}

impl<K, V> SyncMap<K, V>
where
    K: Ord,
{
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the value for `key`. **This never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Returns the value for `key` mutably. **This never creates entries.**
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Inserts a key-value pair, returning the old value if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    /// Returns the first key-value pair whose value matches `pred`.
    pub fn find<P>(&self, mut pred: P) -> Option<(&K, &V)>
    where
        P: FnMut(&V) -> bool,
    {
        self.inner.iter().find(|(_, v)| pred(v))
    }

    /// Returns the entry with the greatest key.
    pub fn last_key(&self) -> Option<&K> {
        self.inner.keys().next_back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = (&K, &mut V)> {
        self.inner.iter_mut()
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.inner.keys()
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.inner.values()
    }

    pub fn values_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut V> {
        self.inner.values_mut()
    }
}

impl<K, V> SyncMap<K, V>
where
    K: Ord,
    V: HasRefCount,
{
    /// Increments the reference count of an existing entry.
    ///
    /// **This never creates entries.**
    pub fn increment_ref(&mut self, key: &K) -> Result<u32, SyncMapError> {
        match self.inner.get_mut(key) {
            Some(entry) => Ok(entry.increment_ref()),
            None => Err(SyncMapError::KeyNotFound),
        }
    }

    /// Decrements the reference count of an existing entry.
    pub fn decrement_ref(&mut self, key: &K) -> Result<u32, SyncMapError> {
        match self.inner.get_mut(key) {
            Some(entry) => entry
                .decrement_ref()
                .ok_or(SyncMapError::RefCountUnderflow),
            None => Err(SyncMapError::KeyNotFound),
        }
    }

    pub fn ref_count(&self, key: &K) -> Option<u32> {
        self.inner.get(key).map(|e| e.ref_count())
    }
}

impl<K, V> Default for SyncMap<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for SyncMap<K, V>
where
    K: Ord,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Shared {
        refs: u32,
    }

    impl HasRefCount for Shared {
        fn increment_ref(&mut self) -> u32 {
            self.refs += 1;
            self.refs
        }

        fn decrement_ref(&mut self) -> Option<u32> {
            self.refs = self.refs.checked_sub(1)?;
            Some(self.refs)
        }

        fn ref_count(&self) -> u32 {
            self.refs
        }
    }

    #[test]
    fn test_get_never_creates() {
        let mut map: SyncMap<u32, i32> = SyncMap::new();
        assert!(map.get(&1).is_none());
        assert!(map.get_mut(&1).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_ordered_iteration() {
        let map: SyncMap<u32, &str> = [(3, "c"), (1, "a"), (2, "b")].into_iter().collect();
        let keys: Vec<u32> = map.keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(map.last_key(), Some(&3));
        assert_eq!(map.find(|v| *v == "b"), Some((&2, &"b")));
    }

    #[test]
    fn test_ref_counting() {
        let mut map: SyncMap<u32, Shared> = SyncMap::new();
        assert_eq!(map.increment_ref(&1), Err(SyncMapError::KeyNotFound));

        map.insert(1, Shared { refs: 0 });
        assert_eq!(map.increment_ref(&1), Ok(1));
        assert_eq!(map.increment_ref(&1), Ok(2));
        assert_eq!(map.decrement_ref(&1), Ok(1));
        assert_eq!(map.decrement_ref(&1), Ok(0));
        assert_eq!(map.decrement_ref(&1), Err(SyncMapError::RefCountUnderflow));
        assert_eq!(map.ref_count(&1), Some(0));
    }
}
