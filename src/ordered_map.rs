//! Insertion-ordered map.
//!
//! A thin layer over [`IndexMap`] that reports positional insert failures as
//! [`MapError`] and compares maps by order as well as content.

use std::fmt::Display;
use std::hash::Hash;

use indexmap::IndexMap;

use crate::error::MapError;

#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: IndexMap<K, V>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::default(),
        }
    }
}

impl<K, V> OrderedMap<K, V>
where
    K: Eq + Hash + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Like [`get`](Self::get) but a missing key is an error.
    pub fn get_required(&self, key: &K) -> Result<&V, MapError> {
        self.entries
            .get(key)
            .ok_or_else(|| MapError::KeyNotFound(key.to_string()))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or update. Updating keeps the key's current position.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn insert_at_index(&mut self, index: usize, key: K, value: V) -> Result<(), MapError> {
        if self.entries.contains_key(&key) {
            return Err(MapError::DuplicateKey(key.to_string()));
        }
        let len = self.entries.len();
        if index > len {
            return Err(MapError::IndexOutOfBounds { index, len });
        }
        self.entries.shift_insert(index, key, value);
        Ok(())
    }

    pub fn insert_after(&mut self, after: &K, key: K, value: V) -> Result<(), MapError> {
        if self.entries.contains_key(&key) {
            return Err(MapError::DuplicateKey(key.to_string()));
        }
        let index = self
            .entries
            .get_index_of(after)
            .ok_or_else(|| MapError::KeyNotFound(after.to_string()))?;
        self.insert_at_index(index + 1, key, value)
    }

    pub fn insert_before(&mut self, before: &K, key: K, value: V) -> Result<(), MapError> {
        if self.entries.contains_key(&key) {
            return Err(MapError::DuplicateKey(key.to_string()));
        }
        let index = self
            .entries
            .get_index_of(before)
            .ok_or_else(|| MapError::KeyNotFound(before.to_string()))?;
        self.insert_at_index(index, key, value)
    }

    /// Remove `key`, keeping the relative order of the remaining entries.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key)
    }

    /// Keep only the entries for which `f` returns true.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &V) -> bool) {
        self.entries.retain(|key, value| f(key, value));
    }

    /// Reorder entries with a stable sort over `(key, value)` pairs.
    pub fn sort_by(&mut self, mut compare: impl FnMut((&K, &V), (&K, &V)) -> std::cmp::Ordering) {
        self.entries
            .sort_by(|ka, va, kb, vb| compare((ka, va), (kb, vb)));
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter()
    }
}

impl<K, V> PartialEq for OrderedMap<K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
    // IndexMap equality ignores order
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrderedMap<String, u32> {
        let mut map = OrderedMap::new();
        map.insert("b".to_string(), 2);
        map.insert("a".to_string(), 1);
        map.insert("c".to_string(), 3);
        map
    }

    fn keys(map: &OrderedMap<String, u32>) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn insert_preserves_insertion_order() {
        let map = sample();
        assert_eq!(keys(&map), vec!["b", "a", "c"]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn update_keeps_position() {
        let mut map = sample();
        assert_eq!(map.insert("a".to_string(), 10), Some(1));
        assert_eq!(keys(&map), vec!["b", "a", "c"]);
        assert_eq!(map.get(&"a".to_string()), Some(&10));
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut map = sample();
        assert_eq!(map.remove(&"a".to_string()), Some(1));
        assert_eq!(keys(&map), vec!["b", "c"]);
        assert_eq!(map.remove(&"missing".to_string()), None);
    }

    #[test]
    fn positional_inserts() {
        let mut map = sample();
        map.insert_at_index(0, "z".to_string(), 26).unwrap();
        map.insert_after(&"a".to_string(), "x".to_string(), 24).unwrap();
        map.insert_before(&"c".to_string(), "y".to_string(), 25).unwrap();
        assert_eq!(keys(&map), vec!["z", "b", "a", "x", "y", "c"]);
    }

    #[test]
    fn positional_insert_errors() {
        let mut map = sample();
        assert_eq!(
            map.insert_at_index(0, "a".to_string(), 0),
            Err(MapError::DuplicateKey("a".to_string()))
        );
        assert_eq!(
            map.insert_at_index(5, "q".to_string(), 0),
            Err(MapError::IndexOutOfBounds { index: 5, len: 3 })
        );
        assert_eq!(
            map.insert_after(&"nope".to_string(), "q".to_string(), 0),
            Err(MapError::KeyNotFound("nope".to_string()))
        );
        // Failed inserts leave the map untouched
        assert_eq!(keys(&map), vec!["b", "a", "c"]);
    }

    #[test]
    fn positions_follow_removals() {
        let mut map = sample();
        map.remove(&"b".to_string());
        map.insert_after(&"a".to_string(), "x".to_string(), 24).unwrap();
        map.insert_at_index(3, "z".to_string(), 26).unwrap();
        assert_eq!(keys(&map), vec!["a", "x", "c", "z"]);
        assert_eq!(
            map.insert_at_index(5, "q".to_string(), 0),
            Err(MapError::IndexOutOfBounds { index: 5, len: 4 })
        );
    }

    #[test]
    fn get_required_reports_missing_key() {
        let map = sample();
        assert_eq!(map.get_required(&"c".to_string()), Ok(&3));
        assert!(map.get_required(&"d".to_string()).is_err());
    }

    #[test]
    fn sort_and_retain() {
        let mut map = sample();
        map.sort_by(|(a, _), (b, _)| a.cmp(b));
        assert_eq!(keys(&map), vec!["a", "b", "c"]);
        map.retain(|_, v| *v != 2);
        assert_eq!(keys(&map), vec!["a", "c"]);
        let values: Vec<u32> = map.values().copied().collect();
        assert_eq!(values, vec![1, 3]);
    }

    #[test]
    fn equality_depends_on_order() {
        let mut left = OrderedMap::new();
        left.insert("a".to_string(), 1);
        left.insert("b".to_string(), 2);
        let mut right = OrderedMap::new();
        right.insert("b".to_string(), 2);
        right.insert("a".to_string(), 1);
        assert_ne!(left, right);
        right.sort_by(|(a, _), (b, _)| a.cmp(b));
        assert_eq!(left, right);
    }

    #[test]
    fn clear_empties_map() {
        let mut map = sample();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
    }
}
