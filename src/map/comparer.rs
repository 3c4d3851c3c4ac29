//! The comparer pair carried by a map: key equality-plus-hash and value
//! equality.
//!
//! A map's shape depends only on key hashes, so swapping the value comparer
//! reuses the whole trie, while swapping the key comparer forces a rebuild.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Decides when two keys are the same and how keys hash. The two must
/// agree: keys that compare equal must hash equally.
pub trait KeyComparer<K> {
    fn hash(&self, key: &K) -> u32;
    fn eq(&self, a: &K, b: &K) -> bool;
}

/// Decides when two values are the same; used by `contains_value` and by
/// the strict-insert policies.
pub trait ValueComparer<V> {
    fn eq(&self, a: &V, b: &V) -> bool;
}

/// The standard-library semantics: [`Hash`] for key hashes, [`PartialEq`]
/// for key and value equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultComparer;

impl<K: Hash + Eq> KeyComparer<K> for DefaultComparer {
    fn hash(&self, key: &K) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as u32
    }

    fn eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

impl<V: PartialEq> ValueComparer<V> for DefaultComparer {
    fn eq(&self, a: &V, b: &V) -> bool {
        a == b
    }
}
