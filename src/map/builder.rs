//! The transient counterpart of [`HashTrieMap`].

use std::fmt;

use crate::error::Error;

use super::comparer::{DefaultComparer, KeyComparer, ValueComparer};
use super::node::{self, Applied, Policy};
use super::{HashTrieMap, Iter, Keys, Values};

/// A mutable map sharing its trie with the frozen [`HashTrieMap`]s it came
/// from or handed out.
///
/// Writes edit nodes in place when the builder is their only owner and copy
/// them on first touch otherwise. [`Builder::freeze`] hands out a frozen
/// snapshot in constant time; the builder stays usable and its later writes
/// never disturb the snapshot.
///
/// # Examples
///
/// ```rust
/// # use widetrie::MapBuilder;
/// let mut b: MapBuilder<&str, i32> = MapBuilder::new();
/// b.insert("one", 1);
/// b.insert("two", 2);
/// let frozen = b.freeze();
/// b.remove(&"one");
/// assert_eq!(frozen.len(), 2);
/// assert_eq!(b.len(), 1);
/// ```
pub struct Builder<K, V, KC = DefaultComparer, VC = DefaultComparer> {
    map: HashTrieMap<K, V, KC, VC>,
    // The last frozen snapshot, if nothing was mutated since. Holding it
    // keeps shared nodes' reference counts above one, so the next write
    // copies its path instead of editing nodes the snapshot references.
    frozen: Option<HashTrieMap<K, V, KC, VC>>,
}

impl<K, V, KC: Default, VC: Default> Builder<K, V, KC, VC> {
    /// An empty builder with default comparers.
    pub fn new() -> Self {
        Builder {
            map: HashTrieMap::new(),
            frozen: None,
        }
    }
}

impl<K, V, KC: Default, VC: Default> Default for Builder<K, V, KC, VC> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, KC, VC> Builder<K, V, KC, VC> {
    /// An empty builder with an explicit comparer pair.
    pub fn with_comparers(key_cmp: KC, value_cmp: VC) -> Self {
        Builder {
            map: HashTrieMap::with_comparers(key_cmp, value_cmp),
            frozen: None,
        }
    }

    pub(crate) fn from_map(map: HashTrieMap<K, V, KC, VC>) -> Self
    where
        KC: Clone,
        VC: Clone,
    {
        Builder {
            frozen: Some(map.clone()),
            map,
        }
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// An iterator over `(&K, &V)` entries. Iterating borrows the builder,
    /// so mutating while iterating is a compile error.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.map.iter()
    }

    /// An iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        self.map.keys()
    }

    /// An iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        self.map.values()
    }

    fn edit(&mut self) -> &mut HashTrieMap<K, V, KC, VC> {
        self.frozen = None;
        &mut self.map
    }
}

impl<K, V, KC: KeyComparer<K>, VC> Builder<K, V, KC, VC> {
    /// The value stored for `key`, or `None`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Whether `key` is bound.
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }
}

impl<K, V, KC, VC> Builder<K, V, KC, VC>
where
    K: Clone,
    V: Clone,
    KC: KeyComparer<K> + Clone,
    VC: ValueComparer<V> + Clone,
{
    /// Bind `key` to `value`, returning the previous value if the key was
    /// already bound.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let map = self.edit();
        let hash = map.key_cmp.hash(&key);
        let result = node::update_root(
            &mut map.root,
            &map.key_cmp,
            &map.value_cmp,
            Policy::Overwrite,
            hash,
            key,
            value,
        );
        match result {
            Ok(Applied::Added) => {
                map.len += 1;
                None
            }
            Ok(Applied::Replaced(old)) => Some(old),
            Ok(Applied::Unchanged) | Err(_) => unreachable!("overwrite policies never reject"),
        }
    }

    /// Strict insert: an existing binding of `key` to a different value
    /// (under the value comparer) is an [`Error::DuplicateKey`] and leaves
    /// the builder unchanged.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(), Error>
    where
        K: fmt::Debug,
    {
        let map = self.edit();
        let hash = map.key_cmp.hash(&key);
        let result = node::update_root(
            &mut map.root,
            &map.key_cmp,
            &map.value_cmp,
            Policy::FailIfDifferent,
            hash,
            key,
            value,
        );
        match result {
            Ok(Applied::Added) => {
                map.len += 1;
                Ok(())
            }
            Ok(Applied::Unchanged) => Ok(()),
            Ok(Applied::Replaced(_)) => unreachable!("strict policies never overwrite"),
            Err(r) => Err(Error::DuplicateKey(format!("{:?}", r.key))),
        }
    }

    /// Unbind `key`, returning its value if it was bound.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let map = self.edit();
        let hash = map.key_cmp.hash(key);
        let (_, value) = node::remove_root(&mut map.root, &map.key_cmp, hash, key)?;
        map.len -= 1;
        Some(value)
    }

    /// Unbind every key in `keys`.
    pub fn remove_all<'a, I: IntoIterator<Item = &'a K>>(&mut self, keys: I)
    where
        K: 'a,
    {
        for key in keys {
            self.remove(key);
        }
    }

    /// Remove every entry, keeping the comparer pair.
    pub fn clear(&mut self) {
        let map = self.edit();
        map.root = None;
        map.len = 0;
    }

    /// Replace the key comparer. Key hashes change, so the trie is rebuilt;
    /// keys the new comparer identifies must hold equal values (under the
    /// value comparer) or the rebuild fails with [`Error::DuplicateKey`],
    /// leaving the builder unchanged.
    pub fn set_key_comparer(&mut self, key_cmp: KC) -> Result<(), Error>
    where
        K: fmt::Debug,
    {
        let mut root = None;
        let mut len = 0;
        for (k, v) in self.map.iter() {
            let hash = key_cmp.hash(k);
            match node::update_root(
                &mut root,
                &key_cmp,
                &self.map.value_cmp,
                Policy::FailIfDifferent,
                hash,
                k.clone(),
                v.clone(),
            ) {
                Ok(Applied::Added) => len += 1,
                Ok(_) => {}
                Err(r) => return Err(Error::DuplicateKey(format!("{:?}", r.key))),
            }
        }
        let map = self.edit();
        map.root = root;
        map.len = len;
        map.key_cmp = key_cmp;
        Ok(())
    }

    /// Replace the value comparer. The trie's shape does not depend on it,
    /// so nothing is rebuilt.
    pub fn set_value_comparer(&mut self, value_cmp: VC) {
        self.edit().value_cmp = value_cmp;
    }

    /// Hand out a frozen snapshot of the current contents.
    ///
    /// Runs in `O(1)`: no tree walk, no copying. Freezing twice without a
    /// mutation in between returns a snapshot sharing the same root.
    pub fn freeze(&mut self) -> HashTrieMap<K, V, KC, VC> {
        match &self.frozen {
            Some(m) => m.clone(),
            None => {
                let m = self.map.clone();
                self.frozen = Some(m.clone());
                m
            }
        }
    }
}

impl<K, V, KC, VC> Extend<(K, V)> for Builder<K, V, KC, VC>
where
    K: Clone,
    V: Clone,
    KC: KeyComparer<K> + Clone,
    VC: ValueComparer<V> + Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, KC, VC> fmt::Debug for Builder<K, V, KC, VC> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
