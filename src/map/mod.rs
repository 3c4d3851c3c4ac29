//! A persistent unordered map backed by a hash array mapped trie.
//!
//! Keys route through 5-bit slices of their 32-bit hash, so the trie is at
//! most seven levels deep and lookups, inserts and removals are
//! `O(log₃₂ n)`. Sparse branches compress their children behind a bitmap;
//! branches past half occupancy switch to a dense 32-slot layout, and
//! switch back once removals thin them out. Keys whose full hashes collide
//! share a collision list.

mod builder;
mod comparer;
mod node;

use std::fmt;
use std::iter::FusedIterator;
use std::rc::Rc;

use imbl_sized_chunks::sparse_chunk;

use crate::error::Error;

pub use builder::Builder;
pub use comparer::{DefaultComparer, KeyComparer, ValueComparer};

use node::{update_root, Applied, Node, Policy, HASH_WIDTH};

/// A persistent key-value map with structural sharing.
///
/// All operations take `&self` and return a new map sharing unchanged
/// nodes; clones are cheap. Bulk edits go through [`Builder`], which edits
/// uniquely-owned nodes in place and freezes back in constant time.
///
/// A map carries a comparer pair fixed at construction: a [`KeyComparer`]
/// (hash and key equality — the shape of the trie depends on it) and a
/// [`ValueComparer`] (used by [`HashTrieMap::contains_value`] and the
/// strict-insert policies). [`DefaultComparer`] gives standard
/// `Hash`/`PartialEq` semantics.
///
/// # Examples
///
/// ```rust
/// # use widetrie::HashTrieMap;
/// let m: HashTrieMap<&str, i32> = HashTrieMap::new();
/// let m = m.insert("one", 1).insert("two", 2);
/// assert_eq!(m.get(&"one"), Some(&1));
/// assert_eq!(m.remove(&"one").len(), 1);
/// assert_eq!(m.len(), 2);
/// ```
pub struct HashTrieMap<K, V, KC = DefaultComparer, VC = DefaultComparer> {
    len: usize,
    root: Option<Rc<Node<K, V>>>,
    key_cmp: KC,
    value_cmp: VC,
}

impl<K, V, KC: Clone, VC: Clone> Clone for HashTrieMap<K, V, KC, VC> {
    fn clone(&self) -> Self {
        HashTrieMap {
            len: self.len,
            root: self.root.clone(),
            key_cmp: self.key_cmp.clone(),
            value_cmp: self.value_cmp.clone(),
        }
    }
}

impl<K, V, KC: Default, VC: Default> HashTrieMap<K, V, KC, VC> {
    /// The empty map with default comparers.
    pub fn new() -> Self {
        HashTrieMap {
            len: 0,
            root: None,
            key_cmp: KC::default(),
            value_cmp: VC::default(),
        }
    }
}

impl<K, V, KC, VC> HashTrieMap<K, V, KC, VC> {
    /// The empty map with an explicit comparer pair.
    pub fn with_comparers(key_cmp: KC, value_cmp: VC) -> Self {
        HashTrieMap {
            len: 0,
            root: None,
            key_cmp,
            value_cmp,
        }
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// An iterator over `(&K, &V)` entries, in an unspecified order that is
    /// stable for a given map value.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.root.as_ref(), self.len)
    }

    /// An iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// An iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Verify the structural invariants. Test support.
    pub fn check_invariants(&self) {
        let count = self.root.as_ref().map_or(0, |root| root.check_invariants(0));
        assert_eq!(count, self.len);
    }
}

impl<K, V, KC: KeyComparer<K>, VC> HashTrieMap<K, V, KC, VC> {
    /// The value stored for `key`, or `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use widetrie::HashTrieMap;
    /// let m: HashTrieMap<&str, i32> = HashTrieMap::new().insert("a", 1);
    /// assert_eq!(m.get(&"a"), Some(&1));
    /// assert_eq!(m.get(&"b"), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// The stored entry for `key`: both the canonical stored key (which may
    /// differ from the argument under a coarse key comparer) and the value.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let root = self.root.as_ref()?;
        root.get(&self.key_cmp, 0, self.key_cmp.hash(key), key)
    }

    /// Whether `key` is bound.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get_key_value(key).is_some()
    }

    /// Whether some entry holds `value` under the value comparer. `O(n)`.
    pub fn contains_value(&self, value: &V) -> bool
    where
        VC: ValueComparer<V>,
    {
        self.values().any(|v| self.value_cmp.eq(v, value))
    }
}

impl<K, V, KC, VC> HashTrieMap<K, V, KC, VC>
where
    K: Clone,
    V: Clone,
    KC: KeyComparer<K> + Clone,
    VC: ValueComparer<V> + Clone,
{
    fn updated(&self, policy: Policy, key: K, value: V) -> Result<Self, node::Rejected<K, V>> {
        let hash = self.key_cmp.hash(&key);
        let mut map = self.clone();
        match update_root(
            &mut map.root,
            &self.key_cmp,
            &self.value_cmp,
            policy,
            hash,
            key,
            value,
        )? {
            Applied::Added => {
                map.len += 1;
                Ok(map)
            }
            Applied::Replaced(_) => Ok(map),
            // Keep structural identity on no-ops: hand back the original
            // instead of the (content-identical) path copy.
            Applied::Unchanged => Ok(self.clone()),
        }
    }

    /// Returns a map with `key` bound to `value`, replacing any previous
    /// binding. Binding a key to a value it already holds (under the value
    /// comparer) returns a map sharing the original root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use widetrie::HashTrieMap;
    /// let m: HashTrieMap<&str, i32> = HashTrieMap::new().insert("a", 1);
    /// assert_eq!(m.insert("a", 2).get(&"a"), Some(&2));
    /// ```
    pub fn insert(&self, key: K, value: V) -> Self {
        match self.updated(Policy::OverwriteIfDifferent, key, value) {
            Ok(map) => map,
            Err(_) => unreachable!("overwrite policies never reject"),
        }
    }

    /// Returns a map with `key` bound to `value` only if `key` was absent.
    pub fn insert_if_absent(&self, key: K, value: V) -> Self {
        match self.updated(Policy::Keep, key, value) {
            Ok(map) => map,
            Err(_) => unreachable!("the keep policy never rejects"),
        }
    }

    /// Strict insert: binds `key` to `value`, but an existing binding of
    /// `key` to a *different* value (under the value comparer) is an
    /// [`Error::DuplicateKey`]. Re-adding an identical entry is a no-op.
    pub fn try_insert(&self, key: K, value: V) -> Result<Self, Error>
    where
        K: fmt::Debug,
    {
        self.updated(Policy::FailIfDifferent, key, value)
            .map_err(|r| Error::DuplicateKey(format!("{:?}", r.key)))
    }

    /// Returns a map without `key`. Removing an absent key returns a map
    /// sharing the original root.
    pub fn remove(&self, key: &K) -> Self {
        let hash = self.key_cmp.hash(key);
        let mut map = self.clone();
        match node::remove_root(&mut map.root, &self.key_cmp, hash, key) {
            Some(_) => {
                map.len -= 1;
                map
            }
            None => self.clone(),
        }
    }

    /// Returns a map with every pair from `pairs` bound, replacing existing
    /// bindings.
    pub fn insert_all<I: IntoIterator<Item = (K, V)>>(&self, pairs: I) -> Self {
        let mut b = self.builder();
        b.extend(pairs);
        b.freeze()
    }

    /// Strict bulk insert; see [`HashTrieMap::try_insert`].
    pub fn try_insert_all<I: IntoIterator<Item = (K, V)>>(&self, pairs: I) -> Result<Self, Error>
    where
        K: fmt::Debug,
    {
        let mut b = self.builder();
        for (k, v) in pairs {
            b.try_insert(k, v)?;
        }
        Ok(b.freeze())
    }

    /// Returns a map without any of `keys`.
    pub fn remove_all<'a, I: IntoIterator<Item = &'a K>>(&self, keys: I) -> Self
    where
        K: 'a,
    {
        let mut b = self.builder();
        for k in keys {
            b.remove(k);
        }
        b.freeze()
    }

    /// Returns a map with the same entries under a different key comparer.
    ///
    /// Key hashes change, so the whole trie is rebuilt. If the new comparer
    /// identifies keys that were distinct and their values differ under the
    /// value comparer, the rebuild fails with [`Error::DuplicateKey`]
    /// naming one of the conflicting keys; equal-valued duplicates collapse
    /// to the first-seen entry.
    pub fn with_key_comparer<KC2>(&self, key_cmp: KC2) -> Result<HashTrieMap<K, V, KC2, VC>, Error>
    where
        KC2: KeyComparer<K> + Clone,
        K: fmt::Debug,
    {
        let mut root = None;
        let mut len = 0;
        for (k, v) in self.iter() {
            let hash = key_cmp.hash(k);
            match update_root(
                &mut root,
                &key_cmp,
                &self.value_cmp,
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
        Ok(HashTrieMap {
            len,
            root,
            key_cmp,
            value_cmp: self.value_cmp.clone(),
        })
    }

    /// Returns a map with the same entries under a different value
    /// comparer. The trie's shape only depends on key hashes, so the root
    /// is shared as-is.
    pub fn with_value_comparer<VC2: ValueComparer<V>>(
        &self,
        value_cmp: VC2,
    ) -> HashTrieMap<K, V, KC, VC2> {
        HashTrieMap {
            len: self.len,
            root: self.root.clone(),
            key_cmp: self.key_cmp.clone(),
            value_cmp,
        }
    }

    /// The empty map with the same comparer pair.
    pub fn clear(&self) -> Self {
        HashTrieMap {
            len: 0,
            root: None,
            key_cmp: self.key_cmp.clone(),
            value_cmp: self.value_cmp.clone(),
        }
    }

    /// A transient builder seeded with this map's contents. Until the first
    /// mutation, freezing it returns this very map.
    pub fn builder(&self) -> Builder<K, V, KC, VC> {
        Builder::from_map(self.clone())
    }
}

impl<K, V, KC, VC> HashTrieMap<K, V, KC, VC>
where
    K: Clone + fmt::Debug,
    V: Clone,
    KC: KeyComparer<K> + Default + Clone,
    VC: ValueComparer<V> + Default + Clone,
{
    /// Build a map from pairs whose keys must all be distinct; any
    /// duplicate key is an [`Error::DuplicateKey`], even with an equal
    /// value.
    pub fn try_from_unique_pairs<I: IntoIterator<Item = (K, V)>>(pairs: I) -> Result<Self, Error> {
        let mut map = HashTrieMap::with_comparers(KC::default(), VC::default());
        for (k, v) in pairs {
            map = map
                .updated(Policy::Fail, k, v)
                .map_err(|r| Error::DuplicateKey(format!("{:?}", r.key)))?;
        }
        Ok(map)
    }
}

impl<K, V, KC: Default, VC: Default> Default for HashTrieMap<K, V, KC, VC> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, KC, VC> FromIterator<(K, V)> for HashTrieMap<K, V, KC, VC>
where
    K: Clone,
    V: Clone,
    KC: KeyComparer<K> + Default + Clone,
    VC: ValueComparer<V> + Default + Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut b = Builder::with_comparers(KC::default(), VC::default());
        b.extend(iter);
        b.freeze()
    }
}

impl<K, V, KC, VC> std::ops::Index<&K> for HashTrieMap<K, V, KC, VC>
where
    K: fmt::Debug,
    KC: KeyComparer<K>,
{
    type Output = V;

    fn index(&self, key: &K) -> &Self::Output {
        match self.get(key) {
            Some(v) => v,
            None => panic!("key not found: {key:?}"),
        }
    }
}

impl<K, V, KC, VC> PartialEq for HashTrieMap<K, V, KC, VC>
where
    V: PartialEq,
    KC: KeyComparer<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .iter()
                .all(|(k, v)| other.get_key_value(k).is_some_and(|(_, w)| v == w))
    }
}

impl<K, V, KC, VC> Eq for HashTrieMap<K, V, KC, VC>
where
    V: Eq,
    KC: KeyComparer<K>,
{
}

impl<K: fmt::Debug, V: fmt::Debug, KC, VC> fmt::Debug for HashTrieMap<K, V, KC, VC> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, KC, VC> serde::Serialize for HashTrieMap<K, V, KC, VC>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.len))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, K, V, KC, VC> serde::Deserialize<'de> for HashTrieMap<K, V, KC, VC>
where
    K: Clone + serde::Deserialize<'de>,
    V: Clone + serde::Deserialize<'de>,
    KC: KeyComparer<K> + Default + Clone,
    VC: ValueComparer<V> + Default + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use std::marker::PhantomData;

        struct MapVisitor<K, V, KC, VC>(PhantomData<(K, V, KC, VC)>);

        impl<'de, K, V, KC, VC> serde::de::Visitor<'de> for MapVisitor<K, V, KC, VC>
        where
            K: Clone + serde::Deserialize<'de>,
            V: Clone + serde::Deserialize<'de>,
            KC: KeyComparer<K> + Default + Clone,
            VC: ValueComparer<V> + Default + Clone,
        {
            type Value = HashTrieMap<K, V, KC, VC>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut b = Builder::with_comparers(KC::default(), VC::default());
                while let Some((k, v)) = access.next_entry()? {
                    b.insert(k, v);
                }
                Ok(b.freeze())
            }
        }

        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}

enum Cursor<'a, K, V> {
    Dense(std::slice::Iter<'a, Rc<Node<K, V>>>),
    Sparse(sparse_chunk::Iter<'a, Rc<Node<K, V>>, HASH_WIDTH>),
}

/// A depth-first walk over the trie. The order is deterministic for a given
/// tree shape but unspecified across structurally different maps.
pub struct Iter<'a, K, V> {
    stack: Vec<Cursor<'a, K, V>>,
    collision: std::slice::Iter<'a, (K, V)>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn new(root: Option<&'a Rc<Node<K, V>>>, len: usize) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = root {
            stack.push(Cursor::Dense(std::slice::from_ref(root).iter()));
        }
        Iter {
            stack,
            collision: [].iter(),
            remaining: len,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((k, v)) = self.collision.next() {
                self.remaining -= 1;
                return Some((k, v));
            }
            let cursor = self.stack.last_mut()?;
            let child = match cursor {
                Cursor::Dense(iter) => iter.next(),
                Cursor::Sparse(iter) => iter.next(),
            };
            match child.map(|rc| &**rc) {
                None => {
                    self.stack.pop();
                }
                Some(Node::Value { key, value, .. }) => {
                    self.remaining -= 1;
                    return Some((key, value));
                }
                Some(Node::Bitmap { children, .. }) => {
                    self.stack.push(Cursor::Dense(children.iter()));
                }
                Some(Node::Array { children }) => {
                    self.stack.push(Cursor::Sparse(children.iter()));
                }
                Some(Node::Collision { entries, .. }) => {
                    self.collision = entries.iter();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}
impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

impl<'a, K, V, KC, VC> IntoIterator for &'a HashTrieMap<K, V, KC, VC> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// See [`HashTrieMap::keys`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> ExactSizeIterator for Keys<'a, K, V> {}

/// See [`HashTrieMap::values`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> ExactSizeIterator for Values<'a, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hashes every key to the same bucket, forcing collision lists.
    #[derive(Clone, Copy, Default)]
    struct ConstantHash;

    impl<K: Eq> KeyComparer<K> for ConstantHash {
        fn hash(&self, _key: &K) -> u32 {
            42
        }

        fn eq(&self, a: &K, b: &K) -> bool {
            a == b
        }
    }

    /// ASCII-case-insensitive string keys.
    #[derive(Clone, Copy, Default)]
    struct CaseInsensitive;

    impl KeyComparer<String> for CaseInsensitive {
        fn hash(&self, key: &String) -> u32 {
            DefaultComparer.hash(&key.to_ascii_lowercase())
        }

        fn eq(&self, a: &String, b: &String) -> bool {
            a.eq_ignore_ascii_case(b)
        }
    }

    fn count_array_nodes<K, V>(node: &Node<K, V>) -> usize {
        match node {
            Node::Value { .. } | Node::Collision { .. } => 0,
            Node::Bitmap { children, .. } => children.iter().map(|c| count_array_nodes(c)).sum(),
            Node::Array { children } => {
                1 + children.iter().map(|c| count_array_nodes(c)).sum::<usize>()
            }
        }
    }

    #[test]
    fn insert_lookup_remove() {
        let mut map: HashTrieMap<u32, u32> = HashTrieMap::new();
        for i in 0..500 {
            map = map.insert(i, i * 10);
            map.check_invariants();
        }
        assert_eq!(map.len(), 500);
        for i in 0..500 {
            assert_eq!(map.get(&i), Some(&(i * 10)));
        }
        assert_eq!(map.get(&500), None);
        assert!(!map.contains_key(&501));
        assert!(map.contains_value(&40));
        assert!(!map.contains_value(&41));

        for i in 0..500 {
            map = map.remove(&i);
            map.check_invariants();
        }
        assert!(map.is_empty());
    }

    #[test]
    fn persistent_versions_are_isolated() {
        let base: HashTrieMap<u32, u32> = (0..100).map(|i| (i, i)).collect();
        let with = base.insert(100, 100);
        let without = base.remove(&50);
        assert_eq!(base.len(), 100);
        assert_eq!(with.len(), 101);
        assert_eq!(without.len(), 99);
        assert_eq!(base.get(&50), Some(&50));
        assert_eq!(without.get(&50), None);
        assert_eq!(base.get(&100), None);
    }

    #[test]
    fn noop_updates_share_the_root() {
        let map: HashTrieMap<u32, u32> = (0..100).map(|i| (i, i)).collect();
        let same = map.insert(7, 7);
        assert!(super::tests_support::same_root(&map, &same));
        let same = map.remove(&1000);
        assert!(super::tests_support::same_root(&map, &same));
        let same = map.insert_if_absent(7, 999);
        assert!(super::tests_support::same_root(&map, &same));
        let changed = map.insert(7, 8);
        assert!(!super::tests_support::same_root(&map, &changed));
    }

    #[test]
    fn strict_insert() {
        let map: HashTrieMap<u32, u32> = HashTrieMap::new().insert(1, 10);
        // Same key and value: a no-op.
        let same = map.try_insert(1, 10).unwrap();
        assert!(super::tests_support::same_root(&map, &same));
        // Same key, different value: an error naming the key.
        match map.try_insert(1, 11) {
            Err(Error::DuplicateKey(msg)) => assert!(msg.contains('1')),
            other => panic!("expected a duplicate-key error, got {other:?}"),
        }
    }

    #[test]
    fn grow_to_array_and_pack_back() {
        let mut map: HashTrieMap<u32, u32> = HashTrieMap::new();
        for i in 0..2000 {
            map = map.insert(i, i);
        }
        map.check_invariants();
        assert_eq!(map.len(), 2000);
        let root = map.root.as_ref().unwrap();
        assert!(
            count_array_nodes(root) > 0,
            "2000 entries must push some branch past the dense threshold"
        );

        for i in 0..1000 {
            map = map.remove(&i);
        }
        map.check_invariants();
        assert_eq!(map.len(), 1000);
        for i in 1000..2000 {
            assert_eq!(map.get(&i), Some(&i));
        }

        // A dense branch holds more than 8 children by construction, so
        // with 5 survivors none can remain.
        let mut packed = map.clone();
        for i in 1000..1995 {
            packed = packed.remove(&i);
        }
        packed.check_invariants();
        assert_eq!(packed.len(), 5);
        let root = packed.root.as_ref().unwrap();
        assert_eq!(
            count_array_nodes(root),
            0,
            "thinned-out branches must pack back into bitmap nodes"
        );
    }

    #[test]
    fn collision_paths() {
        let mut map = HashTrieMap::with_comparers(ConstantHash, DefaultComparer);
        for i in 0..100u32 {
            map = map.insert(i, i * 2);
        }
        map.check_invariants();
        assert_eq!(map.len(), 100);
        for i in 0..100 {
            assert_eq!(map.get(&i), Some(&(i * 2)));
        }
        assert_eq!(map.get(&100), None);

        for i in 0..99 {
            map = map.remove(&i);
            map.check_invariants();
        }
        assert_eq!(map.len(), 1);
        // A single survivor collapses the collision list to a plain value.
        assert!(matches!(
            map.root.as_deref(),
            Some(Node::Value { value: 198, .. })
        ));
        assert_eq!(map.get(&99), Some(&198));
    }

    #[test]
    fn case_insensitive_rebinding_merges() {
        let map: HashTrieMap<String, String> = HashTrieMap::new()
            .insert("Johnny".to_owned(), "Appleseed".to_owned())
            .insert("JOHNNY".to_owned(), "Appleseed".to_owned());
        assert_eq!(map.len(), 2);

        let folded = map.with_key_comparer(CaseInsensitive).unwrap();
        assert_eq!(folded.len(), 1);
        assert_eq!(
            folded.get(&"Johnny".to_owned()).map(String::as_str),
            Some("Appleseed")
        );
        assert_eq!(
            folded.get(&"johnny".to_owned()).map(String::as_str),
            Some("Appleseed")
        );
    }

    #[test]
    fn case_insensitive_rebinding_conflict() {
        let map: HashTrieMap<String, String> = HashTrieMap::new()
            .insert("Johnny".to_owned(), "1".to_owned())
            .insert("JOHNNY".to_owned(), "2".to_owned());
        match map.with_key_comparer(CaseInsensitive) {
            Err(Error::DuplicateKey(msg)) => {
                assert!(msg.to_ascii_lowercase().contains("johnny"));
            }
            other => panic!("expected a duplicate-key error, got {other:?}"),
        }
    }

    #[test]
    fn value_comparer_swap_shares_the_root() {
        #[derive(Clone, Copy, Default)]
        struct AlwaysEqual;
        impl<V> ValueComparer<V> for AlwaysEqual {
            fn eq(&self, _: &V, _: &V) -> bool {
                true
            }
        }

        let map: HashTrieMap<u32, u32> = (0..100).map(|i| (i, i)).collect();
        let swapped = map.with_value_comparer(AlwaysEqual);
        let (Some(a), Some(b)) = (&map.root, &swapped.root) else {
            panic!("both maps should have roots");
        };
        assert!(Rc::ptr_eq(a, b));
        // Under the new comparer every insert of an existing key no-ops.
        let same = swapped.insert(5, 1234);
        assert_eq!(same.get(&5), Some(&5));
    }

    #[test]
    fn round_trip_yields_each_entry_once() {
        use std::collections::HashMap;

        let map: HashTrieMap<u32, u32> = (0..1000).map(|i| (i, i * 3)).collect();
        let mut seen: HashMap<u32, u32> = HashMap::new();
        for (k, v) in map.iter() {
            assert!(seen.insert(*k, *v).is_none(), "entry yielded twice");
        }
        assert_eq!(seen.len(), 1000);
        for i in 0..1000 {
            assert_eq!(seen.get(&i), Some(&(i * 3)));
        }
        assert_eq!(map.iter().len(), 1000);
        assert_eq!(map.keys().count(), 1000);
        assert_eq!(map.values().count(), 1000);
    }

    #[test]
    fn unique_pairs_constructor() {
        let map: HashTrieMap<u32, u32> =
            HashTrieMap::try_from_unique_pairs([(1, 1), (2, 2)]).unwrap();
        assert_eq!(map.len(), 2);
        assert!(matches!(
            HashTrieMap::<u32, u32>::try_from_unique_pairs([(1, 1), (1, 1)]),
            Err(Error::DuplicateKey(_))
        ));
    }

    #[test]
    fn index_and_equality() {
        let map: HashTrieMap<u32, u32> = (0..10).map(|i| (i, i)).collect();
        assert_eq!(map[&3], 3);
        let other: HashTrieMap<u32, u32> = (0..10).rev().map(|i| (i, i)).collect();
        assert_eq!(map, other);
        assert_ne!(map, other.insert(3, 4));
        assert_ne!(map, other.remove(&3));
    }

    #[test]
    fn serde_round_trip() {
        let map: HashTrieMap<String, u32> = (0..50).map(|i| (format!("k{i}"), i)).collect();
        let json = serde_json::to_string(&map).unwrap();
        let back: HashTrieMap<String, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(map, back);
    }
}
