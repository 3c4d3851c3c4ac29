//! Node algebra for the hash array mapped trie.
//!
//! Four node shapes, dispatched by variant:
//!
//! - `Value` — exactly one entry, with its cached 32-bit key hash.
//! - `Bitmap` — a sparse branch: bit `i` of the bitmap says whether slot `i`
//!   is occupied, and the occupied slots are packed densely into `children`
//!   in slot order, located by popcount.
//! - `Array` — a dense 32-slot branch, used once a `Bitmap` would outgrow
//!   half its width.
//! - `Collision` — entries whose full hashes are equal but whose keys are
//!   not.
//!
//! A branch at `shift` routes on bits `[shift, shift + 5)` of the hash.
//! Writes go through [`Rc::make_mut`], so a builder edits its own nodes in
//! place while anything shared with a frozen map is copied on the way down.

use std::mem;
use std::rc::Rc;

use imbl_sized_chunks::sparse_chunk::SparseChunk;

use super::comparer::{KeyComparer, ValueComparer};

pub(crate) const HASH_BITS: u32 = 5;
pub(crate) const HASH_WIDTH: usize = 1 << HASH_BITS;

/// A `Bitmap` asked to grow past this many children expands into an
/// `Array`.
const EXPAND_AT: usize = HASH_WIDTH / 2;
/// An `Array` dropping to this many children packs back into a `Bitmap`.
const PACK_AT: usize = HASH_WIDTH / 4;

fn mask(hash: u32, shift: u32) -> usize {
    ((hash >> shift) as usize) & (HASH_WIDTH - 1)
}

fn bitpos(hash: u32, shift: u32) -> u32 {
    1 << mask(hash, shift)
}

/// Where a slot's child sits in the dense array: the number of occupied
/// slots below it.
fn dense_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

#[derive(Clone)]
pub(crate) enum Node<K, V> {
    Value {
        hash: u32,
        key: K,
        value: V,
    },
    Bitmap {
        bitmap: u32,
        children: Vec<Rc<Node<K, V>>>,
    },
    Array {
        children: SparseChunk<Rc<Node<K, V>>, HASH_WIDTH>,
    },
    Collision {
        hash: u32,
        entries: Vec<(K, V)>,
    },
}

/// What happens when a key being inserted is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Policy {
    /// Replace the value unconditionally.
    Overwrite,
    /// Replace the value, but report no change when the stored value
    /// already compares equal.
    OverwriteIfDifferent,
    /// Keep the stored value.
    Keep,
    /// Keep the stored value when equal, reject otherwise.
    FailIfDifferent,
    /// Reject unconditionally.
    Fail,
}

/// The outcome of an accepted update.
pub(crate) enum Applied<V> {
    /// A new entry went in; the map grew by one.
    Added,
    /// An existing entry's value was overwritten; here is the old one.
    Replaced(V),
    /// Nothing needed to change.
    Unchanged,
}

/// An update the policy refused; hands the offending pair back.
pub(crate) struct Rejected<K, V> {
    pub(crate) key: K,
    #[allow(dead_code)]
    pub(crate) value: V,
}

/// The outcome of a removal.
pub(crate) enum Removed<K, V> {
    NotFound,
    /// The entry is out; the node rearranged itself.
    Done((K, V)),
    /// The entry is out and this node is now empty; the caller must drop
    /// its slot.
    Emptied((K, V)),
}

fn apply_policy<K, V, VC: ValueComparer<V>>(
    policy: Policy,
    vc: &VC,
    slot: &mut V,
    key: K,
    value: V,
) -> Result<Applied<V>, Rejected<K, V>> {
    match policy {
        Policy::Overwrite => Ok(Applied::Replaced(mem::replace(slot, value))),
        Policy::OverwriteIfDifferent => {
            if vc.eq(slot, &value) {
                Ok(Applied::Unchanged)
            } else {
                Ok(Applied::Replaced(mem::replace(slot, value)))
            }
        }
        Policy::Keep => Ok(Applied::Unchanged),
        Policy::FailIfDifferent => {
            if vc.eq(slot, &value) {
                Ok(Applied::Unchanged)
            } else {
                Err(Rejected { key, value })
            }
        }
        Policy::Fail => Err(Rejected { key, value }),
    }
}

// An inert node swapped in while a variant change moves fields out.
fn placeholder<K, V>() -> Node<K, V> {
    Node::Bitmap {
        bitmap: 0,
        children: Vec::new(),
    }
}

/// [`Node::update`] lifted to the nullable root slot of a map.
pub(crate) fn update_root<K, V, KC, VC>(
    root: &mut Option<Rc<Node<K, V>>>,
    kc: &KC,
    vc: &VC,
    policy: Policy,
    hash: u32,
    key: K,
    value: V,
) -> Result<Applied<V>, Rejected<K, V>>
where
    K: Clone,
    V: Clone,
    KC: KeyComparer<K>,
    VC: ValueComparer<V>,
{
    match root {
        None => {
            *root = Some(Rc::new(Node::Value { hash, key, value }));
            Ok(Applied::Added)
        }
        Some(node) => Node::update(node, kc, vc, policy, 0, hash, key, value),
    }
}

/// [`Node::remove`] lifted to the nullable root slot of a map.
pub(crate) fn remove_root<K, V, KC>(
    root: &mut Option<Rc<Node<K, V>>>,
    kc: &KC,
    hash: u32,
    key: &K,
) -> Option<(K, V)>
where
    K: Clone,
    V: Clone,
    KC: KeyComparer<K>,
{
    let node = root.as_mut()?;
    match Node::remove(node, kc, 0, hash, key) {
        Removed::NotFound => None,
        Removed::Done(pair) => Some(pair),
        Removed::Emptied(pair) => {
            *root = None;
            Some(pair)
        }
    }
}

impl<K, V> Node<K, V> {
    pub(crate) fn get<'a, KC: KeyComparer<K>>(
        &'a self,
        kc: &KC,
        shift: u32,
        hash: u32,
        key: &K,
    ) -> Option<(&'a K, &'a V)> {
        match self {
            Node::Value {
                hash: h,
                key: k,
                value: v,
            } => (*h == hash && kc.eq(k, key)).then_some((k, v)),
            Node::Bitmap { bitmap, children } => {
                let bit = bitpos(hash, shift);
                if bitmap & bit == 0 {
                    None
                } else {
                    children[dense_index(*bitmap, bit)].get(kc, shift + HASH_BITS, hash, key)
                }
            }
            Node::Array { children } => children
                .get(mask(hash, shift))
                .and_then(|child| child.get(kc, shift + HASH_BITS, hash, key)),
            Node::Collision { hash: h, entries } => {
                if *h != hash {
                    return None;
                }
                entries.iter().find(|(k, _)| kc.eq(k, key)).map(|(k, v)| (k, v))
            }
        }
    }

    /// The full hash of some entry below this node; every entry in a
    /// subtree shares the hash bits that routed it here.
    fn any_hash(&self) -> u32 {
        match self {
            Node::Value { hash, .. } | Node::Collision { hash, .. } => *hash,
            Node::Bitmap { children, .. } => children[0].any_hash(),
            Node::Array { children } => children
                .iter()
                .next()
                .expect("array nodes are never empty")
                .any_hash(),
        }
    }

    /// Walk the subtree asserting every structural invariant, returning the
    /// entry count. Test support.
    pub(crate) fn check_invariants(&self, shift: u32) -> usize {
        match self {
            Node::Value { .. } => 1,
            Node::Bitmap { bitmap, children } => {
                assert_eq!(bitmap.count_ones() as usize, children.len());
                assert!(!children.is_empty());
                assert!(children.len() <= EXPAND_AT);
                let mut total = 0;
                let mut bits = *bitmap;
                for child in children {
                    let slot = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    assert_eq!(mask(child.any_hash(), shift), slot);
                    total += child.check_invariants(shift + HASH_BITS);
                }
                total
            }
            Node::Array { children } => {
                assert!(children.len() > PACK_AT);
                let mut total = 0;
                for slot in 0..HASH_WIDTH {
                    if let Some(child) = children.get(slot) {
                        assert_eq!(mask(child.any_hash(), shift), slot);
                        total += child.check_invariants(shift + HASH_BITS);
                    }
                }
                total
            }
            Node::Collision { entries, .. } => {
                assert!(entries.len() >= 2);
                entries.len()
            }
        }
    }
}

impl<K: Clone, V: Clone> Node<K, V> {
    /// Branch on the hashes of two subtrees until their 5-bit slices
    /// diverge. The hashes must differ, which bounds the recursion: the
    /// seven slices cover all 32 bits.
    fn join(shift: u32, ha: u32, a: Rc<Node<K, V>>, hb: u32, b: Rc<Node<K, V>>) -> Node<K, V> {
        debug_assert_ne!(ha, hb);
        let ia = mask(ha, shift);
        let ib = mask(hb, shift);
        if ia == ib {
            Node::Bitmap {
                bitmap: 1 << ia,
                children: vec![Rc::new(Self::join(shift + HASH_BITS, ha, a, hb, b))],
            }
        } else {
            let (bitmap, children) = if ia < ib {
                ((1 << ia) | (1 << ib), vec![a, b])
            } else {
                ((1 << ia) | (1 << ib), vec![b, a])
            };
            Node::Bitmap { bitmap, children }
        }
    }

    /// Insert or update `key`, resolving an existing binding through
    /// `policy`. A rejection leaves the logical contents untouched.
    pub(crate) fn update<KC, VC>(
        node: &mut Rc<Node<K, V>>,
        kc: &KC,
        vc: &VC,
        policy: Policy,
        shift: u32,
        hash: u32,
        key: K,
        value: V,
    ) -> Result<Applied<V>, Rejected<K, V>>
    where
        KC: KeyComparer<K>,
        VC: ValueComparer<V>,
    {
        let n = Rc::make_mut(node);
        match &mut *n {
            Node::Value {
                hash: h0,
                key: k0,
                value: v0,
            } => {
                if *h0 == hash && kc.eq(k0, &key) {
                    return apply_policy(policy, vc, v0, key, value);
                }
                let h0 = *h0;
                let old = mem::replace(n, placeholder());
                *n = if h0 == hash {
                    let Node::Value {
                        key: k0, value: v0, ..
                    } = old
                    else {
                        unreachable!();
                    };
                    Node::Collision {
                        hash,
                        entries: vec![(k0, v0), (key, value)],
                    }
                } else {
                    Self::join(
                        shift,
                        h0,
                        Rc::new(old),
                        hash,
                        Rc::new(Node::Value { hash, key, value }),
                    )
                };
                Ok(Applied::Added)
            }
            Node::Bitmap { bitmap, children } => {
                let bit = bitpos(hash, shift);
                let idx = dense_index(*bitmap, bit);
                if *bitmap & bit != 0 {
                    Self::update(
                        &mut children[idx],
                        kc,
                        vc,
                        policy,
                        shift + HASH_BITS,
                        hash,
                        key,
                        value,
                    )
                } else if children.len() < EXPAND_AT {
                    children.insert(idx, Rc::new(Node::Value { hash, key, value }));
                    *bitmap |= bit;
                    Ok(Applied::Added)
                } else {
                    // Expand: spread the dense children over their slots
                    // and drop the value into its own.
                    let mut array = SparseChunk::new();
                    let mut bits = *bitmap;
                    for child in children.drain(..) {
                        let slot = bits.trailing_zeros() as usize;
                        bits &= bits - 1;
                        array.insert(slot, child);
                    }
                    array.insert(mask(hash, shift), Rc::new(Node::Value { hash, key, value }));
                    *n = Node::Array { children: array };
                    Ok(Applied::Added)
                }
            }
            Node::Array { children } => {
                let idx = mask(hash, shift);
                match children.get_mut(idx) {
                    Some(child) => Self::update(
                        child,
                        kc,
                        vc,
                        policy,
                        shift + HASH_BITS,
                        hash,
                        key,
                        value,
                    ),
                    None => {
                        children.insert(idx, Rc::new(Node::Value { hash, key, value }));
                        Ok(Applied::Added)
                    }
                }
            }
            Node::Collision { hash: h0, entries } => {
                if *h0 == hash {
                    match entries.iter_mut().find(|(k, _)| kc.eq(k, &key)) {
                        Some((_, v0)) => apply_policy(policy, vc, v0, key, value),
                        None => {
                            entries.push((key, value));
                            Ok(Applied::Added)
                        }
                    }
                } else {
                    let h0 = *h0;
                    let old = mem::replace(n, placeholder());
                    *n = Self::join(
                        shift,
                        h0,
                        Rc::new(old),
                        hash,
                        Rc::new(Node::Value { hash, key, value }),
                    );
                    Ok(Applied::Added)
                }
            }
        }
    }

    /// Remove `key`, packing and collapsing on the way back up. Never
    /// grows the tree.
    pub(crate) fn remove<KC: KeyComparer<K>>(
        node: &mut Rc<Node<K, V>>,
        kc: &KC,
        shift: u32,
        hash: u32,
        key: &K,
    ) -> Removed<K, V> {
        let n = Rc::make_mut(node);
        match &mut *n {
            Node::Value {
                hash: h0, key: k0, ..
            } => {
                if *h0 == hash && kc.eq(k0, key) {
                    let old = mem::replace(n, placeholder());
                    let Node::Value { key, value, .. } = old else {
                        unreachable!();
                    };
                    Removed::Emptied((key, value))
                } else {
                    Removed::NotFound
                }
            }
            Node::Bitmap { bitmap, children } => {
                let bit = bitpos(hash, shift);
                if *bitmap & bit == 0 {
                    return Removed::NotFound;
                }
                let idx = dense_index(*bitmap, bit);
                match Self::remove(&mut children[idx], kc, shift + HASH_BITS, hash, key) {
                    Removed::NotFound => Removed::NotFound,
                    Removed::Done(pair) => Removed::Done(pair),
                    Removed::Emptied(pair) => {
                        children.remove(idx);
                        *bitmap &= !bit;
                        if *bitmap == 0 {
                            Removed::Emptied(pair)
                        } else {
                            Removed::Done(pair)
                        }
                    }
                }
            }
            Node::Array { children } => {
                let idx = mask(hash, shift);
                let Some(child) = children.get_mut(idx) else {
                    return Removed::NotFound;
                };
                match Self::remove(child, kc, shift + HASH_BITS, hash, key) {
                    Removed::NotFound => Removed::NotFound,
                    Removed::Done(pair) => Removed::Done(pair),
                    Removed::Emptied(pair) => {
                        children.remove(idx);
                        if children.len() <= PACK_AT {
                            // Pack back into a bitmap node.
                            let mut taken = mem::take(children);
                            let mut bitmap = 0u32;
                            let mut dense = Vec::with_capacity(taken.len());
                            for slot in 0..HASH_WIDTH {
                                if let Some(child) = taken.remove(slot) {
                                    bitmap |= 1 << slot;
                                    dense.push(child);
                                }
                            }
                            *n = Node::Bitmap {
                                bitmap,
                                children: dense,
                            };
                        }
                        Removed::Done(pair)
                    }
                }
            }
            Node::Collision { hash: h0, entries } => {
                if *h0 != hash {
                    return Removed::NotFound;
                }
                let Some(pos) = entries.iter().position(|(k, _)| kc.eq(k, key)) else {
                    return Removed::NotFound;
                };
                if entries.len() == 2 {
                    let pair = entries.swap_remove(pos);
                    let Some((k, v)) = entries.pop() else {
                        unreachable!();
                    };
                    let hash = *h0;
                    *n = Node::Value {
                        hash,
                        key: k,
                        value: v,
                    };
                    Removed::Done(pair)
                } else {
                    Removed::Done(entries.swap_remove(pos))
                }
            }
        }
    }
}
