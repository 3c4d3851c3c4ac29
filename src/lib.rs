//! Persistent containers built on wide, shallow tries.
//!
//! [`Vector`] is an indexed sequence implemented as a bit-partitioned vector
//! trie with a tail chunk: indexed access, append and pop are `O(log₃₂ n)`,
//! and slicing shares storage with the original. [`HashTrieMap`] is an
//! unordered key-value map implemented as a hash array mapped trie.
//!
//! Both are cheap to clone and structurally shared: an update allocates new
//! nodes only along the root-to-leaf path it touches. Both come with a
//! transient builder ([`VectorBuilder`], [`MapBuilder`]) that mutates
//! uniquely-owned nodes in place and hands back a frozen instance in O(1)
//! via [`vector::Builder::freeze`] / [`map::Builder::freeze`].

pub mod error;
pub mod map;
pub mod vector;

/// [`Vector`] takes a "branching factor" parameter, which must be a
/// reasonably-sized power of two. We use this trait to enforce that.
pub trait ValidBranchingConstant {}
pub struct Const<const N: usize> {}

impl ValidBranchingConstant for Const<2> {}
impl ValidBranchingConstant for Const<4> {}
impl ValidBranchingConstant for Const<8> {}
impl ValidBranchingConstant for Const<16> {}
impl ValidBranchingConstant for Const<32> {}
impl ValidBranchingConstant for Const<64> {}
impl ValidBranchingConstant for Const<128> {}

pub use error::Error;
pub use map::Builder as MapBuilder;
pub use map::{DefaultComparer, HashTrieMap, KeyComparer, ValueComparer};
pub use vector::Builder as VectorBuilder;
pub use vector::Vector;
