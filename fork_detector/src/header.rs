use core::fmt::Debug;

pub type Height = u64;

/// The part of a block header the detector needs.
///
/// Heights increase by exactly one along any valid chain and a child's `parent_hash` is equal to
/// its parent's `hash`. Two blocks at the same height on the same branch never share a hash.
pub trait BlockHeader {
    type Hash: Clone + Eq + Debug;

    fn height(&self) -> Height;

    fn parent_hash(&self) -> Self::Hash;

    fn hash(&self) -> Self::Hash;
}
