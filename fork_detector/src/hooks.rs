use anyhow::Result;

use crate::{header::BlockHeader, snapshot::Snapshot};

/// The boundary between [`ForkDetector`] and the world state it keeps in sync.
///
/// All methods are called synchronously on the thread that called [`ForkDetector::submit`].
///
/// [`ForkDetector`]:         crate::ForkDetector
/// [`ForkDetector::submit`]: crate::ForkDetector::submit
pub trait ForkHooks<S, B: BlockHeader> {
    /// Looks up a block outside the detector's buffer.
    ///
    /// The returned snapshot must have its `after_state` populated and no `pre_state`.
    /// Returning [`None`] makes the detector treat the block as unknown.
    /// Must not have side effects.
    fn ancestor(&self, hash: &B::Hash) -> Option<Snapshot<S, B>>;

    /// Mutates world state.
    ///
    /// Exactly one of `undo` and `apply` is non-empty. Undoing a snapshot restores its
    /// `pre_state` for the keys it touched. `apply` always contains a single snapshot whose
    /// `after_state` must be committed.
    ///
    /// An error aborts [`ForkDetector::submit`] without undoing anything done so far.
    ///
    /// [`ForkDetector::submit`]: crate::ForkDetector::submit
    fn reorg(&mut self, undo: &[Snapshot<S, B>], apply: &[Snapshot<S, B>]) -> Result<()>;

    /// Computes the state a transition producing `after_state` starts from,
    /// read against current world state.
    fn pre_state(&self, after_state: &S) -> Result<S>;
}

/// [`ForkHooks`] assembled from three closures.
pub struct Callbacks<L, R, P> {
    lookup: L,
    reorg: R,
    pre_state: P,
}

impl<L, R, P> Callbacks<L, R, P> {
    #[must_use]
    pub const fn new(lookup: L, reorg: R, pre_state: P) -> Self {
        Self {
            lookup,
            reorg,
            pre_state,
        }
    }
}

impl<S, B, L, R, P> ForkHooks<S, B> for Callbacks<L, R, P>
where
    B: BlockHeader,
    L: Fn(&B::Hash) -> Option<Snapshot<S, B>>,
    R: FnMut(&[Snapshot<S, B>], &[Snapshot<S, B>]) -> Result<()>,
    P: Fn(&S) -> Result<S>,
{
    fn ancestor(&self, hash: &B::Hash) -> Option<Snapshot<S, B>> {
        (self.lookup)(hash)
    }

    fn reorg(&mut self, undo: &[Snapshot<S, B>], apply: &[Snapshot<S, B>]) -> Result<()> {
        (self.reorg)(undo, apply)
    }

    fn pre_state(&self, after_state: &S) -> Result<S> {
        (self.pre_state)(after_state)
    }
}
