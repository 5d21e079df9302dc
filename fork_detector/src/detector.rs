use core::{num::NonZeroUsize, slice};

use anyhow::{Context as _, Result};
use log::{debug, info, warn};
use tap::Pipe as _;

use crate::{
    detector_config::DetectorConfig,
    error::Error,
    header::BlockHeader,
    hooks::ForkHooks,
    outcome::{ResetReason, SubmitOutcome},
    ring::{Chain, SnapshotRing},
    snapshot::Snapshot,
};

// How a submitted snapshot relates to the current head.
enum Transition<S, B: BlockHeader> {
    FastForward(ResetReason),
    Extend,
    // Carries the parent of the submitted snapshot, which competes with the current head.
    Fork(Snapshot<S, B>),
}

/// Tracks the tip of a forking chain and keeps external world state on the canonical branch.
///
/// `ForkDetector` performs no locking. Concurrent producers must serialize calls to
/// [`ForkDetector::submit`] themselves.
pub struct ForkDetector<S, B: BlockHeader, K> {
    config: DetectorConfig,
    ring: SnapshotRing<S, B>,
    hooks: K,
}

impl<S, B: BlockHeader, K: ForkHooks<S, B>> ForkDetector<S, B, K> {
    pub fn new(config: DetectorConfig, hooks: K) -> Result<Self> {
        let ring = config.capacity()?.pipe(SnapshotRing::new);

        Ok(Self {
            config,
            ring,
            hooks,
        })
    }

    /// Makes `snapshot` the new head and drives world state onto its branch.
    ///
    /// `snapshot` must already carry its `pre_state` and `after_state`.
    ///
    /// Situations that cannot be resolved from buffered history and ancestor lookups are not
    /// errors. They fall back to a fast-forward reset. Errors only come from [`ForkHooks`], in
    /// which case the buffer is left as it was when the failing hook was called.
    pub fn submit(&mut self, snapshot: Snapshot<S, B>) -> Result<SubmitOutcome<B::Hash>> {
        match self.transition(&snapshot) {
            Transition::FastForward(reason) => self.fast_forward(snapshot, reason),
            Transition::Extend => self.extend(snapshot),
            Transition::Fork(competitor) => self.reconcile(snapshot, competitor),
        }
    }

    #[must_use]
    pub fn head(&self) -> Option<&Snapshot<S, B>> {
        self.ring.head()
    }

    /// Buffered history of the current branch, newest first.
    #[must_use]
    pub const fn chain(&self) -> Chain<'_, S, B> {
        self.ring.chain()
    }

    #[must_use]
    pub const fn ring(&self) -> &SnapshotRing<S, B> {
        &self.ring
    }

    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize {
        self.ring.capacity()
    }

    #[must_use]
    pub const fn config(&self) -> DetectorConfig {
        self.config
    }

    #[must_use]
    pub const fn hooks(&self) -> &K {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut K {
        &mut self.hooks
    }

    #[must_use]
    pub fn into_hooks(self) -> K {
        self.hooks
    }

    fn transition(&self, snapshot: &Snapshot<S, B>) -> Transition<S, B> {
        let Some(head) = self.ring.head() else {
            return Transition::FastForward(ResetReason::EmptyHead);
        };

        if head.height().checked_add(1) != Some(snapshot.height()) {
            return Transition::FastForward(ResetReason::HeightGap {
                head: head.height(),
                new: snapshot.height(),
            });
        }

        if snapshot.parent_hash() == *head.hash() {
            return Transition::Extend;
        }

        match self.hooks.ancestor(&snapshot.parent_hash()) {
            Some(competitor) => Transition::Fork(competitor),
            None => Transition::FastForward(ResetReason::UnknownAncestor),
        }
    }

    // Every reset goes through here regardless of its reason.
    fn fast_forward(
        &mut self,
        snapshot: Snapshot<S, B>,
        reason: ResetReason,
    ) -> Result<SubmitOutcome<B::Hash>> {
        info!(
            "treating block at height {} as fast-forward ({}): {reason}",
            snapshot.height(),
            reason.as_ref(),
        );

        if reason.discards_head() {
            self.ring.clear_head();
        }

        self.append(snapshot)?;

        Ok(SubmitOutcome::FastForwarded { reason })
    }

    fn extend(&mut self, snapshot: Snapshot<S, B>) -> Result<SubmitOutcome<B::Hash>> {
        debug!("extending canonical chain to height {}", snapshot.height());

        self.append(snapshot)?;

        Ok(SubmitOutcome::Extended)
    }

    fn append(&mut self, snapshot: Snapshot<S, B>) -> Result<()> {
        let height = snapshot.height();

        self.hooks
            .reorg(&[], slice::from_ref(&snapshot))
            .with_context(|| Error::ApplyFailed { height })?;

        self.ring.advance();
        self.ring.store(snapshot);

        Ok(())
    }

    fn reconcile(
        &mut self,
        snapshot: Snapshot<S, B>,
        competitor: Snapshot<S, B>,
    ) -> Result<SubmitOutcome<B::Hash>> {
        // `abandoned` is ordered from the old head downwards.
        // `adopted` is ordered from the submitted snapshot downwards.
        // Below the submitted snapshot, `adopted[i + 1]` is at the same height as `abandoned[i]`.
        // The cursor stays on the slot of the last snapshot in `abandoned`.
        let mut abandoned = Vec::new();
        let mut adopted = vec![snapshot, competitor];
        let mut common_ancestor = None;

        abandoned.extend(self.ring.take_head());

        loop {
            let Some(deepest_abandoned) = abandoned.last() else {
                break;
            };

            // The abandoned branch was never stored anywhere else, so it cannot be followed past
            // buffered history. The adopted branch could be, but is not.
            let Some(old_parent) = self.ring.behind(1) else {
                break;
            };

            if !deepest_abandoned.is_child_of(old_parent) {
                break;
            }

            let Some(deepest_adopted) = adopted.last() else {
                break;
            };

            let Some(new_parent) = self.hooks.ancestor(&deepest_adopted.parent_hash()) else {
                break;
            };

            if old_parent.hash() == new_parent.hash() {
                common_ancestor = Some(new_parent.hash().clone());
                break;
            }

            self.ring.retreat();
            abandoned.extend(self.ring.take_head());
            adopted.push(new_parent);
        }

        let depth = abandoned.len();
        let replayed = adopted.len();

        match &common_ancestor {
            Some(hash) => info!(
                "reorganizing {depth} blocks deep onto common ancestor {hash:?} \
                 (replaying {replayed} blocks)",
            ),
            None => warn!(
                "reorganizing {depth} blocks deep without reaching common ancestor \
                 (replaying {replayed} blocks)",
            ),
        }

        self.hooks
            .reorg(&abandoned, &[])
            .with_context(|| Error::RollbackFailed { depth })?;

        // Step onto the slot below the deepest abandoned snapshot.
        // Replaying overwrites every abandoned slot.
        self.ring.retreat();

        // Each pre-state depends on everything replayed before it, so snapshots are applied one
        // at a time starting with the one closest to the common ancestor.
        for mut snapshot in adopted.into_iter().rev() {
            let height = snapshot.height();

            let pre_state = self
                .hooks
                .pre_state(snapshot.after_state())
                .with_context(|| Error::PreStateFailed { height })?;

            snapshot.set_pre_state(pre_state);

            self.hooks
                .reorg(&[], slice::from_ref(&snapshot))
                .with_context(|| Error::ApplyFailed { height })?;

            self.ring.advance();
            self.ring.store(snapshot);
        }

        Ok(SubmitOutcome::Reorganized {
            depth,
            replayed,
            common_ancestor,
        })
    }
}
