use crate::header::{BlockHeader, Height};

/// The effect of one block on world state.
///
/// `pre_state` and `after_state` are projections limited to the keys the block's transition
/// touches. Snapshots produced by [`ForkHooks::ancestor`] carry no `pre_state`. The detector
/// recomputes it against current world state before replaying them.
///
/// [`ForkHooks::ancestor`]: crate::ForkHooks::ancestor
#[derive(Clone, Debug)]
pub struct Snapshot<S, B: BlockHeader> {
    header: B,
    // Cached so that buffer bookkeeping never rehashes the header.
    hash: B::Hash,
    pre_state: Option<S>,
    after_state: S,
}

impl<S, B: BlockHeader> Snapshot<S, B> {
    #[must_use]
    pub fn new(header: B, pre_state: S, after_state: S) -> Self {
        Self {
            hash: header.hash(),
            header,
            pre_state: Some(pre_state),
            after_state,
        }
    }

    #[must_use]
    pub fn ancestor(header: B, after_state: S) -> Self {
        Self {
            hash: header.hash(),
            header,
            pre_state: None,
            after_state,
        }
    }

    #[must_use]
    pub const fn header(&self) -> &B {
        &self.header
    }

    #[must_use]
    pub const fn hash(&self) -> &B::Hash {
        &self.hash
    }

    #[must_use]
    pub fn height(&self) -> Height {
        self.header.height()
    }

    #[must_use]
    pub fn parent_hash(&self) -> B::Hash {
        self.header.parent_hash()
    }

    #[must_use]
    pub const fn pre_state(&self) -> Option<&S> {
        self.pre_state.as_ref()
    }

    #[must_use]
    pub const fn after_state(&self) -> &S {
        &self.after_state
    }

    /// Whether `self` directly follows `parent` on the same branch.
    #[must_use]
    pub fn is_child_of(&self, parent: &Self) -> bool {
        parent.height().checked_add(1) == Some(self.height()) && self.parent_hash() == parent.hash
    }

    #[must_use]
    pub fn into_parts(self) -> (B, Option<S>, S) {
        (self.header, self.pre_state, self.after_state)
    }

    pub(crate) fn set_pre_state(&mut self, pre_state: S) {
        self.pre_state = Some(pre_state);
    }
}
