use core::{iter::FusedIterator, num::NonZeroUsize};

use derive_more::{Debug, Display, From};
use static_assertions::assert_eq_size;

use crate::{header::BlockHeader, snapshot::Snapshot};

// Index of a slot in a `SnapshotRing`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Debug, Display, From)]
#[debug("{_0}")]
pub struct Position(usize);

assert_eq_size!(Position, usize);

impl Position {
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// Fixed-capacity circular buffer of recent snapshots.
///
/// The cursor points at the slot holding the current head. The slot `k` positions behind the
/// cursor holds the snapshot `k` blocks behind the head for as long as nothing has overwritten it.
/// Slots are reused cyclically, so anything older than `capacity` blocks is gone.
pub struct SnapshotRing<S, B: BlockHeader> {
    slots: Box<[Option<Snapshot<S, B>>]>,
    capacity: NonZeroUsize,
    cursor: Position,
}

impl<S, B: BlockHeader> SnapshotRing<S, B> {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: core::iter::repeat_with(|| None)
                .take(capacity.get())
                .collect(),
            capacity,
            cursor: Position::default(),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    #[must_use]
    pub const fn position(&self) -> Position {
        self.cursor
    }

    #[must_use]
    pub fn head(&self) -> Option<&Snapshot<S, B>> {
        self.behind(0)
    }

    /// Returns the occupant of the slot `distance` positions behind the cursor.
    ///
    /// Distances wrap around, so `behind(capacity)` is the head slot again.
    #[must_use]
    pub fn behind(&self, distance: usize) -> Option<&Snapshot<S, B>> {
        self.slots[self.index_behind(distance)].as_ref()
    }

    /// Returns the occupant of the slot at `position` regardless of where the cursor is.
    #[must_use]
    pub fn at(&self, position: Position) -> Option<&Snapshot<S, B>> {
        self.slots.get(position.get())?.as_ref()
    }

    pub fn advance(&mut self) {
        self.cursor = Position((self.cursor.get() + 1) % self.capacity.get());
    }

    pub fn retreat(&mut self) {
        self.cursor = Position(self.index_behind(1));
    }

    /// Writes `snapshot` into the slot under the cursor, evicting whatever was there.
    pub fn store(&mut self, snapshot: Snapshot<S, B>) {
        self.slots[self.cursor.get()] = Some(snapshot);
    }

    pub fn take_head(&mut self) -> Option<Snapshot<S, B>> {
        self.slots[self.cursor.get()].take()
    }

    pub fn clear_head(&mut self) {
        self.slots[self.cursor.get()] = None;
    }

    /// Iterates over buffered history starting with the head and walking backwards.
    ///
    /// Iteration stops at the first empty slot, at the first snapshot that is not the parent of
    /// the one yielded before it, or after `capacity` snapshots, whichever comes first.
    #[must_use]
    pub const fn chain(&self) -> Chain<'_, S, B> {
        Chain {
            ring: self,
            distance: 0,
            previous: None,
        }
    }

    fn index_behind(&self, distance: usize) -> usize {
        let capacity = self.capacity.get();
        (self.cursor.get() + capacity - distance % capacity) % capacity
    }
}

pub struct Chain<'ring, S, B: BlockHeader> {
    ring: &'ring SnapshotRing<S, B>,
    distance: usize,
    previous: Option<&'ring Snapshot<S, B>>,
}

impl<'ring, S, B: BlockHeader> Iterator for Chain<'ring, S, B> {
    type Item = &'ring Snapshot<S, B>;

    fn next(&mut self) -> Option<Self::Item> {
        let capacity = self.ring.capacity().get();

        if self.distance >= capacity {
            return None;
        }

        let mut snapshot = self.ring.behind(self.distance);

        if let (Some(previous), Some(current)) = (self.previous, snapshot) {
            if !previous.is_child_of(current) {
                snapshot = None;
            }
        }

        match snapshot {
            Some(snapshot) => {
                self.distance += 1;
                self.previous = Some(snapshot);
            }
            None => self.distance = capacity,
        }

        snapshot
    }
}

impl<S, B: BlockHeader> FusedIterator for Chain<'_, S, B> {}
