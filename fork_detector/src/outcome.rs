use derive_more::Display;
use strum::AsRefStr;

use crate::header::Height;

/// Why a submission discarded tracked history instead of extending or reconciling it.
///
/// Every variant leads to the same fast-forward reset.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ResetReason {
    #[display("no snapshot at head")]
    EmptyHead,
    #[display("height {new} does not follow head at height {head}")]
    HeightGap { head: Height, new: Height },
    #[display("parent of competing block is unknown")]
    UnknownAncestor,
}

impl ResetReason {
    // When the competing parent cannot be found, the current head is known to be off the adopted
    // branch. Leaving it in place would make it look like the new head's parent.
    #[must_use]
    pub const fn discards_head(self) -> bool {
        matches!(self, Self::UnknownAncestor)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SubmitOutcome<H> {
    Extended,
    FastForwarded {
        reason: ResetReason,
    },
    Reorganized {
        // Number of snapshots rolled back.
        depth: usize,
        // Number of snapshots applied, including the submitted one.
        replayed: usize,
        // `None` if buffered history or ancestor lookup ran out before the branches converged.
        common_ancestor: Option<H>,
    },
}

impl<H> SubmitOutcome<H> {
    #[must_use]
    pub const fn is_fast_forward(&self) -> bool {
        matches!(self, Self::FastForwarded { .. })
    }

    #[must_use]
    pub const fn is_reorganized(&self) -> bool {
        matches!(self, Self::Reorganized { .. })
    }
}
