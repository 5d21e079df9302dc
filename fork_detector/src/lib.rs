//! Lossy fork detection over a bounded window of recent blocks.
//!
//! [`ForkDetector`] follows the tip of a chain whose blocks may arrive from competing branches and
//! keeps an external world state in sync with whichever branch it currently considers canonical.
//! It never touches world state directly. All reads and writes go through [`ForkHooks`].
//!
//! The detector keeps the last `max_fork + 1` snapshots in a [`SnapshotRing`]. Every submitted
//! snapshot is handled in one of three ways:
//! - A snapshot whose parent is the current head extends the canonical chain and is applied.
//! - A snapshot one block above the head but with a different parent starts a reorganization.
//!   The detector walks back through its buffer and through [`ForkHooks::ancestor`] in lockstep
//!   until both branches meet, rolls back the abandoned snapshots in one call and replays the
//!   adopted ones one at a time starting with the oldest. Every replayed snapshot gets its
//!   `pre_state` recomputed against world state as it is at that point.
//! - Anything else (an empty buffer, a height gap, an unknown competing parent) is a fast-forward
//!   reset. The snapshot is applied as if it extended the chain and older history is forgotten.
//!
//! The detector is lossy. A reorganization deeper than the buffer cannot be resolved
//! precisely. The walk stops at the end of buffered history and reconciles as far as it got.
//! Callers cannot tell an unknown block from an unresolvable reorganization or from a temporarily
//! unavailable ancestor store. All of them look like a reset.
//!
//! There is no finality and no voting. The last valid continuation submitted wins.

pub use crate::{
    detector::ForkDetector,
    detector_config::{DetectorConfig, DEFAULT_MAX_FORK},
    error::Error,
    header::{BlockHeader, Height},
    hooks::{Callbacks, ForkHooks},
    outcome::{ResetReason, SubmitOutcome},
    ring::{Chain, Position, SnapshotRing},
    snapshot::Snapshot,
};

mod detector;
mod detector_config;
mod error;
mod header;
mod hooks;
mod outcome;
mod ring;
mod snapshot;

#[cfg(test)]
mod helpers;
