use thiserror::Error;

use crate::header::Height;

#[derive(Debug, Error)]
pub enum Error {
    #[error("fork window of {max_fork} blocks does not fit in a buffer")]
    CapacityOverflow { max_fork: usize },
    #[error("failed to roll back {depth} abandoned snapshots")]
    RollbackFailed { depth: usize },
    #[error("failed to apply snapshot at height {height}")]
    ApplyFailed { height: Height },
    #[error("failed to recompute pre-state of snapshot at height {height}")]
    PreStateFailed { height: Height },
}
