use core::num::NonZeroUsize;

use anyhow::Result;
use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_MAX_FORK: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Derivative, Deserialize, Serialize)]
#[derivative(Default)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    // Reorgs whose common ancestor is at most this many blocks behind the head are resolved
    // entirely from buffered history.
    #[derivative(Default(value = "DEFAULT_MAX_FORK"))]
    pub max_fork: usize,
}

impl DetectorConfig {
    #[must_use]
    pub const fn new(max_fork: usize) -> Self {
        Self { max_fork }
    }

    pub fn capacity(self) -> Result<NonZeroUsize> {
        let max_fork = self.max_fork;

        max_fork
            .checked_add(1)
            .and_then(NonZeroUsize::new)
            .ok_or(Error::CapacityOverflow { max_fork })
            .map_err(Into::into)
    }
}
