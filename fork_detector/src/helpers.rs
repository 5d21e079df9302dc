use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, ensure, Result};
use itertools::Itertools as _;
use sha2::{Digest as _, Sha256};
use tap::Pipe as _;

use crate::{
    detector::ForkDetector, detector_config::DetectorConfig, header::Height, hooks::ForkHooks,
    outcome::SubmitOutcome, BlockHeader, Snapshot,
};

pub type H256 = [u8; 32];
pub type State = BTreeMap<u32, u64>;
pub type TestSnapshot = Snapshot<State, TestHeader>;

// The single key every test block writes to.
pub const X: u32 = 1;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TestHeader {
    height: Height,
    parent_hash: H256,
    label: String,
}

impl BlockHeader for TestHeader {
    type Hash = H256;

    fn height(&self) -> Height {
        self.height
    }

    fn parent_hash(&self) -> H256 {
        self.parent_hash
    }

    fn hash(&self) -> H256 {
        Sha256::new()
            .chain_update(self.height.to_be_bytes())
            .chain_update(self.parent_hash)
            .chain_update(self.label.as_bytes())
            .finalize()
            .into()
    }
}

pub fn header(height: Height, parent_hash: H256, label: &str) -> TestHeader {
    TestHeader {
        height,
        parent_hash,
        label: label.to_owned(),
    }
}

// A linked chain of `length` blocks starting at `first_height` on top of an unknown parent.
// Block at height `h` sets `X` to `h`.
pub fn snapshot_chain(first_height: Height, length: usize) -> Vec<TestSnapshot> {
    let mut parent_hash = H256::default();

    (first_height..)
        .take(length)
        .map(|height| {
            let snapshot = Snapshot::new(
                header(height, parent_hash, "chain"),
                State::from([(X, height.saturating_sub(1))]),
                State::from([(X, height)]),
            );

            parent_hash = *snapshot.hash();

            snapshot
        })
        .collect()
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ReorgCall {
    Undo(Vec<H256>),
    Apply(H256),
}

impl ReorgCall {
    pub fn undo<'snapshot>(snapshots: impl IntoIterator<Item = &'snapshot TestSnapshot>) -> Self {
        Self::Undo(snapshots.into_iter().map(|snapshot| *snapshot.hash()).collect())
    }

    pub fn apply(snapshot: &TestSnapshot) -> Self {
        Self::Apply(*snapshot.hash())
    }
}

/// World state plus an ancestor store, recording every call made by the detector.
#[derive(Default)]
pub struct World {
    state: State,
    published: HashMap<H256, TestSnapshot>,
    calls: Vec<ReorgCall>,
    failing_height: Option<Height>,
}

impl ForkHooks<State, TestHeader> for World {
    fn ancestor(&self, hash: &H256) -> Option<TestSnapshot> {
        self.published.get(hash).map(|snapshot| {
            Snapshot::ancestor(snapshot.header().clone(), snapshot.after_state().clone())
        })
    }

    fn reorg(&mut self, undo: &[TestSnapshot], apply: &[TestSnapshot]) -> Result<()> {
        ensure!(
            undo.is_empty() != apply.is_empty(),
            "exactly one of undo ({}) and apply ({}) must be non-empty",
            undo.len(),
            apply.len(),
        );

        ensure!(apply.len() <= 1, "applied {} snapshots at once", apply.len());

        if let Some(height) = self.failing_height {
            if undo.iter().chain(apply).any(|snapshot| snapshot.height() == height) {
                bail!("world state refuses to touch height {height}");
            }
        }

        if !undo.is_empty() {
            for snapshot in undo {
                self.state.extend(snapshot.pre_state().into_iter().flatten());
            }

            self.calls.push(ReorgCall::undo(undo));
        }

        for snapshot in apply {
            self.state.extend(snapshot.after_state());
            self.calls.push(ReorgCall::apply(snapshot));
        }

        Ok(())
    }

    fn pre_state(&self, after_state: &State) -> Result<State> {
        after_state
            .keys()
            .map(|key| (*key, self.state.get(key).copied().unwrap_or_default()))
            .collect::<State>()
            .pipe(Ok)
    }
}

pub struct Context {
    detector: ForkDetector<State, TestHeader, World>,
}

impl Context {
    pub fn new(max_fork: usize) -> Self {
        let detector = ForkDetector::new(DetectorConfig::new(max_fork), World::default())
            .expect("test configurations fit in memory");

        Self { detector }
    }

    pub const fn detector(&self) -> &ForkDetector<State, TestHeader, World> {
        &self.detector
    }

    pub fn value(&self) -> Option<u64> {
        self.detector.hooks().state.get(&X).copied()
    }

    // Creates a block setting `X` to `value` and makes it available to ancestor lookups.
    // Its `pre_state` is what `X` holds on the parent's branch.
    pub fn block(&mut self, parent: &TestSnapshot, label: &str, value: u64) -> TestSnapshot {
        let height = parent.height() + 1;
        let before = parent.after_state().get(&X).copied().unwrap_or_default();

        self.publish(Snapshot::new(
            header(height, *parent.hash(), label),
            State::from([(X, before)]),
            State::from([(X, value)]),
        ))
    }

    // Creates a block whose parent is unknown.
    pub fn orphan(&mut self, height: Height, label: &str, value: u64) -> TestSnapshot {
        self.publish(Snapshot::new(
            header(height, H256::default(), label),
            State::new(),
            State::from([(X, value)]),
        ))
    }

    // Creates `length` consecutive blocks on top of `parent`.
    // Block `i` (counting from 1) sets `X` to `first_value + i - 1`.
    pub fn branch(
        &mut self,
        parent: &TestSnapshot,
        label: &str,
        length: usize,
        first_value: u64,
    ) -> Vec<TestSnapshot> {
        let mut blocks: Vec<TestSnapshot> = Vec::with_capacity(length);

        for (index, value) in (first_value..).take(length).enumerate() {
            let block_label = format!("{label}{}", index + 1);
            let block = self.block(blocks.last().unwrap_or(parent), &block_label, value);
            blocks.push(block);
        }

        blocks
    }

    pub fn forget(&mut self, snapshot: &TestSnapshot) {
        self.detector
            .hooks_mut()
            .published
            .remove(snapshot.hash());
    }

    pub fn fail_at(&mut self, height: Height) {
        self.detector.hooks_mut().failing_height = Some(height);
    }

    pub fn submit(&mut self, snapshot: &TestSnapshot) -> Result<SubmitOutcome<H256>> {
        self.detector.submit(snapshot.clone())
    }

    pub fn submit_all<'snapshot>(
        &mut self,
        snapshots: impl IntoIterator<Item = &'snapshot TestSnapshot>,
    ) -> Result<Vec<SubmitOutcome<H256>>> {
        snapshots
            .into_iter()
            .map(|snapshot| self.submit(snapshot))
            .collect()
    }

    pub fn take_calls(&mut self) -> Vec<ReorgCall> {
        core::mem::take(&mut self.detector.hooks_mut().calls)
    }

    pub fn chain_hashes(&self) -> Vec<H256> {
        self.detector
            .chain()
            .map(|snapshot| *snapshot.hash())
            .collect_vec()
    }

    fn publish(&mut self, snapshot: TestSnapshot) -> TestSnapshot {
        self.detector
            .hooks_mut()
            .published
            .insert(*snapshot.hash(), snapshot.clone());

        snapshot
    }
}

pub fn hashes<'snapshot>(snapshots: impl IntoIterator<Item = &'snapshot TestSnapshot>) -> Vec<H256> {
    snapshots
        .into_iter()
        .map(|snapshot| *snapshot.hash())
        .collect()
}
