//! Mutex-guarded aggregation buffer shared by all consumers.

use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::config::CompactionPolicy;
use crate::matrix::FlatVector;

/// Result of a single [`SharedAggregate::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Values were appended; `len` is the new length.
    Appended { len: usize },
    /// The append pushed the buffer over the cap and it was compacted down
    /// to `len` values.
    Compacted { len: usize },
}

impl AppendOutcome {
    pub fn len_after(&self) -> usize {
        match *self {
            AppendOutcome::Appended { len } | AppendOutcome::Compacted { len } => len,
        }
    }
}

/// Point-in-time bookkeeping of the aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub len: usize,
    /// Values ever appended, including those later discarded.
    pub appended_total: u64,
    pub compactions: u64,
    /// Length left behind by the most recent compaction, 0 if none yet.
    pub last_compaction_len: usize,
    /// Largest length observed once an append has released the lock.
    pub high_water: usize,
}

#[derive(Default)]
struct State {
    values: Vec<f64>,
    appended_total: u64,
    compactions: u64,
    last_compaction_len: usize,
    high_water: usize,
}

/// A growable `f64` buffer shared between consumer tasks.
///
/// Every mutation happens under one lock. When an append leaves more than
/// `policy.cap` values, the whole buffer is sorted ascending and cut down
/// to the first `policy.keep` values. This is lossy on purpose: the sort
/// under the lock is the contention the load generator wants to produce.
pub struct SharedAggregate {
    inner: Mutex<State>,
    policy: CompactionPolicy,
}

impl SharedAggregate {
    pub fn new(policy: CompactionPolicy) -> Self {
        Self {
            inner: Mutex::new(State::default()),
            policy,
        }
    }

    pub fn policy(&self) -> CompactionPolicy {
        self.policy
    }

    /// Appends `data` and compacts if the cap is exceeded.
    pub fn append(&self, data: FlatVector) -> AppendOutcome {
        let mut state = self.lock();
        state.appended_total += data.len() as u64;
        state.values.extend(data);

        let outcome = if state.values.len() > self.policy.cap {
            let before = state.values.len();
            compact(&mut state.values, self.policy.keep);
            state.compactions += 1;
            state.last_compaction_len = state.values.len();
            debug!(
                before,
                after = state.values.len(),
                compactions = state.compactions,
                "aggregate compacted"
            );
            AppendOutcome::Compacted {
                len: state.values.len(),
            }
        } else {
            AppendOutcome::Appended {
                len: state.values.len(),
            }
        };

        state.high_water = state.high_water.max(state.values.len());
        outcome
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values.is_empty()
    }

    /// Copies the current contents.
    pub fn snapshot(&self) -> Vec<f64> {
        self.lock().values.clone()
    }

    pub fn stats(&self) -> AggregateStats {
        let state = self.lock();
        AggregateStats {
            len: state.values.len(),
            appended_total: state.appended_total,
            compactions: state.compactions,
            last_compaction_len: state.last_compaction_len,
            high_water: state.high_water,
        }
    }

    // Nothing in the critical section panics, so a poisoned lock still
    // holds a consistent buffer.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedAggregate {
    fn default() -> Self {
        Self::new(CompactionPolicy::default())
    }
}

fn compact(values: &mut Vec<f64>, keep: usize) {
    values.sort_unstable_by(nan_first);
    values.truncate(keep);
}

/// Ascending order with every NaN ahead of all numbers.
fn nan_first(a: &f64, b: &f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}
