//! Named load constants and the pipeline configuration built from them.

use crate::Error;

/// Grid size used by the producer task.
pub const PRODUCER_MATRIX_SIZE: usize = 200;
/// Grid size used by the main-loop compute task.
pub const MAIN_LOOP_MATRIX_SIZE: usize = 150;
/// Grid size used by one on-demand `/hello` round.
pub const HELLO_MATRIX_SIZE: usize = 100;

pub const PRODUCER_ITERATIONS: usize = 100;
pub const CONSUMER_ITERATIONS: usize = 50;
pub const MAIN_LOOP_ITERATIONS: usize = 100;

/// Capacity of the producer → consumer channel.
pub const CHANNEL_CAPACITY: usize = 5;
pub const CONSUMER_COUNT: usize = 5;

/// Aggregate length above which compaction kicks in.
pub const AGGREGATE_CAP: usize = 1_000_000;
/// Number of smallest values kept by a compaction.
pub const AGGREGATE_KEEP: usize = 1_000;

/// Sort-and-truncate policy applied by the shared aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    pub cap: usize,
    pub keep: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            cap: AGGREGATE_CAP,
            keep: AGGREGATE_KEEP,
        }
    }
}

/// Tunables for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub producer_size: usize,
    pub producer_iterations: usize,
    pub consumer_iterations: usize,
    pub main_loop_size: usize,
    pub main_loop_iterations: usize,
    pub channel_capacity: usize,
    pub consumers: usize,
    /// Whether to run the standalone main-loop compute task.
    pub main_loop: bool,
    pub compaction: CompactionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            producer_size: PRODUCER_MATRIX_SIZE,
            producer_iterations: PRODUCER_ITERATIONS,
            consumer_iterations: CONSUMER_ITERATIONS,
            main_loop_size: MAIN_LOOP_MATRIX_SIZE,
            main_loop_iterations: MAIN_LOOP_ITERATIONS,
            channel_capacity: CHANNEL_CAPACITY,
            consumers: CONSUMER_COUNT,
            main_loop: true,
            compaction: CompactionPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Rejects values the runtime cannot honour.
    pub fn validate(&self) -> Result<(), Error> {
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig("channel capacity must be positive"));
        }
        if self.consumers == 0 {
            return Err(Error::InvalidConfig("at least one consumer is required"));
        }
        if self.producer_size == 0 || (self.main_loop && self.main_loop_size == 0) {
            return Err(Error::InvalidConfig("matrix sizes must be positive"));
        }
        if self.compaction.keep > self.compaction.cap {
            return Err(Error::InvalidConfig("compaction keep must not exceed cap"));
        }
        Ok(())
    }
}
