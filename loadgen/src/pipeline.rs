//! Producer/consumer pipeline that keeps the CPU busy until cancelled.
//!
//! One producer builds and transforms product grids and pushes the
//! flattened vectors into a bounded channel. A pool of consumers pulls
//! them, transforms them again and merges them into the
//! [`SharedAggregate`]. An independent main-loop task burns CPU on its own
//! without touching the channel.
//!
//! Compute runs on the blocking pool; the async shell around it checks the
//! [`CancellationSignal`] at the top of every iteration and races it at
//! every channel operation. A round that has started always finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::Error;
use crate::aggregate::{AppendOutcome, SharedAggregate};
use crate::cancel::CancellationSignal;
use crate::config::PipelineConfig;
use crate::matrix::FlatVector;
use crate::workload;

/// Receiving half of the pipeline channel, shared by every consumer.
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<FlatVector>>>;

/// Progress counters updated by the pipeline tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    produced: AtomicU64,
    consumed: AtomicU64,
    main_loop_rounds: AtomicU64,
}

impl PipelineStats {
    /// Vectors handed to the channel.
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }

    /// Vectors merged into the aggregate.
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::SeqCst)
    }

    pub fn main_loop_rounds(&self) -> u64 {
        self.main_loop_rounds.load(Ordering::SeqCst)
    }
}

/// Handle to a running pipeline.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use loadgen::{CancellationSignal, Pipeline, PipelineConfig, SharedAggregate};
///
/// #[tokio::main]
/// async fn main() -> Result<(), loadgen::Error> {
///     let cancel = CancellationSignal::new();
///     let aggregate = Arc::new(SharedAggregate::default());
///     let pipeline = Pipeline::spawn(PipelineConfig::default(), aggregate, cancel.clone())?;
///
///     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
///     cancel.cancel();
///     pipeline.join().await
/// }
/// ```
pub struct Pipeline {
    handles: Vec<JoinHandle<Result<(), Error>>>,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Validates `config` and spawns the producer, the consumers and, if
    /// enabled, the main-loop task onto the current tokio runtime.
    pub fn spawn(
        config: PipelineConfig,
        aggregate: Arc<SharedAggregate>,
        cancel: CancellationSignal,
    ) -> Result<Self, Error> {
        config.validate()?;

        let stats = Arc::new(PipelineStats::default());
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));
        let mut handles = Vec::with_capacity(config.consumers + 2);

        handles.push(tokio::spawn(run_producer(
            config.producer_size,
            config.producer_iterations,
            tx,
            cancel.clone(),
            Arc::clone(&stats),
        )));

        for id in 0..config.consumers {
            handles.push(tokio::spawn(run_consumer(
                id,
                config.consumer_iterations,
                Arc::clone(&rx),
                Arc::clone(&aggregate),
                cancel.clone(),
                Arc::clone(&stats),
            )));
        }

        if config.main_loop {
            handles.push(tokio::spawn(run_main_loop(
                config.main_loop_size,
                config.main_loop_iterations,
                cancel,
                Arc::clone(&stats),
            )));
        }

        info!(
            producer_size = config.producer_size,
            consumers = config.consumers,
            channel_capacity = config.channel_capacity,
            main_loop = config.main_loop,
            "pipeline started"
        );

        Ok(Self { handles, stats })
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Waits for every task to exit and returns the first failure, if any.
    ///
    /// Tasks only exit once the cancellation signal fires (or the channel
    /// closes), so this is normally awaited after cancelling.
    pub async fn join(self) -> Result<(), Error> {
        let mut first = None;
        for result in join_all(self.handles).await {
            if let Err(e) = result.map_err(Error::from).and_then(|r| r) {
                warn!(error = %e, "pipeline task failed");
                first.get_or_insert(e);
            }
        }
        info!("pipeline stopped");
        first.map_or(Ok(()), Err)
    }
}

/// Producer loop: build, multiply, transform and send until cancelled.
///
/// A full channel blocks the send until a consumer drains it or the
/// signal fires, whichever comes first.
pub async fn run_producer(
    size: usize,
    iterations: usize,
    tx: mpsc::Sender<FlatVector>,
    cancel: CancellationSignal,
    stats: Arc<PipelineStats>,
) -> Result<(), Error> {
    debug!(size, iterations, "producer started");
    while !cancel.is_cancelled() {
        let data = task::spawn_blocking(move || workload::produce_vector(size, iterations)).await??;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(data) => {
                if sent.is_err() {
                    debug!("all consumers gone, producer exiting");
                    break;
                }
                stats.produced.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    debug!(produced = stats.produced(), "producer stopped");
    Ok(())
}

/// Consumer loop: receive, transform and merge into the aggregate until
/// cancelled or the producer hangs up.
pub async fn run_consumer(
    id: usize,
    iterations: usize,
    rx: SharedReceiver,
    aggregate: Arc<SharedAggregate>,
    cancel: CancellationSignal,
    stats: Arc<PipelineStats>,
) -> Result<(), Error> {
    debug!(consumer = id, "consumer started");
    while !cancel.is_cancelled() {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            data = recv(&rx) => data,
        };
        let Some(mut data) = received else {
            debug!(consumer = id, "channel closed");
            break;
        };

        let aggregate = Arc::clone(&aggregate);
        let outcome = task::spawn_blocking(move || {
            workload::consume_vector(&mut data, iterations);
            aggregate.append(data)
        })
        .await?;

        stats.consumed.fetch_add(1, Ordering::SeqCst);
        match outcome {
            AppendOutcome::Compacted { .. } => {
                debug!(consumer = id, len = outcome.len_after(), "consumer triggered compaction")
            }
            AppendOutcome::Appended { .. } => {
                trace!(consumer = id, len = outcome.len_after(), "vector appended")
            }
        }
    }
    debug!(consumer = id, "consumer stopped");
    Ok(())
}

/// Standalone compute loop with no channel interaction.
pub async fn run_main_loop(
    size: usize,
    iterations: usize,
    cancel: CancellationSignal,
    stats: Arc<PipelineStats>,
) -> Result<(), Error> {
    debug!(size, iterations, "main loop started");
    while !cancel.is_cancelled() {
        task::spawn_blocking(move || workload::main_loop_round(size, iterations)).await??;
        stats.main_loop_rounds.fetch_add(1, Ordering::SeqCst);
    }
    debug!(rounds = stats.main_loop_rounds(), "main loop stopped");
    Ok(())
}

async fn recv(rx: &Mutex<mpsc::Receiver<FlatVector>>) -> Option<FlatVector> {
    rx.lock().await.recv().await
}
