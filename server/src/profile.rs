//! Text profile written from startup until the load is stopped.
//!
//! Layout:
//!
//! ```text
//! # loadgen profile
//! started: 2026-01-01T00:00:00+00:00
//! 1767225600000 produced=3 consumed=2 main_rounds=1 aggregate_len=80000 ...
//! ...
//! stopped: 2026-01-01T00:00:09+00:00
//! samples: 9
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use loadgen::{AggregateStats, CancellationSignal, PipelineStats, SharedAggregate};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub(crate) const HEADER: &str = "# loadgen profile";

/// One line of the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub produced: u64,
    pub consumed: u64,
    pub main_loop_rounds: u64,
    pub aggregate: AggregateStats,
}

impl Sample {
    pub fn collect(stats: &PipelineStats, aggregate: &SharedAggregate) -> Self {
        Self {
            timestamp_ms: Utc::now().timestamp_millis(),
            produced: stats.produced(),
            consumed: stats.consumed(),
            main_loop_rounds: stats.main_loop_rounds(),
            aggregate: aggregate.stats(),
        }
    }

    fn to_line(self) -> String {
        format!(
            "{} produced={} consumed={} main_rounds={} aggregate_len={} appended_total={} compactions={} high_water={}\n",
            self.timestamp_ms,
            self.produced,
            self.consumed,
            self.main_loop_rounds,
            self.aggregate.len,
            self.aggregate.appended_total,
            self.aggregate.compactions,
            self.aggregate.high_water,
        )
    }
}

pub struct ProfileSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    samples: AtomicU64,
}

impl ProfileSink {
    /// Creates (or truncates) the profile file and writes the header.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path).await?);
        let header = format!("{}\nstarted: {}\n", HEADER, Utc::now().to_rfc3339());
        writer.write_all(header.as_bytes()).await?;
        writer.flush().await?;

        Ok(Self {
            path,
            writer: Mutex::new(Some(writer)),
            samples: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Appends one sample and flushes it. Returns `false` once the sink is
    /// stopped.
    pub async fn record(&self, sample: Sample) -> Result<bool, std::io::Error> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Ok(false);
        };
        writer.write_all(sample.to_line().as_bytes()).await?;
        writer.flush().await?;
        self.samples.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Writes the footer and closes the file. Returns `false` if it was
    /// already stopped.
    pub async fn stop(&self) -> Result<bool, std::io::Error> {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(false);
        };
        let footer = format!(
            "stopped: {}\nsamples: {}\n",
            Utc::now().to_rfc3339(),
            self.samples()
        );
        writer.write_all(footer.as_bytes()).await?;
        writer.flush().await?;
        writer.into_inner().sync_all().await?;
        debug!(path = %self.path.display(), "profile finalized");
        Ok(true)
    }

    /// Records a sample every `interval` until cancelled or stopped.
    pub fn start_sampling(
        self: &Arc<Self>,
        stats: Arc<PipelineStats>,
        aggregate: Arc<SharedAggregate>,
        interval: Duration,
        cancel: CancellationSignal,
    ) -> JoinHandle<()> {
        let sink = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match sink.record(Sample::collect(&stats, &aggregate)).await {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(e) => {
                                warn!(error = %e, "failed to write profile sample");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}
