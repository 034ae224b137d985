//! Orderly teardown once the cancellation signal has fired.

use loadgen::Pipeline;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::ServerError;
use crate::profile::ProfileSink;

/// Joins the pipeline and the sampler, then finalizes the profile.
///
/// The profile is finalized even when a task failed; the first failure is
/// returned afterwards.
pub async fn shutdown(
    pipeline: Pipeline,
    sampler: JoinHandle<()>,
    profile: &ProfileSink,
) -> Result<(), ServerError> {
    let joined = pipeline.join().await;
    let sampled = sampler.await;
    let stopped = profile.stop().await;

    if let Err(e) = &stopped {
        warn!(path = %profile.path().display(), error = %e, "failed to finalize profile");
    }

    joined?;
    sampled.map_err(loadgen::Error::from)?;
    stopped?;
    Ok(())
}
