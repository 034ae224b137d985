use std::env;
use std::sync::Arc;

use loadgen::{CancellationSignal, Pipeline, SharedAggregate};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use loadgen_server::http::{self, PrimaryState};
use loadgen_server::{shutdown, ProfileSink, ServerConfig, ServerError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_args(env::args().skip(1))?;
    run(config).await?;
    Ok(())
}

async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let profile = Arc::new(ProfileSink::create(&config.profile_path).await?);
    let profile_path = std::path::absolute(profile.path())?;
    info!(path = %profile_path.display(), "writing profile");

    let cancel = CancellationSignal::new();
    let aggregate = Arc::new(SharedAggregate::new(config.pipeline.compaction));

    let primary = TcpListener::bind(config.primary_addr).await?;
    let trigger = TcpListener::bind(config.trigger_addr).await?;
    info!(addr = %config.primary_addr, "primary service listening");
    info!(addr = %config.trigger_addr, "trigger service listening");

    let state = Arc::new(PrimaryState {
        cancel: cancel.clone(),
        profile: Arc::clone(&profile),
        hello_matrix_size: config.hello_matrix_size,
    });
    tokio::spawn(async move {
        if let Err(e) = http::serve_primary(primary, state).await {
            error!(error = %e, "primary service failed");
        }
    });
    let hello_target = config.hello_target();
    tokio::spawn(async move {
        if let Err(e) = http::serve_trigger(trigger, hello_target).await {
            error!(error = %e, "trigger service failed");
        }
    });

    let pipeline =
        match Pipeline::spawn(config.pipeline.clone(), Arc::clone(&aggregate), cancel.clone()) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                profile.stop().await?;
                return Err(e.into());
            }
        };
    let sampler = profile.start_sampling(
        pipeline.stats(),
        Arc::clone(&aggregate),
        config.sample_interval,
        cancel.clone(),
    );

    tokio::select! {
        _ = cancel.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("interrupted");
            cancel.cancel();
        }
    }

    shutdown(pipeline, sampler, &profile).await?;

    let stats = aggregate.stats();
    info!(
        appended_total = stats.appended_total,
        compactions = stats.compactions,
        "load generation finished"
    );
    Ok(())
}
