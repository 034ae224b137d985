use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use loadgen::config::HELLO_MATRIX_SIZE;
use loadgen::PipelineConfig;

use crate::error::ServerError;

pub const DEFAULT_PRIMARY_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_TRIGGER_ADDR: &str = "0.0.0.0:8090";
pub const DEFAULT_PROFILE_PATH: &str = "cpu.prof";
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub primary_addr: SocketAddr,
    pub trigger_addr: SocketAddr,
    pub profile_path: PathBuf,
    pub sample_interval: Duration,
    pub hello_matrix_size: usize,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            primary_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            trigger_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
            profile_path: PathBuf::from(DEFAULT_PROFILE_PATH),
            sample_interval: SAMPLE_INTERVAL,
            hello_matrix_size: HELLO_MATRIX_SIZE,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses `[primary_addr] [trigger_addr] [profile_path]`, program name
    /// already stripped. Missing values keep their defaults.
    pub fn from_args<I>(args: I) -> Result<Self, ServerError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let mut config = Self::default();

        if let Some(addr) = args.next() {
            config.primary_addr = parse_addr(&addr)?;
        }
        if let Some(addr) = args.next() {
            config.trigger_addr = parse_addr(&addr)?;
        }
        if let Some(path) = args.next() {
            config.profile_path = PathBuf::from(path);
        }
        if let Some(extra) = args.next() {
            return Err(ServerError::Config(format!("unexpected argument {:?}", extra)));
        }

        Ok(config)
    }

    /// Address the trigger listener calls to reach `/hello`.
    pub fn hello_target(&self) -> String {
        format!("127.0.0.1:{}", self.primary_addr.port())
    }
}

fn parse_addr(value: &str) -> Result<SocketAddr, ServerError> {
    value
        .parse()
        .map_err(|e| ServerError::Config(format!("bad listen address {:?}: {}", value, e)))
}
