//! Process shell around `loadgen`: the HTTP facade, the profile sink and
//! startup configuration.

pub mod config;
pub mod error;
pub mod http;
pub mod profile;
pub mod report;
mod shutdown;

pub use config::ServerConfig;
pub use error::ServerError;
pub use profile::ProfileSink;
pub use shutdown::shutdown;
