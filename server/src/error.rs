use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Http(#[from] http::Error),

    #[error("malformed profile at line {line}: {reason}")]
    MalformedProfile { line: usize, reason: String },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Loadgen(#[from] loadgen::Error),
}
