//! Error types for loadgen operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("matrix size mismatch: left is {left}x{left}, right is {right}x{right}")]
    SizeMismatch { left: usize, right: usize },

    #[error("grid is not square: row {row} has {len} values, expected {rows}")]
    NotSquare { rows: usize, row: usize, len: usize },

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(&'static str),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
