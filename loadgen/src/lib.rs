//! CPU and lock-contention load generation for profiler exercises.
//!
//! `loadgen` keeps a machine busy with deliberately expensive matrix
//! arithmetic so that a CPU / mutex profiler has something to look at.
//! The numbers it computes are meaningless; only the cost matters.
//!
//! # Pieces
//!
//! - [`Grid`]: square grids filled from `i*j + sqrt(i+j)` and a dense
//!   O(N³) multiply
//! - [`Transform`]: fixed-iteration trigonometric kernels
//! - [`SharedAggregate`]: a mutex-guarded buffer that sorts and truncates
//!   itself whenever it grows past its cap
//! - [`Pipeline`]: one producer, a pool of consumers and a standalone
//!   compute loop, all stopped by a [`CancellationSignal`]
//!
//! # Example
//!
//! ```
//! use loadgen::{Grid, SharedAggregate, CompactionPolicy};
//!
//! let a = Grid::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
//! let b = Grid::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();
//! let c = a.multiply(&b).unwrap();
//! assert_eq!(c.rows(), &[vec![19.0, 22.0], vec![43.0, 50.0]]);
//! assert_eq!(c.get(1, 0), Some(43.0));
//! assert_eq!(c.get(2, 0), None);
//!
//! let aggregate = SharedAggregate::new(CompactionPolicy { cap: 3, keep: 2 });
//! aggregate.append(c.flatten());
//! assert_eq!(aggregate.snapshot(), vec![19.0, 22.0]);
//! ```

mod aggregate;
mod cancel;
pub mod config;
mod error;
mod matrix;
mod pipeline;
mod transform;
pub mod workload;

pub use aggregate::{AggregateStats, AppendOutcome, SharedAggregate};
pub use cancel::CancellationSignal;
pub use config::{CompactionPolicy, PipelineConfig};
pub use error::Error;
pub use matrix::{FlatVector, Grid, generate, multiply};
pub use pipeline::{
    Pipeline, PipelineStats, SharedReceiver, run_consumer, run_main_loop, run_producer,
};
pub use transform::Transform;
