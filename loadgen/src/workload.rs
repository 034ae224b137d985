//! One round of each CPU-bound workload.
//!
//! These are plain blocking functions; the pipeline runs them on tokio's
//! blocking pool.

use std::hint::black_box;

use crate::matrix::{FlatVector, Grid};
use crate::transform::Transform;
use crate::Error;

/// Producer round: square a generated grid, flatten it and run the
/// `SinCos` kernel over every element.
pub fn produce_vector(size: usize, iterations: usize) -> Result<FlatVector, Error> {
    let a = Grid::generate(size);
    let b = Grid::generate(size);
    let product = a.multiply(&b)?;
    Ok(product.flatten_with(|v| Transform::SinCos.apply(v, iterations)))
}

/// Consumer round: run the `SquareSin` kernel over a received vector.
pub fn consume_vector(data: &mut [f64], iterations: usize) {
    Transform::SquareSin.apply_all(data, iterations);
}

/// Main-loop round: square a generated grid and run the `TanLog` kernel
/// over the product. The result is thrown away.
pub fn main_loop_round(size: usize, iterations: usize) -> Result<(), Error> {
    let a = Grid::generate(size);
    let b = Grid::generate(size);
    let mut product = a.multiply(&b)?;
    product.map_in_place(|v| Transform::TanLog.apply(v, iterations));
    black_box(product);
    Ok(())
}

/// On-demand spike: one generate + multiply round with no transform.
pub fn hello_round(size: usize) -> Result<(), Error> {
    let a = Grid::generate(size);
    let b = Grid::generate(size);
    black_box(a.multiply(&b)?);
    Ok(())
}
