//! Fixed-iteration nonlinear element kernels.
//!
//! The kernels are only there to burn cycles. Values routinely blow up to
//! `inf` or `NaN`; that is left alone so every iteration costs the same.

/// One of the three per-element transforms run by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// `v = sin(v)^2 + cos(v)`, run by the producer.
    SinCos,
    /// `v = v^2 * sin(v) + sqrt(|v|)`, run by the consumers.
    SquareSin,
    /// `v = tan(v)^2 + ln(|v| + 1)`, run by the main-loop task.
    TanLog,
}

impl Transform {
    #[inline]
    pub fn step(self, v: f64) -> f64 {
        match self {
            Transform::SinCos => v.sin().powi(2) + v.cos(),
            Transform::SquareSin => v.powi(2) * v.sin() + v.abs().sqrt(),
            Transform::TanLog => v.tan().powi(2) + (v.abs() + 1.0).ln(),
        }
    }

    /// Runs `iterations` steps on a single value.
    pub fn apply(self, mut v: f64, iterations: usize) -> f64 {
        for _ in 0..iterations {
            v = self.step(v);
        }
        v
    }

    /// Runs `iterations` steps on every element of `data` in place.
    pub fn apply_all(self, data: &mut [f64], iterations: usize) {
        for v in data {
            *v = self.apply(*v, iterations);
        }
    }
}
