//! Causal exponential smoothing kernel
//!
//! ```text
//! k(t) = exp(-t/tau) / tau      (unit area)
//! y[n] = d * y[n-1] + (1 - d) * x[n],   d = exp(-dt/tau)
//! ```
//!
//! The recursive form is the exact discrete convolution with the sampled,
//! renormalized kernel `(1-d) * d^j`, so a constant input converges to itself.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, Result};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExponentialKernel {
    tau: f64,
    dt: f64,
    decay: f64,
}

impl ExponentialKernel {
    pub fn new(tau: f64, dt: f64) -> Result<Self> {
        ensure_positive("kernel_tau", tau)?;
        ensure_positive("dt", dt)?;
        Ok(Self {
            tau,
            dt,
            decay: (-dt / tau).exp(),
        })
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Filter `input` starting from a zero state
    pub fn apply(&self, input: &[f64]) -> Vec<f64> {
        let gain = 1.0 - self.decay;
        let mut y = 0.0;
        input
            .iter()
            .map(|&x| {
                y = self.decay * y + gain * x;
                y
            })
            .collect()
    }

    /// First `len` sampled kernel taps
    pub fn taps(&self, len: usize) -> Vec<f64> {
        let gain = 1.0 - self.decay;
        (0..len).map(|j| gain * self.decay.powi(j as i32)).collect()
    }
}
