//! Core Traits - Facade API for Neuron Adapters
//!
//! ## NeuronAdapter Trait
//!
//! The only interface the calibrator and trial runner use. A simulation
//! continues from the adapter's current state; callers restore a snapshot
//! first when they need independent runs.
//!
//! ## Membrane Trait
//!
//! Crate-internal integration step shared by all models, so sampling,
//! sub-stepping and spike bookkeeping live in one place (`run_clamped`).

use serde::{Deserialize, Serialize};

use super::NeuronSnapshot;
use crate::error::{ensure_positive, Result, SpikeInfoError};
use crate::injection::{ClampSample, Injection};

/// Largest integration step (ms)
pub const MAX_STEP: f64 = 0.025;

/// Voltage trace and spike times from one simulation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Sampling step of `voltage` (ms), the injection step
    pub dt: f64,
    /// Membrane potential at the start of each sample (mV)
    pub voltage: Vec<f64>,
    /// Spike times relative to the start of the run (ms)
    pub spike_times: Vec<f64>,
}

impl Recording {
    pub fn duration(&self) -> f64 {
        self.voltage.len() as f64 * self.dt
    }

    /// Mean firing rate in Hz
    pub fn rate_hz(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        self.spike_times.len() as f64 / duration * 1000.0
    }
}

/// Black-box neuron simulator
pub trait NeuronAdapter: Send {
    /// Run `duration` ms of `injection` with parameter set `parameter_set`
    fn simulate(&mut self, injection: &Injection, duration: f64, parameter_set: usize) -> Result<Recording>;

    /// Value snapshot of the dynamic state
    fn snapshot(&self) -> NeuronSnapshot;

    /// Restore a snapshot taken from the same kind of model
    fn restore(&mut self, snapshot: &NeuronSnapshot) -> Result<()>;

    /// Number of selectable parameter sets
    fn parameter_sets(&self) -> usize;

    /// Membrane potential (mV)
    fn membrane(&self) -> f64;

    /// Model name for logs
    fn model_name(&self) -> &'static str;
}

/// One exponential-Euler step of a membrane under a held clamp input
pub(crate) trait Membrane {
    /// Advance by `h` ms; true when a spike was emitted during the step
    fn advance(&mut self, input: &ClampSample, h: f64) -> bool;

    fn voltage(&self) -> f64;
}

/// Drive `cell` with `injection` for `duration` ms
///
/// The injection is held per sample; each sample is split into equal
/// sub-steps no longer than [`MAX_STEP`]. Past the end of the injection the
/// last sample is held.
pub(crate) fn run_clamped<M: Membrane>(
    cell: &mut M,
    injection: &Injection,
    duration: f64,
) -> Result<Recording> {
    let dt = injection.dt();
    ensure_positive("dt", dt)?;
    ensure_positive("duration", duration)?;

    let samples = (duration / dt).round() as usize;
    let substeps = (dt / MAX_STEP).ceil().max(1.0) as usize;
    let h = dt / substeps as f64;

    let mut voltage = Vec::with_capacity(samples);
    let mut spike_times = Vec::new();
    for k in 0..samples {
        let v = cell.voltage();
        if !v.is_finite() {
            return Err(SpikeInfoError::Simulation(format!(
                "membrane potential diverged at {} ms",
                k as f64 * dt
            )));
        }
        voltage.push(v);
        let input = injection.sample(k);
        if input.g_exc < 0.0 || input.g_inh < 0.0 {
            return Err(SpikeInfoError::invalid(
                "injection",
                format!("negative conductance at sample {k}"),
            ));
        }
        for s in 0..substeps {
            if cell.advance(&input, h) {
                spike_times.push(k as f64 * dt + (s + 1) as f64 * h);
            }
        }
    }
    Ok(Recording {
        dt,
        voltage,
        spike_times,
    })
}

/// `(e^x - 1) / x`, continuous at 0
pub(crate) fn exprel(x: f64) -> f64 {
    if x.abs() < 1e-9 {
        1.0 + x / 2.0
    } else {
        x.exp_m1() / x
    }
}

/// Exponential-Euler update of `x` relaxing to `x_inf` with time constant `tau`
pub(crate) fn relax(x: f64, x_inf: f64, tau: f64, h: f64) -> f64 {
    x_inf + (x - x_inf) * (-h / tau).exp()
}

/// Spike bookkeeping: rising edge through threshold outside refractoriness
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpikeClock {
    /// Model time (ms)
    pub time: f64,
    pub last_spike: Option<f64>,
    pub above_threshold: bool,
}

impl SpikeClock {
    /// Refractory period (ms)
    pub const REFRACTORY: f64 = 2.0;

    /// Advance the clock and report a spike for a rising edge
    pub(crate) fn tick(&mut self, h: f64, above: bool) -> bool {
        self.time += h;
        let refractory = self
            .last_spike
            .is_some_and(|t| self.time - t < Self::REFRACTORY);
        let spiked = above && !self.above_threshold && !refractory;
        if spiked {
            self.last_spike = Some(self.time);
        }
        self.above_threshold = above;
        spiked
    }
}
