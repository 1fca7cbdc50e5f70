//! # Drive - Population-Filtered Input Signals
//!
//! Converts a hidden-state trajectory into the analog signal injected into
//! the neuron under test.
//!
//! ## Pipeline
//!
//! ```text
//! HiddenState ─┐
//!              ├─> Bernoulli spikes ─> pooled sum ─> exponential kernel ─> DriveSignal
//! Population ──┘
//! ```
//!
//! - **Single**: one current trace (current clamp)
//! - **Dual**: excitatory/inhibitory conductance pair (dynamic clamp),
//!   also exposed as voltage-keyed lookup tables

mod kernel;
pub use kernel::ExponentialKernel;

mod lut;
pub use lut::{ConductanceLut, VoltageGrid};

mod synth;
pub use synth::{
    ConductanceDrive, CurrentDrive, DriveMode, DriveSignal, DriveSynthesizer,
    ReversalPotentials, SynthesizedDrive,
};
