//! # Spikeinfo - Information Transfer Under Clamp
//!
//! How much does a single neuron's spike train say about a hidden binary
//! input, and does it matter whether the input arrives as a current or as
//! conductances?
//!
//! ## Core Components
//!
//! - **Hidden state**: Two-state Markov process (`x ∈ {0, 1}`) on a fixed grid
//! - **Population**: `N` Poisson units with per-unit `qon`/`qoff` rates
//! - **Drive**: Kernel-smoothed population evidence as current or E/I conductances
//! - **Calibration**: Scale search that lands the neuron on a target rate
//! - **Neurons**: Barrel-cortex HH cells (PC/IN) and the Wang-Buzsaki interneuron
//! - **Estimator**: Bayesian log-odds filter, MI in bits from cross-entropy
//!
//! ## Pipeline
//!
//! 1. Generate the hidden state and population spikes
//! 2. Synthesize current and conductance drives
//! 3. Calibrate each drive against the neuron, then clamp
//! 4. Decode the hidden state from output spikes, report MI per clamp mode
//!
//! ## Example
//!
//! ```ignore
//! use spikeinfo::{ExperimentConfig, TrialRunner};
//!
//! let config = ExperimentConfig::interneuron();
//! let report = TrialRunner::from_config(config)?.run(42)?;
//! println!("current {:.3} bits, dynamic {:.3} bits",
//!     report.current.mean_mi_bits, report.dynamic.mean_mi_bits);
//! ```

// Error types
mod error;
pub use error::{Result, SpikeInfoError};

// Seeded random streams
pub mod rng;

// Input generation
pub mod hidden_state;
pub use hidden_state::{HiddenState, MarkovRates};

pub mod population;
pub use population::{PopulationWeights, QonQoffPolicy, Regime, ThresholdPopulation};

pub mod drive;
pub use drive::{
    ConductanceDrive, ConductanceLut, CurrentDrive, DriveMode, DriveSignal, DriveSynthesizer,
    ExponentialKernel, ReversalPotentials, SynthesizedDrive, VoltageGrid,
};

// Clamp protocol
pub mod injection;
pub use injection::{ClampSample, Injection};

pub mod calibrate;
pub use calibrate::{
    Calibration, CalibrationConfig, CalibrationFailure, CalibrationOutcome, DriveCalibrator,
    FailureReason, RateMeasurement, RateTarget,
};

// Neuron models
pub mod neuron;
pub use neuron::{
    BarrelCell, CellClass, NeuronAdapter, NeuronModel, NeuronSnapshot, ParameterTable,
    Recording, WangBuzsakiNeuron,
};

// Information measurement
pub mod spike_train;
pub use spike_train::SpikeTrain;

pub mod estimator;
pub use estimator::{MIResult, MutualInformationEstimator, PosteriorTrace};

// Experiment driver
pub mod experiment;
pub use experiment::{
    make_dynamic_experiment, ExperimentConfig, ExperimentInput, ExperimentReport, ModelKind,
    TrialRecord, TrialRunner,
};
