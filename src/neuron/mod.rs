//! # Neuron - Reference Simulation Adapters
//!
//! Concrete stand-ins for the external neuron simulator: they accept an
//! [`Injection`](crate::injection::Injection), a duration and a parameter-set
//! index, and return a voltage trace and spike times.
//!
//! ## Models
//!
//! - **Barrel**: rat barrel-cortex pyramidal cell or interneuron with
//!   instantaneous Na gating, fitted parameter tables
//! - **WangBuzsaki**: hippocampal fast-spiking interneuron
//!
//! ## Design Principles
//!
//! 1. **Facade API**: callers go through [`NeuronAdapter`]
//! 2. **Value snapshots**: state is saved into a [`NeuronSnapshot`] and
//!    restored explicitly; nothing is shared between adapters
//! 3. **Exponential Euler**: sub-steps of at most [`MAX_STEP`] ms, injection
//!    held per sample
//!
//! ## Example
//!
//! ```ignore
//! use spikeinfo::neuron::{CellClass, NeuronAdapter, NeuronModel};
//! use spikeinfo::injection::Injection;
//!
//! let mut cell = NeuronModel::barrel(CellClass::Pyramidal);
//! let initial = cell.snapshot();
//! let rec = cell.simulate(&Injection::constant_current(20.0, 0.5, 100.0), 100.0, 0)?;
//! cell.restore(&initial)?;
//! ```

// Core traits (facade API)
mod traits;
pub use traits::{NeuronAdapter, Recording, SpikeClock, MAX_STEP};

// Parameter tables
mod params;
pub use params::{BarrelParameters, CellClass, ParameterTable, TABLE_ROWS};

// Neuron models
mod barrel;
pub use barrel::BarrelCell;
mod wang_buzsaki;
pub use wang_buzsaki::WangBuzsakiNeuron;

// Facade enum
mod model;
pub use model::NeuronModel;

// Snapshot types for trial independence
mod snapshot;
pub use snapshot::NeuronSnapshot;
