//! Snapshot Types for Trial Independence
//!
//! A snapshot is taken once from a freshly built adapter and restored before
//! every calibration attempt and every trial, so no run sees state left over
//! from another.

use serde::{Deserialize, Serialize};

use super::params::CellClass;
use super::traits::SpikeClock;

/// Dynamic state of a neuron model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NeuronSnapshot {
    /// Barrel-cortex cell: voltage and K activation (Na gates are instantaneous)
    Barrel {
        class: CellClass,
        v: f64,
        n: f64,
        clock: SpikeClock,
    },
    /// Wang-Buzsaki interneuron
    WangBuzsaki {
        v: f64,
        h: f64,
        n: f64,
        clock: SpikeClock,
    },
}

impl NeuronSnapshot {
    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Barrel { .. } => "Barrel",
            Self::WangBuzsaki { .. } => "WangBuzsaki",
        }
    }

    /// Membrane potential at snapshot time (mV)
    pub fn membrane(&self) -> f64 {
        match self {
            Self::Barrel { v, .. } | Self::WangBuzsaki { v, .. } => *v,
        }
    }
}
