//! Voltage-keyed lookup tables
//!
//! A conductance trace `g(t)` with reversal `Er` is exposed as the family of
//! equivalent current traces `I_v(t) = g(t) * (Er - v)`, one per voltage on a
//! regular grid. The table is evaluated lazily; only the grid is stored.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, Result, SpikeInfoError};

/// Regular voltage grid `v_min, v_min + dv, ..., v_max` (mV)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoltageGrid {
    pub v_min: f64,
    pub v_max: f64,
    pub dv: f64,
}

impl Default for VoltageGrid {
    fn default() -> Self {
        Self {
            v_min: -100.0,
            v_max: 50.0,
            dv: 0.5,
        }
    }
}

impl VoltageGrid {
    pub fn new(v_min: f64, v_max: f64, dv: f64) -> Result<Self> {
        ensure_positive("dv", dv)?;
        if !(v_min.is_finite() && v_max.is_finite() && v_max >= v_min) {
            return Err(SpikeInfoError::invalid(
                "v_max",
                format!("must be >= v_min ({v_min}), got {v_max}"),
            ));
        }
        Ok(Self { v_min, v_max, dv })
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        ((self.v_max - self.v_min) / self.dv + 1e-9).floor() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn voltage(&self, index: usize) -> f64 {
        self.v_min + index as f64 * self.dv
    }

    /// Grid index of `v`, which must sit on a grid point
    pub fn index_of(&self, v: f64) -> Result<usize> {
        let pos = (v - self.v_min) / self.dv;
        let index = pos.round();
        if !pos.is_finite() || index < 0.0 || (pos - index).abs() > 1e-6 || index as usize >= self.len() {
            return Err(SpikeInfoError::OffGrid { voltage: v });
        }
        Ok(index as usize)
    }

    pub fn voltages(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.voltage(i))
    }
}

/// Conductance trace keyed by membrane potential
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConductanceLut {
    conductance: Vec<f64>,
    reversal: f64,
    grid: VoltageGrid,
}

impl ConductanceLut {
    pub fn new(conductance: Vec<f64>, reversal: f64, grid: VoltageGrid) -> Self {
        Self {
            conductance,
            reversal,
            grid,
        }
    }

    pub fn grid(&self) -> &VoltageGrid {
        &self.grid
    }

    pub fn reversal(&self) -> f64 {
        self.reversal
    }

    pub fn len(&self) -> usize {
        self.conductance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conductance.is_empty()
    }

    /// Current trace at grid voltage `v`: `g * (Er - v)`
    pub fn current_at(&self, v: f64) -> Result<Vec<f64>> {
        self.grid.index_of(v)?;
        let span = self.reversal - v;
        Ok(self.conductance.iter().map(|g| g * span).collect())
    }

    /// Conductance recovered from the table entry at `v`: `|I(v) / (v - Er)|`
    ///
    /// Fails at the reversal potential, where the entry carries no conductance
    /// information.
    pub fn conductance_at(&self, v: f64) -> Result<Vec<f64>> {
        let current = self.current_at(v)?;
        let span = v - self.reversal;
        if span == 0.0 {
            return Err(SpikeInfoError::invalid(
                "v",
                format!("cannot recover conductance at the reversal potential {v}"),
            ));
        }
        Ok(current.iter().map(|i| (i / span).abs()).collect())
    }
}
