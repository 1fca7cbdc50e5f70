//! Barrel-Cortex Cell Model
//!
//! Single-compartment Hodgkin-Huxley cell of rat barrel cortex, pyramidal or
//! interneuron depending on the parameter table.
//!
//! ## Equations
//!
//! ```text
//! C_m dV/dt = -(I_leak + I_Na + I_K) + I_inj
//! I_Na = g_Na m³ h (V - E_Na)     m, h instantaneous
//! I_K  = g_K n⁴ (V - E_K)         n dynamic
//!
//! m = 1 / (1 + exp(-(V - Vh_m) / k_m))
//! h = 1 / (1 + exp( (V - Vh_h) / k_h))
//! ```
//!
//! A spike is the rising edge of `m > 0.5`, with a 2 ms refractory period.
//! Units: mV, ms, µS, nF, nA.

use super::params::{BarrelParameters, CellClass, ParameterTable};
use super::traits::{exprel, relax, run_clamped, Membrane, NeuronAdapter, Recording, SpikeClock};
use super::NeuronSnapshot;
use crate::error::{Result, SpikeInfoError};
use crate::injection::{ClampSample, Injection};

const E_LEAK: f64 = -65.0;
const E_NA: f64 = 50.0;
const E_K: f64 = -90.0;
/// K kinetics offset (mV)
const V_T: f64 = -63.0;

/// Barrel-cortex Hodgkin-Huxley cell
#[derive(Clone, Debug)]
pub struct BarrelCell {
    class: CellClass,
    table: ParameterTable,
    params: BarrelParameters,
    /// Membrane potential (mV)
    v: f64,
    /// K activation
    n: f64,
    clock: SpikeClock,
}

impl BarrelCell {
    /// Resting potential at construction (mV)
    pub const V_INIT: f64 = -65.0;

    /// Cell with the built-in table for `class`
    pub fn new(class: CellClass) -> Self {
        Self::build(class, ParameterTable::builtin(class), BarrelParameters::reference(class))
    }

    /// Cell using a loaded table; parameter set 0 is active until a run selects another
    pub fn with_table(class: CellClass, table: ParameterTable) -> Result<Self> {
        let params = table.column(0)?;
        Ok(Self::build(class, table, params))
    }

    fn build(class: CellClass, table: ParameterTable, params: BarrelParameters) -> Self {
        Self {
            class,
            table,
            params,
            v: Self::V_INIT,
            n: 0.0,
            clock: SpikeClock::default(),
        }
    }

    pub fn class(&self) -> CellClass {
        self.class
    }

    pub fn params(&self) -> &BarrelParameters {
        &self.params
    }

    fn na_activation(&self, v: f64) -> f64 {
        1.0 / (1.0 + (-(v - self.params.vh_m()) / self.params.k_m).exp())
    }

    fn na_inactivation(&self, v: f64) -> f64 {
        1.0 / (1.0 + ((v - self.params.vh_h) / self.params.k_h).exp())
    }

    fn k_rates(v: f64) -> (f64, f64) {
        let alpha = 0.032 * 5.0 / exprel((15.0 - v + V_T) / 5.0);
        let beta = 0.5 * ((10.0 - v + V_T) / 40.0).exp();
        (alpha, beta)
    }
}

impl Membrane for BarrelCell {
    fn advance(&mut self, input: &ClampSample, h: f64) -> bool {
        let p = self.params;
        let v = self.v;

        let g_na = p.g_na * self.na_activation(v).powi(3) * self.na_inactivation(v);
        let g_k = p.g_k * self.n.powi(4);
        let (clamp_drive, clamp_g) = input.terms();

        let g_total = g_na + g_k + p.g_leak + clamp_g;
        let v_inf = (g_na * E_NA + g_k * E_K + p.g_leak * E_LEAK + clamp_drive) / g_total;
        self.v = relax(v, v_inf, p.c_m / g_total, h);

        let (alpha, beta) = Self::k_rates(v);
        self.n = relax(self.n, alpha / (alpha + beta), 1.0 / (alpha + beta), h);

        let above = self.na_activation(self.v) > 0.5;
        self.clock.tick(h, above)
    }

    fn voltage(&self) -> f64 {
        self.v
    }
}

impl NeuronAdapter for BarrelCell {
    fn simulate(&mut self, injection: &Injection, duration: f64, parameter_set: usize) -> Result<Recording> {
        self.params = self.table.column(parameter_set)?;
        run_clamped(self, injection, duration)
    }

    fn snapshot(&self) -> NeuronSnapshot {
        NeuronSnapshot::Barrel {
            class: self.class,
            v: self.v,
            n: self.n,
            clock: self.clock,
        }
    }

    fn restore(&mut self, snapshot: &NeuronSnapshot) -> Result<()> {
        match snapshot {
            NeuronSnapshot::Barrel { class, v, n, clock } if *class == self.class => {
                self.v = *v;
                self.n = *n;
                self.clock = *clock;
                Ok(())
            }
            other => Err(SpikeInfoError::InvalidState(format!(
                "cannot restore {} snapshot into a {} barrel cell",
                other.model_name(),
                self.class.short_name()
            ))),
        }
    }

    fn parameter_sets(&self) -> usize {
        self.table.len()
    }

    fn membrane(&self) -> f64 {
        self.v
    }

    fn model_name(&self) -> &'static str {
        match self.class {
            CellClass::Pyramidal => "BarrelPC",
            CellClass::Interneuron => "BarrelIN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::ReversalPotentials;

    fn step_current(amplitude: f64, duration: f64) -> Injection {
        Injection::constant_current(amplitude, 0.5, duration)
    }

    #[test]
    fn test_rest_is_stable() {
        for class in [CellClass::Pyramidal, CellClass::Interneuron] {
            let mut cell = BarrelCell::new(class);
            let rec = cell.simulate(&step_current(0.0, 200.0), 200.0, 0).unwrap();
            assert!(rec.spike_times.is_empty());
            assert_eq!(rec.voltage.len(), 400);
            assert!((cell.membrane() - E_LEAK).abs() < 1.0, "{}", cell.membrane());
        }
    }

    #[test]
    fn test_strong_current_spikes() {
        for class in [CellClass::Pyramidal, CellClass::Interneuron] {
            let mut cell = BarrelCell::new(class);
            let rec = cell.simulate(&step_current(20.0, 100.0), 100.0, 0).unwrap();
            assert!(!rec.spike_times.is_empty(), "{class:?} never fired");
            assert!(rec.spike_times.iter().all(|&t| (0.0..=100.0).contains(&t)));
            // Refractory spacing
            for pair in rec.spike_times.windows(2) {
                assert!(pair[1] - pair[0] >= SpikeClock::REFRACTORY - 1e-9);
            }
        }
    }

    #[test]
    fn test_conductance_clamp() {
        let reversal = ReversalPotentials::default();
        let excite = Injection::Conductance {
            dt: 0.5,
            exc: vec![1.0; 200],
            inh: vec![0.0; 200],
            reversal,
        };
        let mut cell = BarrelCell::new(CellClass::Pyramidal);
        let rec = cell.simulate(&excite, 100.0, 0).unwrap();
        assert!(!rec.spike_times.is_empty());

        let inhibit = Injection::Conductance {
            dt: 0.5,
            exc: vec![0.0; 200],
            inh: vec![1.0; 200],
            reversal,
        };
        let mut cell = BarrelCell::new(CellClass::Pyramidal);
        let rec = cell.simulate(&inhibit, 100.0, 0).unwrap();
        assert!(rec.spike_times.is_empty());
        assert!((cell.membrane() - reversal.inh).abs() < 2.0);
    }

    #[test]
    fn test_restore_reproduces_run() {
        let mut cell = BarrelCell::new(CellClass::Pyramidal);
        let snapshot = cell.snapshot();
        let injection = step_current(20.0, 50.0);

        let first = cell.simulate(&injection, 50.0, 1).unwrap();
        assert_ne!(cell.snapshot(), snapshot);

        cell.restore(&snapshot).unwrap();
        let second = cell.simulate(&injection, 50.0, 1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_restore_rejects_other_class() {
        let pc = BarrelCell::new(CellClass::Pyramidal);
        let mut interneuron = BarrelCell::new(CellClass::Interneuron);
        assert!(matches!(
            interneuron.restore(&pc.snapshot()),
            Err(SpikeInfoError::InvalidState(_))
        ));
    }

    #[test]
    fn test_parameter_set_selection() {
        let mut cell = BarrelCell::new(CellClass::Interneuron);
        assert_eq!(cell.parameter_sets(), 3);
        cell.simulate(&step_current(0.0, 1.0), 1.0, 2).unwrap();
        assert_eq!(cell.params().g_k, 1.8);
        assert!(matches!(
            cell.simulate(&step_current(0.0, 1.0), 1.0, 3),
            Err(SpikeInfoError::ParameterSetOutOfRange { index: 3, available: 3 })
        ));
    }

    #[test]
    fn test_negative_conductance_rejected() {
        let injection = Injection::Conductance {
            dt: 0.5,
            exc: vec![-0.1; 4],
            inh: vec![0.0; 4],
            reversal: ReversalPotentials::default(),
        };
        let mut cell = BarrelCell::new(CellClass::Pyramidal);
        assert!(cell.simulate(&injection, 2.0, 0).is_err());
    }
}
