//! Wang-Buzsaki Interneuron
//!
//! Hippocampal fast-spiking interneuron (Wang & Buzsaki 1996).
//!
//! ```text
//! C_m dV/dt = g_Na m∞³ h (E_Na - V) + g_K n⁴ (E_K - V) + g_L (E_L - V) + I_inj
//! dh/dt = φ (α_h (1 - h) - β_h h)
//! dn/dt = φ (α_n (1 - n) - β_n n),  φ = 5
//! ```
//!
//! Per-area units: µF/cm², mS/cm², µA/cm². A spike is the rising edge of
//! `V > -20 mV` with a 2 ms refractory period. The model has a single
//! parameter set.

use super::traits::{exprel, relax, run_clamped, Membrane, NeuronAdapter, Recording, SpikeClock};
use super::NeuronSnapshot;
use crate::error::{Result, SpikeInfoError};
use crate::injection::{ClampSample, Injection};

const C_M: f64 = 1.0;
const G_L: f64 = 0.1;
const G_NA: f64 = 35.0;
const G_K: f64 = 9.0;
const E_L: f64 = -65.0;
const E_NA: f64 = 55.0;
const E_K: f64 = -90.0;
const PHI: f64 = 5.0;
const V_THRESHOLD: f64 = -20.0;

/// Wang-Buzsaki interneuron
#[derive(Clone, Debug)]
pub struct WangBuzsakiNeuron {
    v: f64,
    h: f64,
    n: f64,
    clock: SpikeClock,
}

impl Default for WangBuzsakiNeuron {
    fn default() -> Self {
        Self::new()
    }
}

impl WangBuzsakiNeuron {
    pub fn new() -> Self {
        Self {
            v: -70.0,
            h: 1.0,
            n: 0.0,
            clock: SpikeClock::default(),
        }
    }

    fn m_inf(v: f64) -> f64 {
        let alpha = 1.0 / exprel(-(v + 35.0) / 10.0);
        let beta = 4.0 * (-(v + 60.0) / 18.0).exp();
        alpha / (alpha + beta)
    }

    fn h_rates(v: f64) -> (f64, f64) {
        let alpha = 0.07 * (-(v + 58.0) / 20.0).exp();
        let beta = 1.0 / ((-0.1 * (v + 28.0)).exp() + 1.0);
        (PHI * alpha, PHI * beta)
    }

    fn n_rates(v: f64) -> (f64, f64) {
        let alpha = 0.1 / exprel(-(v + 34.0) / 10.0);
        let beta = 0.125 * (-(v + 44.0) / 80.0).exp();
        (PHI * alpha, PHI * beta)
    }
}

impl Membrane for WangBuzsakiNeuron {
    fn advance(&mut self, input: &ClampSample, h: f64) -> bool {
        let v = self.v;
        let g_na = G_NA * Self::m_inf(v).powi(3) * self.h;
        let g_k = G_K * self.n.powi(4);
        let (clamp_drive, clamp_g) = input.terms();

        let g_total = g_na + g_k + G_L + clamp_g;
        let v_inf = (g_na * E_NA + g_k * E_K + G_L * E_L + clamp_drive) / g_total;
        self.v = relax(v, v_inf, C_M / g_total, h);

        let (ah, bh) = Self::h_rates(v);
        self.h = relax(self.h, ah / (ah + bh), 1.0 / (ah + bh), h);
        let (an, bn) = Self::n_rates(v);
        self.n = relax(self.n, an / (an + bn), 1.0 / (an + bn), h);

        self.clock.tick(h, self.v > V_THRESHOLD)
    }

    fn voltage(&self) -> f64 {
        self.v
    }
}

impl NeuronAdapter for WangBuzsakiNeuron {
    fn simulate(&mut self, injection: &Injection, duration: f64, parameter_set: usize) -> Result<Recording> {
        if parameter_set != 0 {
            return Err(SpikeInfoError::ParameterSetOutOfRange {
                index: parameter_set,
                available: 1,
            });
        }
        run_clamped(self, injection, duration)
    }

    fn snapshot(&self) -> NeuronSnapshot {
        NeuronSnapshot::WangBuzsaki {
            v: self.v,
            h: self.h,
            n: self.n,
            clock: self.clock,
        }
    }

    fn restore(&mut self, snapshot: &NeuronSnapshot) -> Result<()> {
        match snapshot {
            NeuronSnapshot::WangBuzsaki { v, h, n, clock } => {
                self.v = *v;
                self.h = *h;
                self.n = *n;
                self.clock = *clock;
                Ok(())
            }
            other => Err(SpikeInfoError::InvalidState(format!(
                "cannot restore {} snapshot into a Wang-Buzsaki neuron",
                other.model_name()
            ))),
        }
    }

    fn parameter_sets(&self) -> usize {
        1
    }

    fn membrane(&self) -> f64 {
        self.v
    }

    fn model_name(&self) -> &'static str {
        "WangBuzsaki"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_without_input() {
        let mut neuron = WangBuzsakiNeuron::new();
        let rec = neuron
            .simulate(&Injection::constant_current(0.0, 0.5, 200.0), 200.0, 0)
            .unwrap();
        assert!(rec.spike_times.is_empty());
        assert!(neuron.membrane() > -70.0 && neuron.membrane() < -60.0);
    }

    #[test]
    fn test_tonic_firing() {
        let mut neuron = WangBuzsakiNeuron::new();
        let rec = neuron
            .simulate(&Injection::constant_current(5.0, 0.1, 200.0), 200.0, 0)
            .unwrap();
        assert!(rec.spike_times.len() >= 2, "{} spikes", rec.spike_times.len());
        assert!(rec.voltage.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut neuron = WangBuzsakiNeuron::new();
        let snapshot = neuron.snapshot();
        let injection = Injection::constant_current(2.0, 0.2, 40.0);
        let first = neuron.simulate(&injection, 40.0, 0).unwrap();
        neuron.restore(&snapshot).unwrap();
        let second = neuron.simulate(&injection, 40.0, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_parameter_set() {
        let mut neuron = WangBuzsakiNeuron::new();
        assert_eq!(neuron.parameter_sets(), 1);
        assert!(matches!(
            neuron.simulate(&Injection::constant_current(0.0, 0.5, 1.0), 1.0, 1),
            Err(SpikeInfoError::ParameterSetOutOfRange { index: 1, available: 1 })
        ));
    }
}
