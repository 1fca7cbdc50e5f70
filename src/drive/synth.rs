//! Population Drive Synthesizer
//!
//! Each population unit emits Bernoulli spikes per step with probability
//! `q * dt`, `q = qon[i]` while the hidden state is ON and `qoff[i]` while
//! OFF. The spikes are pooled by SUM over units and smoothed with the
//! exponential kernel.
//!
//! ```text
//! current:  I(t)     = K * ( sum_i w[i] s_i(t) / dt - theta )
//! dual:     g_exc(t) = K * ( sum_i g0_exc[i] s_i(t) / dt )
//!           g_inh(t) = K * ( sum_i g0_inh[i] s_i(t) / dt )
//!
//! g0_exc[i] = max(w[i], 0) / (E_exc - v_rest)
//! g0_inh[i] = max(-w[i], 0) / (v_rest - E_inh)
//! ```
//!
//! At `v_rest` the conductance pair reproduces the spike-driven part of the
//! current drive: `g_exc (E_exc - v) + g_inh (E_inh - v) = K * sum_i w[i] s_i / dt`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::kernel::ExponentialKernel;
use super::lut::{ConductanceLut, VoltageGrid};
use crate::error::{Result, SpikeInfoError};
use crate::hidden_state::HiddenState;
use crate::population::{PopulationWeights, ThresholdPopulation};
use crate::rng::{self, Stream};

/// Which drive representation to synthesize
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// One current series (current clamp)
    #[default]
    Single,
    /// Excitatory + inhibitory conductance pair (dynamic clamp)
    Dual,
}

/// Synaptic reversal potentials (mV)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReversalPotentials {
    pub exc: f64,
    pub inh: f64,
}

impl Default for ReversalPotentials {
    fn default() -> Self {
        Self { exc: 0.0, inh: -75.0 }
    }
}

/// Smoothed current drive, one value per hidden-state step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentDrive {
    pub dt: f64,
    pub values: Vec<f64>,
}

impl CurrentDrive {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Smoothed non-negative conductance pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConductanceDrive {
    pub dt: f64,
    pub exc: Vec<f64>,
    pub inh: Vec<f64>,
    pub reversal: ReversalPotentials,
    /// Membrane potential the base conductances were referenced to (mV)
    pub v_ref: f64,
}

impl ConductanceDrive {
    pub fn len(&self) -> usize {
        self.exc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exc.is_empty()
    }

    /// Equivalent injected current at a fixed membrane potential
    pub fn current_at(&self, v: f64) -> Vec<f64> {
        self.exc
            .iter()
            .zip(&self.inh)
            .map(|(ge, gi)| ge * (self.reversal.exc - v) + gi * (self.reversal.inh - v))
            .collect()
    }

    /// Voltage-keyed lookup tables `(excitatory, inhibitory)`
    pub fn lookup_tables(&self, grid: VoltageGrid) -> (ConductanceLut, ConductanceLut) {
        (
            ConductanceLut::new(self.exc.clone(), self.reversal.exc, grid),
            ConductanceLut::new(self.inh.clone(), self.reversal.inh, grid),
        )
    }
}

/// Analog drive derived from the hidden state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DriveSignal {
    Current(CurrentDrive),
    Conductance(ConductanceDrive),
}

impl DriveSignal {
    pub fn mode(&self) -> DriveMode {
        match self {
            Self::Current(_) => DriveMode::Single,
            Self::Conductance(_) => DriveMode::Dual,
        }
    }

    pub fn dt(&self) -> f64 {
        match self {
            Self::Current(d) => d.dt,
            Self::Conductance(d) => d.dt,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Current(d) => d.len(),
            Self::Conductance(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Current and conductance drives from one spike realization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedDrive {
    pub current: CurrentDrive,
    pub conductance: ConductanceDrive,
}

/// Turns a hidden state and a population into drive signals
#[derive(Clone, Debug)]
pub struct DriveSynthesizer {
    kernel: ExponentialKernel,
    v_rest: f64,
    reversal: ReversalPotentials,
}

/// Raw per-step pooled sums before smoothing
struct PooledSpikes {
    weighted: Vec<f64>,
    exc: Vec<f64>,
    inh: Vec<f64>,
}

impl DriveSynthesizer {
    /// Synthesizer with kernel time constant `kernel_tau` at step `dt`
    ///
    /// Conductances are referenced to `v_rest`, which must lie strictly
    /// between the inhibitory and excitatory reversal potentials.
    pub fn new(kernel_tau: f64, dt: f64, v_rest: f64, reversal: ReversalPotentials) -> Result<Self> {
        let kernel = ExponentialKernel::new(kernel_tau, dt)?;
        if !(reversal.inh < v_rest && v_rest < reversal.exc) {
            return Err(SpikeInfoError::invalid(
                "v_rest",
                format!(
                    "must lie between E_inh ({}) and E_exc ({}), got {v_rest}",
                    reversal.inh, reversal.exc
                ),
            ));
        }
        Ok(Self {
            kernel,
            v_rest,
            reversal,
        })
    }

    pub fn kernel(&self) -> &ExponentialKernel {
        &self.kernel
    }

    /// Drive for a single representation
    pub fn synthesize(
        &self,
        hidden: &HiddenState,
        population: &ThresholdPopulation,
        mode: DriveMode,
        seed: u64,
    ) -> Result<DriveSignal> {
        let all = self.synthesize_all(hidden, population, seed)?;
        Ok(match mode {
            DriveMode::Single => DriveSignal::Current(all.current),
            DriveMode::Dual => DriveSignal::Conductance(all.conductance),
        })
    }

    /// Current drive and conductance pair sharing one spike realization
    pub fn synthesize_all(
        &self,
        hidden: &HiddenState,
        population: &ThresholdPopulation,
        seed: u64,
    ) -> Result<SynthesizedDrive> {
        let dt = self.kernel.dt();
        if (hidden.dt() - dt).abs() > 1e-9 * dt {
            return Err(SpikeInfoError::invalid(
                "dt",
                format!("hidden state step {} differs from kernel step {dt}", hidden.dt()),
            ));
        }
        if population.qon.len() != population.qoff.len() {
            return Err(SpikeInfoError::LengthMismatch {
                expected: population.qon.len(),
                actual: population.qoff.len(),
            });
        }

        let weights = population.weights();
        let pooled = self.pool(hidden, population, &weights, seed)?;

        let offset: Vec<f64> = pooled.weighted.iter().map(|s| s / dt - weights.theta).collect();
        let exc: Vec<f64> = pooled.exc.iter().map(|s| s / dt).collect();
        let inh: Vec<f64> = pooled.inh.iter().map(|s| s / dt).collect();

        Ok(SynthesizedDrive {
            current: CurrentDrive {
                dt,
                values: self.kernel.apply(&offset),
            },
            conductance: ConductanceDrive {
                dt,
                exc: self.kernel.apply(&exc),
                inh: self.kernel.apply(&inh),
                reversal: self.reversal,
                v_ref: self.v_rest,
            },
        })
    }

    /// Base conductances `(g0_exc, g0_inh)` per unit
    pub fn base_conductances(&self, weights: &PopulationWeights) -> (Vec<f64>, Vec<f64>) {
        let exc_span = self.reversal.exc - self.v_rest;
        let inh_span = self.v_rest - self.reversal.inh;
        let g0_exc = weights.w.iter().map(|w| w.max(0.0) / exc_span).collect();
        let g0_inh = weights.w.iter().map(|w| (-w).max(0.0) / inh_span).collect();
        (g0_exc, g0_inh)
    }

    fn pool(
        &self,
        hidden: &HiddenState,
        population: &ThresholdPopulation,
        weights: &PopulationWeights,
        seed: u64,
    ) -> Result<PooledSpikes> {
        let dt = self.kernel.dt();
        let (g0_exc, g0_inh) = self.base_conductances(weights);
        let p_on = spike_probabilities(&population.qon, dt, "qon")?;
        let p_off = spike_probabilities(&population.qoff, dt, "qoff")?;

        let len = hidden.len();
        let mut pooled = PooledSpikes {
            weighted: Vec::with_capacity(len),
            exc: Vec::with_capacity(len),
            inh: Vec::with_capacity(len),
        };

        let mut rng = rng::seeded(seed, Stream::Drive);
        for &state in hidden.states() {
            let probs = if state == 1 { &p_on } else { &p_off };
            let (mut sw, mut se, mut si) = (0.0, 0.0, 0.0);
            for (i, &p) in probs.iter().enumerate() {
                if rng.gen::<f64>() < p {
                    sw += weights.w[i];
                    se += g0_exc[i];
                    si += g0_inh[i];
                }
            }
            pooled.weighted.push(sw);
            pooled.exc.push(se);
            pooled.inh.push(si);
        }
        Ok(pooled)
    }
}

/// Per-step Bernoulli probabilities `q * dt`
///
/// A unit can fire at most once per step, so `q * dt > 1` cannot be
/// represented and is rejected.
fn spike_probabilities(rates: &[f64], dt: f64, name: &'static str) -> Result<Vec<f64>> {
    rates
        .iter()
        .enumerate()
        .map(|(i, &q)| {
            let p = q * dt;
            if (0.0..=1.0).contains(&p) {
                Ok(p)
            } else {
                Err(SpikeInfoError::invalid(
                    name,
                    format!("unit {i} rate {q} kHz gives spike probability {p} per {dt} ms step"),
                ))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hidden_state::MarkovRates;
    use crate::population::QonQoffPolicy;

    fn setup(seed: u64) -> (HiddenState, ThresholdPopulation, DriveSynthesizer) {
        let rates = MarkovRates::new(0.01, 0.01).unwrap();
        let hidden = HiddenState::generate(rates, 0.5, 2000.0, seed).unwrap();
        let policy = QonQoffPolicy::Balanced {
            mean_firing_rate: 0.0005,
            stdq: (1.0f64 / 8.0).sqrt() * 0.0005,
        };
        let population = ThresholdPopulation::create(1000, &policy, seed).unwrap();
        let synth = DriveSynthesizer::new(5.0, 0.5, -65.0, ReversalPotentials::default()).unwrap();
        (hidden, population, synth)
    }

    #[test]
    fn test_lengths_match_hidden_state() {
        let (hidden, population, synth) = setup(1);
        let drive = synth.synthesize_all(&hidden, &population, 1).unwrap();
        assert_eq!(hidden.len(), 4000);
        assert_eq!(drive.current.len(), 4000);
        assert_eq!(drive.conductance.exc.len(), 4000);
        assert_eq!(drive.conductance.inh.len(), 4000);
    }

    #[test]
    fn test_conductances_non_negative() {
        let (hidden, population, synth) = setup(2);
        let drive = synth.synthesize(&hidden, &population, DriveMode::Dual, 2).unwrap();
        match drive {
            DriveSignal::Conductance(g) => {
                assert!(g.exc.iter().chain(&g.inh).all(|&v| v >= 0.0));
                assert!(g.exc.iter().any(|&v| v > 0.0));
            }
            DriveSignal::Current(_) => panic!("expected conductance drive"),
        }
    }

    #[test]
    fn test_deterministic() {
        let (hidden, population, synth) = setup(3);
        let a = synth.synthesize_all(&hidden, &population, 3).unwrap();
        let b = synth.synthesize_all(&hidden, &population, 3).unwrap();
        let c = synth.synthesize_all(&hidden, &population, 4).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.current, c.current);
    }

    #[test]
    fn test_conductance_pair_reproduces_current_at_rest() {
        let (hidden, population, synth) = setup(5);
        let drive = synth.synthesize_all(&hidden, &population, 5).unwrap();
        let theta = population.weights().theta;
        let at_rest = drive.conductance.current_at(-65.0);

        // current = K*(sum w s/dt) - K*theta, and K*theta ramps up from zero
        let ramp = synth.kernel().apply(&vec![theta; hidden.len()]);
        for n in 0..hidden.len() {
            let expected = drive.current.values[n] + ramp[n];
            assert!(
                (at_rest[n] - expected).abs() < 1e-9 * (1.0 + expected.abs()),
                "step {n}: {} vs {expected}",
                at_rest[n]
            );
        }
    }

    #[test]
    fn test_drive_tracks_hidden_state() {
        // Strongly tuned population: ON units fire far more than OFF
        let rates = MarkovRates::new(0.01, 0.01).unwrap();
        let hidden = HiddenState::generate(rates, 0.5, 4000.0, 8).unwrap();
        let population = ThresholdPopulation {
            qon: vec![0.02; 200],
            qoff: vec![0.005; 200],
        };
        let synth = DriveSynthesizer::new(5.0, 0.5, -65.0, ReversalPotentials::default()).unwrap();
        let drive = synth.synthesize_all(&hidden, &population, 8).unwrap();

        let (mut on_sum, mut on_n, mut off_sum, mut off_n) = (0.0, 0, 0.0, 0);
        for (n, v) in drive.current.values.iter().enumerate() {
            if hidden.is_on(n) {
                on_sum += v;
                on_n += 1;
            } else {
                off_sum += v;
                off_n += 1;
            }
        }
        assert!(on_sum / on_n as f64 > off_sum / off_n as f64);
    }

    #[test]
    fn test_every_named_policy_tracks_hidden_state() {
        let dt = 0.2;
        let rates = MarkovRates::new(0.01, 0.01).unwrap();
        let hidden = HiddenState::generate(rates, dt, 2000.0, 21).unwrap();
        let synth = DriveSynthesizer::new(5.0, dt, -65.0, ReversalPotentials::default()).unwrap();

        for name in ["normal", "balanced", "balanced_uniform"] {
            let policy = QonQoffPolicy::from_name(name, (1.0f64 / 8.0).sqrt(), 0.0005).unwrap();
            let population = ThresholdPopulation::create(1000, &policy, 21).unwrap();
            let drive = synth.synthesize_all(&hidden, &population, 21).unwrap();

            let (mut on_sum, mut on_n, mut off_sum, mut off_n) = (0.0, 0, 0.0, 0);
            for (n, v) in drive.current.values.iter().enumerate() {
                if hidden.is_on(n) {
                    on_sum += v;
                    on_n += 1;
                } else {
                    off_sum += v;
                    off_n += 1;
                }
            }
            assert!(on_n > 0 && off_n > 0);
            let (on_mean, off_mean) = (on_sum / on_n as f64, off_sum / off_n as f64);
            assert!(on_mean > off_mean, "{name}: on {on_mean} off {off_mean}");
        }
    }

    #[test]
    fn test_rate_above_one_spike_per_step_rejected() {
        let (hidden, _, synth) = setup(9);
        // 10 kHz at dt = 0.5 ms would need 5 spikes per step
        let population = ThresholdPopulation {
            qon: vec![0.001, 10.0],
            qoff: vec![0.001, 0.001],
        };
        assert!(matches!(
            synth.synthesize_all(&hidden, &population, 9),
            Err(SpikeInfoError::InvalidParameter { name: "qon", .. })
        ));
    }

    #[test]
    fn test_lookup_tables_match_conductance_current() {
        let (hidden, population, synth) = setup(10);
        let drive = synth.synthesize_all(&hidden, &population, 10).unwrap().conductance;
        let (exc, inh) = drive.lookup_tables(VoltageGrid::default());
        assert_eq!(exc.len(), drive.len());

        let exc_current = exc.current_at(-65.0).unwrap();
        let inh_current = inh.current_at(-65.0).unwrap();
        let combined = drive.current_at(-65.0);
        for n in 0..drive.len() {
            assert!((exc_current[n] - drive.exc[n] * 65.0).abs() < 1e-12);
            assert!((exc_current[n] + inh_current[n] - combined[n]).abs() < 1e-9);
        }
        assert!(exc.current_at(-65.2).is_err());
    }

    #[test]
    fn test_rest_outside_reversals_rejected() {
        assert!(DriveSynthesizer::new(5.0, 0.5, 10.0, ReversalPotentials::default()).is_err());
        assert!(DriveSynthesizer::new(5.0, 0.5, -80.0, ReversalPotentials::default()).is_err());
    }

    #[test]
    fn test_mismatched_step_rejected() {
        let (hidden, population, _) = setup(6);
        let synth = DriveSynthesizer::new(5.0, 0.2, -65.0, ReversalPotentials::default()).unwrap();
        assert!(synth.synthesize_all(&hidden, &population, 6).is_err());
    }
}
