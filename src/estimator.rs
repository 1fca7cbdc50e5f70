//! Mutual Information Estimator
//!
//! Decodes the hidden state from an observation stream with a forward
//! Bayesian filter and scores the decoded posterior against the true state.
//!
//! ## Filter
//!
//! ```text
//! predict:  p⁻[n] = p[n-1] (1 - P_off) + (1 - p[n-1]) P_on,  p⁻[0] = ron/(ron+roff)
//! correct:  L[n]  = logit(p⁻[n]) + e[n] - theta * dt
//!           p[n]  = sigmoid(L[n])
//! ```
//!
//! `P_on`/`P_off` are the per-step switch probabilities of the hidden state.
//! The evidence `e[n]` is a log-likelihood ratio (ON vs OFF):
//!
//! - **spikes**: Bernoulli bins with per-state firing rates measured from the
//!   spike train itself, `e = ln(λon/λoff)` on a spike, `ln((1-λon)/(1-λoff))` otherwise
//! - **drive**: the synthesized current drive is the population's
//!   log-likelihood-ratio rate (nats/ms), so `e = drive[n] * dt`
//!
//! `theta` is an evidence offset per ms; `theta = 0` is exact Bayesian
//! filtering. Use the same value for every condition being compared.
//!
//! ## Information
//!
//! ```text
//! H(X)   = binary entropy of the empirical ON fraction
//! H(X|Y) = -mean_n [ x log2 p + (1 - x) log2 (1 - p) ]
//! MI     = H(X) - H(X|Y)            (bits per time bin)
//! ```
//!
//! Probabilities entering a logarithm are clamped to
//! `[PROB_CLIP, 1 - PROB_CLIP]`; per-bin spike probabilities to
//! `[SPIKE_PROB_CLIP, 1 - SPIKE_PROB_CLIP]`.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, Result, SpikeInfoError};
use crate::hidden_state::{HiddenState, MarkovRates};
use crate::spike_train::SpikeTrain;

/// Clamp for probabilities inside entropy logarithms
pub const PROB_CLIP: f64 = 1e-12;

/// Clamp for per-bin spike probabilities in the likelihood model
pub const SPIKE_PROB_CLIP: f64 = 1e-6;

/// Drive information below this is too small to normalize by
const MIN_REFERENCE_BITS: f64 = 1e-9;

/// P(hidden state = ON | observations up to n), one value per bin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PosteriorTrace {
    pub p_on: Vec<f64>,
}

impl PosteriorTrace {
    pub fn len(&self) -> usize {
        self.p_on.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p_on.is_empty()
    }
}

/// Information estimate and decoding diagnostics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MIResult {
    /// Mutual information between spikes and hidden state (bits per bin)
    pub mi_bits: f64,
    /// Same, in bits per second
    pub mi_bits_per_second: f64,
    /// Entropy of the hidden state (bits per bin)
    pub hidden_entropy_bits: f64,
    /// Cross-entropy of the hidden state under the spike posterior (bits per bin)
    pub conditional_entropy_bits: f64,
    /// Information available in the drive itself (bits per bin)
    pub input_mi_bits: f64,
    /// `mi_bits / input_mi_bits`, when the drive carries information
    pub fraction_transferred: Option<f64>,
    /// Fraction of ON bins where the posterior exceeds 0.5
    pub hit_rate: f64,
    /// Fraction of OFF bins where the posterior exceeds 0.5
    pub false_alarm_rate: f64,
    /// Output firing rate while ON (kHz)
    pub qon: f64,
    /// Output firing rate while OFF (kHz)
    pub qoff: f64,
}

/// Forward-filter information estimator for one set of hidden-state statistics
#[derive(Clone, Debug)]
pub struct MutualInformationEstimator {
    rates: MarkovRates,
    dt: f64,
    theta: f64,
}

impl MutualInformationEstimator {
    pub fn new(ron: f64, roff: f64, dt: f64, theta: f64) -> Result<Self> {
        let rates = MarkovRates::new(ron, roff)?;
        ensure_positive("dt", dt)?;
        if !theta.is_finite() {
            return Err(SpikeInfoError::invalid("theta", "must be finite"));
        }
        Ok(Self { rates, dt, theta })
    }

    pub fn rates(&self) -> MarkovRates {
        self.rates
    }

    /// Estimate information carried by `spikes` about `hidden`
    pub fn estimate(&self, hidden: &HiddenState, drive: &[f64], spikes: &SpikeTrain) -> Result<MIResult> {
        self.estimate_with_trace(hidden, drive, spikes).map(|(result, _)| result)
    }

    /// Estimate and also return the spike-driven posterior
    pub fn estimate_with_trace(
        &self,
        hidden: &HiddenState,
        drive: &[f64],
        spikes: &SpikeTrain,
    ) -> Result<(MIResult, PosteriorTrace)> {
        let len = hidden.len();
        if spikes.len() != len {
            return Err(SpikeInfoError::LengthMismatch {
                expected: len,
                actual: spikes.len(),
            });
        }
        if drive.len() != len {
            return Err(SpikeInfoError::LengthMismatch {
                expected: len,
                actual: drive.len(),
            });
        }

        let states = hidden.states();
        let (qon, qoff) = conditional_rates(states, spikes.bins(), self.dt);
        let lambda_on = (qon * self.dt).clamp(SPIKE_PROB_CLIP, 1.0 - SPIKE_PROB_CLIP);
        let lambda_off = (qoff * self.dt).clamp(SPIKE_PROB_CLIP, 1.0 - SPIKE_PROB_CLIP);
        let spike_evidence = (lambda_on / lambda_off).ln();
        let silence_evidence = ((1.0 - lambda_on) / (1.0 - lambda_off)).ln();

        let bins = spikes.bins();
        let posterior = self.filter(len, |n| {
            if bins[n] == 1 {
                spike_evidence
            } else {
                silence_evidence
            }
        });
        let input_posterior = self.filter(len, |n| drive[n] * self.dt);

        let hidden_entropy_bits = binary_entropy_bits(hidden.on_fraction());
        let conditional_entropy_bits = cross_entropy_bits(states, &posterior.p_on);
        let input_conditional = cross_entropy_bits(states, &input_posterior.p_on);

        let mi_bits = hidden_entropy_bits - conditional_entropy_bits;
        let input_mi_bits = hidden_entropy_bits - input_conditional;
        let fraction_transferred = (input_mi_bits > MIN_REFERENCE_BITS).then(|| mi_bits / input_mi_bits);
        let (hit_rate, false_alarm_rate) = detection_rates(states, &posterior.p_on);

        log::debug!(
            "MI {:.4} bits/bin (input {:.4}), qon={:.5} kHz qoff={:.5} kHz",
            mi_bits,
            input_mi_bits,
            qon,
            qoff
        );

        let result = MIResult {
            mi_bits,
            mi_bits_per_second: mi_bits / self.dt * 1000.0,
            hidden_entropy_bits,
            conditional_entropy_bits,
            input_mi_bits,
            fraction_transferred,
            hit_rate,
            false_alarm_rate,
            qon,
            qoff,
        };
        Ok((result, posterior))
    }

    /// Run the predict/correct recursion over `len` bins
    fn filter<F: Fn(usize) -> f64>(&self, len: usize, evidence: F) -> PosteriorTrace {
        let (p_on, p_off) = self.rates.step_probabilities(self.dt);
        let offset = self.theta * self.dt;

        let mut p = self.rates.stationary_on();
        let mut trace = Vec::with_capacity(len);
        for n in 0..len {
            let predicted = if n == 0 { p } else { p * (1.0 - p_off) + (1.0 - p) * p_on };
            let log_odds = logit(predicted) + evidence(n) - offset;
            p = sigmoid(log_odds);
            trace.push(p);
        }
        PosteriorTrace { p_on: trace }
    }
}

/// One-shot estimate with explicit hidden-state statistics
pub fn estimate(
    ron: f64,
    roff: f64,
    hidden: &HiddenState,
    drive: &[f64],
    dt: f64,
    theta: f64,
    spikes: &SpikeTrain,
) -> Result<MIResult> {
    MutualInformationEstimator::new(ron, roff, dt, theta)?.estimate(hidden, drive, spikes)
}

/// Binary entropy in bits, with the argument clamped away from 0 and 1
pub fn binary_entropy_bits(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    let p = p.clamp(PROB_CLIP, 1.0 - PROB_CLIP);
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

/// Mean cross-entropy (bits per bin) of binary `states` under `p_on`
pub fn cross_entropy_bits(states: &[u8], p_on: &[f64]) -> f64 {
    if states.is_empty() {
        return 0.0;
    }
    let total: f64 = states
        .iter()
        .zip(p_on)
        .map(|(&x, &p)| {
            let p = p.clamp(PROB_CLIP, 1.0 - PROB_CLIP);
            if x == 1 {
                -p.log2()
            } else {
                -(1.0 - p).log2()
            }
        })
        .sum();
    total / states.len() as f64
}

/// Per-state spike rates (kHz) of the output neuron
fn conditional_rates(states: &[u8], bins: &[u8], dt: f64) -> (f64, f64) {
    let (mut on_bins, mut on_spikes, mut off_bins, mut off_spikes) = (0usize, 0usize, 0usize, 0usize);
    for (&x, &s) in states.iter().zip(bins) {
        if x == 1 {
            on_bins += 1;
            on_spikes += s as usize;
        } else {
            off_bins += 1;
            off_spikes += s as usize;
        }
    }
    let rate = |spikes: usize, n: usize| if n == 0 { 0.0 } else { spikes as f64 / (n as f64 * dt) };
    (rate(on_spikes, on_bins), rate(off_spikes, off_bins))
}

/// `(hit rate, false alarm rate)` of the rule `p > 0.5`
fn detection_rates(states: &[u8], p_on: &[f64]) -> (f64, f64) {
    let (mut hits, mut on, mut false_alarms, mut off) = (0usize, 0usize, 0usize, 0usize);
    for (&x, &p) in states.iter().zip(p_on) {
        let detected = p > 0.5;
        if x == 1 {
            on += 1;
            hits += detected as usize;
        } else {
            off += 1;
            false_alarms += detected as usize;
        }
    }
    let ratio = |k: usize, n: usize| if n == 0 { 0.0 } else { k as f64 / n as f64 };
    (ratio(hits, on), ratio(false_alarms, off))
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(PROB_CLIP, 1.0 - PROB_CLIP);
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
