//! Hidden State Process
//!
//! Two-state continuous-time Markov chain sampled at step `dt`:
//!
//! ```text
//! P(OFF -> ON per step) = 1 - exp(-ron  * dt)
//! P(ON -> OFF per step) = 1 - exp(-roff * dt)
//! P(ON) stationary      = ron / (ron + roff)
//! ```
//!
//! The first sample is drawn from the stationary distribution, so the whole
//! trajectory is stationary from step 0.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, Result, SpikeInfoError};
use crate::rng::{self, Stream};

/// Switching rates of the hidden state (events per ms)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkovRates {
    /// OFF -> ON rate
    pub ron: f64,
    /// ON -> OFF rate
    pub roff: f64,
}

impl MarkovRates {
    /// Validated rates
    pub fn new(ron: f64, roff: f64) -> Result<Self> {
        ensure_positive("ron", ron)?;
        ensure_positive("roff", roff)?;
        Ok(Self { ron, roff })
    }

    /// Rates from a mean switching time and an OFF/ON rate ratio
    ///
    /// `ron = 1/(tau*(1+factor))`, `roff = factor*ron`.
    pub fn from_switching_time(tau: f64, factor_ron_roff: f64) -> Result<Self> {
        ensure_positive("tau", tau)?;
        ensure_positive("factor_ron_roff", factor_ron_roff)?;
        let ron = 1.0 / (tau * (1.0 + factor_ron_roff));
        Self::new(ron, factor_ron_roff * ron)
    }

    /// Long-run probability of ON
    pub fn stationary_on(&self) -> f64 {
        self.ron / (self.ron + self.roff)
    }

    /// Per-step switch probabilities `(OFF->ON, ON->OFF)`
    pub fn step_probabilities(&self, dt: f64) -> (f64, f64) {
        (-(-self.ron * dt).exp_m1(), -(-self.roff * dt).exp_m1())
    }
}

/// Binary hidden-state trajectory (0 = OFF, 1 = ON)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HiddenState {
    states: Vec<u8>,
    dt: f64,
}

impl HiddenState {
    /// Sample a trajectory of `round(duration/dt)` steps
    pub fn generate(rates: MarkovRates, dt: f64, duration: f64, seed: u64) -> Result<Self> {
        ensure_positive("ron", rates.ron)?;
        ensure_positive("roff", rates.roff)?;
        ensure_positive("dt", dt)?;
        ensure_positive("duration", duration)?;

        let len = (duration / dt).round() as usize;
        let (p_on, p_off) = rates.step_probabilities(dt);
        let mut rng = rng::seeded(seed, Stream::HiddenState);

        let mut states = Vec::with_capacity(len);
        if len > 0 {
            let mut on = rng.gen::<f64>() < rates.stationary_on();
            states.push(on as u8);
            for _ in 1..len {
                let flip = if on { p_off } else { p_on };
                if rng.gen::<f64>() < flip {
                    on = !on;
                }
                states.push(on as u8);
            }
        }

        Ok(Self { states, dt })
    }

    /// Wrap an existing 0/1 series
    pub fn from_states(states: Vec<u8>, dt: f64) -> Result<Self> {
        ensure_positive("dt", dt)?;
        if let Some((i, v)) = states.iter().enumerate().find(|(_, &v)| v > 1) {
            return Err(SpikeInfoError::InvalidState(format!(
                "hidden state value {v} at step {i} is not 0 or 1"
            )));
        }
        Ok(Self { states, dt })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn states(&self) -> &[u8] {
        &self.states
    }

    pub fn is_on(&self, step: usize) -> bool {
        self.states[step] == 1
    }

    /// Fraction of steps spent ON
    pub fn on_fraction(&self) -> f64 {
        if self.states.is_empty() {
            return 0.0;
        }
        self.count_on() as f64 / self.states.len() as f64
    }

    pub fn count_on(&self) -> usize {
        self.states.iter().filter(|&&s| s == 1).count()
    }
}
