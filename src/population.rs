//! Threshold Population Model
//!
//! A synthetic population of N independent Poisson units. Unit `i` fires at
//! rate `qon[i]` while the hidden state is ON and `qoff[i]` while it is OFF.
//! The population is the "environment" the neuron under test listens to.
//!
//! ## Policies
//!
//! | Policy | Parameters | Draw |
//! |--------|------------|------|
//! | `normal` | `mutheta`, `alpha`, `regime` | correlated unit-mean normal pair, summed difference `±mutheta` |
//! | `balanced` | `mean_firing_rate`, `stdq` | both ~ N(mean, stdq), truncated at 0 |
//! | `balanced_uniform` | `minq`, `maxq` | both ~ U[minq, maxq] |
//!
//! For `normal`, each unit shares one draw between its two rates:
//!
//! ```text
//! qoff[i] = 1 + alpha * z[i]
//! qon[i]  = qoff[i] + sign * mutheta / N + alpha * d[i]
//! ```
//!
//! with `z` and `d` standardized over the population, so the unclipped pair
//! has correlation `1/sqrt(2)` and `sum(qon - qoff) = ±mutheta` exactly.
//!
//! Rates are in kHz (events per ms), the time unit of the whole crate.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, Result, SpikeInfoError};
use crate::rng::{self, standard_normal, Stream};

/// Floor applied to rates before taking logarithms
pub const RATE_FLOOR: f64 = 1e-12;

/// Redraws allowed per truncated normal sample before clamping to zero
const MAX_REDRAWS: usize = 64;

/// Which state dominates in the `normal` policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// `sum(qon - qoff) = +mutheta`
    #[default]
    OnDominant,
    /// `sum(qon - qoff) = -mutheta`
    OffDominant,
}

impl Regime {
    fn sign(self) -> f64 {
        match self {
            Self::OnDominant => 1.0,
            Self::OffDominant => -1.0,
        }
    }
}

/// qon/qoff distribution policy with its parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QonQoffPolicy {
    /// Unit-mean normal draws with a controlled summed difference
    Normal {
        /// Summed difference `sum(qon - qoff)` (sign set by `regime`)
        mutheta: f64,
        /// Relative spread of the per-unit rates
        alpha: f64,
        regime: Regime,
    },
    /// Independent normal draws around a shared mean
    Balanced {
        /// Mean unit rate (kHz)
        mean_firing_rate: f64,
        /// Standard deviation of unit rates (kHz)
        stdq: f64,
    },
    /// Independent uniform draws
    BalancedUniform {
        minq: f64,
        maxq: f64,
    },
}

impl QonQoffPolicy {
    /// `balanced` with `stdq = alpha * mean_firing_rate`
    pub fn balanced(mean_firing_rate: f64, alpha: f64) -> Self {
        Self::Balanced {
            mean_firing_rate,
            stdq: alpha * mean_firing_rate,
        }
    }

    /// Policy by its conventional name, with the published default constants
    ///
    /// `alpha` and `mean_firing_rate` feed `normal` and `balanced`
    /// (`stdq = alpha * mean_firing_rate`). Unknown names fail.
    pub fn from_name(name: &str, alpha: f64, mean_firing_rate: f64) -> Result<Self> {
        match name {
            "normal" => Ok(Self::Normal {
                mutheta: 1.0,
                alpha,
                regime: Regime::OnDominant,
            }),
            "balanced" => Ok(Self::balanced(mean_firing_rate, alpha)),
            // 10-100 Hz
            "balanced_uniform" => Ok(Self::BalancedUniform {
                minq: 0.010,
                maxq: 0.100,
            }),
            other => Err(SpikeInfoError::UnsupportedPolicy(other.to_string())),
        }
    }

    /// Conventional policy name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal { .. } => "normal",
            Self::Balanced { .. } => "balanced",
            Self::BalancedUniform { .. } => "balanced_uniform",
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            Self::Normal { mutheta, alpha, .. } => {
                if !mutheta.is_finite() {
                    return Err(SpikeInfoError::invalid("mutheta", "must be finite"));
                }
                if !(alpha.is_finite() && alpha >= 0.0) {
                    return Err(SpikeInfoError::invalid("alpha", format!("must be >= 0, got {alpha}")));
                }
            }
            Self::Balanced { mean_firing_rate, stdq } => {
                ensure_positive("mean_firing_rate", mean_firing_rate)?;
                if !(stdq.is_finite() && stdq >= 0.0) {
                    return Err(SpikeInfoError::invalid("stdq", format!("must be >= 0, got {stdq}")));
                }
            }
            Self::BalancedUniform { minq, maxq } => {
                if !(minq.is_finite() && minq >= 0.0) {
                    return Err(SpikeInfoError::invalid("minq", format!("must be >= 0, got {minq}")));
                }
                if !(maxq.is_finite() && maxq >= minq) {
                    return Err(SpikeInfoError::invalid(
                        "maxq",
                        format!("must be >= minq ({minq}), got {maxq}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Per-unit ON/OFF rates of the synthetic population
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPopulation {
    pub qon: Vec<f64>,
    pub qoff: Vec<f64>,
}

/// Pooling weights derived from a population
///
/// `w[i] = ln(qon[i]/qoff[i])` is the log-likelihood ratio carried by one
/// spike of unit `i`; `theta = sum(qon - qoff)` is the evidence drift
/// accumulated per ms of silence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationWeights {
    pub w: Vec<f64>,
    pub theta: f64,
}

impl ThresholdPopulation {
    /// Draw `n` units under `policy`
    pub fn create(n: usize, policy: &QonQoffPolicy, seed: u64) -> Result<Self> {
        if n == 0 {
            return Err(SpikeInfoError::invalid("n", "population must have at least one unit"));
        }
        policy.validate()?;
        let mut rng = rng::seeded(seed, Stream::Population);

        let (qon, qoff) = match *policy {
            QonQoffPolicy::Normal { mutheta, alpha, regime } => {
                let mut shared: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();
                let mut diff: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();
                standardize(&mut shared);
                standardize(&mut diff);

                let shift = regime.sign() * mutheta / n as f64;
                let base: Vec<f64> = shared.iter().map(|z| 1.0 + alpha * z).collect();
                let qon = base
                    .iter()
                    .zip(&diff)
                    .map(|(b, d)| (b + shift + alpha * d).max(0.0))
                    .collect();
                let qoff = base.iter().map(|b| b.max(0.0)).collect();
                (qon, qoff)
            }
            QonQoffPolicy::Balanced { mean_firing_rate, stdq } => {
                let qon = (0..n)
                    .map(|_| truncated_normal(&mut rng, mean_firing_rate, stdq))
                    .collect();
                let qoff = (0..n)
                    .map(|_| truncated_normal(&mut rng, mean_firing_rate, stdq))
                    .collect();
                (qon, qoff)
            }
            QonQoffPolicy::BalancedUniform { minq, maxq } => {
                let span = maxq - minq;
                let qon = (0..n).map(|_| minq + span * rng.gen::<f64>()).collect();
                let qoff = (0..n).map(|_| minq + span * rng.gen::<f64>()).collect();
                (qon, qoff)
            }
        };

        Ok(Self { qon, qoff })
    }

    pub fn len(&self) -> usize {
        self.qon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qon.is_empty()
    }

    /// Log-ratio weights and summed rate difference
    pub fn weights(&self) -> PopulationWeights {
        let w = self
            .qon
            .iter()
            .zip(&self.qoff)
            .map(|(&on, &off)| (on.max(RATE_FLOOR) / off.max(RATE_FLOOR)).ln())
            .collect();
        let theta = self.qon.iter().zip(&self.qoff).map(|(on, off)| on - off).sum();
        PopulationWeights { w, theta }
    }

    /// Mean of `qon` and of `qoff`
    pub fn mean_rates(&self) -> (f64, f64) {
        let n = self.len().max(1) as f64;
        (self.qon.iter().sum::<f64>() / n, self.qoff.iter().sum::<f64>() / n)
    }
}

/// Shift/scale to sample mean 0, sample std 1 (no-op on a single value)
fn standardize(z: &mut [f64]) {
    let n = z.len();
    if n < 2 {
        return;
    }
    let mean = z.iter().sum::<f64>() / n as f64;
    let std = (z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt();
    for v in z.iter_mut() {
        *v -= mean;
        if std > 0.0 {
            *v /= std;
        }
    }
}

fn truncated_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    for _ in 0..MAX_REDRAWS {
        let q = mean + std * standard_normal(rng);
        if q >= 0.0 {
            return q;
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(rate: f64) -> QonQoffPolicy {
        QonQoffPolicy::balanced(rate, (1.0f64 / 8.0).sqrt())
    }

    fn correlation(a: &[f64], b: &[f64]) -> f64 {
        let n = a.len() as f64;
        let (ma, mb) = (a.iter().sum::<f64>() / n, b.iter().sum::<f64>() / n);
        let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
        let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
        let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
        cov / (va * vb).sqrt()
    }

    #[test]
    fn test_balanced_mean_converges() {
        let rate = 0.0005;
        for seed in [1u64, 2, 3] {
            let pop = ThresholdPopulation::create(20_000, &balanced(rate), seed).unwrap();
            let (mean_on, mean_off) = pop.mean_rates();
            assert!((mean_on - rate).abs() / rate < 0.02, "seed {seed}: qon mean {mean_on}");
            assert!((mean_off - rate).abs() / rate < 0.02, "seed {seed}: qoff mean {mean_off}");
        }
    }

    #[test]
    fn test_rates_non_negative() {
        let policies = [
            QonQoffPolicy::Normal { mutheta: 1.0, alpha: 2.0, regime: Regime::OffDominant },
            QonQoffPolicy::Balanced { mean_firing_rate: 1.0, stdq: 3.0 },
            QonQoffPolicy::BalancedUniform { minq: 0.0, maxq: 5.0 },
        ];
        for policy in &policies {
            let pop = ThresholdPopulation::create(2000, policy, 5).unwrap();
            assert!(pop.qon.iter().chain(&pop.qoff).all(|&q| q >= 0.0), "{}", policy.name());
        }
    }

    #[test]
    fn test_normal_summed_difference() {
        // Narrow spread so no rate is clipped at zero
        let policy = QonQoffPolicy::Normal {
            mutheta: 1.0,
            alpha: 0.1,
            regime: Regime::OnDominant,
        };
        let pop = ThresholdPopulation::create(1000, &policy, 4).unwrap();
        let theta = pop.weights().theta;
        assert!((theta - 1.0).abs() < 1e-6, "theta {theta}");

        let policy = QonQoffPolicy::Normal {
            mutheta: 1.0,
            alpha: 0.1,
            regime: Regime::OffDominant,
        };
        let pop = ThresholdPopulation::create(1000, &policy, 4).unwrap();
        assert!((pop.weights().theta + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normal_pair_is_correlated() {
        let policy = QonQoffPolicy::Normal {
            mutheta: 1.0,
            alpha: (1.0f64 / 8.0).sqrt(),
            regime: Regime::OnDominant,
        };
        let pop = ThresholdPopulation::create(20_000, &policy, 12).unwrap();
        let r = correlation(&pop.qon, &pop.qoff);
        assert!((r - 0.5f64.sqrt()).abs() < 0.05, "corr(qon, qoff) = {r}");
    }

    #[test]
    fn test_named_uniform_bounds_in_khz() {
        let policy = QonQoffPolicy::from_name("balanced_uniform", 0.35, 0.0005).unwrap();
        let pop = ThresholdPopulation::create(1000, &policy, 2).unwrap();
        assert!(pop.qon.iter().chain(&pop.qoff).all(|&q| (0.010..=0.100).contains(&q)));
    }

    #[test]
    fn test_uniform_range() {
        let policy = QonQoffPolicy::BalancedUniform { minq: 10.0, maxq: 100.0 };
        let pop = ThresholdPopulation::create(5000, &policy, 9).unwrap();
        assert!(pop.qon.iter().chain(&pop.qoff).all(|&q| (10.0..=100.0).contains(&q)));
        let (mean_on, mean_off) = pop.mean_rates();
        assert!((mean_on - 55.0).abs() < 2.0);
        assert!((mean_off - 55.0).abs() < 2.0);
    }

    #[test]
    fn test_deterministic_given_seed() {
        let a = ThresholdPopulation::create(100, &balanced(0.0005), 77).unwrap();
        let b = ThresholdPopulation::create(100, &balanced(0.0005), 77).unwrap();
        let c = ThresholdPopulation::create(100, &balanced(0.0005), 78).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_weights() {
        let pop = ThresholdPopulation {
            qon: vec![2.0, 1.0, 0.0],
            qoff: vec![1.0, 2.0, 1.0],
        };
        let weights = pop.weights();
        assert!((weights.w[0] - 2.0f64.ln()).abs() < 1e-12);
        assert!((weights.w[1] + 2.0f64.ln()).abs() < 1e-12);
        assert!(weights.w[2].is_finite() && weights.w[2] < -20.0);
        assert!((weights.theta - (-1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_unsupported_policy_name() {
        assert!(QonQoffPolicy::from_name("balanced", 0.35, 0.0005).is_ok());
        assert!(QonQoffPolicy::from_name("normal", 0.35, 0.0005).is_ok());
        assert!(QonQoffPolicy::from_name("balanced_uniform", 0.35, 0.0005).is_ok());
        assert!(matches!(
            QonQoffPolicy::from_name("lognormal", 0.35, 0.0005),
            Err(SpikeInfoError::UnsupportedPolicy(name)) if name == "lognormal"
        ));
    }

    #[test]
    fn test_invalid_policy_parameters() {
        let bad = QonQoffPolicy::BalancedUniform { minq: 5.0, maxq: 1.0 };
        assert!(ThresholdPopulation::create(10, &bad, 1).is_err());
        let bad = QonQoffPolicy::Balanced { mean_firing_rate: 0.0, stdq: 0.1 };
        assert!(ThresholdPopulation::create(10, &bad, 1).is_err());
        assert!(ThresholdPopulation::create(0, &balanced(0.001), 1).is_err());
    }

    #[test]
    fn test_policy_serialization() {
        let policy = QonQoffPolicy::Normal { mutheta: 1.0, alpha: 0.5, regime: Regime::OnDominant };
        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("\"type\":\"normal\""));
        let restored: QonQoffPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, restored);

        let unknown = r#"{"type":"lognormal","mu":1.0}"#;
        assert!(serde_json::from_str::<QonQoffPolicy>(unknown).is_err());
    }
}
