//! Experiment driver
//!
//! Builds the stochastic environment of one trial, calibrates current-clamp
//! and dynamic-clamp injections against the same environment, runs both, and
//! scores each spike train against the hidden state.
//!
//! ```text
//! seed ─> HiddenState ─┐
//!      ─> Population ──┼─> SynthesizedDrive ─┬─> current  ─> calibrate ─> simulate ─> MI
//!                      │                     └─> dynamic  ─> calibrate ─> simulate ─> MI
//! ```
//!
//! Trials are independent: each gets its own adapter clones, restored from a
//! snapshot of the template model, and its own seeds derived from
//! `(base_seed, trial, attempt)`. A calibration failure discards the input
//! and resamples with the next attempt seed.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calibrate::{CalibrationConfig, CalibrationOutcome, DriveCalibrator, RateMeasurement};
use crate::drive::{DriveSignal, DriveSynthesizer, ReversalPotentials, SynthesizedDrive};
use crate::error::{ensure_positive, Result, SpikeInfoError};
use crate::estimator::{MIResult, MutualInformationEstimator};
use crate::hidden_state::{HiddenState, MarkovRates};
use crate::injection::Injection;
use crate::neuron::{CellClass, NeuronAdapter, NeuronModel, NeuronSnapshot, ParameterTable, Recording};
use crate::population::{QonQoffPolicy, ThresholdPopulation};
use crate::rng::derive_seed;
use crate::spike_train::SpikeTrain;

/// Relative spread of the preset populations, `sqrt(1/8)`
const PRESET_ALPHA: f64 = std::f64::consts::FRAC_1_SQRT_2 / 2.0;

/// Which reference neuron the trials drive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Barrel,
    WangBuzsaki,
}

/// Every constant of a clamp-comparison experiment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Mean hidden-state switching time (ms)
    pub tau: f64,
    /// `roff / ron`
    pub factor_ron_roff: f64,
    /// Samples per ms; `dt = 1 / sampling_rate`
    pub sampling_rate: f64,
    /// Trial length (ms)
    pub duration: f64,
    pub population_size: usize,
    /// Exponential kernel time constant (ms)
    pub kernel_tau: f64,
    /// qon/qoff distribution, tagged by `type`
    pub qon_qoff: QonQoffPolicy,
    /// Conductance reference potential (mV)
    pub v_rest: f64,
    pub reversal: ReversalPotentials,
    /// Decoder evidence offset (per ms)
    pub theta: f64,
    pub calibration: CalibrationConfig,
    pub model: ModelKind,
    pub class: CellClass,
    /// CSV parameter table; built-in sets when absent
    pub parameter_table: Option<PathBuf>,
    pub trials: usize,
    /// Input resamples allowed per trial
    pub max_attempts_per_trial: usize,
    /// Keep voltage traces and drives in the report
    pub keep_traces: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self::pyramidal()
    }
}

impl ExperimentConfig {
    /// Pyramidal-cell experiment: slow environment, 0.1 Hz population units
    pub fn pyramidal() -> Self {
        Self {
            tau: 250.0,
            factor_ron_roff: 2.0,
            sampling_rate: 5.0,
            duration: 2000.0,
            population_size: 1000,
            kernel_tau: 5.0,
            qon_qoff: QonQoffPolicy::balanced(0.1 / 1000.0, PRESET_ALPHA),
            v_rest: -65.0,
            reversal: ReversalPotentials::default(),
            theta: 0.0,
            calibration: CalibrationConfig::default(),
            model: ModelKind::Barrel,
            class: CellClass::Pyramidal,
            parameter_table: None,
            trials: 10,
            max_attempts_per_trial: 20,
            keep_traces: false,
        }
    }

    /// Interneuron experiment: faster environment, 0.5 Hz population units
    pub fn interneuron() -> Self {
        Self {
            tau: 50.0,
            qon_qoff: QonQoffPolicy::balanced(0.5 / 1000.0, PRESET_ALPHA),
            class: CellClass::Interneuron,
            ..Self::pyramidal()
        }
    }

    /// Preset for a cell class
    pub fn for_class(class: CellClass) -> Self {
        match class {
            CellClass::Pyramidal => Self::pyramidal(),
            CellClass::Interneuron => Self::interneuron(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn dt(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    pub fn rates(&self) -> Result<MarkovRates> {
        MarkovRates::from_switching_time(self.tau, self.factor_ron_roff)
    }

    pub fn synthesizer(&self) -> Result<DriveSynthesizer> {
        DriveSynthesizer::new(self.kernel_tau, self.dt(), self.v_rest, self.reversal)
    }

    /// Template neuron for the trials
    pub fn build_model(&self) -> Result<NeuronModel> {
        match (self.model, &self.parameter_table) {
            (ModelKind::WangBuzsaki, _) => Ok(NeuronModel::wang_buzsaki()),
            (ModelKind::Barrel, None) => Ok(NeuronModel::barrel(self.class)),
            (ModelKind::Barrel, Some(path)) => {
                NeuronModel::barrel_with_table(self.class, ParameterTable::from_csv_file(path)?)
            }
        }
    }

    /// Fail fast on any out-of-domain constant
    pub fn validate(&self) -> Result<()> {
        self.rates()?;
        ensure_positive("sampling_rate", self.sampling_rate)?;
        ensure_positive("duration", self.duration)?;
        if (self.duration * self.sampling_rate).round() < 1.0 {
            return Err(SpikeInfoError::invalid(
                "duration",
                "shorter than one sample",
            ));
        }
        if self.population_size == 0 {
            return Err(SpikeInfoError::invalid("population_size", "must be at least 1"));
        }
        if self.trials == 0 {
            return Err(SpikeInfoError::invalid("trials", "must be at least 1"));
        }
        if self.max_attempts_per_trial == 0 {
            return Err(SpikeInfoError::invalid("max_attempts_per_trial", "must be at least 1"));
        }
        if !self.theta.is_finite() {
            return Err(SpikeInfoError::invalid("theta", "must be finite"));
        }
        self.qon_qoff.validate()?;
        self.synthesizer()?;
        self.calibration.validate()
    }
}

/// Generated environment of one trial
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentInput {
    pub hidden_state: HiddenState,
    pub population: ThresholdPopulation,
    pub drive: SynthesizedDrive,
}

/// Hidden state, population and both drives for `seed`
pub fn make_dynamic_experiment(config: &ExperimentConfig, seed: u64) -> Result<ExperimentInput> {
    let dt = config.dt();
    let hidden_state = HiddenState::generate(config.rates()?, dt, config.duration, seed)?;
    let population = ThresholdPopulation::create(config.population_size, &config.qon_qoff, seed)?;
    let drive = config
        .synthesizer()?
        .synthesize_all(&hidden_state, &population, seed)?;
    Ok(ExperimentInput {
        hidden_state,
        population,
        drive,
    })
}

/// Outcome of one clamp paradigm within a trial
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClampResult {
    /// Calibrated scale (nA per drive unit, or conductance factor)
    pub scale: f64,
    pub rates: RateMeasurement,
    pub spike_times: Vec<f64>,
    pub information: MIResult,
}

/// Optional raw traces of a trial
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialTraces {
    pub hidden_state: Vec<u8>,
    pub input_current: Vec<f64>,
    pub input_g_exc: Vec<f64>,
    pub input_g_inh: Vec<f64>,
    pub current_voltage: Vec<f64>,
    pub dynamic_voltage: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: usize,
    /// Seed of the accepted input
    pub seed: u64,
    /// Inputs generated, including discarded ones
    pub attempts: usize,
    pub current: ClampResult,
    pub dynamic: ClampResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traces: Option<TrialTraces>,
}

/// Means over a set of trials
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClampSummary {
    pub mean_mi_bits: f64,
    pub mean_mi_bits_per_second: f64,
    pub mean_fraction_transferred: Option<f64>,
    pub mean_rate_hz: f64,
}

impl ClampSummary {
    fn over<'a>(results: impl Iterator<Item = &'a ClampResult> + Clone) -> Self {
        let count = results.clone().count().max(1) as f64;
        let fractions: Vec<f64> = results
            .clone()
            .filter_map(|r| r.information.fraction_transferred)
            .collect();
        Self {
            mean_mi_bits: results.clone().map(|r| r.information.mi_bits).sum::<f64>() / count,
            mean_mi_bits_per_second: results
                .clone()
                .map(|r| r.information.mi_bits_per_second)
                .sum::<f64>()
                / count,
            mean_fraction_transferred: if fractions.is_empty() {
                None
            } else {
                Some(fractions.iter().sum::<f64>() / fractions.len() as f64)
            },
            mean_rate_hz: results.map(|r| r.rates.rate_hz).sum::<f64>() / count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub model: String,
    pub base_seed: u64,
    pub current: ClampSummary,
    pub dynamic: ClampSummary,
    pub trials: Vec<TrialRecord>,
}

/// Runs independent trials on the rayon pool
#[derive(Clone, Debug)]
pub struct TrialRunner {
    config: ExperimentConfig,
    template: NeuronModel,
    calibrator: DriveCalibrator,
    estimator: MutualInformationEstimator,
}

impl TrialRunner {
    pub fn new(config: ExperimentConfig, template: NeuronModel) -> Result<Self> {
        config.validate()?;
        let rates = config.rates()?;
        let estimator = MutualInformationEstimator::new(rates.ron, rates.roff, config.dt(), config.theta)?;
        let calibrator = DriveCalibrator::new(config.calibration.clone())?;
        Ok(Self {
            config,
            template,
            calibrator,
            estimator,
        })
    }

    /// Runner with the model named by the config
    pub fn from_config(config: ExperimentConfig) -> Result<Self> {
        let template = config.build_model()?;
        Self::new(config, template)
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// All configured trials, in trial order
    pub fn run(&self, base_seed: u64) -> Result<ExperimentReport> {
        let trials = (0..self.config.trials)
            .into_par_iter()
            .map(|trial| self.run_trial(trial, base_seed))
            .collect::<Result<Vec<_>>>()?;

        Ok(ExperimentReport {
            model: self.template.model_name().to_string(),
            base_seed,
            current: ClampSummary::over(trials.iter().map(|t| &t.current)),
            dynamic: ClampSummary::over(trials.iter().map(|t| &t.dynamic)),
            trials,
        })
    }

    /// One trial, resampling the input until both clamps calibrate
    pub fn run_trial(&self, trial: usize, base_seed: u64) -> Result<TrialRecord> {
        let mut current_cell = self.template.clone();
        let mut dynamic_cell = self.template.clone();
        let initial = self.template.snapshot();

        for attempt in 0..self.config.max_attempts_per_trial {
            let seed = derive_seed(base_seed, trial, attempt);
            let input = make_dynamic_experiment(&self.config, seed)?;

            let current_drive = DriveSignal::Current(input.drive.current.clone());
            let current_injection = match self.calibrator.calibrate(
                &current_drive,
                &input.hidden_state,
                &mut current_cell,
                &initial,
            )? {
                CalibrationOutcome::Calibrated(c) => (c.scale, c.injection),
                CalibrationOutcome::Failed(failure) => {
                    log::warn!(
                        "trial {trial} attempt {attempt}: current clamp calibration failed ({:?} after {} runs, last {:.2} Hz)",
                        failure.reason,
                        failure.attempts,
                        failure.last_rate_hz
                    );
                    continue;
                }
            };

            let dynamic_drive = DriveSignal::Conductance(input.drive.conductance.clone());
            let dynamic_injection = match self.calibrator.calibrate(
                &dynamic_drive,
                &input.hidden_state,
                &mut dynamic_cell,
                &initial,
            )? {
                CalibrationOutcome::Calibrated(c) => (c.scale, c.injection),
                CalibrationOutcome::Failed(failure) => {
                    log::warn!(
                        "trial {trial} attempt {attempt}: dynamic clamp calibration failed ({:?} after {} runs, last {:.2} Hz)",
                        failure.reason,
                        failure.attempts,
                        failure.last_rate_hz
                    );
                    continue;
                }
            };

            let (current, current_rec) =
                self.run_clamp(&mut current_cell, &initial, &input, current_injection)?;
            let (dynamic, dynamic_rec) =
                self.run_clamp(&mut dynamic_cell, &initial, &input, dynamic_injection)?;

            log::info!(
                "trial {trial} done after {} input(s): MI current {:.4} bits, dynamic {:.4} bits",
                attempt + 1,
                current.information.mi_bits,
                dynamic.information.mi_bits
            );

            let traces = self.config.keep_traces.then(|| TrialTraces {
                hidden_state: input.hidden_state.states().to_vec(),
                input_current: input.drive.current.values.clone(),
                input_g_exc: input.drive.conductance.exc.clone(),
                input_g_inh: input.drive.conductance.inh.clone(),
                current_voltage: current_rec.voltage,
                dynamic_voltage: dynamic_rec.voltage,
            });

            return Ok(TrialRecord {
                trial,
                seed,
                attempts: attempt + 1,
                current,
                dynamic,
                traces,
            });
        }

        Err(SpikeInfoError::TrialBudgetExhausted {
            trial,
            attempts: self.config.max_attempts_per_trial,
        })
    }

    fn run_clamp(
        &self,
        cell: &mut NeuronModel,
        initial: &NeuronSnapshot,
        input: &ExperimentInput,
        (scale, injection): (f64, Injection),
    ) -> Result<(ClampResult, Recording)> {
        let hidden = &input.hidden_state;
        cell.restore(initial)?;
        let recording = cell.simulate(&injection, self.config.duration, self.config.calibration.parameter_set)?;
        let spikes = SpikeTrain::encode(&recording.spike_times, hidden.dt(), hidden.len())?;
        let information = self
            .estimator
            .estimate(hidden, &input.drive.current.values, &spikes)?;
        let result = ClampResult {
            scale,
            rates: RateMeasurement::from_spikes(&recording.spike_times, hidden),
            spike_times: recording.spike_times.clone(),
            information,
        };
        Ok((result, recording))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::RateTarget;

    /// Short fixed-scale experiment that always calibrates
    fn quick_config() -> ExperimentConfig {
        ExperimentConfig {
            duration: 400.0,
            sampling_rate: 2.0,
            population_size: 200,
            trials: 3,
            calibration: CalibrationConfig {
                target: None,
                amplitude: 50.0,
                ..CalibrationConfig::default()
            },
            ..ExperimentConfig::interneuron()
        }
    }

    #[test]
    fn test_default_rates() {
        let config = ExperimentConfig::default();
        let rates = config.rates().unwrap();
        assert!((rates.ron - 1.0 / 750.0).abs() < 1e-15);
        assert!((rates.roff - 2.0 / 750.0).abs() < 1e-15);
        assert!((config.dt() - 0.2).abs() < 1e-15);
        assert_eq!(config.qon_qoff.name(), "balanced");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ExperimentConfig::from_json_str(
            r#"{"tau": 50.0, "class": "interneuron", "calibration": {"max_attempts": 8}}"#,
        )
        .unwrap();
        assert_eq!(config.tau, 50.0);
        assert_eq!(config.class, CellClass::Interneuron);
        assert_eq!(config.calibration.max_attempts, 8);
        assert_eq!(config.calibration.target, Some(RateTarget::default()));
        assert_eq!(config.population_size, 1000);
    }

    #[test]
    fn test_config_validation() {
        let unknown_policy = r#"{"qon_qoff": {"type": "lognormal", "mu": 1.0}}"#;
        assert!(matches!(
            ExperimentConfig::from_json_str(unknown_policy),
            Err(SpikeInfoError::Config(_))
        ));
        let bad_bounds = r#"{"qon_qoff": {"type": "balanced_uniform", "minq": 0.1, "maxq": 0.01}}"#;
        assert!(matches!(
            ExperimentConfig::from_json_str(bad_bounds),
            Err(SpikeInfoError::InvalidParameter { name: "maxq", .. })
        ));
        assert!(ExperimentConfig::from_json_str(r#"{"tau": -1.0}"#).is_err());
        assert!(ExperimentConfig::from_json_str(r#"{"v_rest": 10.0}"#).is_err());
        assert!(matches!(
            ExperimentConfig::from_json_str("{not json"),
            Err(SpikeInfoError::Config(_))
        ));
    }

    #[test]
    fn test_make_dynamic_experiment() {
        let config = ExperimentConfig {
            sampling_rate: 2.0,
            ..ExperimentConfig::interneuron()
        };
        let a = make_dynamic_experiment(&config, 5).unwrap();
        assert_eq!(a.hidden_state.len(), 4000);
        assert_eq!(a.drive.current.len(), 4000);
        assert_eq!(a.drive.conductance.len(), 4000);
        assert_eq!(a.population.len(), 1000);

        let b = make_dynamic_experiment(&config, 5).unwrap();
        assert_eq!(a, b);
        let c = make_dynamic_experiment(&config, 6).unwrap();
        assert_ne!(a.hidden_state, c.hidden_state);
    }

    #[test]
    fn test_trial_is_deterministic() {
        let runner = TrialRunner::from_config(quick_config()).unwrap();
        let first = runner.run_trial(1, 99).unwrap();
        let second = runner.run_trial(1, 99).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.seed, derive_seed(99, 1, 0));
        assert_eq!(first.current.scale, 50.0);
        assert!(first.traces.is_none());
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let runner = TrialRunner::from_config(quick_config()).unwrap();
        let report = runner.run(7).unwrap();
        assert_eq!(report.trials.len(), 3);
        assert_eq!(report.model, "BarrelIN");
        for (i, record) in report.trials.iter().enumerate() {
            assert_eq!(record.trial, i);
            assert_eq!(record, &runner.run_trial(i, 7).unwrap());
            let info = &record.current.information;
            // Cross-entropy is never negative, so MI never exceeds H
            assert!(info.mi_bits.is_finite() && info.mi_bits <= info.hidden_entropy_bits + 1e-9);
        }
    }

    #[test]
    fn test_traces_kept_on_request() {
        let config = ExperimentConfig {
            keep_traces: true,
            trials: 1,
            ..quick_config()
        };
        let record = TrialRunner::from_config(config).unwrap().run_trial(0, 3).unwrap();
        let traces = record.traces.unwrap();
        assert_eq!(traces.hidden_state.len(), 800);
        assert_eq!(traces.current_voltage.len(), 800);
        assert_eq!(traces.dynamic_voltage.len(), 800);
    }

    #[test]
    fn test_budget_exhaustion() {
        let config = ExperimentConfig {
            duration: 200.0,
            trials: 1,
            max_attempts_per_trial: 2,
            calibration: CalibrationConfig {
                max_attempts: 1,
                initial_scale: 1e-9,
                ..CalibrationConfig::default()
            },
            ..quick_config()
        };
        let runner = TrialRunner::from_config(config).unwrap();
        assert!(matches!(
            runner.run_trial(0, 1),
            Err(SpikeInfoError::TrialBudgetExhausted { trial: 0, attempts: 2 })
        ));
    }

    #[test]
    fn test_load_config_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
    "trials": 4,
    "qon_qoff": {{"type": "balanced_uniform", "minq": 0.01, "maxq": 0.05}}
}}"#
        )
        .unwrap();

        let config = ExperimentConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.trials, 4);
        assert_eq!(
            config.qon_qoff,
            QonQoffPolicy::BalancedUniform { minq: 0.01, maxq: 0.05 }
        );
    }

    #[test]
    fn test_missing_config_file() {
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let result = ExperimentConfig::from_json_file(dir.path().join("experiment.json"));
        assert!(matches!(result, Err(SpikeInfoError::Io(_))));

        // Parameter table path is resolved when the model is built
        let config = ExperimentConfig {
            parameter_table: Some(dir.path().join("table.csv")),
            ..ExperimentConfig::pyramidal()
        };
        assert!(matches!(config.build_model(), Err(SpikeInfoError::Io(_))));
    }

    #[test]
    fn test_config_round_trip() {
        let config = ExperimentConfig::interneuron();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = ExperimentConfig::from_json_str(&json).unwrap();
        assert_eq!(restored.class, config.class);
        assert_eq!(restored.qon_qoff, config.qon_qoff);
        assert_eq!(restored.population_size, config.population_size);
    }
}
