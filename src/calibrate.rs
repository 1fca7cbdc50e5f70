//! Drive Calibrator
//!
//! Turns a raw drive into an injection for a particular neuron adapter.
//!
//! - **No target**: fixed policy, `baseline + drive * amplitude` for current
//!   drives, conductances times `amplitude` for conductance drives
//! - **Target rate**: search the scale until the adapter's mean rate lands in
//!   `rate_hz * (1 ± tolerance)`, then require the rate during ON bins to be
//!   at least `on_off_ratio` times the rate during OFF bins
//!
//! The search doubles or halves the scale until the target is bracketed, then
//! bisects geometrically. The adapter is restored from the caller's snapshot
//! before every attempt. Running out of attempts, or landing on the target
//! rate without enough ON/OFF contrast, is reported as
//! [`CalibrationOutcome::Failed`] so the caller can resample its input.

use serde::{Deserialize, Serialize};

use crate::drive::DriveSignal;
use crate::error::{ensure_positive, Result, SpikeInfoError};
use crate::hidden_state::HiddenState;
use crate::injection::Injection;
use crate::neuron::{NeuronAdapter, NeuronSnapshot};

/// Firing-rate goal for a calibrated injection
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateTarget {
    /// Mean output rate (Hz)
    pub rate_hz: f64,
    /// Minimum ON-state rate over OFF-state rate
    pub on_off_ratio: f64,
    /// Relative half-width of the accepted rate band
    pub tolerance: f64,
}

impl Default for RateTarget {
    fn default() -> Self {
        Self {
            rate_hz: 12.0,
            on_off_ratio: 1.5,
            tolerance: 0.1,
        }
    }
}

impl RateTarget {
    fn band(&self) -> (f64, f64) {
        (
            self.rate_hz * (1.0 - self.tolerance),
            self.rate_hz * (1.0 + self.tolerance),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// `None` applies the fixed baseline/amplitude policy
    pub target: Option<RateTarget>,
    /// Simulations allowed per calibration
    pub max_attempts: usize,
    /// First scale tried by the search
    pub initial_scale: f64,
    /// Offset added to current drives (nA)
    pub baseline: f64,
    /// Scale used when there is no target
    pub amplitude: f64,
    /// Parameter set passed to the adapter
    pub parameter_set: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target: Some(RateTarget::default()),
            max_attempts: 24,
            initial_scale: 1.0,
            baseline: 0.0,
            amplitude: 1.0,
            parameter_set: 0,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SpikeInfoError::invalid("max_attempts", "must be at least 1"));
        }
        ensure_positive("initial_scale", self.initial_scale)?;
        if !self.baseline.is_finite() {
            return Err(SpikeInfoError::invalid("baseline", "must be finite"));
        }
        if !self.amplitude.is_finite() {
            return Err(SpikeInfoError::invalid("amplitude", "must be finite"));
        }
        if let Some(target) = &self.target {
            ensure_positive("rate_hz", target.rate_hz)?;
            ensure_positive("on_off_ratio", target.on_off_ratio)?;
            if !(target.tolerance > 0.0 && target.tolerance < 1.0) {
                return Err(SpikeInfoError::invalid(
                    "tolerance",
                    format!("must lie in (0, 1), got {}", target.tolerance),
                ));
            }
        }
        Ok(())
    }
}

/// Output rates of one simulation, split by hidden state
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateMeasurement {
    pub rate_hz: f64,
    pub on_rate_hz: f64,
    pub off_rate_hz: f64,
}

impl RateMeasurement {
    /// Spikes are binned like the spike-train encoder; spikes outside the
    /// hidden state's span are ignored
    pub fn from_spikes(spike_times: &[f64], hidden: &HiddenState) -> Self {
        let dt = hidden.dt();
        let len = hidden.len();
        let (mut on_spikes, mut off_spikes) = (0usize, 0usize);
        for &t in spike_times {
            let bin = (t / dt).round();
            if !(bin >= 0.0 && (bin as usize) < len) {
                continue;
            }
            if hidden.is_on(bin as usize) {
                on_spikes += 1;
            } else {
                off_spikes += 1;
            }
        }
        let on_bins = hidden.count_on();
        let rate = |spikes: usize, bins: usize| {
            if bins == 0 {
                0.0
            } else {
                spikes as f64 / (bins as f64 * dt) * 1000.0
            }
        };
        Self {
            rate_hz: rate(on_spikes + off_spikes, len),
            on_rate_hz: rate(on_spikes, on_bins),
            off_rate_hz: rate(off_spikes, len - on_bins),
        }
    }

    /// ON rate over OFF rate; infinite when only ON spikes occurred
    pub fn on_off_ratio(&self) -> f64 {
        if self.off_rate_hz > 0.0 {
            self.on_rate_hz / self.off_rate_hz
        } else if self.on_rate_hz > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

/// Accepted injection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub scale: f64,
    pub baseline: f64,
    pub injection: Injection,
    /// Rates at the accepted scale; `None` under the fixed policy
    pub measured: Option<RateMeasurement>,
    /// Simulations spent
    pub attempts: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No scale inside the attempt cap hit the rate band
    AttemptsExhausted,
    /// Rate band hit but the ON/OFF contrast was too low
    InsufficientContrast,
}

/// Calibration gave up; resample the input and try again
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFailure {
    pub reason: FailureReason,
    pub attempts: usize,
    pub last_scale: f64,
    pub last_rate_hz: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CalibrationOutcome {
    Calibrated(Calibration),
    Failed(CalibrationFailure),
}

impl CalibrationOutcome {
    pub fn is_calibrated(&self) -> bool {
        matches!(self, Self::Calibrated(_))
    }

    pub fn calibrated(self) -> Option<Calibration> {
        match self {
            Self::Calibrated(c) => Some(c),
            Self::Failed(_) => None,
        }
    }
}

/// Scale search against a neuron adapter
#[derive(Clone, Debug)]
pub struct DriveCalibrator {
    config: CalibrationConfig,
}

impl DriveCalibrator {
    pub fn new(config: CalibrationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Calibrate `drive` for `adapter`, restoring `initial` before each run
    pub fn calibrate<A: NeuronAdapter + ?Sized>(
        &self,
        drive: &DriveSignal,
        hidden: &HiddenState,
        adapter: &mut A,
        initial: &NeuronSnapshot,
    ) -> Result<CalibrationOutcome> {
        if drive.len() != hidden.len() {
            return Err(SpikeInfoError::LengthMismatch {
                expected: hidden.len(),
                actual: drive.len(),
            });
        }
        if (drive.dt() - hidden.dt()).abs() > 1e-9 * hidden.dt() {
            return Err(SpikeInfoError::invalid(
                "dt",
                format!("drive step {} differs from hidden-state step {}", drive.dt(), hidden.dt()),
            ));
        }

        let Some(target) = self.config.target else {
            return Ok(CalibrationOutcome::Calibrated(Calibration {
                scale: self.config.amplitude,
                baseline: self.config.baseline,
                injection: Injection::from_drive(drive, self.config.baseline, self.config.amplitude),
                measured: None,
                attempts: 0,
            }));
        };

        let duration = hidden.len() as f64 * hidden.dt();
        let (low, high) = target.band();
        let mut scale = self.config.initial_scale;
        let mut lower: Option<f64> = None;
        let mut upper: Option<f64> = None;
        let mut last_rate = 0.0;

        for attempt in 1..=self.config.max_attempts {
            let injection = Injection::from_drive(drive, self.config.baseline, scale);
            adapter.restore(initial)?;
            let recording = adapter.simulate(&injection, duration, self.config.parameter_set)?;
            let measured = RateMeasurement::from_spikes(&recording.spike_times, hidden);
            last_rate = measured.rate_hz;

            log::debug!(
                "{} calibration attempt {}: scale {:.4} -> {:.2} Hz (on {:.2}, off {:.2})",
                adapter.model_name(),
                attempt,
                scale,
                measured.rate_hz,
                measured.on_rate_hz,
                measured.off_rate_hz
            );

            if measured.rate_hz < low {
                lower = Some(scale);
            } else if measured.rate_hz > high {
                upper = Some(scale);
            } else if measured.on_off_ratio() >= target.on_off_ratio {
                return Ok(CalibrationOutcome::Calibrated(Calibration {
                    scale,
                    baseline: self.config.baseline,
                    injection,
                    measured: Some(measured),
                    attempts: attempt,
                }));
            } else {
                return Ok(CalibrationOutcome::Failed(CalibrationFailure {
                    reason: FailureReason::InsufficientContrast,
                    attempts: attempt,
                    last_scale: scale,
                    last_rate_hz: measured.rate_hz,
                }));
            }

            if attempt < self.config.max_attempts {
                scale = match (lower, upper) {
                    (Some(l), Some(u)) => (l * u).sqrt(),
                    (Some(l), None) => l * 2.0,
                    (None, Some(u)) => u / 2.0,
                    (None, None) => scale,
                };
            }
        }

        Ok(CalibrationOutcome::Failed(CalibrationFailure {
            reason: FailureReason::AttemptsExhausted,
            attempts: self.config.max_attempts,
            last_scale: scale,
            last_rate_hz: last_rate,
        }))
    }
}
