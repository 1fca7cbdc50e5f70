//! Error types for spikeinfo

use thiserror::Error;

/// Spikeinfo error type
#[derive(Debug, Error)]
pub enum SpikeInfoError {
    /// Non-positive rate, step, duration, or otherwise out-of-domain argument
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    /// Unknown qon/qoff distribution policy name
    #[error("Unsupported qon/qoff policy: {0}")]
    UnsupportedPolicy(String),

    /// Two series that must share a time base have different lengths
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        expected: usize,
        actual: usize,
    },

    /// Value outside the allowed state alphabet
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Lookup table queried at a voltage that is not on its grid
    #[error("Voltage {voltage} mV is not on the lookup grid")]
    OffGrid {
        voltage: f64,
    },

    /// Malformed parameter table
    #[error("Parameter table error: {0}")]
    ParameterTable(String),

    /// Parameter set index beyond the table's columns
    #[error("Parameter set {index} out of range ({available} available)")]
    ParameterSetOutOfRange {
        index: usize,
        available: usize,
    },

    /// Neuron simulation failure
    #[error("Simulation error: {0}")]
    Simulation(String),

    /// A trial could not be calibrated within its resampling budget
    #[error("Trial {trial} gave up after {attempts} input resamples")]
    TrialBudgetExhausted {
        trial: usize,
        attempts: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config (de)serialization error
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl SpikeInfoError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpikeInfoError>;

/// Fail unless `value` is finite and strictly positive
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SpikeInfoError::invalid(name, format!("must be > 0, got {value}")))
    }
}
