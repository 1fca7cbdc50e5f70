//! Injectable signals
//!
//! Physical-unit versions of a drive, sampled at the drive step and held
//! constant between samples (and after the last one), like a timed array.
//!
//! Units follow the neuron model receiving them; the barrel-cortex cells take
//! nA and µS.

use serde::{Deserialize, Serialize};

use crate::drive::{ConductanceDrive, CurrentDrive, DriveSignal, ReversalPotentials};

/// Clamp input held over one sample: a fixed current plus two conductances
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClampSample {
    pub current: f64,
    pub g_exc: f64,
    pub g_inh: f64,
    pub e_exc: f64,
    pub e_inh: f64,
}

impl ClampSample {
    /// `(I + g_exc E_exc + g_inh E_inh, g_exc + g_inh)`, the terms the clamp
    /// adds to a membrane's driving sum and total conductance
    pub fn terms(&self) -> (f64, f64) {
        (
            self.current + self.g_exc * self.e_exc + self.g_inh * self.e_inh,
            self.g_exc + self.g_inh,
        )
    }
}

/// Signal handed to a neuron simulation adapter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Injection {
    /// Current clamp: injected current per sample
    Current { dt: f64, values: Vec<f64> },
    /// Dynamic clamp: conductances per sample, driven through reversal potentials
    Conductance {
        dt: f64,
        exc: Vec<f64>,
        inh: Vec<f64>,
        reversal: ReversalPotentials,
    },
}

impl Injection {
    /// `baseline + drive * amplitude`
    pub fn from_current(drive: &CurrentDrive, baseline: f64, amplitude: f64) -> Self {
        Self::Current {
            dt: drive.dt,
            values: drive.values.iter().map(|v| baseline + v * amplitude).collect(),
        }
    }

    /// Both conductances times one shared `scale`
    pub fn from_conductance(drive: &ConductanceDrive, scale: f64) -> Self {
        Self::Conductance {
            dt: drive.dt,
            exc: drive.exc.iter().map(|g| g * scale).collect(),
            inh: drive.inh.iter().map(|g| g * scale).collect(),
            reversal: drive.reversal,
        }
    }

    /// Scale any drive: `baseline` only applies to current drives
    pub fn from_drive(drive: &DriveSignal, baseline: f64, scale: f64) -> Self {
        match drive {
            DriveSignal::Current(d) => Self::from_current(d, baseline, scale),
            DriveSignal::Conductance(d) => Self::from_conductance(d, scale),
        }
    }

    pub fn dt(&self) -> f64 {
        match self {
            Self::Current { dt, .. } | Self::Conductance { dt, .. } => *dt,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Current { values, .. } => values.len(),
            Self::Conductance { exc, .. } => exc.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Covered time span (ms)
    pub fn duration(&self) -> f64 {
        self.len() as f64 * self.dt()
    }

    fn sample_index(&self, t: f64) -> Option<usize> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let index = (t / self.dt()).floor().max(0.0) as usize;
        Some(index.min(len - 1))
    }

    /// Net current into the membrane at time `t` (ms) and potential `v` (mV)
    pub fn current_at(&self, t: f64, v: f64) -> f64 {
        let Some(i) = self.sample_index(t) else {
            return 0.0;
        };
        match self {
            Self::Current { values, .. } => values[i],
            Self::Conductance { exc, inh, reversal, .. } => {
                exc[i] * (reversal.exc - v) + inh[i] * (reversal.inh - v)
            }
        }
    }

    /// `(g_exc, g_inh)` at time `t`; zero for current injections
    pub fn conductances_at(&self, t: f64) -> (f64, f64) {
        match (self, self.sample_index(t)) {
            (Self::Conductance { exc, inh, .. }, Some(i)) => (exc[i], inh[i]),
            _ => (0.0, 0.0),
        }
    }

    /// Clamp input at sample `index`, held at the last sample past the end
    pub fn sample(&self, index: usize) -> ClampSample {
        let len = self.len();
        if len == 0 {
            return ClampSample::default();
        }
        let i = index.min(len - 1);
        match self {
            Self::Current { values, .. } => ClampSample {
                current: values[i],
                ..ClampSample::default()
            },
            Self::Conductance { exc, inh, reversal, .. } => ClampSample {
                current: 0.0,
                g_exc: exc[i],
                g_inh: inh[i],
                e_exc: reversal.exc,
                e_inh: reversal.inh,
            },
        }
    }

    /// Constant injected current `amplitude` for `duration` ms
    pub fn constant_current(amplitude: f64, dt: f64, duration: f64) -> Self {
        let len = (duration / dt).round() as usize;
        Self::Current {
            dt,
            values: vec![amplitude; len],
        }
    }
}
