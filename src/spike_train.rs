//! Spike Train Encoder
//!
//! Maps simulator spike times onto the hidden-state time base.
//!
//! - bin index = `round(t / dt)`
//! - several spikes in one bin saturate to a single 1
//! - spikes outside `[0, len)` are dropped: they belong to the simulator's
//!   burn-in or post-stimulus tail, which is never decoded

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, Result, SpikeInfoError};

/// Binary spike series aligned with a hidden state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeTrain {
    bins: Vec<u8>,
}

impl SpikeTrain {
    /// Encode spike times (ms) into `len` bins of width `dt`
    pub fn encode(spike_times: &[f64], dt: f64, len: usize) -> Result<Self> {
        ensure_positive("dt", dt)?;
        let mut bins = vec![0u8; len];
        for &t in spike_times {
            if !t.is_finite() {
                continue;
            }
            let index = (t / dt).round();
            if index >= 0.0 && (index as usize) < len {
                bins[index as usize] = 1;
            }
        }
        Ok(Self { bins })
    }

    /// Wrap an existing 0/1 series
    pub fn from_bins(bins: Vec<u8>) -> Result<Self> {
        if let Some((i, v)) = bins.iter().enumerate().find(|(_, &v)| v > 1) {
            return Err(SpikeInfoError::InvalidState(format!(
                "spike train value {v} at bin {i} is not 0 or 1"
            )));
        }
        Ok(Self { bins })
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Number of occupied bins
    pub fn spike_count(&self) -> usize {
        self.bins.iter().filter(|&&b| b == 1).count()
    }

    /// Mean firing rate in Hz for bins of width `dt` ms
    pub fn rate_hz(&self, dt: f64) -> f64 {
        if self.bins.is_empty() || dt <= 0.0 {
            return 0.0;
        }
        self.spike_count() as f64 / (self.bins.len() as f64 * dt) * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_bins() {
        let dt = 0.5;
        let train = SpikeTrain::encode(&[0.0, dt, 2.0 * dt], dt, 3).unwrap();
        assert_eq!(train.bins(), &[1, 1, 1]);
    }

    #[test]
    fn test_out_of_range_dropped() {
        let dt = 0.5;
        let train = SpikeTrain::encode(&[0.0, 3.0 * dt, 10.0, -1.0], dt, 3).unwrap();
        assert_eq!(train.bins(), &[1, 0, 0]);
    }

    #[test]
    fn test_same_bin_saturates() {
        let train = SpikeTrain::encode(&[1.0, 1.1, 0.9], 0.5, 4).unwrap();
        assert_eq!(train.bins(), &[0, 0, 1, 0]);
        assert_eq!(train.spike_count(), 1);
    }

    #[test]
    fn test_rounds_to_nearest_bin() {
        let train = SpikeTrain::encode(&[0.74, 0.76], 0.5, 4).unwrap();
        assert_eq!(train.bins(), &[0, 1, 1, 0]);
    }

    #[test]
    fn test_rate() {
        // 2 spikes in 1000 bins of 0.5 ms = 4 Hz
        let train = SpikeTrain::encode(&[10.0, 200.0], 0.5, 1000).unwrap();
        assert!((train.rate_hz(0.5) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid() {
        assert!(SpikeTrain::encode(&[0.0], 0.0, 3).is_err());
        assert!(SpikeTrain::from_bins(vec![0, 1, 3]).is_err());
    }
}
