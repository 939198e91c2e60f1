//! Sinusoidal drive pulse

use serde::{Deserialize, Serialize};

use crate::error::{LifuError, Result};
use crate::table::{ParamRow, ParamTable};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pulse {
    /// Frequency [Hz]
    pub frequency: f64,
    /// Amplitude [Pa]
    pub amplitude: f64,
    /// Duration [s]
    pub duration: f64,
}

impl Default for Pulse {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            amplitude: 1.0,
            duration: 1.0,
        }
    }
}

impl Pulse {
    pub fn new(frequency: f64, amplitude: f64, duration: f64) -> Self {
        Self {
            frequency,
            amplitude,
            duration,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(LifuError::InvalidConfig(
                "pulse frequency must be > 0".to_string(),
            ));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(LifuError::InvalidConfig(
                "pulse duration must be > 0".to_string(),
            ));
        }
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(LifuError::InvalidConfig(
                "pulse amplitude must be finite and >= 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Pulse value at each of the times `t` [s].
    pub fn calc_pulse(&self, t: &[f64]) -> Vec<f64> {
        let w = 2.0 * std::f64::consts::PI * self.frequency;
        t.iter().map(|&ti| self.amplitude * (w * ti).sin()).collect()
    }

    /// Sample times `0, dt, 2dt, ...` strictly below the pulse duration.
    pub fn calc_time(&self, dt: f64) -> Result<Vec<f64>> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(LifuError::InvalidConfig("dt must be > 0".to_string()));
        }
        let n = (self.duration / dt).ceil().max(0.0) as usize;
        Ok((0..n).map(|i| i as f64 * dt).collect())
    }

    /// Whole cycles in the pulse, rounded to nearest.
    pub fn cycles(&self) -> u32 {
        (self.duration * self.frequency).round().max(0.0) as u32
    }

    pub fn table(&self) -> ParamTable {
        ParamTable::new(vec![
            ParamRow::new("Frequency", self.frequency, "Hz"),
            ParamRow::new("Amplitude", self.amplitude, "Pa"),
            ParamRow::new("Duration", self.duration, "s"),
        ])
    }
}
