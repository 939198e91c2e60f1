//! Pulse timing: pulses grouped into trains, trains repeated.

use serde::{Deserialize, Serialize};

use crate::error::{LifuError, Result};
use crate::pulse::Pulse;
use crate::table::{ParamRow, ParamTable};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sequence {
    /// Interval between pulse onsets within a train [s]
    pub pulse_interval: f64,
    pub pulse_count: u32,
    /// Interval between train onsets [s]
    pub pulse_train_interval: f64,
    pub pulse_train_count: u32,
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            pulse_interval: 1.0,
            pulse_count: 1,
            pulse_train_interval: 1.0,
            pulse_train_count: 1,
        }
    }
}

impl Sequence {
    pub fn validate(&self) -> Result<()> {
        if !(self.pulse_interval.is_finite() && self.pulse_interval > 0.0) {
            return Err(LifuError::InvalidConfig(
                "pulse_interval must be > 0".to_string(),
            ));
        }
        if !(self.pulse_train_interval.is_finite() && self.pulse_train_interval > 0.0) {
            return Err(LifuError::InvalidConfig(
                "pulse_train_interval must be > 0".to_string(),
            ));
        }
        if self.pulse_count == 0 || self.pulse_train_count == 0 {
            return Err(LifuError::InvalidConfig(
                "pulse_count and pulse_train_count must be >= 1".to_string(),
            ));
        }
        if self.pulse_train_count > 1 && self.train_duration() > self.pulse_train_interval {
            return Err(LifuError::InvalidConfig(format!(
                "pulse train ({} x {} s) does not fit in pulse_train_interval {} s",
                self.pulse_count, self.pulse_interval, self.pulse_train_interval
            )));
        }
        Ok(())
    }

    /// Time spanned by one train of pulses [s].
    pub fn train_duration(&self) -> f64 {
        self.pulse_count as f64 * self.pulse_interval
    }

    /// Total sonication time across all trains [s].
    pub fn total_duration(&self) -> f64 {
        if self.pulse_train_count <= 1 {
            return self.train_duration();
        }
        (self.pulse_train_count - 1) as f64 * self.pulse_train_interval + self.train_duration()
    }

    /// Fraction of time the transducer is driving, averaged over the whole sequence.
    pub fn duty_cycle(&self, pulse: &Pulse) -> f64 {
        let total = self.total_duration();
        if total <= 0.0 {
            return 0.0;
        }
        let on_time = pulse.duration * self.pulse_count as f64 * self.pulse_train_count as f64;
        (on_time / total).min(1.0)
    }

    pub fn table(&self) -> ParamTable {
        ParamTable::new(vec![
            ParamRow::new("Pulse Interval", self.pulse_interval, "s"),
            ParamRow::new("Pulse Count", self.pulse_count as f64, ""),
            ParamRow::new("Pulse Train Interval", self.pulse_train_interval, "s"),
            ParamRow::new("Pulse Train Count", self.pulse_train_count as f64, ""),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn burst() -> Sequence {
        Sequence {
            pulse_interval: 0.1,
            pulse_count: 10,
            pulse_train_interval: 2.0,
            pulse_train_count: 3,
        }
    }

    #[test]
    fn total_duration_counts_last_train_only_once() {
        assert_relative_eq!(burst().total_duration(), 2.0 * 2.0 + 1.0);
    }

    #[test]
    fn duty_cycle_over_sequence() {
        let pulse = Pulse::new(500e3, 1e6, 0.01);
        // 30 pulses of 10 ms over 5 s
        assert_relative_eq!(burst().duty_cycle(&pulse), 0.3 / 5.0, epsilon = 1e-12);
    }

    #[test]
    fn overlapping_trains_are_rejected() {
        let seq = Sequence {
            pulse_train_interval: 0.5,
            ..burst()
        };
        assert!(seq.validate().is_err());
        assert!(burst().validate().is_ok());
    }

    #[test]
    fn single_train_may_exceed_train_interval() {
        let seq = Sequence {
            pulse_count: 5,
            ..Sequence::default()
        };
        assert!(seq.validate().is_ok());
    }

    #[test]
    fn table_has_counts_without_units() {
        let table = burst().table();
        assert_eq!(table.get("Pulse Count").unwrap().value, 10.0);
        assert_eq!(table.get("Pulse Count").unwrap().unit, "");
    }
}
