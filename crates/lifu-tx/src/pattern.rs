//! Square-wave pulse patterns in the transmitter's period encoding.
//!
//! One cycle is split into four segments (high, rest, low, rest). Each
//! segment is stored as one or more periods whose on-chip duration is the
//! stored length plus two clock samples.

use serde::Serialize;

use crate::registers::{MAX_PATTERN_PERIODS, MAX_PATTERN_PERIOD_LENGTH};
use crate::{Result, TxError};

/// Largest clock divider exponent the pattern generator supports.
pub const MAX_CLK_DIV_N: u32 = 5;

const MIN_SEGMENT_SAMPLES: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulsePattern {
    /// Output level per period: 1, 0 or -1
    pub levels: Vec<i8>,
    /// Stored length per period (samples minus two)
    pub lengths: Vec<u32>,
    /// Pattern clock is `bf_clk / 2^clk_div_n`
    pub clk_div_n: u32,
    /// Sample times [s]
    pub t: Vec<f64>,
    /// Sampled output level
    pub y: Vec<i8>,
}

impl PulsePattern {
    pub fn num_periods(&self) -> usize {
        self.levels.len()
    }

    /// Samples in one cycle of the pattern.
    pub fn num_samples(&self) -> usize {
        self.lengths.iter().map(|&l| l as usize + 2).sum()
    }
}

fn split_segment(mut samples: i64, level: i8, levels: &mut Vec<i8>, lengths: &mut Vec<u32>) {
    let max = i64::from(MAX_PATTERN_PERIOD_LENGTH);
    while samples > 0 {
        if samples > max + 2 {
            // a 33-sample remainder would leave a 1-sample period
            if samples == max + 3 {
                lengths.push(MAX_PATTERN_PERIOD_LENGTH - 1);
                samples -= max + 1;
            } else {
                lengths.push(MAX_PATTERN_PERIOD_LENGTH);
                samples -= max + 2;
            }
        } else {
            lengths.push((samples - 2).max(0) as u32);
            samples = 0;
        }
        levels.push(level);
    }
}

/// Pattern for one cycle at `frequency` with the given on-fraction of each half cycle.
///
/// The clock divider is raised until the cycle fits in 16 periods.
pub fn calc_pulse_pattern(frequency: f64, duty_cycle: f64, bf_clk: f64) -> Result<PulsePattern> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return Err(TxError::InvalidConfig(format!(
            "pattern frequency must be > 0, got {frequency}"
        )));
    }
    if !(duty_cycle > 0.0 && duty_cycle <= 1.0) {
        return Err(TxError::InvalidConfig(format!(
            "duty cycle must be in (0, 1], got {duty_cycle}"
        )));
    }
    if !(bf_clk.is_finite() && bf_clk > 0.0) {
        return Err(TxError::InvalidConfig(format!(
            "beamformer clock must be > 0, got {bf_clk}"
        )));
    }

    let mut num_periods = 0;
    for clk_div_n in 0..=MAX_CLK_DIV_N {
        let clk_n = bf_clk / f64::from(1_u32 << clk_div_n);
        let period_samples = (clk_n / frequency) as i64;
        let first_half = period_samples / 2;
        let second_half = period_samples - first_half;

        let mut first_on = (first_half as f64 * duty_cycle) as i64;
        if first_on < MIN_SEGMENT_SAMPLES {
            log::warn!("Duty cycle too short. Setting to minimum of 2 samples");
            first_on = MIN_SEGMENT_SAMPLES;
        }
        let mut first_off = first_half - first_on;
        let mut second_on = ((second_half as f64 * duty_cycle) as i64).max(MIN_SEGMENT_SAMPLES);
        let mut second_off = second_half - second_on;

        if first_off > 0 && first_off < MIN_SEGMENT_SAMPLES {
            first_off = 0;
            first_on = first_half;
        }
        if second_off > 0 && second_off < MIN_SEGMENT_SAMPLES {
            second_off = 0;
            second_on = second_half;
        }

        let mut levels = Vec::new();
        let mut lengths = Vec::new();
        for (samples, level) in [(first_on, 1), (first_off, 0), (second_on, -1), (second_off, 0)] {
            split_segment(samples, level, &mut levels, &mut lengths);
        }

        num_periods = levels.len();
        if num_periods <= MAX_PATTERN_PERIODS {
            let y: Vec<i8> = levels
                .iter()
                .zip(&lengths)
                .flat_map(|(&level, &length)| std::iter::repeat(level).take(length as usize + 2))
                .collect();
            let t = (0..y.len()).map(|i| i as f64 / clk_n).collect();
            log::debug!(
                "pulse pattern at {frequency} Hz: {num_periods} periods, clk_div_n={clk_div_n}"
            );
            return Ok(PulsePattern {
                levels,
                lengths,
                clk_div_n,
                t,
                y,
            });
        }
    }
    Err(TxError::TooManyPeriods(num_periods))
}
