//! Unit conversion
//!
//! Scale factors between the handful of physical units the protocol and
//! geometry types carry around as strings (`"mm"`, `"us"`, `"MHz"`, ...).

use std::f64::consts::PI;

use crate::error::{LifuError, Result};

/// Physical dimension of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Length,
    Time,
    Frequency,
    Pressure,
    Angle,
}

const BASE_UNITS: [(&str, Dimension); 4] = [
    ("m", Dimension::Length),
    ("s", Dimension::Time),
    ("Hz", Dimension::Frequency),
    ("Pa", Dimension::Pressure),
];

fn prefix_scale(prefix: &str) -> Option<f64> {
    match prefix {
        "G" => Some(1e9),
        "M" => Some(1e6),
        "k" => Some(1e3),
        "c" => Some(1e-2),
        "m" => Some(1e-3),
        "u" | "µ" => Some(1e-6),
        "n" => Some(1e-9),
        _ => None,
    }
}

/// Resolve a unit string to its dimension and scale relative to SI.
pub fn parse_unit(unit: &str) -> Result<(Dimension, f64)> {
    let unit = unit.trim();
    match unit {
        "rad" => return Ok((Dimension::Angle, 1.0)),
        "deg" => return Ok((Dimension::Angle, PI / 180.0)),
        "min" => return Ok((Dimension::Time, 60.0)),
        "hr" | "h" => return Ok((Dimension::Time, 3600.0)),
        _ => {}
    }

    for (base, dim) in BASE_UNITS {
        if unit == base {
            return Ok((dim, 1.0));
        }
        if let Some(prefix) = unit.strip_suffix(base) {
            if prefix.chars().count() == 1 {
                if let Some(scale) = prefix_scale(prefix) {
                    return Ok((dim, scale));
                }
            }
        }
    }

    Err(LifuError::UnknownUnit(unit.to_string()))
}

/// Factor that converts a value expressed in `from` into `to`.
///
/// `unit_conversion("mm", "m")` is `1e-3`.
pub fn unit_conversion(from: &str, to: &str) -> Result<f64> {
    let (from_dim, from_scale) = parse_unit(from)?;
    let (to_dim, to_scale) = parse_unit(to)?;
    if from_dim != to_dim {
        return Err(LifuError::IncompatibleUnits {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(from_scale / to_scale)
}

/// Convert `value` from `from` units into `to` units.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64> {
    Ok(value * unit_conversion(from, to)?)
}
