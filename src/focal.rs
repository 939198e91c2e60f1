//! Focal patterns: how a single treatment target expands into foci.

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

use crate::error::{LifuError, Result};
use crate::geo::Point;
use crate::units::unit_conversion;

fn default_target_pressure() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_num_spokes() -> usize {
    4
}

fn default_spoke_radius() -> f64 {
    1.0
}

fn default_units() -> String {
    "mm".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum FocalPattern {
    #[serde(rename = "SingleFocus")]
    SingleFocus {
        /// Target pressure [Pa]
        #[serde(default = "default_target_pressure")]
        target_pressure: f64,
    },
    /// Optional centre focus plus evenly spaced spokes on a circle around it.
    #[serde(rename = "WheelPattern")]
    Wheel {
        #[serde(default = "default_target_pressure")]
        target_pressure: f64,
        #[serde(default = "default_true")]
        center: bool,
        #[serde(default = "default_num_spokes")]
        num_spokes: usize,
        #[serde(default = "default_spoke_radius")]
        spoke_radius: f64,
        #[serde(default = "default_units")]
        units: String,
    },
}

impl Default for FocalPattern {
    fn default() -> Self {
        FocalPattern::SingleFocus {
            target_pressure: default_target_pressure(),
        }
    }
}

impl FocalPattern {
    pub fn target_pressure(&self) -> f64 {
        match self {
            FocalPattern::SingleFocus { target_pressure }
            | FocalPattern::Wheel {
                target_pressure, ..
            } => *target_pressure,
        }
    }

    pub fn num_foci(&self) -> usize {
        match self {
            FocalPattern::SingleFocus { .. } => 1,
            FocalPattern::Wheel {
                center, num_spokes, ..
            } => usize::from(*center) + num_spokes,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.target_pressure().is_finite() && self.target_pressure() > 0.0) {
            return Err(LifuError::InvalidConfig(
                "target_pressure must be > 0".to_string(),
            ));
        }
        if let FocalPattern::Wheel {
            num_spokes,
            spoke_radius,
            units,
            ..
        } = self
        {
            if self.num_foci() == 0 {
                return Err(LifuError::InvalidConfig(
                    "wheel pattern needs a center or at least one spoke".to_string(),
                ));
            }
            if *num_spokes > 0 && !(spoke_radius.is_finite() && *spoke_radius > 0.0) {
                return Err(LifuError::InvalidConfig(
                    "spoke_radius must be > 0".to_string(),
                ));
            }
            unit_conversion(units, "m")?;
        }
        Ok(())
    }

    /// Expand `target` into the foci of this pattern.
    ///
    /// Spokes are laid out in the target's local XY plane and expressed in
    /// the target's units.
    pub fn targets(&self, target: &Point) -> Result<Vec<Point>> {
        match self {
            FocalPattern::SingleFocus { .. } => Ok(vec![target.clone()]),
            FocalPattern::Wheel {
                center,
                num_spokes,
                spoke_radius,
                units,
                ..
            } => {
                let mut targets = Vec::with_capacity(self.num_foci());
                if *center {
                    let mut c = target.clone();
                    c.id = format!("{}_center", target.id);
                    c.name = format!("{} (Center)", target.name);
                    targets.push(c);
                }

                let radius = spoke_radius * unit_conversion(units, &target.units)?;
                let m = target.matrix();
                for i in 0..*num_spokes {
                    let theta = 2.0 * std::f64::consts::PI * i as f64 / *num_spokes as f64;
                    let local = Vector4::new(radius * theta.cos(), radius * theta.sin(), 0.0, 1.0);
                    let position = (m * local).xyz();
                    let deg = theta.to_degrees();
                    targets.push(Point {
                        id: format!("{}_{deg:.0}deg", target.id),
                        name: format!("{} ({deg:.0}°)", target.name),
                        position,
                        units: target.units.clone(),
                        radius: target.radius,
                    });
                }
                Ok(targets)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    fn target() -> Point {
        Point {
            id: "t".to_string(),
            name: "Target".to_string(),
            position: Vector3::new(0.0, 0.0, 30.0),
            units: "mm".to_string(),
            radius: 0.5,
        }
    }

    #[test]
    fn single_focus_returns_copy() {
        let pattern = FocalPattern::default();
        let targets = pattern.targets(&target()).unwrap();
        assert_eq!(targets, vec![target()]);
        assert_eq!(pattern.num_foci(), 1);
    }

    #[test]
    fn wheel_pattern_spokes() {
        let pattern = FocalPattern::Wheel {
            target_pressure: 1e6,
            center: true,
            num_spokes: 4,
            spoke_radius: 2.0,
            units: "mm".to_string(),
        };
        let targets = pattern.targets(&target()).unwrap();
        assert_eq!(targets.len(), pattern.num_foci());
        assert_eq!(targets.len(), 5);

        assert_eq!(targets[0].id, "t_center");
        assert_eq!(targets[0].name, "Target (Center)");
        assert_eq!(targets[2].id, "t_90deg");
        assert_eq!(targets[2].name, "Target (90°)");

        assert_abs_diff_eq!(targets[1].position.x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(targets[2].position.y, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(targets[3].position.x, -2.0, epsilon = 1e-12);
        for spoke in &targets[1..] {
            assert_abs_diff_eq!(spoke.position.z, 30.0, epsilon = 1e-12);
            assert_eq!(spoke.radius, 0.5);
        }
    }

    #[test]
    fn spoke_radius_converts_to_target_units() {
        let pattern = FocalPattern::Wheel {
            target_pressure: 1.0,
            center: false,
            num_spokes: 1,
            spoke_radius: 0.2,
            units: "cm".to_string(),
        };
        let targets = pattern.targets(&target()).unwrap();
        assert_eq!(targets.len(), 1);
        assert_abs_diff_eq!(targets[0].position.x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn deserializes_from_class_tag() {
        let raw = r#"{"class": "WheelPattern", "num_spokes": 6, "center": false}"#;
        let pattern: FocalPattern = serde_json::from_str(raw).unwrap();
        assert_eq!(pattern.num_foci(), 6);
        assert_eq!(pattern.target_pressure(), 1.0);
    }

    #[test]
    fn empty_wheel_is_invalid() {
        let pattern = FocalPattern::Wheel {
            target_pressure: 1.0,
            center: false,
            num_spokes: 0,
            spoke_radius: 1.0,
            units: "mm".to_string(),
        };
        assert!(pattern.validate().is_err());
    }
}
