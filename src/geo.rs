//! Target points
//!
//! A [`Point`] is a named location (a focus, a landmark) with a display
//! radius and the units its position is expressed in.

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::units::unit_conversion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Point {
    pub id: String,
    pub name: String,
    pub position: Vector3<f64>,
    pub units: String,
    /// Display radius, in `units`
    pub radius: f64,
}

impl Default for Point {
    fn default() -> Self {
        Self {
            id: "point".to_string(),
            name: "Point".to_string(),
            position: Vector3::zeros(),
            units: "mm".to_string(),
            radius: 1.0,
        }
    }
}

impl Point {
    pub fn new(id: impl Into<String>, position: Vector3<f64>, units: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            position,
            units: units.into(),
            ..Self::default()
        }
    }

    /// Position converted into `units`.
    pub fn position_in(&self, units: &str) -> Result<Vector3<f64>> {
        Ok(self.position * unit_conversion(&self.units, units)?)
    }

    /// Homogeneous transform whose origin sits on the point.
    ///
    /// Points carry no orientation, so the rotation block is the identity and
    /// the local frame is axis-aligned with the frame `position` lives in.
    pub fn matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.position)
    }

    /// Euclidean distance to `other`, in this point's units.
    pub fn distance_to(&self, other: &Point) -> Result<f64> {
        let other_pos = other.position_in(&self.units)?;
        Ok((self.position - other_pos).norm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn position_in_converts_units() {
        let p = Point::new("focus", Vector3::new(0.0, 0.0, 30.0), "mm");
        let m = p.position_in("m").unwrap();
        assert_relative_eq!(m.z, 0.03);
    }

    #[test]
    fn matrix_translates_origin_onto_point() {
        let p = Point::new("focus", Vector3::new(1.0, -2.0, 30.0), "mm");
        let origin = p.matrix() * nalgebra::Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin.xyz(), p.position);
    }

    #[test]
    fn distance_across_units() {
        let a = Point::new("a", Vector3::new(0.0, 0.0, 10.0), "mm");
        let b = Point::new("b", Vector3::new(0.0, 0.0, 2.0), "cm");
        assert_relative_eq!(a.distance_to(&b).unwrap(), 10.0, epsilon = 1e-12);
    }
}
