//! Transducer arrays
//!
//! Element geometry only: positions in the array's local frame plus the
//! array-to-world transform. Acoustic modelling of the elements happens
//! outside this crate.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{LifuError, Result};
use crate::units::unit_conversion;

/// A single transducer element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub index: usize,
    /// Centre of the element, in the owning transducer's units
    pub position: Vector3<f64>,
    /// Width and length of the element face
    #[serde(default)]
    pub size: [f64; 2],
}

impl Element {
    /// Distance from the element centre to `point`.
    ///
    /// Element positions are stored in `element_units`; `point` and the
    /// result are in `units`. `matrix` maps element coordinates (already
    /// scaled into `units`) into the frame `point` is expressed in.
    pub fn distance_to_point(
        &self,
        point: &Vector3<f64>,
        element_units: &str,
        units: &str,
        matrix: &Matrix4<f64>,
    ) -> Result<f64> {
        let scl = unit_conversion(element_units, units)?;
        let local = Point3::from(self.position * scl);
        let world = matrix.transform_point(&local);
        Ok((world.coords - point).norm())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transducer {
    pub id: String,
    pub name: String,
    /// Nominal centre frequency [Hz]
    pub frequency: f64,
    pub units: String,
    pub elements: Vec<Element>,
    /// Array-to-world transform; its translation is in `units`
    #[serde(default = "identity")]
    pub matrix: Matrix4<f64>,
}

fn identity() -> Matrix4<f64> {
    Matrix4::identity()
}

impl Transducer {
    /// Build a rectangular `nx` x `ny` matrix array centred on the origin.
    ///
    /// Elements are numbered row-major along x, starting at 0, and lie in
    /// the z = 0 plane facing +z.
    pub fn matrix_array(
        nx: usize,
        ny: usize,
        pitch: f64,
        kerf: f64,
        units: &str,
        frequency: f64,
    ) -> Self {
        let width = pitch - kerf;
        let x0 = -(nx.saturating_sub(1) as f64) * pitch / 2.0;
        let y0 = -(ny.saturating_sub(1) as f64) * pitch / 2.0;

        let elements = (0..ny)
            .flat_map(|j| (0..nx).map(move |i| (i, j)))
            .enumerate()
            .map(|(index, (i, j))| Element {
                index,
                position: Vector3::new(x0 + i as f64 * pitch, y0 + j as f64 * pitch, 0.0),
                size: [width, width],
            })
            .collect();

        Self {
            id: "transducer".to_string(),
            name: format!("{nx}x{ny} matrix array"),
            frequency,
            units: units.to_string(),
            elements,
            matrix: Matrix4::identity(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let transducer: Transducer = match ext.as_str() {
            "toml" => toml::from_str(&raw)?,
            "json" => serde_json::from_str(&raw)?,
            other => return Err(LifuError::UnsupportedFormat(other.to_string())),
        };
        transducer.validate()?;
        Ok(transducer)
    }

    pub fn validate(&self) -> Result<()> {
        if self.elements.is_empty() {
            return Err(LifuError::InvalidConfig(
                "transducer must have at least one element".to_string(),
            ));
        }
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(LifuError::InvalidConfig(
                "transducer frequency must be > 0".to_string(),
            ));
        }
        let indices: BTreeSet<usize> = self.elements.iter().map(|e| e.index).collect();
        if indices.len() != self.elements.len() {
            return Err(LifuError::InvalidConfig(
                "transducer element indices must be unique".to_string(),
            ));
        }
        unit_conversion(&self.units, "m")?;
        Ok(())
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Transform with its translation rescaled into `units`.
    pub fn matrix_in(&self, units: &str) -> Result<Matrix4<f64>> {
        let scl = unit_conversion(&self.units, units)?;
        let mut m = self.matrix;
        for row in 0..3 {
            m[(row, 3)] *= scl;
        }
        Ok(m)
    }

    /// Element centres in `units`, optionally mapped through the array transform.
    pub fn positions_in(&self, units: &str, transform: bool) -> Result<Vec<Vector3<f64>>> {
        let scl = unit_conversion(&self.units, units)?;
        let matrix = if transform {
            self.matrix_in(units)?
        } else {
            Matrix4::identity()
        };
        Ok(self
            .elements
            .iter()
            .map(|el| {
                matrix
                    .transform_point(&Point3::from(el.position * scl))
                    .coords
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matrix_array_is_centred() {
        let arr = Transducer::matrix_array(8, 8, 4.0, 0.5, "mm", 400e3);
        assert_eq!(arr.num_elements(), 64);
        let centroid: Vector3<f64> = arr
            .elements
            .iter()
            .map(|e| e.position)
            .sum::<Vector3<f64>>()
            / 64.0;
        assert_relative_eq!(centroid.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(arr.elements[1].position.x - arr.elements[0].position.x, 4.0);
        assert_relative_eq!(arr.elements[0].size[0], 3.5);
        arr.validate().unwrap();
    }

    #[test]
    fn positions_follow_transform_and_units() {
        let mut arr = Transducer::matrix_array(2, 1, 10.0, 0.0, "mm", 500e3);
        arr.matrix = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -5.0));

        let local = arr.positions_in("m", false).unwrap();
        assert_relative_eq!(local[0].x, -0.005);
        assert_relative_eq!(local[0].z, 0.0);

        let world = arr.positions_in("m", true).unwrap();
        assert_relative_eq!(world[1].x, 0.005);
        assert_relative_eq!(world[1].z, -0.005);
    }

    #[test]
    fn element_distance_to_point() {
        let arr = Transducer::matrix_array(1, 1, 1.0, 0.0, "mm", 500e3);
        let target = Vector3::new(0.03, 0.04, 0.0);
        let d = arr.elements[0]
            .distance_to_point(&target, &arr.units, "m", &arr.matrix_in("m").unwrap())
            .unwrap();
        assert_relative_eq!(d, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn duplicate_indices_are_rejected() {
        let mut arr = Transducer::matrix_array(2, 1, 1.0, 0.0, "mm", 500e3);
        arr.elements[1].index = 0;
        assert!(matches!(arr.validate(), Err(LifuError::InvalidConfig(_))));
    }
}
