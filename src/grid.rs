//! Simulation grid
//!
//! A regular 3-D grid in the transducer's local frame (lateral, elevation,
//! axial). Extents are snapped so that every axis spans a whole number of
//! `spacing` steps.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{LifuError, Result};
use crate::transducer::Transducer;
use crate::units::unit_conversion;

/// Relative mismatch between an extent and the spacing above which snapping is reported.
const SNAP_WARN_TOLERANCE: f64 = 1e-3;

/// Default minimum axial depth considered by [`SimulationGrid::max_cycle_offset`] [m].
pub const DEFAULT_CYCLE_OFFSET_ZMIN: f64 = 10e-3;

/// Deserializing always snaps: a grid read from TOML or JSON is either
/// rejected or lands on whole spacing steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridConfig")]
pub struct SimulationGrid {
    pub dims: [String; 3],
    pub names: [String; 3],
    pub spacing: f64,
    pub units: String,
    pub x_extent: (f64, f64),
    pub y_extent: (f64, f64),
    pub z_extent: (f64, f64),
    /// Time step [s]; 0 derives it from `cfl`
    pub dt: f64,
    /// End time [s]; 0 leaves it to the solver
    pub t_end: f64,
    /// Reference sound speed [m/s]
    pub c0: f64,
    pub cfl: f64,
    /// Solver-specific options, passed through untouched
    pub options: BTreeMap<String, serde_json::Value>,
}

impl Default for SimulationGrid {
    fn default() -> Self {
        Self {
            dims: ["lat".to_string(), "ele".to_string(), "ax".to_string()],
            names: [
                "Lateral".to_string(),
                "Elevation".to_string(),
                "Axial".to_string(),
            ],
            spacing: 1.0,
            units: "mm".to_string(),
            x_extent: (-30.0, 30.0),
            y_extent: (-30.0, 30.0),
            z_extent: (-4.0, 60.0),
            dt: 0.0,
            t_end: 0.0,
            c0: 1500.0,
            cfl: 0.5,
            options: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct GridConfig {
    dims: [String; 3],
    names: [String; 3],
    spacing: f64,
    units: String,
    x_extent: (f64, f64),
    y_extent: (f64, f64),
    z_extent: (f64, f64),
    dt: f64,
    t_end: f64,
    c0: f64,
    cfl: f64,
    options: BTreeMap<String, serde_json::Value>,
}

impl Default for GridConfig {
    fn default() -> Self {
        let grid = SimulationGrid::default();
        Self {
            dims: grid.dims,
            names: grid.names,
            spacing: grid.spacing,
            units: grid.units,
            x_extent: grid.x_extent,
            y_extent: grid.y_extent,
            z_extent: grid.z_extent,
            dt: grid.dt,
            t_end: grid.t_end,
            c0: grid.c0,
            cfl: grid.cfl,
            options: grid.options,
        }
    }
}

impl TryFrom<GridConfig> for SimulationGrid {
    type Error = LifuError;

    fn try_from(config: GridConfig) -> Result<Self> {
        SimulationGrid {
            dims: config.dims,
            names: config.names,
            spacing: config.spacing,
            units: config.units,
            x_extent: config.x_extent,
            y_extent: config.y_extent,
            z_extent: config.z_extent,
            dt: config.dt,
            t_end: config.t_end,
            c0: config.c0,
            cfl: config.cfl,
            options: config.options,
        }
        .snapped()
    }
}

/// Whole spacing steps covered by `extent`, rounded.
fn extent_steps(axis: &str, extent: (f64, f64), spacing: f64) -> Result<f64> {
    let (lo, hi) = extent;
    if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
        return Err(LifuError::InvalidConfig(format!(
            "{axis}_extent must be an increasing pair of finite values, got ({lo}, {hi})"
        )));
    }
    let n_round = ((hi - lo) / spacing).round();
    if n_round < 1.0 {
        return Err(LifuError::InvalidConfig(format!(
            "{axis}_extent ({lo}, {hi}) is shorter than one spacing step ({spacing})"
        )));
    }
    Ok(n_round)
}

fn snap_extent(axis: &str, extent: (f64, f64), spacing: f64) -> Result<(f64, f64)> {
    let (lo, hi) = extent;
    let n = (hi - lo) / spacing;
    let n_round = extent_steps(axis, extent, spacing)?;

    let snapped = (lo, lo + n_round * spacing);
    let frac = n - n.floor();
    if (0.5 - (frac - 0.5).abs()) / n_round > SNAP_WARN_TOLERANCE {
        log::warn!(
            "{axis}_extent ({lo}, {hi}) is not a multiple of spacing {spacing}, using ({}, {})",
            snapped.0,
            snapped.1
        );
    }
    Ok(snapped)
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| lo + step * i as f64).collect()
        }
    }
}

impl SimulationGrid {
    /// Check the grid without modifying it.
    pub fn validate(&self) -> Result<()> {
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(LifuError::InvalidConfig("spacing must be > 0".to_string()));
        }
        unit_conversion(&self.units, "m")?;

        let unique: BTreeSet<&str> = self.dims.iter().map(String::as_str).collect();
        if unique.len() != 3 {
            return Err(LifuError::InvalidConfig(format!(
                "dims must be distinct, got {:?}",
                self.dims
            )));
        }
        if !(self.c0.is_finite() && self.c0 > 0.0) {
            return Err(LifuError::InvalidConfig("c0 must be > 0".to_string()));
        }
        if !(self.cfl.is_finite() && self.cfl > 0.0) {
            return Err(LifuError::InvalidConfig("cfl must be > 0".to_string()));
        }
        if self.dt < 0.0 || self.t_end < 0.0 {
            return Err(LifuError::InvalidConfig(
                "dt and t_end must be >= 0".to_string(),
            ));
        }

        for (axis, extent) in ["x", "y", "z"].into_iter().zip(self.extents()) {
            extent_steps(axis, extent, self.spacing)?;
        }
        Ok(())
    }

    /// Validate the grid and snap its extents onto whole spacing steps.
    pub fn snap(&mut self) -> Result<()> {
        self.validate()?;
        self.x_extent = snap_extent("x", self.x_extent, self.spacing)?;
        self.y_extent = snap_extent("y", self.y_extent, self.spacing)?;
        self.z_extent = snap_extent("z", self.z_extent, self.spacing)?;
        Ok(())
    }

    pub fn snapped(mut self) -> Result<Self> {
        self.snap()?;
        Ok(self)
    }

    fn extents(&self) -> [(f64, f64); 3] {
        [self.x_extent, self.y_extent, self.z_extent]
    }

    /// Axis position (0 = x, 1 = y, 2 = z) of a dimension label.
    pub fn axis_index(&self, dim: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| LifuError::UnknownDimension(dim.to_string()))
    }

    /// Number of grid points along x, y, z.
    ///
    /// A grid that fails [`validate`](Self::validate) reports one point on
    /// any axis it cannot step along.
    pub fn size(&self) -> [usize; 3] {
        self.extents().map(|(lo, hi)| {
            let n = ((hi - lo) / self.spacing).round();
            if n.is_finite() && n >= 0.0 {
                (n as usize).saturating_add(1)
            } else {
                1
            }
        })
    }

    /// Number of grid points along the named dimension.
    pub fn size_of(&self, dim: &str) -> Result<usize> {
        Ok(self.size()[self.axis_index(dim)?])
    }

    pub fn num_points(&self) -> usize {
        self.size().iter().product()
    }

    /// Extents along x, y, z in `units`.
    pub fn extent(&self, units: &str) -> Result<[(f64, f64); 3]> {
        let scl = unit_conversion(&self.units, units)?;
        Ok(self.extents().map(|(lo, hi)| (lo * scl, hi * scl)))
    }

    pub fn spacing_in(&self, units: &str) -> Result<f64> {
        Ok(self.spacing * unit_conversion(&self.units, units)?)
    }

    /// Sample coordinates along x, y, z in `units`.
    pub fn coords(&self, units: &str) -> Result<[Vec<f64>; 3]> {
        let extent = self.extent(units)?;
        let size = self.size();
        Ok([0, 1, 2].map(|i| linspace(extent[i].0, extent[i].1, size[i])))
    }

    /// The eight corners of the grid box in `units`, x varying slowest.
    pub fn corners(&self, units: &str) -> Result<Vec<Vector3<f64>>> {
        let [x, y, z] = self.extent(units)?;
        let mut corners = Vec::with_capacity(8);
        for xi in [x.0, x.1] {
            for yi in [y.0, y.1] {
                for zi in [z.0, z.1] {
                    corners.push(Vector3::new(xi, yi, zi));
                }
            }
        }
        Ok(corners)
    }

    /// Largest distance from any transducer element to any grid corner, in `units`.
    pub fn max_distance(&self, arr: &Transducer, units: &str) -> Result<f64> {
        let corners = self.corners(units)?;
        let positions = arr.positions_in(units, false)?;
        let max = positions
            .iter()
            .flat_map(|p| corners.iter().map(move |c| (c - p).norm()))
            .fold(0.0_f64, f64::max);
        Ok(max)
    }

    /// Largest spread in arrival phase, in cycles, across elements.
    ///
    /// For every grid point at or beyond axial depth `zmin` [m] the time of
    /// flight from each element plus its delay is computed; the spread between
    /// the earliest and latest arrival is maximised over the grid and scaled
    /// by `frequency` (the transducer's own frequency when `None`). Missing
    /// delays are treated as zero.
    pub fn max_cycle_offset(
        &self,
        arr: &Transducer,
        frequency: Option<f64>,
        delays: Option<&[f64]>,
        zmin: f64,
    ) -> Result<f64> {
        let frequency = frequency.unwrap_or(arr.frequency);
        let zeros;
        let delays = match delays {
            Some(d) => d,
            None => {
                zeros = vec![0.0; arr.num_elements()];
                &zeros
            }
        };
        if delays.len() != arr.num_elements() {
            return Err(LifuError::LengthMismatch {
                context: "delays",
                expected: arr.num_elements(),
                got: delays.len(),
            });
        }

        let [xs, ys, zs] = self.coords("m")?;
        let positions = arr.positions_in("m", false)?;
        let zs: Vec<f64> = zs.into_iter().filter(|&z| z >= zmin).collect();
        if zs.is_empty() {
            return Err(LifuError::InvalidConfig(format!(
                "no grid points at or beyond zmin = {zmin} m"
            )));
        }

        let mut max_dtof = 0.0_f64;
        for &x in &xs {
            for &y in &ys {
                for &z in &zs {
                    let point = Vector3::new(x, y, z);
                    let (lo, hi) = positions.iter().zip(delays).fold(
                        (f64::INFINITY, f64::NEG_INFINITY),
                        |(lo, hi), (pos, delay)| {
                            let tof = (point - pos).norm() / self.c0 + delay;
                            (lo.min(tof), hi.max(tof))
                        },
                    );
                    max_dtof = max_dtof.max(hi - lo);
                }
            }
        }
        Ok(max_dtof * frequency)
    }

    /// Solver time step [s]: `dt` when set, otherwise the CFL-limited step at `c0`.
    pub fn time_step(&self) -> Result<f64> {
        if self.dt > 0.0 {
            return Ok(self.dt);
        }
        Ok(self.cfl * self.spacing_in("m")? / self.c0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_grid_size() {
        let grid = SimulationGrid::default().snapped().unwrap();
        assert_eq!(grid.size(), [61, 61, 65]);
        assert_eq!(grid.size_of("ax").unwrap(), 65);
        assert_eq!(grid.num_points(), 61 * 61 * 65);
    }

    #[test]
    fn uneven_extent_is_rounded() {
        let grid = SimulationGrid {
            spacing: 0.7,
            x_extent: (-10.0, 10.0),
            ..SimulationGrid::default()
        }
        .snapped()
        .unwrap();
        // 20 / 0.7 = 28.57 -> 29 steps
        assert_relative_eq!(grid.x_extent.1, -10.0 + 29.0 * 0.7, epsilon = 1e-12);
        assert_eq!(grid.size()[0], 30);
    }

    #[test]
    fn degenerate_extents_are_rejected() {
        let reversed = SimulationGrid {
            z_extent: (10.0, -10.0),
            ..SimulationGrid::default()
        };
        assert!(reversed.snapped().is_err());

        let too_short = SimulationGrid {
            spacing: 5.0,
            y_extent: (0.0, 1.0),
            ..SimulationGrid::default()
        };
        assert!(too_short.snapped().is_err());

        let mut dup = SimulationGrid::default();
        dup.dims[2] = "lat".to_string();
        assert!(dup.snapped().is_err());
    }

    #[test]
    fn extent_and_coords_in_metres() {
        let grid = SimulationGrid::default().snapped().unwrap();
        let extent = grid.extent("m").unwrap();
        assert_relative_eq!(extent[2].0, -0.004, epsilon = 1e-12);
        assert_relative_eq!(extent[2].1, 0.06, epsilon = 1e-12);

        let [x, _, z] = grid.coords("mm").unwrap();
        assert_eq!(x.len(), 61);
        assert_relative_eq!(x[0], -30.0);
        assert_relative_eq!(x[60], 30.0);
        assert_relative_eq!(z[4], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn corners_enumerate_x_slowest() {
        let grid = SimulationGrid::default().snapped().unwrap();
        let corners = grid.corners("mm").unwrap();
        assert_eq!(corners.len(), 8);
        assert_eq!(corners[0], Vector3::new(-30.0, -30.0, -4.0));
        assert_eq!(corners[1], Vector3::new(-30.0, -30.0, 60.0));
        assert_eq!(corners[7], Vector3::new(30.0, 30.0, 60.0));
    }

    #[test]
    fn max_distance_from_single_element() {
        let grid = SimulationGrid::default().snapped().unwrap();
        let arr = Transducer::matrix_array(1, 1, 1.0, 0.0, "mm", 500e3);
        let d = grid.max_distance(&arr, "mm").unwrap();
        assert_relative_eq!(
            d,
            (30.0f64 * 30.0 + 30.0 * 30.0 + 60.0 * 60.0).sqrt(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn single_element_has_no_cycle_offset() {
        let grid = SimulationGrid {
            spacing: 5.0,
            ..SimulationGrid::default()
        }
        .snapped()
        .unwrap();
        let arr = Transducer::matrix_array(1, 1, 1.0, 0.0, "mm", 500e3);
        let offset = grid
            .max_cycle_offset(&arr, None, None, DEFAULT_CYCLE_OFFSET_ZMIN)
            .unwrap();
        assert_relative_eq!(offset, 0.0);
    }

    #[test]
    fn cycle_offset_includes_delays() {
        let grid = SimulationGrid {
            spacing: 10.0,
            x_extent: (0.0, 10.0),
            y_extent: (0.0, 10.0),
            z_extent: (20.0, 30.0),
            ..SimulationGrid::default()
        }
        .snapped()
        .unwrap();
        // two coincident elements so geometry contributes nothing
        let mut arr = Transducer::matrix_array(2, 1, 1.0, 0.0, "mm", 1e6);
        arr.elements[1].position = arr.elements[0].position;
        let offset = grid
            .max_cycle_offset(&arr, None, Some(&[0.0, 2e-6]), 0.0)
            .unwrap();
        assert_relative_eq!(offset, 2.0, epsilon = 1e-9);

        assert!(matches!(
            grid.max_cycle_offset(&arr, None, Some(&[0.0]), 0.0),
            Err(LifuError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn time_step_from_cfl() {
        let grid = SimulationGrid::default();
        assert_relative_eq!(grid.time_step().unwrap(), 0.5 * 1e-3 / 1500.0);
        let fixed = SimulationGrid {
            dt: 1e-8,
            ..SimulationGrid::default()
        };
        assert_relative_eq!(fixed.time_step().unwrap(), 1e-8);
    }

    #[test]
    fn parses_from_toml() {
        let raw = r#"
            spacing = 0.5
            x_extent = [-20.0, 20.0]
            c0 = 1480.0

            [options]
            pml_size = 10
        "#;
        let grid: SimulationGrid = toml::from_str(raw).unwrap();
        assert_eq!(grid.size()[0], 81);
        assert_eq!(grid.options["pml_size"], serde_json::json!(10));
        assert_eq!(grid.dims[0], "lat");
    }

    #[test]
    fn deserialized_grid_is_snapped() {
        let grid: SimulationGrid =
            serde_json::from_str(r#"{"spacing": 1.0, "x_extent": [-10.0, 10.4]}"#).unwrap();
        assert_eq!(grid.x_extent, (-10.0, 10.0));
        let [x, _, _] = grid.coords("mm").unwrap();
        assert_eq!(x.len(), 21);
        assert_relative_eq!(x[1] - x[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn deserializing_a_bad_grid_fails() {
        assert!(serde_json::from_str::<SimulationGrid>(r#"{"spacing": 0.0}"#).is_err());
        assert!(serde_json::from_str::<SimulationGrid>(r#"{"z_extent": [5.0, 1.0]}"#).is_err());
    }

    #[test]
    fn validate_leaves_extents_alone() {
        let grid = SimulationGrid {
            x_extent: (-10.0, 10.4),
            ..SimulationGrid::default()
        };
        grid.validate().unwrap();
        assert_eq!(grid.x_extent, (-10.0, 10.4));

        let flat = SimulationGrid {
            spacing: 0.0,
            ..SimulationGrid::default()
        };
        assert!(flat.validate().is_err());
        assert_eq!(flat.size(), [1, 1, 1]);
    }
}
