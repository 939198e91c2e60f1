use anyhow::{Context, Result};
use nalgebra::Vector3;
use serde::Serialize;

use lifu::grid::DEFAULT_CYCLE_OFFSET_ZMIN;
use lifu::{MaterialParam, ParamTable, Point, Protocol, Transducer};

/// Relative mismatch between pulse and transducer frequency worth a warning
const FREQUENCY_MISMATCH_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRow {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub units: String,
    pub radius: f64,
    /// Distance from the element centroid, in `units`
    pub distance: f64,
    pub in_grid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSummary {
    pub dims: [String; 3],
    pub names: [String; 3],
    pub units: String,
    pub spacing: f64,
    pub size: [usize; 3],
    pub extent: [(f64, f64); 3],
    pub num_points: usize,
    /// [s]
    pub time_step: f64,
    /// [m/s]
    pub c0: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialSummary {
    pub param: String,
    pub name: String,
    pub units: String,
    pub ref_value: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub protocol_id: String,
    pub protocol_name: String,
    pub transducer_id: String,
    pub num_elements: usize,
    pub transducer_frequency: f64,
    pub pulse_frequency: f64,
    pub pulse_cycles: u32,
    pub total_duration: f64,
    pub duty_cycle: f64,
    pub target_pressure: f64,
    pub num_foci: usize,
    pub ref_material: String,
    pub max_distance: f64,
    pub max_distance_units: String,
    /// Worst-case arrival spread across elements, in cycles of the pulse frequency
    pub max_cycle_offset: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanReport {
    pub summary: PlanSummary,
    pub targets: Vec<TargetRow>,
    pub protocol_table: ParamTable,
    pub grid: GridSummary,
    pub materials: Vec<MaterialSummary>,
}

fn centroid(positions: &[Vector3<f64>]) -> Vector3<f64> {
    if positions.is_empty() {
        return Vector3::zeros();
    }
    positions.iter().sum::<Vector3<f64>>() / positions.len() as f64
}

fn target_rows(
    protocol: &Protocol,
    transducer: &Transducer,
    target: &Point,
) -> Result<Vec<TargetRow>> {
    let foci = protocol
        .targets(target)
        .context("failed to expand focal pattern")?;
    let grid = &protocol.sim_setup;
    let extent = grid.extent(&target.units)?;
    let center = centroid(&transducer.positions_in(&target.units, false)?);

    let rows = foci
        .into_iter()
        .map(|focus| {
            let p = focus.position;
            let in_grid = [p.x, p.y, p.z]
                .iter()
                .zip(extent.iter())
                .all(|(&v, &(lo, hi))| v >= lo && v <= hi);
            if !in_grid {
                log::warn!(
                    "focus {} at ({}, {}, {}) {} lies outside the simulation grid",
                    focus.id,
                    p.x,
                    p.y,
                    p.z,
                    focus.units
                );
            }
            TargetRow {
                distance: (p - center).norm(),
                id: focus.id,
                name: focus.name,
                x: p.x,
                y: p.y,
                z: p.z,
                units: focus.units,
                radius: focus.radius,
                in_grid,
            }
        })
        .collect();
    Ok(rows)
}

fn material_rows(protocol: &Protocol) -> Result<Vec<MaterialSummary>> {
    let params = protocol
        .ref_params()
        .context("failed to map reference material parameters")?;
    let rows = MaterialParam::ALL
        .into_iter()
        .filter_map(|param| params.get(param))
        .map(|map| {
            let (min, max) = map
                .data
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            MaterialSummary {
                param: map.param.info().id.to_string(),
                name: map.long_name.to_string(),
                units: map.units.to_string(),
                ref_value: map.ref_value,
                min,
                max,
            }
        })
        .collect();
    Ok(rows)
}

/// Combine a protocol, transducer and target into a plan report.
pub fn build_report(
    protocol: &Protocol,
    transducer: &Transducer,
    target: &Point,
) -> Result<PlanReport> {
    protocol.validate().context("invalid protocol")?;
    transducer.validate().context("invalid transducer")?;

    let pulse = &protocol.pulse;
    let mismatch = (pulse.frequency - transducer.frequency).abs() / transducer.frequency;
    if mismatch > FREQUENCY_MISMATCH_TOLERANCE {
        log::warn!(
            "pulse frequency {} Hz differs from transducer frequency {} Hz",
            pulse.frequency,
            transducer.frequency
        );
    }

    let grid = &protocol.sim_setup;
    let grid_summary = GridSummary {
        dims: grid.dims.clone(),
        names: grid.names.clone(),
        units: grid.units.clone(),
        spacing: grid.spacing,
        size: grid.size(),
        extent: grid.extent(&grid.units)?,
        num_points: grid.num_points(),
        time_step: grid.time_step()?,
        c0: grid.c0,
    };

    let max_distance = grid.max_distance(transducer, &grid.units)?;
    let max_cycle_offset = grid
        .max_cycle_offset(
            transducer,
            Some(pulse.frequency),
            None,
            DEFAULT_CYCLE_OFFSET_ZMIN,
        )
        .context("failed to compute cycle offset")?;

    let targets = target_rows(protocol, transducer, target)?;
    let materials = material_rows(protocol)?;

    let summary = PlanSummary {
        protocol_id: protocol.id.clone(),
        protocol_name: protocol.name.clone(),
        transducer_id: transducer.id.clone(),
        num_elements: transducer.num_elements(),
        transducer_frequency: transducer.frequency,
        pulse_frequency: pulse.frequency,
        pulse_cycles: pulse.cycles(),
        total_duration: protocol.sequence.total_duration(),
        duty_cycle: protocol.sequence.duty_cycle(pulse),
        target_pressure: protocol.focal_pattern.target_pressure(),
        num_foci: targets.len(),
        ref_material: protocol.seg_method.ref_material_id().to_string(),
        max_distance,
        max_distance_units: grid.units.clone(),
        max_cycle_offset,
    };

    Ok(PlanReport {
        summary,
        targets,
        protocol_table: protocol.table(),
        grid: grid_summary,
        materials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lifu::{FocalPattern, Pulse, SimulationGrid};

    fn protocol() -> Protocol {
        Protocol {
            id: "p".to_string(),
            pulse: Pulse::new(500e3, 1e5, 1e-4),
            focal_pattern: FocalPattern::Wheel {
                target_pressure: 1e6,
                center: true,
                num_spokes: 4,
                spoke_radius: 2.0,
                units: "mm".to_string(),
            },
            sim_setup: SimulationGrid {
                x_extent: (-10.0, 10.0),
                y_extent: (-10.0, 10.0),
                z_extent: (0.0, 20.0),
                spacing: 2.0,
                ..SimulationGrid::default()
            }
            .snapped()
            .unwrap(),
            ..Protocol::default()
        }
    }

    fn transducer() -> Transducer {
        Transducer::matrix_array(4, 4, 3.0, 0.2, "mm", 500e3)
    }

    #[test]
    fn report_expands_foci_and_grid() {
        let target = Point::new("focus", Vector3::new(0.0, 0.0, 15.0), "mm");
        let report = build_report(&protocol(), &transducer(), &target).unwrap();

        assert_eq!(report.summary.num_foci, 5);
        assert_eq!(report.targets[0].id, "focus_center");
        assert_relative_eq!(report.targets[0].distance, 15.0, epsilon = 1e-12);
        assert!(report.targets.iter().all(|t| t.in_grid));

        assert_eq!(report.grid.size, [11, 11, 11]);
        assert_eq!(report.grid.num_points, 1331);
        assert_relative_eq!(report.grid.time_step, 0.5 * 2e-3 / 1500.0);
        assert_eq!(report.summary.pulse_cycles, 50);
        assert_eq!(report.protocol_table.len(), 7);
    }

    #[test]
    fn max_distance_reaches_far_corner() {
        let target = Point::new("focus", Vector3::new(0.0, 0.0, 15.0), "mm");
        let report = build_report(&protocol(), &transducer(), &target).unwrap();
        // corner element (-4.5, -4.5, 0) to grid corner (10, 10, 20)
        let expected = (14.5_f64.powi(2) * 2.0 + 20.0_f64.powi(2)).sqrt();
        assert_relative_eq!(report.summary.max_distance, expected, epsilon = 1e-9);
        assert!(report.summary.max_cycle_offset > 0.0);
    }

    #[test]
    fn reference_materials_are_uniform() {
        let target = Point::new("focus", Vector3::new(0.0, 0.0, 15.0), "mm");
        let report = build_report(&protocol(), &transducer(), &target).unwrap();
        assert_eq!(report.materials.len(), 5);
        let c = &report.materials[0];
        assert_eq!(c.param, "sound_speed");
        assert_eq!((c.min, c.max, c.ref_value), (1500.0, 1500.0, 1500.0));
        assert_eq!(report.summary.ref_material, "water");
    }

    #[test]
    fn focus_outside_grid_is_flagged() {
        let target = Point::new("deep", Vector3::new(0.0, 0.0, 40.0), "mm");
        let report = build_report(&protocol(), &transducer(), &target).unwrap();
        assert!(report.targets.iter().all(|t| !t.in_grid));
    }

    #[test]
    fn zero_spacing_grid_is_rejected() {
        let mut protocol = protocol();
        protocol.sim_setup.spacing = 0.0;
        let target = Point::new("focus", Vector3::new(0.0, 0.0, 15.0), "mm");
        let err = build_report(&protocol, &transducer(), &target).unwrap_err();
        assert!(format!("{err:#}").contains("spacing must be > 0"));
    }
}
