use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;

use lifu::output::MANIFEST_FILE;
use lifu::ParamTable;

use crate::report::{GridSummary, MaterialSummary, PlanReport, PlanSummary, TargetRow};

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

pub const OUTPUT_FILES: [&str; 6] = [
    "targets.csv",
    "protocol.csv",
    "grid.csv",
    "materials.csv",
    "summary.json",
    MANIFEST_FILE,
];

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub created_utc: String,
    pub protocol_file: String,
    pub transducer_file: Option<String>,
    pub target: [f64; 3],
    pub target_units: String,
    pub files: Vec<String>,
}

fn fmt_f64(v: f64) -> String {
    format!("{v:.10}")
}

fn writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open {} for writing", path.display()))
}

pub fn write_targets_csv(path: &Path, rows: &[TargetRow]) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record([
        "id", "name", "x", "y", "z", "units", "radius", "distance", "in_grid",
    ])?;
    for row in rows {
        wtr.write_record([
            row.id.clone(),
            row.name.clone(),
            fmt_f64(row.x),
            fmt_f64(row.y),
            fmt_f64(row.z),
            row.units.clone(),
            fmt_f64(row.radius),
            fmt_f64(row.distance),
            row.in_grid.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_protocol_csv(path: &Path, table: &ParamTable) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["name", "value", "unit"])?;
    for row in &table.rows {
        wtr.write_record([row.name.clone(), fmt_f64(row.value), row.unit.clone()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per axis.
pub fn write_grid_csv(path: &Path, grid: &GridSummary) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["dim", "name", "min", "max", "size", "spacing", "units"])?;
    for axis in 0..3 {
        let (lo, hi) = grid.extent[axis];
        wtr.write_record([
            grid.dims[axis].clone(),
            grid.names[axis].clone(),
            fmt_f64(lo),
            fmt_f64(hi),
            grid.size[axis].to_string(),
            fmt_f64(grid.spacing),
            grid.units.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_materials_csv(path: &Path, rows: &[MaterialSummary]) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["param", "name", "units", "ref_value", "min", "max"])?;
    for row in rows {
        wtr.write_record([
            row.param.clone(),
            row.name.clone(),
            row.units.clone(),
            fmt_f64(row.ref_value),
            fmt_f64(row.min),
            fmt_f64(row.max),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    summary: &'a PlanSummary,
    grid: &'a GridSummary,
}

pub fn write_summary_json(path: &Path, report: &PlanReport) -> Result<()> {
    let payload = serde_json::to_string_pretty(&SummaryFile {
        summary: &report.summary,
        grid: &report.grid,
    })
    .context("failed to serialize plan summary")?;
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))
}

/// Write every report artifact into `run_dir`, except the manifest.
pub fn write_report(run_dir: &Path, report: &PlanReport) -> Result<()> {
    write_targets_csv(&run_dir.join("targets.csv"), &report.targets)?;
    write_protocol_csv(&run_dir.join("protocol.csv"), &report.protocol_table)?;
    write_grid_csv(&run_dir.join("grid.csv"), &report.grid)?;
    write_materials_csv(&run_dir.join("materials.csv"), &report.materials)?;
    write_summary_json(&run_dir.join("summary.json"), report)?;
    log::debug!("wrote plan report to {}", run_dir.display());
    Ok(())
}
