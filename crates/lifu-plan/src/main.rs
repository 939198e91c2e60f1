use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use nalgebra::Vector3;

use lifu::output::{create_timestamped_output_dir, utc_timestamp, write_manifest_json};
use lifu::{Point, Protocol, Transducer};
use lifu_plan::build_report;
use lifu_plan::io::{write_report, Manifest, OUTPUT_FILES, OUTPUT_SCHEMA_VERSION};

#[derive(Debug, Parser)]
#[command(name = "lifu-plan")]
#[command(about = "Summarise a LIFU treatment plan: foci, simulation grid and reference materials")]
struct Cli {
    /// Protocol file (.toml or .json)
    #[arg(long)]
    protocol: PathBuf,

    /// Transducer file (.toml or .json)
    #[arg(long)]
    transducer: PathBuf,

    /// Target position as x,y,z; defaults to the centre of the simulation grid
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    target: Option<Vec<f64>>,

    /// Units of --target; defaults to the grid units
    #[arg(long)]
    target_units: Option<String>,

    #[arg(long, default_value = "output-lifu-plan")]
    outdir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let protocol = Protocol::from_file(&cli.protocol)
        .with_context(|| format!("failed to load protocol: {}", cli.protocol.display()))?;
    let transducer = Transducer::from_file(&cli.transducer)
        .with_context(|| format!("failed to load transducer: {}", cli.transducer.display()))?;

    let grid = &protocol.sim_setup;
    let units = cli.target_units.unwrap_or_else(|| grid.units.clone());
    let position = match cli.target {
        Some(xyz) => {
            ensure!(xyz.len() == 3, "--target expects x,y,z");
            Vector3::new(xyz[0], xyz[1], xyz[2])
        }
        None => {
            let extent = grid.extent(&units)?;
            Vector3::from_fn(|i, _| 0.5 * (extent[i].0 + extent[i].1))
        }
    };
    let target = Point::new("target", position, units.clone());
    log::info!(
        "target at ({}, {}, {}) {units}",
        position.x,
        position.y,
        position.z
    );

    let report = build_report(&protocol, &transducer, &target)?;

    let run_dir = create_timestamped_output_dir(&cli.outdir).with_context(|| {
        format!("failed to create run directory under {}", cli.outdir.display())
    })?;
    write_report(&run_dir, &report)?;
    let manifest = Manifest {
        schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
        created_utc: utc_timestamp(),
        protocol_file: cli.protocol.display().to_string(),
        transducer_file: Some(cli.transducer.display().to_string()),
        target: [position.x, position.y, position.z],
        target_units: units,
        files: OUTPUT_FILES.iter().map(|f| f.to_string()).collect(),
    };
    write_manifest_json(&run_dir, &manifest).context("failed to write manifest")?;

    let s = &report.summary;
    println!(
        "Protocol '{}' on '{}': {} foci, {} cycles at {} Hz",
        s.protocol_id, s.transducer_id, s.num_foci, s.pulse_cycles, s.pulse_frequency
    );
    println!(
        "Grid {:?} ({} points), max distance {:.2} {}, max cycle offset {:.2}",
        report.grid.size,
        report.grid.num_points,
        s.max_distance,
        s.max_distance_units,
        s.max_cycle_offset
    );
    println!("Wrote plan report to {}", run_dir.display());
    Ok(())
}
