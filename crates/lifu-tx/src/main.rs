use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;

use lifu::output::{
    create_timestamped_output_dir, utc_timestamp, write_manifest_json, MANIFEST_FILE,
};
use lifu::Protocol;
use lifu_tx::io::{
    read_delays_csv, write_registers_csv, write_registers_txt, Manifest, OUTPUT_SCHEMA_VERSION,
};
use lifu_tx::registers::{DEFAULT_CLK_FREQ, NUM_TRANSMITTERS};
use lifu_tx::{swap_byte_order, DelayProfile, ProfileSelection, PulseProfile, TxArray};

#[derive(Debug, Parser)]
#[command(name = "lifu-tx")]
#[command(
    about = "Generate TX7332 register writes for a LIFU protocol and externally computed delays"
)]
struct Cli {
    /// Protocol file (.toml or .json)
    #[arg(long)]
    protocol: PathBuf,

    /// CSV with a `delay` column and optional `apodization` column, one row per channel
    #[arg(long)]
    delays: PathBuf,

    #[arg(long, default_value = "s")]
    delay_units: String,

    /// Comma-separated module I2C addresses, in channel order
    #[arg(long, value_delimiter = ',', value_parser = parse_i2c_addr, default_value = "0x00")]
    i2c: Vec<u8>,

    #[arg(long, default_value_t = NUM_TRANSMITTERS)]
    transmitters: usize,

    #[arg(long, default_value_t = ProfileSelection::Set)]
    profiles: ProfileSelection,

    /// Profile slot for the generated delay and pulse profiles
    #[arg(long, default_value_t = 1)]
    profile_index: u8,

    #[arg(long, default_value_t = DEFAULT_CLK_FREQ)]
    bf_clk: f64,

    #[arg(long)]
    duty_cycle: Option<f64>,

    #[arg(long)]
    tail_count: Option<u32>,

    #[arg(long, default_value_t = false)]
    invert: bool,

    /// Group consecutive data registers into burst writes
    #[arg(long, default_value_t = false)]
    pack: bool,

    /// With --pack, write isolated data registers as one-word bursts
    #[arg(long, default_value_t = false)]
    pack_single: bool,

    #[arg(long, default_value_t = false)]
    swap_bytes: bool,

    #[arg(long, default_value = "output-lifu-tx")]
    outdir: PathBuf,
}

fn parse_i2c_addr(raw: &str) -> std::result::Result<u8, String> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => raw.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid I2C address '{raw}': {e}"))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let protocol = Protocol::from_file(&cli.protocol)
        .with_context(|| format!("failed to load protocol: {}", cli.protocol.display()))?;
    let channels = read_delays_csv(&cli.delays)?;

    let mut array = TxArray::new(&cli.i2c, cli.bf_clk, cli.transmitters)?;
    ensure!(
        channels.delays.len() == array.num_channels(),
        "{} delays read from {}, but {} module(s) drive {} channels",
        channels.delays.len(),
        cli.delays.display(),
        array.num_modules(),
        array.num_channels()
    );

    let mut pulse = PulseProfile::new(
        cli.profile_index,
        protocol.pulse.frequency,
        protocol.pulse.cycles(),
    )?
    .inverted(cli.invert);
    if let Some(duty_cycle) = cli.duty_cycle {
        pulse = pulse.with_duty_cycle(duty_cycle)?;
    }
    if let Some(tail_count) = cli.tail_count {
        pulse = pulse.with_tail_count(tail_count)?;
    }
    let delay_profile = DelayProfile::new(
        cli.profile_index,
        channels.delays,
        Some(channels.apodizations),
        &cli.delay_units,
    )?;

    array.add_delay_profile(delay_profile, None)?;
    array.add_pulse_profile(pulse.clone(), None)?;
    log::info!(
        "protocol '{}': {} Hz x {} cycles on {} channels",
        protocol.id,
        pulse.frequency,
        pulse.cycles,
        array.num_channels()
    );

    let mut devices = array.device_registers(cli.profiles, cli.pack, cli.pack_single)?;
    if cli.swap_bytes {
        for device in &mut devices {
            device.registers = swap_byte_order(&device.registers);
        }
    }

    let run_dir = create_timestamped_output_dir(&cli.outdir).with_context(|| {
        format!("failed to create run directory under {}", cli.outdir.display())
    })?;
    write_registers_csv(&run_dir.join("registers.csv"), &devices)?;
    write_registers_txt(&run_dir.join("registers.txt"), &devices)?;

    let manifest = Manifest {
        schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
        created_utc: utc_timestamp(),
        protocol_id: protocol.id.clone(),
        frequency_hz: pulse.frequency,
        cycles: pulse.cycles,
        duty_cycle: pulse.duty_cycle,
        bf_clk_hz: cli.bf_clk,
        profiles: cli.profiles.to_string(),
        pack: cli.pack,
        swap_bytes: cli.swap_bytes,
        i2c_addresses: array
            .i2c_addresses()
            .iter()
            .map(|a| format!("0x{a:02X}"))
            .collect(),
        num_channels: array.num_channels(),
        devices: devices.clone(),
        files: vec![
            "registers.csv".to_string(),
            "registers.txt".to_string(),
            MANIFEST_FILE.to_string(),
        ],
    };
    write_manifest_json(&run_dir, &manifest).context("failed to write manifest")?;

    let words: usize = devices
        .iter()
        .flat_map(|d| d.registers.values())
        .map(|block| block.len())
        .sum();
    println!(
        "Wrote {words} register words for {} device(s) to {}",
        devices.len(),
        run_dir.display()
    );
    Ok(())
}
