use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};

use crate::array::DeviceRegisters;
use crate::registers::format_registers;

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

fn default_apodization() -> u8 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct DelayRow {
    delay: f64,
    #[serde(default = "default_apodization")]
    apodization: u8,
}

/// Per-channel delays and apodizations computed by an external beamformer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDelays {
    pub delays: Vec<f64>,
    pub apodizations: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub created_utc: String,
    pub protocol_id: String,
    pub frequency_hz: f64,
    pub cycles: u32,
    pub duty_cycle: f64,
    pub bf_clk_hz: f64,
    pub profiles: String,
    pub pack: bool,
    pub swap_bytes: bool,
    pub i2c_addresses: Vec<String>,
    pub num_channels: usize,
    pub devices: Vec<DeviceRegisters>,
    pub files: Vec<String>,
}

/// Read a `delay[,apodization]` CSV, one row per channel in channel order.
pub fn read_delays_csv(path: &Path) -> Result<ChannelDelays> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open delays file: {}", path.display()))?;

    let mut delays = Vec::new();
    let mut apodizations = Vec::new();
    for (i, row) in rdr.deserialize::<DelayRow>().enumerate() {
        let row = row.with_context(|| format!("bad row {} in {}", i + 1, path.display()))?;
        delays.push(row.delay);
        apodizations.push(row.apodization);
    }
    ensure!(!delays.is_empty(), "no delays found in {}", path.display());
    Ok(ChannelDelays {
        delays,
        apodizations,
    })
}

/// One row per register word: device, block start, offset within the block, address and value.
pub fn write_registers_csv(path: &Path, devices: &[DeviceRegisters]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open registers.csv for writing: {}", path.display()))?;

    wtr.write_record([
        "i2c_addr",
        "transmitter",
        "block_addr",
        "offset",
        "address",
        "value",
    ])?;

    for device in devices {
        for (&start, block) in &device.registers {
            for (offset, value) in block.values().iter().enumerate() {
                wtr.write_record([
                    format!("0x{:02X}", device.i2c_addr),
                    device.transmitter.to_string(),
                    format!("0x{start:03X}"),
                    offset.to_string(),
                    format!("0x{:03X}", usize::from(start) + offset),
                    format!("0x{value:08X}"),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Register dump in the `0x<ADDR>:x<VALUE>` text form, one section per device.
pub fn write_registers_txt(path: &Path, devices: &[DeviceRegisters]) -> Result<()> {
    let mut out = String::new();
    for device in devices {
        out.push_str(&format!(
            "# i2c 0x{:02X} transmitter {}\n",
            device.i2c_addr, device.transmitter
        ));
        for line in format_registers(&device.registers) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{PackedRegisters, RegisterBlock};

    fn device() -> DeviceRegisters {
        let mut registers = PackedRegisters::new();
        registers.insert(0x16, RegisterBlock::Single(0x2000_2000));
        registers.insert(0x20, RegisterBlock::Burst(vec![1, 2]));
        DeviceRegisters {
            i2c_addr: 0x21,
            transmitter: 1,
            registers,
        }
    }

    #[test]
    fn reads_delays_with_optional_apodization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delays.csv");
        fs::write(&path, "delay,apodization\n1.5e-6,1\n0.0,0\n2e-6,1\n").unwrap();
        let parsed = read_delays_csv(&path).unwrap();
        assert_eq!(parsed.delays, vec![1.5e-6, 0.0, 2e-6]);
        assert_eq!(parsed.apodizations, vec![1, 0, 1]);

        let path = dir.path().join("delays_only.csv");
        fs::write(&path, "delay\n1.0\n2.0\n").unwrap();
        let parsed = read_delays_csv(&path).unwrap();
        assert_eq!(parsed.apodizations, vec![1, 1]);
    }

    #[test]
    fn empty_or_malformed_delays_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "delay,apodization\n").unwrap();
        assert!(read_delays_csv(&path).is_err());

        let path = dir.path().join("bad.csv");
        fs::write(&path, "delay\nsoon\n").unwrap();
        assert!(read_delays_csv(&path).is_err());
    }

    #[test]
    fn register_csv_expands_bursts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registers.csv");
        write_registers_csv(&path, &[device()]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "i2c_addr,transmitter,block_addr,offset,address,value");
        assert_eq!(lines[1], "0x21,1,0x016,0,0x016,0x20002000");
        assert_eq!(lines[3], "0x21,1,0x020,1,0x021,0x00000002");
    }

    #[test]
    fn register_text_has_device_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registers.txt");
        write_registers_txt(&path, &[device()]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# i2c 0x21 transmitter 1\n0x16:x20002000\n"));
        assert!(text.contains("0x20[+1]:x00000002"));
    }
}
