//! TX7332 register map and bit-field helpers.

use std::collections::BTreeMap;

use crate::{Result, TxError};

pub const NUM_TRANSMITTERS: usize = 2;
pub const NUM_CHANNELS: usize = 32;
pub const REGISTER_BYTES: usize = 4;
pub const REGISTER_WIDTH: u32 = (REGISTER_BYTES * 8) as u32;

pub const ADDRESS_GLOBAL_MODE: u16 = 0x00;
pub const ADDRESS_STANDBY: u16 = 0x01;
pub const ADDRESS_DYNPWR_2: u16 = 0x06;
pub const ADDRESS_LDO_PWR_1: u16 = 0x0B;
pub const ADDRESS_TRSW_TURNOFF: u16 = 0x0C;
pub const ADDRESS_DYNPWR_1: u16 = 0x0F;
pub const ADDRESS_LDO_PWR_2: u16 = 0x14;
pub const ADDRESS_TRSW_TURNON: u16 = 0x15;
pub const ADDRESS_DELAY_SEL: u16 = 0x16;
pub const ADDRESS_PATTERN_MODE: u16 = 0x18;
pub const ADDRESS_PATTERN_REPEAT: u16 = 0x19;
pub const ADDRESS_TRSW: u16 = 0x1A;
pub const ADDRESS_APODIZATION: u16 = 0x1B;
pub const ADDRESS_PATTERN_SEL_G2: u16 = 0x1E;
pub const ADDRESS_PATTERN_SEL_G1: u16 = 0x1F;

pub const ADDRESSES_GLOBAL: [u16; 15] = [
    ADDRESS_GLOBAL_MODE,
    ADDRESS_STANDBY,
    ADDRESS_DYNPWR_2,
    ADDRESS_LDO_PWR_1,
    ADDRESS_TRSW_TURNOFF,
    ADDRESS_DYNPWR_1,
    ADDRESS_LDO_PWR_2,
    ADDRESS_TRSW_TURNON,
    ADDRESS_DELAY_SEL,
    ADDRESS_PATTERN_MODE,
    ADDRESS_PATTERN_REPEAT,
    ADDRESS_PATTERN_SEL_G1,
    ADDRESS_PATTERN_SEL_G2,
    ADDRESS_TRSW,
    ADDRESS_APODIZATION,
];

pub const DELAY_DATA_START: u16 = 0x20;
pub const DELAY_DATA_END: u16 = 0x11F;
pub const PATTERN_DATA_START: u16 = 0x120;
pub const PATTERN_DATA_END: u16 = 0x19F;

/// Channel pairs sharing one delay register, high half first.
pub const DELAY_ORDER: [[usize; 2]; 16] = [
    [32, 30],
    [28, 26],
    [24, 22],
    [20, 18],
    [31, 29],
    [27, 25],
    [23, 21],
    [19, 17],
    [16, 14],
    [12, 10],
    [8, 6],
    [4, 2],
    [15, 13],
    [11, 9],
    [7, 5],
    [3, 1],
];
pub const DELAY_PROFILE_OFFSET: u16 = 16;
pub const NUM_DELAY_PROFILES: u8 = 16;
pub const DELAY_WIDTH: u32 = 13;

pub const PATTERN_PROFILE_OFFSET: u16 = 4;
pub const NUM_PATTERN_PROFILES: u8 = 32;
pub const MAX_PATTERN_PERIODS: usize = 16;
/// Pattern periods packed four to a register.
pub const PATTERN_PERIODS_PER_REGISTER: usize = 4;
pub const PATTERN_LENGTH_WIDTH: u32 = 5;
pub const PATTERN_LEVEL_WIDTH: u32 = 3;
pub const MAX_PATTERN_PERIOD_LENGTH: u32 = 30;

pub const MAX_REPEAT: u32 = (1 << 5) - 1;
pub const MAX_ELASTIC_REPEAT: u64 = (1 << 16) - 1;
pub const DEFAULT_TAIL_COUNT: u32 = 29;
pub const DEFAULT_CLK_FREQ: f64 = 64e6;
pub const DEFAULT_PATTERN_DUTY_CYCLE: f64 = 0.66;

/// Register address to 32-bit value.
pub type Registers = BTreeMap<u16, u32>;

/// Register writes grouped by start address.
pub type PackedRegisters = BTreeMap<u16, RegisterBlock>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterBlock {
    Single(u32),
    /// Values for consecutive addresses starting at the key
    Burst(Vec<u32>),
}

impl RegisterBlock {
    pub fn values(&self) -> &[u32] {
        match self {
            RegisterBlock::Single(v) => std::slice::from_ref(v),
            RegisterBlock::Burst(vs) => vs,
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    fn map(&self, f: impl Fn(u32) -> u32) -> Self {
        match self {
            RegisterBlock::Single(v) => RegisterBlock::Single(f(*v)),
            RegisterBlock::Burst(vs) => RegisterBlock::Burst(vs.iter().map(|&v| f(v)).collect()),
        }
    }
}

fn field_mask(lsb: u32, width: Option<u32>) -> Result<(u32, u64)> {
    let width = width.unwrap_or(REGISTER_WIDTH.saturating_sub(lsb));
    if width == 0 || lsb + width > REGISTER_WIDTH {
        return Err(TxError::InvalidConfig(format!(
            "bit field lsb={lsb} width={width} exceeds {REGISTER_WIDTH}-bit register"
        )));
    }
    Ok((width, (1_u64 << width) - 1))
}

/// Write `value` into the `width`-bit field at `lsb` (to the top of the register
/// when `width` is `None`).
pub fn set_register_value(reg: u32, value: i64, lsb: u32, width: Option<u32>) -> Result<u32> {
    let (width, mask) = field_mask(lsb, width)?;
    if value < 0 || value as u64 > mask {
        return Err(TxError::ValueOverflow { value, width });
    }
    let cleared = u64::from(reg) & !(mask << lsb);
    Ok((cleared | ((value as u64 & mask) << lsb)) as u32)
}

pub fn get_register_value(reg: u32, lsb: u32, width: Option<u32>) -> Result<u32> {
    let (_, mask) = field_mask(lsb, width)?;
    Ok(((u64::from(reg) >> lsb) & mask) as u32)
}

/// Address and lsb of `channel`'s delay in `profile`.
pub fn delay_location(channel: usize, profile: u8) -> Result<(u16, u32)> {
    let (row, slot) = DELAY_ORDER
        .iter()
        .enumerate()
        .find_map(|(row, pair)| pair.iter().position(|&c| c == channel).map(|i| (row, i)))
        .ok_or(TxError::InvalidChannel(channel))?;
    if !(1..=NUM_DELAY_PROFILES).contains(&profile) {
        return Err(TxError::InvalidProfile {
            kind: "delay",
            index: profile,
        });
    }
    let address = DELAY_DATA_START + u16::from(profile - 1) * DELAY_PROFILE_OFFSET + row as u16;
    Ok((address, 16 * (1 - slot as u32)))
}

/// Address, level lsb and length lsb of pattern `period` in `profile`.
pub fn pattern_location(period: usize, profile: u8) -> Result<(u16, u32, u32)> {
    if !(1..=MAX_PATTERN_PERIODS).contains(&period) {
        return Err(TxError::InvalidPeriod(period));
    }
    if !(1..=NUM_PATTERN_PROFILES).contains(&profile) {
        return Err(TxError::InvalidProfile {
            kind: "pulse",
            index: profile,
        });
    }
    let row = (period - 1) / PATTERN_PERIODS_PER_REGISTER;
    let slot = ((period - 1) % PATTERN_PERIODS_PER_REGISTER) as u32;
    let address = PATTERN_DATA_START + u16::from(profile - 1) * PATTERN_PROFILE_OFFSET + row as u16;
    let lsb_lvl = slot * (PATTERN_LEVEL_WIDTH + PATTERN_LENGTH_WIDTH);
    Ok((address, lsb_lvl, lsb_lvl + PATTERN_LEVEL_WIDTH))
}

/// Group consecutive addresses into bursts.
///
/// Isolated registers stay [`RegisterBlock::Single`] unless `pack_single`.
pub fn pack_registers(regs: &Registers, pack_single: bool) -> PackedRegisters {
    let mut bursts: Vec<(u16, Vec<u32>)> = Vec::new();
    for (&addr, &value) in regs {
        if let Some((start, values)) = bursts.last_mut() {
            if usize::from(*start) + values.len() == usize::from(addr) {
                values.push(value);
                continue;
            }
        }
        bursts.push((addr, vec![value]));
    }
    bursts
        .into_iter()
        .map(|(addr, values)| {
            let block = if values.len() == 1 && !pack_single {
                RegisterBlock::Single(values[0])
            } else {
                RegisterBlock::Burst(values)
            };
            (addr, block)
        })
        .collect()
}

/// Each register as its own single write.
pub fn unpacked(regs: &Registers) -> PackedRegisters {
    regs.iter()
        .map(|(&addr, &value)| (addr, RegisterBlock::Single(value)))
        .collect()
}

pub fn swap_byte_order(regs: &PackedRegisters) -> PackedRegisters {
    regs.iter()
        .map(|(&addr, block)| (addr, block.map(u32::swap_bytes)))
        .collect()
}

/// One line per register: `0x<ADDR>:x<VALUE>`, bursts as `0x<ADDR>[+i]:x<VALUE>`.
pub fn format_registers(regs: &PackedRegisters) -> Vec<String> {
    let mut lines = Vec::new();
    for (addr, block) in regs {
        match block {
            RegisterBlock::Single(v) => lines.push(format!("0x{addr:X}:x{v:08X}")),
            RegisterBlock::Burst(vs) => {
                for (i, v) in vs.iter().enumerate() {
                    lines.push(format!("0x{addr:X}[+{i}]:x{v:08X}"));
                }
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_bit_fields() {
        let reg = set_register_value(0, 5, 3, Some(3)).unwrap();
        assert_eq!(reg, 40);
        assert_eq!(get_register_value(reg, 3, Some(3)).unwrap(), 5);

        let reg = set_register_value(0xFFFF_FFFF, 0, 8, Some(4)).unwrap();
        assert_eq!(reg, 0xFFFF_F0FF);

        let full = set_register_value(0, 0xFFFF_FFFF, 0, None).unwrap();
        assert_eq!(full, u32::MAX);
        assert_eq!(get_register_value(0x8000_0000, 28, None).unwrap(), 8);
    }

    #[test]
    fn overflowing_values_are_rejected() {
        assert!(matches!(
            set_register_value(0, 8, 0, Some(3)),
            Err(TxError::ValueOverflow { value: 8, width: 3 })
        ));
        assert!(set_register_value(0, -1, 0, Some(3)).is_err());
        assert!(set_register_value(0, 1, 30, Some(4)).is_err());
    }

    #[test]
    fn delay_locations_follow_channel_order() {
        assert_eq!(delay_location(32, 1).unwrap(), (0x20, 16));
        assert_eq!(delay_location(30, 1).unwrap(), (0x20, 0));
        assert_eq!(delay_location(1, 1).unwrap(), (0x2F, 0));
        assert_eq!(delay_location(1, 2).unwrap(), (0x3F, 0));
        assert_eq!(delay_location(3, 16).unwrap(), (0x11F, 16));
        assert!(matches!(
            delay_location(33, 1),
            Err(TxError::InvalidChannel(33))
        ));
        assert!(delay_location(1, 17).is_err());
        assert!(delay_location(1, 0).is_err());
    }

    #[test]
    fn every_channel_has_a_unique_slot() {
        let mut seen = std::collections::BTreeSet::new();
        for channel in 1..=NUM_CHANNELS {
            assert!(seen.insert(delay_location(channel, 1).unwrap()));
        }
    }

    #[test]
    fn pattern_locations() {
        assert_eq!(pattern_location(1, 1).unwrap(), (0x120, 0, 3));
        assert_eq!(pattern_location(6, 1).unwrap(), (0x121, 8, 11));
        assert_eq!(pattern_location(16, 1).unwrap(), (0x123, 24, 27));
        assert_eq!(pattern_location(16, 32).unwrap(), (PATTERN_DATA_END, 24, 27));
        assert!(pattern_location(17, 1).is_err());
        assert!(pattern_location(1, 33).is_err());
    }

    #[test]
    fn packing_groups_consecutive_addresses() {
        let regs: Registers = [(0x10, 1), (0x11, 2), (0x13, 3)].into_iter().collect();
        let packed = pack_registers(&regs, false);
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[&0x10], RegisterBlock::Burst(vec![1, 2]));
        assert_eq!(packed[&0x13], RegisterBlock::Single(3));

        let packed = pack_registers(&regs, true);
        assert_eq!(packed[&0x13], RegisterBlock::Burst(vec![3]));
        assert!(pack_registers(&Registers::new(), false).is_empty());
    }

    #[test]
    fn swap_and_format() {
        let regs: Registers = [(0x16, 0x1234_5678), (0x20, 1), (0x21, 2)]
            .into_iter()
            .collect();
        let swapped = swap_byte_order(&unpacked(&regs));
        assert_eq!(swapped[&0x16], RegisterBlock::Single(0x7856_3412));

        let lines = format_registers(&pack_registers(&regs, false));
        assert_eq!(
            lines,
            vec![
                "0x16:x12345678".to_string(),
                "0x20[+0]:x00000001".to_string(),
                "0x20[+1]:x00000002".to_string(),
            ]
        );
    }
}
