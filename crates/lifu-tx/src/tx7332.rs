//! Register image of a single 32-channel TX7332 transmitter.

use lifu::units::unit_conversion;

use crate::pattern::calc_pulse_pattern;
use crate::profile::{DelayProfile, ProfileSelection, ProfileSet, PulseProfile};
use crate::registers::{
    delay_location, pack_registers, pattern_location, set_register_value, unpacked,
    PackedRegisters, Registers, ADDRESSES_GLOBAL, ADDRESS_APODIZATION, ADDRESS_DELAY_SEL,
    ADDRESS_PATTERN_MODE, ADDRESS_PATTERN_REPEAT, ADDRESS_PATTERN_SEL_G1, ADDRESS_PATTERN_SEL_G2,
    DEFAULT_CLK_FREQ, DELAY_DATA_END, DELAY_DATA_START, DELAY_WIDTH, MAX_ELASTIC_REPEAT,
    MAX_PATTERN_PERIODS, MAX_REPEAT, NUM_CHANNELS, PATTERN_DATA_END, PATTERN_DATA_START,
    PATTERN_LENGTH_WIDTH, PATTERN_LEVEL_WIDTH,
};
use crate::{Result, TxError};

const PATTERN_MODE_BASE: u32 = 0x0200_0003;
const PATTERN_TERMINATOR_LEVEL: i64 = 0b111;
/// Samples per elastic repeat count
const ELASTIC_REPEAT_SAMPLES: f64 = 16.0;

fn level_code(level: i8) -> i64 {
    match level {
        1 => 0b10,
        -1 => 0b01,
        _ => 0b00,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tx7332Registers {
    /// Beamformer clock [Hz]
    pub bf_clk: f64,
    delay_profiles: ProfileSet<DelayProfile>,
    pulse_profiles: ProfileSet<PulseProfile>,
}

impl Default for Tx7332Registers {
    fn default() -> Self {
        Self::new(DEFAULT_CLK_FREQ)
    }
}

impl Tx7332Registers {
    pub fn new(bf_clk: f64) -> Self {
        Self {
            bf_clk,
            delay_profiles: ProfileSet::default(),
            pulse_profiles: ProfileSet::default(),
        }
    }

    pub fn delay_profiles(&self) -> &ProfileSet<DelayProfile> {
        &self.delay_profiles
    }

    pub fn pulse_profiles(&self) -> &ProfileSet<PulseProfile> {
        &self.pulse_profiles
    }

    pub fn add_delay_profile(
        &mut self,
        profile: DelayProfile,
        activate: Option<bool>,
    ) -> Result<()> {
        if profile.num_elements() != NUM_CHANNELS {
            return Err(TxError::LengthMismatch {
                context: "transmitter delay profile",
                expected: NUM_CHANNELS,
                got: profile.num_elements(),
            });
        }
        self.delay_profiles.add(profile, activate);
        Ok(())
    }

    pub fn add_pulse_profile(
        &mut self,
        profile: PulseProfile,
        activate: Option<bool>,
    ) -> Result<()> {
        profile.validate()?;
        self.pulse_profiles.add(profile, activate);
        Ok(())
    }

    pub fn remove_delay_profile(&mut self, index: u8) -> Result<DelayProfile> {
        self.delay_profiles.remove(index)
    }

    pub fn remove_pulse_profile(&mut self, index: u8) -> Result<PulseProfile> {
        self.pulse_profiles.remove(index)
    }

    pub fn get_delay_profile(&self, index: Option<u8>) -> Result<&DelayProfile> {
        self.delay_profiles.get(index)
    }

    pub fn get_pulse_profile(&self, index: Option<u8>) -> Result<&PulseProfile> {
        self.pulse_profiles.get(index)
    }

    pub fn activate_delay_profile(&mut self, index: u8) -> Result<()> {
        self.delay_profiles.activate(index)
    }

    pub fn activate_pulse_profile(&mut self, index: u8) -> Result<()> {
        self.pulse_profiles.activate(index)
    }

    pub fn clear_delay_profiles(&mut self) {
        self.delay_profiles.clear();
    }

    pub fn clear_pulse_profiles(&mut self) {
        self.pulse_profiles.clear();
    }

    /// Delay-select and apodization registers for a delay profile.
    pub fn delay_control_registers(&self, index: Option<u8>) -> Result<Registers> {
        let profile = self.get_delay_profile(index)?;
        let mut apod = 0;
        for (i, &a) in profile.apodizations.iter().enumerate() {
            apod = set_register_value(apod, 1 - i64::from(a), i as u32, Some(1))?;
        }
        let sel = i64::from(profile.index - 1);
        let mut delay_sel = set_register_value(0, sel, 12, Some(4))?;
        delay_sel = set_register_value(delay_sel, sel, 28, Some(4))?;
        Ok([(ADDRESS_DELAY_SEL, delay_sel), (ADDRESS_APODIZATION, apod)]
            .into_iter()
            .collect())
    }

    /// Pattern mode, repeat and select registers for a pulse profile.
    ///
    /// Pulses longer than 32 cycles switch to elastic repeat, counted in
    /// 16-sample units of the beamformer clock.
    pub fn pulse_control_registers(&self, index: Option<u8>) -> Result<Registers> {
        let profile = self.get_pulse_profile(index)?;
        let pattern = calc_pulse_pattern(profile.frequency, profile.duty_cycle, self.bf_clk)?;

        let (repeat, elastic_mode, elastic_repeat) = if profile.cycles > MAX_REPEAT + 1 {
            let duration_samples = f64::from(profile.cycles) * self.bf_clk / profile.frequency;
            let elastic_repeat = (duration_samples / ELASTIC_REPEAT_SAMPLES) as u64;
            if elastic_repeat > MAX_ELASTIC_REPEAT {
                return Err(TxError::ElasticRepeatOverflow(elastic_repeat));
            }
            (0, 1, elastic_repeat as i64)
        } else {
            (i64::from(profile.cycles) - 1, 0, 0)
        };

        let clk_div = i64::from(pattern.clk_div_n);
        let mut mode = set_register_value(PATTERN_MODE_BASE, clk_div, 3, Some(3))?;
        mode = set_register_value(mode, i64::from(profile.invert), 6, Some(1))?;

        let mut reg_repeat = set_register_value(0, repeat, 1, Some(5))?;
        reg_repeat = set_register_value(reg_repeat, i64::from(profile.tail_count), 6, Some(5))?;
        reg_repeat = set_register_value(reg_repeat, elastic_mode, 11, Some(1))?;
        reg_repeat = set_register_value(reg_repeat, elastic_repeat, 12, Some(16))?;

        let pat_sel = set_register_value(0, i64::from(profile.index - 1), 0, Some(6))?;

        Ok([
            (ADDRESS_PATTERN_MODE, mode),
            (ADDRESS_PATTERN_REPEAT, reg_repeat),
            (ADDRESS_PATTERN_SEL_G1, pat_sel),
            (ADDRESS_PATTERN_SEL_G2, pat_sel),
        ]
        .into_iter()
        .collect())
    }

    /// Delay data registers: one 13-bit clock count per channel.
    pub fn delay_data_registers(&self, index: Option<u8>) -> Result<Registers> {
        let profile = self.get_delay_profile(index)?;
        let scale = unit_conversion(&profile.units, "s")? * self.bf_clk;
        let mut regs = Registers::new();
        for (i, delay) in profile.delays.iter().enumerate() {
            let (address, lsb) = delay_location(i + 1, profile.index)?;
            let value = (delay * scale) as i64;
            let reg = regs.entry(address).or_insert(0);
            *reg = set_register_value(*reg, value, lsb, Some(DELAY_WIDTH))?;
        }
        Ok(regs)
    }

    /// Pattern data registers; a short pattern is closed by a terminator period.
    pub fn pulse_data_registers(&self, index: Option<u8>) -> Result<Registers> {
        let profile = self.get_pulse_profile(index)?;
        let pattern = calc_pulse_pattern(profile.frequency, profile.duty_cycle, self.bf_clk)?;

        let mut periods: Vec<(i64, i64)> = pattern
            .levels
            .iter()
            .zip(&pattern.lengths)
            .map(|(&level, &length)| (level_code(level), i64::from(length)))
            .collect();
        if periods.len() < MAX_PATTERN_PERIODS {
            periods.push((PATTERN_TERMINATOR_LEVEL, 0));
        }

        let mut regs = Registers::new();
        for (i, (level, length)) in periods.into_iter().enumerate() {
            let (address, lsb_lvl, lsb_length) = pattern_location(i + 1, profile.index)?;
            let reg = regs.entry(address).or_insert(0);
            *reg = set_register_value(*reg, level, lsb_lvl, Some(PATTERN_LEVEL_WIDTH))?;
            *reg = set_register_value(*reg, length, lsb_length, Some(PATTERN_LENGTH_WIDTH))?;
        }
        Ok(regs)
    }

    /// Globals and control registers, delay data, and pattern data.
    fn register_sections(&self, selection: ProfileSelection) -> Result<[Registers; 3]> {
        self.delay_profiles.require_active()?;
        self.pulse_profiles.require_active()?;

        let mut control: Registers = ADDRESSES_GLOBAL.iter().map(|&addr| (addr, 0)).collect();
        control.extend(self.delay_control_registers(None)?);
        control.extend(self.pulse_control_registers(None)?);

        let (mut delay_data, mut pulse_data): (Registers, Registers) = match selection {
            ProfileSelection::All => (
                (DELAY_DATA_START..=DELAY_DATA_END).map(|a| (a, 0)).collect(),
                (PATTERN_DATA_START..=PATTERN_DATA_END).map(|a| (a, 0)).collect(),
            ),
            _ => (Registers::new(), Registers::new()),
        };
        match selection {
            ProfileSelection::Active => {
                delay_data.extend(self.delay_data_registers(None)?);
                pulse_data.extend(self.pulse_data_registers(None)?);
            }
            ProfileSelection::Set | ProfileSelection::All => {
                for p in self.delay_profiles.iter() {
                    delay_data.extend(self.delay_data_registers(Some(p.index))?);
                }
                for p in self.pulse_profiles.iter() {
                    pulse_data.extend(self.pulse_data_registers(Some(p.index))?);
                }
            }
        }
        Ok([control, delay_data, pulse_data])
    }

    /// Full register image for the selected profiles.
    pub fn registers(&self, selection: ProfileSelection) -> Result<Registers> {
        let [mut regs, delay_data, pulse_data] = self.register_sections(selection)?;
        regs.extend(delay_data);
        regs.extend(pulse_data);
        Ok(regs)
    }

    /// Register image with delay and pattern data grouped into bursts.
    ///
    /// Control registers are always written singly.
    pub fn packed_registers(
        &self,
        selection: ProfileSelection,
        pack_single: bool,
    ) -> Result<PackedRegisters> {
        let [control, delay_data, pulse_data] = self.register_sections(selection)?;
        let mut packed = unpacked(&control);
        packed.extend(pack_registers(&delay_data, pack_single));
        packed.extend(pack_registers(&pulse_data, pack_single));
        Ok(packed)
    }
}
