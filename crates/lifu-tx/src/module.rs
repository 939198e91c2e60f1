//! Transmitters sharing one I2C address.

use crate::profile::{DelayProfile, ProfileSelection, ProfileSet, PulseProfile};
use crate::registers::{
    PackedRegisters, Registers, DEFAULT_CLK_FREQ, NUM_CHANNELS, NUM_TRANSMITTERS,
};
use crate::tx7332::Tx7332Registers;
use crate::{Result, TxError};

/// A board of transmitters. Delay profiles cover every channel on the
/// board and are split into 32-channel slices, one per transmitter.
#[derive(Debug, Clone, PartialEq)]
pub struct TxModule {
    pub i2c_addr: u8,
    pub bf_clk: f64,
    delay_profiles: ProfileSet<DelayProfile>,
    pulse_profiles: ProfileSet<PulseProfile>,
    transmitters: Vec<Tx7332Registers>,
}

impl Default for TxModule {
    fn default() -> Self {
        Self {
            i2c_addr: 0,
            bf_clk: DEFAULT_CLK_FREQ,
            delay_profiles: ProfileSet::default(),
            pulse_profiles: ProfileSet::default(),
            transmitters: vec![Tx7332Registers::new(DEFAULT_CLK_FREQ); NUM_TRANSMITTERS],
        }
    }
}

impl TxModule {
    pub fn new(i2c_addr: u8, bf_clk: f64, num_transmitters: usize) -> Result<Self> {
        if num_transmitters == 0 {
            return Err(TxError::InvalidConfig(
                "a module needs at least one transmitter".to_string(),
            ));
        }
        Ok(Self {
            i2c_addr,
            bf_clk,
            delay_profiles: ProfileSet::default(),
            pulse_profiles: ProfileSet::default(),
            transmitters: vec![Tx7332Registers::new(bf_clk); num_transmitters],
        })
    }

    pub fn num_transmitters(&self) -> usize {
        self.transmitters.len()
    }

    pub fn num_channels(&self) -> usize {
        NUM_CHANNELS * self.num_transmitters()
    }

    pub fn transmitters(&self) -> &[Tx7332Registers] {
        &self.transmitters
    }

    pub fn delay_profiles(&self) -> &ProfileSet<DelayProfile> {
        &self.delay_profiles
    }

    pub fn pulse_profiles(&self) -> &ProfileSet<PulseProfile> {
        &self.pulse_profiles
    }

    pub fn add_pulse_profile(
        &mut self,
        profile: PulseProfile,
        activate: Option<bool>,
    ) -> Result<()> {
        profile.validate()?;
        let activate = self.pulse_profiles.add(profile.clone(), activate);
        for tx in &mut self.transmitters {
            tx.add_pulse_profile(profile.clone(), Some(activate))?;
        }
        Ok(())
    }

    pub fn add_delay_profile(
        &mut self,
        profile: DelayProfile,
        activate: Option<bool>,
    ) -> Result<()> {
        if profile.num_elements() != self.num_channels() {
            return Err(TxError::LengthMismatch {
                context: "module delay profile",
                expected: self.num_channels(),
                got: profile.num_elements(),
            });
        }
        let slices = (0..self.num_transmitters())
            .map(|i| profile.slice(i * NUM_CHANNELS, NUM_CHANNELS))
            .collect::<Result<Vec<_>>>()?;
        let activate = self.delay_profiles.add(profile, activate);
        for (tx, slice) in self.transmitters.iter_mut().zip(slices) {
            tx.add_delay_profile(slice, Some(activate))?;
        }
        Ok(())
    }

    pub fn remove_delay_profile(&mut self, index: u8) -> Result<DelayProfile> {
        let removed = self.delay_profiles.remove(index)?;
        for tx in &mut self.transmitters {
            tx.remove_delay_profile(index)?;
        }
        Ok(removed)
    }

    pub fn remove_pulse_profile(&mut self, index: u8) -> Result<PulseProfile> {
        let removed = self.pulse_profiles.remove(index)?;
        for tx in &mut self.transmitters {
            tx.remove_pulse_profile(index)?;
        }
        Ok(removed)
    }

    pub fn get_delay_profile(&self, index: Option<u8>) -> Result<&DelayProfile> {
        self.delay_profiles.get(index)
    }

    pub fn get_pulse_profile(&self, index: Option<u8>) -> Result<&PulseProfile> {
        self.pulse_profiles.get(index)
    }

    pub fn activate_delay_profile(&mut self, index: u8) -> Result<()> {
        self.delay_profiles.activate(index)?;
        for tx in &mut self.transmitters {
            tx.activate_delay_profile(index)?;
        }
        Ok(())
    }

    pub fn activate_pulse_profile(&mut self, index: u8) -> Result<()> {
        self.pulse_profiles.activate(index)?;
        for tx in &mut self.transmitters {
            tx.activate_pulse_profile(index)?;
        }
        Ok(())
    }

    /// Rebuild every transmitter's delay profiles from this module's set.
    pub fn recompute_delay_profiles(&mut self) -> Result<()> {
        for tx in &mut self.transmitters {
            tx.clear_delay_profiles();
        }
        let active = self.delay_profiles.active();
        let profiles: Vec<DelayProfile> = self.delay_profiles.iter().cloned().collect();
        for profile in profiles {
            let activate = active == Some(profile.index);
            self.add_delay_profile(profile, Some(activate))?;
        }
        Ok(())
    }

    /// Rebuild every transmitter's pulse profiles from this module's set.
    pub fn recompute_pulse_profiles(&mut self) -> Result<()> {
        let active = self.pulse_profiles.active();
        for tx in &mut self.transmitters {
            tx.clear_pulse_profiles();
            for profile in self.pulse_profiles.iter() {
                tx.add_pulse_profile(profile.clone(), Some(active == Some(profile.index)))?;
            }
        }
        Ok(())
    }

    pub fn delay_control_registers(&self, index: Option<u8>) -> Result<Vec<Registers>> {
        let index = index.or(self.delay_profiles.active());
        self.transmitters
            .iter()
            .map(|tx| tx.delay_control_registers(index))
            .collect()
    }

    pub fn pulse_control_registers(&self, index: Option<u8>) -> Result<Vec<Registers>> {
        let index = index.or(self.pulse_profiles.active());
        self.transmitters
            .iter()
            .map(|tx| tx.pulse_control_registers(index))
            .collect()
    }

    pub fn delay_data_registers(&self, index: Option<u8>) -> Result<Vec<Registers>> {
        let index = index.or(self.delay_profiles.active());
        self.transmitters
            .iter()
            .map(|tx| tx.delay_data_registers(index))
            .collect()
    }

    pub fn pulse_data_registers(&self, index: Option<u8>) -> Result<Vec<Registers>> {
        let index = index.or(self.pulse_profiles.active());
        self.transmitters
            .iter()
            .map(|tx| tx.pulse_data_registers(index))
            .collect()
    }

    /// Register image of each transmitter, in transmitter order.
    pub fn registers(&self, selection: ProfileSelection) -> Result<Vec<Registers>> {
        self.transmitters
            .iter()
            .map(|tx| tx.registers(selection))
            .collect()
    }

    pub fn packed_registers(
        &self,
        selection: ProfileSelection,
        pack_single: bool,
    ) -> Result<Vec<PackedRegisters>> {
        self.transmitters
            .iter()
            .map(|tx| tx.packed_registers(selection, pack_single))
            .collect()
    }
}
