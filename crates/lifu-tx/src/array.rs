//! Modules addressed over I2C, driving one contiguous channel vector.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::module::TxModule;
use crate::profile::{DelayProfile, ProfileSelection, ProfileSet, PulseProfile};
use crate::registers::{unpacked, PackedRegisters, Registers};
use crate::{Result, TxError};

/// Register image destined for one transmitter on one module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRegisters {
    pub i2c_addr: u8,
    pub transmitter: usize,
    #[serde(skip)]
    pub registers: PackedRegisters,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxArray {
    pub bf_clk: f64,
    modules: Vec<TxModule>,
    delay_profiles: ProfileSet<DelayProfile>,
    pulse_profiles: ProfileSet<PulseProfile>,
}

impl TxArray {
    /// Modules are laid out along the channel vector in the order given.
    pub fn new(i2c_addresses: &[u8], bf_clk: f64, num_transmitters: usize) -> Result<Self> {
        if i2c_addresses.is_empty() {
            return Err(TxError::InvalidConfig(
                "at least one I2C address is required".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(&dup) = i2c_addresses.iter().find(|&&a| !seen.insert(a)) {
            return Err(TxError::DuplicateI2cAddress(dup));
        }
        let modules = i2c_addresses
            .iter()
            .map(|&addr| TxModule::new(addr, bf_clk, num_transmitters))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            bf_clk,
            modules,
            delay_profiles: ProfileSet::default(),
            pulse_profiles: ProfileSet::default(),
        })
    }

    pub fn modules(&self) -> &[TxModule] {
        &self.modules
    }

    pub fn module(&self, i2c_addr: u8) -> Option<&TxModule> {
        self.modules.iter().find(|m| m.i2c_addr == i2c_addr)
    }

    pub fn i2c_addresses(&self) -> Vec<u8> {
        self.modules.iter().map(|m| m.i2c_addr).collect()
    }

    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn num_channels(&self) -> usize {
        self.modules.iter().map(TxModule::num_channels).sum()
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
        for module in &mut self.modules {
            module.add_pulse_profile(profile.clone(), Some(activate))?;
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
                context: "array delay profile",
                expected: self.num_channels(),
                got: profile.num_elements(),
            });
        }
        let mut start = 0;
        let mut slices = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            slices.push(profile.slice(start, module.num_channels())?);
            start += module.num_channels();
        }
        let activate = self.delay_profiles.add(profile, activate);
        for (module, slice) in self.modules.iter_mut().zip(slices) {
            module.add_delay_profile(slice, Some(activate))?;
        }
        Ok(())
    }

    pub fn remove_pulse_profile(&mut self, index: u8) -> Result<PulseProfile> {
        let removed = self.pulse_profiles.remove(index)?;
        for module in &mut self.modules {
            module.remove_pulse_profile(index)?;
        }
        Ok(removed)
    }

    pub fn remove_delay_profile(&mut self, index: u8) -> Result<DelayProfile> {
        let removed = self.delay_profiles.remove(index)?;
        for module in &mut self.modules {
            module.remove_delay_profile(index)?;
        }
        Ok(removed)
    }

    pub fn get_pulse_profile(&self, index: Option<u8>) -> Result<&PulseProfile> {
        self.pulse_profiles.get(index)
    }

    pub fn get_delay_profile(&self, index: Option<u8>) -> Result<&DelayProfile> {
        self.delay_profiles.get(index)
    }

    pub fn activate_pulse_profile(&mut self, index: u8) -> Result<()> {
        self.pulse_profiles.activate(index)?;
        for module in &mut self.modules {
            module.activate_pulse_profile(index)?;
        }
        Ok(())
    }

    pub fn activate_delay_profile(&mut self, index: u8) -> Result<()> {
        self.delay_profiles.activate(index)?;
        for module in &mut self.modules {
            module.activate_delay_profile(index)?;
        }
        Ok(())
    }

    /// Rebuild every module's pulse profiles from the array's set.
    pub fn recompute_pulse_profiles(&mut self) -> Result<()> {
        let active = self.pulse_profiles.active();
        for module in &mut self.modules {
            for index in module.pulse_profiles().indices() {
                module.remove_pulse_profile(index)?;
            }
            for profile in self.pulse_profiles.iter() {
                module.add_pulse_profile(profile.clone(), Some(active == Some(profile.index)))?;
            }
        }
        Ok(())
    }

    /// Rebuild every module's delay profiles from the array's set.
    pub fn recompute_delay_profiles(&mut self) -> Result<()> {
        for module in &mut self.modules {
            for index in module.delay_profiles().indices() {
                module.remove_delay_profile(index)?;
            }
        }
        let active = self.delay_profiles.active();
        let profiles: Vec<DelayProfile> = self.delay_profiles.iter().cloned().collect();
        for profile in profiles {
            let activate = active == Some(profile.index);
            self.add_delay_profile(profile, Some(activate))?;
        }
        Ok(())
    }

    /// Register images per module (keyed by I2C address), per transmitter.
    pub fn registers(&self, selection: ProfileSelection) -> Result<Vec<(u8, Vec<Registers>)>> {
        self.modules
            .iter()
            .map(|m| m.registers(selection).map(|regs| (m.i2c_addr, regs)))
            .collect()
    }

    pub fn delay_control_registers(&self, index: Option<u8>) -> Result<Vec<(u8, Vec<Registers>)>> {
        let index = index.or(self.delay_profiles.active());
        self.modules
            .iter()
            .map(|m| m.delay_control_registers(index).map(|regs| (m.i2c_addr, regs)))
            .collect()
    }

    pub fn pulse_control_registers(&self, index: Option<u8>) -> Result<Vec<(u8, Vec<Registers>)>> {
        let index = index.or(self.pulse_profiles.active());
        self.modules
            .iter()
            .map(|m| m.pulse_control_registers(index).map(|regs| (m.i2c_addr, regs)))
            .collect()
    }

    pub fn delay_data_registers(&self, index: Option<u8>) -> Result<Vec<(u8, Vec<Registers>)>> {
        let index = index.or(self.delay_profiles.active());
        self.modules
            .iter()
            .map(|m| m.delay_data_registers(index).map(|regs| (m.i2c_addr, regs)))
            .collect()
    }

    pub fn pulse_data_registers(&self, index: Option<u8>) -> Result<Vec<(u8, Vec<Registers>)>> {
        let index = index.or(self.pulse_profiles.active());
        self.modules
            .iter()
            .map(|m| m.pulse_data_registers(index).map(|regs| (m.i2c_addr, regs)))
            .collect()
    }

    /// Flattened per-device register writes, optionally packed into bursts.
    pub fn device_registers(
        &self,
        selection: ProfileSelection,
        pack: bool,
        pack_single: bool,
    ) -> Result<Vec<DeviceRegisters>> {
        let mut devices = Vec::new();
        for module in &self.modules {
            let images = if pack {
                module.packed_registers(selection, pack_single)?
            } else {
                module
                    .registers(selection)?
                    .iter()
                    .map(unpacked)
                    .collect()
            };
            devices.extend(
                images
                    .into_iter()
                    .enumerate()
                    .map(|(transmitter, registers)| DeviceRegisters {
                        i2c_addr: module.i2c_addr,
                        transmitter,
                        registers,
                    }),
            );
        }
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{DEFAULT_CLK_FREQ, NUM_TRANSMITTERS};

    fn array(addrs: &[u8]) -> TxArray {
        TxArray::new(addrs, DEFAULT_CLK_FREQ, NUM_TRANSMITTERS).unwrap()
    }

    fn profile(index: u8, n: usize) -> DelayProfile {
        let delays = (0..n).map(|i| (i % 64) as f64 * 0.1).collect();
        DelayProfile::new(index, delays, None, "us").unwrap()
    }

    #[test]
    fn addresses_must_be_unique_and_present() {
        assert!(matches!(
            TxArray::new(&[0x10, 0x11, 0x10], DEFAULT_CLK_FREQ, 2),
            Err(TxError::DuplicateI2cAddress(0x10))
        ));
        assert!(TxArray::new(&[], DEFAULT_CLK_FREQ, 2).is_err());
    }

    #[test]
    fn channel_vector_spans_all_modules() {
        let mut arr = array(&[0x20, 0x21]);
        assert_eq!(arr.num_channels(), 128);
        assert!(arr.add_delay_profile(profile(1, 64), None).is_err());
        arr.add_delay_profile(profile(1, 128), None).unwrap();

        let second = arr.module(0x21).unwrap().get_delay_profile(None).unwrap();
        assert_eq!(second.num_elements(), 64);
        assert_eq!(second.delays[1], 0.1);
        assert_eq!(arr.i2c_addresses(), vec![0x20, 0x21]);
    }

    #[test]
    fn device_registers_cover_every_transmitter() {
        let mut arr = array(&[0x20, 0x21]);
        arr.add_delay_profile(profile(1, 128), None).unwrap();
        arr.add_pulse_profile(PulseProfile::new(1, 500e3, 10).unwrap(), None)
            .unwrap();

        let devices = arr
            .device_registers(ProfileSelection::Active, false, false)
            .unwrap();
        assert_eq!(devices.len(), 4);
        assert_eq!(devices[2].i2c_addr, 0x21);
        assert_eq!(devices[2].transmitter, 0);
        assert_eq!(devices[3].registers.len(), 15 + 16 + 2);

        let packed = arr
            .device_registers(ProfileSelection::Active, true, false)
            .unwrap();
        assert_eq!(packed[0].registers.len(), 15 + 1 + 1);
    }

    #[test]
    fn remove_and_recompute() {
        let mut arr = array(&[0x01]);
        arr.add_delay_profile(profile(1, 64), None).unwrap();
        arr.add_delay_profile(profile(2, 64), Some(true)).unwrap();
        arr.add_pulse_profile(PulseProfile::new(1, 500e3, 10).unwrap(), None)
            .unwrap();

        arr.remove_delay_profile(1).unwrap();
        assert_eq!(arr.delay_profiles().active(), Some(2));
        let module = &arr.modules()[0];
        assert_eq!(module.delay_profiles().indices(), vec![2]);

        let before = arr.registers(ProfileSelection::Set).unwrap();
        arr.recompute_delay_profiles().unwrap();
        arr.recompute_pulse_profiles().unwrap();
        assert_eq!(arr.registers(ProfileSelection::Set).unwrap(), before);
    }

    #[test]
    fn control_registers_follow_active_profile() {
        let mut arr = array(&[0x01]);
        arr.add_delay_profile(profile(1, 64), None).unwrap();
        arr.add_delay_profile(profile(5, 64), None).unwrap();
        arr.activate_delay_profile(5).unwrap();
        let regs = arr.delay_control_registers(None).unwrap();
        assert_eq!(regs[0].0, 0x01);
        assert_eq!(regs[0].1[1][&crate::registers::ADDRESS_DELAY_SEL], (4 << 12) | (4 << 28));
    }
}
