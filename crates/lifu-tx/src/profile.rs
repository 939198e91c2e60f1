//! Delay and pulse profiles, and the indexed set that stores them.

use std::fmt;
use std::str::FromStr;

use lifu::units::unit_conversion;
use serde::{Deserialize, Serialize};

use crate::registers::{
    DEFAULT_PATTERN_DUTY_CYCLE, DEFAULT_TAIL_COUNT, NUM_DELAY_PROFILES, NUM_PATTERN_PROFILES,
};
use crate::{Result, TxError};

/// A profile stored in one of the transmitter's numbered slots.
pub trait Profile: Clone {
    const KIND: &'static str;

    fn index(&self) -> u8;
}

/// Per-channel delays and on/off apodization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayProfile {
    pub index: u8,
    pub delays: Vec<f64>,
    pub apodizations: Vec<u8>,
    pub units: String,
}

impl DelayProfile {
    /// Build a profile; apodizations default to all channels on.
    pub fn new(
        index: u8,
        delays: Vec<f64>,
        apodizations: Option<Vec<u8>>,
        units: &str,
    ) -> Result<Self> {
        if !(1..=NUM_DELAY_PROFILES).contains(&index) {
            return Err(TxError::InvalidProfile {
                kind: Self::KIND,
                index,
            });
        }
        let apodizations = apodizations.unwrap_or_else(|| vec![1; delays.len()]);
        if apodizations.len() != delays.len() {
            return Err(TxError::LengthMismatch {
                context: "apodizations",
                expected: delays.len(),
                got: apodizations.len(),
            });
        }
        if let Some(bad) = apodizations.iter().find(|&&a| a > 1) {
            return Err(TxError::InvalidConfig(format!(
                "apodization must be 0 or 1, got {bad}"
            )));
        }
        if let Some(bad) = delays.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(TxError::InvalidConfig(format!(
                "delays must be finite and >= 0, got {bad}"
            )));
        }
        unit_conversion(units, "s")?;
        Ok(Self {
            index,
            delays,
            apodizations,
            units: units.to_string(),
        })
    }

    pub fn num_elements(&self) -> usize {
        self.delays.len()
    }

    /// Channels `start..start + len` as a profile with the same index.
    pub fn slice(&self, start: usize, len: usize) -> Result<Self> {
        let end = start + len;
        if end > self.num_elements() {
            return Err(TxError::LengthMismatch {
                context: "delay profile channels",
                expected: end,
                got: self.num_elements(),
            });
        }
        Ok(Self {
            index: self.index,
            delays: self.delays[start..end].to_vec(),
            apodizations: self.apodizations[start..end].to_vec(),
            units: self.units.clone(),
        })
    }
}

impl Profile for DelayProfile {
    const KIND: &'static str = "delay";

    fn index(&self) -> u8 {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseProfile {
    pub index: u8,
    /// [Hz]
    pub frequency: f64,
    pub cycles: u32,
    pub duty_cycle: f64,
    /// Idle samples after the last cycle
    pub tail_count: u32,
    pub invert: bool,
}

impl PulseProfile {
    pub fn new(index: u8, frequency: f64, cycles: u32) -> Result<Self> {
        let profile = Self {
            index,
            frequency,
            cycles,
            duty_cycle: DEFAULT_PATTERN_DUTY_CYCLE,
            tail_count: DEFAULT_TAIL_COUNT,
            invert: false,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn with_duty_cycle(mut self, duty_cycle: f64) -> Result<Self> {
        self.duty_cycle = duty_cycle;
        self.validate()?;
        Ok(self)
    }

    pub fn with_tail_count(mut self, tail_count: u32) -> Result<Self> {
        self.tail_count = tail_count;
        self.validate()?;
        Ok(self)
    }

    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=NUM_PATTERN_PROFILES).contains(&self.index) {
            return Err(TxError::InvalidProfile {
                kind: Self::KIND,
                index: self.index,
            });
        }
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(TxError::InvalidConfig(format!(
                "pulse frequency must be > 0, got {}",
                self.frequency
            )));
        }
        if self.cycles == 0 {
            return Err(TxError::InvalidConfig(
                "pulse must have at least one cycle".to_string(),
            ));
        }
        if !(self.duty_cycle > 0.0 && self.duty_cycle <= 1.0) {
            return Err(TxError::InvalidConfig(format!(
                "duty cycle must be in (0, 1], got {}",
                self.duty_cycle
            )));
        }
        Ok(())
    }
}

impl Profile for PulseProfile {
    const KIND: &'static str = "pulse";

    fn index(&self) -> u8 {
        self.index
    }
}

/// Profiles keyed by slot index, in insertion order, with an optional active one.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSet<T> {
    profiles: Vec<T>,
    active: Option<u8>,
}

impl<T> Default for ProfileSet<T> {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            active: None,
        }
    }
}

impl<T: Profile> ProfileSet<T> {
    fn position(&self, index: u8) -> Option<usize> {
        self.profiles.iter().position(|p| p.index() == index)
    }

    fn not_found(index: u8) -> TxError {
        TxError::ProfileNotFound {
            kind: T::KIND,
            index,
        }
    }

    /// Insert or replace by index. `activate = None` activates only when
    /// nothing is active yet. Returns whether the profile was activated.
    pub fn add(&mut self, profile: T, activate: Option<bool>) -> bool {
        let index = profile.index();
        match self.position(index) {
            Some(i) => {
                log::debug!("replacing {} profile {index}", T::KIND);
                self.profiles[i] = profile;
            }
            None => self.profiles.push(profile),
        }
        let activate = activate.unwrap_or(self.active.is_none());
        if activate {
            self.active = Some(index);
        }
        activate
    }

    pub fn remove(&mut self, index: u8) -> Result<T> {
        let i = self.position(index).ok_or_else(|| Self::not_found(index))?;
        if self.active == Some(index) {
            self.active = None;
        }
        Ok(self.profiles.remove(i))
    }

    /// Profile at `index`, or the active one when `None`.
    pub fn get(&self, index: Option<u8>) -> Result<&T> {
        let index = match index.or(self.active) {
            Some(index) => index,
            None => return Err(TxError::NoActiveProfile(T::KIND)),
        };
        self.position(index)
            .map(|i| &self.profiles[i])
            .ok_or_else(|| Self::not_found(index))
    }

    pub fn activate(&mut self, index: u8) -> Result<()> {
        if self.position(index).is_none() {
            return Err(Self::not_found(index));
        }
        self.active = Some(index);
        Ok(())
    }

    pub fn active(&self) -> Option<u8> {
        self.active
    }

    pub fn indices(&self) -> Vec<u8> {
        self.profiles.iter().map(Profile::index).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.profiles.clear();
        self.active = None;
    }

    /// Error unless at least one profile is stored and one is active.
    pub fn require_active(&self) -> Result<u8> {
        if self.is_empty() {
            return Err(TxError::NoProfiles(T::KIND));
        }
        self.active.ok_or(TxError::NoActiveProfile(T::KIND))
    }
}

/// Which stored profiles to write out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSelection {
    /// Only the active delay and pulse profiles
    Active,
    /// Every stored profile
    #[default]
    Set,
    /// Every stored profile, with unused data registers zeroed
    All,
}

impl FromStr for ProfileSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "set" => Ok(Self::Set),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown profile selection '{other}' (expected active, set or all)"
            )),
        }
    }
}

impl fmt::Display for ProfileSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Set => "set",
            Self::All => "all",
        };
        f.write_str(s)
    }
}
