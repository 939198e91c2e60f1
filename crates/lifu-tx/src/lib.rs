//! Register programming for TX7332 ultrasound transmitters.
//!
//! A transmitter holds up to 16 delay profiles and 32 pulse (pattern)
//! profiles in its register file. [`Tx7332Registers`] encodes profiles for
//! a single 32-channel chip, [`TxModule`] drives the transmitters that share
//! one I2C address, and [`TxArray`] spreads a full channel vector across
//! modules.

pub mod array;
pub mod io;
pub mod module;
pub mod pattern;
pub mod profile;
pub mod registers;
pub mod tx7332;


use thiserror::Error;

pub use array::{DeviceRegisters, TxArray};
pub use module::TxModule;
pub use pattern::{calc_pulse_pattern, PulsePattern};
pub use profile::{DelayProfile, Profile, ProfileSelection, ProfileSet, PulseProfile};
pub use registers::{
    format_registers, get_register_value, pack_registers, set_register_value, swap_byte_order,
    PackedRegisters, RegisterBlock, Registers,
};
pub use tx7332::Tx7332Registers;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Lifu(#[from] lifu::LifuError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("value {value} does not fit in {width} bits")]
    ValueOverflow { value: i64, width: u32 },
    #[error("invalid channel {0}")]
    InvalidChannel(usize),
    #[error("invalid pattern period {0}")]
    InvalidPeriod(usize),
    #[error("invalid {kind} profile index {index}")]
    InvalidProfile { kind: &'static str, index: u8 },
    #[error("{kind} profile {index} not found")]
    ProfileNotFound { kind: &'static str, index: u8 },
    #[error("no {0} profiles have been set")]
    NoProfiles(&'static str),
    #[error("no {0} profile selected")]
    NoActiveProfile(&'static str),
    #[error("pattern requires too many periods ({0} > 16)")]
    TooManyPeriods(usize),
    #[error("pulse too long for elastic repeat ({0} > 65535)")]
    ElasticRepeatOverflow(u64),
    #[error("duplicate I2C address 0x{0:02X}")]
    DuplicateI2cAddress(u8),
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
}

pub type Result<T> = std::result::Result<T, TxError>;
