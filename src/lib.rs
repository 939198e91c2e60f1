//! LIFU - Low-Intensity Focused Ultrasound planning model
//!
//! Transducer arrays, pulses and sequences, focal patterns, simulation grids
//! and tissue materials, bundled into treatment protocols. Beamforming,
//! acoustic simulation and rendering are left to external tools; this crate
//! describes what they consume.

pub mod error;
pub mod focal;
pub mod geo;
pub mod grid;
pub mod material;
pub mod output;
pub mod protocol;
pub mod pulse;
pub mod segmentation;
pub mod sequence;
pub mod table;
pub mod transducer;
pub mod units;

// Re-export main types
pub use error::{LifuError, Result};
pub use focal::FocalPattern;
pub use geo::Point;
pub use grid::SimulationGrid;
pub use material::{MaterialParam, MaterialReference};
pub use protocol::Protocol;
pub use pulse::Pulse;
pub use segmentation::{ParamMap, ParamSet, SegmentationMethod};
pub use sequence::Sequence;
pub use table::{ParamRow, ParamTable};
pub use transducer::{Element, Transducer};
pub use units::unit_conversion;
