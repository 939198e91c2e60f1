//! Treatment protocol: everything needed to plan one sonication.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LifuError, Result};
use crate::focal::FocalPattern;
use crate::geo::Point;
use crate::grid::SimulationGrid;
use crate::pulse::Pulse;
use crate::segmentation::{ParamSet, SegmentationMethod};
use crate::sequence::Sequence;
use crate::table::ParamTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Protocol {
    pub id: String,
    pub name: String,
    pub description: String,
    pub pulse: Pulse,
    pub sequence: Sequence,
    pub focal_pattern: FocalPattern,
    pub sim_setup: SimulationGrid,
    pub seg_method: SegmentationMethod,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            id: "protocol".to_string(),
            name: "Protocol".to_string(),
            description: String::new(),
            pulse: Pulse::default(),
            sequence: Sequence::default(),
            focal_pattern: FocalPattern::default(),
            sim_setup: SimulationGrid::default(),
            seg_method: SegmentationMethod::default(),
        }
    }
}

impl Protocol {
    /// Load a protocol from `.toml` or `.json` and validate it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let protocol: Protocol = match ext.as_str() {
            "toml" => toml::from_str(&raw)?,
            "json" => Self::from_json(&raw)?,
            other => return Err(LifuError::UnsupportedFormat(other.to_string())),
        };
        protocol.validate()?;
        log::debug!(
            "loaded protocol '{}' from {} ({} foci)",
            protocol.id,
            path.display(),
            protocol.focal_pattern.num_foci()
        );
        Ok(protocol)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self, compact: bool) -> Result<String> {
        let json = if compact {
            serde_json::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        Ok(json)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json(false)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LifuError::InvalidConfig(
                "protocol id must not be empty".to_string(),
            ));
        }
        self.pulse.validate()?;
        self.sequence.validate()?;
        self.focal_pattern.validate()?;
        if self.pulse.duration > self.sequence.pulse_interval {
            return Err(LifuError::InvalidConfig(format!(
                "pulse duration {} s exceeds pulse_interval {} s",
                self.pulse.duration, self.sequence.pulse_interval
            )));
        }
        self.sim_setup.validate()?;
        Ok(())
    }

    /// Foci for `target` under this protocol's focal pattern.
    pub fn targets(&self, target: &Point) -> Result<Vec<Point>> {
        self.focal_pattern.targets(target)
    }

    /// Reference material parameters over the simulation grid.
    pub fn ref_params(&self) -> Result<ParamSet> {
        let [nx, ny, nz] = self.sim_setup.size();
        self.seg_method.ref_params((nx, ny, nz))
    }

    /// Pulse and sequence parameters as one table.
    pub fn table(&self) -> ParamTable {
        let mut table = self.pulse.table();
        table.extend(self.sequence.table());
        table
    }
}
