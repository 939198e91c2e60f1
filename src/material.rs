//! Acoustic and thermal material properties.

use serde::{Deserialize, Serialize};

use crate::error::{LifuError, Result};

/// Identifier, display name and units of a material parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub units: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialParam {
    SoundSpeed,
    Density,
    Attenuation,
    SpecificHeat,
    ThermalConductivity,
}

impl MaterialParam {
    pub const ALL: [MaterialParam; 5] = [
        MaterialParam::SoundSpeed,
        MaterialParam::Density,
        MaterialParam::Attenuation,
        MaterialParam::SpecificHeat,
        MaterialParam::ThermalConductivity,
    ];

    pub fn info(self) -> ParamInfo {
        match self {
            MaterialParam::SoundSpeed => ParamInfo {
                id: "sound_speed",
                name: "Speed of Sound",
                units: "m/s",
            },
            MaterialParam::Density => ParamInfo {
                id: "density",
                name: "Density",
                units: "kg/m^3",
            },
            MaterialParam::Attenuation => ParamInfo {
                id: "attenuation",
                name: "Attenuation",
                units: "dB/cm/MHz",
            },
            MaterialParam::SpecificHeat => ParamInfo {
                id: "specific_heat",
                name: "Specific Heat",
                units: "J/kg/K",
            },
            MaterialParam::ThermalConductivity => ParamInfo {
                id: "thermal_conductivity",
                name: "Thermal Conductivity",
                units: "W/m/K",
            },
        }
    }

    pub fn from_id(id: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.info().id == id)
            .ok_or_else(|| LifuError::InvalidConfig(format!("parameter {id} not found")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialReference {
    pub id: String,
    pub name: String,
    /// [m/s]
    pub sound_speed: f64,
    /// [kg/m^3]
    pub density: f64,
    /// [dB/cm/MHz]
    pub attenuation: f64,
    /// [J/kg/K]
    pub specific_heat: f64,
    /// [W/m/K]
    pub thermal_conductivity: f64,
}

impl Default for MaterialReference {
    fn default() -> Self {
        Self {
            id: "material".to_string(),
            name: "Material".to_string(),
            sound_speed: 1500.0,
            density: 1000.0,
            attenuation: 0.0,
            specific_heat: 4182.0,
            thermal_conductivity: 0.598,
        }
    }
}

pub const BUILTIN_MATERIAL_IDS: [&str; 5] = ["water", "tissue", "skull", "air", "standoff"];

impl MaterialReference {
    fn named(
        id: &str,
        sound_speed: f64,
        density: f64,
        attenuation: f64,
        specific_heat: f64,
        thermal_conductivity: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            sound_speed,
            density,
            attenuation,
            specific_heat,
            thermal_conductivity,
        }
    }

    pub fn param(&self, param: MaterialParam) -> f64 {
        match param {
            MaterialParam::SoundSpeed => self.sound_speed,
            MaterialParam::Density => self.density,
            MaterialParam::Attenuation => self.attenuation,
            MaterialParam::SpecificHeat => self.specific_heat,
            MaterialParam::ThermalConductivity => self.thermal_conductivity,
        }
    }

    pub fn get_param(&self, param_id: &str) -> Result<f64> {
        Ok(self.param(MaterialParam::from_id(param_id)?))
    }

    pub fn validate(&self) -> Result<()> {
        for param in MaterialParam::ALL {
            let value = self.param(param);
            if !value.is_finite() || value < 0.0 {
                return Err(LifuError::InvalidConfig(format!(
                    "material {}: {} must be finite and >= 0",
                    self.id,
                    param.info().id
                )));
            }
        }
        if self.sound_speed <= 0.0 || self.density <= 0.0 {
            return Err(LifuError::InvalidConfig(format!(
                "material {}: sound_speed and density must be > 0",
                self.id
            )));
        }
        Ok(())
    }

    /// Look up one of the built-in reference materials.
    pub fn builtin(id: &str) -> Result<Self> {
        let m = match id {
            "water" => Self::named("water", 1500.0, 1000.0, 0.0, 4182.0, 0.598),
            "tissue" => Self::named("tissue", 1540.0, 1000.0, 0.0, 3600.0, 0.5),
            "skull" => Self::named("skull", 4080.0, 1900.0, 0.0, 1100.0, 0.3),
            "air" => Self::named("air", 344.0, 1.25, 0.0, 1012.0, 0.025),
            "standoff" => Self::named("standoff", 1420.0, 1000.0, 1.0, 4182.0, 0.598),
            other => return Err(LifuError::UnknownMaterial(other.to_string())),
        };
        Ok(m)
    }

    /// All built-in materials, in label order.
    pub fn builtins() -> Vec<Self> {
        BUILTIN_MATERIAL_IDS
            .iter()
            .filter_map(|id| Self::builtin(id).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_keep_label_order() {
        let ids: Vec<String> = MaterialReference::builtins()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, BUILTIN_MATERIAL_IDS.to_vec());
    }

    #[test]
    fn skull_properties() {
        let skull = MaterialReference::builtin("skull").unwrap();
        assert_eq!(skull.get_param("sound_speed").unwrap(), 4080.0);
        assert_eq!(skull.param(MaterialParam::Density), 1900.0);
    }

    #[test]
    fn unknown_material_and_param() {
        assert!(matches!(
            MaterialReference::builtin("bone"),
            Err(LifuError::UnknownMaterial(_))
        ));
        let water = MaterialReference::builtin("water").unwrap();
        assert!(water.get_param("viscosity").is_err());
    }

    #[test]
    fn param_info_round_trips_through_id() {
        for p in MaterialParam::ALL {
            assert_eq!(MaterialParam::from_id(p.info().id).unwrap(), p);
        }
        assert_eq!(MaterialParam::Attenuation.info().units, "dB/cm/MHz");
    }

    #[test]
    fn builtins_are_valid() {
        for m in MaterialReference::builtins() {
            m.validate().unwrap();
        }
    }
}
