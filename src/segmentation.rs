//! Segmentation: label volumes and the material parameter maps built from them.
//!
//! A segmentation method owns a material table; label `i` in a volume refers
//! to `materials[i]`. Uniform methods fill the whole volume with the
//! reference material.

use std::collections::BTreeMap;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::{LifuError, Result};
use crate::material::{MaterialParam, MaterialReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentationKind {
    /// Every voxel is the reference material
    Uniform,
    /// Labels derived from an MR volume
    SegmentMri,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SegmentationRepr", into = "TaggedSegmentation")]
pub struct SegmentationMethod {
    kind: SegmentationKind,
    materials: Vec<MaterialReference>,
    ref_material: String,
}

/// A single material parameter sampled over a volume
#[derive(Debug, Clone, PartialEq)]
pub struct ParamMap {
    pub param: MaterialParam,
    pub long_name: &'static str,
    pub units: &'static str,
    /// Value of the parameter in the reference material
    pub ref_value: f64,
    pub data: Array3<f64>,
}

/// Parameter maps for every material parameter over one volume
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    pub ref_material: MaterialReference,
    pub params: BTreeMap<MaterialParam, ParamMap>,
}

impl ParamSet {
    pub fn get(&self, param: MaterialParam) -> Option<&ParamMap> {
        self.params.get(&param)
    }

    pub fn ref_value(&self, param: MaterialParam) -> f64 {
        self.ref_material.param(param)
    }
}

impl Default for SegmentationMethod {
    fn default() -> Self {
        Self::uniform_water()
    }
}

impl SegmentationMethod {
    pub fn new(
        kind: SegmentationKind,
        materials: Vec<MaterialReference>,
        ref_material: &str,
    ) -> Result<Self> {
        if !materials.iter().any(|m| m.id == ref_material) {
            return Err(LifuError::UnknownMaterial(format!(
                "reference material {ref_material} not found"
            )));
        }
        for m in &materials {
            m.validate()?;
        }
        let mut seen = std::collections::BTreeSet::new();
        if let Some(dup) = materials.iter().find(|m| !seen.insert(m.id.as_str())) {
            return Err(LifuError::InvalidConfig(format!(
                "duplicate material id {}",
                dup.id
            )));
        }
        Ok(Self {
            kind,
            materials,
            ref_material: ref_material.to_string(),
        })
    }

    fn builtin_uniform(ref_material: &str) -> Self {
        Self {
            kind: SegmentationKind::Uniform,
            materials: MaterialReference::builtins(),
            ref_material: ref_material.to_string(),
        }
    }

    pub fn uniform_water() -> Self {
        Self::builtin_uniform("water")
    }

    pub fn uniform_tissue() -> Self {
        Self::builtin_uniform("tissue")
    }

    pub fn segment_mri() -> Self {
        Self {
            kind: SegmentationKind::SegmentMri,
            ..Self::uniform_water()
        }
    }

    pub fn kind(&self) -> SegmentationKind {
        self.kind
    }

    pub fn materials(&self) -> &[MaterialReference] {
        &self.materials
    }

    pub fn ref_material_id(&self) -> &str {
        &self.ref_material
    }

    pub fn material_index(&self, id: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.id == id)
    }

    pub fn ref_material(&self) -> &MaterialReference {
        // ref_material membership is checked on construction
        let idx = self.material_index(&self.ref_material).unwrap_or(0);
        &self.materials[idx]
    }

    /// Label volume of the given shape filled with the reference material.
    pub fn ref_segment(&self, shape: (usize, usize, usize)) -> Array3<usize> {
        let idx = self.material_index(&self.ref_material).unwrap_or(0);
        Array3::from_elem(shape, idx)
    }

    /// Label an image volume.
    pub fn segment(&self, volume: &Array3<f64>) -> Result<Array3<usize>> {
        match self.kind {
            SegmentationKind::Uniform => Ok(self.ref_segment(volume.dim())),
            SegmentationKind::SegmentMri => Err(LifuError::Unsupported("MRI segmentation")),
        }
    }

    /// Map a label volume onto per-parameter value volumes.
    pub fn map_params(&self, labels: &Array3<usize>) -> Result<ParamSet> {
        let n = self.materials.len();
        if let Some(bad) = labels.iter().find(|&&l| l >= n) {
            return Err(LifuError::InvalidConfig(format!(
                "label {bad} has no material ({n} materials defined)"
            )));
        }

        let ref_mat = self.ref_material().clone();
        let params = MaterialParam::ALL
            .into_iter()
            .map(|param| {
                let info = param.info();
                let lut: Vec<f64> = self.materials.iter().map(|m| m.param(param)).collect();
                let map = ParamMap {
                    param,
                    long_name: info.name,
                    units: info.units,
                    ref_value: ref_mat.param(param),
                    data: labels.mapv(|l| lut[l]),
                };
                (param, map)
            })
            .collect();

        Ok(ParamSet {
            ref_material: ref_mat,
            params,
        })
    }

    pub fn seg_params(&self, volume: &Array3<f64>) -> Result<ParamSet> {
        let labels = self.segment(volume)?;
        self.map_params(&labels)
    }

    pub fn ref_params(&self, shape: (usize, usize, usize)) -> Result<ParamSet> {
        self.map_params(&self.ref_segment(shape))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentationRepr {
    Name(String),
    Tagged(TaggedSegmentation),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "class")]
enum TaggedSegmentation {
    UniformWater {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        materials: Option<Vec<MaterialReference>>,
    },
    UniformTissue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        materials: Option<Vec<MaterialReference>>,
    },
    UniformSegmentation {
        ref_material: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        materials: Option<Vec<MaterialReference>>,
    },
    #[serde(rename = "SegmentMRI")]
    SegmentMri {
        #[serde(default)]
        ref_material: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        materials: Option<Vec<MaterialReference>>,
    },
}

impl TryFrom<SegmentationRepr> for SegmentationMethod {
    type Error = LifuError;

    fn try_from(repr: SegmentationRepr) -> Result<Self> {
        let builtins = MaterialReference::builtins;
        match repr {
            SegmentationRepr::Name(name) => match name.as_str() {
                "water" => Ok(Self::uniform_water()),
                "tissue" => Ok(Self::uniform_tissue()),
                "segmented" => Ok(Self::segment_mri()),
                other => Err(LifuError::InvalidConfig(format!(
                    "unknown segmentation method '{other}'"
                ))),
            },
            SegmentationRepr::Tagged(tagged) => match tagged {
                TaggedSegmentation::UniformWater { materials } => Self::new(
                    SegmentationKind::Uniform,
                    materials.unwrap_or_else(builtins),
                    "water",
                ),
                TaggedSegmentation::UniformTissue { materials } => Self::new(
                    SegmentationKind::Uniform,
                    materials.unwrap_or_else(builtins),
                    "tissue",
                ),
                TaggedSegmentation::UniformSegmentation {
                    ref_material,
                    materials,
                } => Self::new(
                    SegmentationKind::Uniform,
                    materials.unwrap_or_else(builtins),
                    &ref_material,
                ),
                TaggedSegmentation::SegmentMri {
                    ref_material,
                    materials,
                } => Self::new(
                    SegmentationKind::SegmentMri,
                    materials.unwrap_or_else(builtins),
                    ref_material.as_deref().unwrap_or("water"),
                ),
            },
        }
    }
}

impl From<SegmentationMethod> for TaggedSegmentation {
    fn from(method: SegmentationMethod) -> Self {
        let materials = Some(method.materials);
        match method.kind {
            SegmentationKind::Uniform => TaggedSegmentation::UniformSegmentation {
                ref_material: method.ref_material,
                materials,
            },
            SegmentationKind::SegmentMri => TaggedSegmentation::SegmentMri {
                ref_material: Some(method.ref_material),
                materials,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_water_ref_params() {
        let seg = SegmentationMethod::uniform_water();
        let params = seg.ref_params((3, 4, 5)).unwrap();
        let c = params.get(MaterialParam::SoundSpeed).unwrap();
        assert_eq!(c.data.dim(), (3, 4, 5));
        assert!(c.data.iter().all(|&v| v == 1500.0));
        assert_eq!(c.ref_value, 1500.0);
        assert_eq!(c.units, "m/s");
        assert_eq!(params.params.len(), MaterialParam::ALL.len());
    }

    #[test]
    fn map_params_uses_label_order() {
        let seg = SegmentationMethod::uniform_water();
        let mut labels = seg.ref_segment((2, 1, 1));
        labels[[1, 0, 0]] = seg.material_index("skull").unwrap();
        let params = seg.map_params(&labels).unwrap();
        let rho = &params.get(MaterialParam::Density).unwrap().data;
        assert_eq!(rho[[0, 0, 0]], 1000.0);
        assert_eq!(rho[[1, 0, 0]], 1900.0);
        assert_eq!(params.ref_value(MaterialParam::Density), 1000.0);
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let seg = SegmentationMethod::uniform_tissue();
        let labels = Array3::from_elem((1, 1, 1), 99);
        assert!(seg.map_params(&labels).is_err());
    }

    #[test]
    fn uniform_segment_ignores_voxels() {
        let seg = SegmentationMethod::uniform_tissue();
        let volume = Array3::from_elem((2, 2, 2), 42.0);
        let params = seg.seg_params(&volume).unwrap();
        let c = &params.get(MaterialParam::SoundSpeed).unwrap().data;
        assert!(c.iter().all(|&v| v == 1540.0));
    }

    #[test]
    fn mri_segmentation_is_unsupported() {
        let seg = SegmentationMethod::segment_mri();
        let volume = Array3::zeros((1, 1, 1));
        assert!(matches!(
            seg.segment(&volume),
            Err(LifuError::Unsupported(_))
        ));
        assert!(seg.ref_params((1, 1, 1)).is_ok());
    }

    #[test]
    fn deserializes_shorthand_and_tagged_forms() {
        let water: SegmentationMethod = serde_json::from_str(r#""water""#).unwrap();
        assert_eq!(water, SegmentationMethod::uniform_water());

        let mri: SegmentationMethod = serde_json::from_str(r#""segmented""#).unwrap();
        assert_eq!(mri.kind(), SegmentationKind::SegmentMri);

        let skull: SegmentationMethod = serde_json::from_str(
            r#"{"class": "UniformSegmentation", "ref_material": "skull"}"#,
        )
        .unwrap();
        assert_eq!(skull.ref_material().sound_speed, 4080.0);

        let tissue: SegmentationMethod =
            serde_json::from_str(r#"{"class": "UniformTissue"}"#).unwrap();
        assert_eq!(tissue.ref_material_id(), "tissue");
    }

    #[test]
    fn missing_reference_material_is_rejected() {
        let raw = r#"{"class": "UniformSegmentation", "ref_material": "bone"}"#;
        assert!(serde_json::from_str::<SegmentationMethod>(raw).is_err());
        assert!(serde_json::from_str::<SegmentationMethod>(r#""plasma""#).is_err());
    }

    #[test]
    fn serialized_form_round_trips() {
        let seg = SegmentationMethod::uniform_tissue();
        let json = serde_json::to_string(&seg).unwrap();
        let back: SegmentationMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seg);
    }
}
