//! Camera types and physical cameras.

use serde::{Deserialize, Serialize};

use super::validation::{FieldErrors, Validate};
use super::{
    normalize_ids, CameraId, CameraTypeId, EntityFields, OpticalElementGroupId, Record, MAX_TEXT,
};

pub type CameraType = Record<CameraTypeId, CameraTypeFields>;
pub type Camera = Record<CameraId, CameraFields>;

/// A model of camera: sensor geometry and region-of-interest support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraTypeFields {
    /// Globally unique.
    pub name: String,
    pub code: String,
    /// Free-form field-of-view descriptor, e.g. `"26x26"`.
    pub size: String,
    /// Arcseconds per pixel.
    pub pscale: f64,
    #[serde(default)]
    pub pixels_x: i32,
    #[serde(default)]
    pub pixels_y: i32,
    #[serde(default)]
    pub max_rois: i32,
}

impl Validate for CameraTypeFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        errors.max_length("name", &self.name, MAX_TEXT);
        errors.require("code", &self.code);
        errors.max_length("code", &self.code, MAX_TEXT);
        errors.require("size", &self.size);
        errors.max_length("size", &self.size, MAX_TEXT);
        errors.finite("pscale", self.pscale);
        errors.into_result()
    }
}

impl EntityFields for CameraTypeFields {
    const NAME: &'static str = "camera type";
}

/// A physical camera attached to a host machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFields {
    pub camera_type: CameraTypeId,
    pub code: String,
    #[serde(default)]
    pub optical_element_groups: Vec<OpticalElementGroupId>,
    /// Hostname of the machine the camera is connected to.
    #[serde(default)]
    pub host: String,
}

impl Validate for CameraFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("code", &self.code);
        errors.max_length("code", &self.code, MAX_TEXT);
        errors.max_length("host", &self.host, MAX_TEXT);
        errors.into_result()
    }
}

impl EntityFields for CameraFields {
    const NAME: &'static str = "camera";

    fn normalize(&mut self) {
        normalize_ids(&mut self.optical_element_groups);
    }
}
