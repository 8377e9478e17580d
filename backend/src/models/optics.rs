//! Optical elements (filters, slits, ...) and the groups cameras select them from.

use serde::{Deserialize, Serialize};

use super::validation::{FieldErrors, Validate};
use super::{
    default_true, normalize_ids, EntityFields, OpticalElementGroupId, OpticalElementId, Record,
    MAX_TEXT,
};

pub type OpticalElement = Record<OpticalElementId, OpticalElementFields>;
pub type OpticalElementGroup = Record<OpticalElementGroupId, OpticalElementGroupFields>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalElementFields {
    pub name: String,
    /// Globally unique.
    pub code: String,
    #[serde(default = "default_true")]
    pub schedulable: bool,
}

impl Validate for OpticalElementFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        errors.max_length("name", &self.name, MAX_TEXT);
        errors.require("code", &self.code);
        errors.max_length("code", &self.code, MAX_TEXT);
        errors.into_result()
    }
}

impl EntityFields for OpticalElementFields {
    const NAME: &'static str = "optical element";
}

/// A named set of optical elements of one category (e.g. "filters").
///
/// `default` is expected to be one of `optical_elements`. The store does not
/// enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalElementGroupFields {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub default: Option<OpticalElementId>,
    #[serde(default)]
    pub optical_elements: Vec<OpticalElementId>,
    /// Seconds to switch between elements of this group.
    #[serde(default)]
    pub element_change_overhead: f64,
}

impl OpticalElementGroupFields {
    /// Whether the configured default is a member of the group.
    pub fn default_is_member(&self) -> bool {
        match self.default {
            Some(default) => self.optical_elements.contains(&default),
            None => true,
        }
    }
}

impl Validate for OpticalElementGroupFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        errors.max_length("name", &self.name, MAX_TEXT);
        errors.require("type", &self.element_type);
        errors.max_length("type", &self.element_type, MAX_TEXT);
        errors.finite("element_change_overhead", self.element_change_overhead);
        errors.into_result()
    }
}

impl EntityFields for OpticalElementGroupFields {
    const NAME: &'static str = "optical element group";

    fn normalize(&mut self) {
        normalize_ids(&mut self.optical_elements);
    }
}
