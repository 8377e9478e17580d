//! Read shapes returned by the API.
//!
//! Every shape carries `__str__`, the entity's display string. Nested shapes
//! are declared one struct per depth and only ever embed children, never a
//! parent, so a view cannot recurse.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::catalog::Catalog;
use crate::models::{
    AutoguiderType, Camera, CameraId, CameraType, Enclosure, GenericMode, GenericModeGroup,
    GenericModeGroupId, Instrument, InstrumentId, InstrumentState, InstrumentType,
    InstrumentTypeId, ModeType, OpticalElement, OpticalElementGroup, OpticalElementGroupId, Site,
    Telescope, TelescopeId,
};

/// An entity serialized flat, plus its display string.
#[derive(Debug, Clone, Serialize)]
pub struct Described<T> {
    #[serde(flatten)]
    pub inner: T,
    #[serde(rename = "__str__")]
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteNested {
    #[serde(flatten)]
    pub site: Site,
    pub enclosure_set: Vec<EnclosureNested>,
    #[serde(rename = "__str__")]
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnclosureNested {
    #[serde(flatten)]
    pub enclosure: Enclosure,
    pub telescope_set: Vec<TelescopeNested>,
    #[serde(rename = "__str__")]
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TelescopeNested {
    #[serde(flatten)]
    pub telescope: Telescope,
    pub instrument_set: Vec<InstrumentNested>,
    #[serde(rename = "__str__")]
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentNested {
    pub id: InstrumentId,
    pub modified: DateTime<Utc>,
    pub code: String,
    pub state: InstrumentState,
    pub telescope: TelescopeId,
    pub instrument_type: Option<InstrumentTypeNested>,
    pub science_cameras: Vec<CameraNested>,
    pub autoguider_camera: Option<CameraNested>,
    pub autoguider_type: AutoguiderType,
    #[serde(rename = "__str__")]
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraNested {
    pub id: CameraId,
    pub modified: DateTime<Utc>,
    pub code: String,
    pub host: String,
    pub camera_type: Option<Described<CameraType>>,
    pub optical_element_groups: Vec<OpticalElementGroupNested>,
    /// Group type to comma-joined member codes.
    pub optical_elements: BTreeMap<String, String>,
    #[serde(rename = "__str__")]
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpticalElementGroupNested {
    pub id: OpticalElementGroupId,
    pub modified: DateTime<Utc>,
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: String,
    pub element_change_overhead: f64,
    pub optical_elements: Vec<Described<OpticalElement>>,
    pub default: Option<Described<OpticalElement>>,
    #[serde(rename = "__str__")]
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentTypeNested {
    #[serde(flatten)]
    pub instrument_type: InstrumentType,
    pub mode_types: Vec<GenericModeGroupNested>,
    #[serde(rename = "__str__")]
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenericModeGroupNested {
    pub id: GenericModeGroupId,
    pub modified: DateTime<Utc>,
    pub instrument_type: Option<InstrumentTypeId>,
    #[serde(rename = "type")]
    pub mode_type: Option<String>,
    pub modes: Vec<Described<GenericMode>>,
    pub default: Option<Described<GenericMode>>,
    #[serde(rename = "__str__")]
    pub display: String,
}

// Display strings. A parent missing from the snapshot falls back to its id.
impl Catalog {
    pub fn site_label(&self, site: &Site) -> String {
        site.code.clone()
    }

    pub fn enclosure_label(&self, enclosure: &Enclosure) -> String {
        let site = match self.sites.get(&enclosure.site) {
            Some(site) => self.site_label(site),
            None => enclosure.site.to_string(),
        };
        format!("{}.{}", site, enclosure.code)
    }

    pub fn telescope_label(&self, telescope: &Telescope) -> String {
        let enclosure = match self.enclosures.get(&telescope.enclosure) {
            Some(enclosure) => self.enclosure_label(enclosure),
            None => telescope.enclosure.to_string(),
        };
        format!("{}.{}", enclosure, telescope.code)
    }

    pub fn instrument_label(&self, instrument: &Instrument) -> String {
        let telescope = match self.telescopes.get(&instrument.telescope) {
            Some(telescope) => self.telescope_label(telescope),
            None => instrument.telescope.to_string(),
        };
        format!("{}.{}", telescope, instrument.code)
    }

    /// Member codes of a group, comma-joined in ascending id order.
    pub fn element_codes(&self, group: &OpticalElementGroup) -> String {
        self.optical_elements
            .resolve(&group.optical_elements)
            .map(|element| element.code.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn element_group_label(&self, group: &OpticalElementGroup) -> String {
        format!(
            "{} - {}: {}",
            group.name,
            group.element_type,
            self.element_codes(group)
        )
    }

    pub fn generic_mode_label(&self, mode: &GenericMode) -> String {
        format!("{}: {}", mode.code, mode.name)
    }

    pub fn mode_group_label(&self, group: &GenericModeGroup) -> String {
        self.generic_modes
            .resolve(&group.modes)
            .map(|mode| mode.code.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Derived `optical_elements` of a camera: group type to member codes.
    pub fn camera_elements(&self, camera: &Camera) -> BTreeMap<String, String> {
        self.optical_element_groups
            .resolve(&camera.optical_element_groups)
            .map(|group| (group.element_type.clone(), self.element_codes(group)))
            .collect()
    }
}

// Flat views.
impl Catalog {
    pub fn camera_type_view(&self, camera_type: &CameraType) -> Described<CameraType> {
        Described {
            display: camera_type.code.clone(),
            inner: camera_type.clone(),
        }
    }

    pub fn optical_element_view(&self, element: &OpticalElement) -> Described<OpticalElement> {
        Described {
            display: element.code.clone(),
            inner: element.clone(),
        }
    }

    pub fn mode_type_view(&self, mode_type: &ModeType) -> Described<ModeType> {
        Described {
            display: mode_type.fields.id.clone(),
            inner: mode_type.clone(),
        }
    }

    pub fn generic_mode_view(&self, mode: &GenericMode) -> Described<GenericMode> {
        Described {
            display: self.generic_mode_label(mode),
            inner: mode.clone(),
        }
    }
}

// Nested views.
impl Catalog {
    pub fn site_view(&self, site: &Site) -> SiteNested {
        SiteNested {
            enclosure_set: self
                .enclosures
                .iter()
                .filter(|enclosure| enclosure.site == site.id)
                .map(|enclosure| self.enclosure_view(enclosure))
                .collect(),
            display: self.site_label(site),
            site: site.clone(),
        }
    }

    pub fn enclosure_view(&self, enclosure: &Enclosure) -> EnclosureNested {
        EnclosureNested {
            telescope_set: self
                .telescopes
                .iter()
                .filter(|telescope| telescope.enclosure == enclosure.id)
                .map(|telescope| self.telescope_view(telescope))
                .collect(),
            display: self.enclosure_label(enclosure),
            enclosure: enclosure.clone(),
        }
    }

    pub fn telescope_view(&self, telescope: &Telescope) -> TelescopeNested {
        TelescopeNested {
            instrument_set: self
                .instruments
                .iter()
                .filter(|instrument| instrument.telescope == telescope.id)
                .map(|instrument| self.instrument_view(instrument))
                .collect(),
            display: self.telescope_label(telescope),
            telescope: telescope.clone(),
        }
    }

    pub fn instrument_view(&self, instrument: &Instrument) -> InstrumentNested {
        InstrumentNested {
            id: instrument.id,
            modified: instrument.modified,
            code: instrument.code.clone(),
            state: instrument.state,
            telescope: instrument.telescope,
            instrument_type: instrument
                .instrument_type
                .as_ref()
                .and_then(|id| self.instrument_types.get(id))
                .map(|instrument_type| self.instrument_type_view(instrument_type)),
            science_cameras: self
                .cameras
                .resolve(&instrument.science_cameras)
                .map(|camera| self.camera_view(camera))
                .collect(),
            autoguider_camera: self
                .cameras
                .get(&instrument.autoguider_camera)
                .map(|camera| self.camera_view(camera)),
            autoguider_type: instrument.autoguider_type,
            display: self.instrument_label(instrument),
        }
    }

    pub fn camera_view(&self, camera: &Camera) -> CameraNested {
        CameraNested {
            id: camera.id,
            modified: camera.modified,
            code: camera.code.clone(),
            host: camera.host.clone(),
            camera_type: self
                .camera_types
                .get(&camera.camera_type)
                .map(|camera_type| self.camera_type_view(camera_type)),
            optical_element_groups: self
                .optical_element_groups
                .resolve(&camera.optical_element_groups)
                .map(|group| self.element_group_view(group))
                .collect(),
            optical_elements: self.camera_elements(camera),
            display: camera.code.clone(),
        }
    }

    pub fn element_group_view(&self, group: &OpticalElementGroup) -> OpticalElementGroupNested {
        OpticalElementGroupNested {
            id: group.id,
            modified: group.modified,
            name: group.name.clone(),
            element_type: group.element_type.clone(),
            element_change_overhead: group.element_change_overhead,
            optical_elements: self
                .optical_elements
                .resolve(&group.optical_elements)
                .map(|element| self.optical_element_view(element))
                .collect(),
            default: group
                .default
                .as_ref()
                .and_then(|id| self.optical_elements.get(id))
                .map(|element| self.optical_element_view(element)),
            display: self.element_group_label(group),
        }
    }

    pub fn instrument_type_view(&self, instrument_type: &InstrumentType) -> InstrumentTypeNested {
        InstrumentTypeNested {
            mode_types: self
                .generic_mode_groups
                .iter()
                .filter(|group| group.instrument_type == Some(instrument_type.id))
                .map(|group| self.mode_group_view(group))
                .collect(),
            display: instrument_type.code.clone(),
            instrument_type: instrument_type.clone(),
        }
    }

    pub fn mode_group_view(&self, group: &GenericModeGroup) -> GenericModeGroupNested {
        GenericModeGroupNested {
            id: group.id,
            modified: group.modified,
            instrument_type: group.instrument_type,
            mode_type: group.mode_type.clone(),
            modes: self
                .generic_modes
                .resolve(&group.modes)
                .map(|mode| self.generic_mode_view(mode))
                .collect(),
            default: group
                .default
                .as_ref()
                .and_then(|id| self.generic_modes.get(id))
                .map(|mode| self.generic_mode_view(mode)),
            display: self.mode_group_label(group),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::catalog::Rows;
    use crate::models::*;
    use chrono::NaiveTime;
    use serde_json::json;

    fn catalog() -> Catalog {
        let now = Utc::now();
        let mut catalog = Catalog::default();
        catalog.sites = Rows::new(vec![Site::assemble(
            SiteId::new(1),
            now,
            SiteFields {
                active: true,
                code: "tst".into(),
                name: "Test Site".into(),
                lat: 0.0,
                long: 0.0,
                elevation: 2000,
                timezone: -7,
                tz: "Etc/UTC".into(),
                restart: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            },
        )]);
        catalog.enclosures = Rows::new(vec![Enclosure::assemble(
            EnclosureId::new(1),
            now,
            EnclosureFields {
                active: true,
                code: "dome1".into(),
                name: String::new(),
                site: SiteId::new(1),
            },
        )]);
        catalog.optical_elements = Rows::new(vec![
            OpticalElement::assemble(
                OpticalElementId::new(1),
                now,
                OpticalElementFields {
                    name: "V".into(),
                    code: "v".into(),
                    schedulable: true,
                },
            ),
            OpticalElement::assemble(
                OpticalElementId::new(2),
                now,
                OpticalElementFields {
                    name: "B".into(),
                    code: "b".into(),
                    schedulable: true,
                },
            ),
        ]);
        catalog.optical_element_groups = Rows::new(vec![OpticalElementGroup::assemble(
            OpticalElementGroupId::new(1),
            now,
            OpticalElementGroupFields {
                name: "wheel".into(),
                element_type: "filters".into(),
                default: Some(OpticalElementId::new(2)),
                optical_elements: vec![OpticalElementId::new(1), OpticalElementId::new(2)],
                element_change_overhead: 2.0,
            },
        )]);
        catalog.camera_types = Rows::new(vec![CameraType::assemble(
            CameraTypeId::new(1),
            now,
            CameraTypeFields {
                name: "Sinistro".into(),
                code: "1m0-SciCam-Sinistro".into(),
                size: "26x26".into(),
                pscale: 0.389,
                pixels_x: 4096,
                pixels_y: 4096,
                max_rois: 1,
            },
        )]);
        catalog.cameras = Rows::new(vec![Camera::assemble(
            CameraId::new(1),
            now,
            CameraFields {
                camera_type: CameraTypeId::new(1),
                code: "fa01".into(),
                optical_element_groups: vec![OpticalElementGroupId::new(1)],
                host: String::new(),
            },
        )]);
        catalog
    }

    #[test]
    fn test_enclosure_label_includes_site() {
        let catalog = catalog();
        let enclosure = catalog.enclosures.get(&EnclosureId::new(1)).unwrap();
        assert_eq!(catalog.enclosure_label(enclosure), "tst.dome1");
    }

    #[test]
    fn test_group_label_lists_member_codes() {
        let catalog = catalog();
        let group = catalog
            .optical_element_groups
            .get(&OpticalElementGroupId::new(1))
            .unwrap();
        assert_eq!(catalog.element_group_label(group), "wheel - filters: v,b");
    }

    #[test]
    fn test_camera_view_derives_optical_elements() {
        let catalog = catalog();
        let camera = catalog.cameras.get(&CameraId::new(1)).unwrap();
        let value = serde_json::to_value(catalog.camera_view(camera)).unwrap();

        assert_eq!(value["optical_elements"], json!({"filters": "v,b"}));
        assert_eq!(value["camera_type"]["__str__"], "1m0-SciCam-Sinistro");
        assert_eq!(value["optical_element_groups"][0]["default"]["code"], "b");
        assert_eq!(value["__str__"], "fa01");
    }

    #[test]
    fn test_site_view_nests_enclosures() {
        let catalog = catalog();
        let site = catalog.sites.get(&SiteId::new(1)).unwrap();
        let value = serde_json::to_value(catalog.site_view(site)).unwrap();

        assert_eq!(value["code"], "tst");
        assert_eq!(value["restart"], "00:00:00");
        assert_eq!(value["enclosure_set"][0]["__str__"], "tst.dome1");
        assert_eq!(value["enclosure_set"][0]["telescope_set"], json!([]));
    }

    #[test]
    fn test_mode_group_label_joins_codes() {
        let now = Utc::now();
        let mut catalog = Catalog::default();
        catalog.generic_modes = Rows::new(vec![
            GenericMode::assemble(
                GenericModeId::new(1),
                now,
                GenericModeFields {
                    name: "Fast".into(),
                    code: "fast".into(),
                    overhead: 1.0,
                    validation_schema: json!({}),
                },
            ),
            GenericMode::assemble(
                GenericModeId::new(2),
                now,
                GenericModeFields {
                    name: "Slow".into(),
                    code: "slow".into(),
                    overhead: 3.0,
                    validation_schema: json!({}),
                },
            ),
        ]);
        let group = GenericModeGroup::assemble(
            GenericModeGroupId::new(1),
            now,
            GenericModeGroupFields {
                instrument_type: None,
                mode_type: Some("readout".into()),
                default: Some(GenericModeId::new(1)),
                modes: vec![GenericModeId::new(1), GenericModeId::new(2)],
            },
        );

        let view = catalog.mode_group_view(&group);
        assert_eq!(view.display, "fast,slow");
        assert_eq!(view.default.unwrap().display, "fast: Fast");
    }
}
