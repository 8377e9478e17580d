//! REST resources: one per hardware collection.
//!
//! A [`Resource`] ties an entity to its URL collection, its read shape and
//! the query parameters it can be filtered by.

use serde::Serialize;
use serde_json::Value;

use super::catalog::Catalog;
use super::views::{
    CameraNested, Described, EnclosureNested, GenericModeGroupNested, InstrumentNested,
    InstrumentTypeNested, OpticalElementGroupNested, SiteNested, TelescopeNested,
};
use crate::db::repository::Stored;
use crate::models::{
    Camera, CameraType, Enclosure, GenericMode, GenericModeGroup, Instrument, InstrumentState,
    InstrumentType, ModeType, OpticalElement, OpticalElementGroup, Site, Telescope,
};

/// An entity exposed as a REST collection.
pub trait Resource: Stored {
    /// Read shape.
    type View: Serialize + Send + 'static;

    /// Path segment under `/v1/`.
    const COLLECTION: &'static str;

    /// Query parameters matched exactly against the entity's fields.
    const FILTERS: &'static [&'static str];

    /// Whether rendering reads other tables.
    const NESTED: bool;

    fn render(catalog: &Catalog, entity: &Self) -> Self::View;

    /// Bring a query value into the form the field serializes as.
    fn filter_value(_field: &str, raw: &str) -> String {
        raw.to_string()
    }

    /// Whether `entity` matches every recognised filter. Unknown parameters
    /// are ignored.
    fn matches(entity: &Self, params: &[(String, String)]) -> bool {
        let active: Vec<&(String, String)> = params
            .iter()
            .filter(|(key, _)| Self::FILTERS.contains(&key.as_str()))
            .collect();
        if active.is_empty() {
            return true;
        }
        let Ok(value) = serde_json::to_value(entity) else {
            return false;
        };
        active.iter().all(|(key, raw)| {
            let expected = Self::filter_value(key, raw);
            value
                .get(key.as_str())
                .is_some_and(|field| field_matches(field, &expected))
        })
    }
}

fn field_matches(field: &Value, raw: &str) -> bool {
    match field {
        Value::String(s) => s == raw,
        Value::Bool(b) => parse_bool(raw) == Some(*b),
        Value::Number(n) => {
            n.to_string() == raw
                || matches!((n.as_f64(), raw.parse::<f64>()), (Some(a), Ok(b)) if a == b)
        }
        Value::Null => raw.is_empty() || raw.eq_ignore_ascii_case("null"),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

impl Resource for Site {
    type View = SiteNested;
    const COLLECTION: &'static str = "sites";
    const FILTERS: &'static [&'static str] = &["active", "code", "name"];
    const NESTED: bool = true;

    fn render(catalog: &Catalog, entity: &Self) -> SiteNested {
        catalog.site_view(entity)
    }
}

impl Resource for Enclosure {
    type View = EnclosureNested;
    const COLLECTION: &'static str = "enclosures";
    const FILTERS: &'static [&'static str] = &["active", "code", "site"];
    const NESTED: bool = true;

    fn render(catalog: &Catalog, entity: &Self) -> EnclosureNested {
        catalog.enclosure_view(entity)
    }
}

impl Resource for Telescope {
    type View = TelescopeNested;
    const COLLECTION: &'static str = "telescopes";
    const FILTERS: &'static [&'static str] = &["active", "code", "enclosure"];
    const NESTED: bool = true;

    fn render(catalog: &Catalog, entity: &Self) -> TelescopeNested {
        catalog.telescope_view(entity)
    }
}

impl Resource for Instrument {
    type View = InstrumentNested;
    const COLLECTION: &'static str = "instruments";
    const FILTERS: &'static [&'static str] = &[
        "autoguider_type",
        "code",
        "instrument_type",
        "state",
        "telescope",
    ];
    const NESTED: bool = true;

    fn render(catalog: &Catalog, entity: &Self) -> InstrumentNested {
        catalog.instrument_view(entity)
    }

    /// `state` may be queried by code or label but serializes as the label.
    fn filter_value(field: &str, raw: &str) -> String {
        match field {
            "state" => raw
                .parse::<InstrumentState>()
                .map(|state| state.label().to_string())
                .unwrap_or_else(|_| raw.to_string()),
            _ => raw.to_string(),
        }
    }
}

impl Resource for Camera {
    type View = CameraNested;
    const COLLECTION: &'static str = "cameras";
    const FILTERS: &'static [&'static str] = &["camera_type", "code", "host"];
    const NESTED: bool = true;

    fn render(catalog: &Catalog, entity: &Self) -> CameraNested {
        catalog.camera_view(entity)
    }
}

impl Resource for CameraType {
    type View = Described<CameraType>;
    const COLLECTION: &'static str = "cameratypes";
    const FILTERS: &'static [&'static str] = &["code", "name"];
    const NESTED: bool = false;

    fn render(catalog: &Catalog, entity: &Self) -> Described<CameraType> {
        catalog.camera_type_view(entity)
    }
}

impl Resource for OpticalElement {
    type View = Described<OpticalElement>;
    const COLLECTION: &'static str = "opticalelements";
    const FILTERS: &'static [&'static str] = &["code", "name", "schedulable"];
    const NESTED: bool = false;

    fn render(catalog: &Catalog, entity: &Self) -> Described<OpticalElement> {
        catalog.optical_element_view(entity)
    }
}

impl Resource for OpticalElementGroup {
    type View = OpticalElementGroupNested;
    const COLLECTION: &'static str = "opticalelementgroups";
    const FILTERS: &'static [&'static str] = &["name", "type"];
    const NESTED: bool = true;

    fn render(catalog: &Catalog, entity: &Self) -> OpticalElementGroupNested {
        catalog.element_group_view(entity)
    }
}

impl Resource for InstrumentType {
    type View = InstrumentTypeNested;
    const COLLECTION: &'static str = "instrumenttypes";
    const FILTERS: &'static [&'static str] = &["code", "name"];
    const NESTED: bool = true;

    fn render(catalog: &Catalog, entity: &Self) -> InstrumentTypeNested {
        catalog.instrument_type_view(entity)
    }
}

impl Resource for ModeType {
    type View = Described<ModeType>;
    const COLLECTION: &'static str = "modetypes";
    const FILTERS: &'static [&'static str] = &["id"];
    const NESTED: bool = false;

    fn render(catalog: &Catalog, entity: &Self) -> Described<ModeType> {
        catalog.mode_type_view(entity)
    }
}

impl Resource for GenericMode {
    type View = Described<GenericMode>;
    const COLLECTION: &'static str = "genericmodes";
    const FILTERS: &'static [&'static str] = &["code", "name"];
    const NESTED: bool = false;

    fn render(catalog: &Catalog, entity: &Self) -> Described<GenericMode> {
        catalog.generic_mode_view(entity)
    }
}

impl Resource for GenericModeGroup {
    type View = GenericModeGroupNested;
    const COLLECTION: &'static str = "genericmodegroups";
    const FILTERS: &'static [&'static str] = &["instrument_type", "type"];
    const NESTED: bool = true;

    fn render(catalog: &Catalog, entity: &Self) -> GenericModeGroupNested {
        catalog.mode_group_view(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::Utc;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn instrument(state: InstrumentState) -> Instrument {
        Instrument::assemble(
            InstrumentId::new(1),
            Utc::now(),
            InstrumentFields {
                instrument_type: None,
                code: "kb01".into(),
                state,
                telescope: TelescopeId::new(3),
                science_cameras: vec![],
                autoguider_camera: CameraId::new(1),
                autoguider_type: AutoguiderType::OffAxis,
            },
        )
    }

    #[test]
    fn test_state_filter_accepts_code_or_label() {
        let kb01 = instrument(InstrumentState::Schedulable);
        assert!(Instrument::matches(&kb01, &params(&[("state", "30")])));
        assert!(Instrument::matches(&kb01, &params(&[("state", "SCHEDULABLE")])));
        assert!(!Instrument::matches(&kb01, &params(&[("state", "0")])));
    }

    #[test]
    fn test_foreign_key_and_null_filters() {
        let kb01 = instrument(InstrumentState::Disabled);
        assert!(Instrument::matches(&kb01, &params(&[("telescope", "3"), ("code", "kb01")])));
        assert!(!Instrument::matches(&kb01, &params(&[("telescope", "4")])));
        assert!(Instrument::matches(&kb01, &params(&[("instrument_type", "")])));
    }

    #[test]
    fn test_unknown_parameters_are_ignored() {
        let kb01 = instrument(InstrumentState::Disabled);
        assert!(Instrument::matches(&kb01, &params(&[("colour", "red"), ("limit", "1")])));
    }

    #[test]
    fn test_boolean_filter() {
        let element = OpticalElement::assemble(
            OpticalElementId::new(1),
            Utc::now(),
            OpticalElementFields {
                name: "V".into(),
                code: "v".into(),
                schedulable: false,
            },
        );
        assert!(OpticalElement::matches(&element, &params(&[("schedulable", "False")])));
        assert!(!OpticalElement::matches(&element, &params(&[("schedulable", "true")])));
    }
}
