//! Instruments, instrument types, and the generic modes they can run in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::validation::{FieldErrors, Validate};
use super::{
    default_true, normalize_ids, CameraId, Entity, EntityFields, GenericModeGroupId,
    GenericModeId, InstrumentId, InstrumentTypeId, Record, TelescopeId, MAX_TEXT,
};

pub type InstrumentType = Record<InstrumentTypeId, InstrumentTypeFields>;
pub type GenericMode = Record<GenericModeId, GenericModeFields>;
pub type GenericModeGroup = Record<GenericModeGroupId, GenericModeGroupFields>;
pub type Instrument = Record<InstrumentId, InstrumentFields>;

/// Operational state of an instrument, set directly by operators.
///
/// Written as either the integer code or the label; always read back as
/// the label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "StateValue", into = "String")]
pub enum InstrumentState {
    /// Known to the database but not physically deployed.
    #[default]
    Disabled,
    /// Plugged in but not ready for science.
    Manual,
    /// Being commissioned; not exposed to the network.
    Commissioning,
    /// Commissioned and ready to switch to schedulable.
    Standby,
    /// Part of the network for normal operations.
    Schedulable,
}

impl InstrumentState {
    pub const ALL: [InstrumentState; 5] = [
        InstrumentState::Disabled,
        InstrumentState::Manual,
        InstrumentState::Commissioning,
        InstrumentState::Standby,
        InstrumentState::Schedulable,
    ];

    /// Stored integer code.
    pub fn code(self) -> i32 {
        match self {
            InstrumentState::Disabled => 0,
            InstrumentState::Manual => 10,
            InstrumentState::Commissioning => 20,
            InstrumentState::Standby => 25,
            InstrumentState::Schedulable => 30,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InstrumentState::Disabled => "DISABLED",
            InstrumentState::Manual => "MANUAL",
            InstrumentState::Commissioning => "COMMISSIONING",
            InstrumentState::Standby => "STANDBY",
            InstrumentState::Schedulable => "SCHEDULABLE",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|state| i64::from(state.code()) == code)
    }
}

impl fmt::Display for InstrumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for InstrumentState {
    type Err = String;

    /// Accepts a label (case-insensitive) or an integer code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code)
                .ok_or_else(|| format!("\"{}\" is not a valid choice.", trimmed));
        }
        Self::ALL
            .into_iter()
            .find(|state| state.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("\"{}\" is not a valid choice.", trimmed))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StateValue {
    Code(i64),
    Label(String),
}

impl TryFrom<StateValue> for InstrumentState {
    type Error = String;

    fn try_from(value: StateValue) -> Result<Self, Self::Error> {
        match value {
            StateValue::Code(code) => InstrumentState::from_code(code)
                .ok_or_else(|| format!("\"{}\" is not a valid choice.", code)),
            StateValue::Label(label) => label.parse(),
        }
    }
}

impl From<InstrumentState> for String {
    fn from(state: InstrumentState) -> Self {
        state.label().to_string()
    }
}

/// How an instrument is guided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutoguiderType {
    InCamera,
    #[default]
    OffAxis,
    SelfGuide,
}

impl AutoguiderType {
    pub fn as_str(self) -> &'static str {
        match self {
            AutoguiderType::InCamera => "InCamera",
            AutoguiderType::OffAxis => "OffAxis",
            AutoguiderType::SelfGuide => "SelfGuide",
        }
    }
}

impl FromStr for AutoguiderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InCamera" => Ok(AutoguiderType::InCamera),
            "OffAxis" => Ok(AutoguiderType::OffAxis),
            "SelfGuide" => Ok(AutoguiderType::SelfGuide),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
    }
}

/// Overheads and configuration rules shared by every instrument of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentTypeFields {
    pub name: String,
    /// Globally unique.
    pub code: String,
    #[serde(default = "default_fixed_overhead")]
    pub fixed_overhead_per_exposure: f64,
    #[serde(default = "default_front_padding")]
    pub front_padding: f64,
    #[serde(default)]
    pub config_change_time: f64,
    #[serde(default)]
    pub acquire_exposure_time: f64,
    /// Configuration types this instrument accepts, e.g. `EXPOSE`, `SPECTRUM`.
    #[serde(default)]
    pub configuration_types: Vec<String>,
    /// Percent.
    #[serde(default = "default_acceptability_threshold")]
    pub default_acceptability_threshold: f64,
    #[serde(default = "default_true")]
    pub allow_self_guiding: bool,
}

fn default_fixed_overhead() -> f64 {
    1.0
}

fn default_front_padding() -> f64 {
    90.0
}

fn default_acceptability_threshold() -> f64 {
    90.0
}

impl Validate for InstrumentTypeFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        errors.max_length("name", &self.name, MAX_TEXT);
        errors.require("code", &self.code);
        errors.max_length("code", &self.code, MAX_TEXT);
        for (field, value) in [
            ("fixed_overhead_per_exposure", self.fixed_overhead_per_exposure),
            ("front_padding", self.front_padding),
            ("config_change_time", self.config_change_time),
            ("acquire_exposure_time", self.acquire_exposure_time),
            (
                "default_acceptability_threshold",
                self.default_acceptability_threshold,
            ),
        ] {
            errors.finite(field, value);
        }
        for tag in &self.configuration_types {
            errors.require("configuration_types", tag);
            errors.max_length("configuration_types", tag, 20);
        }
        errors.into_result()
    }
}

impl EntityFields for InstrumentTypeFields {
    const NAME: &'static str = "instrument type";
}

/// A category of generic mode (e.g. `readout`, `guiding`). Keyed by a
/// caller-chosen string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeType {
    #[serde(flatten)]
    pub fields: ModeTypeFields,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeTypeFields {
    pub id: String,
}

impl Validate for ModeTypeFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("id", &self.id);
        errors.max_length("id", &self.id, MAX_TEXT);
        errors.into_result()
    }
}

impl EntityFields for ModeTypeFields {
    const NAME: &'static str = "mode type";
}

impl Entity for ModeType {
    type Id = String;
    type Fields = ModeTypeFields;

    fn id(&self) -> &String {
        &self.fields.id
    }

    fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    fn fields(&self) -> &ModeTypeFields {
        &self.fields
    }

    fn assemble(id: String, modified: DateTime<Utc>, _fields: ModeTypeFields) -> Self {
        ModeType {
            fields: ModeTypeFields { id },
            modified,
        }
    }

    fn assigned_id(fields: &ModeTypeFields) -> Option<String> {
        Some(fields.id.clone())
    }
}

/// A mode an instrument can operate in (readout speed, guiding mode, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericModeFields {
    pub name: String,
    pub code: String,
    /// Seconds.
    pub overhead: f64,
    /// Structural schema that configurations using this mode must satisfy.
    #[serde(default = "empty_object")]
    pub validation_schema: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Validate for GenericModeFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        errors.max_length("name", &self.name, MAX_TEXT);
        errors.require("code", &self.code);
        errors.max_length("code", &self.code, MAX_TEXT);
        errors.finite("overhead", self.overhead);
        if !self.validation_schema.is_object() {
            errors.add("validation_schema", "Expected a JSON object.");
        }
        errors.into_result()
    }
}

impl EntityFields for GenericModeFields {
    const NAME: &'static str = "generic mode";
}

/// The modes of one mode type available to an instrument type.
///
/// At most one group exists per (instrument_type, type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericModeGroupFields {
    #[serde(default)]
    pub instrument_type: Option<InstrumentTypeId>,
    #[serde(rename = "type", default)]
    pub mode_type: Option<String>,
    #[serde(default)]
    pub default: Option<GenericModeId>,
    #[serde(default)]
    pub modes: Vec<GenericModeId>,
}

impl Validate for GenericModeGroupFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(mode_type) = &self.mode_type {
            errors.require("type", mode_type);
        }
        errors.into_result()
    }
}

impl EntityFields for GenericModeGroupFields {
    const NAME: &'static str = "generic mode group";

    fn normalize(&mut self) {
        normalize_ids(&mut self.modes);
    }
}

/// A physical instrument on a telescope: its science cameras, autoguider,
/// and operational state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentFields {
    #[serde(default)]
    pub instrument_type: Option<InstrumentTypeId>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: InstrumentState,
    pub telescope: TelescopeId,
    #[serde(default)]
    pub science_cameras: Vec<CameraId>,
    pub autoguider_camera: CameraId,
    #[serde(default)]
    pub autoguider_type: AutoguiderType,
}

impl Validate for InstrumentFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.max_length("code", &self.code, MAX_TEXT);
        errors.into_result()
    }
}

impl EntityFields for InstrumentFields {
    const NAME: &'static str = "instrument";

    fn normalize(&mut self) {
        normalize_ids(&mut self.science_cameras);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_accepts_code_or_label() {
        let by_code: InstrumentState = serde_json::from_value(json!(30)).unwrap();
        let by_label: InstrumentState = serde_json::from_value(json!("standby")).unwrap();
        assert_eq!(by_code, InstrumentState::Schedulable);
        assert_eq!(by_label, InstrumentState::Standby);
    }

    #[test]
    fn test_state_serializes_as_label() {
        let value = serde_json::to_value(InstrumentState::Commissioning).unwrap();
        assert_eq!(value, json!("COMMISSIONING"));
    }

    #[test]
    fn test_state_rejects_unknown_code() {
        let result: Result<InstrumentState, _> = serde_json::from_value(json!(15));
        assert!(result.is_err());
        assert!("7".parse::<InstrumentState>().is_err());
    }

    #[test]
    fn test_state_order_follows_codes() {
        assert!(InstrumentState::Disabled < InstrumentState::Manual);
        assert!(InstrumentState::Standby < InstrumentState::Schedulable);
        assert_eq!(InstrumentState::Standby.code(), 25);
    }

    #[test]
    fn test_instrument_defaults() {
        let fields: InstrumentFields =
            serde_json::from_value(json!({"telescope": 1, "autoguider_camera": 2})).unwrap();
        assert_eq!(fields.state, InstrumentState::Disabled);
        assert_eq!(fields.autoguider_type, AutoguiderType::OffAxis);
        assert_eq!(fields.instrument_type, None);
        assert!(fields.science_cameras.is_empty());
    }

    #[test]
    fn test_autoguider_type_wire_names() {
        let value = serde_json::to_value(AutoguiderType::SelfGuide).unwrap();
        assert_eq!(value, json!("SelfGuide"));
        assert_eq!("InCamera".parse::<AutoguiderType>(), Ok(AutoguiderType::InCamera));
        assert!("offaxis".parse::<AutoguiderType>().is_err());
    }

    #[test]
    fn test_instrument_type_defaults() {
        let fields: InstrumentTypeFields =
            serde_json::from_value(json!({"name": "Sinistro", "code": "1M0-SCICAM-SINISTRO"}))
                .unwrap();
        assert_eq!(fields.fixed_overhead_per_exposure, 1.0);
        assert_eq!(fields.front_padding, 90.0);
        assert_eq!(fields.default_acceptability_threshold, 90.0);
        assert!(fields.allow_self_guiding);
        assert!(fields.configuration_types.is_empty());
    }

    #[test]
    fn test_configuration_type_tags_limited() {
        let mut fields: InstrumentTypeFields =
            serde_json::from_value(json!({"name": "n", "code": "c"})).unwrap();
        fields.configuration_types = vec!["EXPOSE".into(), "X".repeat(21)];
        assert!(fields.validate().unwrap_err().contains("configuration_types"));
    }

    #[test]
    fn test_generic_mode_schema_must_be_object() {
        let mut fields: GenericModeFields =
            serde_json::from_value(json!({"name": "Full frame", "code": "full", "overhead": 1.5}))
                .unwrap();
        assert_eq!(fields.validation_schema, json!({}));
        fields.validation_schema = json!([1, 2]);
        assert!(fields.validate().unwrap_err().contains("validation_schema"));
    }

    #[test]
    fn test_mode_type_is_keyed_by_caller_id() {
        let fields = ModeTypeFields {
            id: "readout".to_string(),
        };
        assert_eq!(ModeType::assigned_id(&fields), Some("readout".to_string()));
        let mode_type = ModeType::assemble("readout".to_string(), Utc::now(), fields);
        let value = serde_json::to_value(&mode_type).unwrap();
        assert_eq!(value["id"], json!("readout"));
    }
}
