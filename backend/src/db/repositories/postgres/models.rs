//! Row types mirroring `schema.rs`.
//!
//! Each table has a `*Row` read type and a `*Changes` write type used for both
//! insert and update. Join tables are read as `(owner_id, member_id)` pairs.

use chrono::{DateTime, NaiveTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{
    camera_types, cameras, enclosures, generic_mode_groups, generic_modes, instrument_types,
    instruments, mode_types, optical_element_groups, optical_elements, sites, telescopes,
};
use crate::models::*;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SiteRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub active: bool,
    pub code: String,
    pub name: String,
    pub lat: f64,
    pub long: f64,
    pub elevation: i32,
    pub timezone: i32,
    pub tz: String,
    pub restart: NaiveTime,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = sites)]
pub struct SiteChanges<'a> {
    pub modified: DateTime<Utc>,
    pub active: bool,
    pub code: &'a str,
    pub name: &'a str,
    pub lat: f64,
    pub long: f64,
    pub elevation: i32,
    pub timezone: i32,
    pub tz: &'a str,
    pub restart: NaiveTime,
}

impl<'a> SiteChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a SiteFields) -> Self {
        Self {
            modified,
            active: f.active,
            code: &f.code,
            name: &f.name,
            lat: f.lat,
            long: f.long,
            elevation: f.elevation,
            timezone: f.timezone,
            tz: &f.tz,
            restart: f.restart,
        }
    }
}

impl From<SiteRow> for Site {
    fn from(row: SiteRow) -> Self {
        Record {
            id: SiteId(row.id),
            modified: row.modified,
            fields: SiteFields {
                active: row.active,
                code: row.code,
                name: row.name,
                lat: row.lat,
                long: row.long,
                elevation: row.elevation,
                timezone: row.timezone,
                tz: row.tz,
                restart: row.restart,
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = enclosures)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EnclosureRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub active: bool,
    pub code: String,
    pub name: String,
    pub site_id: i64,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = enclosures)]
pub struct EnclosureChanges<'a> {
    pub modified: DateTime<Utc>,
    pub active: bool,
    pub code: &'a str,
    pub name: &'a str,
    pub site_id: i64,
}

impl<'a> EnclosureChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a EnclosureFields) -> Self {
        Self {
            modified,
            active: f.active,
            code: &f.code,
            name: &f.name,
            site_id: f.site.0,
        }
    }
}

impl From<EnclosureRow> for Enclosure {
    fn from(row: EnclosureRow) -> Self {
        Record {
            id: EnclosureId(row.id),
            modified: row.modified,
            fields: EnclosureFields {
                active: row.active,
                code: row.code,
                name: row.name,
                site: SiteId(row.site_id),
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = telescopes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TelescopeRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub active: bool,
    pub code: String,
    pub name: String,
    pub serial_number: String,
    pub slew_rate: f64,
    pub minimum_slew_overhead: f64,
    pub instrument_change_overhead: f64,
    pub lat: f64,
    pub long: f64,
    pub horizon: f64,
    pub ha_limit_neg: f64,
    pub ha_limit_pos: f64,
    pub zenith_blind_spot: f64,
    pub enclosure_id: i64,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = telescopes)]
pub struct TelescopeChanges<'a> {
    pub modified: DateTime<Utc>,
    pub active: bool,
    pub code: &'a str,
    pub name: &'a str,
    pub serial_number: &'a str,
    pub slew_rate: f64,
    pub minimum_slew_overhead: f64,
    pub instrument_change_overhead: f64,
    pub lat: f64,
    pub long: f64,
    pub horizon: f64,
    pub ha_limit_neg: f64,
    pub ha_limit_pos: f64,
    pub zenith_blind_spot: f64,
    pub enclosure_id: i64,
}

impl<'a> TelescopeChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a TelescopeFields) -> Self {
        Self {
            modified,
            active: f.active,
            code: &f.code,
            name: &f.name,
            serial_number: &f.serial_number,
            slew_rate: f.slew_rate,
            minimum_slew_overhead: f.minimum_slew_overhead,
            instrument_change_overhead: f.instrument_change_overhead,
            lat: f.lat,
            long: f.long,
            horizon: f.horizon,
            ha_limit_neg: f.ha_limit_neg,
            ha_limit_pos: f.ha_limit_pos,
            zenith_blind_spot: f.zenith_blind_spot,
            enclosure_id: f.enclosure.0,
        }
    }
}

impl From<TelescopeRow> for Telescope {
    fn from(row: TelescopeRow) -> Self {
        Record {
            id: TelescopeId(row.id),
            modified: row.modified,
            fields: TelescopeFields {
                active: row.active,
                code: row.code,
                name: row.name,
                serial_number: row.serial_number,
                slew_rate: row.slew_rate,
                minimum_slew_overhead: row.minimum_slew_overhead,
                instrument_change_overhead: row.instrument_change_overhead,
                lat: row.lat,
                long: row.long,
                horizon: row.horizon,
                ha_limit_neg: row.ha_limit_neg,
                ha_limit_pos: row.ha_limit_pos,
                zenith_blind_spot: row.zenith_blind_spot,
                enclosure: EnclosureId(row.enclosure_id),
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = optical_elements)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OpticalElementRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub name: String,
    pub code: String,
    pub schedulable: bool,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = optical_elements)]
pub struct OpticalElementChanges<'a> {
    pub modified: DateTime<Utc>,
    pub name: &'a str,
    pub code: &'a str,
    pub schedulable: bool,
}

impl<'a> OpticalElementChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a OpticalElementFields) -> Self {
        Self {
            modified,
            name: &f.name,
            code: &f.code,
            schedulable: f.schedulable,
        }
    }
}

impl From<OpticalElementRow> for OpticalElement {
    fn from(row: OpticalElementRow) -> Self {
        Record {
            id: OpticalElementId(row.id),
            modified: row.modified,
            fields: OpticalElementFields {
                name: row.name,
                code: row.code,
                schedulable: row.schedulable,
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = optical_element_groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OpticalElementGroupRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub name: String,
    pub group_type: String,
    pub default_id: Option<i64>,
    pub element_change_overhead: f64,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = optical_element_groups)]
#[diesel(treat_none_as_null = true)]
pub struct OpticalElementGroupChanges<'a> {
    pub modified: DateTime<Utc>,
    pub name: &'a str,
    pub group_type: &'a str,
    pub default_id: Option<i64>,
    pub element_change_overhead: f64,
}

impl<'a> OpticalElementGroupChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a OpticalElementGroupFields) -> Self {
        Self {
            modified,
            name: &f.name,
            group_type: &f.element_type,
            default_id: f.default.map(|id| id.0),
            element_change_overhead: f.element_change_overhead,
        }
    }
}

impl OpticalElementGroupRow {
    pub fn into_entity(self, members: Vec<i64>) -> OpticalElementGroup {
        Record {
            id: OpticalElementGroupId(self.id),
            modified: self.modified,
            fields: OpticalElementGroupFields {
                name: self.name,
                element_type: self.group_type,
                default: self.default_id.map(OpticalElementId),
                optical_elements: members.into_iter().map(OpticalElementId).collect(),
                element_change_overhead: self.element_change_overhead,
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = camera_types)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CameraTypeRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub name: String,
    pub code: String,
    pub size: String,
    pub pscale: f64,
    pub pixels_x: i32,
    pub pixels_y: i32,
    pub max_rois: i32,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = camera_types)]
pub struct CameraTypeChanges<'a> {
    pub modified: DateTime<Utc>,
    pub name: &'a str,
    pub code: &'a str,
    pub size: &'a str,
    pub pscale: f64,
    pub pixels_x: i32,
    pub pixels_y: i32,
    pub max_rois: i32,
}

impl<'a> CameraTypeChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a CameraTypeFields) -> Self {
        Self {
            modified,
            name: &f.name,
            code: &f.code,
            size: &f.size,
            pscale: f.pscale,
            pixels_x: f.pixels_x,
            pixels_y: f.pixels_y,
            max_rois: f.max_rois,
        }
    }
}

impl From<CameraTypeRow> for CameraType {
    fn from(row: CameraTypeRow) -> Self {
        Record {
            id: CameraTypeId(row.id),
            modified: row.modified,
            fields: CameraTypeFields {
                name: row.name,
                code: row.code,
                size: row.size,
                pscale: row.pscale,
                pixels_x: row.pixels_x,
                pixels_y: row.pixels_y,
                max_rois: row.max_rois,
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = cameras)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CameraRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub camera_type_id: i64,
    pub code: String,
    pub host: String,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = cameras)]
pub struct CameraChanges<'a> {
    pub modified: DateTime<Utc>,
    pub camera_type_id: i64,
    pub code: &'a str,
    pub host: &'a str,
}

impl<'a> CameraChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a CameraFields) -> Self {
        Self {
            modified,
            camera_type_id: f.camera_type.0,
            code: &f.code,
            host: &f.host,
        }
    }
}

impl CameraRow {
    pub fn into_entity(self, groups: Vec<i64>) -> Camera {
        Record {
            id: CameraId(self.id),
            modified: self.modified,
            fields: CameraFields {
                camera_type: CameraTypeId(self.camera_type_id),
                code: self.code,
                optical_element_groups: groups.into_iter().map(OpticalElementGroupId).collect(),
                host: self.host,
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = instrument_types)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InstrumentTypeRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub name: String,
    pub code: String,
    pub fixed_overhead_per_exposure: f64,
    pub front_padding: f64,
    pub config_change_time: f64,
    pub acquire_exposure_time: f64,
    pub configuration_types: Vec<String>,
    pub default_acceptability_threshold: f64,
    pub allow_self_guiding: bool,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = instrument_types)]
pub struct InstrumentTypeChanges<'a> {
    pub modified: DateTime<Utc>,
    pub name: &'a str,
    pub code: &'a str,
    pub fixed_overhead_per_exposure: f64,
    pub front_padding: f64,
    pub config_change_time: f64,
    pub acquire_exposure_time: f64,
    pub configuration_types: &'a [String],
    pub default_acceptability_threshold: f64,
    pub allow_self_guiding: bool,
}

impl<'a> InstrumentTypeChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a InstrumentTypeFields) -> Self {
        Self {
            modified,
            name: &f.name,
            code: &f.code,
            fixed_overhead_per_exposure: f.fixed_overhead_per_exposure,
            front_padding: f.front_padding,
            config_change_time: f.config_change_time,
            acquire_exposure_time: f.acquire_exposure_time,
            configuration_types: &f.configuration_types,
            default_acceptability_threshold: f.default_acceptability_threshold,
            allow_self_guiding: f.allow_self_guiding,
        }
    }
}

impl From<InstrumentTypeRow> for InstrumentType {
    fn from(row: InstrumentTypeRow) -> Self {
        Record {
            id: InstrumentTypeId(row.id),
            modified: row.modified,
            fields: InstrumentTypeFields {
                name: row.name,
                code: row.code,
                fixed_overhead_per_exposure: row.fixed_overhead_per_exposure,
                front_padding: row.front_padding,
                config_change_time: row.config_change_time,
                acquire_exposure_time: row.acquire_exposure_time,
                configuration_types: row.configuration_types,
                default_acceptability_threshold: row.default_acceptability_threshold,
                allow_self_guiding: row.allow_self_guiding,
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = mode_types)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ModeTypeRow {
    pub id: String,
    pub modified: DateTime<Utc>,
}

impl From<ModeTypeRow> for ModeType {
    fn from(row: ModeTypeRow) -> Self {
        ModeType {
            fields: ModeTypeFields { id: row.id },
            modified: row.modified,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = generic_modes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GenericModeRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub name: String,
    pub code: String,
    pub overhead: f64,
    pub validation_schema: Value,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = generic_modes)]
pub struct GenericModeChanges<'a> {
    pub modified: DateTime<Utc>,
    pub name: &'a str,
    pub code: &'a str,
    pub overhead: f64,
    pub validation_schema: &'a Value,
}

impl<'a> GenericModeChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a GenericModeFields) -> Self {
        Self {
            modified,
            name: &f.name,
            code: &f.code,
            overhead: f.overhead,
            validation_schema: &f.validation_schema,
        }
    }
}

impl From<GenericModeRow> for GenericMode {
    fn from(row: GenericModeRow) -> Self {
        Record {
            id: GenericModeId(row.id),
            modified: row.modified,
            fields: GenericModeFields {
                name: row.name,
                code: row.code,
                overhead: row.overhead,
                validation_schema: row.validation_schema,
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = generic_mode_groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GenericModeGroupRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub instrument_type_id: Option<i64>,
    pub mode_type_id: Option<String>,
    pub default_id: Option<i64>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = generic_mode_groups)]
#[diesel(treat_none_as_null = true)]
pub struct GenericModeGroupChanges<'a> {
    pub modified: DateTime<Utc>,
    pub instrument_type_id: Option<i64>,
    pub mode_type_id: Option<&'a str>,
    pub default_id: Option<i64>,
}

impl<'a> GenericModeGroupChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a GenericModeGroupFields) -> Self {
        Self {
            modified,
            instrument_type_id: f.instrument_type.map(|id| id.0),
            mode_type_id: f.mode_type.as_deref(),
            default_id: f.default.map(|id| id.0),
        }
    }
}

impl GenericModeGroupRow {
    pub fn into_entity(self, modes: Vec<i64>) -> GenericModeGroup {
        Record {
            id: GenericModeGroupId(self.id),
            modified: self.modified,
            fields: GenericModeGroupFields {
                instrument_type: self.instrument_type_id.map(InstrumentTypeId),
                mode_type: self.mode_type_id,
                default: self.default_id.map(GenericModeId),
                modes: modes.into_iter().map(GenericModeId).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = instruments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InstrumentRow {
    pub id: i64,
    pub modified: DateTime<Utc>,
    pub instrument_type_id: Option<i64>,
    pub code: String,
    pub state: i32,
    pub telescope_id: i64,
    pub autoguider_camera_id: i64,
    pub autoguider_type: String,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = instruments)]
#[diesel(treat_none_as_null = true)]
pub struct InstrumentChanges<'a> {
    pub modified: DateTime<Utc>,
    pub instrument_type_id: Option<i64>,
    pub code: &'a str,
    pub state: i32,
    pub telescope_id: i64,
    pub autoguider_camera_id: i64,
    pub autoguider_type: &'static str,
}

impl<'a> InstrumentChanges<'a> {
    pub fn new(modified: DateTime<Utc>, f: &'a InstrumentFields) -> Self {
        Self {
            modified,
            instrument_type_id: f.instrument_type.map(|id| id.0),
            code: &f.code,
            state: f.state.code(),
            telescope_id: f.telescope.0,
            autoguider_camera_id: f.autoguider_camera.0,
            autoguider_type: f.autoguider_type.as_str(),
        }
    }
}

impl InstrumentRow {
    /// Fails when the stored state or autoguider type is not a known value.
    pub fn into_entity(self, science_cameras: Vec<i64>) -> Result<Instrument, String> {
        let state = InstrumentState::from_code(i64::from(self.state))
            .ok_or_else(|| format!("unknown instrument state {}", self.state))?;
        let autoguider_type = self.autoguider_type.parse::<AutoguiderType>()?;
        Ok(Record {
            id: InstrumentId(self.id),
            modified: self.modified,
            fields: InstrumentFields {
                instrument_type: self.instrument_type_id.map(InstrumentTypeId),
                code: self.code,
                state,
                telescope: TelescopeId(self.telescope_id),
                science_cameras: science_cameras.into_iter().map(CameraId).collect(),
                autoguider_camera: CameraId(self.autoguider_camera_id),
                autoguider_type,
            },
        })
    }
}
