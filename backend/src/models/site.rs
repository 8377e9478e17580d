//! Site → Enclosure → Telescope, the physical top of the hardware tree.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::validation::{FieldErrors, Validate};
use super::{default_true, EnclosureId, EntityFields, Record, SiteId, TelescopeId, MAX_TEXT};

pub type Site = Record<SiteId, SiteFields>;
pub type Enclosure = Record<EnclosureId, EnclosureFields>;
pub type Telescope = Record<TelescopeId, TelescopeFields>;

/// An observatory site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteFields {
    #[serde(default = "default_true")]
    pub active: bool,
    /// Three-letter site code, the natural key shown in display strings.
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub long: f64,
    /// Metres above sea level.
    pub elevation: i32,
    /// Offset from UTC in whole hours.
    pub timezone: i32,
    /// IANA timezone name.
    #[serde(default = "default_tz")]
    pub tz: String,
    /// Daily restart time of the site software.
    #[serde(default = "default_restart")]
    pub restart: NaiveTime,
}

fn default_tz() -> String {
    "Etc/UTC".to_string()
}

fn default_restart() -> NaiveTime {
    NaiveTime::MIN
}

impl Validate for SiteFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("code", &self.code);
        errors.max_length("code", &self.code, 3);
        errors.max_length("name", &self.name, MAX_TEXT);
        errors.require("tz", &self.tz);
        errors.max_length("tz", &self.tz, 64);
        errors.finite("lat", self.lat);
        errors.finite("long", self.long);
        errors.into_result()
    }
}

impl EntityFields for SiteFields {
    const NAME: &'static str = "site";
}

/// A dome or roll-off roof at a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnclosureFields {
    #[serde(default = "default_true")]
    pub active: bool,
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub site: SiteId,
}

impl Validate for EnclosureFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("code", &self.code);
        errors.max_length("code", &self.code, MAX_TEXT);
        errors.max_length("name", &self.name, MAX_TEXT);
        errors.into_result()
    }
}

impl EntityFields for EnclosureFields {
    const NAME: &'static str = "enclosure";
}

/// A telescope mounted in an enclosure, with its pointing limits and overheads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelescopeFields {
    #[serde(default = "default_true")]
    pub active: bool,
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub serial_number: String,
    /// Seconds per arcsecond of slew.
    #[serde(default)]
    pub slew_rate: f64,
    /// Seconds.
    #[serde(default)]
    pub minimum_slew_overhead: f64,
    /// Seconds.
    #[serde(default)]
    pub instrument_change_overhead: f64,
    pub lat: f64,
    pub long: f64,
    pub horizon: f64,
    pub ha_limit_neg: f64,
    pub ha_limit_pos: f64,
    /// Radius in degrees of the zenith blind spot of alt-az mounts.
    #[serde(default)]
    pub zenith_blind_spot: f64,
    pub enclosure: EnclosureId,
}

impl Validate for TelescopeFields {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("code", &self.code);
        errors.max_length("code", &self.code, MAX_TEXT);
        errors.max_length("name", &self.name, MAX_TEXT);
        errors.max_length("serial_number", &self.serial_number, 50);
        for (field, value) in [
            ("slew_rate", self.slew_rate),
            ("minimum_slew_overhead", self.minimum_slew_overhead),
            ("instrument_change_overhead", self.instrument_change_overhead),
            ("lat", self.lat),
            ("long", self.long),
            ("horizon", self.horizon),
            ("ha_limit_neg", self.ha_limit_neg),
            ("ha_limit_pos", self.ha_limit_pos),
            ("zenith_blind_spot", self.zenith_blind_spot),
        ] {
            errors.finite(field, value);
        }
        errors.into_result()
    }
}

impl EntityFields for TelescopeFields {
    const NAME: &'static str = "telescope";
}
