//! Hardware entities and their write payloads.
//!
//! Each entity is a [`Record`]: a server-assigned id, a `modified` timestamp,
//! and the writable fields (`*Fields`) flattened alongside them. The same
//! `*Fields` type is the create/update payload, so what a client writes is
//! exactly what it reads back.

pub mod camera;
pub mod instrument;
pub mod macros;
pub mod optics;
pub mod site;
pub mod validation;

pub use camera::*;
pub use instrument::*;
pub use optics::*;
pub use site::*;
pub use validation::{
    already_exists, missing_pk, unique_together, FieldErrors, Validate, NON_FIELD_ERRORS,
    REQUIRED,
};

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

/// Maximum length of most free-text columns.
pub const MAX_TEXT: usize = 200;

/// Primary key of an entity.
pub trait EntityId:
    Clone + Ord + Hash + Debug + Display + FromStr + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Build an id from a server-side sequence value. Returns `None` for
    /// caller-supplied keys.
    fn from_serial(serial: i64) -> Option<Self>;
}

impl EntityId for String {
    fn from_serial(_serial: i64) -> Option<Self> {
        None
    }
}

/// Writable part of an entity.
pub trait EntityFields:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Validate + Send + Sync + 'static
{
    /// Human-readable entity name used in errors and logs.
    const NAME: &'static str;

    /// Canonicalize set-valued relations (sorted, no duplicates).
    fn normalize(&mut self) {}
}

/// A persisted hardware entity.
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: EntityId;
    type Fields: EntityFields;

    fn id(&self) -> &Self::Id;
    fn modified(&self) -> DateTime<Utc>;
    fn fields(&self) -> &Self::Fields;

    /// Assemble an entity from its stored parts.
    fn assemble(id: Self::Id, modified: DateTime<Utc>, fields: Self::Fields) -> Self;

    /// Primary key carried by the payload itself, for entities whose key is
    /// chosen by the caller.
    fn assigned_id(_fields: &Self::Fields) -> Option<Self::Id> {
        None
    }

    fn entity_name() -> &'static str {
        <Self::Fields as EntityFields>::NAME
    }
}

/// Server-assigned id and timestamp plus the entity's writable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<I, F> {
    pub id: I,
    pub modified: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: F,
}

impl<I, F> Deref for Record<I, F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.fields
    }
}

impl<I, F> DerefMut for Record<I, F> {
    fn deref_mut(&mut self) -> &mut F {
        &mut self.fields
    }
}

impl<I, F> Entity for Record<I, F>
where
    I: EntityId,
    F: EntityFields,
{
    type Id = I;
    type Fields = F;

    fn id(&self) -> &I {
        &self.id
    }

    fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    fn fields(&self) -> &F {
        &self.fields
    }

    fn assemble(id: I, modified: DateTime<Utc>, fields: F) -> Self {
        Record {
            id,
            modified,
            fields,
        }
    }
}

crate::define_id_type!(SiteId);
crate::define_id_type!(EnclosureId);
crate::define_id_type!(TelescopeId);
crate::define_id_type!(OpticalElementId);
crate::define_id_type!(OpticalElementGroupId);
crate::define_id_type!(CameraTypeId);
crate::define_id_type!(CameraId);
crate::define_id_type!(InstrumentTypeId);
crate::define_id_type!(GenericModeId);
crate::define_id_type!(GenericModeGroupId);
crate::define_id_type!(InstrumentId);

/// Timestamp for a write to a row last modified at `previous`.
///
/// Truncated to microseconds (the store's precision) and always strictly
/// later than `previous`, even when the clock has not advanced.
pub fn next_modified(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match previous {
        Some(prev) if prev >= now => prev + chrono::Duration::microseconds(1),
        _ => now,
    }
}

/// Reject an update that would change a caller-supplied primary key.
pub fn check_assigned_id<E: Entity>(id: &E::Id, fields: &E::Fields) -> Result<(), FieldErrors> {
    match E::assigned_id(fields) {
        Some(assigned) if assigned != *id => Err(FieldErrors::single(
            "id",
            format!("The id of an existing {} cannot be changed.", E::entity_name()),
        )),
        _ => Ok(()),
    }
}

/// Sort and deduplicate a many-to-many id list.
pub(crate) fn normalize_ids<T: Ord>(ids: &mut Vec<T>) {
    ids.sort();
    ids.dedup();
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parses_from_path_segment() {
        let id: SiteId = "42".parse().unwrap();
        assert_eq!(id, SiteId::new(42));
        assert!("abc".parse::<SiteId>().is_err());
    }

    #[test]
    fn test_id_serializes_as_integer() {
        let json = serde_json::to_value(TelescopeId::new(7)).unwrap();
        assert_eq!(json, serde_json::json!(7));
    }

    #[test]
    fn test_next_modified_strictly_increases() {
        let first = next_modified(None);
        let second = next_modified(Some(first));
        let third = next_modified(Some(second));
        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn test_next_modified_moves_past_future_timestamps() {
        let future = Utc::now() + chrono::Duration::hours(1);
        let next = next_modified(Some(future));
        assert!(next > future);
    }

    #[test]
    fn test_assigned_id_cannot_change() {
        let fields = ModeTypeFields {
            id: "guiding".to_string(),
        };
        assert!(check_assigned_id::<ModeType>(&"readout".to_string(), &fields).is_err());
        assert!(check_assigned_id::<ModeType>(&"guiding".to_string(), &fields).is_ok());
    }

    #[test]
    fn test_normalize_ids_dedups() {
        let mut ids = vec![CameraId::new(3), CameraId::new(1), CameraId::new(3)];
        normalize_ids(&mut ids);
        assert_eq!(ids, vec![CameraId::new(1), CameraId::new(3)]);
    }
}
