//! Per-entity table access for the Postgres backend.
//!
//! Every function runs on a connection that is already inside the write or
//! read transaction opened by the repository. Cascades and protected
//! references are enforced by the foreign keys in the migration; `blockers`
//! only exists to name the rows that would make a delete fail.

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use std::collections::HashMap;

use super::models::*;
use super::schema::*;
use crate::models::*;

/// Table operations for one entity type.
pub(super) trait PgEntity: Entity {
    /// All rows in listing order.
    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>>;

    fn load(conn: &mut PgConnection, id: &Self::Id) -> QueryResult<Self>;

    /// Insert the row and its join records, returning the new key.
    fn insert(
        conn: &mut PgConnection,
        modified: DateTime<Utc>,
        fields: &Self::Fields,
    ) -> QueryResult<Self::Id>;

    /// Overwrite the row and replace its join records. Returns rows affected.
    fn update(
        conn: &mut PgConnection,
        id: &Self::Id,
        modified: DateTime<Utc>,
        fields: &Self::Fields,
    ) -> QueryResult<usize>;

    /// Delete the row. Returns rows affected.
    fn remove(conn: &mut PgConnection, id: &Self::Id) -> QueryResult<usize>;

    /// Uniqueness and foreign-key checks run before the write, so every
    /// offending field is reported at once. `current` is the row being
    /// updated, `None` on create.
    fn check_relations(
        _conn: &mut PgConnection,
        _current: Option<&Self::Id>,
        _fields: &Self::Fields,
    ) -> QueryResult<FieldErrors> {
        Ok(FieldErrors::new())
    }

    /// Rows whose protected references block deleting `id`.
    fn blockers(_conn: &mut PgConnection, _id: &Self::Id) -> QueryResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Report every id in `wanted` that has no row in `$table`.
macro_rules! require_ids {
    ($conn:expr, $errors:expr, $field:expr, $table:ident, $wanted:expr) => {{
        let wanted: Vec<i64> = $wanted;
        if !wanted.is_empty() {
            let found: Vec<i64> = $table::table
                .filter($table::id.eq_any(wanted.clone()))
                .select($table::id)
                .load($conn)?;
            for id in wanted.iter().filter(|id| !found.contains(id)) {
                $errors.add($field, missing_pk(id));
            }
        }
    }};
}

/// Whether a row other than `current` already holds the value.
fn taken_by_other(matching: &[i64], current: Option<i64>) -> bool {
    matching.iter().any(|id| Some(*id) != current)
}

/// Group `(owner, member)` pairs by owner, members in ascending order.
fn group_pairs(pairs: Vec<(i64, i64)>) -> HashMap<i64, Vec<i64>> {
    let mut grouped: HashMap<i64, Vec<i64>> = HashMap::new();
    for (owner, member) in pairs {
        grouped.entry(owner).or_default().push(member);
    }
    for members in grouped.values_mut() {
        members.sort_unstable();
    }
    grouped
}

fn labelled(kind: &str, relation: &str, ids: Vec<i64>) -> Vec<String> {
    ids.into_iter()
        .map(|id| format!("{} {} ({})", kind, id, relation))
        .collect()
}

impl PgEntity for Site {
    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = sites::table
            .order((sites::code, sites::id))
            .select(SiteRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(Site::from).collect())
    }

    fn load(conn: &mut PgConnection, id: &SiteId) -> QueryResult<Self> {
        sites::table
            .find(id.0)
            .select(SiteRow::as_select())
            .first(conn)
            .map(Site::from)
    }

    fn insert(conn: &mut PgConnection, modified: DateTime<Utc>, fields: &SiteFields) -> QueryResult<SiteId> {
        diesel::insert_into(sites::table)
            .values(&SiteChanges::new(modified, fields))
            .returning(sites::id)
            .get_result(conn)
            .map(SiteId)
    }

    fn update(conn: &mut PgConnection, id: &SiteId, modified: DateTime<Utc>, fields: &SiteFields) -> QueryResult<usize> {
        diesel::update(sites::table.find(id.0))
            .set(&SiteChanges::new(modified, fields))
            .execute(conn)
    }

    fn remove(conn: &mut PgConnection, id: &SiteId) -> QueryResult<usize> {
        diesel::delete(sites::table.find(id.0)).execute(conn)
    }
}

impl PgEntity for Enclosure {
    fn check_relations(
        conn: &mut PgConnection,
        _: Option<&EnclosureId>,
        fields: &EnclosureFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        require_ids!(conn, errors, "site", sites, vec![fields.site.0]);
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = enclosures::table
            .order(enclosures::id)
            .select(EnclosureRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(Enclosure::from).collect())
    }

    fn load(conn: &mut PgConnection, id: &EnclosureId) -> QueryResult<Self> {
        enclosures::table
            .find(id.0)
            .select(EnclosureRow::as_select())
            .first(conn)
            .map(Enclosure::from)
    }

    fn insert(conn: &mut PgConnection, modified: DateTime<Utc>, fields: &EnclosureFields) -> QueryResult<EnclosureId> {
        diesel::insert_into(enclosures::table)
            .values(&EnclosureChanges::new(modified, fields))
            .returning(enclosures::id)
            .get_result(conn)
            .map(EnclosureId)
    }

    fn update(
        conn: &mut PgConnection,
        id: &EnclosureId,
        modified: DateTime<Utc>,
        fields: &EnclosureFields,
    ) -> QueryResult<usize> {
        diesel::update(enclosures::table.find(id.0))
            .set(&EnclosureChanges::new(modified, fields))
            .execute(conn)
    }

    fn remove(conn: &mut PgConnection, id: &EnclosureId) -> QueryResult<usize> {
        diesel::delete(enclosures::table.find(id.0)).execute(conn)
    }
}

impl PgEntity for Telescope {
    fn check_relations(
        conn: &mut PgConnection,
        _: Option<&TelescopeId>,
        fields: &TelescopeFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        require_ids!(conn, errors, "enclosure", enclosures, vec![fields.enclosure.0]);
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = telescopes::table
            .order(telescopes::id)
            .select(TelescopeRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(Telescope::from).collect())
    }

    fn load(conn: &mut PgConnection, id: &TelescopeId) -> QueryResult<Self> {
        telescopes::table
            .find(id.0)
            .select(TelescopeRow::as_select())
            .first(conn)
            .map(Telescope::from)
    }

    fn insert(conn: &mut PgConnection, modified: DateTime<Utc>, fields: &TelescopeFields) -> QueryResult<TelescopeId> {
        diesel::insert_into(telescopes::table)
            .values(&TelescopeChanges::new(modified, fields))
            .returning(telescopes::id)
            .get_result(conn)
            .map(TelescopeId)
    }

    fn update(
        conn: &mut PgConnection,
        id: &TelescopeId,
        modified: DateTime<Utc>,
        fields: &TelescopeFields,
    ) -> QueryResult<usize> {
        diesel::update(telescopes::table.find(id.0))
            .set(&TelescopeChanges::new(modified, fields))
            .execute(conn)
    }

    fn remove(conn: &mut PgConnection, id: &TelescopeId) -> QueryResult<usize> {
        diesel::delete(telescopes::table.find(id.0)).execute(conn)
    }
}

impl PgEntity for OpticalElement {
    fn check_relations(
        conn: &mut PgConnection,
        current: Option<&OpticalElementId>,
        fields: &OpticalElementFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        let matching = optical_elements::table
            .filter(optical_elements::code.eq(&fields.code))
            .select(optical_elements::id)
            .load::<i64>(conn)?;
        if taken_by_other(&matching, current.map(|id| id.0)) {
            errors.add("code", already_exists(OpticalElementFields::NAME, "code"));
        }
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = optical_elements::table
            .order(optical_elements::id)
            .select(OpticalElementRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(OpticalElement::from).collect())
    }

    fn load(conn: &mut PgConnection, id: &OpticalElementId) -> QueryResult<Self> {
        optical_elements::table
            .find(id.0)
            .select(OpticalElementRow::as_select())
            .first(conn)
            .map(OpticalElement::from)
    }

    fn insert(
        conn: &mut PgConnection,
        modified: DateTime<Utc>,
        fields: &OpticalElementFields,
    ) -> QueryResult<OpticalElementId> {
        diesel::insert_into(optical_elements::table)
            .values(&OpticalElementChanges::new(modified, fields))
            .returning(optical_elements::id)
            .get_result(conn)
            .map(OpticalElementId)
    }

    fn update(
        conn: &mut PgConnection,
        id: &OpticalElementId,
        modified: DateTime<Utc>,
        fields: &OpticalElementFields,
    ) -> QueryResult<usize> {
        diesel::update(optical_elements::table.find(id.0))
            .set(&OpticalElementChanges::new(modified, fields))
            .execute(conn)
    }

    fn remove(conn: &mut PgConnection, id: &OpticalElementId) -> QueryResult<usize> {
        diesel::delete(optical_elements::table.find(id.0)).execute(conn)
    }

    fn blockers(conn: &mut PgConnection, id: &OpticalElementId) -> QueryResult<Vec<String>> {
        let groups = optical_element_groups::table
            .filter(optical_element_groups::default_id.eq(id.0))
            .order(optical_element_groups::id)
            .select(optical_element_groups::id)
            .load::<i64>(conn)?;
        Ok(labelled("optical element group", "default", groups))
    }
}

fn replace_group_members(conn: &mut PgConnection, group: i64, members: &[OpticalElementId]) -> QueryResult<()> {
    use optical_element_group_members::dsl::*;

    diesel::delete(optical_element_group_members.filter(group_id.eq(group))).execute(conn)?;
    if !members.is_empty() {
        let rows: Vec<_> = members
            .iter()
            .map(|member| (group_id.eq(group), element_id.eq(member.0)))
            .collect();
        diesel::insert_into(optical_element_group_members)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

impl PgEntity for OpticalElementGroup {
    fn check_relations(
        conn: &mut PgConnection,
        _: Option<&OpticalElementGroupId>,
        fields: &OpticalElementGroupFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        require_ids!(conn, errors, "default", optical_elements, fields.default.iter().map(|id| id.0).collect());
        require_ids!(
            conn,
            errors,
            "optical_elements",
            optical_elements,
            fields.optical_elements.iter().map(|id| id.0).collect()
        );
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = optical_element_groups::table
            .order(optical_element_groups::id)
            .select(OpticalElementGroupRow::as_select())
            .load(conn)?;
        let mut members = group_pairs(
            optical_element_group_members::table
                .select((
                    optical_element_group_members::group_id,
                    optical_element_group_members::element_id,
                ))
                .load(conn)?,
        );
        Ok(rows
            .into_iter()
            .map(|row| {
                let elements = members.remove(&row.id).unwrap_or_default();
                row.into_entity(elements)
            })
            .collect())
    }

    fn load(conn: &mut PgConnection, id: &OpticalElementGroupId) -> QueryResult<Self> {
        let row = optical_element_groups::table
            .find(id.0)
            .select(OpticalElementGroupRow::as_select())
            .first(conn)?;
        let elements = optical_element_group_members::table
            .filter(optical_element_group_members::group_id.eq(id.0))
            .order(optical_element_group_members::element_id)
            .select(optical_element_group_members::element_id)
            .load(conn)?;
        Ok(row.into_entity(elements))
    }

    fn insert(
        conn: &mut PgConnection,
        modified: DateTime<Utc>,
        fields: &OpticalElementGroupFields,
    ) -> QueryResult<OpticalElementGroupId> {
        let id: i64 = diesel::insert_into(optical_element_groups::table)
            .values(&OpticalElementGroupChanges::new(modified, fields))
            .returning(optical_element_groups::id)
            .get_result(conn)?;
        replace_group_members(conn, id, &fields.optical_elements)?;
        Ok(OpticalElementGroupId(id))
    }

    fn update(
        conn: &mut PgConnection,
        id: &OpticalElementGroupId,
        modified: DateTime<Utc>,
        fields: &OpticalElementGroupFields,
    ) -> QueryResult<usize> {
        let updated = diesel::update(optical_element_groups::table.find(id.0))
            .set(&OpticalElementGroupChanges::new(modified, fields))
            .execute(conn)?;
        if updated > 0 {
            replace_group_members(conn, id.0, &fields.optical_elements)?;
        }
        Ok(updated)
    }

    fn remove(conn: &mut PgConnection, id: &OpticalElementGroupId) -> QueryResult<usize> {
        diesel::delete(optical_element_groups::table.find(id.0)).execute(conn)
    }
}

impl PgEntity for CameraType {
    fn check_relations(
        conn: &mut PgConnection,
        current: Option<&CameraTypeId>,
        fields: &CameraTypeFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        let matching = camera_types::table
            .filter(camera_types::name.eq(&fields.name))
            .select(camera_types::id)
            .load::<i64>(conn)?;
        if taken_by_other(&matching, current.map(|id| id.0)) {
            errors.add("name", already_exists(CameraTypeFields::NAME, "name"));
        }
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = camera_types::table
            .order(camera_types::id)
            .select(CameraTypeRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(CameraType::from).collect())
    }

    fn load(conn: &mut PgConnection, id: &CameraTypeId) -> QueryResult<Self> {
        camera_types::table
            .find(id.0)
            .select(CameraTypeRow::as_select())
            .first(conn)
            .map(CameraType::from)
    }

    fn insert(conn: &mut PgConnection, modified: DateTime<Utc>, fields: &CameraTypeFields) -> QueryResult<CameraTypeId> {
        diesel::insert_into(camera_types::table)
            .values(&CameraTypeChanges::new(modified, fields))
            .returning(camera_types::id)
            .get_result(conn)
            .map(CameraTypeId)
    }

    fn update(
        conn: &mut PgConnection,
        id: &CameraTypeId,
        modified: DateTime<Utc>,
        fields: &CameraTypeFields,
    ) -> QueryResult<usize> {
        diesel::update(camera_types::table.find(id.0))
            .set(&CameraTypeChanges::new(modified, fields))
            .execute(conn)
    }

    fn remove(conn: &mut PgConnection, id: &CameraTypeId) -> QueryResult<usize> {
        diesel::delete(camera_types::table.find(id.0)).execute(conn)
    }
}

fn replace_camera_groups(conn: &mut PgConnection, camera: i64, groups: &[OpticalElementGroupId]) -> QueryResult<()> {
    use camera_optical_element_groups::dsl::*;

    diesel::delete(camera_optical_element_groups.filter(camera_id.eq(camera))).execute(conn)?;
    if !groups.is_empty() {
        let rows: Vec<_> = groups
            .iter()
            .map(|group| (camera_id.eq(camera), group_id.eq(group.0)))
            .collect();
        diesel::insert_into(camera_optical_element_groups)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

impl PgEntity for Camera {
    fn check_relations(
        conn: &mut PgConnection,
        _: Option<&CameraId>,
        fields: &CameraFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        require_ids!(conn, errors, "camera_type", camera_types, vec![fields.camera_type.0]);
        require_ids!(
            conn,
            errors,
            "optical_element_groups",
            optical_element_groups,
            fields.optical_element_groups.iter().map(|id| id.0).collect()
        );
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = cameras::table
            .order((cameras::code, cameras::id))
            .select(CameraRow::as_select())
            .load(conn)?;
        let mut groups = group_pairs(
            camera_optical_element_groups::table
                .select((
                    camera_optical_element_groups::camera_id,
                    camera_optical_element_groups::group_id,
                ))
                .load(conn)?,
        );
        Ok(rows
            .into_iter()
            .map(|row| {
                let members = groups.remove(&row.id).unwrap_or_default();
                row.into_entity(members)
            })
            .collect())
    }

    fn load(conn: &mut PgConnection, id: &CameraId) -> QueryResult<Self> {
        let row = cameras::table
            .find(id.0)
            .select(CameraRow::as_select())
            .first(conn)?;
        let groups = camera_optical_element_groups::table
            .filter(camera_optical_element_groups::camera_id.eq(id.0))
            .order(camera_optical_element_groups::group_id)
            .select(camera_optical_element_groups::group_id)
            .load(conn)?;
        Ok(row.into_entity(groups))
    }

    fn insert(conn: &mut PgConnection, modified: DateTime<Utc>, fields: &CameraFields) -> QueryResult<CameraId> {
        let id: i64 = diesel::insert_into(cameras::table)
            .values(&CameraChanges::new(modified, fields))
            .returning(cameras::id)
            .get_result(conn)?;
        replace_camera_groups(conn, id, &fields.optical_element_groups)?;
        Ok(CameraId(id))
    }

    fn update(conn: &mut PgConnection, id: &CameraId, modified: DateTime<Utc>, fields: &CameraFields) -> QueryResult<usize> {
        let updated = diesel::update(cameras::table.find(id.0))
            .set(&CameraChanges::new(modified, fields))
            .execute(conn)?;
        if updated > 0 {
            replace_camera_groups(conn, id.0, &fields.optical_element_groups)?;
        }
        Ok(updated)
    }

    fn remove(conn: &mut PgConnection, id: &CameraId) -> QueryResult<usize> {
        diesel::delete(cameras::table.find(id.0)).execute(conn)
    }
}

impl PgEntity for InstrumentType {
    fn check_relations(
        conn: &mut PgConnection,
        current: Option<&InstrumentTypeId>,
        fields: &InstrumentTypeFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        let matching = instrument_types::table
            .filter(instrument_types::code.eq(&fields.code))
            .select(instrument_types::id)
            .load::<i64>(conn)?;
        if taken_by_other(&matching, current.map(|id| id.0)) {
            errors.add("code", already_exists(InstrumentTypeFields::NAME, "code"));
        }
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = instrument_types::table
            .order(instrument_types::id)
            .select(InstrumentTypeRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(InstrumentType::from).collect())
    }

    fn load(conn: &mut PgConnection, id: &InstrumentTypeId) -> QueryResult<Self> {
        instrument_types::table
            .find(id.0)
            .select(InstrumentTypeRow::as_select())
            .first(conn)
            .map(InstrumentType::from)
    }

    fn insert(
        conn: &mut PgConnection,
        modified: DateTime<Utc>,
        fields: &InstrumentTypeFields,
    ) -> QueryResult<InstrumentTypeId> {
        diesel::insert_into(instrument_types::table)
            .values(&InstrumentTypeChanges::new(modified, fields))
            .returning(instrument_types::id)
            .get_result(conn)
            .map(InstrumentTypeId)
    }

    fn update(
        conn: &mut PgConnection,
        id: &InstrumentTypeId,
        modified: DateTime<Utc>,
        fields: &InstrumentTypeFields,
    ) -> QueryResult<usize> {
        diesel::update(instrument_types::table.find(id.0))
            .set(&InstrumentTypeChanges::new(modified, fields))
            .execute(conn)
    }

    fn remove(conn: &mut PgConnection, id: &InstrumentTypeId) -> QueryResult<usize> {
        diesel::delete(instrument_types::table.find(id.0)).execute(conn)
    }
}

impl PgEntity for ModeType {
    fn check_relations(
        conn: &mut PgConnection,
        current: Option<&String>,
        fields: &ModeTypeFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        if current.is_none() {
            let existing = mode_types::table
                .filter(mode_types::id.eq(&fields.id))
                .count()
                .get_result::<i64>(conn)?;
            if existing > 0 {
                errors.add("id", already_exists(ModeTypeFields::NAME, "id"));
            }
        }
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = mode_types::table
            .order(mode_types::id)
            .select(ModeTypeRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(ModeType::from).collect())
    }

    fn load(conn: &mut PgConnection, id: &String) -> QueryResult<Self> {
        mode_types::table
            .find(id)
            .select(ModeTypeRow::as_select())
            .first(conn)
            .map(ModeType::from)
    }

    fn insert(conn: &mut PgConnection, modified: DateTime<Utc>, fields: &ModeTypeFields) -> QueryResult<String> {
        diesel::insert_into(mode_types::table)
            .values(&ModeTypeRow {
                id: fields.id.clone(),
                modified,
            })
            .returning(mode_types::id)
            .get_result(conn)
    }

    fn update(conn: &mut PgConnection, id: &String, modified: DateTime<Utc>, _fields: &ModeTypeFields) -> QueryResult<usize> {
        diesel::update(mode_types::table.find(id))
            .set(mode_types::modified.eq(modified))
            .execute(conn)
    }

    fn remove(conn: &mut PgConnection, id: &String) -> QueryResult<usize> {
        diesel::delete(mode_types::table.find(id)).execute(conn)
    }

    fn blockers(conn: &mut PgConnection, id: &String) -> QueryResult<Vec<String>> {
        let groups = generic_mode_groups::table
            .filter(generic_mode_groups::mode_type_id.eq(id))
            .order(generic_mode_groups::id)
            .select(generic_mode_groups::id)
            .load::<i64>(conn)?;
        Ok(labelled("generic mode group", "type", groups))
    }
}

impl PgEntity for GenericMode {
    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = generic_modes::table
            .order(generic_modes::id)
            .select(GenericModeRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(GenericMode::from).collect())
    }

    fn load(conn: &mut PgConnection, id: &GenericModeId) -> QueryResult<Self> {
        generic_modes::table
            .find(id.0)
            .select(GenericModeRow::as_select())
            .first(conn)
            .map(GenericMode::from)
    }

    fn insert(conn: &mut PgConnection, modified: DateTime<Utc>, fields: &GenericModeFields) -> QueryResult<GenericModeId> {
        diesel::insert_into(generic_modes::table)
            .values(&GenericModeChanges::new(modified, fields))
            .returning(generic_modes::id)
            .get_result(conn)
            .map(GenericModeId)
    }

    fn update(
        conn: &mut PgConnection,
        id: &GenericModeId,
        modified: DateTime<Utc>,
        fields: &GenericModeFields,
    ) -> QueryResult<usize> {
        diesel::update(generic_modes::table.find(id.0))
            .set(&GenericModeChanges::new(modified, fields))
            .execute(conn)
    }

    fn remove(conn: &mut PgConnection, id: &GenericModeId) -> QueryResult<usize> {
        diesel::delete(generic_modes::table.find(id.0)).execute(conn)
    }

    fn blockers(conn: &mut PgConnection, id: &GenericModeId) -> QueryResult<Vec<String>> {
        let groups = generic_mode_groups::table
            .filter(generic_mode_groups::default_id.eq(id.0))
            .order(generic_mode_groups::id)
            .select(generic_mode_groups::id)
            .load::<i64>(conn)?;
        Ok(labelled("generic mode group", "default", groups))
    }
}

fn replace_group_modes(conn: &mut PgConnection, group: i64, modes: &[GenericModeId]) -> QueryResult<()> {
    use generic_mode_group_modes::dsl::*;

    diesel::delete(generic_mode_group_modes.filter(group_id.eq(group))).execute(conn)?;
    if !modes.is_empty() {
        let rows: Vec<_> = modes
            .iter()
            .map(|mode| (group_id.eq(group), mode_id.eq(mode.0)))
            .collect();
        diesel::insert_into(generic_mode_group_modes)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

impl PgEntity for GenericModeGroup {
    fn check_relations(
        conn: &mut PgConnection,
        current: Option<&GenericModeGroupId>,
        fields: &GenericModeGroupFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        require_ids!(
            conn,
            errors,
            "instrument_type",
            instrument_types,
            fields.instrument_type.iter().map(|id| id.0).collect()
        );
        if let Some(mode_type) = &fields.mode_type {
            let existing = mode_types::table
                .filter(mode_types::id.eq(mode_type))
                .count()
                .get_result::<i64>(conn)?;
            if existing == 0 {
                errors.add("type", missing_pk(mode_type));
            }
        }
        require_ids!(conn, errors, "default", generic_modes, fields.default.iter().map(|id| id.0).collect());
        require_ids!(conn, errors, "modes", generic_modes, fields.modes.iter().map(|id| id.0).collect());

        if let (Some(instrument_type), Some(mode_type)) = (&fields.instrument_type, &fields.mode_type) {
            let matching = generic_mode_groups::table
                .filter(generic_mode_groups::instrument_type_id.eq(instrument_type.0))
                .filter(generic_mode_groups::mode_type_id.eq(mode_type))
                .select(generic_mode_groups::id)
                .load::<i64>(conn)?;
            if taken_by_other(&matching, current.map(|id| id.0)) {
                errors.add(NON_FIELD_ERRORS, unique_together(&["instrument_type", "type"]));
            }
        }
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = generic_mode_groups::table
            .order(generic_mode_groups::id)
            .select(GenericModeGroupRow::as_select())
            .load(conn)?;
        let mut modes = group_pairs(
            generic_mode_group_modes::table
                .select((
                    generic_mode_group_modes::group_id,
                    generic_mode_group_modes::mode_id,
                ))
                .load(conn)?,
        );
        Ok(rows
            .into_iter()
            .map(|row| {
                let members = modes.remove(&row.id).unwrap_or_default();
                row.into_entity(members)
            })
            .collect())
    }

    fn load(conn: &mut PgConnection, id: &GenericModeGroupId) -> QueryResult<Self> {
        let row = generic_mode_groups::table
            .find(id.0)
            .select(GenericModeGroupRow::as_select())
            .first(conn)?;
        let modes = generic_mode_group_modes::table
            .filter(generic_mode_group_modes::group_id.eq(id.0))
            .order(generic_mode_group_modes::mode_id)
            .select(generic_mode_group_modes::mode_id)
            .load(conn)?;
        Ok(row.into_entity(modes))
    }

    fn insert(
        conn: &mut PgConnection,
        modified: DateTime<Utc>,
        fields: &GenericModeGroupFields,
    ) -> QueryResult<GenericModeGroupId> {
        let id: i64 = diesel::insert_into(generic_mode_groups::table)
            .values(&GenericModeGroupChanges::new(modified, fields))
            .returning(generic_mode_groups::id)
            .get_result(conn)?;
        replace_group_modes(conn, id, &fields.modes)?;
        Ok(GenericModeGroupId(id))
    }

    fn update(
        conn: &mut PgConnection,
        id: &GenericModeGroupId,
        modified: DateTime<Utc>,
        fields: &GenericModeGroupFields,
    ) -> QueryResult<usize> {
        let updated = diesel::update(generic_mode_groups::table.find(id.0))
            .set(&GenericModeGroupChanges::new(modified, fields))
            .execute(conn)?;
        if updated > 0 {
            replace_group_modes(conn, id.0, &fields.modes)?;
        }
        Ok(updated)
    }

    fn remove(conn: &mut PgConnection, id: &GenericModeGroupId) -> QueryResult<usize> {
        diesel::delete(generic_mode_groups::table.find(id.0)).execute(conn)
    }
}

fn replace_science_cameras(conn: &mut PgConnection, instrument: i64, cameras: &[CameraId]) -> QueryResult<()> {
    use instrument_science_cameras::dsl::*;

    diesel::delete(instrument_science_cameras.filter(instrument_id.eq(instrument))).execute(conn)?;
    if !cameras.is_empty() {
        let rows: Vec<_> = cameras
            .iter()
            .map(|camera| (instrument_id.eq(instrument), camera_id.eq(camera.0)))
            .collect();
        diesel::insert_into(instrument_science_cameras)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

fn instrument_from_row(row: InstrumentRow, science_cameras: Vec<i64>) -> QueryResult<Instrument> {
    row.into_entity(science_cameras)
        .map_err(|e| DieselError::DeserializationError(e.into()))
}

impl PgEntity for Instrument {
    fn check_relations(
        conn: &mut PgConnection,
        _: Option<&InstrumentId>,
        fields: &InstrumentFields,
    ) -> QueryResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        require_ids!(
            conn,
            errors,
            "instrument_type",
            instrument_types,
            fields.instrument_type.iter().map(|id| id.0).collect()
        );
        require_ids!(conn, errors, "telescope", telescopes, vec![fields.telescope.0]);
        require_ids!(
            conn,
            errors,
            "science_cameras",
            cameras,
            fields.science_cameras.iter().map(|id| id.0).collect()
        );
        require_ids!(conn, errors, "autoguider_camera", cameras, vec![fields.autoguider_camera.0]);
        Ok(errors)
    }

    fn load_all(conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
        let rows = instruments::table
            .order(instruments::id)
            .select(InstrumentRow::as_select())
            .load(conn)?;
        let mut cameras = group_pairs(
            instrument_science_cameras::table
                .select((
                    instrument_science_cameras::instrument_id,
                    instrument_science_cameras::camera_id,
                ))
                .load(conn)?,
        );
        rows.into_iter()
            .map(|row| {
                let science = cameras.remove(&row.id).unwrap_or_default();
                instrument_from_row(row, science)
            })
            .collect()
    }

    fn load(conn: &mut PgConnection, id: &InstrumentId) -> QueryResult<Self> {
        let row = instruments::table
            .find(id.0)
            .select(InstrumentRow::as_select())
            .first(conn)?;
        let science = instrument_science_cameras::table
            .filter(instrument_science_cameras::instrument_id.eq(id.0))
            .order(instrument_science_cameras::camera_id)
            .select(instrument_science_cameras::camera_id)
            .load(conn)?;
        instrument_from_row(row, science)
    }

    fn insert(conn: &mut PgConnection, modified: DateTime<Utc>, fields: &InstrumentFields) -> QueryResult<InstrumentId> {
        let id: i64 = diesel::insert_into(instruments::table)
            .values(&InstrumentChanges::new(modified, fields))
            .returning(instruments::id)
            .get_result(conn)?;
        replace_science_cameras(conn, id, &fields.science_cameras)?;
        Ok(InstrumentId(id))
    }

    fn update(
        conn: &mut PgConnection,
        id: &InstrumentId,
        modified: DateTime<Utc>,
        fields: &InstrumentFields,
    ) -> QueryResult<usize> {
        let updated = diesel::update(instruments::table.find(id.0))
            .set(&InstrumentChanges::new(modified, fields))
            .execute(conn)?;
        if updated > 0 {
            replace_science_cameras(conn, id.0, &fields.science_cameras)?;
        }
        Ok(updated)
    }

    fn remove(conn: &mut PgConnection, id: &InstrumentId) -> QueryResult<usize> {
        diesel::delete(instruments::table.find(id.0)).execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_pairs_sorts_members() {
        let grouped = group_pairs(vec![(1, 5), (2, 3), (1, 2)]);
        assert_eq!(grouped[&1], vec![2, 5]);
        assert_eq!(grouped[&2], vec![3]);
    }

    #[test]
    fn test_labelled_blockers() {
        assert_eq!(
            labelled("generic mode group", "default", vec![4]),
            vec!["generic mode group 4 (default)".to_string()]
        );
    }
}
