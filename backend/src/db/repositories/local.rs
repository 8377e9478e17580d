//! In-memory local repository implementation.
//!
//! This module provides a local implementation of all repository traits
//! suitable for unit testing and local development. All data is stored in
//! memory using ordered maps, providing fast, deterministic, and isolated
//! execution.
//!
//! Every write runs under a single write guard, so validation, relation
//! checks and cascades are applied atomically: a rejected write leaves the
//! store untouched.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::repository::*;
use crate::models::*;

/// In-memory local repository.
///
/// # Example
/// ```
/// use configdb::db::repositories::LocalRepository;
/// use configdb::db::Stored;
/// use configdb::models::{Site, SiteFields};
///
/// # #[tokio::main]
/// # async fn main() {
/// let repo = LocalRepository::new();
/// let fields: SiteFields = serde_json::from_value(serde_json::json!({
///     "code": "tst", "elevation": 2200, "timezone": -7
/// })).unwrap();
///
/// let site = Site::store(&repo).create(fields).await.unwrap();
/// assert_eq!(Site::store(&repo).list().await.unwrap().len(), 1);
/// assert_eq!(site.code, "tst");
/// # }
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

/// One table: rows keyed by primary key plus the serial counter.
struct Table<E: Entity> {
    rows: BTreeMap<E::Id, E>,
    last_serial: i64,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_serial: 0,
        }
    }
}

impl<E: Entity> Table<E> {
    fn contains(&self, id: &E::Id) -> bool {
        self.rows.contains_key(id)
    }

    fn ids_where(&self, predicate: impl Fn(&E) -> bool) -> Vec<E::Id> {
        self.rows
            .values()
            .filter(|row| predicate(row))
            .map(|row| row.id().clone())
            .collect()
    }

    fn any(&self, predicate: impl Fn(&E) -> bool) -> bool {
        self.rows.values().any(predicate)
    }
}

struct LocalData {
    sites: Table<Site>,
    enclosures: Table<Enclosure>,
    telescopes: Table<Telescope>,
    optical_elements: Table<OpticalElement>,
    optical_element_groups: Table<OpticalElementGroup>,
    camera_types: Table<CameraType>,
    cameras: Table<Camera>,
    instrument_types: Table<InstrumentType>,
    mode_types: Table<ModeType>,
    generic_modes: Table<GenericMode>,
    generic_mode_groups: Table<GenericModeGroup>,
    instruments: Table<Instrument>,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            sites: Table::default(),
            enclosures: Table::default(),
            telescopes: Table::default(),
            optical_elements: Table::default(),
            optical_element_groups: Table::default(),
            camera_types: Table::default(),
            cameras: Table::default(),
            instrument_types: Table::default(),
            mode_types: Table::default(),
            generic_modes: Table::default(),
            generic_mode_groups: Table::default(),
            instruments: Table::default(),
            is_healthy: true,
        }
    }
}

fn require_row<E: Entity>(errors: &mut FieldErrors, field: &str, table: &Table<E>, id: &E::Id) {
    if !table.contains(id) {
        errors.add(field, missing_pk(id));
    }
}

fn require_rows<E: Entity>(errors: &mut FieldErrors, field: &str, table: &Table<E>, ids: &[E::Id]) {
    for id in ids {
        require_row(errors, field, table, id);
    }
}

impl LocalData {
    fn remove_site(&mut self, id: &SiteId) {
        for enclosure in self.enclosures.ids_where(|e| e.site == *id) {
            self.remove_enclosure(&enclosure);
        }
        self.sites.rows.remove(id);
    }

    fn remove_enclosure(&mut self, id: &EnclosureId) {
        for telescope in self.telescopes.ids_where(|t| t.enclosure == *id) {
            self.remove_telescope(&telescope);
        }
        self.enclosures.rows.remove(id);
    }

    fn remove_telescope(&mut self, id: &TelescopeId) {
        for instrument in self.instruments.ids_where(|i| i.telescope == *id) {
            self.remove_instrument(&instrument);
        }
        self.telescopes.rows.remove(id);
    }

    fn remove_instrument(&mut self, id: &InstrumentId) {
        self.instruments.rows.remove(id);
    }

    fn remove_optical_element(&mut self, id: &OpticalElementId) {
        for group in self.optical_element_groups.rows.values_mut() {
            group.fields.optical_elements.retain(|member| member != id);
        }
        self.optical_elements.rows.remove(id);
    }

    fn remove_optical_element_group(&mut self, id: &OpticalElementGroupId) {
        for camera in self.cameras.rows.values_mut() {
            camera.fields.optical_element_groups.retain(|group| group != id);
        }
        self.optical_element_groups.rows.remove(id);
    }

    fn remove_camera_type(&mut self, id: &CameraTypeId) {
        for camera in self.cameras.ids_where(|c| c.camera_type == *id) {
            self.remove_camera(&camera);
        }
        self.camera_types.rows.remove(id);
    }

    fn remove_camera(&mut self, id: &CameraId) {
        for instrument in self.instruments.ids_where(|i| i.autoguider_camera == *id) {
            self.remove_instrument(&instrument);
        }
        for instrument in self.instruments.rows.values_mut() {
            instrument.fields.science_cameras.retain(|camera| camera != id);
        }
        self.cameras.rows.remove(id);
    }

    fn remove_instrument_type(&mut self, id: &InstrumentTypeId) {
        for group in self
            .generic_mode_groups
            .ids_where(|g| g.instrument_type == Some(*id))
        {
            self.generic_mode_groups.rows.remove(&group);
        }
        for instrument in self.instruments.ids_where(|i| i.instrument_type == Some(*id)) {
            self.remove_instrument(&instrument);
        }
        self.instrument_types.rows.remove(id);
    }

    fn remove_generic_mode(&mut self, id: &GenericModeId) {
        for group in self.generic_mode_groups.rows.values_mut() {
            group.fields.modes.retain(|mode| mode != id);
        }
        self.generic_modes.rows.remove(id);
    }
}

/// Per-entity storage rules for the in-memory store.
trait LocalTable: Entity {
    fn table(data: &LocalData) -> &Table<Self>;
    fn table_mut(data: &mut LocalData) -> &mut Table<Self>;

    /// Uniqueness and foreign-key checks against the rest of the store.
    /// `current` is the row being updated, `None` on create.
    fn check_relations(
        _data: &LocalData,
        _current: Option<&Self::Id>,
        _fields: &Self::Fields,
    ) -> FieldErrors {
        FieldErrors::new()
    }

    /// Rows whose protected references block deleting `id`.
    fn blockers(_data: &LocalData, _id: &Self::Id) -> Vec<String> {
        Vec::new()
    }

    /// Delete the row and everything that cascades from it.
    fn remove(data: &mut LocalData, id: &Self::Id);

    /// Listing order; rows arrive in ascending id order.
    fn sort(_rows: &mut [Self]) {}
}

impl LocalTable for Site {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.sites
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.sites
    }
    fn remove(data: &mut LocalData, id: &SiteId) {
        data.remove_site(id);
    }
    fn sort(rows: &mut [Self]) {
        rows.sort_by(|a, b| a.code.cmp(&b.code));
    }
}

impl LocalTable for Enclosure {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.enclosures
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.enclosures
    }
    fn check_relations(data: &LocalData, _: Option<&EnclosureId>, fields: &EnclosureFields) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require_row(&mut errors, "site", &data.sites, &fields.site);
        errors
    }
    fn remove(data: &mut LocalData, id: &EnclosureId) {
        data.remove_enclosure(id);
    }
}

impl LocalTable for Telescope {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.telescopes
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.telescopes
    }
    fn check_relations(data: &LocalData, _: Option<&TelescopeId>, fields: &TelescopeFields) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require_row(&mut errors, "enclosure", &data.enclosures, &fields.enclosure);
        errors
    }
    fn remove(data: &mut LocalData, id: &TelescopeId) {
        data.remove_telescope(id);
    }
}

impl LocalTable for OpticalElement {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.optical_elements
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.optical_elements
    }
    fn check_relations(
        data: &LocalData,
        current: Option<&OpticalElementId>,
        fields: &OpticalElementFields,
    ) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if data
            .optical_elements
            .any(|e| Some(&e.id) != current && e.code == fields.code)
        {
            errors.add("code", already_exists(OpticalElementFields::NAME, "code"));
        }
        errors
    }
    fn blockers(data: &LocalData, id: &OpticalElementId) -> Vec<String> {
        data.optical_element_groups
            .ids_where(|g| g.default == Some(*id))
            .into_iter()
            .map(|group| format!("optical element group {} (default)", group))
            .collect()
    }
    fn remove(data: &mut LocalData, id: &OpticalElementId) {
        data.remove_optical_element(id);
    }
}

impl LocalTable for OpticalElementGroup {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.optical_element_groups
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.optical_element_groups
    }
    fn check_relations(
        data: &LocalData,
        _: Option<&OpticalElementGroupId>,
        fields: &OpticalElementGroupFields,
    ) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(default) = &fields.default {
            require_row(&mut errors, "default", &data.optical_elements, default);
        }
        require_rows(
            &mut errors,
            "optical_elements",
            &data.optical_elements,
            &fields.optical_elements,
        );
        errors
    }
    fn remove(data: &mut LocalData, id: &OpticalElementGroupId) {
        data.remove_optical_element_group(id);
    }
}

impl LocalTable for CameraType {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.camera_types
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.camera_types
    }
    fn check_relations(
        data: &LocalData,
        current: Option<&CameraTypeId>,
        fields: &CameraTypeFields,
    ) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if data
            .camera_types
            .any(|t| Some(&t.id) != current && t.name == fields.name)
        {
            errors.add("name", already_exists(CameraTypeFields::NAME, "name"));
        }
        errors
    }
    fn remove(data: &mut LocalData, id: &CameraTypeId) {
        data.remove_camera_type(id);
    }
}

impl LocalTable for Camera {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.cameras
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.cameras
    }
    fn check_relations(data: &LocalData, _: Option<&CameraId>, fields: &CameraFields) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require_row(&mut errors, "camera_type", &data.camera_types, &fields.camera_type);
        require_rows(
            &mut errors,
            "optical_element_groups",
            &data.optical_element_groups,
            &fields.optical_element_groups,
        );
        errors
    }
    fn remove(data: &mut LocalData, id: &CameraId) {
        data.remove_camera(id);
    }
    fn sort(rows: &mut [Self]) {
        rows.sort_by(|a, b| a.code.cmp(&b.code));
    }
}

impl LocalTable for InstrumentType {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.instrument_types
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.instrument_types
    }
    fn check_relations(
        data: &LocalData,
        current: Option<&InstrumentTypeId>,
        fields: &InstrumentTypeFields,
    ) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if data
            .instrument_types
            .any(|t| Some(&t.id) != current && t.code == fields.code)
        {
            errors.add("code", already_exists(InstrumentTypeFields::NAME, "code"));
        }
        errors
    }
    fn remove(data: &mut LocalData, id: &InstrumentTypeId) {
        data.remove_instrument_type(id);
    }
}

impl LocalTable for ModeType {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.mode_types
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.mode_types
    }
    fn check_relations(data: &LocalData, current: Option<&String>, fields: &ModeTypeFields) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if current.is_none() && data.mode_types.contains(&fields.id) {
            errors.add("id", already_exists(ModeTypeFields::NAME, "id"));
        }
        errors
    }
    fn blockers(data: &LocalData, id: &String) -> Vec<String> {
        data.generic_mode_groups
            .ids_where(|g| g.mode_type.as_ref() == Some(id))
            .into_iter()
            .map(|group| format!("generic mode group {} (type)", group))
            .collect()
    }
    fn remove(data: &mut LocalData, id: &String) {
        data.mode_types.rows.remove(id);
    }
}

impl LocalTable for GenericMode {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.generic_modes
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.generic_modes
    }
    fn blockers(data: &LocalData, id: &GenericModeId) -> Vec<String> {
        data.generic_mode_groups
            .ids_where(|g| g.default == Some(*id))
            .into_iter()
            .map(|group| format!("generic mode group {} (default)", group))
            .collect()
    }
    fn remove(data: &mut LocalData, id: &GenericModeId) {
        data.remove_generic_mode(id);
    }
}

impl LocalTable for GenericModeGroup {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.generic_mode_groups
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.generic_mode_groups
    }
    fn check_relations(
        data: &LocalData,
        current: Option<&GenericModeGroupId>,
        fields: &GenericModeGroupFields,
    ) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(instrument_type) = &fields.instrument_type {
            require_row(&mut errors, "instrument_type", &data.instrument_types, instrument_type);
        }
        if let Some(mode_type) = &fields.mode_type {
            require_row(&mut errors, "type", &data.mode_types, mode_type);
        }
        if let Some(default) = &fields.default {
            require_row(&mut errors, "default", &data.generic_modes, default);
        }
        require_rows(&mut errors, "modes", &data.generic_modes, &fields.modes);

        if let (Some(instrument_type), Some(mode_type)) = (&fields.instrument_type, &fields.mode_type) {
            let taken = data.generic_mode_groups.any(|g| {
                Some(&g.id) != current
                    && g.instrument_type.as_ref() == Some(instrument_type)
                    && g.mode_type.as_ref() == Some(mode_type)
            });
            if taken {
                errors.add(NON_FIELD_ERRORS, unique_together(&["instrument_type", "type"]));
            }
        }
        errors
    }
    fn remove(data: &mut LocalData, id: &GenericModeGroupId) {
        data.generic_mode_groups.rows.remove(id);
    }
}

impl LocalTable for Instrument {
    fn table(data: &LocalData) -> &Table<Self> {
        &data.instruments
    }
    fn table_mut(data: &mut LocalData) -> &mut Table<Self> {
        &mut data.instruments
    }
    fn check_relations(data: &LocalData, _: Option<&InstrumentId>, fields: &InstrumentFields) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(instrument_type) = &fields.instrument_type {
            require_row(&mut errors, "instrument_type", &data.instrument_types, instrument_type);
        }
        require_row(&mut errors, "telescope", &data.telescopes, &fields.telescope);
        require_rows(&mut errors, "science_cameras", &data.cameras, &fields.science_cameras);
        require_row(&mut errors, "autoguider_camera", &data.cameras, &fields.autoguider_camera);
        errors
    }
    fn remove(data: &mut LocalData, id: &InstrumentId) {
        data.remove_instrument(id);
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }

    fn not_found<E: Entity>(id: &E::Id) -> RepositoryError {
        RepositoryError::not_found_with_context(
            format!("{} {} not found", E::entity_name(), id),
            ErrorContext::default()
                .with_entity(E::entity_name())
                .with_entity_id(id),
        )
    }

    /// Field validation followed by relation checks against `data`.
    fn check_write<E: LocalTable>(
        data: &LocalData,
        current: Option<&E::Id>,
        fields: &E::Fields,
    ) -> Result<(), FieldErrors> {
        fields.validate()?;
        if let Some(current) = current {
            check_assigned_id::<E>(current, fields)?;
        }
        E::check_relations(data, current, fields).into_result()
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }
}

#[async_trait]
impl<E: LocalTable> EntityRepository<E> for LocalRepository {
    async fn create(&self, mut fields: E::Fields) -> RepositoryResult<E> {
        self.check_health()?;
        fields.normalize();

        let mut data = self.data.write();
        Self::check_write::<E>(&data, None, &fields).map_err(|errors| {
            RepositoryError::validation(errors)
                .with_operation("create")
                .with_entity(E::entity_name(), None)
        })?;

        let id = match E::assigned_id(&fields) {
            Some(id) => id,
            None => {
                let table = E::table_mut(&mut data);
                table.last_serial += 1;
                <E::Id as EntityId>::from_serial(table.last_serial).ok_or_else(|| {
                    RepositoryError::internal(format!(
                        "{} ids are not server-assigned",
                        E::entity_name()
                    ))
                })?
            }
        };

        let entity = E::assemble(id.clone(), next_modified(None), fields);
        E::table_mut(&mut data).rows.insert(id.clone(), entity.clone());
        log::debug!("Created {} {}", E::entity_name(), id);
        Ok(entity)
    }

    async fn get(&self, id: &E::Id) -> RepositoryResult<E> {
        self.check_health()?;
        let data = self.data.read();
        E::table(&data)
            .rows
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found::<E>(id))
    }

    async fn list(&self) -> RepositoryResult<Vec<E>> {
        self.check_health()?;
        let mut rows: Vec<E> = E::table(&self.data.read()).rows.values().cloned().collect();
        E::sort(&mut rows);
        Ok(rows)
    }

    async fn update(&self, id: &E::Id, mut fields: E::Fields) -> RepositoryResult<E> {
        self.check_health()?;
        fields.normalize();

        let mut data = self.data.write();
        let previous = E::table(&data)
            .rows
            .get(id)
            .map(|row| row.modified())
            .ok_or_else(|| Self::not_found::<E>(id))?;
        Self::check_write::<E>(&data, Some(id), &fields).map_err(|errors| {
            RepositoryError::validation(errors)
                .with_operation("update")
                .with_entity(E::entity_name(), Some(id.to_string()))
        })?;

        let entity = E::assemble(id.clone(), next_modified(Some(previous)), fields);
        E::table_mut(&mut data).rows.insert(id.clone(), entity.clone());
        log::debug!("Updated {} {}", E::entity_name(), id);
        Ok(entity)
    }

    async fn delete(&self, id: &E::Id) -> RepositoryResult<()> {
        self.check_health()?;

        let mut data = self.data.write();
        if !E::table(&data).contains(id) {
            return Err(Self::not_found::<E>(id));
        }

        let blockers = E::blockers(&data, id);
        if !blockers.is_empty() {
            return Err(RepositoryError::protected(E::entity_name(), id, &blockers));
        }

        E::remove(&mut data, id);
        log::debug!("Deleted {} {}", E::entity_name(), id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields<F: serde::de::DeserializeOwned>(value: serde_json::Value) -> F {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_serial_ids_start_at_one() {
        let repo = LocalRepository::new();
        let first = OpticalElement::store(&repo)
            .create(fields(json!({"name": "Bessell-V", "code": "V"})))
            .await
            .unwrap();
        let second = OpticalElement::store(&repo)
            .create(fields(json!({"name": "Bessell-B", "code": "B"})))
            .await
            .unwrap();
        assert_eq!(first.id, OpticalElementId::new(1));
        assert_eq!(second.id, OpticalElementId::new(2));
    }

    #[tokio::test]
    async fn test_rejected_write_leaves_store_untouched() {
        let repo = LocalRepository::new();
        let result = Enclosure::store(&repo)
            .create(fields(json!({"code": "doma", "site": 9})))
            .await;
        match result {
            Err(RepositoryError::ValidationError { fields, .. }) => assert!(fields.contains("site")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(Enclosure::store(&repo).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unhealthy_store_refuses_requests() {
        let repo = LocalRepository::new();
        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
        let err = Site::store(&repo).list().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_clear_resets_serials() {
        let repo = LocalRepository::new();
        let payload = json!({"name": "SBIG", "code": "sbig", "size": "10x10", "pscale": 0.5});
        CameraType::store(&repo).create(fields(payload.clone())).await.unwrap();
        repo.clear();
        let again = CameraType::store(&repo).create(fields(payload)).await.unwrap();
        assert_eq!(again.id, CameraTypeId::new(1));
    }

    #[tokio::test]
    async fn test_mode_type_id_is_immutable() {
        let repo = LocalRepository::new();
        let store = ModeType::store(&repo);
        store
            .create(ModeTypeFields { id: "readout".into() })
            .await
            .unwrap();
        let err = store
            .update(&"readout".to_string(), ModeTypeFields { id: "guiding".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError { .. }));
        assert!(store.get(&"readout".to_string()).await.is_ok());
    }
}
