//! Write rules of the Postgres repository against a live database.
//!
//! Set `CONFIGDB_TEST_DATABASE_URL` to a scratch database to run these; every
//! test truncates all tables first. Without it the tests return early.

#![cfg(feature = "postgres-repo")]

mod support;

use std::sync::Arc;

use diesel::pg::PgConnection;
use diesel::{Connection, RunQueryDsl};
use serde_json::json;
use tokio::sync::{Mutex, MutexGuard};

use configdb::db::{
    HealthRepository, PostgresConfig, PostgresRepository, RepositoryError, RepositoryFactory,
    Stored,
};
use configdb::models::{
    Camera, Enclosure, GenericMode, GenericModeGroup, Instrument, InstrumentFields,
    InstrumentTypeId, ModeType, OpticalElement, OpticalElementGroup, OpticalElementGroupFields,
    Site, Telescope, TelescopeId,
};
use support::{create, fields, seed_tree};

static DB_LOCK: Mutex<()> = Mutex::const_new(());

const TABLES: &str = "instrument_science_cameras, instruments, generic_mode_group_modes, \
     generic_mode_groups, generic_modes, mode_types, instrument_types, \
     camera_optical_element_groups, cameras, camera_types, optical_element_group_members, \
     optical_element_groups, optical_elements, telescopes, enclosures, sites";

/// A migrated, emptied repository, or `None` when no test database is set.
async fn fresh_repository() -> Option<(MutexGuard<'static, ()>, Arc<PostgresRepository>)> {
    let url = match std::env::var("CONFIGDB_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("CONFIGDB_TEST_DATABASE_URL not set; skipping");
            return None;
        }
    };
    let guard = DB_LOCK.lock().await;
    let repo = RepositoryFactory::create_postgres(&PostgresConfig::with_url(url.clone()))
        .await
        .expect("test database should accept connections");

    let mut conn = PgConnection::establish(&url).expect("direct connection");
    diesel::sql_query(format!("TRUNCATE {} RESTART IDENTITY CASCADE", TABLES))
        .execute(&mut conn)
        .expect("truncate");

    Some((guard, repo))
}

fn field_errors(err: RepositoryError) -> configdb::models::FieldErrors {
    match err {
        RepositoryError::ValidationError { fields, .. } => fields,
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_health_check_and_round_trip() {
    let Some((_guard, repo)) = fresh_repository().await else {
        return;
    };
    assert!(repo.health_check().await.unwrap());

    let tree = seed_tree(repo.as_ref()).await;
    let fetched = Telescope::store(repo.as_ref()).get(&tree.telescope.id).await.unwrap();
    assert_eq!(fetched.code, "1m");
    assert_eq!(fetched.enclosure, tree.enclosure.id);

    let instrument = Instrument::store(repo.as_ref()).get(&tree.instrument.id).await.unwrap();
    assert_eq!(instrument.science_cameras, vec![tree.camera.id]);
}

#[tokio::test]
async fn test_site_delete_cascades_through_foreign_keys() {
    let Some((_guard, repo)) = fresh_repository().await else {
        return;
    };
    let tree = seed_tree(repo.as_ref()).await;

    Site::store(repo.as_ref()).delete(&tree.site.id).await.unwrap();

    assert!(Enclosure::store(repo.as_ref()).list().await.unwrap().is_empty());
    assert!(Telescope::store(repo.as_ref()).list().await.unwrap().is_empty());
    assert!(Instrument::store(repo.as_ref()).list().await.unwrap().is_empty());
    assert_eq!(Camera::store(repo.as_ref()).list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_protected_default_names_blocking_group() {
    let Some((_guard, repo)) = fresh_repository().await else {
        return;
    };
    let v: OpticalElement = create(repo.as_ref(), json!({"name": "Bessell-V", "code": "V"})).await;
    let group: OpticalElementGroup = create(
        repo.as_ref(),
        json!({"name": "wheel", "type": "filters", "default": v.id, "optical_elements": [v.id]}),
    )
    .await;

    let err = OpticalElement::store(repo.as_ref()).delete(&v.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityError { .. }));
    assert!(err.to_string().contains(&format!("optical element group {} (default)", group.id)));

    let cleared = OpticalElementGroupFields {
        default: None,
        ..group.fields.clone()
    };
    OpticalElementGroup::store(repo.as_ref())
        .update(&group.id, cleared)
        .await
        .unwrap();
    OpticalElement::store(repo.as_ref()).delete(&v.id).await.unwrap();

    let group = OpticalElementGroup::store(repo.as_ref()).get(&group.id).await.unwrap();
    assert!(group.optical_elements.is_empty());
}

#[tokio::test]
async fn test_mode_type_in_use_is_protected() {
    let Some((_guard, repo)) = fresh_repository().await else {
        return;
    };
    let readout: ModeType = create(repo.as_ref(), json!({"id": "readout"})).await;
    let fast: GenericMode =
        create(repo.as_ref(), json!({"name": "Fast", "code": "fast", "overhead": 1.5})).await;
    let _group: GenericModeGroup = create(
        repo.as_ref(),
        json!({"type": "readout", "default": fast.id, "modes": [fast.id]}),
    )
    .await;

    let err = ModeType::store(repo.as_ref())
        .delete(&readout.fields.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityError { .. }));
    let err = GenericMode::store(repo.as_ref()).delete(&fast.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityError { .. }));
}

#[tokio::test]
async fn test_uniqueness_reported_as_field_errors() {
    let Some((_guard, repo)) = fresh_repository().await else {
        return;
    };
    let _v: OpticalElement = create(repo.as_ref(), json!({"name": "Bessell-V", "code": "V"})).await;
    let err = OpticalElement::store(repo.as_ref())
        .create(fields(json!({"name": "Other V", "code": "V"})))
        .await
        .unwrap_err();
    assert_eq!(
        field_errors(err).get("code").unwrap()[0],
        "optical element with this code already exists."
    );

    let _readout: ModeType = create(repo.as_ref(), json!({"id": "readout"})).await;
    let group = json!({"type": "readout", "instrument_type": null});
    let _first: GenericModeGroup = create(repo.as_ref(), group.clone()).await;
    // Uniqueness only applies once both columns are set.
    let _second: GenericModeGroup = create(repo.as_ref(), group).await;
}

#[tokio::test]
async fn test_every_missing_reference_is_reported() {
    let Some((_guard, repo)) = fresh_repository().await else {
        return;
    };
    let tree = seed_tree(repo.as_ref()).await;
    let broken = InstrumentFields {
        telescope: TelescopeId::new(999),
        instrument_type: Some(InstrumentTypeId::new(998)),
        ..tree.instrument.fields.clone()
    };

    let err = Instrument::store(repo.as_ref())
        .update(&tree.instrument.id, broken)
        .await
        .unwrap_err();
    let errors = field_errors(err);
    assert_eq!(errors.get("telescope").unwrap()[0], "Invalid pk \"999\" - object does not exist.");
    assert_eq!(
        errors.get("instrument_type").unwrap()[0],
        "Invalid pk \"998\" - object does not exist."
    );

    let unchanged = Instrument::store(repo.as_ref()).get(&tree.instrument.id).await.unwrap();
    assert_eq!(unchanged, tree.instrument);
}
