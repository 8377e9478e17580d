//! Write rules of the in-memory repository: cascades, protected references
//! and uniqueness.

mod support;

use configdb::db::{LocalRepository, RepositoryError, Stored};
use configdb::models::{
    Camera, CameraType, Enclosure, GenericMode, GenericModeGroup, Instrument, InstrumentFields,
    InstrumentType, InstrumentTypeId, ModeType, OpticalElement, OpticalElementGroup,
    OpticalElementGroupFields, Site, SiteId, Telescope, TelescopeId,
};
use serde_json::json;
use support::{create, fields, seed_tree};

#[tokio::test]
async fn test_create_then_get_round_trips() {
    let repo = LocalRepository::new();
    let tree = seed_tree(&repo).await;

    let fetched = Telescope::store(&repo).get(&tree.telescope.id).await.unwrap();
    assert_eq!(fetched, tree.telescope);
    assert_eq!(fetched.serial_number, "");
    assert_eq!(fetched.zenith_blind_spot, 0.0);
}

#[tokio::test]
async fn test_modified_increases_on_every_write() {
    let repo = LocalRepository::new();
    let tree = seed_tree(&repo).await;
    let store = Site::store(&repo);

    let mut previous = tree.site.modified;
    for name in ["first", "second", "third"] {
        let mut changed = tree.site.fields.clone();
        changed.name = name.to_string();
        let updated = store.update(&tree.site.id, changed).await.unwrap();
        assert!(updated.modified > previous);
        previous = updated.modified;
    }
}

#[tokio::test]
async fn test_site_delete_cascades_to_instruments_but_not_cameras() {
    let repo = LocalRepository::new();
    let tree = seed_tree(&repo).await;

    Site::store(&repo).delete(&tree.site.id).await.unwrap();

    assert!(Enclosure::store(&repo).list().await.unwrap().is_empty());
    assert!(Telescope::store(&repo).list().await.unwrap().is_empty());
    assert!(Instrument::store(&repo).list().await.unwrap().is_empty());
    let cameras = Camera::store(&repo).list().await.unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].id, tree.camera.id);
}

#[tokio::test]
async fn test_camera_delete_cascades_to_guided_instruments() {
    let repo = LocalRepository::new();
    let tree = seed_tree(&repo).await;
    let spare: Camera = create(
        &repo,
        json!({"camera_type": tree.camera_type.id, "code": "spare"}),
    )
    .await;
    let other: Instrument = create(
        &repo,
        json!({
            "code": "kb02",
            "telescope": tree.telescope.id,
            "science_cameras": [tree.camera.id],
            "autoguider_camera": spare.id,
        }),
    )
    .await;

    Camera::store(&repo).delete(&tree.camera.id).await.unwrap();

    let instruments = Instrument::store(&repo).list().await.unwrap();
    assert_eq!(instruments.len(), 1);
    assert_eq!(instruments[0].id, other.id);
    assert!(instruments[0].science_cameras.is_empty());
}

#[tokio::test]
async fn test_camera_type_delete_cascades_through_cameras() {
    let repo = LocalRepository::new();
    let tree = seed_tree(&repo).await;

    CameraType::store(&repo)
        .delete(&tree.camera_type.id)
        .await
        .unwrap();

    assert!(Camera::store(&repo).list().await.unwrap().is_empty());
    assert!(Instrument::store(&repo).list().await.unwrap().is_empty());
    assert!(Telescope::store(&repo).get(&tree.telescope.id).await.is_ok());
}

#[tokio::test]
async fn test_default_optical_element_is_protected() {
    let repo = LocalRepository::new();
    let v: OpticalElement = create(&repo, json!({"name": "Bessell-V", "code": "V"})).await;
    let group: OpticalElementGroup = create(
        &repo,
        json!({"name": "wheel", "type": "filters", "default": v.id, "optical_elements": [v.id]}),
    )
    .await;

    let err = OpticalElement::store(&repo).delete(&v.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityError { .. }));
    assert!(err.to_string().contains("optical element group"));
    assert!(OpticalElement::store(&repo).get(&v.id).await.is_ok());

    let cleared = OpticalElementGroupFields {
        default: None,
        ..group.fields.clone()
    };
    OpticalElementGroup::store(&repo)
        .update(&group.id, cleared)
        .await
        .unwrap();
    OpticalElement::store(&repo).delete(&v.id).await.unwrap();

    let group = OpticalElementGroup::store(&repo).get(&group.id).await.unwrap();
    assert!(group.optical_elements.is_empty());
}

#[tokio::test]
async fn test_default_generic_mode_and_mode_type_are_protected() {
    let repo = LocalRepository::new();
    let readout: ModeType = create(&repo, json!({"id": "readout"})).await;
    let fast: GenericMode = create(&repo, json!({"name": "Fast", "code": "fast", "overhead": 1.5})).await;
    let _group: GenericModeGroup = create(
        &repo,
        json!({"type": "readout", "default": fast.id, "modes": [fast.id]}),
    )
    .await;

    let err = GenericMode::store(&repo).delete(&fast.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityError { .. }));
    let err = ModeType::store(&repo).delete(&readout.fields.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityError { .. }));
}

#[tokio::test]
async fn test_duplicate_optical_element_code_rejected() {
    let repo = LocalRepository::new();
    let _first: OpticalElement = create(&repo, json!({"name": "Bessell-V", "code": "V"})).await;

    let err = OpticalElement::store(&repo)
        .create(fields(json!({"name": "Other V", "code": "V"})))
        .await
        .unwrap_err();
    match err {
        RepositoryError::ValidationError { fields, .. } => assert!(fields.contains("code")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generic_mode_group_unique_per_instrument_type_and_type() {
    let repo = LocalRepository::new();
    let instrument_type: InstrumentType =
        create(&repo, json!({"name": "1m0-SciCam-Sinistro", "code": "1M0-SCICAM-SINISTRO"})).await;
    let _readout: ModeType = create(&repo, json!({"id": "readout"})).await;
    let _guiding: ModeType = create(&repo, json!({"id": "guiding"})).await;

    let _first: GenericModeGroup = create(
        &repo,
        json!({"instrument_type": instrument_type.id, "type": "readout"}),
    )
    .await;

    let duplicate = GenericModeGroup::store(&repo)
        .create(fields(json!({"instrument_type": instrument_type.id, "type": "readout"})))
        .await;
    assert!(matches!(duplicate, Err(RepositoryError::ValidationError { .. })));

    let different = GenericModeGroup::store(&repo)
        .create(fields(json!({"instrument_type": instrument_type.id, "type": "guiding"})))
        .await;
    assert!(different.is_ok());
}

#[tokio::test]
async fn test_instrument_type_delete_cascades() {
    let repo = LocalRepository::new();
    let tree = seed_tree(&repo).await;
    let instrument_type: InstrumentType =
        create(&repo, json!({"name": "SBIG", "code": "SBIG"})).await;
    let _group: GenericModeGroup =
        create(&repo, json!({"instrument_type": instrument_type.id})).await;
    let mut changed = tree.instrument.fields.clone();
    changed.instrument_type = Some(instrument_type.id);
    Instrument::store(&repo)
        .update(&tree.instrument.id, changed)
        .await
        .unwrap();

    InstrumentType::store(&repo)
        .delete(&instrument_type.id)
        .await
        .unwrap();

    assert!(GenericModeGroup::store(&repo).list().await.unwrap().is_empty());
    assert!(Instrument::store(&repo).list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_orders_sites_by_code() {
    let repo = LocalRepository::new();
    for code in ["ogg", "coj", "lsc"] {
        let _site: Site = create(&repo, json!({"code": code, "elevation": 0, "timezone": 0})).await;
    }
    let codes: Vec<String> = Site::store(&repo)
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|site| site.fields.code)
        .collect();
    assert_eq!(codes, vec!["coj", "lsc", "ogg"]);
}

#[tokio::test]
async fn test_many_to_many_is_a_set() {
    let repo = LocalRepository::new();
    let tree = seed_tree(&repo).await;
    let mut changed = tree.instrument.fields.clone();
    changed.science_cameras = vec![tree.camera.id, tree.camera.id];

    let updated = Instrument::store(&repo)
        .update(&tree.instrument.id, changed)
        .await
        .unwrap();
    assert_eq!(updated.science_cameras, vec![tree.camera.id]);
}

#[tokio::test]
async fn test_missing_row_is_not_found() {
    let repo = LocalRepository::new();
    let err = Site::store(&repo)
        .get(&SiteId::new(42))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[tokio::test]
async fn test_every_missing_reference_is_reported() {
    let repo = LocalRepository::new();
    let tree = seed_tree(&repo).await;
    let broken = InstrumentFields {
        telescope: TelescopeId::new(999),
        instrument_type: Some(InstrumentTypeId::new(998)),
        ..tree.instrument.fields.clone()
    };

    let err = Instrument::store(&repo)
        .update(&tree.instrument.id, broken)
        .await
        .unwrap_err();
    match err {
        RepositoryError::ValidationError { fields, .. } => {
            assert!(fields.contains("telescope"));
            assert!(fields.contains("instrument_type"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(
        Instrument::store(&repo).get(&tree.instrument.id).await.unwrap(),
        tree.instrument
    );
}
