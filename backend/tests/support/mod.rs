#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use configdb::db::{FullRepository, Stored};
use configdb::models::{
    Camera, CameraType, Enclosure, Entity, Instrument, Site, Telescope,
};
use serde_json::{json, Value};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

/// Argon2id hash with minimal cost parameters, cheap enough for tests.
pub fn light_password_hash(password: &str) -> String {
    use argon2::password_hash::{PasswordHasher, SaltString};
    use argon2::{Algorithm, Argon2, Params, Version};

    let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
    let salt = SaltString::encode_b64(b"configdb-salt").unwrap();
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

/// Decode a JSON literal into a fields payload.
pub fn fields<F: serde::de::DeserializeOwned>(value: Value) -> F {
    serde_json::from_value(value).expect("test payload should decode")
}

/// Create a row from a JSON payload.
pub async fn create<E: Stored>(repo: &dyn FullRepository, payload: Value) -> E {
    E::store(repo)
        .create(fields(payload))
        .await
        .unwrap_or_else(|e| panic!("failed to create {}: {}", E::entity_name(), e))
}

/// Site ABC, enclosure dome1, telescope 1m, and instrument kb01 with one
/// camera serving as both science camera and autoguider.
pub struct Tree {
    pub site: Site,
    pub enclosure: Enclosure,
    pub telescope: Telescope,
    pub camera_type: CameraType,
    pub camera: Camera,
    pub instrument: Instrument,
}

pub async fn seed_tree(repo: &dyn FullRepository) -> Tree {
    let site: Site = create(
        repo,
        json!({"code": "ABC", "name": "Test Site", "elevation": 2200, "timezone": -7}),
    )
    .await;
    let enclosure: Enclosure = create(repo, json!({"code": "dome1", "site": site.id})).await;
    let telescope: Telescope = create(
        repo,
        json!({
            "code": "1m",
            "lat": 30.68,
            "long": -104.01,
            "horizon": 15.0,
            "ha_limit_neg": -4.6,
            "ha_limit_pos": 4.6,
            "enclosure": enclosure.id,
        }),
    )
    .await;
    let camera_type: CameraType = create(
        repo,
        json!({"name": "SBIG 6303", "code": "sbig", "size": "15x10", "pscale": 0.57}),
    )
    .await;
    let camera: Camera = create(
        repo,
        json!({"camera_type": camera_type.id, "code": "kb01cam"}),
    )
    .await;
    let instrument: Instrument = create(
        repo,
        json!({
            "code": "kb01",
            "telescope": telescope.id,
            "science_cameras": [camera.id],
            "autoguider_camera": camera.id,
        }),
    )
    .await;

    Tree {
        site,
        enclosure,
        telescope,
        camera_type,
        camera,
        instrument,
    }
}
