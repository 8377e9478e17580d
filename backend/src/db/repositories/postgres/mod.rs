//! Postgres repository implementation using Diesel.
//!
//! This module implements the repository traits against a Postgres database
//! following the schema in `migrations/`. Each write runs in one transaction:
//! relation checks first, then the statement. Cascades and protected
//! references are enforced by the foreign keys.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! [`PostgresConfig`] is built from `RepositoryConfig`, which reads the
//! `[postgres]` TOML section or the `DATABASE_URL` / `PG_*` environment
//! variables.

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use tokio::task;

use crate::db::repository::{
    EntityRepository, ErrorContext, HealthRepository, RepositoryError, RepositoryResult,
};
use crate::models::{
    already_exists, check_assigned_id, missing_pk, next_modified, unique_together, Entity,
    EntityFields, FieldErrors, Validate, NON_FIELD_ERRORS,
};

mod models;
mod schema;
mod tables;

use tables::PgEntity;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres.
///
/// Pooled connections, retry of transient failures and embedded schema
/// migrations applied at construction.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    ///
    /// # Arguments
    /// * `config` - Database configuration
    ///
    /// # Returns
    /// * `Ok(PostgresRepository)` on success
    /// * `Err(RepositoryError)` if connection or migration fails
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true) // Validate connections before use
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        // Run migrations once during initialization
        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self { pool, config })
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// This method will retry the operation up to `max_retries` times if a
    /// retryable error occurs (connection errors, timeouts, serialization failures).
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    log::warn!("Retrying database operation (attempt {})", attempt + 1);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2; // Exponential backoff
                }

                // Get connection
                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        return Err(err);
                    }
                };

                // Execute the operation
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }
}

/// Payload field for each named constraint in the migration.
fn constraint_field(constraint: &str) -> Option<&'static str> {
    let field = match constraint {
        "enclosures_site_id_fkey" => "site",
        "telescopes_enclosure_id_fkey" => "enclosure",
        "optical_elements_code_key" => "code",
        "optical_element_groups_default_id_fkey" => "default",
        "optical_element_group_members_element_id_fkey" => "optical_elements",
        "camera_types_name_key" => "name",
        "cameras_camera_type_id_fkey" => "camera_type",
        "camera_optical_element_groups_group_id_fkey" => "optical_element_groups",
        "instrument_types_code_key" => "code",
        "mode_types_pkey" => "id",
        "generic_mode_groups_instrument_type_id_fkey" => "instrument_type",
        "generic_mode_groups_mode_type_id_fkey" => "type",
        "generic_mode_groups_default_id_fkey" => "default",
        "generic_mode_group_modes_mode_id_fkey" => "modes",
        "generic_mode_groups_instrument_type_mode_type_key" => NON_FIELD_ERRORS,
        "instruments_instrument_type_id_fkey" => "instrument_type",
        "instruments_telescope_id_fkey" => "telescope",
        "instruments_autoguider_camera_id_fkey" => "autoguider_camera",
        "instrument_science_cameras_camera_id_fkey" => "science_cameras",
        _ => return None,
    };
    Some(field)
}

/// The offending value from a Postgres key violation detail, e.g.
/// `Key (site_id)=(9) is not present in table "sites".` yields `9`.
fn key_value(details: &str) -> Option<&str> {
    let start = details.find(")=(")? + 3;
    let end = start + details[start..].find(')')?;
    Some(&details[start..end])
}

fn map_diesel_error(err: DieselError) -> RepositoryError {
    RepositoryError::from(err)
}

fn map_read_error<E: Entity>(err: DieselError, id: &E::Id) -> RepositoryError {
    match err {
        DieselError::NotFound => RepositoryError::not_found_with_context(
            format!("{} {} not found", E::entity_name(), id),
            ErrorContext::default()
                .with_entity(E::entity_name())
                .with_entity_id(id),
        ),
        other => map_diesel_error(other).with_entity(E::entity_name(), Some(id.to_string())),
    }
}

/// A constraint violation that slipped past `check_relations` (a concurrent
/// write) becomes a field error on the offending field.
fn map_write_error<E: Entity>(err: DieselError) -> RepositoryError {
    let field_error = match &err {
        DieselError::DatabaseError(kind, info) => info
            .constraint_name()
            .and_then(constraint_field)
            .and_then(|field| {
                let message = match kind {
                    DatabaseErrorKind::UniqueViolation if field == NON_FIELD_ERRORS => {
                        unique_together(&["instrument_type", "type"])
                    }
                    DatabaseErrorKind::UniqueViolation => already_exists(E::entity_name(), field),
                    DatabaseErrorKind::ForeignKeyViolation => {
                        missing_pk(info.details().and_then(key_value).unwrap_or_default())
                    }
                    _ => return None,
                };
                Some((field, message))
            }),
        _ => None,
    };
    match field_error {
        Some((field, message)) => {
            RepositoryError::validation(FieldErrors::single(field, message))
                .with_entity(E::entity_name(), None)
        }
        None => map_diesel_error(err).with_entity(E::entity_name(), None),
    }
}

/// A foreign-key violation on delete means a protected reference appeared
/// after the blocker check.
fn map_delete_error<E: Entity>(err: DieselError, id: &E::Id) -> RepositoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            RepositoryError::protected(
                E::entity_name(),
                id,
                &[info.table_name().unwrap_or("unknown table").to_string()],
            )
        }
        other => map_diesel_error(other).with_entity(E::entity_name(), Some(id.to_string())),
    }
}

#[async_trait]
impl HealthRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }
}

#[async_trait]
impl<E: PgEntity> EntityRepository<E> for PostgresRepository {
    async fn create(&self, mut fields: E::Fields) -> RepositoryResult<E> {
        fields.normalize();
        fields.validate().map_err(|errors| {
            RepositoryError::validation(errors)
                .with_operation("create")
                .with_entity(E::entity_name(), None)
        })?;

        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let errors = E::check_relations(tx, None, &fields).map_err(map_diesel_error)?;
                if !errors.is_empty() {
                    return Err(RepositoryError::validation(errors)
                        .with_operation("create")
                        .with_entity(E::entity_name(), None));
                }
                let modified = next_modified(None);
                let id = E::insert(tx, modified, &fields)
                    .map_err(|e| map_write_error::<E>(e).with_operation("create"))?;
                log::debug!("Created {} {}", E::entity_name(), id);
                Ok(E::assemble(id, modified, fields.clone()))
            })
        })
        .await
    }

    async fn get(&self, id: &E::Id) -> RepositoryResult<E> {
        let id = id.clone();
        self.with_conn(move |conn| E::load(conn, &id).map_err(|e| map_read_error::<E>(e, &id)))
            .await
    }

    async fn list(&self) -> RepositoryResult<Vec<E>> {
        self.with_conn(|conn| {
            conn.transaction(|tx| {
                E::load_all(tx)
                    .map_err(|e| map_diesel_error(e).with_entity(E::entity_name(), None))
            })
        })
        .await
    }

    async fn update(&self, id: &E::Id, mut fields: E::Fields) -> RepositoryResult<E> {
        fields.normalize();
        fields
            .validate()
            .and_then(|()| check_assigned_id::<E>(id, &fields))
            .map_err(|errors| {
                RepositoryError::validation(errors)
                    .with_operation("update")
                    .with_entity(E::entity_name(), Some(id.to_string()))
            })?;

        let id = id.clone();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let previous = E::load(tx, &id).map_err(|e| map_read_error::<E>(e, &id))?;
                let errors = E::check_relations(tx, Some(&id), &fields).map_err(map_diesel_error)?;
                if !errors.is_empty() {
                    return Err(RepositoryError::validation(errors)
                        .with_operation("update")
                        .with_entity(E::entity_name(), Some(id.to_string())));
                }
                let modified = next_modified(Some(previous.modified()));
                E::update(tx, &id, modified, &fields)
                    .map_err(|e| map_write_error::<E>(e).with_operation("update"))?;
                log::debug!("Updated {} {}", E::entity_name(), id);
                Ok(E::assemble(id.clone(), modified, fields.clone()))
            })
        })
        .await
    }

    async fn delete(&self, id: &E::Id) -> RepositoryResult<()> {
        let id = id.clone();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let blockers = E::blockers(tx, &id).map_err(map_diesel_error)?;
                if !blockers.is_empty() {
                    return Err(RepositoryError::protected(E::entity_name(), &id, &blockers));
                }
                let removed = E::remove(tx, &id).map_err(|e| map_delete_error::<E>(e, &id))?;
                if removed == 0 {
                    return Err(map_read_error::<E>(DieselError::NotFound, &id));
                }
                log::debug!("Deleted {} {}", E::entity_name(), id);
                Ok(())
            })
        })
        .await
    }
}
