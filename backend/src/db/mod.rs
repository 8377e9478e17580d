//! Database module for hardware configuration storage.
//!
//! This module provides abstractions for database operations via the Repository pattern,
//! allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP layer (axum handlers)                             │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  api::Catalog / api::resources - nested read views      │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────────────────┐
//!     │  LocalRepository     PostgresRepository   │
//!     │  (in-memory)         (Diesel, feature     │
//!     │                       `postgres-repo`)    │
//!     └──────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use configdb::db::{RepositoryConfig, RepositoryFactory, Stored};
//! use configdb::models::Site;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::create(&RepositoryConfig::from_env()?).await?;
//!     let sites = Site::store(repo.as_ref()).list().await?;
//!     Ok(())
//! }
//! ```
//!
//! The repository is created once at start-up and passed explicitly to the
//! components that need it; there is no process-wide instance.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

pub use factory::{RepositoryFactory, RepositoryType};
pub use repo_config::{PostgresSettings, RepositoryConfig, RepositorySettings};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    EntityRepository, ErrorContext, FullRepository, HealthRepository, RepositoryError,
    RepositoryResult, Stored,
};
