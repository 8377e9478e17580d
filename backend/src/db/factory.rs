//! Repository factory for dependency injection.
//!
//! Builds the configured backend once at start-up; the result is handed to
//! the HTTP layer as an `Arc<dyn FullRepository>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::repo_config::RepositoryConfig;
use super::repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
use super::repositories::PostgresRepository;
use super::repository::{FullRepository, RepositoryError, RepositoryResult};
#[cfg(feature = "postgres-repo")]
use super::PostgresConfig;

/// Repository type configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RepositoryType {
    /// Postgres + Diesel implementation
    Postgres,
    /// In-memory local repository
    #[default]
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Parse repository type from string ("postgres", "pg", "local").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "local" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl TryFrom<String> for RepositoryType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepositoryType> for String {
    fn from(value: RepositoryType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => f.write_str("postgres"),
            Self::Local => f.write_str("local"),
        }
    }
}

/// Repository factory for creating repository instances.
///
/// # Example
/// ```ignore
/// use configdb::db::{RepositoryConfig, RepositoryFactory};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RepositoryConfig::from_env()?;
///     let repo = RepositoryFactory::create(&config).await?;
///     assert!(repo.health_check().await?);
///     Ok(())
/// }
/// ```
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create the repository selected by `config`.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn FullRepository>)` - Repository instance
    /// * `Err(RepositoryError)` - If the backend is unavailable or fails to start
    pub async fn create(config: &RepositoryConfig) -> RepositoryResult<Arc<dyn FullRepository>> {
        let pg_config = config.to_postgres_config()?;

        match pg_config {
            #[cfg(feature = "postgres-repo")]
            Some(pg_config) => {
                let pg = Self::create_postgres(&pg_config).await?;
                Ok(pg as Arc<dyn FullRepository>)
            }
            #[cfg(not(feature = "postgres-repo"))]
            Some(_) => Err(RepositoryError::configuration(
                "Postgres repository feature not enabled",
            )),
            None => {
                log::info!("Using in-memory {} repository", config.repository_type());
                Ok(Self::create_local())
            }
        }
    }

    /// Create a Postgres repository and run pending migrations.
    #[cfg(feature = "postgres-repo")]
    pub async fn create_postgres(
        config: &PostgresConfig,
    ) -> RepositoryResult<Arc<PostgresRepository>> {
        let config = config.clone();
        let repo = tokio::task::spawn_blocking(move || PostgresRepository::new(config))
            .await
            .map_err(|e| RepositoryError::internal(format!("Task join error: {}", e)))??;
        log::info!("Connected to Postgres repository");
        Ok(Arc::new(repo))
    }

    /// Create an in-memory local repository.
    pub fn create_local() -> Arc<dyn FullRepository> {
        Arc::new(LocalRepository::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_type_from_str() {
        assert_eq!(
            RepositoryType::from_str("local").unwrap(),
            RepositoryType::Local
        );
        assert_eq!(
            RepositoryType::from_str("postgres").unwrap(),
            RepositoryType::Postgres
        );
        assert_eq!(
            RepositoryType::from_str("Pg").unwrap(),
            RepositoryType::Postgres
        );
        assert!(RepositoryType::from_str("invalid").is_err());
    }

    #[test]
    fn test_repository_type_display_round_trips() {
        for repo_type in [RepositoryType::Local, RepositoryType::Postgres] {
            assert_eq!(repo_type.to_string().parse::<RepositoryType>(), Ok(repo_type));
        }
    }

    #[tokio::test]
    async fn test_create_local_repository() {
        let repo = RepositoryFactory::create_local();
        assert!(repo.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_from_default_config() {
        let repo = RepositoryFactory::create(&RepositoryConfig::default())
            .await
            .unwrap();
        assert!(repo.health_check().await.unwrap());
    }
}
