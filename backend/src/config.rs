//! Application configuration.
//!
//! [`AppConfig`] is built once at start-up and handed to the router; nothing
//! reads the environment after that. It comes either from a TOML file:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! page_size = 1000
//!
//! [auth]
//! tokens = ["3f9c2d"]
//!
//! [auth.users]
//! # configdb-server hash-password
//! admin = "$argon2id$v=19$m=19456,t=2,p=1$..."
//!
//! [repository]
//! type = "local"
//! ```
//!
//! or from environment variables (see [`AppConfig::from_env`]).

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::db::repo_config::RepositoryConfig;
use crate::db::repository::RepositoryError;
use subtle::{Choice, ConstantTimeEq};

/// Errors raised while building the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Failed to hash password: {0}")]
    PasswordHash(String),
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(flatten)]
    pub repository: RepositoryConfig,
}

/// Listener and list-pagination settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default `limit` of a list request.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Upper bound on a requested `limit`.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_page_size() -> usize {
    1000
}

fn default_max_page_size() -> usize {
    10000
}

/// Credentials accepted for write requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Bearer tokens.
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Basic-auth username to argon2 password hash (PHC string).
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

impl AuthSettings {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.users.is_empty()
    }

    /// Whether `token` is a configured bearer token. Every configured token
    /// is compared, each in constant time.
    pub fn accepts_token(&self, token: &str) -> bool {
        self.tokens
            .iter()
            .fold(Choice::from(0), |found, known| {
                found | known.as_bytes().ct_eq(token.as_bytes())
            })
            .into()
    }

    /// Whether `password` matches the stored hash of `user`.
    pub fn verify_user(&self, user: &str, password: &str) -> bool {
        let Some(stored) = self.users.get(user) else {
            return false;
        };
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// Hash a password with argon2id for the `[auth.users]` table.
pub fn hash_password(password: &str) -> Result<String, ConfigError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::PasswordHash(e.to_string()))
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn split_list(value: &str, separator: char) -> impl Iterator<Item = &str> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the environment.
    ///
    /// # Environment Variables
    /// - `HOST`: Bind address (default: 0.0.0.0)
    /// - `PORT`: Bind port (default: 8080)
    /// - `PAGE_SIZE`: Default list page size (default: 1000)
    /// - `MAX_PAGE_SIZE`: Largest accepted `limit` (default: 10000)
    /// - `API_TOKENS`: Comma-separated bearer tokens
    /// - `BASIC_AUTH_USERS`: Semicolon-separated `user:hash` pairs, where
    ///   `hash` is an argon2 PHC string (see [`hash_password`])
    /// - `REPOSITORY_TYPE`, `DATABASE_URL`, `PG_*`: see
    ///   [`RepositoryConfig::from_env`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = ServerSettings {
            host: std::env::var("HOST").unwrap_or_else(|_| default_host()),
            port: env_parse("PORT", default_port())?,
            page_size: env_parse("PAGE_SIZE", default_page_size())?,
            max_page_size: env_parse("MAX_PAGE_SIZE", default_max_page_size())?,
        };

        let tokens: Vec<String> = std::env::var("API_TOKENS")
            .map(|value| split_list(&value, ',').map(str::to_string).collect())
            .unwrap_or_default();

        let mut users = BTreeMap::new();
        if let Ok(value) = std::env::var("BASIC_AUTH_USERS") {
            for pair in split_list(&value, ';') {
                let (user, hash) = pair
                    .split_once(':')
                    .filter(|(user, _)| !user.is_empty())
                    .ok_or_else(|| ConfigError::InvalidValue {
                        name: "BASIC_AUTH_USERS".to_string(),
                        value: pair.to_string(),
                    })?;
                users.insert(user.to_string(), hash.to_string());
            }
        }

        let config = Self {
            server,
            auth: AuthSettings { tokens, users },
            repository: RepositoryConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "page_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.server.max_page_size < self.server.page_size {
            return Err(ConfigError::InvalidValue {
                name: "max_page_size".to_string(),
                value: self.server.max_page_size.to_string(),
            });
        }
        for (user, stored) in &self.auth.users {
            if PasswordHash::new(stored).is_err() {
                return Err(ConfigError::InvalidValue {
                    name: format!("password of user {}", user),
                    value: "not an argon2 password hash".to_string(),
                });
            }
        }
        Ok(())
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RepositoryType;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.page_size, 1000);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.auth.is_empty());
        assert_eq!(config.repository.repository_type(), RepositoryType::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_reads_all_sections() {
        let hash = hash_password("secret").unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000
page_size = 50

[auth]
tokens = ["abc"]

[auth.users]
admin = "{}"

[repository]
type = "local"
"#,
            hash
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.page_size, 50);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.tokens, vec!["abc".to_string()]);
        assert!(config.auth.verify_user("admin", "secret"));
        assert!(!config.auth.verify_user("admin", "Secret"));
        assert_eq!(config.repository.repository_type(), RepositoryType::Local);
    }

    #[test]
    fn test_plaintext_password_rejected() {
        let mut config = AppConfig::default();
        config
            .auth
            .users
            .insert("admin".to_string(), "secret".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_tokens_compared_exactly() {
        let auth = AuthSettings {
            tokens: vec!["abc123".to_string(), "def456".to_string()],
            users: BTreeMap::new(),
        };
        assert!(auth.accepts_token("def456"));
        assert!(!auth.accepts_token("abc12"));
        assert!(!auth.accepts_token("abc1234"));
        assert!(!auth.accepts_token(""));
        assert!(!AuthSettings::default().accepts_token("abc123"));
    }

    #[test]
    fn test_from_file_missing() {
        let result = AppConfig::from_file("/nonexistent/configdb.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = AppConfig::default();
        config.server.max_page_size = 10;
        assert!(config.validate().is_err());
        config.server.page_size = 0;
        assert!(config.validate().is_err());
    }
}
