//! Data Transfer Objects for the HTTP API.
//!
//! Entity read shapes live in [`crate::api`]; this module holds the
//! service-level request and response types.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status ("ok" or "degraded")
    pub status: String,
    /// API version
    pub version: String,
    /// Repository connectivity ("connected", "disconnected" or "error: ...")
    pub database: String,
}

/// Query string of a list request, in the order given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ListQuery(pub Vec<(String, String)>);

impl ListQuery {
    /// First value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_first_value_wins() {
        let query = ListQuery(vec![
            ("code".to_string(), "a".to_string()),
            ("code".to_string(), "b".to_string()),
        ]);
        assert_eq!(query.get("code"), Some("a"));
        assert_eq!(query.get("limit"), None);
    }
}
