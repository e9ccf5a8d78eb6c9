//! MongoDB connection configuration.

use mongodb::options::ClientOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docmapper_core::error::{DocumentStoreError, DocumentStoreResult};

/// Connection settings for [`MongoDbStore`](crate::MongoDbStore).
///
/// Deserializable so it can live in an application's configuration file:
///
/// ```toml
/// uri = "mongodb://localhost:27017"
/// database = "blog"
/// max_pool_size = 20
/// connect_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    pub uri: String,
    pub database: String,
    /// Application name reported to the server.
    pub app_name: Option<String>,
    pub min_pool_size: Option<u32>,
    pub max_pool_size: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: String::new(),
            app_name: Some("docmapper".to_string()),
            min_pool_size: None,
            max_pool_size: Some(10),
            connect_timeout_ms: Some(10_000),
            server_selection_timeout_ms: Some(30_000),
        }
    }
}

impl MongoDbConfig {
    pub fn from_uri(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn builder() -> MongoDbConfigBuilder {
        MongoDbConfigBuilder::default()
    }

    /// Parses the URI and overlays the explicit settings.
    pub async fn to_client_options(&self) -> DocumentStoreResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| DocumentStoreError::Initialization(format!("failed to parse URI: {e}")))?;

        if let Some(app_name) = &self.app_name {
            options.app_name = Some(app_name.clone());
        }
        if let Some(min_pool_size) = self.min_pool_size {
            options.min_pool_size = Some(min_pool_size);
        }
        if let Some(max_pool_size) = self.max_pool_size {
            options.max_pool_size = Some(max_pool_size);
        }
        if let Some(ms) = self.connect_timeout_ms {
            options.connect_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = self.server_selection_timeout_ms {
            options.server_selection_timeout = Some(Duration::from_millis(ms));
        }

        Ok(options)
    }
}

#[derive(Debug, Default)]
pub struct MongoDbConfigBuilder {
    config: MongoDbConfig,
}

impl MongoDbConfigBuilder {
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.config.uri = uri.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.config.app_name = Some(app_name.into());
        self
    }

    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.config.min_pool_size = Some(size);
        self
    }

    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.config.max_pool_size = Some(size);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.config.server_selection_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// # Errors
    ///
    /// [`DocumentStoreError::Initialization`] when no database name was given.
    pub fn build(self) -> DocumentStoreResult<MongoDbConfig> {
        if self.config.database.is_empty() {
            return Err(DocumentStoreError::Initialization("database name is required".to_string()));
        }

        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_overrides_defaults() {
        let config = MongoDbConfig::builder()
            .uri("mongodb://db:27017")
            .database("blog")
            .max_pool_size(20)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        assert_eq!(config.uri, "mongodb://db:27017");
        assert_eq!(config.database, "blog");
        assert_eq!(config.max_pool_size, Some(20));
        assert_eq!(config.connect_timeout_ms, Some(2_000));
        assert_eq!(config.app_name.as_deref(), Some("docmapper"));
    }

    #[test]
    fn builder_requires_database() {
        assert!(matches!(
            MongoDbConfig::builder().build(),
            Err(DocumentStoreError::Initialization(_))
        ));
    }

    #[test]
    fn deserializes_partial_config() {
        let config: MongoDbConfig =
            serde_json::from_str(r#"{ "database": "blog", "max_pool_size": 4 }"#).unwrap();

        assert_eq!(config.database, "blog");
        assert_eq!(config.max_pool_size, Some(4));
        assert_eq!(config.uri, "mongodb://localhost:27017");
    }
}
