//! Engine configuration.
//!
//! [`StoreConfig`] can be built in code with [`StoreConfig::builder`] or loaded from TOML:
//!
//! ```toml
//! default_page_size = 20
//! max_page_size = 200
//! tags_field = "tags"
//!
//! [audit_namespace]
//! database = "system"
//! collection = "data_action_log"
//! ```
//!
//! Every key is optional; missing keys take the values of [`StoreConfig::default`].

use serde::{Deserialize, Serialize};

use crate::{backend::Namespace, error::DocumentStoreResult};

/// Tunables for listing, tag filtering and the system namespaces the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Page size used when a list request does not name one.
    pub default_page_size: usize,
    /// Upper bound for requested page sizes; larger requests are clamped.
    pub max_page_size: usize,
    /// Document field that holds tags.
    pub tags_field: String,
    /// Where audit entries are appended.
    pub audit_namespace: Namespace,
    /// Where collection descriptors are kept (for stored catalogs).
    pub catalog_namespace: Namespace,
    /// Where database descriptors are kept (for stored catalogs).
    pub database_namespace: Namespace,
    /// Where schemas are kept (for stored schema providers).
    pub schema_namespace: Namespace,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            tags_field: "tags".to_string(),
            audit_namespace: Namespace::new("system", "data_action_log"),
            catalog_namespace: Namespace::new("system", "collections"),
            database_namespace: Namespace::new("system", "databases"),
            schema_namespace: Namespace::new("system", "schemas"),
        }
    }
}

impl StoreConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`](crate::error::DocumentStoreError::Initialization)
    /// when the text is not valid TOML or has mistyped keys.
    pub fn from_toml_str(text: &str) -> DocumentStoreResult<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Sets the default page size.
    pub fn with_default_page_size(mut self, size: usize) -> Self {
        self.config.default_page_size = size;
        self
    }

    /// Sets the maximum page size.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.config.max_page_size = size;
        self
    }

    /// Sets the tag field name.
    pub fn with_tags_field(mut self, field: impl Into<String>) -> Self {
        self.config.tags_field = field.into();
        self
    }

    /// Sets the audit namespace.
    pub fn with_audit_namespace(mut self, namespace: Namespace) -> Self {
        self.config.audit_namespace = namespace;
        self
    }

    /// Sets the collection catalog namespace.
    pub fn with_catalog_namespace(mut self, namespace: Namespace) -> Self {
        self.config.catalog_namespace = namespace;
        self
    }

    /// Sets the database catalog namespace.
    pub fn with_database_namespace(mut self, namespace: Namespace) -> Self {
        self.config.database_namespace = namespace;
        self
    }

    /// Sets the schema namespace.
    pub fn with_schema_namespace(mut self, namespace: Namespace) -> Self {
        self.config.schema_namespace = namespace;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> StoreConfig {
        self.config
    }
}
