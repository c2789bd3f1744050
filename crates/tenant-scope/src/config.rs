//! Scoping configuration.
//!
//! Configuration is a JSON document listing the tenant-scoped tables and
//! the rules tenant ids must satisfy. Every field has a default, so an empty
//! object is a valid (if useless) configuration.
//!
//! ```json
//! {
//!     "default_partition_key": "tenant_id",
//!     "tables": [
//!         { "table": "orders" },
//!         { "table": "accounts", "partition_key": "account_id", "key_type": "integer" }
//!     ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::registry::{PartitionKeyType, TableRegistry, TenantModel};
use crate::tenant::TenantId;

/// One tenant-scoped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// The table name.
    pub table: String,

    /// The partition key column. Defaults to
    /// [`ScopingConfig::default_partition_key`].
    #[serde(default)]
    pub partition_key: Option<String>,

    /// The partition key type.
    #[serde(default)]
    pub key_type: PartitionKeyType,
}

impl TableConfig {
    /// Creates a table entry using the default partition key.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            partition_key: None,
            key_type: PartitionKeyType::Text,
        }
    }

    /// Sets the partition key column.
    pub fn with_partition_key(mut self, column: impl Into<String>) -> Self {
        self.partition_key = Some(column.into());
        self
    }

    /// Sets the partition key type.
    pub fn with_key_type(mut self, key_type: PartitionKeyType) -> Self {
        self.key_type = key_type;
        self
    }
}

/// Configuration for tenant scoping.
///
/// # Example
///
/// ```
/// use helios_tenant_scope::config::{ScopingConfig, TableConfig};
///
/// let config = ScopingConfig {
///     tables: vec![TableConfig::new("orders")],
///     ..Default::default()
/// };
/// let registry = config.build_registry().unwrap();
/// assert_eq!(registry.tables(), vec!["orders"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopingConfig {
    /// The partition key used by tables that do not name one.
    #[serde(default = "default_partition_key")]
    pub default_partition_key: String,

    /// Disables all tenant predicate injection.
    ///
    /// Intended for maintenance jobs; a call-scoped
    /// [`WriteOnlyMode`](crate::tenant::WriteOnlyMode) can also enable it.
    #[serde(default)]
    pub write_only: bool,

    /// Maximum length for tenant IDs.
    #[serde(default = "default_max_tenant_id_length")]
    pub max_tenant_id_length: usize,

    /// Allowed characters in tenant IDs (regex pattern).
    #[serde(default = "default_tenant_id_pattern")]
    pub tenant_id_pattern: String,

    /// The tenant-scoped tables.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

fn default_partition_key() -> String {
    "tenant_id".to_string()
}

fn default_max_tenant_id_length() -> usize {
    64
}

fn default_tenant_id_pattern() -> String {
    r"^[a-zA-Z0-9_\-/]+$".to_string()
}

impl Default for ScopingConfig {
    fn default() -> Self {
        Self {
            default_partition_key: default_partition_key(),
            write_only: false,
            max_tenant_id_length: default_max_tenant_id_length(),
            tenant_id_pattern: default_tenant_id_pattern(),
            tables: Vec::new(),
        }
    }
}

impl ScopingConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tenant-scoped table.
    pub fn with_table(mut self, table: TableConfig) -> Self {
        self.tables.push(table);
        self
    }

    /// Sets the default partition key.
    pub fn with_default_partition_key(mut self, column: impl Into<String>) -> Self {
        self.default_partition_key = column.into();
        self
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        debug!(
            path = %path.display(),
            tables = config.tables.len(),
            "Loaded scoping configuration"
        );
        Ok(config)
    }

    /// Resolves each table entry into a [`TenantModel`].
    pub fn models(&self) -> Vec<TenantModel> {
        self.tables
            .iter()
            .map(|table| {
                let partition_key = table
                    .partition_key
                    .clone()
                    .unwrap_or_else(|| self.default_partition_key.clone());
                TenantModel::new(&table.table, partition_key).with_key_type(table.key_type)
            })
            .collect()
    }

    /// Builds a registry of the configured tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateTable`] if a table is listed twice.
    pub fn build_registry(&self) -> Result<TableRegistry, ConfigError> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.table.as_str()) {
                return Err(ConfigError::DuplicateTable {
                    table: table.table.clone(),
                });
            }
        }
        Ok(TableRegistry::with_models(self.models()))
    }

    /// Compiles the tenant id rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if `tenant_id_pattern` is not
    /// a valid regular expression.
    pub fn validator(&self) -> Result<TenantValidator, ConfigError> {
        Ok(TenantValidator {
            max_length: self.max_tenant_id_length,
            pattern: Regex::new(&self.tenant_id_pattern)?,
        })
    }

    /// Checks a tenant id against the configured rules.
    pub fn validate_tenant(&self, tenant_id: &TenantId) -> Result<(), ConfigError> {
        self.validator()?.validate(tenant_id)
    }
}

/// Compiled tenant id rules.
#[derive(Debug, Clone)]
pub struct TenantValidator {
    max_length: usize,
    pattern: Regex,
}

impl TenantValidator {
    /// Checks `tenant_id` against the length limit and the pattern.
    pub fn validate(&self, tenant_id: &TenantId) -> Result<(), ConfigError> {
        let id = tenant_id.as_str();

        if id.len() > self.max_length {
            return Err(ConfigError::InvalidTenantId {
                tenant_id: tenant_id.clone(),
                reason: format!(
                    "tenant ID exceeds maximum length of {} characters",
                    self.max_length
                ),
            });
        }

        if !self.pattern.is_match(id) {
            return Err(ConfigError::InvalidTenantId {
                tenant_id: tenant_id.clone(),
                reason: format!(
                    "tenant ID does not match required pattern: {}",
                    self.pattern.as_str()
                ),
            });
        }

        Ok(())
    }
}
