//! Tenant registry.
//!
//! The registry is the single source of truth for which tables are
//! tenant-scoped and which column holds the tenant id. A table is
//! tenant-scoped iff [`TenantRegistry::lookup`] resolves it.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ast::Value;
use crate::tenant::TenantId;

/// The SQL type of a partition key column.
///
/// Decides how a tenant id is emitted as a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKeyType {
    /// Text column; tenant ids are quoted.
    #[default]
    Text,
    /// Integer column; tenant ids are emitted unquoted when they parse.
    Integer,
}

/// A tenant-scoped table and its partition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantModel {
    /// The table name.
    pub table: String,
    /// The column holding the tenant id.
    pub partition_key: String,
    /// The column type.
    #[serde(default)]
    pub key_type: PartitionKeyType,
}

impl TenantModel {
    /// Creates a model with a text partition key.
    pub fn new(table: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            partition_key: partition_key.into(),
            key_type: PartitionKeyType::Text,
        }
    }

    /// Sets the partition key type.
    pub fn with_key_type(mut self, key_type: PartitionKeyType) -> Self {
        self.key_type = key_type;
        self
    }

    /// Converts a tenant id into the literal compared against the partition
    /// key.
    ///
    /// An id that does not parse for an integer key is kept as text so the
    /// predicate still matches nothing rather than everything.
    pub fn tenant_value(&self, tenant: &TenantId) -> Value {
        match self.key_type {
            PartitionKeyType::Text => Value::Text(tenant.as_str().to_string()),
            PartitionKeyType::Integer => match tenant.as_str().parse::<i64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => {
                    warn!(
                        table = %self.table,
                        partition_key = %self.partition_key,
                        tenant_id = %tenant,
                        "Tenant id is not numeric for an integer partition key"
                    );
                    Value::Text(tenant.as_str().to_string())
                }
            },
        }
    }
}

/// Lookup of tenant-scoped tables by name.
///
/// Implementations must be cheap to call: the rewriter consults the registry
/// for every table reference it sees, and again for each relation it
/// enforces.
///
/// # Examples
///
/// ```
/// use helios_tenant_scope::registry::{TenantModel, TenantRegistry};
///
/// struct SuffixRegistry;
///
/// impl TenantRegistry for SuffixRegistry {
///     fn lookup(&self, table: &str) -> Option<TenantModel> {
///         table
///             .ends_with("_t")
///             .then(|| TenantModel::new(table, "tenant_id"))
///     }
/// }
///
/// assert!(SuffixRegistry.is_tenant_scoped("orders_t"));
/// assert!(!SuffixRegistry.is_tenant_scoped("currencies"));
/// ```
pub trait TenantRegistry: Send + Sync {
    /// Returns the tenant model for `table`, if it is tenant-scoped.
    fn lookup(&self, table: &str) -> Option<TenantModel>;

    /// Returns `true` if `table` is tenant-scoped.
    fn is_tenant_scoped(&self, table: &str) -> bool {
        self.lookup(table).is_some()
    }
}

/// In-memory registry.
///
/// Registration may happen while other threads are building plans; lookups
/// take a shared read lock.
#[derive(Debug, Default)]
pub struct TableRegistry {
    models: RwLock<HashMap<String, TenantModel>>,
}

impl TableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from a list of models.
    pub fn with_models(models: impl IntoIterator<Item = TenantModel>) -> Self {
        let registry = Self::new();
        for model in models {
            registry.register(model);
        }
        registry
    }

    /// Registers a model, returning the one it replaced.
    pub fn register(&self, model: TenantModel) -> Option<TenantModel> {
        self.models.write().insert(model.table.clone(), model)
    }

    /// Removes a table from the registry.
    pub fn unregister(&self, table: &str) -> Option<TenantModel> {
        self.models.write().remove(table)
    }

    /// Returns the registered table names, sorted.
    pub fn tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.models.read().keys().cloned().collect();
        tables.sort();
        tables
    }

    /// Returns the number of registered tables.
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Returns `true` if no table is registered.
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

impl TenantRegistry for TableRegistry {
    fn lookup(&self, table: &str) -> Option<TenantModel> {
        self.models.read().get(table).cloned()
    }
}
