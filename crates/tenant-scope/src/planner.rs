//! Plan building with tenant scoping applied.
//!
//! [`Planner`] is the single place where plans are handed to the engine
//! before rendering: callers build a plan, pass it to [`Planner::build`]
//! together with the options of the current call, and render the result.

use std::sync::Arc;

use tracing::debug;

use crate::ast::Node;
use crate::cache::{LookupKey, StatementCache};
use crate::config::{ScopingConfig, TenantValidator};
use crate::engine::TenantScope;
use crate::error::{ConfigError, Result};
use crate::registry::TenantRegistry;
use crate::tenant::{ScopeOptions, TenantId};

/// Composes configuration, registry, engine and statement cache.
///
/// # Examples
///
/// ```
/// use helios_tenant_scope::ast::{Node, SelectCore};
/// use helios_tenant_scope::config::{ScopingConfig, TableConfig};
/// use helios_tenant_scope::planner::Planner;
///
/// let config = ScopingConfig::new().with_table(TableConfig::new("orders"));
/// let planner = Planner::from_config(config).unwrap();
///
/// let options = planner.options_for("acme").unwrap();
/// let plan = SelectCore::from_source(Node::table("orders")).into_node();
/// let scoped = planner.build(plan, &options).unwrap();
///
/// assert_eq!(scoped.to_sql(), "SELECT * FROM orders WHERE orders.tenant_id = 'acme'");
/// ```
#[derive(Debug)]
pub struct Planner {
    config: ScopingConfig,
    scope: TenantScope,
    cache: StatementCache,
    validator: TenantValidator,
}

impl Planner {
    /// Creates a planner whose registry is built from `config`.
    pub fn from_config(config: ScopingConfig) -> Result<Self> {
        let registry = Arc::new(config.build_registry()?);
        Self::new(config, registry)
    }

    /// Creates a planner with an external registry.
    ///
    /// The tables listed in `config` are ignored; only its global settings
    /// apply.
    pub fn new(config: ScopingConfig, registry: Arc<dyn TenantRegistry>) -> Result<Self> {
        let validator = config.validator()?;
        Ok(Self {
            config,
            scope: TenantScope::new(Arc::clone(&registry)),
            cache: StatementCache::new(registry),
            validator,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ScopingConfig {
        &self.config
    }

    /// Returns the engine.
    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<dyn TenantRegistry> {
        self.scope.registry()
    }

    /// Returns the statement cache.
    pub fn cache(&self) -> &StatementCache {
        &self.cache
    }

    /// Validates `tenant` and returns options that enforce it.
    pub fn options_for(
        &self,
        tenant: impl Into<TenantId>,
    ) -> std::result::Result<ScopeOptions, ConfigError> {
        let tenant = tenant.into();
        self.validator.validate(&tenant)?;
        Ok(ScopeOptions::for_tenant(tenant).with_write_only(self.config.write_only))
    }

    /// Snapshots the call-scoped tenant and write-only flag.
    ///
    /// The configured `write_only` setting is applied on top.
    pub fn current_options(&self) -> std::result::Result<ScopeOptions, ConfigError> {
        let options = ScopeOptions::current();
        if let Some(tenant) = options.tenant() {
            self.validator.validate(tenant)?;
        }
        let write_only = options.is_write_only() || self.config.write_only;
        Ok(options.with_write_only(write_only))
    }

    /// Applies tenant scoping to a plan.
    ///
    /// UPDATE and DELETE roots get their target constrained first, then
    /// every plan is rewritten so that subqueries are scoped too.
    pub fn build(&self, plan: Node, options: &ScopeOptions) -> Result<Node> {
        let target = match &plan {
            Node::Update(update) => Some(target_table(&update.relation)),
            Node::Delete(delete) => Some(target_table(&delete.relation)),
            _ => None,
        };
        let plan = match target {
            Some(table) => self.scope_target(plan, table, options)?,
            None => plan,
        };
        Ok(self.scope.rewrite(plan, options)?)
    }

    /// Returns a point-lookup plan for `columns` of `table`.
    ///
    /// Plans for tables that are not tenant-scoped are cached by column
    /// shape. Plans for tenant-scoped tables are rebuilt for every call.
    pub fn find_by<S: AsRef<str>>(
        &self,
        table: &str,
        columns: &[S],
        options: &ScopeOptions,
    ) -> Result<Arc<Node>> {
        let key = LookupKey::new(table, columns.iter().map(|c| c.as_ref().to_string()));
        self.cache.fetch(&key, |key| self.build(key.build_plan(), options))
    }

    fn scope_target(
        &self,
        plan: Node,
        table: Option<String>,
        options: &ScopeOptions,
    ) -> Result<Node> {
        match table {
            Some(table) => Ok(self.scope.scope_mutation(plan, &table, options)?),
            None => {
                debug!(kind = plan.kind(), "Mutation target is not a table, skipping");
                Ok(plan)
            }
        }
    }
}

fn target_table(relation: &Node) -> Option<String> {
    match relation {
        Node::Table(table) => Some(table.name.clone()),
        Node::TableAlias(alias) => alias.fingerprint().map(|fp| fp.table_name().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeleteStatement, RelationFingerprint, SelectCore, UpdateStatement};
    use crate::config::TableConfig;
    use crate::error::Error;
    use crate::tenant::{CurrentTenant, WriteOnlyMode};

    fn planner() -> Planner {
        Planner::from_config(
            ScopingConfig::new()
                .with_table(TableConfig::new("orders"))
                .with_table(TableConfig::new("items")),
        )
        .unwrap()
    }

    #[test]
    fn test_options_for_validates() {
        let planner = planner();
        assert!(planner.options_for("acme").is_ok());
        assert!(matches!(
            planner.options_for("not valid"),
            Err(ConfigError::InvalidTenantId { .. })
        ));
    }

    #[test]
    fn test_current_options() {
        let planner = planner();
        let options = CurrentTenant::sync_scope("t1", || planner.current_options().unwrap());
        assert_eq!(options, ScopeOptions::for_tenant("t1"));

        let options = WriteOnlyMode::sync_scope(true, || planner.current_options().unwrap());
        assert!(options.is_write_only());
        assert_eq!(options.tenant(), None);
    }

    #[test]
    fn test_config_write_only_applies() {
        let planner = Planner::from_config(ScopingConfig {
            write_only: true,
            tables: vec![TableConfig::new("orders")],
            ..Default::default()
        })
        .unwrap();
        let options = planner.options_for("t1").unwrap();
        let plan = SelectCore::from_source(Node::table("orders")).into_node();
        assert_eq!(planner.build(plan.clone(), &options).unwrap(), plan);
    }

    #[test]
    fn test_build_update_with_subquery() {
        let planner = planner();
        let items = RelationFingerprint::table("items");
        let sub = SelectCore::from_source(Node::table("items"))
            .project(Node::attr(&items, "order_id"))
            .into_node();
        let update = UpdateStatement::new(Node::table("orders"))
            .set("status", Node::text("closed"))
            .filter(Node::in_subquery(
                Node::attr(&RelationFingerprint::table("orders"), "id"),
                sub,
            ))
            .into_node();

        let scoped = planner
            .build(update, &ScopeOptions::for_tenant("t1"))
            .unwrap();
        assert_eq!(
            scoped.to_sql(),
            "UPDATE orders SET status = 'closed' \
             WHERE orders.id IN (SELECT items.order_id FROM items WHERE items.tenant_id = 't1') \
             AND orders.tenant_id = 't1'"
        );
    }

    #[test]
    fn test_build_delete_without_tenant() {
        let planner = planner();
        let delete = DeleteStatement::new(Node::table("orders"))
            .filter(RelationFingerprint::table("orders").attr("id").equals(1i64))
            .into_node();
        let scoped = planner.build(delete.clone(), &ScopeOptions::default()).unwrap();
        assert_eq!(scoped, delete);
    }

    #[test]
    fn test_find_by_scoped_table() {
        let planner = planner();
        let plan = planner
            .find_by("orders", &["id"], &ScopeOptions::for_tenant("t1"))
            .unwrap();
        assert_eq!(
            plan.to_sql(),
            "SELECT * FROM orders WHERE orders.tenant_id = 't1' AND orders.id = $1 LIMIT 1"
        );
        assert!(planner.cache().is_empty());
    }

    #[test]
    fn test_find_by_unscoped_table_is_cached() {
        let planner = planner();
        let options = ScopeOptions::for_tenant("t1");
        planner.find_by("currencies", &["code"], &options).unwrap();
        planner.find_by("currencies", &["code"], &options).unwrap();
        assert_eq!(planner.cache().stats().hits, 1);
    }

    #[test]
    fn test_invalid_pattern_fails_construction() {
        let err = Planner::from_config(ScopingConfig {
            tenant_id_pattern: "(".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidPattern(_))));
    }
}
