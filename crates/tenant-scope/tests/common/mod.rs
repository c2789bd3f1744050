//! Shared fixtures for the tenant scoping integration tests.
//!
//! The fixture schema has four tenant-scoped tables (`orders`, `items`,
//! `shipments` and `accounts`, the last one keyed by an integer
//! `account_id`) and one shared table (`currencies`).

#![allow(dead_code)]

use std::sync::Arc;

use helios_tenant_scope::ast::{Node, RelationFingerprint};
use helios_tenant_scope::engine::TenantScope;
use helios_tenant_scope::registry::{PartitionKeyType, TableRegistry, TenantModel};
use helios_tenant_scope::tenant::ScopeOptions;

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("helios_tenant_scope=trace")
        .with_test_writer()
        .try_init();
}

pub fn registry() -> TableRegistry {
    TableRegistry::with_models([
        TenantModel::new("orders", "tenant_id"),
        TenantModel::new("items", "tenant_id"),
        TenantModel::new("shipments", "tenant_id"),
        TenantModel::new("accounts", "account_id").with_key_type(PartitionKeyType::Integer),
    ])
}

pub fn scope() -> TenantScope {
    init_tracing();
    TenantScope::new(Arc::new(registry()))
}

pub fn tenant(id: &str) -> ScopeOptions {
    ScopeOptions::for_tenant(id)
}

pub fn no_tenant() -> ScopeOptions {
    ScopeOptions::default()
}

pub fn orders() -> RelationFingerprint {
    RelationFingerprint::table("orders")
}

pub fn items() -> RelationFingerprint {
    RelationFingerprint::table("items")
}

pub fn shipments() -> RelationFingerprint {
    RelationFingerprint::table("shipments")
}

pub fn accounts() -> RelationFingerprint {
    RelationFingerprint::table("accounts")
}

/// `left.left_column = right.right_column`
pub fn on(
    left: &RelationFingerprint,
    left_column: &str,
    right: &RelationFingerprint,
    right_column: &str,
) -> Node {
    Node::eq(Node::attr(left, left_column), Node::attr(right, right_column))
}

/// Counts the occurrences of `needle` in the rendered SQL.
pub fn occurrences(sql: &str, needle: &str) -> usize {
    sql.matches(needle).count()
}
