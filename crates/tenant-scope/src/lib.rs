//! Helios Tenant Scope
//!
//! This crate rewrites relational query plans so that every reference to a
//! tenant-scoped table is constrained to the current tenant. It is meant for
//! multi-tenant applications that share one schema across tenants and need
//! row-level isolation to be guaranteed where queries are built, not left to
//! each caller remembering a `WHERE tenant_id = ...`.
//!
//! # Features
//!
//! - **Scope-aware injection**: select-cores, subqueries and outer joins each
//!   get their tenant predicate in the right place (WHERE list or ON
//!   condition)
//! - **No double enforcement**: explicit `partition_key = ...` filters are
//!   recognized and left alone
//! - **Idempotent**: rewriting an already rewritten plan is a no-op
//! - **Join chains**: relations brought in by inner joins are linked to the
//!   partition key of the relation they join onto
//! - **Mutations**: UPDATE and DELETE targets are constrained too
//! - **Call-scoped tenant**: the current tenant lives in a task-local, never
//!   in a process-wide variable
//!
//! # Architecture
//!
//! - [`ast`] - Query plan node model
//! - [`render`] - SQL rendering, inline or with bound parameters
//! - [`tenant`] - Tenant identifiers and call-scoped tenant state
//! - [`registry`] - Which tables are tenant-scoped, and on which column
//! - [`engine`] - Discovery and rewrite passes, and the mutation adapter
//! - [`cache`] - Identity-lookup statement cache with tenant bypass
//! - [`config`] - JSON configuration and tenant id validation
//! - [`planner`] - Composes the above into a single build step
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```
//! use helios_tenant_scope::ast::{JoinKind, Node, RelationFingerprint, SelectCore};
//! use helios_tenant_scope::config::{ScopingConfig, TableConfig};
//! use helios_tenant_scope::planner::Planner;
//!
//! let config = ScopingConfig::new()
//!     .with_table(TableConfig::new("orders"))
//!     .with_table(TableConfig::new("items"));
//! let planner = Planner::from_config(config).unwrap();
//!
//! let orders = RelationFingerprint::table("orders");
//! let items = RelationFingerprint::table("items");
//! let plan = SelectCore::from_source(Node::join(
//!     JoinKind::LeftOuter,
//!     Node::table("orders"),
//!     Node::table("items"),
//!     Some(Node::eq(orders.attr("id").into(), items.attr("order_id").into())),
//! ))
//! .filter(items.attr("tenant_id").equals("acme"))
//! .into_node();
//!
//! let options = planner.options_for("acme").unwrap();
//! let scoped = planner.build(plan, &options).unwrap();
//!
//! assert_eq!(
//!     scoped.to_sql(),
//!     "SELECT * FROM orders LEFT OUTER JOIN items \
//!      ON orders.id = items.order_id AND orders.tenant_id = 'acme' \
//!      WHERE items.tenant_id = 'acme'"
//! );
//! ```
//!
//! # Current Tenant
//!
//! The tenant for a request is bound with [`CurrentTenant`](tenant::CurrentTenant)
//! and snapshotted into [`ScopeOptions`](tenant::ScopeOptions) when a plan is
//! built:
//!
//! ```
//! use helios_tenant_scope::tenant::{CurrentTenant, ScopeOptions, TenantId};
//!
//! let options = CurrentTenant::sync_scope("acme", ScopeOptions::current);
//! assert_eq!(options.tenant(), Some(&TenantId::new("acme")));
//!
//! // Outside a scope there is no tenant, and no tenant clauses are added.
//! assert_eq!(ScopeOptions::current().tenant(), None);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ast;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod planner;
pub mod registry;
pub mod render;
pub mod tenant;

// Re-export commonly used types at crate root
pub use engine::TenantScope;
pub use error::{ConfigError, Error, Result, ScopeError, ScopeResult};
pub use planner::Planner;
pub use tenant::{CurrentTenant, ScopeOptions, TenantId, WriteOnlyMode};
