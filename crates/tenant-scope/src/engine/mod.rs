//! Tenant scoping engine.
//!
//! Scoping a plan is two passes over the same tree:
//!
//! 1. **Discovery** walks the plan read-only and produces [`Scopes`]: one
//!    [`ScopeContext`] per select-core and per outer join, recording the
//!    tenant relations each one reads and which of them are already
//!    constrained.
//! 2. **Rewriting** walks the plan again in the same order and injects a
//!    [`TenantEnforcementClause`] for every relation that is still
//!    unconstrained, plus [`TenantJoinEnforcementClause`] links inside join
//!    chains.
//!
//! Injected clauses are recognized by discovery, so rewriting an already
//! rewritten plan changes nothing.
//!
//! UPDATE and DELETE targets are handled separately by
//! [`TenantScope::scope_mutation`].

mod clause;
mod discovery;
mod mutation;
mod rewrite;
mod scope;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

pub use clause::{TenantEnforcementClause, TenantJoinEnforcementClause};
pub use scope::{ScopeContext, ScopeId, ScopeOwner, Scopes};

use crate::ast::Node;
use crate::error::ScopeResult;
use crate::registry::TenantRegistry;
use crate::tenant::ScopeOptions;
use discovery::Discovery;
use rewrite::Rewriter;

/// Entry point for scoping query plans to a tenant.
///
/// `TenantScope` is cheap to clone and holds no per-call state; the tenant
/// and write-only flag are passed in through [`ScopeOptions`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use helios_tenant_scope::ast::{Node, SelectCore};
/// use helios_tenant_scope::engine::TenantScope;
/// use helios_tenant_scope::registry::{TableRegistry, TenantModel};
/// use helios_tenant_scope::tenant::ScopeOptions;
///
/// let registry = TableRegistry::with_models([TenantModel::new("orders", "tenant_id")]);
/// let scope = TenantScope::new(Arc::new(registry));
///
/// let plan = SelectCore::from_source(Node::table("orders")).into_node();
/// let scoped = scope.rewrite(plan, &ScopeOptions::for_tenant("t1")).unwrap();
///
/// assert_eq!(scoped.to_sql(), "SELECT * FROM orders WHERE orders.tenant_id = 't1'");
/// ```
#[derive(Clone)]
pub struct TenantScope {
    registry: Arc<dyn TenantRegistry>,
}

impl TenantScope {
    /// Creates an engine backed by `registry`.
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<dyn TenantRegistry> {
        &self.registry
    }

    /// Runs discovery only.
    pub fn discover(&self, plan: &Node) -> Scopes {
        Discovery::new(self.registry.as_ref()).run(plan)
    }

    /// Constrains every tenant relation reachable from `plan`.
    ///
    /// Returns the plan unchanged when write-only mode is on. Without a
    /// tenant, no tenant clauses are added but join links still are.
    ///
    /// # Errors
    ///
    /// Fails if the rewriter cannot pair the plan's select-cores and outer
    /// joins with the contexts discovery produced for them. This indicates a
    /// bug, not bad input.
    pub fn rewrite(&self, mut plan: Node, options: &ScopeOptions) -> ScopeResult<Node> {
        if options.is_write_only() {
            debug!(kind = plan.kind(), "Write-only mode, plan left unscoped");
            return Ok(plan);
        }
        let scopes = self.discover(&plan);
        Rewriter::new(self.registry.as_ref(), &scopes, options).run(&mut plan)?;
        Ok(plan)
    }

    /// Rewrites a plan using externally supplied contexts.
    ///
    /// `scopes` must come from [`discover`](Self::discover) on the same plan.
    ///
    /// # Errors
    ///
    /// Returns a [`ScopeError`](crate::error::ScopeError) if `scopes` does
    /// not match the shape of `plan`.
    pub fn rewrite_with(
        &self,
        mut plan: Node,
        scopes: &Scopes,
        options: &ScopeOptions,
    ) -> ScopeResult<Node> {
        if options.is_write_only() {
            return Ok(plan);
        }
        Rewriter::new(self.registry.as_ref(), scopes, options).run(&mut plan)?;
        Ok(plan)
    }
}

impl fmt::Debug for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantScope").finish_non_exhaustive()
    }
}
