//! UPDATE / DELETE adapter.

use tracing::debug;

use super::TenantScope;
use super::clause::TenantEnforcementClause;
use crate::ast::{Node, RelationFingerprint};
use crate::error::{ScopeError, ScopeResult};
use crate::registry::TenantModel;
use crate::tenant::ScopeOptions;

impl TenantScope {
    /// Constrains the target of an UPDATE or DELETE to the current tenant.
    ///
    /// A mutation has exactly one target relation, so no discovery pass is
    /// needed: a single tenant clause is appended to the WHERE list. The
    /// statement is returned unchanged when write-only mode is on, when
    /// `table` is not tenant-scoped, when no tenant is set, or when the
    /// target is already constrained.
    ///
    /// Subqueries inside the statement are not touched here; run
    /// [`rewrite`](Self::rewrite) afterwards for those.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidMutationTarget`] if `statement` is not an
    /// UPDATE or DELETE, and [`ScopeError::MutationTargetMismatch`] if its
    /// target is not `table`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use helios_tenant_scope::ast::{DeleteStatement, Node};
    /// use helios_tenant_scope::engine::TenantScope;
    /// use helios_tenant_scope::registry::{TableRegistry, TenantModel};
    /// use helios_tenant_scope::tenant::ScopeOptions;
    ///
    /// let registry = TableRegistry::with_models([TenantModel::new("orders", "tenant_id")]);
    /// let scope = TenantScope::new(Arc::new(registry));
    ///
    /// let delete = DeleteStatement::new(Node::table("orders")).into_node();
    /// let scoped = scope
    ///     .scope_mutation(delete, "orders", &ScopeOptions::for_tenant("t1"))
    ///     .unwrap();
    ///
    /// assert_eq!(scoped.to_sql(), "DELETE FROM orders WHERE orders.tenant_id = 't1'");
    /// ```
    pub fn scope_mutation(
        &self,
        mut statement: Node,
        table: &str,
        options: &ScopeOptions,
    ) -> ScopeResult<Node> {
        match &mut statement {
            Node::Update(update) => {
                let relation = target_relation(&update.relation, table)?;
                self.scope_target(relation, &mut update.wheres, table, options)
            }
            Node::Delete(delete) => {
                let relation = target_relation(&delete.relation, table)?;
                self.scope_target(relation, &mut delete.wheres, table, options)
            }
            other => return Err(ScopeError::InvalidMutationTarget { kind: other.kind() }),
        }
        Ok(statement)
    }

    fn scope_target(
        &self,
        relation: RelationFingerprint,
        wheres: &mut Vec<Node>,
        table: &str,
        options: &ScopeOptions,
    ) {
        if options.is_write_only() {
            debug!(table, "Write-only mode, mutation left unscoped");
            return;
        }
        let Some(model) = self.registry().lookup(table) else {
            return;
        };
        let Some(tenant) = options.tenant() else {
            debug!(table, "No current tenant, mutation left unscoped");
            return;
        };

        if wheres
            .iter()
            .any(|predicate| constrains(predicate, &relation, &model))
        {
            return;
        }

        debug!(
            relation = %relation,
            partition_key = %model.partition_key,
            tenant_id = %tenant,
            "Injecting tenant clause into mutation"
        );
        wheres.push(TenantEnforcementClause::new(relation, &model, tenant).into());
    }
}

/// The fingerprint the statement's columns are qualified with.
///
/// Fails unless the statement's target is a reference to `table`.
fn target_relation(relation: &Node, table: &str) -> ScopeResult<RelationFingerprint> {
    let fingerprint = match relation {
        Node::Table(t) => Some(t.fingerprint()),
        Node::TableAlias(alias) => alias.fingerprint(),
        _ => None,
    };
    match fingerprint {
        Some(fp) if fp.table_name() == table => Ok(fp),
        Some(fp) => Err(ScopeError::MutationTargetMismatch {
            expected: table.to_string(),
            found: fp.table_name().to_string(),
        }),
        None => Err(ScopeError::MutationTargetMismatch {
            expected: table.to_string(),
            found: relation.kind().to_string(),
        }),
    }
}

/// Returns `true` if `predicate` already pins `relation` to a tenant.
fn constrains(predicate: &Node, relation: &RelationFingerprint, model: &TenantModel) -> bool {
    match predicate {
        Node::TenantClause(clause) => clause.relation() == relation,
        Node::Equality(eq) => matches!(
            eq.left.as_ref(),
            Node::Attribute(attr) if &attr.relation == relation && attr.name == model.partition_key
        ),
        Node::And(children) => children
            .iter()
            .any(|child| constrains(child, relation, model)),
        _ => false,
    }
}
