//! Rewrite pass.
//!
//! Re-walks the plan in the same order as discovery, pairing each
//! scope-owning node with its context by ordinal, and injects the clauses
//! that context still needs. Injected clauses never contain select-cores or
//! joins, so the ordinals of nodes visited later are unaffected.

use tracing::{debug, warn};

use super::clause::{TenantEnforcementClause, TenantJoinEnforcementClause};
use super::scope::{ScopeId, ScopeOwner, Scopes};
use crate::ast::{Join, Node, RelationFingerprint, SelectStatement};
use crate::error::{ScopeError, ScopeResult};
use crate::registry::{TenantModel, TenantRegistry};
use crate::tenant::ScopeOptions;

pub(crate) struct Rewriter<'a> {
    registry: &'a dyn TenantRegistry,
    scopes: &'a Scopes,
    options: &'a ScopeOptions,
    next: ScopeId,
}

/// What one context needs: tenant clauses for its owner, and the relations
/// to link inside its join tree.
struct Enforcement {
    clauses: Vec<Node>,
    links: Vec<(RelationFingerprint, TenantModel)>,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(
        registry: &'a dyn TenantRegistry,
        scopes: &'a Scopes,
        options: &'a ScopeOptions,
    ) -> Self {
        Self {
            registry,
            scopes,
            options,
            next: 0,
        }
    }

    pub(crate) fn run(mut self, plan: &mut Node) -> ScopeResult<()> {
        self.rewrite(plan)?;
        if self.next < self.scopes.len() {
            return Err(ScopeError::UnconsumedContexts {
                remaining: self.scopes.len() - self.next,
            });
        }
        Ok(())
    }

    /// Takes the next context and checks it was recorded for `owner`.
    fn claim(&mut self, owner: ScopeOwner) -> ScopeResult<ScopeId> {
        let id = self.next;
        self.next += 1;
        let context = self
            .scopes
            .get(id)
            .ok_or(ScopeError::MissingContext { scope: id, owner })?;
        if context.owner() != owner {
            return Err(ScopeError::UnrecognizedContext {
                scope: id,
                expected: context.owner(),
                found: owner,
            });
        }
        Ok(id)
    }

    fn rewrite_all(&mut self, nodes: &mut [Node]) -> ScopeResult<()> {
        for node in nodes {
            self.rewrite(node)?;
        }
        Ok(())
    }

    fn rewrite(&mut self, node: &mut Node) -> ScopeResult<()> {
        match node {
            Node::Table(_)
            | Node::Attribute(_)
            | Node::Literal(_)
            | Node::BindParam(_)
            | Node::SqlLiteral(_)
            | Node::TenantClause(_)
            | Node::LinkClause(_) => Ok(()),
            Node::TableAlias(alias) => self.rewrite(&mut alias.relation),
            Node::Function(function) => self.rewrite_all(&mut function.args),
            Node::List(items) | Node::And(items) => self.rewrite_all(items),
            Node::Equality(eq) => {
                self.rewrite(&mut eq.left)?;
                self.rewrite(&mut eq.right)
            }
            Node::Comparison(cmp) => {
                self.rewrite(&mut cmp.left)?;
                self.rewrite(&mut cmp.right)
            }
            Node::Or(left, right) => {
                self.rewrite(left)?;
                self.rewrite(right)
            }
            Node::Not(inner) | Node::Grouping(inner) | Node::Exists(inner) => self.rewrite(inner),
            Node::Select(select) => self.rewrite_select(select),
            Node::Union(op) => {
                self.rewrite(&mut op.left)?;
                self.rewrite(&mut op.right)
            }
            Node::Join(join) => self.rewrite_join(join),
            Node::Update(update) => {
                self.rewrite(&mut update.relation)?;
                for assignment in &mut update.assignments {
                    self.rewrite(&mut assignment.value)?;
                }
                self.rewrite_all(&mut update.wheres)
            }
            Node::Delete(delete) => {
                self.rewrite(&mut delete.relation)?;
                self.rewrite_all(&mut delete.wheres)
            }
        }
    }

    fn rewrite_select(&mut self, select: &mut SelectStatement) -> ScopeResult<()> {
        let id = self.claim(ScopeOwner::SelectCore)?;

        let core = &mut select.core;
        if let Some(source) = core.source.as_mut() {
            self.rewrite(source)?;
        }
        self.rewrite_all(&mut core.projections)?;
        self.rewrite_all(&mut core.wheres)?;
        self.rewrite_all(&mut core.groups)?;
        self.rewrite_all(&mut core.windows)?;
        if let Some(having) = core.having.as_mut() {
            self.rewrite(having)?;
        }
        self.rewrite_all(&mut select.orders)?;

        let enforcement = self.enforcement(id);
        let core = &mut select.core;
        inject_wheres(&mut core.wheres, enforcement.clauses);
        if let Some(source) = core.source.as_mut() {
            for (relation, model) in &enforcement.links {
                self.link_nested_joins(source, relation, model);
            }
        }
        Ok(())
    }

    fn rewrite_join(&mut self, join: &mut Join) -> ScopeResult<()> {
        if !join.kind.is_outer() {
            self.rewrite(&mut join.left)?;
            self.rewrite(&mut join.right)?;
            if let Some(on) = join.on.as_mut() {
                self.rewrite(on)?;
            }
            return Ok(());
        }

        let id = self.claim(ScopeOwner::OuterJoin)?;
        self.rewrite(&mut join.left)?;
        self.rewrite(&mut join.right)?;
        if let Some(on) = join.on.as_mut() {
            self.rewrite(on)?;
        }

        let enforcement = self.enforcement(id);
        if !enforcement.clauses.is_empty() {
            join.on = match join.on.take() {
                Some(on) => Some(enforcement.clauses.into_iter().fold(on, Node::and_also)),
                None => Node::conjunction(enforcement.clauses),
            };
        }
        for (relation, model) in &enforcement.links {
            self.link_nested_joins(&mut join.left, relation, model);
            self.link_nested_joins(&mut join.right, relation, model);
        }
        Ok(())
    }

    /// Resolves the unhandled relations of context `id`.
    ///
    /// Relations the registry no longer knows are skipped. Without a tenant
    /// no tenant clause is built, but the relation is still linked.
    fn enforcement(&self, id: ScopeId) -> Enforcement {
        let mut enforcement = Enforcement {
            clauses: Vec::new(),
            links: Vec::new(),
        };

        for relation in self.scopes.unhandled(id) {
            let Some(model) = self.registry.lookup(relation.table_name()) else {
                warn!(
                    scope = id,
                    relation = %relation,
                    "Partition key could not be resolved, skipping relation"
                );
                continue;
            };

            if let Some(tenant) = self.options.tenant() {
                let clause = TenantEnforcementClause::new(relation.clone(), &model, tenant);
                debug!(
                    scope = id,
                    relation = %relation,
                    partition_key = %model.partition_key,
                    tenant_id = %tenant,
                    "Injecting tenant clause"
                );
                enforcement.clauses.push(clause.into());
            }
            enforcement.links.push((relation, model));
        }
        enforcement
    }

    /// Adds `relation.pk = anchor.pk` to the join that brings `relation` in
    /// on its right side, anchored on a relation of that join's left side
    /// (see [`anchor`](Self::anchor)).
    ///
    /// Only joins are descended; subqueries have their own contexts.
    fn link_nested_joins(&self, node: &mut Node, relation: &RelationFingerprint, model: &TenantModel) {
        let Node::Join(join) = node else {
            return;
        };
        self.link_nested_joins(&mut join.left, relation, model);
        self.link_nested_joins(&mut join.right, relation, model);

        if Join::leftmost_relation(&join.right).as_ref() != Some(relation) {
            return;
        }
        let Some((anchor, anchor_model)) = self.anchor(&join.left, relation) else {
            return;
        };

        let link: Node =
            TenantJoinEnforcementClause::new(relation.clone(), model, anchor.clone(), &anchor_model)
                .into();
        if join.on.as_ref().is_some_and(|on| contains_predicate(on, &link)) {
            return;
        }

        debug!(
            relation = %relation,
            anchor = %anchor,
            partition_key = %model.partition_key,
            "Injecting join link clause"
        );
        join.on = Some(match join.on.take() {
            Some(on) => on.and_also(link),
            None => link,
        });
    }

    /// Picks the relation a joined relation is linked to.
    ///
    /// This is the leftmost relation of `left` when it is tenant-scoped,
    /// otherwise the nearest tenant-scoped relation walking from the right
    /// end of `left` back towards its start.
    fn anchor(
        &self,
        left: &Node,
        relation: &RelationFingerprint,
    ) -> Option<(RelationFingerprint, TenantModel)> {
        let mut candidates = Vec::new();
        collect_relations(left, &mut candidates);

        Join::leftmost_relation(left)
            .into_iter()
            .chain(candidates.into_iter().rev())
            .filter(|candidate| candidate != relation)
            .find_map(|candidate| {
                let model = self.registry.lookup(candidate.table_name())?;
                Some((candidate, model))
            })
    }
}

/// Table references of a join tree, left to right. Subqueries are opaque.
fn collect_relations(node: &Node, out: &mut Vec<RelationFingerprint>) {
    match node {
        Node::Table(table) => out.push(table.fingerprint()),
        Node::TableAlias(alias) => out.extend(alias.fingerprint()),
        Node::Join(join) => {
            collect_relations(&join.left, out);
            collect_relations(&join.right, out);
        }
        Node::Grouping(inner) => collect_relations(inner, out),
        _ => {}
    }
}

/// ANDs `clauses` into a WHERE list, in front of the existing predicates.
fn inject_wheres(wheres: &mut Vec<Node>, clauses: Vec<Node>) {
    if clauses.is_empty() {
        return;
    }
    if wheres.is_empty() {
        wheres.extend(Node::conjunction(clauses));
        return;
    }

    let first = wheres.remove(0);
    let mut combined = clauses;
    match first {
        Node::And(children) => combined.extend(children),
        other => combined.push(other),
    }
    wheres.insert(0, Node::And(combined));
}

fn contains_predicate(haystack: &Node, needle: &Node) -> bool {
    match haystack {
        Node::And(children) => children.iter().any(|child| contains_predicate(child, needle)),
        other => other == needle,
    }
}
