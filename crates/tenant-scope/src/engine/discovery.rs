//! Discovery pass.
//!
//! Walks a plan without modifying it and records, for every select-core and
//! outer join, which tenant relations its source reads and which of those
//! are already constrained by a tenant predicate.

use tracing::trace;

use super::scope::{ScopeContext, ScopeId, ScopeOwner, Scopes};
use crate::ast::{Attribute, Join, Node, RelationFingerprint, SelectStatement};
use crate::registry::TenantRegistry;

/// Traversal state passed down by value.
///
/// `discovering` is set while visiting a scope's source tree; table
/// references seen there are recorded as discovered. `constraining` is set
/// where an equality on a partition key actually restricts the rows of the
/// scope, so it can mark the relation as handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    discovering: bool,
    constraining: bool,
}

impl Frame {
    /// FROM and join sides.
    pub(crate) const SOURCE: Frame = Frame {
        discovering: true,
        constraining: true,
    };

    /// WHERE, ON, GROUP BY, WINDOW, HAVING.
    pub(crate) const PREDICATE: Frame = Frame {
        discovering: false,
        constraining: true,
    };

    /// Projections, ORDER BY, SET values, and anything under OR / NOT.
    pub(crate) const PROJECTION: Frame = Frame {
        discovering: false,
        constraining: false,
    };

    fn unconstrained(self) -> Frame {
        Frame {
            constraining: false,
            ..self
        }
    }
}

/// Builds [`Scopes`] for a plan.
pub(crate) struct Discovery<'r> {
    registry: &'r dyn TenantRegistry,
    contexts: Vec<ScopeContext>,
    stack: Vec<ScopeId>,
}

impl<'r> Discovery<'r> {
    pub(crate) fn new(registry: &'r dyn TenantRegistry) -> Self {
        Self {
            registry,
            contexts: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, root: &Node) -> Scopes {
        self.visit(root, Frame::PREDICATE);
        for context in &self.contexts {
            trace!(
                scope = context.id(),
                owner = %context.owner(),
                discovered = context.discovered().len(),
                handled = context.handled().len(),
                "Discovered scope context"
            );
        }
        Scopes::new(self.contexts)
    }

    fn current(&mut self) -> Option<&mut ScopeContext> {
        let id = *self.stack.last()?;
        self.contexts.get_mut(id)
    }

    fn enter(&mut self, owner: ScopeOwner) {
        let id = self.contexts.len();
        let parent = self.stack.last().copied();
        self.contexts.push(ScopeContext::new(id, owner, parent));
        self.stack.push(id);
    }

    fn leave(&mut self) {
        self.stack.pop();
    }

    fn register(&mut self, relation: RelationFingerprint, frame: Frame) {
        if !frame.discovering || !self.registry.is_tenant_scoped(relation.table_name()) {
            return;
        }
        if let Some(context) = self.current() {
            context.discover(relation);
        }
    }

    fn mark_handled(&mut self, relation: &RelationFingerprint) {
        if let Some(context) = self.current() {
            context.mark_handled(relation.clone());
        }
    }

    fn is_partition_key(&self, attribute: &Attribute) -> bool {
        self.registry
            .lookup(attribute.relation.table_name())
            .is_some_and(|model| model.partition_key == attribute.name)
    }

    fn visit_all(&mut self, nodes: &[Node], frame: Frame) {
        for node in nodes {
            self.visit(node, frame);
        }
    }

    fn visit(&mut self, node: &Node, frame: Frame) {
        match node {
            Node::Table(table) => self.register(table.fingerprint(), frame),
            Node::TableAlias(alias) => match alias.fingerprint() {
                Some(relation) => self.register(relation, frame),
                None => self.visit(&alias.relation, frame),
            },
            Node::Attribute(attribute) => {
                if !self.stack.is_empty() {
                    self.register(attribute.relation.clone(), frame);
                }
            }
            Node::Literal(_) | Node::BindParam(_) | Node::SqlLiteral(_) => {}
            Node::Function(function) => self.visit_all(&function.args, frame),
            Node::List(items) => self.visit_all(items, frame),
            Node::Equality(eq) => {
                if frame.constraining
                    && let Node::Attribute(attribute) = eq.left.as_ref()
                    && self.is_partition_key(attribute)
                {
                    self.mark_handled(&attribute.relation);
                }
                self.visit(&eq.left, frame);
                self.visit(&eq.right, frame);
            }
            Node::Comparison(cmp) => {
                self.visit(&cmp.left, frame);
                self.visit(&cmp.right, frame);
            }
            Node::And(children) => self.visit_all(children, frame),
            Node::Or(left, right) => {
                self.visit(left, frame.unconstrained());
                self.visit(right, frame.unconstrained());
            }
            Node::Not(inner) => self.visit(inner, frame.unconstrained()),
            Node::Grouping(inner) | Node::Exists(inner) => self.visit(inner, frame),
            Node::Select(select) => self.visit_select(select),
            Node::Union(op) => {
                self.visit(&op.left, frame);
                self.visit(&op.right, frame);
            }
            Node::Join(join) => self.visit_join(join, frame),
            Node::Update(update) => {
                self.visit(&update.relation, Frame::PREDICATE);
                for assignment in &update.assignments {
                    self.visit(&assignment.value, Frame::PROJECTION);
                }
                self.visit_all(&update.wheres, Frame::PREDICATE);
            }
            Node::Delete(delete) => {
                self.visit(&delete.relation, Frame::PREDICATE);
                self.visit_all(&delete.wheres, Frame::PREDICATE);
            }
            Node::TenantClause(clause) => self.mark_handled(clause.relation()),
            Node::LinkClause(clause) => self.mark_handled(clause.relation()),
        }
    }

    fn visit_select(&mut self, select: &SelectStatement) {
        let core = &select.core;
        self.enter(ScopeOwner::SelectCore);
        if let Some(source) = &core.source {
            self.visit(source, Frame::SOURCE);
        }
        self.visit_all(&core.projections, Frame::PROJECTION);
        self.visit_all(&core.wheres, Frame::PREDICATE);
        self.visit_all(&core.groups, Frame::PREDICATE);
        self.visit_all(&core.windows, Frame::PREDICATE);
        if let Some(having) = &core.having {
            self.visit(having, Frame::PREDICATE);
        }
        self.visit_all(&select.orders, Frame::PROJECTION);
        self.leave();
    }

    fn visit_join(&mut self, join: &Join, frame: Frame) {
        if join.kind.is_outer() {
            self.enter(ScopeOwner::OuterJoin);
            self.visit(&join.left, Frame::SOURCE);
            self.visit(&join.right, Frame::SOURCE);
            if let Some(on) = &join.on {
                self.visit(on, Frame::PREDICATE);
            }
            self.leave();
        } else {
            self.visit(&join.left, frame);
            self.visit(&join.right, frame);
            if let Some(on) = &join.on {
                self.visit(on, Frame::PREDICATE);
            }
        }
    }
}
