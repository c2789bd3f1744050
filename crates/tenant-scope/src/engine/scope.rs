//! Scope contexts produced by discovery.

use std::collections::HashSet;
use std::fmt;

use crate::ast::RelationFingerprint;

/// Ordinal of a scope-owning node.
///
/// Select-cores and outer joins are numbered in pre-order, in the order the
/// traversal enters them. Discovery and rewriting walk the plan in the same
/// order, so the n-th scope-owning node the rewriter reaches owns context n.
pub type ScopeId = usize;

/// The kind of node a scope context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeOwner {
    /// A select-core. Clauses go into its WHERE list.
    SelectCore,
    /// An outer join. Clauses go into its ON condition.
    OuterJoin,
}

impl fmt::Display for ScopeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeOwner::SelectCore => write!(f, "select-core"),
            ScopeOwner::OuterJoin => write!(f, "outer join"),
        }
    }
}

/// Tenant relations discovered in one select-core or outer join, and the
/// subset already constrained by a tenant predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeContext {
    id: ScopeId,
    owner: ScopeOwner,
    parent: Option<ScopeId>,
    /// Discovery order, without duplicates.
    discovered: Vec<RelationFingerprint>,
    handled: HashSet<RelationFingerprint>,
}

impl ScopeContext {
    pub(crate) fn new(id: ScopeId, owner: ScopeOwner, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            owner,
            parent,
            discovered: Vec::new(),
            handled: HashSet::new(),
        }
    }

    /// Returns the ordinal of the owning node.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Returns the kind of the owning node.
    pub fn owner(&self) -> ScopeOwner {
        self.owner
    }

    /// Returns the enclosing context, if any.
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Returns the tenant relations found in this scope's source.
    pub fn discovered(&self) -> &[RelationFingerprint] {
        &self.discovered
    }

    /// Returns the relations already constrained in this scope.
    pub fn handled(&self) -> &HashSet<RelationFingerprint> {
        &self.handled
    }

    /// Returns `true` if `relation` is constrained in this scope.
    pub fn is_handled(&self, relation: &RelationFingerprint) -> bool {
        self.handled.contains(relation)
    }

    /// Returns the discovered relations that are not handled, in discovery
    /// order.
    pub fn unhandled(&self) -> Vec<RelationFingerprint> {
        self.discovered
            .iter()
            .filter(|relation| !self.handled.contains(*relation))
            .cloned()
            .collect()
    }

    pub(crate) fn discover(&mut self, relation: RelationFingerprint) {
        if !self.discovered.contains(&relation) {
            self.discovered.push(relation);
        }
    }

    pub(crate) fn mark_handled(&mut self, relation: RelationFingerprint) {
        self.handled.insert(relation);
    }
}

/// The ordered output of discovery: one context per scope-owning node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scopes {
    contexts: Vec<ScopeContext>,
}

impl Scopes {
    pub(crate) fn new(contexts: Vec<ScopeContext>) -> Self {
        Self { contexts }
    }

    /// Returns the number of contexts.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns `true` if the plan has no scope-owning node.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Returns the context with the given ordinal.
    pub fn get(&self, id: ScopeId) -> Option<&ScopeContext> {
        self.contexts.get(id)
    }

    /// Iterates over the contexts in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &ScopeContext> {
        self.contexts.iter()
    }

    /// Returns the relations of context `id` that still need a tenant clause.
    ///
    /// For an outer join, relations handled by an enclosing outer join or by
    /// the nearest enclosing select-core count as handled too: a tenant
    /// predicate in the WHERE list already constrains the joined rows.
    pub fn unhandled(&self, id: ScopeId) -> Vec<RelationFingerprint> {
        let Some(context) = self.get(id) else {
            return Vec::new();
        };
        let mut unhandled = context.unhandled();
        if context.owner == ScopeOwner::SelectCore {
            return unhandled;
        }

        let mut parent = context.parent;
        while let Some(parent_id) = parent {
            let Some(ancestor) = self.get(parent_id) else {
                break;
            };
            unhandled.retain(|relation| !ancestor.is_handled(relation));
            if ancestor.owner == ScopeOwner::SelectCore {
                break;
            }
            parent = ancestor.parent;
        }
        unhandled
    }
}

impl<'a> IntoIterator for &'a Scopes {
    type Item = &'a ScopeContext;
    type IntoIter = std::slice::Iter<'a, ScopeContext>;

    fn into_iter(self) -> Self::IntoIter {
        self.contexts.iter()
    }
}
