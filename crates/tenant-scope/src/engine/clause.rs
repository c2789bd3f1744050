//! Synthetic tenant predicates.
//!
//! Both clause kinds render as a plain equality. They are distinct node kinds
//! so that discovery can recognize them on a later pass and treat their
//! relation as already constrained.

use crate::ast::{Attribute, Node, RelationFingerprint, Value};
use crate::registry::TenantModel;
use crate::tenant::TenantId;

/// `relation.partition_key = <tenant>`
///
/// The tenant value is fixed when the clause is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantEnforcementClause {
    /// The partition key column of the constrained relation.
    pub attribute: Attribute,
    /// The tenant literal.
    pub tenant: Value,
}

impl TenantEnforcementClause {
    /// Builds the clause for `relation` using the model's partition key.
    pub fn new(relation: RelationFingerprint, model: &TenantModel, tenant: &TenantId) -> Self {
        Self {
            attribute: Attribute::new(relation, &model.partition_key),
            tenant: model.tenant_value(tenant),
        }
    }

    /// Returns the constrained relation.
    pub fn relation(&self) -> &RelationFingerprint {
        &self.attribute.relation
    }
}

impl From<TenantEnforcementClause> for Node {
    fn from(clause: TenantEnforcementClause) -> Self {
        Node::TenantClause(clause)
    }
}

/// `relation.partition_key = other.partition_key`
///
/// Ties a joined relation to the tenant of another relation in the same
/// join chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantJoinEnforcementClause {
    /// The partition key column of the constrained relation.
    pub attribute: Attribute,
    /// The partition key column it is tied to.
    pub other: Attribute,
}

impl TenantJoinEnforcementClause {
    /// Builds the clause tying `relation` to `other`.
    pub fn new(
        relation: RelationFingerprint,
        model: &TenantModel,
        other: RelationFingerprint,
        other_model: &TenantModel,
    ) -> Self {
        Self {
            attribute: Attribute::new(relation, &model.partition_key),
            other: Attribute::new(other, &other_model.partition_key),
        }
    }

    /// Returns the constrained relation.
    pub fn relation(&self) -> &RelationFingerprint {
        &self.attribute.relation
    }

    /// Returns the relation it is tied to.
    pub fn other_relation(&self) -> &RelationFingerprint {
        &self.other.relation
    }
}

impl From<TenantJoinEnforcementClause> for Node {
    fn from(clause: TenantJoinEnforcementClause) -> Self {
        Node::LinkClause(clause)
    }
}
