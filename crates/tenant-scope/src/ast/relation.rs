//! Relation identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Attribute, Node};

/// Identity of one table reference in a plan: the table name plus the alias
/// it is referenced under, if any.
///
/// Two fingerprints are equal only when both parts match, so `orders` and
/// `orders AS o` are different relations even though they read the same
/// table. Fingerprints are created whenever a table reference is observed
/// and never change afterwards.
///
/// # Examples
///
/// ```
/// use helios_tenant_scope::ast::RelationFingerprint;
///
/// let plain = RelationFingerprint::table("orders");
/// let aliased = RelationFingerprint::aliased("orders", "o");
///
/// assert_ne!(plain, aliased);
/// assert_eq!(plain.qualifier(), "orders");
/// assert_eq!(aliased.qualifier(), "o");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationFingerprint {
    table_name: String,
    alias: Option<String>,
}

impl RelationFingerprint {
    /// Creates a fingerprint from its parts.
    pub fn new(table_name: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            table_name: table_name.into(),
            alias,
        }
    }

    /// Creates a fingerprint for an unaliased table reference.
    pub fn table(table_name: impl Into<String>) -> Self {
        Self::new(table_name, None)
    }

    /// Creates a fingerprint for a table referenced under an alias.
    pub fn aliased(table_name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(table_name, Some(alias.into()))
    }

    /// Returns the underlying table name, used for registry lookups.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the alias, if the table is referenced under one.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns the name columns of this relation are qualified with.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }

    /// Returns a column reference on this relation.
    pub fn attr(&self, column: impl Into<String>) -> Attribute {
        Attribute::new(self.clone(), column)
    }

    /// Returns the node that introduces this relation in a FROM clause.
    pub fn to_source(&self) -> Node {
        match &self.alias {
            Some(alias) => Node::aliased(&self.table_name, alias),
            None => Node::table(&self.table_name),
        }
    }
}

impl fmt::Display for RelationFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.table_name, alias),
            None => write!(f, "{}", self.table_name),
        }
    }
}
