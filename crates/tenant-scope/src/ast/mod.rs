//! Query plan node model.
//!
//! A plan is a tree of [`Node`] values. The set of node kinds is closed:
//! every traversal in this crate matches on `Node` exhaustively, so adding a
//! kind forces each visitor to decide what to do with it.
//!
//! Plans are normally assembled with the builder helpers on [`Node`],
//! [`SelectCore`], [`UpdateStatement`] and [`DeleteStatement`]:
//!
//! ```
//! use helios_tenant_scope::ast::{Node, RelationFingerprint, SelectCore};
//!
//! let orders = RelationFingerprint::table("orders");
//! let plan = SelectCore::from_source(Node::table("orders"))
//!     .project(Node::star())
//!     .filter(Node::eq(orders.attr("status").into(), Node::text("open")))
//!     .into_node();
//!
//! assert_eq!(plan.to_sql(), "SELECT * FROM orders WHERE orders.status = 'open'");
//! ```

mod relation;
mod statement;

use serde::{Deserialize, Serialize};

pub use relation::RelationFingerprint;
pub use statement::{
    Assignment, DeleteStatement, Join, JoinKind, SelectCore, SelectStatement, SetOperation,
    UpdateStatement,
};

use crate::engine::{TenantEnforcementClause, TenantJoinEnforcementClause};

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Text value.
    Text(String),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A reference to a table by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// The table name.
    pub name: String,
}

impl Table {
    /// Creates a table reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the fingerprint of this reference when used without an alias.
    pub fn fingerprint(&self) -> RelationFingerprint {
        RelationFingerprint::table(&self.name)
    }
}

/// A relation referenced under an alias: `relation AS name`.
///
/// The relation is either a [`Table`] or a subquery.
#[derive(Debug, Clone, PartialEq)]
pub struct TableAlias {
    /// The aliased relation.
    pub relation: Box<Node>,
    /// The alias.
    pub name: String,
}

impl TableAlias {
    /// Returns the fingerprint when the alias names a plain table.
    ///
    /// Aliased subqueries have no fingerprint of their own; the tables
    /// inside them are fingerprinted individually.
    pub fn fingerprint(&self) -> Option<RelationFingerprint> {
        match self.relation.as_ref() {
            Node::Table(table) => Some(RelationFingerprint::aliased(&table.name, &self.name)),
            _ => None,
        }
    }
}

/// A column reference, qualified by the relation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The relation the column belongs to.
    pub relation: RelationFingerprint,
    /// The column name.
    pub name: String,
}

impl Attribute {
    /// Creates a column reference.
    pub fn new(relation: RelationFingerprint, name: impl Into<String>) -> Self {
        Self {
            relation,
            name: name.into(),
        }
    }

    /// Returns `self = value`.
    pub fn equals(self, value: impl Into<Value>) -> Node {
        Node::eq(Node::Attribute(self), Node::Literal(value.into()))
    }
}

impl From<Attribute> for Node {
    fn from(attribute: Attribute) -> Self {
        Node::Attribute(attribute)
    }
}

/// An equality predicate: `left = right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equality {
    /// Left operand.
    pub left: Box<Node>,
    /// Right operand.
    pub right: Box<Node>,
}

/// Comparison operators other than equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `LIKE`
    Like,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
}

impl ComparisonOp {
    /// Returns the SQL operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOp::NotEq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::In => "IN",
            ComparisonOp::NotIn => "NOT IN",
        }
    }
}

/// A binary comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// The operator.
    pub op: ComparisonOp,
    /// Left operand.
    pub left: Box<Node>,
    /// Right operand.
    pub right: Box<Node>,
}

/// A function call, e.g. `COUNT(*)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Arguments.
    pub args: Vec<Node>,
}

/// A query plan node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Table reference.
    Table(Table),
    /// Aliased table or subquery.
    TableAlias(TableAlias),
    /// Column reference.
    Attribute(Attribute),
    /// Literal value.
    Literal(Value),
    /// Positional bind parameter, rendered as `$n`.
    BindParam(usize),
    /// Raw SQL emitted verbatim.
    SqlLiteral(String),
    /// Function call.
    Function(Function),
    /// Parenthesized value list.
    List(Vec<Node>),
    /// `left = right`
    Equality(Equality),
    /// Any other binary comparison.
    Comparison(Comparison),
    /// Conjunction of predicates.
    And(Vec<Node>),
    /// Disjunction of two predicates.
    Or(Box<Node>, Box<Node>),
    /// Negation.
    Not(Box<Node>),
    /// Explicit parentheses.
    Grouping(Box<Node>),
    /// `EXISTS (subquery)`
    Exists(Box<Node>),
    /// SELECT statement.
    Select(Box<SelectStatement>),
    /// UNION of two queries.
    Union(SetOperation),
    /// Join of two relations.
    Join(Box<Join>),
    /// UPDATE statement.
    Update(Box<UpdateStatement>),
    /// DELETE statement.
    Delete(Box<DeleteStatement>),
    /// Synthetic `relation.partition_key = tenant` predicate.
    TenantClause(TenantEnforcementClause),
    /// Synthetic `relation.partition_key = other.partition_key` predicate.
    LinkClause(TenantJoinEnforcementClause),
}

impl Node {
    /// Returns a short name for the node kind, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Table(_) => "table",
            Node::TableAlias(_) => "table alias",
            Node::Attribute(_) => "attribute",
            Node::Literal(_) => "literal",
            Node::BindParam(_) => "bind parameter",
            Node::SqlLiteral(_) => "sql literal",
            Node::Function(_) => "function",
            Node::List(_) => "list",
            Node::Equality(_) => "equality",
            Node::Comparison(_) => "comparison",
            Node::And(_) => "and",
            Node::Or(_, _) => "or",
            Node::Not(_) => "not",
            Node::Grouping(_) => "grouping",
            Node::Exists(_) => "exists",
            Node::Select(_) => "select",
            Node::Union(_) => "union",
            Node::Join(_) => "join",
            Node::Update(_) => "update",
            Node::Delete(_) => "delete",
            Node::TenantClause(_) => "tenant clause",
            Node::LinkClause(_) => "link clause",
        }
    }

    /// Returns `true` for SELECT and UNION nodes.
    pub fn is_query(&self) -> bool {
        matches!(self, Node::Select(_) | Node::Union(_))
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// `name`
    pub fn table(name: impl Into<String>) -> Node {
        Node::Table(Table::new(name))
    }

    /// `table AS alias`
    pub fn aliased(table: impl Into<String>, alias: impl Into<String>) -> Node {
        Node::TableAlias(TableAlias {
            relation: Box::new(Node::table(table)),
            name: alias.into(),
        })
    }

    /// `(query) AS alias`
    pub fn subquery(query: Node, alias: impl Into<String>) -> Node {
        Node::TableAlias(TableAlias {
            relation: Box::new(query),
            name: alias.into(),
        })
    }

    /// `relation.column`
    pub fn attr(relation: &RelationFingerprint, column: impl Into<String>) -> Node {
        Node::Attribute(relation.attr(column))
    }

    /// A text literal.
    pub fn text(value: impl Into<String>) -> Node {
        Node::Literal(Value::Text(value.into()))
    }

    /// An integer literal.
    pub fn int(value: i64) -> Node {
        Node::Literal(Value::Integer(value))
    }

    /// `NULL`
    pub fn null() -> Node {
        Node::Literal(Value::Null)
    }

    /// `*`
    pub fn star() -> Node {
        Node::SqlLiteral("*".to_string())
    }

    /// `name(args...)`
    pub fn function(name: impl Into<String>, args: Vec<Node>) -> Node {
        Node::Function(Function {
            name: name.into(),
            args,
        })
    }

    /// `left = right`
    pub fn eq(left: Node, right: Node) -> Node {
        Node::Equality(Equality {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `left <op> right`
    pub fn cmp(op: ComparisonOp, left: Node, right: Node) -> Node {
        Node::Comparison(Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `left IN (query)`
    pub fn in_subquery(left: Node, query: Node) -> Node {
        Node::cmp(ComparisonOp::In, left, query)
    }

    /// `a AND b AND ...`
    pub fn and(predicates: Vec<Node>) -> Node {
        Node::And(predicates)
    }

    /// `(left OR right)`
    pub fn or(left: Node, right: Node) -> Node {
        Node::Or(Box::new(left), Box::new(right))
    }

    /// `NOT (predicate)`
    pub fn not(predicate: Node) -> Node {
        Node::Not(Box::new(predicate))
    }

    /// `(node)`
    pub fn group(node: Node) -> Node {
        Node::Grouping(Box::new(node))
    }

    /// `EXISTS (query)`
    pub fn exists(query: Node) -> Node {
        Node::Exists(Box::new(query))
    }

    /// `left <kind> JOIN right [ON on]`
    pub fn join(kind: JoinKind, left: Node, right: Node, on: Option<Node>) -> Node {
        Node::Join(Box::new(Join {
            kind,
            left,
            right,
            on,
        }))
    }

    /// Combines predicates with AND, leaving a single predicate bare.
    ///
    /// Returns `None` for an empty list.
    pub fn conjunction(mut predicates: Vec<Node>) -> Option<Node> {
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Node::And(predicates)),
        }
    }

    /// Returns `self AND other`, extending an existing conjunction in place.
    pub fn and_also(self, other: Node) -> Node {
        match self {
            Node::And(mut children) => {
                children.push(other);
                Node::And(children)
            }
            node => Node::And(vec![node, other]),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Literal(value)
    }
}
