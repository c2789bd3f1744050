//! Statement-level nodes: SELECT, joins, set operations, UPDATE and DELETE.

use super::{Node, RelationFingerprint};

/// The body of a SELECT without ORDER BY / LIMIT.
///
/// Each select-core is its own tenant scope: the relations of its `source`
/// are enforced through its `wheres`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectCore {
    /// Projected expressions.
    pub projections: Vec<Node>,
    /// The FROM tree: a table, alias, subquery or join.
    pub source: Option<Node>,
    /// WHERE predicates, implicitly combined with AND.
    pub wheres: Vec<Node>,
    /// GROUP BY expressions.
    pub groups: Vec<Node>,
    /// WINDOW definitions.
    pub windows: Vec<Node>,
    /// HAVING predicate.
    pub having: Option<Node>,
}

impl SelectCore {
    /// Creates an empty select-core.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a select-core reading from `source`.
    pub fn from_source(source: Node) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// Adds a projection.
    pub fn project(mut self, projection: Node) -> Self {
        self.projections.push(projection);
        self
    }

    /// Adds a WHERE predicate.
    pub fn filter(mut self, predicate: Node) -> Self {
        self.wheres.push(predicate);
        self
    }

    /// Adds a GROUP BY expression.
    pub fn group_by(mut self, expr: Node) -> Self {
        self.groups.push(expr);
        self
    }

    /// Adds a WINDOW definition.
    pub fn window(mut self, window: Node) -> Self {
        self.windows.push(window);
        self
    }

    /// Sets the HAVING predicate.
    pub fn having(mut self, predicate: Node) -> Self {
        self.having = Some(predicate);
        self
    }

    /// Wraps this core in a statement without ordering or limits.
    pub fn into_statement(self) -> SelectStatement {
        SelectStatement {
            core: self,
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Wraps this core in a SELECT node.
    pub fn into_node(self) -> Node {
        self.into_statement().into_node()
    }
}

/// A complete SELECT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// The select-core.
    pub core: SelectCore,
    /// ORDER BY expressions.
    pub orders: Vec<Node>,
    /// LIMIT value.
    pub limit: Option<u64>,
    /// OFFSET value.
    pub offset: Option<u64>,
}

impl SelectStatement {
    /// Adds an ORDER BY expression.
    pub fn order_by(mut self, expr: Node) -> Self {
        self.orders.push(expr);
        self
    }

    /// Sets the LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the OFFSET.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Wraps this statement in a node.
    pub fn into_node(self) -> Node {
        Node::Select(Box::new(self))
    }
}

/// `left UNION [ALL] right`
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    /// `UNION ALL` when set.
    pub all: bool,
    /// Left query.
    pub left: Box<Node>,
    /// Right query.
    pub right: Box<Node>,
}

impl SetOperation {
    /// Creates a UNION node.
    pub fn union(left: Node, right: Node, all: bool) -> Node {
        Node::Union(SetOperation {
            all,
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `CROSS JOIN`
    Cross,
    /// `LEFT OUTER JOIN`
    LeftOuter,
    /// `RIGHT OUTER JOIN`
    RightOuter,
    /// `FULL OUTER JOIN`
    FullOuter,
}

impl JoinKind {
    /// Returns `true` for the outer variants.
    ///
    /// Outer joins own their own tenant scope. Inner and cross joins are
    /// part of the enclosing select-core's source.
    pub fn is_outer(&self) -> bool {
        matches!(
            self,
            JoinKind::LeftOuter | JoinKind::RightOuter | JoinKind::FullOuter
        )
    }

    /// Returns the SQL keyword sequence.
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Cross => "CROSS JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
            JoinKind::RightOuter => "RIGHT OUTER JOIN",
            JoinKind::FullOuter => "FULL OUTER JOIN",
        }
    }
}

/// A join of two relations. Multi-way joins nest on the left.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join kind.
    pub kind: JoinKind,
    /// Left relation or nested join.
    pub left: Node,
    /// Right relation.
    pub right: Node,
    /// Join condition.
    pub on: Option<Node>,
}

impl Join {
    /// Returns the first table reference reached by walking down the left
    /// edge of `node`.
    ///
    /// For `a JOIN b JOIN c` this is `a`; for a bare relation it is the
    /// relation itself. Subqueries have no leftmost relation.
    pub fn leftmost_relation(node: &Node) -> Option<RelationFingerprint> {
        match node {
            Node::Table(table) => Some(table.fingerprint()),
            Node::TableAlias(alias) => alias.fingerprint(),
            Node::Join(join) => Self::leftmost_relation(&join.left),
            Node::Grouping(inner) => Self::leftmost_relation(inner),
            _ => None,
        }
    }
}

/// One `column = value` pair of an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Target column.
    pub column: String,
    /// New value.
    pub value: Node,
}

/// `UPDATE relation SET ... WHERE ...`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    /// Target table or alias.
    pub relation: Node,
    /// SET list.
    pub assignments: Vec<Assignment>,
    /// WHERE predicates, implicitly combined with AND.
    pub wheres: Vec<Node>,
}

impl UpdateStatement {
    /// Creates an UPDATE of `relation` with no assignments.
    pub fn new(relation: Node) -> Self {
        Self {
            relation,
            assignments: Vec::new(),
            wheres: Vec::new(),
        }
    }

    /// Adds `column = value` to the SET list.
    pub fn set(mut self, column: impl Into<String>, value: Node) -> Self {
        self.assignments.push(Assignment {
            column: column.into(),
            value,
        });
        self
    }

    /// Adds a WHERE predicate.
    pub fn filter(mut self, predicate: Node) -> Self {
        self.wheres.push(predicate);
        self
    }

    /// Wraps this statement in a node.
    pub fn into_node(self) -> Node {
        Node::Update(Box::new(self))
    }
}

/// `DELETE FROM relation WHERE ...`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    /// Target table or alias.
    pub relation: Node,
    /// WHERE predicates, implicitly combined with AND.
    pub wheres: Vec<Node>,
}

impl DeleteStatement {
    /// Creates a DELETE of every row of `relation`.
    pub fn new(relation: Node) -> Self {
        Self {
            relation,
            wheres: Vec::new(),
        }
    }

    /// Adds a WHERE predicate.
    pub fn filter(mut self, predicate: Node) -> Self {
        self.wheres.push(predicate);
        self
    }

    /// Wraps this statement in a node.
    pub fn into_node(self) -> Node {
        Node::Delete(Box::new(self))
    }
}
