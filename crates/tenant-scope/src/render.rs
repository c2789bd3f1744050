//! SQL rendering.
//!
//! Plans render in two modes. [`Node::to_sql`] inlines literals, which is
//! convenient for logging and assertions. [`Node::to_fragment`] replaces
//! every literal with a numbered `?N` placeholder and collects the values
//! into a [`SqlFragment`], ready to be bound by a driver. Existing
//! [`Node::BindParam`] placeholders are emitted as `$n` in both modes.
//!
//! Tenant and link clauses render exactly like the equality they stand for.

use std::fmt;

use crate::ast::{Attribute, Join, JoinKind, Node, SelectStatement, Value};

/// A SQL fragment with associated parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// The SQL string with `?N` placeholders.
    pub sql: String,
    /// The parameter values, in placeholder order.
    pub params: Vec<SqlParam>,
}

/// A SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Text parameter.
    Text(String),
    /// Integer parameter.
    Integer(i64),
    /// Boolean parameter.
    Bool(bool),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a text parameter.
    pub fn text(s: &str) -> Self {
        SqlParam::Text(s.to_string())
    }
}

impl From<&Value> for SqlParam {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Bool(*b),
            Value::Integer(n) => SqlParam::Integer(*n),
            Value::Text(s) => SqlParam::Text(s.clone()),
        }
    }
}

impl SqlFragment {
    /// Creates a new fragment with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl Node {
    /// Renders this node as SQL with literals inlined.
    pub fn to_sql(&self) -> String {
        let mut writer = SqlWriter::inline();
        writer.statement(self);
        writer.sql
    }

    /// Renders this node as SQL with literals extracted as parameters.
    pub fn to_fragment(&self) -> SqlFragment {
        let mut writer = SqlWriter::bound();
        writer.statement(self);
        SqlFragment::with_params(writer.sql, writer.params.unwrap_or_default())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Quotes an identifier unless it is a plain lowercase name.
pub fn quote_ident(ident: &str) -> String {
    let mut chars = ident.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Quotes a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

struct SqlWriter {
    sql: String,
    /// `Some` in bound mode.
    params: Option<Vec<SqlParam>>,
}

impl SqlWriter {
    fn inline() -> Self {
        Self {
            sql: String::new(),
            params: None,
        }
    }

    fn bound() -> Self {
        Self {
            sql: String::new(),
            params: Some(Vec::new()),
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn list(&mut self, nodes: &[Node], separator: &str) {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.expr(node);
        }
    }

    /// Writes a node in statement position: queries are not parenthesized.
    fn statement(&mut self, node: &Node) {
        match node {
            Node::Select(select) => self.select(select),
            Node::Union(op) => {
                self.statement(&op.left);
                self.push(if op.all { " UNION ALL " } else { " UNION " });
                self.statement(&op.right);
            }
            Node::Update(update) => {
                self.push("UPDATE ");
                self.expr(&update.relation);
                self.push(" SET ");
                for (i, assignment) in update.assignments.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push(&quote_ident(&assignment.column));
                    self.push(" = ");
                    self.expr(&assignment.value);
                }
                self.wheres(&update.wheres);
            }
            Node::Delete(delete) => {
                self.push("DELETE FROM ");
                self.expr(&delete.relation);
                self.wheres(&delete.wheres);
            }
            other => self.expr(other),
        }
    }

    fn select(&mut self, select: &SelectStatement) {
        let core = &select.core;
        self.push("SELECT ");
        if core.projections.is_empty() {
            self.push("*");
        } else {
            self.list(&core.projections, ", ");
        }
        if let Some(source) = &core.source {
            self.push(" FROM ");
            self.expr(source);
        }
        self.wheres(&core.wheres);
        if !core.groups.is_empty() {
            self.push(" GROUP BY ");
            self.list(&core.groups, ", ");
        }
        if let Some(having) = &core.having {
            self.push(" HAVING ");
            self.expr(having);
        }
        if !core.windows.is_empty() {
            self.push(" WINDOW ");
            self.list(&core.windows, ", ");
        }
        if !select.orders.is_empty() {
            self.push(" ORDER BY ");
            self.list(&select.orders, ", ");
        }
        if let Some(limit) = select.limit {
            self.push(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = select.offset {
            self.push(&format!(" OFFSET {}", offset));
        }
    }

    fn wheres(&mut self, wheres: &[Node]) {
        if !wheres.is_empty() {
            self.push(" WHERE ");
            self.list(wheres, " AND ");
        }
    }

    fn join(&mut self, join: &Join) {
        self.expr(&join.left);
        self.push(" ");
        self.push(join.kind.keyword());
        self.push(" ");
        if matches!(join.right, Node::Join(_)) {
            self.push("(");
            self.expr(&join.right);
            self.push(")");
        } else {
            self.expr(&join.right);
        }
        if let Some(on) = &join.on {
            self.push(" ON ");
            self.expr(on);
        } else if join.kind != JoinKind::Cross {
            self.push(" ON TRUE");
        }
    }

    fn attribute(&mut self, attribute: &Attribute) {
        self.push(&quote_ident(attribute.relation.qualifier()));
        self.push(".");
        self.push(&quote_ident(&attribute.name));
    }

    fn value(&mut self, value: &Value) {
        if let Some(params) = self.params.as_mut() {
            params.push(SqlParam::from(value));
            let placeholder = format!("?{}", params.len());
            self.push(&placeholder);
            return;
        }
        match value {
            Value::Null => self.push("NULL"),
            Value::Bool(true) => self.push("TRUE"),
            Value::Bool(false) => self.push("FALSE"),
            Value::Integer(n) => self.push(&n.to_string()),
            Value::Text(s) => self.push(&quote_literal(s)),
        }
    }

    fn equality(&mut self, left: &Node, right: &Node) {
        self.expr(left);
        if matches!(right, Node::Literal(Value::Null)) {
            self.push(" IS NULL");
        } else {
            self.push(" = ");
            self.expr(right);
        }
    }

    /// Writes a node in expression position: queries are parenthesized.
    fn expr(&mut self, node: &Node) {
        match node {
            Node::Table(table) => self.push(&quote_ident(&table.name)),
            Node::TableAlias(alias) => {
                match alias.relation.as_ref() {
                    Node::Table(_) | Node::Grouping(_) | Node::Select(_) | Node::Union(_) => {
                        self.expr(&alias.relation)
                    }
                    other => {
                        self.push("(");
                        self.expr(other);
                        self.push(")");
                    }
                }
                self.push(" AS ");
                self.push(&quote_ident(&alias.name));
            }
            Node::Attribute(attribute) => self.attribute(attribute),
            Node::Literal(value) => self.value(value),
            Node::BindParam(n) => self.push(&format!("${}", n)),
            Node::SqlLiteral(raw) => self.push(raw),
            Node::Function(function) => {
                self.push(&function.name);
                self.push("(");
                self.list(&function.args, ", ");
                self.push(")");
            }
            Node::List(items) => {
                self.push("(");
                self.list(items, ", ");
                self.push(")");
            }
            Node::Equality(eq) => self.equality(&eq.left, &eq.right),
            Node::Comparison(cmp) => {
                self.expr(&cmp.left);
                self.push(" ");
                self.push(cmp.op.as_sql());
                self.push(" ");
                self.expr(&cmp.right);
            }
            Node::And(children) => self.list(children, " AND "),
            Node::Or(left, right) => {
                self.push("(");
                self.expr(left);
                self.push(" OR ");
                self.expr(right);
                self.push(")");
            }
            Node::Not(inner) => {
                self.push("NOT (");
                self.expr(inner);
                self.push(")");
            }
            Node::Grouping(inner) => {
                self.push("(");
                self.statement(inner);
                self.push(")");
            }
            Node::Exists(query) => {
                self.push("EXISTS ");
                self.expr(query);
            }
            Node::Select(_) | Node::Union(_) | Node::Update(_) | Node::Delete(_) => {
                self.push("(");
                self.statement(node);
                self.push(")");
            }
            Node::Join(join) => self.join(join),
            Node::TenantClause(clause) => {
                self.attribute(&clause.attribute);
                self.push(" = ");
                self.value(&clause.tenant);
            }
            Node::LinkClause(clause) => {
                self.attribute(&clause.attribute);
                self.push(" = ");
                self.attribute(&clause.other);
            }
        }
    }
}
