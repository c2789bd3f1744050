//! Error types for tenant scoping.
//!
//! Errors are split by the layer that raises them: [`ScopeError`] for the
//! discovery/rewrite engine and the mutation adapters, [`ConfigError`] for
//! loading configuration and validating tenant identifiers. [`Error`] wraps
//! both for callers that go through the [`Planner`](crate::planner::Planner).

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::engine::{ScopeId, ScopeOwner};
use crate::tenant::TenantId;

/// The top-level error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Plan rewriting errors
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while rewriting a query plan.
///
/// A missing current tenant is deliberately not represented here: it
/// suppresses tenant clause injection without failing the rewrite.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// A scope context was matched against a plan node of a different kind.
    ///
    /// Contexts are only created for select-cores and outer joins, so this
    /// indicates that discovery and rewriting disagree about the plan shape.
    #[error("unrecognized context {scope}: recorded for {expected}, plan has {found}")]
    UnrecognizedContext {
        scope: ScopeId,
        expected: ScopeOwner,
        found: ScopeOwner,
    },

    /// The rewriter reached a scope-owning node that discovery never recorded.
    #[error("no scope context recorded for {owner} at position {scope}")]
    MissingContext { scope: ScopeId, owner: ScopeOwner },

    /// Discovery recorded more contexts than the rewriter could place.
    #[error("{remaining} scope context(s) were never matched to a plan node")]
    UnconsumedContexts { remaining: usize },

    /// The mutation adapter was handed something other than UPDATE/DELETE.
    #[error("cannot scope a {kind} node as a mutation, expected UPDATE or DELETE")]
    InvalidMutationTarget { kind: &'static str },

    /// The table named for a mutation is not the statement's target.
    #[error("mutation target is {found}, expected {expected}")]
    MutationTargetMismatch { expected: String, found: String },
}

/// Errors related to configuration and tenant id validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The tenant id pattern is not a valid regular expression.
    #[error("invalid tenant id pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The configuration document could not be parsed.
    #[error("failed to parse scoping configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read scoping configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The same table was declared twice.
    #[error("table {table} is declared more than once")]
    DuplicateTable { table: String },

    /// A tenant id failed validation.
    #[error("invalid tenant id {tenant_id}: {reason}")]
    InvalidTenantId { tenant_id: TenantId, reason: String },
}

/// Result type alias for operations that may fail with any crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for plan rewriting.
pub type ScopeResult<T> = std::result::Result<T, ScopeError>;
