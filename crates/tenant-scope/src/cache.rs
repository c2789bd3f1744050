//! Statement cache for identity lookups.
//!
//! Point lookups (`WHERE id = $1`, or by a set of unique columns) are built
//! once per column shape and reused. The cache key holds only the table and
//! column names, so a cached plan for a tenant-scoped table would carry the
//! tenant clause of whichever tenant built it first. Lookups on
//! tenant-scoped tables therefore bypass the cache and are rebuilt on every
//! call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ast::{Node, RelationFingerprint, SelectCore};
use crate::registry::TenantRegistry;

/// Cache key: a table and the columns it is looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupKey {
    /// The table.
    pub table: String,
    /// The lookup columns, in bind order.
    pub columns: Vec<String>,
}

impl LookupKey {
    /// Creates a key.
    pub fn new(table: impl Into<String>, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a primary key lookup on `id`.
    pub fn primary_key(table: impl Into<String>) -> Self {
        Self::new(table, ["id"])
    }

    /// Builds `SELECT * FROM table WHERE c1 = $1 AND ... LIMIT 1`.
    pub fn build_plan(&self) -> Node {
        let relation = RelationFingerprint::table(&self.table);
        let core = self.columns.iter().enumerate().fold(
            SelectCore::from_source(Node::table(&self.table)).project(Node::star()),
            |core, (i, column)| core.filter(Node::eq(Node::attr(&relation, column), Node::BindParam(i + 1))),
        );
        core.into_statement().limit(1).into_node()
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.columns.join(", "))
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that built and stored a plan.
    pub misses: u64,
    /// Lookups on tenant-scoped tables, always rebuilt.
    pub bypassed: u64,
    /// Plans currently stored.
    pub entries: usize,
}

/// Cache of built lookup plans.
pub struct StatementCache {
    registry: Arc<dyn TenantRegistry>,
    entries: Mutex<HashMap<LookupKey, Arc<Node>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    bypassed: AtomicU64,
}

impl StatementCache {
    /// Creates an empty cache.
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self {
            registry,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
        }
    }

    /// Returns the plan for `key`, building it with `build` when needed.
    ///
    /// For tenant-scoped tables `build` runs on every call and its result is
    /// never stored.
    pub fn fetch<E>(
        &self,
        key: &LookupKey,
        build: impl FnOnce(&LookupKey) -> Result<Node, E>,
    ) -> Result<Arc<Node>, E> {
        if self.registry.is_tenant_scoped(&key.table) {
            self.bypassed.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Tenant-scoped lookup, bypassing statement cache");
            return build(key).map(Arc::new);
        }

        if let Some(plan) = self.entries.lock().get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(plan));
        }

        let plan = Arc::new(build(key)?);
        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        let stored = entries.entry(key.clone()).or_insert(plan);
        Ok(Arc::clone(stored))
    }

    /// Drops every cached plan for `table`, returning how many were removed.
    ///
    /// Call this when a table's registration changes.
    pub fn invalidate(&self, table: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| key.table != table);
        before - entries.len()
    }

    /// Drops every cached plan.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns the number of cached plans.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl fmt::Debug for StatementCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
