//! Call-scoped tenant state.
//!
//! The current tenant and the write-only flag live in task-locals, so a value
//! is only visible inside the future (or closure) it was scoped to. Two
//! concurrent requests for different tenants never observe each other's
//! values, and code running outside any scope sees no tenant at all.
//!
//! The engine itself never reads these directly. [`ScopeOptions::current`]
//! snapshots them at the moment a plan is built and the snapshot is passed
//! down explicitly.

use std::future::Future;

use super::id::TenantId;

tokio::task_local! {
    static CURRENT_TENANT: Option<TenantId>;
    static WRITE_ONLY: bool;
}

/// Accessor for the tenant bound to the current task or call.
///
/// # Examples
///
/// ```
/// use helios_tenant_scope::tenant::{CurrentTenant, TenantId};
///
/// assert_eq!(CurrentTenant::get(), None);
///
/// let seen = CurrentTenant::sync_scope(TenantId::new("acme"), CurrentTenant::get);
/// assert_eq!(seen, Some(TenantId::new("acme")));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CurrentTenant;

impl CurrentTenant {
    /// Returns the tenant bound to the current scope, if any.
    pub fn get() -> Option<TenantId> {
        CURRENT_TENANT
            .try_with(|tenant| tenant.clone())
            .ok()
            .flatten()
    }

    /// Returns `true` if a tenant is bound to the current scope.
    pub fn is_set() -> bool {
        Self::get().is_some()
    }

    /// Runs `future` with `tenant` as the current tenant.
    pub async fn scope<F: Future>(tenant: impl Into<TenantId>, future: F) -> F::Output {
        CURRENT_TENANT.scope(Some(tenant.into()), future).await
    }

    /// Runs `f` synchronously with `tenant` as the current tenant.
    pub fn sync_scope<R>(tenant: impl Into<TenantId>, f: impl FnOnce() -> R) -> R {
        CURRENT_TENANT.sync_scope(Some(tenant.into()), f)
    }

    /// Runs `f` with no current tenant, even if an outer scope set one.
    pub fn sync_without<R>(f: impl FnOnce() -> R) -> R {
        CURRENT_TENANT.sync_scope(None, f)
    }
}

/// Accessor for the write-only flag of the current task or call.
///
/// While enabled, plans are built without any tenant predicates. This is
/// used for writes that must reach rows regardless of tenant, such as data
/// migrations.
#[derive(Debug, Clone, Copy)]
pub struct WriteOnlyMode;

impl WriteOnlyMode {
    /// Returns `true` if write-only mode is enabled for the current scope.
    pub fn is_enabled() -> bool {
        WRITE_ONLY.try_with(|enabled| *enabled).unwrap_or(false)
    }

    /// Runs `future` with write-only mode set to `enabled`.
    pub async fn scope<F: Future>(enabled: bool, future: F) -> F::Output {
        WRITE_ONLY.scope(enabled, future).await
    }

    /// Runs `f` synchronously with write-only mode set to `enabled`.
    pub fn sync_scope<R>(enabled: bool, f: impl FnOnce() -> R) -> R {
        WRITE_ONLY.sync_scope(enabled, f)
    }
}

/// The explicit inputs of one rewrite: which tenant to enforce and whether
/// enforcement is switched off.
///
/// The tenant is captured once, when the options are created, and every
/// clause built from these options carries that value.
///
/// # Examples
///
/// ```
/// use helios_tenant_scope::tenant::{ScopeOptions, TenantId};
///
/// let options = ScopeOptions::for_tenant("acme");
/// assert_eq!(options.tenant(), Some(&TenantId::new("acme")));
/// assert!(!options.is_write_only());
///
/// let unscoped = ScopeOptions::default();
/// assert_eq!(unscoped.tenant(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeOptions {
    /// The tenant to enforce, or `None` to skip tenant clauses.
    pub tenant: Option<TenantId>,
    /// When `true`, no predicates are injected at all.
    pub write_only: bool,
}

impl ScopeOptions {
    /// Creates options that enforce the given tenant.
    pub fn for_tenant(tenant: impl Into<TenantId>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            write_only: false,
        }
    }

    /// Snapshots the task-local tenant and write-only flag.
    pub fn current() -> Self {
        Self {
            tenant: CurrentTenant::get(),
            write_only: WriteOnlyMode::is_enabled(),
        }
    }

    /// Sets the write-only flag.
    pub fn with_write_only(mut self, write_only: bool) -> Self {
        self.write_only = write_only;
        self
    }

    /// Returns the tenant to enforce, if any.
    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    /// Returns `true` if injection is disabled.
    pub fn is_write_only(&self) -> bool {
        self.write_only
    }
}
