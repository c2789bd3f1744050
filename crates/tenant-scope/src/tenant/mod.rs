//! Tenant identity and call-scoped tenant state.
//!
//! # Core Types
//!
//! - [`TenantId`] - Opaque tenant identifier
//! - [`CurrentTenant`] - The tenant bound to the current task or call
//! - [`WriteOnlyMode`] - Per-call switch that disables predicate injection
//! - [`ScopeOptions`] - Explicit snapshot of both, handed to the engine
//!
//! # Examples
//!
//! ```
//! use helios_tenant_scope::tenant::{CurrentTenant, ScopeOptions, TenantId};
//!
//! let options = CurrentTenant::sync_scope("acme", ScopeOptions::current);
//! assert_eq!(options.tenant(), Some(&TenantId::new("acme")));
//! ```

mod current;
mod id;

pub use current::{CurrentTenant, ScopeOptions, WriteOnlyMode};
pub use id::TenantId;
