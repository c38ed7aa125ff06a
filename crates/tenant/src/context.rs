//! Task-scoped "current tenant" slot.
//!
//! The slot lives in tokio task-local storage and exists only while a tenant
//! unit of work is running (see [`TenantContext::scope`]). When the unit ends,
//! whether it completes, errors, panics or is cancelled, the slot is dropped
//! with it, so a worker task that handles the next request starts empty.
//! Tasks spawned from inside a unit do not inherit the tenant.

use crate::error::{Result, TenantError};
use crate::identifier::TenantIdentifier;
use std::cell::RefCell;
use std::future::Future;

tokio::task_local! {
    static CURRENT_TENANT: RefCell<Option<TenantIdentifier>>;
}

/// Accessor for the tenant bound to the running unit of work.
///
/// No validation happens here; callers bind only identifiers they already
/// checked against the [`TenantRegistry`](crate::TenantRegistry).
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantContext;

impl TenantContext {
    /// Run `f` as a unit of work with `tenant` bound (or nothing, for
    /// administrative work that should land in the default schema).
    pub async fn scope<F>(tenant: Option<TenantIdentifier>, f: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(RefCell::new(tenant), f).await
    }

    /// Blocking counterpart of [`TenantContext::scope`].
    pub fn sync_scope<F, R>(tenant: Option<TenantIdentifier>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CURRENT_TENANT.sync_scope(RefCell::new(tenant), f)
    }

    /// Tenant of the current unit of work, or `None` when unset or when no
    /// unit is running.
    pub fn get() -> Option<TenantIdentifier> {
        CURRENT_TENANT
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    pub fn set(tenant: TenantIdentifier) -> Result<()> {
        CURRENT_TENANT
            .try_with(|slot| {
                *slot.borrow_mut() = Some(tenant);
            })
            .map_err(|_| TenantError::NoUnitOfWork)
    }

    pub fn clear() -> Result<()> {
        CURRENT_TENANT
            .try_with(|slot| {
                slot.borrow_mut().take();
            })
            .map_err(|_| TenantError::NoUnitOfWork)
    }
}

/// Bracket a request: bind `tenant` for the duration of `f`, release it after.
///
/// `tenant` must already be validated against the registry.
pub async fn run_tenant_unit<F>(tenant: TenantIdentifier, f: F) -> F::Output
where
    F: Future,
{
    tracing::debug!("Beginning tenant unit (tenant={})", tenant);
    let output = TenantContext::scope(Some(tenant), f).await;
    tracing::debug!("Ended tenant unit");
    output
}
