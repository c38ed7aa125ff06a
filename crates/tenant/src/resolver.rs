use crate::context::TenantContext;
use crate::identifier::TenantIdentifier;

/// Decides which schema the current unit of work binds to.
pub trait CurrentTenantResolver: Send + Sync {
    /// Tenant bound to the running unit of work, or the fallback schema.
    /// Never fails: "no tenant" is the administrative/background path.
    fn resolve_current(&self) -> TenantIdentifier;

    /// Whether a session opened for a previously resolved tenant may be reused
    /// after the tenant changes. Schema-per-tenant routing always answers no.
    fn validate_existing_sessions(&self) -> bool {
        false
    }
}

/// Resolver backed by the task-local [`TenantContext`].
#[derive(Debug, Clone)]
pub struct TenantIdentifierResolver {
    default_schema: TenantIdentifier,
}

impl TenantIdentifierResolver {
    pub fn new(default_schema: TenantIdentifier) -> Self {
        Self { default_schema }
    }
}

impl CurrentTenantResolver for TenantIdentifierResolver {
    fn resolve_current(&self) -> TenantIdentifier {
        let tenant = TenantContext::get().unwrap_or_else(|| self.default_schema.clone());
        tracing::debug!("Resolving tenant identifier (tenant={})", tenant);
        tenant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::run_tenant_unit;

    fn resolver() -> TenantIdentifierResolver {
        TenantIdentifierResolver::new(TenantIdentifier::new("public").unwrap())
    }

    #[tokio::test]
    async fn test_falls_back_to_default_schema() {
        let resolver = resolver();
        assert_eq!(resolver.resolve_current().as_str(), "public");

        TenantContext::scope(None, async {
            assert_eq!(resolver.resolve_current().as_str(), "public");
        })
        .await;
    }

    #[tokio::test]
    async fn test_resolves_bound_tenant() {
        let resolver = resolver();
        let tenant = TenantIdentifier::new("company_x").unwrap();
        run_tenant_unit(tenant, async {
            assert_eq!(resolver.resolve_current().as_str(), "company_x");
        })
        .await;
    }

    #[tokio::test]
    async fn test_no_leak_into_next_unit() {
        let resolver = resolver();
        run_tenant_unit(TenantIdentifier::new("company_x").unwrap(), async {}).await;

        TenantContext::scope(None, async {
            assert_eq!(resolver.resolve_current().as_str(), "public");
        })
        .await;
    }

    #[test]
    fn test_sessions_never_revalidated() {
        assert!(!resolver().validate_existing_sessions());
    }
}
