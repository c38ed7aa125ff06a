use crate::error::{Result, TenantError};
use crate::identifier::TenantIdentifier;
use std::collections::HashSet;
use std::sync::Arc;

/// Fixed set of known tenants, built once at startup.
///
/// Iteration follows insertion order so migration logs line up with the
/// configured tenant list. Cloning is cheap; all clones share the same set.
#[derive(Debug, Clone)]
pub struct TenantRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    ordered: Vec<TenantIdentifier>,
}

impl TenantRegistry {
    /// Build a registry from already validated identifiers.
    ///
    /// Duplicates collapse to their first occurrence. The default schema may
    /// not double as a tenant, otherwise requests could address it directly.
    pub fn new(
        tenants: impl IntoIterator<Item = TenantIdentifier>,
        default_schema: &TenantIdentifier,
    ) -> Result<Self> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();

        for tenant in tenants {
            if &tenant == default_schema {
                return Err(TenantError::ReservedSchema(tenant.to_string()));
            }
            if seen.insert(tenant.as_str().to_string()) {
                ordered.push(tenant);
            } else {
                tracing::warn!("Ignoring duplicate tenant schema in configuration (schema={})", tenant);
            }
        }

        if ordered.is_empty() {
            return Err(TenantError::EmptyRegistry);
        }

        Ok(Self {
            inner: Arc::new(RegistryInner { ordered }),
        })
    }

    /// Parse a comma-separated list such as `company_x,company_y`.
    pub fn parse(list: &str, default_schema: &TenantIdentifier) -> Result<Self> {
        let tenants = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(TenantIdentifier::new)
            .collect::<Result<Vec<_>>>()?;

        Self::new(tenants, default_schema)
    }

    /// Validate a raw identifier (e.g. from a request header) against the registry.
    pub fn resolve(&self, raw: &str) -> Result<TenantIdentifier> {
        self.inner
            .ordered
            .iter()
            .find(|t| t.as_str() == raw)
            .cloned()
            .ok_or_else(|| TenantError::UnknownTenant(raw.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TenantIdentifier> {
        self.inner.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.ordered.is_empty()
    }
}

impl<'a> IntoIterator for &'a TenantRegistry {
    type Item = &'a TenantIdentifier;
    type IntoIter = std::slice::Iter<'a, TenantIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.ordered.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public() -> TenantIdentifier {
        TenantIdentifier::new("public").unwrap()
    }

    #[test]
    fn test_parse_preserves_insertion_order() {
        let registry = TenantRegistry::parse("zeta, alpha,company_x", &public()).unwrap();
        let names: Vec<&str> = registry.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "company_x"]);
    }

    #[test]
    fn test_duplicates_and_blanks_collapse() {
        let registry = TenantRegistry::parse("tenant_a,,tenant_b,tenant_a", &public()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(matches!(
            TenantRegistry::parse(" , ", &public()),
            Err(TenantError::EmptyRegistry)
        ));
    }

    #[test]
    fn test_default_schema_is_reserved() {
        assert!(matches!(
            TenantRegistry::parse("tenant_a,public", &public()),
            Err(TenantError::ReservedSchema(_))
        ));
    }

    #[test]
    fn test_invalid_member_rejected() {
        assert!(matches!(
            TenantRegistry::parse("tenant_a,bad-name", &public()),
            Err(TenantError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let registry = TenantRegistry::parse("company_x", &public()).unwrap();
        assert_eq!(registry.resolve("company_x").unwrap().as_str(), "company_x");
        assert!(registry.resolve("COMPANY_X").is_err());
        assert!(matches!(
            registry.resolve("unknown"),
            Err(TenantError::UnknownTenant(ref t)) if t == "unknown"
        ));
    }
}
