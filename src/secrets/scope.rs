//! Scope keys: where a registry's secret lives in an external backend.

use std::fmt;

use super::error::{Result, SecretsError};

const SCOPE_KEY_PREFIX: &str = "cat-";

/// Deterministic, collision-free backend path for (tenant, registry name).
///
/// Rendered as `cat-{tenant length}-{tenant}_{name}`. The length prefix makes
/// the split between tenant and name unambiguous, so tenant `a` + name `b-c`
/// and tenant `a-b` + name `c` never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    tenant: String,
    name: String,
    rendered: String,
}

impl ScopeKey {
    pub fn new(tenant: &str, name: &str) -> Result<Self> {
        validate_component(tenant, "tenant")?;
        validate_component(name, "registry name")?;
        Ok(Self {
            tenant: tenant.to_string(),
            name: name.to_string(),
            rendered: format!("{}{}-{}_{}", SCOPE_KEY_PREFIX, tenant.len(), tenant, name),
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Recover the (tenant, name) pair from a rendered key.
    pub fn parse(rendered: &str) -> Option<(&str, &str)> {
        let rest = rendered.strip_prefix(SCOPE_KEY_PREFIX)?;
        let (len, rest) = rest.split_once('-')?;
        let len: usize = len.parse().ok()?;
        let tenant = rest.get(..len)?;
        let name = rest.get(len..)?.strip_prefix('_')?;
        Some((tenant, name))
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Reject components that would escape or alias a backend path.
fn validate_component(component: &str, component_name: &str) -> Result<()> {
    if component.is_empty() {
        return Err(SecretsError::invalid_key(component, format!("{} cannot be empty", component_name)));
    }

    if component.contains('/') {
        return Err(SecretsError::invalid_key(
            component,
            format!("{} cannot contain '/' (path separator)", component_name),
        ));
    }

    if component.contains("..") {
        return Err(SecretsError::invalid_key(
            component,
            format!("{} cannot contain '..' (path traversal)", component_name),
        ));
    }

    if component.chars().any(char::is_whitespace) {
        return Err(SecretsError::invalid_key(
            component,
            format!("{} cannot contain whitespace", component_name),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scope_key_format() {
        let key = ScopeKey::new("project-1", "harbor").unwrap();
        assert_eq!(key.as_str(), "cat-9-project-1_harbor");
        assert_eq!(ScopeKey::parse(key.as_str()), Some(("project-1", "harbor")));
        assert_eq!(key.tenant(), "project-1");
    }

    #[test]
    fn test_hyphen_split_does_not_collide() {
        let first = ScopeKey::new("a", "b-c").unwrap();
        let second = ScopeKey::new("a-b", "c").unwrap();
        assert_eq!(first.as_str(), "cat-1-a_b-c");
        assert_eq!(second.as_str(), "cat-3-a-b_c");
        assert_ne!(first.as_str(), second.as_str());
    }

    #[test]
    fn test_underscore_split_does_not_collide() {
        let first = ScopeKey::new("a_b", "c").unwrap();
        let second = ScopeKey::new("a", "b_c").unwrap();
        assert_eq!(first.as_str(), "cat-3-a_b_c");
        assert_eq!(second.as_str(), "cat-1-a_b_c");
        assert_ne!(first.as_str(), second.as_str());
    }

    #[test]
    fn test_rejects_path_components() {
        assert!(matches!(ScopeKey::new("", "reg"), Err(SecretsError::InvalidKey { .. })));
        assert!(ScopeKey::new("tenant", "").is_err());
        assert!(ScopeKey::new("ten/ant", "reg").is_err());
        assert!(ScopeKey::new("tenant", "..").is_err());
        assert!(ScopeKey::new("tenant", "re g").is_err());
    }

    fn component() -> impl Strategy<Value = String> {
        "[a-z0-9_-]{1,12}"
    }

    proptest! {
        #[test]
        fn prop_components_roundtrip(tenant in component(), name in component()) {
            let key = ScopeKey::new(&tenant, &name).unwrap();
            prop_assert_eq!(ScopeKey::parse(key.as_str()), Some((tenant.as_str(), name.as_str())));
        }

        #[test]
        fn prop_distinct_pairs_have_distinct_keys(
            t1 in component(), n1 in component(), t2 in component(), n2 in component()
        ) {
            prop_assume!((&t1, &n1) != (&t2, &n2));
            let k1 = ScopeKey::new(&t1, &n1).unwrap();
            let k2 = ScopeKey::new(&t2, &n2).unwrap();
            prop_assert_ne!(k1.as_str(), k2.as_str());
        }
    }
}
