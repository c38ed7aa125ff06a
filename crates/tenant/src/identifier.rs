use crate::error::{Result, TenantError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// PostgreSQL truncates identifiers longer than NAMEDATALEN - 1 bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

lazy_static::lazy_static! {
    static ref SCHEMA_NAME_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").unwrap();
}

/// Opaque, case-sensitive token naming a tenant schema (e.g. `company_x`).
///
/// Construction validates the value as a schema name, so every
/// `TenantIdentifier` can be quoted into SQL with [`TenantIdentifier::quoted`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantIdentifier(String);

impl TenantIdentifier {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        if value.is_empty() {
            return Err(TenantError::invalid(&value, "identifier is empty"));
        }
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(TenantError::invalid(
                &value,
                &format!("identifier exceeds {} bytes", MAX_IDENTIFIER_LEN),
            ));
        }
        if !SCHEMA_NAME_REGEX.is_match(&value) {
            return Err(TenantError::invalid(
                &value,
                "must start with a letter or underscore and contain only letters, digits, '_' or '$'",
            ));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for use as an SQL identifier.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for TenantIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantIdentifier {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TenantIdentifier {
    type Error = TenantError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantIdentifier> for String {
    fn from(id: TenantIdentifier) -> Self {
        id.0
    }
}

impl std::str::FromStr for TenantIdentifier {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
