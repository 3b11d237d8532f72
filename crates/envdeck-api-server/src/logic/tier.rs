use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::primitives::FromSqlValue;
use std::fmt;
use utoipa::ToSchema;

/// Environment tier a value belongs to.
///
/// Tiers are a small fixed enumeration; tier names arriving over the wire are
/// parsed case-insensitively into this type at the API edge, so everything
/// below the routers works with the typed form rather than permission-name
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, JsonSchema)]
pub enum EnvironmentTier {
    #[serde(alias = "development")]
    Development,
    #[serde(alias = "staging")]
    Staging,
    #[serde(alias = "production")]
    Production,
}

impl EnvironmentTier {
    /// Canonical capitalized display form, e.g. "Production".
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentTier::Development => "Development",
            EnvironmentTier::Staging => "Staging",
            EnvironmentTier::Production => "Production",
        }
    }

    /// Lowercase form used for download filenames (`.env.<suffix>`).
    pub fn file_suffix(&self) -> &'static str {
        match self {
            EnvironmentTier::Development => "development",
            EnvironmentTier::Staging => "staging",
            EnvironmentTier::Production => "production",
        }
    }

    /// Parse a tier name case-insensitively ("production" -> Production).
    pub fn parse(s: &str) -> Option<EnvironmentTier> {
        match s.to_lowercase().as_str() {
            "development" => Some(EnvironmentTier::Development),
            "staging" => Some(EnvironmentTier::Staging),
            "production" => Some(EnvironmentTier::Production),
            _ => None,
        }
    }

    pub fn all() -> [EnvironmentTier; 3] {
        [
            EnvironmentTier::Development,
            EnvironmentTier::Staging,
            EnvironmentTier::Production,
        ]
    }
}

impl fmt::Display for EnvironmentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromSqlValue for EnvironmentTier {
    fn from_sql(value: libsql::Value) -> Result<Self, anyhow::Error> {
        match value {
            libsql::Value::Text(s) => EnvironmentTier::parse(&s)
                .ok_or_else(|| anyhow::anyhow!("unknown tier column value: {s}")),
            other => Err(anyhow::anyhow!("expected tier text column, got {other:?}")),
        }
    }
}

impl From<EnvironmentTier> for libsql::Value {
    fn from(val: EnvironmentTier) -> Self {
        libsql::Value::Text(val.as_str().to_string())
    }
}

#[cfg(test)]
mod unit_test {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            EnvironmentTier::parse("production"),
            Some(EnvironmentTier::Production)
        );
        assert_eq!(
            EnvironmentTier::parse("PRODUCTION"),
            Some(EnvironmentTier::Production)
        );
        assert_eq!(
            EnvironmentTier::parse("StAgInG"),
            Some(EnvironmentTier::Staging)
        );
        assert_eq!(EnvironmentTier::parse("qa"), None);
    }

    #[test]
    fn test_canonical_display_form() {
        assert_eq!(EnvironmentTier::Production.as_str(), "Production");
        assert_eq!(EnvironmentTier::Development.file_suffix(), "development");
    }
}
