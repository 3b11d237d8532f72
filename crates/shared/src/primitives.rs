use std::{fmt, str::FromStr};

use base64::Engine;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{
    IntoParams, PartialSchema, ToSchema,
    openapi::{ObjectBuilder, Type},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(transparent)]
pub struct WrappedUuidV4(uuid::Uuid);

impl Default for WrappedUuidV4 {
    fn default() -> Self {
        Self::new()
    }
}

impl WrappedUuidV4 {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn get_inner(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl FromStr for WrappedUuidV4 {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl fmt::Display for WrappedUuidV4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WrappedUuidV4 {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(uuid::Uuid::parse_str(&value)?))
    }
}

/// Conversion from a raw SQLite column value into a typed field.
///
/// The libsql crate keeps its own column-decoding trait sealed, so typed
/// row access for our wrapper types goes through this trait instead;
/// repositories read columns with `Row::get_value` and convert here.
pub trait FromSqlValue: Sized {
    fn from_sql(value: libsql::Value) -> Result<Self, anyhow::Error>;
}

impl FromSqlValue for String {
    fn from_sql(value: libsql::Value) -> Result<Self, anyhow::Error> {
        match value {
            libsql::Value::Text(s) => Ok(s),
            other => Err(anyhow::anyhow!("expected text column, got {other:?}")),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql(value: libsql::Value) -> Result<Self, anyhow::Error> {
        match value {
            libsql::Value::Integer(i) => Ok(i),
            other => Err(anyhow::anyhow!("expected integer column, got {other:?}")),
        }
    }
}

impl FromSqlValue for WrappedUuidV4 {
    fn from_sql(value: libsql::Value) -> Result<Self, anyhow::Error> {
        match value {
            libsql::Value::Text(s) => WrappedUuidV4::try_from(s),
            other => Err(anyhow::anyhow!("expected uuid text column, got {other:?}")),
        }
    }
}

impl From<WrappedUuidV4> for libsql::Value {
    fn from(val: WrappedUuidV4) -> Self {
        libsql::Value::Text(val.to_string())
    }
}

pub trait SqlMigrationLoader {
    fn load_sql_migrations() -> BTreeMap<&'static str, BTreeMap<&'static str, &'static str>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(transparent)]
pub struct WrappedChronoDateTime(chrono::DateTime<chrono::Utc>);

impl WrappedChronoDateTime {
    pub fn get_inner(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }

    pub fn new(value: chrono::DateTime<chrono::Utc>) -> Self {
        Self(value)
    }

    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl TryFrom<&str> for WrappedChronoDateTime {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Try SQLite datetime format first, then fall back to RFC3339
        let parsed = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .or_else(|_| chrono::DateTime::parse_from_rfc3339(value).map(|dt| dt.into()))
            .map_err(|_e| anyhow::anyhow!("invalid datetime value"))?;

        Ok(WrappedChronoDateTime::new(parsed))
    }
}

impl TryFrom<String> for WrappedChronoDateTime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WrappedChronoDateTime::try_from(value.as_str())
    }
}

impl fmt::Display for WrappedChronoDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for WrappedChronoDateTime {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        Self(value)
    }
}

impl FromSqlValue for WrappedChronoDateTime {
    fn from_sql(value: libsql::Value) -> Result<Self, anyhow::Error> {
        match value {
            libsql::Value::Text(s) => WrappedChronoDateTime::try_from(s.as_str()),
            other => Err(anyhow::anyhow!("expected datetime text column, got {other:?}")),
        }
    }
}

impl From<WrappedChronoDateTime> for chrono::DateTime<chrono::Utc> {
    fn from(value: WrappedChronoDateTime) -> Self {
        value.0
    }
}

impl From<WrappedChronoDateTime> for libsql::Value {
    fn from(value: WrappedChronoDateTime) -> Self {
        // Use SQLite's expected datetime format instead of RFC3339
        libsql::Value::Text(value.0.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

// Pagination types
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema, IntoParams)]
#[into_params(style = Form, parameter_in = Query)]
pub struct PaginationRequest {
    pub page_size: i64,
    pub next_page_token: Option<String>,
}

/// Upper bound on a single page of results.
pub const MAX_PAGE_SIZE: i64 = 100;

impl PaginationRequest {
    /// Requested page size clamped to `1..=MAX_PAGE_SIZE`. Repositories use
    /// this, never the raw field, when building LIMIT clauses.
    pub fn effective_page_size(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaginatedResponse<T: ToSchema + Serialize> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T: ToSchema + Serialize> ToSchema for PaginatedResponse<T> {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Owned(format!("{}PaginatedResponse", T::name()))
    }

    fn schemas(
        schemas: &mut Vec<(
            String,
            utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
        )>,
    ) {
        schemas.push((T::name().to_string(), T::schema()));
        T::schemas(schemas);
        schemas.push((format!("{}PaginatedResponse", T::name()), Self::schema()));
    }
}

impl<T: ToSchema + Serialize> PartialSchema for PaginatedResponse<T> {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::Object)
                .property(
                    "items",
                    utoipa::openapi::ArrayBuilder::new()
                        .schema_type(utoipa::openapi::schema::Type::Array)
                        .items(utoipa::openapi::schema::Ref::from_schema_name(T::name())),
                )
                .property(
                    "next_page_token",
                    utoipa::openapi::ObjectBuilder::new()
                        .schema_type(utoipa::openapi::schema::Type::String),
                )
                .required("items")
                .required("next_page_token")
                .build(),
        ))
    }
}

/// Decode a base64-encoded pagination token back to a vector of strings
pub fn decode_pagination_token(token: &str) -> anyhow::Result<Vec<String>> {
    let decoded_bytes = base64::engine::general_purpose::STANDARD.decode(token)?;
    let decoded_str = String::from_utf8(decoded_bytes)?;
    Ok(decoded_str.split("__").map(|s| s.to_string()).collect())
}

impl<T: ToSchema + Serialize> PaginatedResponse<T> {
    /// Create a paginated response from a list of items fetched with
    /// `effective_page_size() + 1`.
    ///
    /// This function expects that you fetched one item more than the
    /// effective page size from the database.
    /// It will:
    /// - Check if there are more items than `page_size` (indicating more pages exist)
    /// - Remove the extra item if present
    /// - Generate the next page token from the last item's composite key
    pub fn from_items_with_extra<F>(
        mut items: Vec<T>,
        pagination: &PaginationRequest,
        get_id: F,
    ) -> Self
    where
        F: FnOnce(&T) -> Vec<String>,
    {
        // Check if we got more items than requested (page_size + 1)
        let has_more = items.len() as i64 > pagination.effective_page_size();

        // If we have more items than page_size, remove the extra item
        if has_more {
            items.pop();
        }

        let next_page_token = if has_more && !items.is_empty() {
            items.last().map(|item| {
                let key_parts = get_id(item);
                let composite_key = key_parts.join("__");
                base64::engine::general_purpose::STANDARD.encode(composite_key.as_bytes())
            })
        } else {
            None
        };

        Self {
            items,
            next_page_token,
        }
    }
}

#[cfg(test)]
mod unit_test {
    use super::*;

    #[test]
    fn test_uuid_column_decoding() {
        let id = WrappedUuidV4::new();
        let decoded = WrappedUuidV4::from_sql(libsql::Value::Text(id.to_string())).unwrap();
        assert_eq!(decoded, id);

        assert!(WrappedUuidV4::from_sql(libsql::Value::Integer(7)).is_err());
        assert!(WrappedUuidV4::from_sql(libsql::Value::Text("not-a-uuid".to_string())).is_err());
    }

    #[test]
    fn test_datetime_column_decoding() {
        let decoded =
            WrappedChronoDateTime::from_sql(libsql::Value::Text("2026-08-30 12:34:56.789".into()))
                .unwrap();
        assert_eq!(decoded.get_inner().timezone(), chrono::Utc);

        // The write-side format round-trips
        let now = WrappedChronoDateTime::now();
        let stored: libsql::Value = now.into();
        let back = WrappedChronoDateTime::from_sql(stored).unwrap();
        assert_eq!(back, now);

        assert!(WrappedChronoDateTime::from_sql(libsql::Value::Null).is_err());
    }

    #[test]
    fn test_effective_page_size_is_clamped() {
        let request = |page_size| PaginationRequest {
            page_size,
            next_page_token: None,
        };

        assert_eq!(request(25).effective_page_size(), 25);
        assert_eq!(request(i64::MAX).effective_page_size(), MAX_PAGE_SIZE);
        assert_eq!(request(0).effective_page_size(), 1);
        assert_eq!(request(-5).effective_page_size(), 1);
    }
}
