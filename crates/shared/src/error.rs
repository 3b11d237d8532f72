use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use utoipa::{IntoResponses, PartialSchema, ToSchema};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Serialize)]
pub enum CommonError {
    #[error("user is not authenticated to perform this action.")]
    Authentication {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("you do not have permission to access this environment.")]
    Authorization {
        msg: String,
        #[serde(skip)]
        #[source]
        source: anyhow::Error,
    },
    // Distinct from Authorization: an unresolvable share/bearer token must
    // not be conflated with a resolvable token lacking permission.
    #[error("invalid token.")]
    InvalidToken {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("could not find resource")]
    NotFound {
        msg: String,
        lookup_id: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("unknown error")]
    Unknown(
        #[serde(skip)]
        #[from]
        anyhow::Error,
    ),
    #[error("invalid request")]
    InvalidRequest {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("repository error")]
    Repository {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("sqlite database error")]
    SqliteError {
        #[serde(skip)]
        #[from]
        #[source]
        source: libsql::Error,
    },
    #[error("io error")]
    IoError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::io::Error,
    },
    #[error("serde json error")]
    SerdeSerializationError {
        #[serde(skip)]
        #[from]
        #[source]
        source: serde_json::Error,
    },
    #[error("axum error")]
    AxumError {
        #[serde(skip)]
        #[from]
        #[source]
        source: axum::Error,
    },
    #[error("address parse error")]
    AddrParseError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("var error")]
    VarError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::env::VarError,
    },
}

impl ToSchema for CommonError {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("Error")
    }

    fn schemas(
        _schemas: &mut Vec<(
            String,
            utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
        )>,
    ) {
        // nothing by default
    }
}

impl PartialSchema for CommonError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .property(
                "name",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("name")
            .property(
                "message",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("message")
            .into()
    }
}

impl IntoResponses for CommonError {
    fn responses() -> std::collections::BTreeMap<
        String,
        utoipa::openapi::RefOr<utoipa::openapi::response::Response>,
    > {
        let mut responses = std::collections::BTreeMap::new();

        let error_content = utoipa::openapi::ContentBuilder::new()
            .schema(Some(CommonError::schema()))
            .build();

        // Authentication Error - 401
        responses.insert(
            "401".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Authentication error")
                .content("application/json", error_content.clone())
                .into(),
        );

        // Authorization Error - 403
        responses.insert(
            "403".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Authorization error")
                .content("application/json", error_content.clone())
                .into(),
        );

        // Not Found Error - 404
        responses.insert(
            "404".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Resource not found")
                .content("application/json", error_content.clone())
                .into(),
        );

        // Invalid Request - 400
        responses.insert(
            "400".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Invalid request")
                .content("application/json", error_content.clone())
                .into(),
        );

        // Invalid Response - 500
        responses.insert(
            "500".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Server error")
                .content("application/json", error_content)
                .into(),
        );

        responses
    }
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = match self {
            CommonError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            CommonError::Authorization { .. } | CommonError::InvalidToken { .. } => {
                StatusCode::FORBIDDEN
            }
            CommonError::NotFound { .. } => StatusCode::NOT_FOUND,
            CommonError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            CommonError::Unknown(_)
            | CommonError::Repository { .. }
            | CommonError::SqliteError { .. }
            | CommonError::IoError { .. }
            | CommonError::SerdeSerializationError { .. }
            | CommonError::AxumError { .. }
            | CommonError::AddrParseError { .. }
            | CommonError::VarError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            name: match self {
                CommonError::Authentication { .. } => "Authentication",
                CommonError::Authorization { .. } => "Authorization",
                CommonError::InvalidToken { .. } => "InvalidToken",
                CommonError::NotFound { .. } => "NotFound",
                CommonError::InvalidRequest { .. } => "InvalidRequest",
                CommonError::Repository { .. } => "Repository",
                CommonError::SqliteError { .. } => "InternalServerError",
                CommonError::Unknown(_) => "InternalServerError",
                CommonError::IoError { .. } => "InternalServerError",
                CommonError::SerdeSerializationError { .. } => "InternalServerError",
                CommonError::AxumError { .. } => "InternalServerError",
                CommonError::AddrParseError { .. } => "InternalServerError",
                CommonError::VarError { .. } => "InternalServerError",
            }
            .to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    name: String,
    message: String,
}
