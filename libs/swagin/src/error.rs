use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use validator::ValidationErrors;

use crate::model::Part;
use crate::problem::{Problem, ProblemResponse, Violation};
use crate::tags::TagError;
use crate::validate::violations;

/// Failure while deriving the OpenAPI document. Always a programming error.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed tags on `{owner}.{field}`: {source}")]
    MalformedTag {
        owner: String,
        field: String,
        #[source]
        source: TagError,
    },
    #[error("schema of `{owner}` nests deeper than {limit} levels")]
    TooDeep { owner: String, limit: usize },
}

/// Failure while turning an application into a router.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("cannot serialize the OpenAPI document: {0}")]
    Serialize(String),
    #[error("cannot render docs page: {0}")]
    DocsPage(String),
    #[error("{method} {path} is registered twice")]
    Conflict { method: axum::http::Method, path: String },
    #[error("{path} overlaps {existing}: parameters at the same position must share a name")]
    AmbiguousPath { path: String, existing: String },
    #[error("method {0} cannot be routed")]
    UnsupportedMethod(axum::http::Method),
}

/// Request data that could not be bound onto a model.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid value for {part} field `{field}`: {message}")]
    InvalidValue {
        part: Part,
        field: String,
        message: String,
    },
    #[error("cannot decode {part}: {message}")]
    Decode { part: Part, message: String },
    #[error("cannot read request body: {0}")]
    Body(String),
    #[error("content type `{0}` is not accepted by this body")]
    UnsupportedMediaType(String),
    #[error("malformed tags on {part} field `{field}`: {source}")]
    Tags {
        part: Part,
        field: String,
        #[source]
        source: TagError,
    },
}

impl BindError {
    /// Machine readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BindError::InvalidValue { .. } => "invalid_value",
            BindError::Decode { .. } => "decode",
            BindError::Body(_) => "body",
            BindError::UnsupportedMediaType(_) => "unsupported_media_type",
            BindError::Tags { .. } => "tags",
        }
    }

    pub fn part(&self) -> Option<Part> {
        match self {
            BindError::InvalidValue { part, .. }
            | BindError::Decode { part, .. }
            | BindError::Tags { part, .. } => Some(*part),
            BindError::Body(_) | BindError::UnsupportedMediaType(_) => Some(Part::Body),
        }
    }

    /// JSON pointer to the offending field, e.g. `/query/page`.
    pub fn pointer(&self) -> Option<String> {
        match self {
            BindError::InvalidValue { part, field, .. } | BindError::Tags { part, field, .. } => {
                Some(format!("/{part}/{field}"))
            }
            _ => self.part().map(|p| format!("/{p}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Bind(BindError::UnsupportedMediaType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            RequestError::Bind(BindError::Tags { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            RequestError::Bind(_) => StatusCode::BAD_REQUEST,
            RequestError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// What an [`ErrorHandler`] knows about the failed request.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub status: StatusCode,
    pub instance: String,
    pub request_id: Option<String>,
}

/// Turns binding and validation failures into responses.
pub type ErrorHandler = Arc<dyn Fn(&ErrorContext, RequestError) -> Response + Send + Sync>;

/// Renders failures as RFC 9457 problems.
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|ctx, err| problem_for(ctx, &err).into_response())
}

pub(crate) fn problem_for(ctx: &ErrorContext, err: &RequestError) -> ProblemResponse {
    let problem = Problem::new(ctx.status, err.to_string())
        .with_instance(ctx.instance.clone())
        .with_request_id(ctx.request_id.clone());

    let problem = match err {
        RequestError::Bind(bind) => {
            let violations = bind
                .pointer()
                .map(|pointer| Violation {
                    detail: bind.to_string(),
                    pointer,
                })
                .into_iter()
                .collect();
            problem
                .with_code(bind.kind().to_ascii_uppercase())
                .with_errors(violations)
        }
        RequestError::Validation(errors) => problem
            .with_code("VALIDATION_ERROR")
            .with_errors(violations(errors)),
    };
    problem.into()
}
