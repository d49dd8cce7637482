//! Error envelopes.
//!
//! Two JSON shapes are served, matching what existing API consumers expect:
//! public dataset routes use `{ "error", "message"? }` (the `IntoResponse`
//! impl of [`ApiError`]), user routes use `{ "success": false, "error",
//! "details"? }` via the [`MutationError`] wrapper.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized(&'static str),
    #[error("Forbidden")]
    Forbidden(&'static str),
    #[error("Not found")]
    NotFound(&'static str),
    #[error("Invalid request")]
    Validation { message: String, details: Value },
    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },
    #[error("Service unavailable")]
    Unavailable,
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(field: &str, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        Self::Validation {
            message: problem.clone(),
            details: json!({ field: [problem] }),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing detail. Internal errors never leak theirs.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Unauthorized(m) | Self::Forbidden(m) | Self::NotFound(m) => Some(m.to_string()),
            Self::Validation { message, .. } => Some(message.clone()),
            Self::RateLimited { retry_after_secs } => {
                Some(format!("Rate limit exceeded, retry in {} seconds", retry_after_secs))
            }
            Self::Unavailable | Self::Internal(_) => None,
        }
    }

    fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. } => Some(details),
            _ => None,
        }
    }

    fn log(&self) {
        if let Self::Internal(e) = self {
            tracing::error!("Request failed: {:#}", e);
        }
    }

    fn finish(&self, body: Value) -> Response {
        let mut response = (self.status(), Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        response
    }
}

#[derive(Serialize)]
struct PublicErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = PublicErrorBody {
            error: self.to_string(),
            message: self.message(),
        };
        let body = serde_json::to_value(body).unwrap_or_else(|_| json!({ "error": "Internal server error" }));
        self.finish(body)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation {
            message: "Malformed JSON body".to_string(),
            details: json!({ "body": [rejection.body_text()] }),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation {
            message: "Malformed query string".to_string(),
            details: json!({ "query": [rejection.body_text()] }),
        }
    }
}

/// `ApiError` rendered with the `{ success: false }` envelope.
#[derive(Debug)]
pub struct MutationError(pub ApiError);

macro_rules! mutation_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for MutationError {
                fn from(err: $source) -> Self {
                    Self(err.into())
                }
            }
        )*
    };
}

mutation_error_from!(
    ApiError,
    anyhow::Error,
    JsonRejection,
    QueryRejection,
    crate::services::key_service::KeyError,
);

#[derive(Serialize)]
struct MutationErrorBody<'a> {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl IntoResponse for MutationError {
    fn into_response(self) -> Response {
        let err = self.0;
        err.log();
        let body = MutationErrorBody {
            success: false,
            error: err.message().unwrap_or_else(|| err.to_string()),
            details: err.details(),
        };
        let body = serde_json::to_value(body)
            .unwrap_or_else(|_| json!({ "success": false, "error": "Internal server error" }));
        err.finish(body)
    }
}

/// Success envelope for user routes.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            message: Some(message.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn public_envelope_has_error_and_message() {
        let response = ApiError::Unauthorized("Invalid or expired API key").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Unauthorized", "message": "Invalid or expired API key" })
        );
    }

    #[tokio::test]
    async fn mutation_envelope_carries_details() {
        let response = MutationError(ApiError::validation("name", "Name is required")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "success": false, "error": "Name is required", "details": { "name": ["Name is required"] } })
        );
    }

    #[tokio::test]
    async fn internal_errors_are_generic() {
        let err = ApiError::from(anyhow::anyhow!("connection refused to 10.0.0.5"));
        let response = MutationError(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
