use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imprint_core::error::CoreError;
use imprint_render::RenderError;
use serde_json::json;

use crate::storage::StorageError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `imprint_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or missing request fields.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The render engine or asset store failed. The detail is logged, never
    /// returned to the caller.
    #[error("Render failed: {0}")]
    RenderFailed(String),

    /// A failure outside the domain, such as a panicked background task.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::RenderFailed(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::RenderFailed(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Status, taxonomy code, caller-facing message and extra body fields.
struct ErrorParts {
    status: StatusCode,
    code: &'static str,
    message: String,
    context: Option<serde_json::Value>,
}

impl ErrorParts {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            context: None,
        }
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "An internal error occurred",
        )
    }
}

impl AppError {
    /// The taxonomy code sent in the `code` field.
    pub fn code(&self) -> &'static str {
        self.parts().code
    }

    /// The sanitized message sent to callers, also recorded on failed jobs.
    pub fn public_message(&self) -> String {
        self.parts().message
    }

    fn parts(&self) -> ErrorParts {
        match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => ErrorParts::new(
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => ErrorParts::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invalid_request",
                    msg.clone(),
                ),
                CoreError::Unauthorized(msg) => {
                    ErrorParts::new(StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
                }
                CoreError::Forbidden(msg) => {
                    ErrorParts::new(StatusCode::FORBIDDEN, "forbidden", msg.clone())
                }
                CoreError::RateLimited {
                    used,
                    limit,
                    in_flight,
                } => ErrorParts {
                    context: Some(json!({
                        "used": used,
                        "limit": limit,
                        "in_flight": in_flight,
                    })),
                    ..ErrorParts::new(
                        StatusCode::TOO_MANY_REQUESTS,
                        "rate_limited",
                        "Monthly API call limit reached",
                    )
                },
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::InvalidRequest(msg) => ErrorParts::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_request",
                msg.clone(),
            ),
            AppError::RenderFailed(_) => ErrorParts::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "render_failed",
                "Image rendering failed",
            ),
            AppError::InternalError(_) => ErrorParts::internal(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let parts = self.parts();
        if parts.status.is_server_error() {
            // The body carries only the sanitized message.
            tracing::error!(code = parts.code, error = %self, "Request failed");
        }

        let mut body = json!({
            "error": parts.message,
            "code": parts.code,
        });
        if let (Some(body), Some(serde_json::Value::Object(extra))) =
            (body.as_object_mut(), parts.context)
        {
            body.extend(extra);
        }

        (parts.status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorParts {
    match err {
        sqlx::Error::RowNotFound => {
            ErrorParts::new(StatusCode::NOT_FOUND, "not_found", "Resource not found")
        }
        _ => ErrorParts::internal(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;

    /// Counts `ERROR` events.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn render_failure_is_sanitized_and_logged_once() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&errors)));

        tracing::subscriber::with_default(subscriber, || {
            let err = AppError::RenderFailed("Render exceeded the 10s time limit".into());
            assert_eq!(err.code(), "render_failed");
            assert_eq!(err.public_message(), "Image rendering failed");
            assert_eq!(errors.load(Ordering::SeqCst), 0);

            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(errors.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn client_errors_are_not_logged_as_errors() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&errors)));

        tracing::subscriber::with_default(subscriber, || {
            let response = AppError::InvalidRequest("bad format".into()).into_response();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        });
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rate_limited_parts_carry_usage_context() {
        let err = AppError::from(CoreError::RateLimited {
            used: 0,
            limit: Some(1),
            in_flight: 1,
        });
        let parts = err.parts();
        assert_eq!(parts.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            parts.context,
            Some(json!({ "used": 0, "limit": 1, "in_flight": 1 }))
        );
    }
}
