use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// Invoice number or unique key already in use. Rendered as 400.
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    PreconditionFailed { message: String, blocking: i64 },
    #[error("{0}")]
    UnprocessableEntity(String),
    /// The allocator ran out of probes; needs an operator.
    #[error("{0}")]
    SequenceExhausted(String),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Conflict(_) | Self::PreconditionFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SequenceExhausted(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = match &self {
            Self::PreconditionFailed { message, blocking } => json!({
                "detail": message,
                "blocking_reservations": blocking,
            }),
            other => json!({ "detail": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("Malformed document: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::AppError;

    #[test]
    fn conflict_and_precondition_render_as_bad_request() {
        assert_eq!(
            AppError::Conflict("taken".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PreconditionFailed {
                message: "blocked".to_string(),
                blocking: 3
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn exhaustion_is_a_server_error() {
        assert!(AppError::SequenceExhausted("no numbers".to_string())
            .status_code()
            .is_server_error());
    }
}
