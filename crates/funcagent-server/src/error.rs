use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use funcagent_core::AgentError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(AgentError::InvalidSettings(msg.into()).into())
    }
}

fn status_for(e: &AgentError) -> StatusCode {
    match e {
        AgentError::CommandNotFound(_) | AgentError::WizardNotFound(_) | AgentError::BenchmarkNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AgentError::InvalidCommandName(_)
        | AgentError::InvalidConnectionString(_)
        | AgentError::InvalidSettings(_)
        | AgentError::NotInitialized => StatusCode::BAD_REQUEST,
        AgentError::DuplicateCommand(_) | AgentError::DuplicateBenchmark(_) => StatusCode::CONFLICT,
        AgentError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        AgentError::Model(_) => StatusCode::BAD_GATEWAY,
        AgentError::Io(_) | AgentError::Yaml(_) | AgentError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self
            .0
            .downcast_ref::<AgentError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: AgentError) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn not_found_errors_map_to_404() {
        assert_eq!(status(AgentError::WizardNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(AgentError::BenchmarkNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(AgentError::CommandNotFound("x".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_input_maps_to_400() {
        assert_eq!(
            status(AgentError::InvalidConnectionString("Server=".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::bad_request("empty prompt").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn cancellation_maps_to_408() {
        assert_eq!(status(AgentError::Cancelled), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn other_errors_map_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status(AgentError::Io(std::io::Error::other("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError(AgentError::WizardNotFound("x".into()).into()).into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
