use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Failures of the authentication handshake.
///
/// `StateMismatch` is surfaced to the browser as a 400; exchange failures
/// as a 500. `InvalidCredential` is never rendered directly — the landing
/// page recovers from it by redirecting the user back to the start of the
/// flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("state did not match")]
    StateMismatch,

    #[error("failed to exchange token: {0}")]
    TokenExchangeFailed(String),

    #[error("no id_token field in token response")]
    MissingIdentityToken,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            Self::StateMismatch => StatusCode::BAD_REQUEST,
            Self::TokenExchangeFailed(_) | Self::MissingIdentityToken => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}

/// Failures loading the baseline order record.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order source unavailable: {0}")]
    SourceUnavailable(#[source] std::io::Error),

    #[error("order source malformed: {0}")]
    SourceMalformed(#[source] serde_json::Error),
}

/// Failures publishing to the messaging broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker connection failed: {0}")]
    ConnectFailed(String),

    #[error("broker rejected publish: {0}")]
    PublishFailed(String),
}

/// Request-scoped failure of the submit pipeline. Every variant aborts the
/// request with a 500 and a generic message body; detail is logged
/// server-side before conversion.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Error parsing form")]
    FormParse,

    #[error("Error loading order")]
    Order(#[from] OrderError),

    #[error("Error serializing order")]
    Serialization(#[from] serde_json::Error),

    #[error("Error publishing order")]
    Publish(#[from] PublishError),
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mismatch_maps_to_bad_request() {
        assert_eq!(AuthError::StateMismatch.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_exchange_failures_map_to_internal_error() {
        assert_eq!(
            AuthError::TokenExchangeFailed("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::MissingIdentityToken.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pipeline_errors_map_to_internal_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = PipelineError::from(OrderError::SourceUnavailable(io_err));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Error loading order");

        let err = PipelineError::from(PublishError::ConnectFailed("refused".to_string()));
        assert_eq!(err.to_string(), "Error publishing order");
    }

    #[test]
    fn test_generic_bodies_do_not_leak_detail() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/etc/shadow");
        let err = PipelineError::from(OrderError::SourceUnavailable(io_err));
        assert!(!err.to_string().contains("/etc/shadow"));
    }
}
