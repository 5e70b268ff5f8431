//! Mapping of service errors onto HTTP responses.
//!
//! Operational errors keep their stable message; anything else is logged in
//! full and surfaced as a generic 500 body so internal detail never reaches
//! the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use service::ServiceError;
use tracing::error;

/// Error type returned by all HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Principal headers missing or malformed.
    Unauthorized(&'static str),
    /// Authenticated, but the role does not permit this route.
    Forbidden(&'static str),
    /// A business-layer failure, classified by [`ServiceError`].
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

fn error_response(code: StatusCode, message: String) -> Response {
    let status = if code.is_client_error() { "fail" } else { "error" };
    (code, Json(ErrorBody { status, message })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => {
                error_response(StatusCode::UNAUTHORIZED, msg.to_string())
            }
            ApiError::Forbidden(msg) => error_response(StatusCode::FORBIDDEN, msg.to_string()),
            ApiError::Service(err) => match err {
                ServiceError::InvalidInput(msg) => {
                    error_response(StatusCode::BAD_REQUEST, msg)
                }
                ServiceError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
                ServiceError::Forbidden(msg) => error_response(StatusCode::FORBIDDEN, msg),
                ServiceError::Conflict(msg) => error_response(StatusCode::CONFLICT, msg),
                other => {
                    // Non-operational fault: full detail in the log, generic
                    // message to the caller.
                    error!("internal error: {other}");
                    error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "something went wrong".to_string(),
                    )
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repository::RepositoryError;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_operational_errors_keep_their_status() {
        assert_eq!(
            status_of(ApiError::Service(ServiceError::InvalidInput("x".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Service(ServiceError::NotFound("x".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Service(ServiceError::Forbidden("x".into()))),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ApiError::Service(ServiceError::Conflict("x".into()))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_storage_faults_become_generic_500() {
        let err = ApiError::Service(ServiceError::Db(RepositoryError::NotFound));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_failures() {
        assert_eq!(
            status_of(ApiError::Unauthorized("missing principal")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Forbidden("admin only")),
            StatusCode::FORBIDDEN
        );
    }
}
