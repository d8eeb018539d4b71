//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use offpeak_domain::error::OffpeakError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`OffpeakError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(OffpeakError);

impl From<OffpeakError> for ApiError {
    fn from(err: OffpeakError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            OffpeakError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            OffpeakError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            OffpeakError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offpeak_domain::error::{NotFoundError, ValidationError};

    #[test]
    fn should_map_validation_to_bad_request() {
        let response = ApiError::from(OffpeakError::from(ValidationError::EmptyReadySubstring))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn should_map_not_found_to_404() {
        let response = ApiError::from(OffpeakError::from(NotFoundError {
            entity: "Scheduler",
            id: "dryer".to_string(),
        }))
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_hide_storage_details() {
        let response =
            ApiError::from(OffpeakError::Storage("disk full".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
