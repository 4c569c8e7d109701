use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppCode {
    /// The posted credential could not be decoded.
    BadData,
    /// No attempt identifier could be generated.
    TrackingError,
}

/// Generic error body for requests that never reached validation.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    pub http_code: u16,
    pub application_code: AppCode,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(status: StatusCode, application_code: AppCode, message: &str) -> Self {
        Self {
            message: message.to_string(),
            http_code: status.as_u16(),
            application_code,
        }
    }

    #[must_use]
    pub fn bad_data() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            AppCode::BadData,
            "posted data invalid",
        )
    }

    #[must_use]
    pub fn tracking_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            AppCode::TrackingError,
            "Error processing request",
        )
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
