use crate::{
    api::response::ErrorResponse,
    identity::{BodyFormat, Credentials, Identity},
    validation::Validator,
};
use axum::{
    Extension, Json,
    body::Bytes,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

/// Accepted body shape; form posts use `login-name`, `domain` and `password`.
#[derive(ToSchema, Deserialize)]
pub struct AuthenticateRequest {
    #[serde(rename = "loginName")]
    pub login_name: String,
    pub domain: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path= "/v1/authenticate",
    request_body = AuthenticateRequest,
    responses (
        (status = 202, description = "Credentials are valid", body = Identity),
        (status = 401, description = "Credentials are not valid", body = Identity),
        (status = 400, description = "Posted data invalid", body = ErrorResponse),
        (status = 500, description = "Attempt could not be tracked", body = ErrorResponse),
    ),
    tag = "authenticate",
)]
/// Validate a login name, domain and password.
#[instrument(skip_all)]
pub async fn authenticate(
    validator: Extension<Arc<Validator>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let format = BodyFormat::from_content_type(
        headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    );

    let credentials = match Credentials::decode(format, &body) {
        Ok(credentials) => credentials,
        Err(err) => {
            warn!("bad request: {}", err);
            return ErrorResponse::bad_data().into_response();
        }
    };

    match validator.validate(credentials).await {
        Ok(identity) if identity.valid => (StatusCode::ACCEPTED, Json(identity)).into_response(),
        Ok(identity) => (StatusCode::UNAUTHORIZED, Json(identity)).into_response(),
        Err(err) => {
            error!("error generating new event: {}", err);
            ErrorResponse::tracking_error().into_response()
        }
    }
}
