use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Service is up", body = Health),
    ),
    tag = "health",
)]
/// Report build information. `OPTIONS` returns the `X-App` header only.
pub async fn health(method: Method) -> impl IntoResponse {
    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new());

    (StatusCode::OK, headers, body)
}
