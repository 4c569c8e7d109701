use axum::{http::StatusCode, response::IntoResponse};

// axum handler for root
pub async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        format!(
            "{} {} - POST credentials to /v1/authenticate\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ),
    )
}
