//! Access log middleware: one JSON line per request.

use crate::sink::JsonLines;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::HOST,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc, time::Instant};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    pub status_code: u16,
    pub method: String,
    pub server_host: String,
    pub path: String,
    pub query_string: String,
    pub time: DateTime<Utc>,
    pub duration_micros: u64,
}

pub async fn record(State(log): State<Arc<JsonLines>>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let time = Utc::now();

    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();
    let server_host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query_string = request.uri().query().unwrap_or_default().to_string();

    let response = next.run(request).await;

    log.write(&AccessRecord {
        source_ip,
        status_code: response.status().as_u16(),
        method,
        server_host,
        path,
        query_string,
        time,
        duration_micros: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ACCESS_LOG, LogTarget};
    use anyhow::Result;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use std::fs;
    use tower::ServiceExt;

    #[tokio::test]
    async fn writes_one_record_per_request() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let target = LogTarget::resolve(&dir.path().to_string_lossy(), ACCESS_LOG);
        let log = Arc::new(JsonLines::open("access", &target)?);

        let app = Router::new()
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .layer(middleware::from_fn_with_state(Arc::clone(&log), record));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/teapot?brew=earl-grey")
                    .header(HOST, "gate.example.com")
                    .extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 40000))))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        drop(response);

        // The last handle flushes the writer thread on drop.
        let log = Arc::try_unwrap(log).map_err(|_| anyhow::anyhow!("access log still shared"))?;
        drop(log);

        let content = fs::read_to_string(dir.path().join(ACCESS_LOG))?;
        let records = content
            .lines()
            .map(serde_json::from_str::<AccessRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.source_ip, "10.0.0.7");
        assert_eq!(record.status_code, 418);
        assert_eq!(record.method, "GET");
        assert_eq!(record.server_host, "gate.example.com");
        assert_eq!(record.path, "/teapot");
        assert_eq!(record.query_string, "brew=earl-grey");
        Ok(())
    }
}
