pub mod access_log;
pub mod handlers;
pub mod response;

use crate::{
    api::handlers::{authenticate, health, root},
    sink::JsonLines,
    tls::TlsListener,
    validation::Validator,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    http::{
        HeaderName, HeaderValue, Request,
        header::{CACHE_CONTROL, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    middleware,
    routing::{get, options},
    serve::ListenerExt,
};
use rustls::ServerConfig;
use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{Span, debug, debug_span, info};
use ulid::Ulid;
use utoipa::openapi::{InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes added in [`app`] (`/` and `OPTIONS /health`) are not documented.
#[must_use]
pub fn router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(authenticate::authenticate));

    let mut tag = Tag::new("authenticate");
    tag.description = Some("Credential validation".to_string());
    router.get_openapi_mut().tags = Some(vec![tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    let mut license = License::new(env!("CARGO_PKG_LICENSE"));
    license.identifier = Some(env!("CARGO_PKG_LICENSE").to_string());
    info.license = Some(license);

    OpenApiBuilder::new().info(info).build()
}

/// Assemble the service: documented routes, extras and the middleware stack.
pub fn app(validator: Arc<Validator>, access_log: Arc<JsonLines>) -> Router {
    let (router, _openapi) = router().split_for_parts();

    router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(middleware::from_fn_with_state(
                    access_log,
                    access_log::record,
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("deny"),
                ))
                .layer(Extension(validator)),
        )
}

/// Serve `app` on `listen:port` until Ctrl-C or SIGTERM, over HTTPS when a
/// TLS config is given.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(
    listen: IpAddr,
    port: u16,
    app: Router,
    tls: Option<Arc<ServerConfig>>,
) -> Result<()> {
    let addr = SocketAddr::new(listen, port);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    serve_on(listener, app, tls, shutdown_signal()).await
}

/// Serve `app` on an already bound listener until `shutdown` completes.
///
/// # Errors
/// Returns an error if the server fails.
pub async fn serve_on<F>(
    listener: TcpListener,
    app: Router,
    tls: Option<Arc<ServerConfig>>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    match tls {
        Some(config) => {
            let listener =
                TlsListener::new(listener, config)?.tap_io(|tls: &mut TlsStream<TcpStream>| {
                    if let Err(err) = tls.get_ref().0.set_nodelay(true) {
                        debug!("failed to set TCP_NODELAY: {}", err);
                    }
                });

            info!("Listening on https://{}", addr);

            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown)
                .await?;
        }
        None => {
            info!("Listening on http://{}", addr);

            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown)
                .await?;
        }
    }

    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let method = request.method();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", %method, path, request_id)
}
