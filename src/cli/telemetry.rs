use crate::sink::{LogTarget, non_blocking};
use anyhow::{Result, anyhow};
use base64ct::{Base64, Encoding};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
};
use std::{
    env::var,
    sync::{Mutex, OnceLock},
    time::Duration,
};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{Level, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
};
use ulid::Ulid;

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();
static LOG_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Parse `OTEL_EXPORTER_OTLP_HEADERS` (`k1=v1,k2=v2`) into gRPC metadata.
///
/// Keys ending in `-bin` carry base64 encoded binary values.
fn otlp_metadata(headers: &str) -> Result<MetadataMap> {
    let mut meta = MetadataMap::new();

    for (key, value) in headers
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim()))
    {
        if key.ends_with("-bin") {
            let bytes = Base64::decode_vec(value)
                .map_err(|e| anyhow!("failed to base64-decode value for key {key}: {e}"))?;
            let key = MetadataKey::<Binary>::from_bytes(key.as_bytes())
                .map_err(|e| anyhow!("invalid binary metadata key {key}: {e}"))?;
            meta.insert_bin(key, MetadataValue::from_bytes(&bytes));
        } else {
            let parsed = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
                .map_err(|e| anyhow!("invalid ASCII metadata key {key}: {e}"))?;
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|e| anyhow!("invalid ASCII metadata value for key {key}: {e}"))?;
            meta.insert(parsed, value);
        }
    }

    Ok(meta)
}

fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

fn init_tracer() -> Result<Tracer> {
    if let Ok(proto) = var("OTEL_EXPORTER_OTLP_PROTOCOL")
        && proto != "grpc"
    {
        debug!(
            "OTEL_EXPORTER_OTLP_PROTOCOL='{}' ignored: only 'grpc' is supported",
            proto
        );
    }

    let endpoint = normalize_endpoint(
        &var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| "http://localhost:4317".to_string()),
    );

    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(Duration::from_secs(3));

    if let Some(host) = endpoint
        .strip_prefix("https://")
        .and_then(|s| s.split('/').next())
        .and_then(|h| h.split(':').next())
    {
        builder = builder.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(host.to_string())
                .with_native_roots(),
        );
    }

    if let Ok(headers) = var("OTEL_EXPORTER_OTLP_HEADERS") {
        let metadata = otlp_metadata(&headers)?;
        if !metadata.is_empty() {
            builder = builder.with_metadata(metadata);
        }
    }

    let exporter = builder.build()?;

    let instance_id = var("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|_| Ulid::new().to_string());

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(vec![
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", instance_id),
                ])
                .build(),
        )
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

fn make_writer(target: &LogTarget) -> Result<(BoxMakeWriter, WorkerGuard)> {
    let (writer, guard) = non_blocking(target.open()?, "app");
    Ok((BoxMakeWriter::new(writer), guard))
}

/// Initialize the application log and, if `OTEL_EXPORTER_OTLP_ENDPOINT` is
/// set, the OTLP span exporter (gRPC only).
///
/// # Errors
///
/// Returns an error if the log target cannot be opened or tracer or
/// subscriber initialization fails
pub fn init(verbosity_level: Option<Level>, target: &LogTarget) -> Result<()> {
    let verbosity_level = verbosity_level.unwrap_or(Level::ERROR);

    let (writer, guard) = make_writer(target)?;
    if let Ok(mut slot) = LOG_GUARD.lock() {
        *slot = Some(guard);
    }

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(matches!(target, LogTarget::Stdout | LogTarget::Stderr))
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false);

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = init_tracer()?;
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(otel_layer)
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Shut down the tracer provider, then flush the application log.
pub fn shutdown() {
    shutdown_tracer();
    if let Ok(mut slot) = LOG_GUARD.lock() {
        slot.take();
    }
}

/// Flush and shut down the tracer provider (noop if not initialized)
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        let _ = provider.shutdown();
        debug!("tracer provider shutdown complete");
    }
}
