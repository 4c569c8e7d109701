use crate::{
    api,
    cli::telemetry,
    engine::http::{HttpEngine, RealmMap},
    sink::{ACCESS_LOG, APPLICATION_LOG, EVENT_LOG, JsonLines, LogTarget},
    tls::{TlsPaths, load_server_config},
    validation::Validator,
};
use anyhow::{Context, Result};
use std::{net::IpAddr, sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub listen: IpAddr,
    pub port: u16,
    pub realms: RealmMap,
    pub engine_timeout: Duration,
    pub log_dir: String,
    pub tls: Option<TlsPaths>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if a log target or the TLS certificate cannot be loaded,
/// the engine client cannot be built, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let tls = args
        .tls
        .as_ref()
        .map(load_server_config)
        .transpose()
        .context("Could not load the TLS certificate")?
        .map(Arc::new);

    let events = JsonLines::open("event", &LogTarget::resolve(&args.log_dir, EVENT_LOG))
        .context("Could not open the event log")?;
    let access = JsonLines::open("access", &LogTarget::resolve(&args.log_dir, ACCESS_LOG))
        .context("Could not open the access log")?;

    let engine = HttpEngine::new(args.realms, args.engine_timeout)
        .context("Could not build the engine client")?;

    let validator = Validator::new(Arc::new(engine), Arc::new(events));
    let app = api::app(Arc::new(validator), Arc::new(access));

    let result = api::serve(args.listen, args.port, app, tls).await;

    telemetry::shutdown();

    result
}

fn log_startup_args(args: &Args) {
    let mut entries = vec![
        ("listen", format!("{}:{}", args.listen, args.port)),
        ("engine_timeout", format!("{}s", args.engine_timeout.as_secs())),
        (
            "tls",
            args.tls.as_ref().map_or_else(
                || "off".to_string(),
                |paths| format!("{}", paths.cert_path().display()),
            ),
        ),
        (
            "application_log",
            LogTarget::resolve(&args.log_dir, APPLICATION_LOG).to_string(),
        ),
        (
            "access_log",
            LogTarget::resolve(&args.log_dir, ACCESS_LOG).to_string(),
        ),
        (
            "event_log",
            LogTarget::resolve(&args.log_dir, EVENT_LOG).to_string(),
        ),
    ];
    let realms: Vec<String> = args
        .realms
        .entries()
        .into_iter()
        .map(|(realm, url)| format!("{realm} -> {url}"))
        .collect();
    entries.push(("realms", realms.join(", ")));

    info!("{}", startup_message("Startup configuration", &entries));
}

fn startup_message(title: &str, entries: &[(&str, String)]) -> String {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    message
}

fn banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}

const BANNER: &str = r"
    .--.
   /.-. '----------.
   \'-' .--'--''-'-'   K R B G A T E{VERSION}
    '--'";
