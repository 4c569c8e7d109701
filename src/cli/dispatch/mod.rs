//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_LISTEN, ARG_PORT, engine, logging, tls};
use anyhow::Result;
use std::net::{IpAddr, Ipv4Addr};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if the engine configuration is missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let listen = matches
        .get_one::<IpAddr>(ARG_LISTEN)
        .copied()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8088);
    let log_dir = matches
        .get_one::<String>(logging::ARG_LOG_DIR)
        .cloned()
        .unwrap_or_else(|| "./".to_string());

    let engine_opts = engine::Options::parse(matches)?;

    Ok(Action::Server(Args {
        listen,
        port,
        realms: engine_opts.realms,
        engine_timeout: engine_opts.timeout,
        log_dir,
        tls: tls::Options::parse(matches),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn engine_required() {
        temp_env::with_vars(
            [
                ("KRBGATE_ENGINE_URL", None::<&str>),
                ("KRBGATE_REALMS", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["krbgate"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("missing required argument"));
                }
            },
        );
    }

    #[test]
    fn server_args() {
        temp_env::with_vars(
            [
                ("KRBGATE_ENGINE_URL", Some("http://engine:7000")),
                ("KRBGATE_REALMS", None),
                ("KRBGATE_LISTEN", None),
                ("KRBGATE_PORT", None),
                ("KRBGATE_LOG_DIR", Some("null")),
                ("KRBGATE_ENGINE_TIMEOUT", Some("4")),
                ("KRBGATE_TLS_CERT", None),
                ("KRBGATE_TLS_KEY", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["krbgate"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.listen, IpAddr::V4(Ipv4Addr::LOCALHOST));
                    assert_eq!(args.port, 8088);
                    assert_eq!(args.log_dir, "null");
                    assert_eq!(args.engine_timeout, Duration::from_secs(4));
                    assert!(args.tls.is_none());
                    assert_eq!(
                        args.realms.endpoint("CORP.EXAMPLE").ok(),
                        Some("http://engine:7000")
                    );
                }
            },
        );
    }

    #[test]
    fn server_args_with_tls() {
        temp_env::with_vars(
            [
                ("KRBGATE_ENGINE_URL", Some("http://engine:7000")),
                ("KRBGATE_REALMS", None),
                ("KRBGATE_TLS_CERT", Some("/etc/krbgate/tls.crt")),
                ("KRBGATE_TLS_KEY", Some("/etc/krbgate/tls.key")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["krbgate"]);
                let tls = match handler(&matches) {
                    Ok(Action::Server(args)) => args.tls,
                    _ => None,
                };
                assert_eq!(
                    tls.as_ref().map(|paths| paths.key_path().to_path_buf()),
                    Some("/etc/krbgate/tls.key".into())
                );
            },
        );
    }
}
