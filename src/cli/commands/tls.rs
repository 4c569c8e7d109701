use crate::tls::TlsPaths;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_TLS_CERT: &str = "tls-cert";
pub const ARG_TLS_KEY: &str = "tls-key";

pub struct Options;

impl Options {
    /// Certificate and key paths, or `None` to serve plain HTTP.
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Option<TlsPaths> {
        let cert = matches.get_one::<PathBuf>(ARG_TLS_CERT)?;
        let key = matches.get_one::<PathBuf>(ARG_TLS_KEY)?;
        Some(TlsPaths::new(cert, key))
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TLS_CERT)
                .long(ARG_TLS_CERT)
                .help("PEM certificate chain; serve HTTPS when set")
                .env("KRBGATE_TLS_CERT")
                .requires(ARG_TLS_KEY)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_TLS_KEY)
                .long(ARG_TLS_KEY)
                .help("PEM private key matching --tls-cert")
                .env("KRBGATE_TLS_KEY")
                .requires(ARG_TLS_CERT)
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear<F: FnOnce()>(f: F) {
        temp_env::with_vars(
            [
                ("KRBGATE_TLS_CERT", None::<&str>),
                ("KRBGATE_TLS_KEY", None),
            ],
            f,
        );
    }

    #[test]
    fn plain_http_by_default() {
        clear(|| {
            let matches = with_args(Command::new("krbgate")).get_matches_from(["krbgate"]);
            assert_eq!(Options::parse(&matches), None);
        });
    }

    #[test]
    fn cert_and_key_from_flags() {
        clear(|| {
            let matches = with_args(Command::new("krbgate")).get_matches_from([
                "krbgate",
                "--tls-cert",
                "/etc/krbgate/tls.crt",
                "--tls-key",
                "/etc/krbgate/tls.key",
            ]);
            assert_eq!(
                Options::parse(&matches),
                Some(TlsPaths::new("/etc/krbgate/tls.crt", "/etc/krbgate/tls.key"))
            );
        });
    }

    #[test]
    fn cert_and_key_from_env() {
        temp_env::with_vars(
            [
                ("KRBGATE_TLS_CERT", Some("/run/tls/cert.pem")),
                ("KRBGATE_TLS_KEY", Some("/run/tls/key.pem")),
            ],
            || {
                let matches = with_args(Command::new("krbgate")).get_matches_from(["krbgate"]);
                assert_eq!(
                    Options::parse(&matches),
                    Some(TlsPaths::new("/run/tls/cert.pem", "/run/tls/key.pem"))
                );
            },
        );
    }

    #[test]
    fn cert_without_key_is_rejected() {
        clear(|| {
            let command = with_args(Command::new("krbgate"));
            assert!(
                command
                    .clone()
                    .try_get_matches_from(["krbgate", "--tls-cert", "tls.crt"])
                    .is_err()
            );
            assert!(
                command
                    .try_get_matches_from(["krbgate", "--tls-key", "tls.key"])
                    .is_err()
            );
        });
    }
}
