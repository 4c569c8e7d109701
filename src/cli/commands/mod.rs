pub mod engine;
pub mod logging;
pub mod tls;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::net::IpAddr;

pub const ARG_LISTEN: &str = "listen";
pub const ARG_PORT: &str = "port";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("krbgate")
        .about("Credential validation gateway")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_LISTEN)
                .long(ARG_LISTEN)
                .help("Address to listen on")
                .default_value("127.0.0.1")
                .env("KRBGATE_LISTEN")
                .value_parser(clap::value_parser!(IpAddr)),
        )
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8088")
                .env("KRBGATE_PORT")
                .value_parser(clap::value_parser!(u16).range(1..)),
        );

    let command = engine::with_args(command);
    let command = tls::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "krbgate");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Credential validation gateway".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_defaults() {
        temp_env::with_vars(
            [
                ("KRBGATE_LISTEN", None::<&str>),
                ("KRBGATE_PORT", None),
                ("KRBGATE_LOG_LEVEL", None),
            ],
            || {
                let matches = new().get_matches_from(vec!["krbgate"]);
                assert_eq!(
                    matches.get_one::<IpAddr>(ARG_LISTEN).copied(),
                    Some(IpAddr::from([127, 0, 0, 1]))
                );
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8088));
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(0)
                );
            },
        );
    }

    #[test]
    fn test_check_args() {
        temp_env::with_vars([("KRBGATE_LOG_LEVEL", None::<&str>)], || {
            let matches = new().get_matches_from(vec![
                "krbgate",
                "--listen",
                "0.0.0.0",
                "-p",
                "9443",
                "--engine-url",
                "http://engine:7000",
                "-vvv",
            ]);
            assert_eq!(
                matches.get_one::<IpAddr>(ARG_LISTEN).copied(),
                Some(IpAddr::from([0, 0, 0, 0]))
            );
            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(9443));
            assert_eq!(
                matches
                    .get_one::<String>(engine::ARG_ENGINE_URL)
                    .map(String::as_str),
                Some("http://engine:7000")
            );
            assert_eq!(
                matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                Some(3)
            );
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("KRBGATE_LISTEN", Some("::1")),
                ("KRBGATE_PORT", Some("443")),
                ("KRBGATE_LOG_LEVEL", Some("info")),
                ("KRBGATE_LOG_DIR", Some("stderr")),
            ],
            || {
                let matches = new().get_matches_from(vec!["krbgate"]);
                assert_eq!(
                    matches.get_one::<IpAddr>(ARG_LISTEN).map(IpAddr::is_loopback),
                    Some(true)
                );
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
                assert_eq!(
                    matches
                        .get_one::<String>(logging::ARG_LOG_DIR)
                        .map(String::as_str),
                    Some("stderr")
                );
            },
        );
    }

    #[test]
    fn test_port_range() {
        temp_env::with_vars([("KRBGATE_PORT", None::<&str>)], || {
            assert!(new().try_get_matches_from(["krbgate", "-p", "0"]).is_err());
            assert!(new().try_get_matches_from(["krbgate", "-p", "65536"]).is_err());
            assert!(new().try_get_matches_from(["krbgate", "-p", "65535"]).is_ok());
        });
    }
}
