use clap::{Arg, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_DIR: &str = "log-dir";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>()
            && parsed <= 5
        {
            return Ok(parsed);
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("KRBGATE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_DIR)
                .long("log-dir")
                .help("Directory for krbgate.log, access.log and event.log")
                .long_help(
                    "Directory for krbgate.log, access.log and event.log. \
                     Use stdout, stderr or null to send every log there instead.",
                )
                .default_value("./")
                .env("KRBGATE_LOG_DIR"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_env_accepts_names() {
        for (index, level) in ["error", "warn", "info", "debug", "trace"].iter().enumerate() {
            temp_env::with_vars([("KRBGATE_LOG_LEVEL", Some(*level))], || {
                let matches = with_args(Command::new("krbgate")).get_matches_from(vec!["krbgate"]);
                assert_eq!(
                    matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                    Some(u8::try_from(index).unwrap_or(u8::MAX))
                );
            });
        }
    }

    #[test]
    fn log_level_env_rejects_garbage() {
        temp_env::with_vars([("KRBGATE_LOG_LEVEL", Some("loud"))], || {
            let result =
                with_args(Command::new("krbgate")).try_get_matches_from(vec!["krbgate"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn log_dir_defaults_to_working_directory() {
        temp_env::with_vars([("KRBGATE_LOG_DIR", None::<&str>)], || {
            let matches = with_args(Command::new("krbgate")).get_matches_from(vec!["krbgate"]);
            assert_eq!(
                matches.get_one::<String>(ARG_LOG_DIR).map(String::as_str),
                Some("./")
            );
        });
    }
}
