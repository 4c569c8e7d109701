use crate::engine::http::{RealmMap, endpoint_url};
use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const ARG_ENGINE_URL: &str = "engine-url";
pub const ARG_REALM: &str = "realm";
pub const ARG_ENGINE_TIMEOUT: &str = "engine-timeout";

#[derive(Debug, Clone)]
pub struct Options {
    pub realms: RealmMap,
    pub timeout: Duration,
}

impl Options {
    /// Parse engine arguments from matches.
    ///
    /// # Errors
    /// Returns an error if no engine is configured or an entry is invalid.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let default = matches
            .get_one::<String>(ARG_ENGINE_URL)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        if let Some(url) = &default {
            endpoint_url(url, "").with_context(|| format!("invalid --{ARG_ENGINE_URL}"))?;
        }

        let mut realms = RealmMap::new(default);
        for entry in matches
            .get_many::<String>(ARG_REALM)
            .into_iter()
            .flatten()
            .filter(|entry| !entry.trim().is_empty())
        {
            let (realm, url) =
                RealmMap::parse_entry(entry).with_context(|| format!("invalid --{ARG_REALM}"))?;
            realms.insert(&realm, url);
        }

        if realms.is_empty() {
            return Err(anyhow!(
                "missing required argument: --{ARG_ENGINE_URL} or --{ARG_REALM}"
            ));
        }

        let timeout = matches
            .get_one::<u64>(ARG_ENGINE_TIMEOUT)
            .copied()
            .unwrap_or(10);

        Ok(Self {
            realms,
            timeout: Duration::from_secs(timeout),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ENGINE_URL)
                .long(ARG_ENGINE_URL)
                .help("Protocol engine base URL used for any realm without its own entry")
                .env("KRBGATE_ENGINE_URL"),
        )
        .arg(
            Arg::new(ARG_REALM)
                .long(ARG_REALM)
                .help("Protocol engine for one realm, as REALM=URL (repeatable)")
                .long_help(
                    "Protocol engine for one realm, as REALM=URL. Repeat the flag or set \
                     KRBGATE_REALMS to a comma separated list. Realm names are case-insensitive.",
                )
                .env("KRBGATE_REALMS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_ENGINE_TIMEOUT)
                .long(ARG_ENGINE_TIMEOUT)
                .help("Timeout in seconds for each engine request")
                .default_value("10")
                .env("KRBGATE_ENGINE_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
