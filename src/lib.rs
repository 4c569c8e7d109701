//! # krbgate (Credential Validation Gateway)
//!
//! `krbgate` is a small, stateless HTTP service that proves a login name,
//! realm and password against a ticket-based authentication realm and answers
//! with an [`identity::Identity`] record. Downstream services call it instead of
//! handling raw passwords themselves.
//!
//! ## Validation pipeline
//!
//! Every request runs the same linear pipeline in [`validation::Validator`]:
//!
//! 1. **Initialize:** a fresh attempt identifier is drawn from OS randomness and
//!    a `received` event is written.
//! 2. **Authenticate:** the initial ticket exchange is run through the protocol
//!    engine. Failure ends the request with `valid = false`.
//! 3. **Enrich (best effort):** a service ticket for the caller itself is
//!    requested and decrypted, and the attribute blob found in its authorization
//!    data supplies the display name and group SIDs. Failures are recorded as
//!    events and never revoke a successful authentication.
//!
//! ## Protocol engine
//!
//! Wire encoding and cryptography live behind the [`engine::AuthClient`] trait.
//! [`engine::http::HttpEngine`] talks to an engine sidecar over HTTP, one base URL
//! per realm; [`engine::scripted::ScriptedEngine`] is a deterministic fake.
//!
//! ## Logs
//!
//! Three append-only targets are written under `--log-dir`: the application
//! log (`krbgate.log`), the access log (`access.log`) and the event log
//! (`event.log`). Passwords and keys never reach any of them.
//!
//! ## Transport
//!
//! Plain HTTP by default; with `--tls-cert` and `--tls-key` the listener
//! serves HTTPS through [`tls::TlsListener`].

pub mod api;
pub mod cli;
pub mod engine;
pub mod event;
pub mod identity;
pub mod sink;
pub mod tls;
pub mod validation;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
