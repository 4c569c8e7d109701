//! Protocol engine capability.
//!
//! Wire encoding, key derivation and ticket cryptography are not done here.
//! The validator only sees the [`AuthClient`] trait and the value types below;
//! [`http::HttpEngine`] forwards each step to an engine sidecar and
//! [`scripted::ScriptedEngine`] replays canned outcomes.

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{SecretSlice, SecretString};
use std::fmt;
use thiserror::Error;

/// Authorization data container whose contents are further entries.
pub const AD_IF_RELEVANT: i32 = 1;
/// Authorization data entry carrying the privilege attribute certificate.
pub const AD_WIN2K_PAC: i32 = 128;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no protocol engine configured for realm {0}")]
    UnknownRealm(String),

    #[error("invalid engine URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("engine request failed: {0}")]
    Transport(String),

    #[error("engine returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed engine response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Protocol(String),
}

/// The identity being authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub realm: String,
}

impl Principal {
    #[must_use]
    pub fn new(name: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            realm: realm.into(),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.realm)
    }
}

/// Symmetric key material returned by the engine.
#[derive(Debug, Clone)]
pub struct SessionKey {
    pub etype: i32,
    pub value: SecretSlice<u8>,
}

impl SessionKey {
    #[must_use]
    pub fn new(etype: i32, value: Vec<u8>) -> Self {
        Self {
            etype,
            value: SecretSlice::from(value),
        }
    }
}

/// Result of a successful authentication exchange.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub principal: Principal,
    pub key: SessionKey,
    pub auth_time: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
    /// Opaque ticket-granting ticket, handed back for follow-up exchanges.
    pub tgt: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedTicket {
    pub realm: String,
    pub etype: i32,
    pub kvno: Option<u32>,
    pub cipher: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationData {
    pub ad_type: i32,
    pub ad_data: Vec<u8>,
    /// Entries of a container type as decoded by the engine; `None` when the
    /// entry is not a container or could not be decoded.
    pub elements: Option<Vec<AuthorizationData>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedTicket {
    pub crealm: String,
    pub auth_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub authorization_data: Vec<AuthorizationData>,
}

/// Extended identity attributes carried inside a ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeBlob {
    pub full_name: String,
    pub group_sids: Vec<String>,
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Prove password knowledge with the initial ticket exchange.
    async fn auth_exchange(
        &self,
        principal: &Principal,
        password: &SecretString,
    ) -> Result<AuthSession, EngineError>;

    /// Ask for a service ticket addressed to the authenticated principal.
    async fn request_self_service_ticket(
        &self,
        session: &AuthSession,
    ) -> Result<EncryptedTicket, EngineError>;

    async fn decrypt_ticket(
        &self,
        ticket: &EncryptedTicket,
        key: &SessionKey,
    ) -> Result<DecryptedTicket, EngineError>;

    /// Parse the attribute blob found in `entry` of a decrypted ticket.
    async fn extract_attribute_blob(
        &self,
        ticket: &DecryptedTicket,
        entry: &AuthorizationData,
        key: &SessionKey,
    ) -> Result<AttributeBlob, EngineError>;
}
