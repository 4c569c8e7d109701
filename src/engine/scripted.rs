//! Deterministic in-process engine.
//!
//! Accounts are registered up front with a password and an enrichment
//! script. Tickets and blob entries carry the principal name as their payload
//! so each later step can find its account again.

use crate::engine::{
    AD_IF_RELEVANT, AD_WIN2K_PAC, AttributeBlob, AuthClient, AuthSession, AuthorizationData,
    DecryptedTicket, EncryptedTicket, EngineError, Principal, SessionKey,
};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// Authorization data type used for entries that are not attribute blobs.
const AD_OTHER: i32 = 8;

/// What happens after a successful authentication exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    /// The decrypted ticket carries this blob.
    Blob(AttributeBlob),
    /// The decrypted ticket carries no blob.
    NoBlob,
    FailServiceTicket(String),
    FailDecrypt(String),
    FailBlob(String),
}

#[derive(Debug)]
struct Account {
    password: String,
    enrichment: Enrichment,
}

/// Number of times each engine operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub auth_exchange: usize,
    pub service_ticket: usize,
    pub decrypt_ticket: usize,
    pub attribute_blob: usize,
}

#[derive(Debug, Default)]
struct Counters {
    auth_exchange: AtomicUsize,
    service_ticket: AtomicUsize,
    decrypt_ticket: AtomicUsize,
    attribute_blob: AtomicUsize,
}

#[derive(Debug)]
pub struct ScriptedEngine {
    accounts: HashMap<String, Account>,
    lifetime: TimeDelta,
    latency: Option<Duration>,
    counters: Counters,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn account_key(name: &str, realm: &str) -> String {
    format!("{name}@{}", realm.to_ascii_uppercase())
}

impl ScriptedEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            lifetime: TimeDelta::hours(10),
            latency: None,
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub fn with_account(
        mut self,
        name: &str,
        realm: &str,
        password: &str,
        enrichment: Enrichment,
    ) -> Self {
        self.accounts.insert(
            account_key(name, realm),
            Account {
                password: password.to_string(),
                enrichment,
            },
        );
        self
    }

    /// Ticket lifetime reported by the authentication exchange.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: TimeDelta) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sleep before answering each call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            auth_exchange: self.counters.auth_exchange.load(Ordering::SeqCst),
            service_ticket: self.counters.service_ticket.load(Ordering::SeqCst),
            decrypt_ticket: self.counters.decrypt_ticket.load(Ordering::SeqCst),
            attribute_blob: self.counters.attribute_blob.load(Ordering::SeqCst),
        }
    }

    async fn step(&self, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn account_for(&self, payload: &[u8]) -> Result<(&str, &Account), EngineError> {
        let key = std::str::from_utf8(payload)
            .map_err(|_| EngineError::Protocol("unreadable ticket payload".to_string()))?;
        self.accounts
            .get_key_value(key)
            .map(|(key, account)| (key.as_str(), account))
            .ok_or_else(|| EngineError::Protocol(format!("no account for {key}")))
    }
}

#[async_trait]
impl AuthClient for ScriptedEngine {
    async fn auth_exchange(
        &self,
        principal: &Principal,
        password: &SecretString,
    ) -> Result<AuthSession, EngineError> {
        self.step(&self.counters.auth_exchange).await;

        let key = account_key(&principal.name, &principal.realm);
        let account = self.accounts.get(&key).ok_or_else(|| {
            EngineError::Protocol(format!("KDC_ERR_C_PRINCIPAL_UNKNOWN: {principal}"))
        })?;

        if account.password != password.expose_secret() {
            return Err(EngineError::Protocol(
                "KDC_ERR_PREAUTH_FAILED: pre-authentication information was invalid".to_string(),
            ));
        }

        let auth_time = Utc::now();
        Ok(AuthSession {
            principal: principal.clone(),
            key: SessionKey::new(18, key.as_bytes().to_vec()),
            auth_time,
            expiry: auth_time + self.lifetime,
            tgt: key.into_bytes(),
        })
    }

    async fn request_self_service_ticket(
        &self,
        session: &AuthSession,
    ) -> Result<EncryptedTicket, EngineError> {
        self.step(&self.counters.service_ticket).await;

        let (key, account) = self.account_for(&session.tgt)?;
        if let Enrichment::FailServiceTicket(message) = &account.enrichment {
            return Err(EngineError::Protocol(message.clone()));
        }

        Ok(EncryptedTicket {
            realm: session.principal.realm.clone(),
            etype: session.key.etype,
            kvno: Some(1),
            cipher: key.as_bytes().to_vec(),
        })
    }

    async fn decrypt_ticket(
        &self,
        ticket: &EncryptedTicket,
        _key: &SessionKey,
    ) -> Result<DecryptedTicket, EngineError> {
        self.step(&self.counters.decrypt_ticket).await;

        let (key, account) = self.account_for(&ticket.cipher)?;
        let inner = match &account.enrichment {
            Enrichment::FailDecrypt(message) => {
                return Err(EngineError::Protocol(message.clone()));
            }
            Enrichment::NoBlob => AD_OTHER,
            _ => AD_WIN2K_PAC,
        };

        let auth_time = Utc::now();
        Ok(DecryptedTicket {
            crealm: ticket.realm.clone(),
            auth_time,
            end_time: auth_time + self.lifetime,
            authorization_data: vec![AuthorizationData {
                ad_type: AD_IF_RELEVANT,
                ad_data: Vec::new(),
                elements: Some(vec![AuthorizationData {
                    ad_type: inner,
                    ad_data: key.as_bytes().to_vec(),
                    elements: None,
                }]),
            }],
        })
    }

    async fn extract_attribute_blob(
        &self,
        _ticket: &DecryptedTicket,
        entry: &AuthorizationData,
        _key: &SessionKey,
    ) -> Result<AttributeBlob, EngineError> {
        self.step(&self.counters.attribute_blob).await;

        let (_, account) = self.account_for(&entry.ad_data)?;
        match &account.enrichment {
            Enrichment::Blob(blob) => Ok(blob.clone()),
            Enrichment::FailBlob(message) => Err(EngineError::Protocol(message.clone())),
            _ => Err(EngineError::Protocol("no attribute blob in ticket".to_string())),
        }
    }
}
