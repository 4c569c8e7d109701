//! HTTP adapter for an out-of-process protocol engine.
//!
//! Each exchange is a JSON `POST` to the engine serving the principal's realm.
//! Binary values travel as standard base64. Engines answer failures with a
//! non-2xx status and `{"errors": ["message"]}`.

use crate::engine::{
    AttributeBlob, AuthClient, AuthSession, AuthorizationData, DecryptedTicket, EncryptedTicket,
    EngineError, Principal, SessionKey,
};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{collections::HashMap, time::Duration};
use tracing::{Instrument, debug, info_span};
use url::Url;

pub const AS_EXCHANGE_PATH: &str = "/v1/as-exchange";
pub const TGS_EXCHANGE_PATH: &str = "/v1/tgs-exchange";
pub const DECRYPT_PATH: &str = "/v1/ticket/decrypt";
pub const PAC_PATH: &str = "/v1/pac";

fn engine_error_message(json_response: &Value) -> &str {
    json_response
        .get("errors")
        .and_then(|v| v.get(0))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Build `path` on top of an engine base URL, keeping any path prefix.
///
/// # Errors
/// Returns an error if `url` cannot be parsed, has no host, or uses an unsupported scheme.
pub fn endpoint_url(url: &str, path: &str) -> Result<String, EngineError> {
    let invalid = |reason: String| EngineError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;

    let scheme = parsed.scheme();

    let host = parsed
        .host()
        .ok_or_else(|| invalid("no host specified".to_string()))?
        .to_owned();

    let port = match parsed.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => return Err(invalid(format!("unsupported scheme {scheme}"))),
        },
    };

    let prefix = parsed.path().trim_end_matches('/');

    let endpoint_url = format!("{scheme}://{host}:{port}{prefix}{path}");

    debug!("endpoint URL: {}", endpoint_url);

    Ok(endpoint_url)
}

/// Engine base URLs by realm, with an optional fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealmMap {
    realms: HashMap<String, String>,
    default: Option<String>,
}

impl RealmMap {
    #[must_use]
    pub fn new(default: Option<String>) -> Self {
        Self {
            realms: HashMap::new(),
            default,
        }
    }

    /// Realm names are matched case-insensitively.
    pub fn insert(&mut self, realm: &str, url: impl Into<String>) {
        self.realms.insert(realm.to_ascii_uppercase(), url.into());
    }

    /// Parse a `REALM=URL` entry.
    ///
    /// # Errors
    /// Returns an error if the entry has no `=`, an empty realm, or an invalid URL.
    pub fn parse_entry(entry: &str) -> Result<(String, String), EngineError> {
        let (realm, url) = entry
            .split_once('=')
            .map(|(realm, url)| (realm.trim(), url.trim()))
            .ok_or_else(|| EngineError::InvalidUrl {
                url: entry.to_string(),
                reason: "expected REALM=URL".to_string(),
            })?;

        if realm.is_empty() {
            return Err(EngineError::InvalidUrl {
                url: url.to_string(),
                reason: "empty realm".to_string(),
            });
        }

        endpoint_url(url, "")?;

        Ok((realm.to_ascii_uppercase(), url.to_string()))
    }

    /// # Errors
    /// Returns [`EngineError::UnknownRealm`] if neither the realm nor a default is configured.
    pub fn endpoint(&self, realm: &str) -> Result<&str, EngineError> {
        self.realms
            .get(&realm.to_ascii_uppercase())
            .or(self.default.as_ref())
            .map(String::as_str)
            .ok_or_else(|| EngineError::UnknownRealm(realm.to_string()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.realms.is_empty() && self.default.is_none()
    }

    /// `(realm, url)` pairs sorted by realm, default last as `*`.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .realms
            .iter()
            .map(|(realm, url)| (realm.clone(), url.clone()))
            .collect();
        entries.sort();
        if let Some(default) = &self.default {
            entries.push(("*".to_string(), default.clone()));
        }
        entries
    }
}

#[derive(Serialize, Deserialize)]
struct WireKey {
    etype: i32,
    value: String,
}

impl WireKey {
    fn from_key(key: &SessionKey) -> Self {
        Self {
            etype: key.etype,
            value: Base64::encode_string(key.value.expose_secret()),
        }
    }

    fn into_key(self) -> Result<SessionKey, EngineError> {
        Ok(SessionKey::new(self.etype, decode(&self.value, "session_key")?))
    }
}

#[derive(Serialize, Deserialize)]
struct WireTicket {
    realm: String,
    etype: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kvno: Option<u32>,
    cipher: String,
}

impl WireTicket {
    fn from_ticket(ticket: &EncryptedTicket) -> Self {
        Self {
            realm: ticket.realm.clone(),
            etype: ticket.etype,
            kvno: ticket.kvno,
            cipher: Base64::encode_string(&ticket.cipher),
        }
    }

    fn into_ticket(self) -> Result<EncryptedTicket, EngineError> {
        Ok(EncryptedTicket {
            cipher: decode(&self.cipher, "ticket.cipher")?,
            realm: self.realm,
            etype: self.etype,
            kvno: self.kvno,
        })
    }
}

#[derive(Deserialize)]
struct WireAuthorizationData {
    ad_type: i32,
    ad_data: String,
    #[serde(default)]
    elements: Option<Vec<WireAuthorizationData>>,
}

impl WireAuthorizationData {
    fn into_entry(self) -> Result<AuthorizationData, EngineError> {
        let elements = self
            .elements
            .map(|elements| {
                elements
                    .into_iter()
                    .map(Self::into_entry)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(AuthorizationData {
            ad_type: self.ad_type,
            ad_data: decode(&self.ad_data, "ad_data")?,
            elements,
        })
    }
}

#[derive(Serialize)]
struct AsExchangeRequest<'a> {
    cname: &'a str,
    realm: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AsExchangeResponse {
    session_key: WireKey,
    auth_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    ticket: String,
}

#[derive(Serialize)]
struct TgsExchangeRequest<'a> {
    cname: &'a str,
    realm: &'a str,
    sname: String,
    ticket: String,
    session_key: WireKey,
}

#[derive(Deserialize)]
struct TgsExchangeResponse {
    ticket: WireTicket,
}

#[derive(Serialize)]
struct DecryptRequest {
    ticket: WireTicket,
    key: WireKey,
}

#[derive(Deserialize)]
struct DecryptResponse {
    crealm: String,
    auth_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(default)]
    authorization_data: Vec<WireAuthorizationData>,
}

#[derive(Serialize)]
struct PacRequest<'a> {
    realm: &'a str,
    ad_data: String,
    key: WireKey,
}

#[derive(Deserialize)]
struct PacResponse {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    group_sids: Vec<String>,
}

fn decode(value: &str, field: &str) -> Result<Vec<u8>, EngineError> {
    Base64::decode_vec(value).map_err(|e| EngineError::Malformed(format!("{field}: {e}")))
}

/// [`AuthClient`] backed by engine sidecars reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: Client,
    realms: RealmMap,
}

impl HttpEngine {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(realms: RealmMap, timeout: Duration) -> Result<Self, EngineError> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        Ok(Self { client, realms })
    }

    async fn post<Req, Resp>(&self, realm: &str, path: &str, body: &Req) -> Result<Resp, EngineError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let url = endpoint_url(self.realms.endpoint(realm)?, path)?;

        let span = info_span!("engine.request", engine.path = path, engine.realm = realm);

        async {
            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| EngineError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let message = response
                    .json::<Value>()
                    .await
                    .map(|json| engine_error_message(&json).to_string())
                    .unwrap_or_default();

                return Err(EngineError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }

            response
                .json::<Resp>()
                .await
                .map_err(|e| EngineError::Malformed(e.to_string()))
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl AuthClient for HttpEngine {
    async fn auth_exchange(
        &self,
        principal: &Principal,
        password: &SecretString,
    ) -> Result<AuthSession, EngineError> {
        let request = AsExchangeRequest {
            cname: &principal.name,
            realm: &principal.realm,
            password: password.expose_secret(),
        };

        let response: AsExchangeResponse = self
            .post(&principal.realm, AS_EXCHANGE_PATH, &request)
            .await?;

        Ok(AuthSession {
            principal: principal.clone(),
            key: response.session_key.into_key()?,
            auth_time: response.auth_time,
            expiry: response.end_time,
            tgt: decode(&response.ticket, "ticket")?,
        })
    }

    async fn request_self_service_ticket(
        &self,
        session: &AuthSession,
    ) -> Result<EncryptedTicket, EngineError> {
        let principal = &session.principal;
        let request = TgsExchangeRequest {
            cname: &principal.name,
            realm: &principal.realm,
            sname: principal.to_string(),
            ticket: Base64::encode_string(&session.tgt),
            session_key: WireKey::from_key(&session.key),
        };

        let response: TgsExchangeResponse = self
            .post(&principal.realm, TGS_EXCHANGE_PATH, &request)
            .await?;

        response.ticket.into_ticket()
    }

    async fn decrypt_ticket(
        &self,
        ticket: &EncryptedTicket,
        key: &SessionKey,
    ) -> Result<DecryptedTicket, EngineError> {
        let request = DecryptRequest {
            ticket: WireTicket::from_ticket(ticket),
            key: WireKey::from_key(key),
        };

        let response: DecryptResponse = self.post(&ticket.realm, DECRYPT_PATH, &request).await?;

        Ok(DecryptedTicket {
            crealm: response.crealm,
            auth_time: response.auth_time,
            end_time: response.end_time,
            authorization_data: response
                .authorization_data
                .into_iter()
                .map(WireAuthorizationData::into_entry)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    async fn extract_attribute_blob(
        &self,
        ticket: &DecryptedTicket,
        entry: &AuthorizationData,
        key: &SessionKey,
    ) -> Result<AttributeBlob, EngineError> {
        let request = PacRequest {
            realm: &ticket.crealm,
            ad_data: Base64::encode_string(&entry.ad_data),
            key: WireKey::from_key(key),
        };

        let response: PacResponse = self.post(&ticket.crealm, PAC_PATH, &request).await?;

        Ok(AttributeBlob {
            full_name: response.full_name,
            group_sids: response.group_sids,
        })
    }
}
