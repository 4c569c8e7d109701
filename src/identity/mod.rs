//! Credential input and identity output.
//!
//! [`Credentials`] are decoded from a JSON or form body, checked for empty
//! fields and handed to the validator. The password stays inside a
//! [`SecretString`] so it is zeroized on drop and redacted from `Debug`.
//! [`Identity`] is what callers get back.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Upper bound for a posted credential body.
pub const MAX_BODY_BYTES: usize = 1024;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("no {0} provided")]
    Missing(&'static str),

    #[error("error decoding provided JSON into credentials: {0}")]
    Json(#[from] serde_json::Error),

    #[error("credentials body exceeds {MAX_BODY_BYTES} bytes")]
    TooLarge,
}

/// Body encodings accepted by the authenticate endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Form,
}

impl BodyFormat {
    /// Pick a decoder from a `Content-Type` header value.
    ///
    /// Anything that is not a form post is decoded as JSON.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let mime = content_type
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .unwrap_or_default();

        if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            Self::Form
        } else {
            Self::Json
        }
    }
}

/// A login attempt as posted by a client.
#[derive(Debug, Clone)]
pub struct Credentials {
    login_name: String,
    domain: String,
    password: SecretString,
}

#[derive(Deserialize)]
struct CredentialsPayload {
    #[serde(
        default,
        rename = "loginName",
        alias = "LoginName",
        alias = "login-name",
        alias = "login_name"
    )]
    login_name: String,
    #[serde(default, alias = "Domain")]
    domain: String,
    #[serde(default, alias = "Password")]
    password: SecretString,
}

impl Credentials {
    /// # Errors
    /// Returns [`CredentialsError::Missing`] if any field is empty.
    pub fn new(
        login_name: impl Into<String>,
        domain: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, CredentialsError> {
        let login_name = login_name.into();
        let domain = domain.into();

        if login_name.trim().is_empty() {
            return Err(CredentialsError::Missing("loginName"));
        }
        if domain.trim().is_empty() {
            return Err(CredentialsError::Missing("domain"));
        }
        if password.expose_secret().is_empty() {
            return Err(CredentialsError::Missing("password"));
        }

        Ok(Self {
            login_name,
            domain,
            password,
        })
    }

    /// Decode a posted body in the given format.
    ///
    /// # Errors
    /// Returns an error if the body is too large, malformed, or has empty fields.
    pub fn decode(format: BodyFormat, body: &[u8]) -> Result<Self, CredentialsError> {
        if body.len() > MAX_BODY_BYTES {
            return Err(CredentialsError::TooLarge);
        }

        match format {
            BodyFormat::Json => Self::from_json(body),
            BodyFormat::Form => Self::from_form(body),
        }
    }

    /// # Errors
    /// Returns an error if the body is not a JSON object or a field is empty.
    pub fn from_json(body: &[u8]) -> Result<Self, CredentialsError> {
        let payload: CredentialsPayload = serde_json::from_slice(body)?;
        Self::new(payload.login_name, payload.domain, payload.password)
    }

    /// # Errors
    /// Returns an error if a field is missing or empty.
    pub fn from_form(body: &[u8]) -> Result<Self, CredentialsError> {
        let mut login_name = String::new();
        let mut domain = String::new();
        let mut password = SecretString::default();

        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "login-name" | "loginName" | "login_name" => login_name = value.into_owned(),
                "domain" => domain = value.into_owned(),
                "password" => password = SecretString::from(value.into_owned()),
                _ => {}
            }
        }

        Self::new(login_name, domain, password)
    }

    #[must_use]
    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

/// Result of a validation attempt, serialized back to the caller.
///
/// `valid` implies `auth_time` and `expiry` are set with `expiry > auth_time`.
/// When `valid` is false, `groups` is empty and `display_name == login_name`.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub valid: bool,
    pub domain: String,
    pub login_name: String,
    pub display_name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

impl Identity {
    /// A not-yet-validated identity for the given attempt.
    #[must_use]
    pub fn new(login_name: &str, domain: &str, session_id: impl Into<String>) -> Self {
        Self {
            valid: false,
            domain: domain.to_string(),
            login_name: login_name.to_string(),
            display_name: login_name.to_string(),
            groups: Vec::new(),
            auth_time: None,
            expiry: None,
            session_id: session_id.into(),
        }
    }
}
