//! Audit events for validation attempts.
//!
//! Every attempt writes one `received` event on entry and one terminal event.
//! An enrichment failure adds a third event that leaves `validationSuccessful`
//! set. All events of an attempt share the same `eventID`, which is also the
//! `sessionID` returned to the caller.

use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MSG_RECEIVED: &str = "new authentication request";
pub const MSG_AUTHENTICATED: &str = "authentication successful";

/// The attempt cannot be tracked, so it must not proceed.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("attempt identifier unavailable: {0}")]
    Unavailable(String),
}

/// Source of attempt identifiers.
pub trait AttemptIds: Send + Sync {
    /// # Errors
    /// Returns [`TrackingError`] if no identifier can be produced.
    fn next_id(&self) -> Result<Uuid, TrackingError>;
}

/// Random 128-bit identifiers drawn from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsAttemptIds;

impl AttemptIds for OsAttemptIds {
    fn next_id(&self) -> Result<Uuid, TrackingError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TrackingError::Unavailable(e.to_string()))?;
        Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Received,
    Authenticated,
    AuthenticationFailed,
    EnrichmentFailed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "eventID")]
    pub event_id: String,
    pub time: DateTime<Utc>,
    pub login_name: String,
    pub domain: String,
    pub validated: bool,
    pub validation_successful: bool,
    pub outcome: Outcome,
    pub message: String,
}

impl Event {
    /// Start tracking a new attempt.
    ///
    /// # Errors
    /// Returns [`TrackingError`] if the identifier source fails.
    pub fn new_attempt(
        ids: &dyn AttemptIds,
        login_name: &str,
        domain: &str,
    ) -> Result<Self, TrackingError> {
        let id = ids.next_id()?;

        Ok(Self {
            event_id: id.to_string(),
            time: Utc::now(),
            login_name: login_name.to_string(),
            domain: domain.to_string(),
            validated: false,
            validation_successful: false,
            outcome: Outcome::Received,
            message: MSG_RECEIVED.to_string(),
        })
    }

    pub fn authenticated(&mut self, auth_time: DateTime<Utc>) {
        self.time = auth_time;
        self.validated = true;
        self.validation_successful = true;
        self.outcome = Outcome::Authenticated;
        self.message = MSG_AUTHENTICATED.to_string();
    }

    pub fn authentication_failed(&mut self, message: String) {
        self.time = Utc::now();
        self.validated = false;
        self.validation_successful = false;
        self.outcome = Outcome::AuthenticationFailed;
        self.message = message;
    }

    // The credential was proven, so validation_successful stays true.
    pub fn enrichment_failed(&mut self, message: String) {
        self.time = Utc::now();
        self.validated = false;
        self.validation_successful = true;
        self.outcome = Outcome::EnrichmentFailed;
        self.message = message;
    }
}

/// Append-only destination for events.
///
/// Appends never fail from the caller's point of view; implementations log
/// their own write errors and serialize concurrent writers.
pub trait EventSink: Send + Sync {
    fn append(&self, event: Event);
}
