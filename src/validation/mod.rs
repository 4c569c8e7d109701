//! Credential validation pipeline.
//!
//! [`Validator::validate`] authenticates first and enriches second. Only the
//! authentication exchange decides `valid`; enrichment failures are written to
//! the event log and otherwise ignored.

pub mod attributes;

#[cfg(test)]
mod tests;

use crate::{
    engine::{AuthClient, AuthSession, EngineError, Principal},
    event::{AttemptIds, Event, EventSink, OsAttemptIds, TrackingError},
    identity::{Credentials, Identity},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// A failed pipeline step, carrying the engine error behind it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Failure {
    #[error("validation of credentials failed - login error: {0}")]
    Authentication(EngineError),

    #[error("validation of credentials failed - service ticket error: {0}")]
    ServiceTicket(EngineError),

    #[error("validation of credentials failed - could not decrypt service ticket: {0}")]
    TicketDecrypt(EngineError),

    #[error("validation of credentials failed - could not get identity information: {0}")]
    AttributeBlob(EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The credential was not proven; the identity is invalid.
    Authentication,
    /// The credential was proven but attributes are missing.
    Enrichment,
}

impl Failure {
    #[must_use]
    pub const fn category(&self) -> FailureCategory {
        match self {
            Self::Authentication(_) => FailureCategory::Authentication,
            Self::ServiceTicket(_) | Self::TicketDecrypt(_) | Self::AttributeBlob(_) => {
                FailureCategory::Enrichment
            }
        }
    }
}

pub struct Validator {
    engine: Arc<dyn AuthClient>,
    events: Arc<dyn EventSink>,
    ids: Arc<dyn AttemptIds>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Validator {
    #[must_use]
    pub fn new(engine: Arc<dyn AuthClient>, events: Arc<dyn EventSink>) -> Self {
        Self {
            engine,
            events,
            ids: Arc::new(OsAttemptIds),
        }
    }

    #[must_use]
    pub fn with_attempt_ids(mut self, ids: Arc<dyn AttemptIds>) -> Self {
        self.ids = ids;
        self
    }

    /// Validate a credential and return the resulting identity.
    ///
    /// Authentication and enrichment failures are encoded in the returned
    /// identity and the event log.
    ///
    /// # Errors
    /// Returns [`TrackingError`] if no attempt identifier could be generated;
    /// in that case no event is written and the engine is never called.
    #[instrument(
        skip_all,
        fields(login_name = credentials.login_name(), domain = credentials.domain())
    )]
    pub async fn validate(&self, credentials: Credentials) -> Result<Identity, TrackingError> {
        let mut event = Event::new_attempt(
            self.ids.as_ref(),
            credentials.login_name(),
            credentials.domain(),
        )?;
        let mut identity = Identity::new(
            credentials.login_name(),
            credentials.domain(),
            event.event_id.clone(),
        );
        self.events.append(event.clone());

        let session = match self.authenticate(credentials).await {
            Ok(session) => session,
            Err(failure) => {
                warn!(session_id = %identity.session_id, "{failure}");
                event.authentication_failed(failure.to_string());
                self.events.append(event);
                return Ok(identity);
            }
        };

        identity.valid = true;
        identity.auth_time = Some(session.auth_time);
        identity.expiry = Some(session.expiry);
        event.authenticated(session.auth_time);
        self.events.append(event.clone());
        info!(session_id = %identity.session_id, "authentication successful");

        if let Err(failure) = self.enrich(&session, &mut identity).await {
            warn!(session_id = %identity.session_id, "{failure}");
            event.enrichment_failed(failure.to_string());
            self.events.append(event);
        }

        Ok(identity)
    }

    // Consumes the credentials so the password is dropped after the exchange.
    async fn authenticate(&self, credentials: Credentials) -> Result<AuthSession, Failure> {
        let principal = Principal::new(credentials.login_name(), credentials.domain());

        let session = self
            .engine
            .auth_exchange(&principal, credentials.password())
            .await
            .map_err(Failure::Authentication)?;

        drop(credentials);

        if session.expiry <= session.auth_time {
            return Err(Failure::Authentication(EngineError::Malformed(format!(
                "ticket for {principal} expires at {} before it was issued at {}",
                session.expiry, session.auth_time
            ))));
        }

        Ok(session)
    }

    async fn enrich(&self, session: &AuthSession, identity: &mut Identity) -> Result<(), Failure> {
        let ticket = self
            .engine
            .request_self_service_ticket(session)
            .await
            .map_err(Failure::ServiceTicket)?;

        let decrypted = self
            .engine
            .decrypt_ticket(&ticket, &session.key)
            .await
            .map_err(Failure::TicketDecrypt)?;

        let Some(entry) = attributes::find_attribute_blob(&decrypted.authorization_data) else {
            debug!(session_id = %identity.session_id, "no attribute blob in service ticket");
            return Ok(());
        };

        let blob = self
            .engine
            .extract_attribute_blob(&decrypted, entry, &session.key)
            .await
            .map_err(Failure::AttributeBlob)?;

        attributes::apply(identity, blob);

        Ok(())
    }
}
