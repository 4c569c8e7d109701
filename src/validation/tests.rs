use super::*;
use crate::{
    engine::{
        AttributeBlob,
        scripted::{CallCounts, Enrichment, ScriptedEngine},
    },
    event::Outcome,
    sink::MemorySink,
};
use anyhow::Result;
use chrono::TimeDelta;
use secrecy::SecretString;
use std::{collections::HashMap, time::Duration};
use uuid::Uuid;

const REALM: &str = "EXAMPLE.COM";

fn blob(full_name: &str) -> Enrichment {
    Enrichment::Blob(AttributeBlob {
        full_name: full_name.to_string(),
        group_sids: vec![
            "S-1-5-21-1-2-3-513".to_string(),
            "S-1-5-21-1-2-3-1105".to_string(),
        ],
    })
}

fn creds(login: &str, password: &str) -> Result<Credentials> {
    Ok(Credentials::new(login, REALM, SecretString::from(password))?)
}

fn validator(engine: &Arc<ScriptedEngine>, sink: &Arc<MemorySink>) -> Validator {
    Validator::new(engine.clone(), sink.clone())
}

#[tokio::test]
async fn success_with_blob() -> Result<()> {
    let engine = Arc::new(ScriptedEngine::new().with_account(
        "alice",
        REALM,
        "s3cret",
        blob("Alice Liddell"),
    ));
    let sink = Arc::new(MemorySink::new());

    let identity = validator(&engine, &sink)
        .validate(creds("alice", "s3cret")?)
        .await?;

    assert!(identity.valid);
    assert_eq!(identity.display_name, "Alice Liddell");
    assert_eq!(identity.groups.len(), 2);
    let (auth_time, expiry) = identity
        .auth_time
        .zip(identity.expiry)
        .ok_or_else(|| anyhow::anyhow!("times not set"))?;
    assert!(auth_time < expiry);

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event_id == identity.session_id));
    assert_eq!(events[0].outcome, Outcome::Received);
    assert_eq!(events[1].outcome, Outcome::Authenticated);
    assert_eq!(events[1].message, "authentication successful");
    assert_eq!(events[1].time, auth_time);
    assert!(events[1].validated && events[1].validation_successful);
    Ok(())
}

#[tokio::test]
async fn empty_full_name_keeps_login_name() -> Result<()> {
    let engine = Arc::new(ScriptedEngine::new().with_account("alice", REALM, "s3cret", blob("")));
    let sink = Arc::new(MemorySink::new());

    let identity = validator(&engine, &sink)
        .validate(creds("alice", "s3cret")?)
        .await?;

    assert!(identity.valid);
    assert_eq!(identity.display_name, "alice");
    assert_eq!(identity.groups.len(), 2);
    Ok(())
}

#[tokio::test]
async fn success_without_blob() -> Result<()> {
    let engine = Arc::new(ScriptedEngine::new().with_account(
        "alice",
        REALM,
        "s3cret",
        Enrichment::NoBlob,
    ));
    let sink = Arc::new(MemorySink::new());

    let identity = validator(&engine, &sink)
        .validate(creds("alice", "s3cret")?)
        .await?;

    assert!(identity.valid);
    assert!(identity.groups.is_empty());
    assert_eq!(identity.display_name, "alice");
    assert_eq!(sink.events().len(), 2);
    assert_eq!(engine.calls().attribute_blob, 0);
    Ok(())
}

#[tokio::test]
async fn wrong_password() -> Result<()> {
    let engine = Arc::new(ScriptedEngine::new().with_account(
        "alice",
        REALM,
        "s3cret",
        blob("Alice Liddell"),
    ));
    let sink = Arc::new(MemorySink::new());

    let identity = validator(&engine, &sink)
        .validate(creds("alice", "guess")?)
        .await?;

    assert!(!identity.valid);
    assert!(identity.groups.is_empty());
    assert_eq!(identity.display_name, "alice");
    assert!(identity.auth_time.is_none());
    assert!(identity.expiry.is_none());

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event_id == identity.session_id));
    assert_eq!(events[1].outcome, Outcome::AuthenticationFailed);
    assert!(!events[1].validation_successful);
    assert!(!events[1].validated);
    assert!(
        events[1]
            .message
            .starts_with("validation of credentials failed - login error:")
    );
    assert!(!events[1].message.contains("guess"));

    // No enrichment after a failed login.
    assert_eq!(
        engine.calls(),
        CallCounts {
            auth_exchange: 1,
            ..CallCounts::default()
        }
    );
    Ok(())
}

#[tokio::test]
async fn unknown_principal() -> Result<()> {
    let engine = Arc::new(ScriptedEngine::new());
    let sink = Arc::new(MemorySink::new());

    let identity = validator(&engine, &sink)
        .validate(creds("mallory", "anything")?)
        .await?;

    assert!(!identity.valid);
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events[1].message.contains("PRINCIPAL_UNKNOWN"));
    Ok(())
}

#[tokio::test]
async fn enrichment_failures_keep_identity_valid() -> Result<()> {
    let cases = [
        (
            Enrichment::FailServiceTicket("KDC_ERR_S_PRINCIPAL_UNKNOWN".to_string()),
            "service ticket error",
        ),
        (
            Enrichment::FailDecrypt("integrity check failed".to_string()),
            "could not decrypt service ticket",
        ),
        (
            Enrichment::FailBlob("signature mismatch".to_string()),
            "could not get identity information",
        ),
    ];

    for (enrichment, step) in cases {
        let engine = Arc::new(ScriptedEngine::new().with_account(
            "alice", REALM, "s3cret", enrichment,
        ));
        let sink = Arc::new(MemorySink::new());

        let identity = validator(&engine, &sink)
            .validate(creds("alice", "s3cret")?)
            .await?;

        assert!(identity.valid, "{step}");
        assert!(identity.groups.is_empty(), "{step}");
        assert_eq!(identity.display_name, "alice", "{step}");
        assert!(identity.auth_time.is_some(), "{step}");

        let events = sink.events();
        assert_eq!(events.len(), 3, "{step}");
        assert_eq!(events[1].outcome, Outcome::Authenticated, "{step}");
        assert_eq!(events[2].outcome, Outcome::EnrichmentFailed, "{step}");
        assert!(events[2].validation_successful, "{step}");
        assert!(events[2].message.contains(step), "{step}");
    }
    Ok(())
}

#[tokio::test]
async fn empty_validity_window_is_not_valid() -> Result<()> {
    let engine = Arc::new(
        ScriptedEngine::new()
            .with_account("alice", REALM, "s3cret", Enrichment::NoBlob)
            .with_lifetime(TimeDelta::zero()),
    );
    let sink = Arc::new(MemorySink::new());

    let identity = validator(&engine, &sink)
        .validate(creds("alice", "s3cret")?)
        .await?;

    assert!(!identity.valid);
    assert!(identity.auth_time.is_none());
    assert_eq!(sink.events()[1].outcome, Outcome::AuthenticationFailed);
    assert_eq!(engine.calls().service_ticket, 0);
    Ok(())
}

#[tokio::test]
async fn repeated_failures_are_independent_attempts() -> Result<()> {
    let engine = Arc::new(ScriptedEngine::new());
    let sink = Arc::new(MemorySink::new());
    let validator = validator(&engine, &sink);

    let first = validator.validate(creds("alice", "bad")?).await?;
    let second = validator.validate(creds("alice", "bad")?).await?;

    assert_ne!(first.session_id, second.session_id);
    assert_eq!(first.groups, second.groups);
    assert_eq!(sink.events().len(), 4);
    Ok(())
}

struct ExhaustedIds;

impl AttemptIds for ExhaustedIds {
    fn next_id(&self) -> Result<Uuid, TrackingError> {
        Err(TrackingError::Unavailable("entropy source closed".to_string()))
    }
}

#[tokio::test]
async fn tracking_failure_aborts_before_engine() -> Result<()> {
    let engine = Arc::new(ScriptedEngine::new().with_account(
        "alice",
        REALM,
        "s3cret",
        Enrichment::NoBlob,
    ));
    let sink = Arc::new(MemorySink::new());

    let result = validator(&engine, &sink)
        .with_attempt_ids(Arc::new(ExhaustedIds))
        .validate(creds("alice", "s3cret")?)
        .await;

    assert!(matches!(result, Err(TrackingError::Unavailable(_))));
    assert!(sink.events().is_empty());
    assert_eq!(engine.calls(), CallCounts::default());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_validations_do_not_mix_fields() -> Result<()> {
    let mut engine = ScriptedEngine::new().with_latency(Duration::from_millis(5));
    for n in 0..16 {
        let enrichment = if n % 2 == 0 {
            blob(&format!("User {n}"))
        } else {
            Enrichment::NoBlob
        };
        engine = engine.with_account(&format!("user{n}"), REALM, &format!("pw{n}"), enrichment);
    }
    let engine = Arc::new(engine);
    let sink = Arc::new(MemorySink::new());
    let validator = Arc::new(validator(&engine, &sink));

    let mut handles = Vec::new();
    for n in 0..16 {
        let validator = Arc::clone(&validator);
        // Every fourth user sends a wrong password.
        let password = if n % 4 == 3 {
            "wrong".to_string()
        } else {
            format!("pw{n}")
        };
        let credentials = creds(&format!("user{n}"), &password)?;
        handles.push(tokio::spawn(async move {
            (n, validator.validate(credentials).await)
        }));
    }

    let mut by_session = HashMap::new();
    for handle in handles {
        let (n, identity) = handle.await?;
        let identity = identity?;
        assert_eq!(identity.login_name, format!("user{n}"));
        assert_eq!(identity.valid, n % 4 != 3);
        if n % 2 == 0 && identity.valid {
            assert_eq!(identity.display_name, format!("User {n}"));
        } else {
            assert_eq!(identity.display_name, identity.login_name);
        }
        by_session.insert(identity.session_id.clone(), identity);
    }
    assert_eq!(by_session.len(), 16);

    let events = sink.events();
    assert_eq!(events.len(), 32);
    for event in events {
        let identity = by_session
            .get(&event.event_id)
            .ok_or_else(|| anyhow::anyhow!("event for unknown attempt {}", event.event_id))?;
        assert_eq!(event.login_name, identity.login_name);
        assert_eq!(event.domain, identity.domain);
    }
    Ok(())
}

#[test]
fn failure_categories() {
    let err = EngineError::Protocol("x".to_string());
    assert_eq!(
        Failure::Authentication(err.clone()).category(),
        FailureCategory::Authentication
    );
    for failure in [
        Failure::ServiceTicket(err.clone()),
        Failure::TicketDecrypt(err.clone()),
        Failure::AttributeBlob(err),
    ] {
        assert_eq!(failure.category(), FailureCategory::Enrichment);
    }
}
