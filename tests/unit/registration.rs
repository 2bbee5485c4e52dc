use invitation_backend::{
    db::{InvitationStore, MemoryStore, models::RegisterRequest},
    error::AppError,
    services::{
        GateDecision, InvitationSignals, InvitationsService, RegistrationBackendKind,
        RegistrationOutcome, RegistrationService,
    },
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{TEST_PASSWORD, create_user, settings, settings_with};

fn form(username: &str, invitation_key: Option<&str>) -> RegisterRequest {
    RegisterRequest {
        invitation_key: invitation_key.map(str::to_string),
        username: Some(username.to_string()),
        email: format!("{}@example.org", username),
        password: TEST_PASSWORD.to_string(),
    }
}

#[test]
fn registration_without_a_key_is_refused_in_invite_mode() {
    let store = MemoryStore::new();
    let backend = RegistrationBackendKind::Username.backend(4);
    let signals = InvitationSignals::new();

    let outcome =
        RegistrationService::register(&store, backend.as_ref(), &settings(), &signals, &form("jane", None))
            .unwrap();
    assert!(matches!(outcome, RegistrationOutcome::Rejected(GateDecision::NoKey)));

    let outcome = RegistrationService::register(
        &store,
        backend.as_ref(),
        &settings(),
        &signals,
        &form("jane", Some("abc123")),
    )
    .unwrap();
    assert!(matches!(
        outcome,
        RegistrationOutcome::Rejected(GateDecision::InvalidKey { .. })
    ));
    assert!(store.find_user_by_login("jane").unwrap().is_none());
}

#[test]
fn valid_key_is_consumed_once() {
    let store = MemoryStore::new();
    let settings = settings();
    let backend = RegistrationBackendKind::Username.backend(4);
    let signals = InvitationSignals::new();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    signals.connect_accepted(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let issuer = create_user(&store, "issuer", false);
    let key = InvitationsService::create_invitation(&store, &settings, issuer.id, None, true).unwrap();

    let first = RegistrationService::register(
        &store,
        backend.as_ref(),
        &settings,
        &signals,
        &form("jane", Some(&key.key)),
    )
    .unwrap();
    let user = match first {
        RegistrationOutcome::Registered { user, invitation } => {
            assert_eq!(invitation.unwrap().registrant_id, Some(user.id));
            user
        }
        other => panic!("expected registration, got {:?}", other),
    };
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    let second = RegistrationService::register(
        &store,
        backend.as_ref(),
        &settings,
        &signals,
        &form("john", Some(&key.key)),
    )
    .unwrap();
    assert!(matches!(
        second,
        RegistrationOutcome::Rejected(GateDecision::InvalidKey { .. })
    ));
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert!(store.find_user_by_login("john").unwrap().is_none());
    assert_eq!(
        store.find_key(&key.key).unwrap().unwrap().registrant_id,
        Some(user.id)
    );
}

#[test]
fn open_registration_ignores_the_key() {
    let store = MemoryStore::new();
    let invite_settings = settings();
    let open = settings_with(|c| c.invite_mode = false);
    let backend = RegistrationBackendKind::Username.backend(4);
    let signals = InvitationSignals::new();

    let issuer = create_user(&store, "issuer", false);
    let key =
        InvitationsService::create_invitation(&store, &invite_settings, issuer.id, None, true).unwrap();

    let outcome = RegistrationService::register(
        &store,
        backend.as_ref(),
        &open,
        &signals,
        &form("jane", Some(&key.key)),
    )
    .unwrap();

    assert!(matches!(
        outcome,
        RegistrationOutcome::Registered { invitation: None, .. }
    ));
    assert!(!store.find_key(&key.key).unwrap().unwrap().is_used());
}

#[test]
fn email_backend_derives_the_username() {
    let store = MemoryStore::new();
    let settings = settings_with(|c| c.invite_mode = false);
    let backend = RegistrationBackendKind::Email.backend(4);
    let signals = InvitationSignals::new();

    let request = RegisterRequest {
        invitation_key: None,
        username: None,
        email: "jane.doe@example.org".to_string(),
        password: TEST_PASSWORD.to_string(),
    };
    let outcome =
        RegistrationService::register(&store, backend.as_ref(), &settings, &signals, &request).unwrap();

    match outcome {
        RegistrationOutcome::Registered { user, .. } => {
            assert_eq!(user.username, "jane.doe");
            assert!(bcrypt::verify(TEST_PASSWORD, &user.password_hash).unwrap());
        }
        other => panic!("expected registration, got {:?}", other),
    }
}

#[test]
fn duplicate_email_is_a_conflict_and_keeps_the_key() {
    let store = MemoryStore::new();
    let settings = settings();
    let backend = RegistrationBackendKind::Username.backend(4);
    let signals = InvitationSignals::new();

    let issuer = create_user(&store, "issuer", false);
    let key = InvitationsService::create_invitation(&store, &settings, issuer.id, None, true).unwrap();

    let mut request = form("someone", Some(&key.key));
    request.email = issuer.email.clone();

    let result = RegistrationService::register(&store, backend.as_ref(), &settings, &signals, &request);
    assert!(matches!(result, Err(AppError::Conflict { .. })));
    assert!(!store.find_key(&key.key).unwrap().unwrap().is_used());
}
