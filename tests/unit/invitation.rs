use chrono::{Duration, Utc};
use invitation_backend::{
    db::{
        InvitationStore, MemoryStore,
        models::{Recipient, User},
    },
    email::EmailError,
    error::AppError,
    services::{GateDecision, InvitationsService, SenderNote},
};
use uuid::Uuid;

use super::{RecordingMailer, create_user, settings, settings_with};

#[test]
fn created_key_is_valid_until_used() {
    let store = MemoryStore::new();
    let settings = settings();
    let issuer = create_user(&store, "issuer", false);

    let key = InvitationsService::create_invitation(&store, &settings, issuer.id, None, true).unwrap();
    assert_eq!(key.key.len(), 40);
    assert!(InvitationsService::is_key_valid(&store, Some(&key.key)).unwrap().is_some());

    let newcomer = User {
        id: Uuid::new_v4(),
        username: "newcomer".to_string(),
        email: "newcomer@example.com".to_string(),
        password_hash: "unused".to_string(),
        is_staff: false,
        is_active: true,
        created_at: Utc::now(),
    };
    store.register_user(&newcomer, Some(&key.key), Utc::now()).unwrap();

    // used keys stay invalid even before they expire
    assert!(InvitationsService::is_key_valid(&store, Some(&key.key)).unwrap().is_none());
    let stored = store.find_key(&key.key).unwrap().unwrap();
    assert_eq!(stored.registrant_id, Some(newcomer.id));
    assert!(stored.used_at.is_some());
}

#[test]
fn key_expires_at_its_deadline() {
    let store = MemoryStore::new();
    let settings = settings();
    let issuer = create_user(&store, "issuer", false);

    let key = InvitationsService::create_invitation(&store, &settings, issuer.id, None, true).unwrap();
    let just_before = key.expires_at - Duration::seconds(1);

    assert!(InvitationsService::is_key_valid_at(&store, Some(&key.key), just_before).unwrap().is_some());
    assert!(InvitationsService::is_key_valid_at(&store, Some(&key.key), key.expires_at).unwrap().is_none());
}

#[test]
fn unknown_missing_and_malformed_keys_are_invalid() {
    let store = MemoryStore::new();
    assert!(InvitationsService::is_key_valid(&store, Some("abc123")).unwrap().is_none());
    assert!(InvitationsService::is_key_valid(&store, None).unwrap().is_none());
    assert!(InvitationsService::is_key_valid(&store, Some("")).unwrap().is_none());
    assert!(InvitationsService::is_key_valid(&store, Some("../../etc")).unwrap().is_none());
}

#[test]
fn remaining_count_drops_per_key_and_stops_at_zero() {
    let store = MemoryStore::new();
    let settings = settings();
    let issuer = create_user(&store, "issuer", false);
    let start = InvitationsService::remaining_invitations_for_user(&store, &settings, issuer.id).unwrap();
    assert_eq!(start, settings.invitations_per_user);

    for _ in 0..2 {
        InvitationsService::create_invitation(&store, &settings, issuer.id, None, true).unwrap();
    }
    assert_eq!(
        InvitationsService::remaining_invitations_for_user(&store, &settings, issuer.id).unwrap(),
        start - 2
    );

    // an override below what was already issued floors at zero
    store.set_quota_override(issuer.id, 1, Utc::now()).unwrap();
    assert_eq!(
        InvitationsService::remaining_invitations_for_user(&store, &settings, issuer.id).unwrap(),
        0
    );
}

#[test]
fn fourth_invitation_over_a_quota_of_three_is_refused() {
    let store = MemoryStore::new();
    let settings = settings();
    let issuer = create_user(&store, "issuer", false);
    store.set_quota_override(issuer.id, 3, Utc::now()).unwrap();

    for _ in 0..3 {
        InvitationsService::create_invitation(&store, &settings, issuer.id, None, true).unwrap();
    }
    let fourth = InvitationsService::create_invitation(&store, &settings, issuer.id, None, true);

    assert!(matches!(fourth, Err(AppError::QuotaExceeded)));
    assert_eq!(store.list_keys_by_issuer(issuer.id).unwrap().len(), 3);
}

#[test]
fn previews_are_not_saved_and_cost_nothing() {
    let store = MemoryStore::new();
    let settings = settings_with(|c| c.invitations_per_user = 0);
    let issuer = create_user(&store, "issuer", false);

    let preview = InvitationsService::create_invitation(&store, &settings, issuer.id, None, false).unwrap();

    assert!(store.find_key(&preview.key).unwrap().is_none());
    assert!(store.list_keys_by_issuer(issuer.id).unwrap().is_empty());
}

#[test]
fn pending_policy_returns_quota_for_expired_keys() {
    let store = MemoryStore::new();
    let settings = settings_with(|c| {
        c.invitations_per_user = 1;
        c.invitation_quota_policy = "pending".to_string();
    });
    let issuer = create_user(&store, "issuer", false);
    let long_ago = Utc::now() - Duration::days(30);

    InvitationsService::create_invitation_at(&store, &settings, issuer.id, None, true, long_ago).unwrap();

    assert_eq!(
        InvitationsService::remaining_invitations_for_user(&store, &settings, issuer.id).unwrap(),
        1
    );
}

#[test]
fn issued_policy_never_returns_quota() {
    let store = MemoryStore::new();
    let settings = settings_with(|c| c.invitations_per_user = 1);
    let issuer = create_user(&store, "issuer", false);
    let long_ago = Utc::now() - Duration::days(30);

    InvitationsService::create_invitation_at(&store, &settings, issuer.id, None, true, long_ago).unwrap();

    assert_eq!(
        InvitationsService::remaining_invitations_for_user(&store, &settings, issuer.id).unwrap(),
        0
    );
}

#[test]
fn gate_follows_invite_mode_and_key_state() {
    let store = MemoryStore::new();
    let settings = settings();
    let issuer = create_user(&store, "issuer", false);

    assert_eq!(
        InvitationsService::gate(&store, &settings, None).unwrap(),
        GateDecision::NoKey
    );
    let invalid = InvitationsService::gate(&store, &settings, Some("abc123")).unwrap();
    assert_eq!(invalid, GateDecision::InvalidKey { key: "abc123".to_string() });
    assert_eq!(invalid.wrong_key_page().unwrap().context["invalid_key"], true);

    let key = InvitationsService::create_invitation(&store, &settings, issuer.id, None, true).unwrap();
    assert!(matches!(
        InvitationsService::gate(&store, &settings, Some(&key.key)).unwrap(),
        GateDecision::ValidKey(found) if found.key == key.key
    ));

    let open = settings_with(|c| c.invite_mode = false);
    assert_eq!(
        InvitationsService::gate(&store, &open, Some("abc123")).unwrap(),
        GateDecision::Open
    );
}

#[tokio::test]
async fn send_to_uses_stored_recipient_and_registration_link() {
    let store = MemoryStore::new();
    let settings = settings();
    let issuer = create_user(&store, "issuer", false);
    let mailer = RecordingMailer::default();
    let recipient = Recipient::with_names("jane@example.com", Some("Jane".into()), None);

    let key = InvitationsService::create_invitation(&store, &settings, issuer.id, Some(&recipient), true)
        .unwrap();
    InvitationsService::send_to(&mailer, &settings, &key, None, Some(SenderNote::User("<i>hi</i>")), None)
        .await
        .unwrap();

    let sent = mailer.attempts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jane@example.com");
    assert_eq!(sent[0].from, settings.default_from_email);
    let link = format!("http://testserver/invited/{}", key.key);
    assert!(sent[0].text.contains(&link));
    assert!(sent[0].html.contains("&lt;i&gt;hi&lt;/i&gt;"));
}

#[tokio::test]
async fn send_to_without_any_recipient_fails() {
    let store = MemoryStore::new();
    let settings = settings();
    let issuer = create_user(&store, "issuer", false);
    let key = InvitationsService::create_invitation(&store, &settings, issuer.id, None, true).unwrap();

    let result = InvitationsService::send_to(&RecordingMailer::default(), &settings, &key, None, None, None).await;
    assert!(matches!(result, Err(EmailError::NoRecipient)));
}

#[tokio::test]
async fn bulk_send_creates_one_key_per_recipient() {
    let store = MemoryStore::new();
    let settings = settings();
    let staff = create_user(&store, "staff", true);
    let mailer = RecordingMailer::default();

    let report = InvitationsService::send_bulk_invitations(
        &store,
        &mailer,
        &settings,
        staff.id,
        "a@x.com,Jane,Doe;b@x.com;",
        "",
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.keys.len(), 2);
    assert_eq!(
        report.keys[0].recipient(),
        Some(Recipient::with_names("a@x.com", Some("Jane".into()), Some("Doe".into())))
    );
    assert_eq!(report.keys[1].recipient(), Some(Recipient::new("b@x.com")));
    assert!(report.keys.iter().all(|key| key.quota_exempt));
    assert_eq!(report.sent, vec!["a@x.com", "b@x.com"]);

    // bulk keys leave the staff member's own quota alone
    assert_eq!(
        InvitationsService::remaining_invitations_for_user(&store, &settings, staff.id).unwrap(),
        settings.invitations_per_user
    );
}

#[tokio::test]
async fn bulk_send_continues_past_a_failed_mail() {
    let store = MemoryStore::new();
    let settings = settings();
    let staff = create_user(&store, "staff", true);
    let mailer = RecordingMailer::failing_for(&["b@x.com"]);

    let report = InvitationsService::send_bulk_invitations(
        &store,
        &mailer,
        &settings,
        staff.id,
        "a@x.com;b@x.com;c@x.com",
        "<b>Welcome aboard</b>",
        Some("staff@example.com"),
    )
    .await
    .unwrap();

    assert_eq!(report.keys.len(), 3);
    assert_eq!(mailer.attempts().len(), 3);
    assert_eq!(report.failed, vec!["b@x.com"]);
    assert!(report.message().contains("Mail to b@x.com failed"));
    assert_eq!(store.list_keys_by_issuer(staff.id).unwrap().len(), 3);

    let first = &mailer.attempts()[0];
    assert_eq!(first.from, "staff@example.com");
    assert!(first.html.contains("<b>Welcome aboard</b>"));
}

#[tokio::test]
async fn bulk_send_without_addresses_is_rejected() {
    let store = MemoryStore::new();
    let settings = settings();
    let staff = create_user(&store, "staff", true);
    let mailer = RecordingMailer::default();

    let result =
        InvitationsService::send_bulk_invitations(&store, &mailer, &settings, staff.id, " ; ", "", None).await;

    match result {
        Err(AppError::Validation { message }) => {
            assert_eq!(message, "You did not provide any email addresses.")
        }
        other => panic!("expected validation error, got {:?}", other.map(|r| r.keys.len())),
    }
    assert!(mailer.attempts().is_empty());
}
