mod auth;
mod invitation;
mod registration;

use async_trait::async_trait;
use chrono::Utc;
use invitation_backend::{
    config::{Config, InvitationSettings},
    db::{InvitationStore, MemoryStore, models::User},
    email::{EmailError, Mailer, OutgoingEmail},
};
use std::sync::Mutex;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "Str0ngPassword!";

pub fn test_config() -> Config {
    Config {
        jwt_secret: "integration-test-secret".to_string(),
        bcrypt_cost: 4,
        site_url: "http://testserver".to_string(),
        site_name: "testserver".to_string(),
        ..Config::default()
    }
}

pub fn settings_with(configure: impl FnOnce(&mut Config)) -> InvitationSettings {
    let mut config = test_config();
    configure(&mut config);
    config.invitations().unwrap()
}

pub fn settings() -> InvitationSettings {
    settings_with(|_| {})
}

pub fn create_user(store: &MemoryStore, username: &str, is_staff: bool) -> User {
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: bcrypt::hash(TEST_PASSWORD, 4).unwrap(),
        is_staff,
        is_active: true,
        created_at: Utc::now(),
    };
    store.register_user(&user, None, Utc::now()).unwrap();
    user
}

/// Keeps every message it is asked to send; addresses in `fail_for` error out.
#[derive(Default)]
pub struct RecordingMailer {
    pub attempts: Mutex<Vec<OutgoingEmail>>,
    pub fail_for: Vec<String>,
}

impl RecordingMailer {
    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            fail_for: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn attempts(&self) -> Vec<OutgoingEmail> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let fail = self.fail_for.contains(&email.to);
        let to = email.to.clone();
        self.attempts.lock().unwrap().push(email);
        if fail {
            return Err(EmailError::SendFailed(format!("mailbox {} unavailable", to)));
        }
        Ok(())
    }
}
