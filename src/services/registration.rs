//! Account creation behind the invitation gate.
//!
//! The form shape differs per deployment, so account building is a
//! [`RegistrationBackend`] picked once at startup from `REGISTRATION_BACKEND`.
//! [`RegistrationService::register`] runs the gate, lets the backend build the
//! user and then writes the user and consumes the key in one store call.

use std::str::FromStr;
use std::sync::Arc;

use bcrypt::hash;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::InvitationSettings,
    db::models::api::error_codes,
    db::models::auth::{RegisterRequest, User},
    db::models::invitation::InvitationKey,
    db::store::{InvitationStore, Registration},
    error::{AppError, AppResult},
    services::invitations_service::{GateDecision, InvitationsService},
    services::signals::InvitationSignals,
    utils::generate_invitation_key,
};

pub const USERNAME_FORM_TEMPLATE: &str = "registration/registration_form";
pub const EMAIL_FORM_TEMPLATE: &str = "account/signup";

const MAX_USERNAME_LENGTH: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationBackendKind {
    /// username + email + password
    Username,
    /// email + password, username derived from the address
    Email,
}

impl FromStr for RegistrationBackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "username" => Ok(RegistrationBackendKind::Username),
            "email" => Ok(RegistrationBackendKind::Email),
            other => Err(format!(
                "unknown registration backend '{}' (expected username or email)",
                other
            )),
        }
    }
}

impl RegistrationBackendKind {
    pub fn backend(self, bcrypt_cost: u32) -> Arc<dyn RegistrationBackend> {
        match self {
            RegistrationBackendKind::Username => Arc::new(UsernameBackend { bcrypt_cost }),
            RegistrationBackendKind::Email => Arc::new(EmailBackend { bcrypt_cost }),
        }
    }
}

pub trait RegistrationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn form_template(&self) -> &'static str;

    /// Validates the form against existing accounts and returns the unsaved user.
    fn build_account(&self, store: &dyn InvitationStore, form: &RegisterRequest) -> AppResult<User>;
}

pub struct UsernameBackend {
    pub bcrypt_cost: u32,
}

impl RegistrationBackend for UsernameBackend {
    fn name(&self) -> &'static str {
        "username"
    }

    fn form_template(&self) -> &'static str {
        USERNAME_FORM_TEMPLATE
    }

    fn build_account(&self, store: &dyn InvitationStore, form: &RegisterRequest) -> AppResult<User> {
        let username = form
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::validation("Username is required"))?;

        if store.username_taken(username)? {
            return Err(AppError::conflict_with_code(
                "Username already exists",
                Some("username".to_string()),
                error_codes::USER_USERNAME_EXISTS,
            ));
        }

        let email = ensure_email_free(store, &form.email)?;
        new_user(username.to_string(), email, &form.password, self.bcrypt_cost)
    }
}

pub struct EmailBackend {
    pub bcrypt_cost: u32,
}

impl RegistrationBackend for EmailBackend {
    fn name(&self) -> &'static str {
        "email"
    }

    fn form_template(&self) -> &'static str {
        EMAIL_FORM_TEMPLATE
    }

    fn build_account(&self, store: &dyn InvitationStore, form: &RegisterRequest) -> AppResult<User> {
        let email = ensure_email_free(store, &form.email)?;
        let username = derive_username(store, &email)?;
        new_user(username, email, &form.password, self.bcrypt_cost)
    }
}

fn ensure_email_free(store: &dyn InvitationStore, email: &str) -> AppResult<String> {
    let email = email.trim().to_string();
    if store.email_taken(&email)? {
        return Err(AppError::conflict_with_code(
            "Email already exists",
            Some("email".to_string()),
            error_codes::USER_EMAIL_EXISTS,
        ));
    }
    Ok(email)
}

fn new_user(username: String, email: String, password: &str, bcrypt_cost: u32) -> AppResult<User> {
    let password_hash = hash(password, bcrypt_cost)?;
    Ok(User {
        id: Uuid::new_v4(),
        username,
        email,
        password_hash,
        is_staff: false,
        is_active: true,
        created_at: Utc::now(),
    })
}

/// Local part of the address, reduced to username characters, suffixed with
/// a counter until it is free.
pub fn derive_username(store: &dyn InvitationStore, email: &str) -> AppResult<String> {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .take(MAX_USERNAME_LENGTH - 8)
        .collect();
    if base.is_empty() {
        base.push_str("user");
    }
    if base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert(0, 'u');
    }

    if !store.username_taken(&base)? {
        return Ok(base);
    }
    for n in 1..100 {
        let candidate = format!("{}{}", base, n);
        if !store.username_taken(&candidate)? {
            return Ok(candidate);
        }
    }

    let token = generate_invitation_key();
    Ok(format!("{}_{}", base, &token[..6]))
}

#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    Registered {
        user: User,
        invitation: Option<InvitationKey>,
    },
    /// The gate refused the request. Nothing was written.
    Rejected(GateDecision),
}

pub struct RegistrationService;

impl RegistrationService {
    pub fn register(
        store: &dyn InvitationStore,
        backend: &dyn RegistrationBackend,
        settings: &InvitationSettings,
        signals: &InvitationSignals,
        form: &RegisterRequest,
    ) -> AppResult<RegistrationOutcome> {
        let gate = InvitationsService::gate(store, settings, form.invitation_key.as_deref())?;
        if !gate.is_allowed() {
            return Ok(RegistrationOutcome::Rejected(gate));
        }

        let user = backend.build_account(store, form)?;
        let claim = gate.invitation().map(|invitation| invitation.key.as_str());

        match store.register_user(&user, claim, Utc::now())? {
            Registration::Created { user, invitation } => {
                if let Some(invitation) = &invitation {
                    signals.send_accepted(&user, invitation);
                }
                tracing::info!(
                    user_id = %user.id,
                    backend = backend.name(),
                    invited = invitation.is_some(),
                    "User registered"
                );
                Ok(RegistrationOutcome::Registered { user, invitation })
            }
            Registration::KeyUnavailable => {
                let key = claim.unwrap_or_default().to_string();
                tracing::info!(key = %key, "Invitation key consumed concurrently, registration refused");
                Ok(RegistrationOutcome::Rejected(GateDecision::InvalidKey { key }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn backend_kind_parses() {
        assert_eq!(
            "Email".parse::<RegistrationBackendKind>(),
            Ok(RegistrationBackendKind::Email)
        );
        assert!("ldap".parse::<RegistrationBackendKind>().is_err());
    }

    #[test]
    fn backends_name_their_form() {
        assert_eq!(
            RegistrationBackendKind::Username.backend(4).form_template(),
            USERNAME_FORM_TEMPLATE
        );
        assert_eq!(
            RegistrationBackendKind::Email.backend(4).form_template(),
            EMAIL_FORM_TEMPLATE
        );
    }

    #[test]
    fn derived_usernames_avoid_taken_names() {
        let store = MemoryStore::new();
        assert_eq!(derive_username(&store, "jane.doe@example.com").unwrap(), "jane.doe");
        assert_eq!(derive_username(&store, "42@example.com").unwrap(), "u42");
        assert_eq!(derive_username(&store, "+@example.com").unwrap(), "user");

        let taken = new_user("jane".into(), "jane@example.com".into(), "Password1", 4).unwrap();
        store.register_user(&taken, None, Utc::now()).unwrap();
        assert_eq!(derive_username(&store, "jane@other.org").unwrap(), "jane1");
    }

    #[test]
    fn username_backend_requires_a_username() {
        let store = MemoryStore::new();
        let form = RegisterRequest {
            email: "jane@example.com".into(),
            password: "Password1".into(),
            ..RegisterRequest::default()
        };
        assert!(matches!(
            UsernameBackend { bcrypt_cost: 4 }.build_account(&store, &form),
            Err(AppError::Validation { .. })
        ));
    }
}
