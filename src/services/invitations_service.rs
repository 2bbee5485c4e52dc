use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::InvitationSettings,
    db::models::invitation::{InvitationKey, Recipient},
    db::models::page::Page,
    db::store::InvitationStore,
    email::templates::NOTE_PLACEHOLDER,
    email::{EmailContext, EmailError, InvitationEmailContent, Mailer, OutgoingEmail},
    error::{AppError, AppResult},
    utils::generate_invitation_key,
    validation::invitation::is_well_formed_key,
};

/// Fresh tokens tried before giving up on a collision streak.
pub const MAX_KEY_ATTEMPTS: usize = 5;

/// Outcome of checking whether a visitor may reach the registration form.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Invite mode is off.
    Open,
    NoKey,
    InvalidKey { key: String },
    ValidKey(InvitationKey),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Open | GateDecision::ValidKey(_))
    }

    pub fn invitation(&self) -> Option<&InvitationKey> {
        match self {
            GateDecision::ValidKey(invitation) => Some(invitation),
            _ => None,
        }
    }

    /// The wrong-key page for a refused gate, `None` when registration is allowed.
    pub fn wrong_key_page(&self) -> Option<Page> {
        match self {
            GateDecision::NoKey => Some(Page::wrong_invitation_key(None)),
            GateDecision::InvalidKey { key } => Some(Page::wrong_invitation_key(Some(key))),
            GateDecision::Open | GateDecision::ValidKey(_) => None,
        }
    }
}

/// How a sender's note is placed into the HTML body.
#[derive(Debug, Clone, Copy)]
pub enum SenderNote<'a> {
    /// Escaped before rendering.
    User(&'a str),
    /// Staff-authored, inserted as-is.
    Staff(&'a str),
}

impl<'a> SenderNote<'a> {
    fn text(&self) -> &'a str {
        match self {
            SenderNote::User(note) | SenderNote::Staff(note) => *note,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BulkSendReport {
    pub sent: Vec<String>,
    pub failed: Vec<String>,
    pub keys: Vec<InvitationKey>,
}

impl BulkSendReport {
    pub fn message(&self) -> String {
        let mut lines = vec![format!(
            "Sent {} of {} invitations.",
            self.sent.len(),
            self.keys.len()
        )];
        lines.extend(self.failed.iter().map(|email| format!("Mail to {} failed", email)));
        lines.join(" ")
    }
}

pub struct InvitationsService;

impl InvitationsService {
    pub fn is_key_valid(
        store: &dyn InvitationStore,
        key: Option<&str>,
    ) -> AppResult<Option<InvitationKey>> {
        Self::is_key_valid_at(store, key, Utc::now())
    }

    /// Missing, malformed, unknown, used and expired tokens all come back as `None`.
    pub fn is_key_valid_at(
        store: &dyn InvitationStore,
        key: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<InvitationKey>> {
        let key = match key {
            Some(key) if is_well_formed_key(key) => key,
            _ => return Ok(None),
        };

        Ok(store
            .find_key(key)?
            .filter(|invitation| invitation.is_valid_at(now)))
    }

    pub fn remaining_invitations_for_user(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        user_id: Uuid,
    ) -> AppResult<i64> {
        Self::remaining_invitations_for_user_at(store, settings, user_id, Utc::now())
    }

    pub fn remaining_invitations_for_user_at(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let quota = store
            .quota_override(user_id)?
            .map(i64::from)
            .unwrap_or(settings.invitations_per_user);
        let counted = store.count_quota_keys(user_id, settings.quota_policy, now)?;

        Ok((quota - counted).max(0))
    }

    /// Issues a key for `issuer_id`. With `save` the issuer's quota is
    /// enforced and the key is persisted; without it an unsaved preview is
    /// returned and nothing is consumed.
    pub fn create_invitation(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        issuer_id: Uuid,
        recipient: Option<&Recipient>,
        save: bool,
    ) -> AppResult<InvitationKey> {
        Self::create_invitation_at(store, settings, issuer_id, recipient, save, Utc::now())
    }

    pub fn create_invitation_at(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        issuer_id: Uuid,
        recipient: Option<&Recipient>,
        save: bool,
        now: DateTime<Utc>,
    ) -> AppResult<InvitationKey> {
        if !save {
            return Ok(InvitationKey::issue(
                generate_invitation_key(),
                issuer_id,
                recipient,
                now,
                settings.key_lifetime,
                false,
            ));
        }

        if Self::remaining_invitations_for_user_at(store, settings, issuer_id, now)? <= 0 {
            tracing::info!(issuer_id = %issuer_id, "Invitation refused, quota exhausted");
            return Err(AppError::QuotaExceeded);
        }

        Self::persist_new_key(store, settings, issuer_id, recipient, now, false)
    }

    /// Staff path: persisted, exempt from the issuer's quota.
    pub fn create_privileged_invitation(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        issuer_id: Uuid,
        recipient: Option<&Recipient>,
    ) -> AppResult<InvitationKey> {
        Self::persist_new_key(store, settings, issuer_id, recipient, Utc::now(), true)
    }

    fn persist_new_key(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        issuer_id: Uuid,
        recipient: Option<&Recipient>,
        now: DateTime<Utc>,
        quota_exempt: bool,
    ) -> AppResult<InvitationKey> {
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let candidate = InvitationKey::issue(
                generate_invitation_key(),
                issuer_id,
                recipient,
                now,
                settings.key_lifetime,
                quota_exempt,
            );

            if store.key_exists(&candidate.key)? {
                tracing::warn!(attempt, "Invitation key collision, regenerating");
                continue;
            }

            match store.insert_key(&candidate) {
                Ok(saved) => {
                    tracing::info!(
                        issuer_id = %issuer_id,
                        quota_exempt,
                        recipient = saved.recipient_email.as_deref().unwrap_or("-"),
                        "Invitation key created"
                    );
                    return Ok(saved);
                }
                Err(AppError::Conflict { .. }) => {
                    tracing::warn!(attempt, "Invitation key collision on insert, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::internal(
            "Could not generate a unique invitation key",
        ))
    }

    pub fn registration_url(settings: &InvitationSettings, key: &str) -> String {
        settings.site_url.registration_url(key)
    }

    pub fn email_context(
        settings: &InvitationSettings,
        invitation: &InvitationKey,
        recipient: Option<&Recipient>,
        sender_note: Option<SenderNote<'_>>,
    ) -> EmailContext {
        EmailContext {
            site_name: settings.site_name.clone(),
            registration_url: Self::registration_url(settings, &invitation.key),
            recipient: recipient.cloned(),
            sender_note: sender_note.map(|note| note.text().to_string()),
            expiration_days: settings.lifetime_days(),
            trusted_note: matches!(sender_note, Some(SenderNote::Staff(_))),
        }
    }

    /// Email preview for the invite form, rendered from an unsaved key.
    pub fn preview_email(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        issuer_id: Uuid,
    ) -> AppResult<InvitationEmailContent> {
        let preview = Self::create_invitation(store, settings, issuer_id, None, false)?;
        let ctx = Self::email_context(
            settings,
            &preview,
            None,
            Some(SenderNote::Staff(NOTE_PLACEHOLDER)),
        );
        Ok(InvitationEmailContent::render(&ctx))
    }

    /// Renders and sends the invitation for `invitation`. The recipient is
    /// `recipient_override` if given, else the one stored on the key.
    pub async fn send_to(
        mailer: &dyn Mailer,
        settings: &InvitationSettings,
        invitation: &InvitationKey,
        recipient_override: Option<&Recipient>,
        sender_note: Option<SenderNote<'_>>,
        from_email: Option<&str>,
    ) -> Result<(), EmailError> {
        let recipient = recipient_override
            .cloned()
            .or_else(|| invitation.recipient())
            .ok_or(EmailError::NoRecipient)?;

        let ctx = Self::email_context(settings, invitation, Some(&recipient), sender_note);
        let content = InvitationEmailContent::render(&ctx);

        let email = OutgoingEmail {
            to: recipient.email.clone(),
            to_name: recipient.full_name(),
            from: from_email
                .filter(|from| !from.trim().is_empty())
                .unwrap_or(settings.default_from_email.as_str())
                .to_string(),
            subject: content.subject,
            text: content.text,
            html: content.html,
        };

        mailer.send(email).await?;
        tracing::info!(to = %recipient.email, key = %invitation.key, "Invitation email sent");
        Ok(())
    }

    /// `email[,first][,last]` entries separated by `;`. Blank name parts
    /// become `None`; entries without an email are skipped.
    pub fn parse_bulk_recipients(input: &str) -> Vec<Recipient> {
        input
            .split(';')
            .filter_map(|entry| {
                let mut parts = entry.split(',').map(str::trim);
                let email = parts.next().filter(|email| !email.is_empty())?;
                let mut next_name = || {
                    parts
                        .next()
                        .filter(|part| !part.is_empty())
                        .map(str::to_string)
                };
                let first_name = next_name();
                let last_name = next_name();
                Some(Recipient::with_names(email, first_name, last_name))
            })
            .collect()
    }

    /// One quota-exempt key per recipient, each mailed independently. A
    /// failed send is recorded in the report and the batch moves on.
    pub async fn send_bulk_invitations(
        store: &dyn InvitationStore,
        mailer: &dyn Mailer,
        settings: &InvitationSettings,
        issuer_id: Uuid,
        to_emails: &str,
        sender_note: &str,
        from_email: Option<&str>,
    ) -> AppResult<BulkSendReport> {
        let recipients = Self::parse_bulk_recipients(to_emails);
        if recipients.is_empty() {
            return Err(AppError::validation(
                "You did not provide any email addresses.",
            ));
        }

        let note = Some(sender_note)
            .filter(|note| !note.trim().is_empty())
            .map(SenderNote::Staff);

        let mut report = BulkSendReport::default();
        for recipient in &recipients {
            let invitation =
                Self::create_privileged_invitation(store, settings, issuer_id, Some(recipient))?;

            match Self::send_to(mailer, settings, &invitation, None, note, from_email).await {
                Ok(()) => report.sent.push(recipient.email.clone()),
                Err(e) => {
                    tracing::warn!(to = %recipient.email, error = %e, "Bulk invitation email failed");
                    report.failed.push(recipient.email.clone());
                }
            }
            report.keys.push(invitation);
        }

        tracing::info!(
            issuer_id = %issuer_id,
            sent = report.sent.len(),
            failed = report.failed.len(),
            "Bulk invitations processed"
        );
        Ok(report)
    }

    pub fn gate(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        key: Option<&str>,
    ) -> AppResult<GateDecision> {
        Self::gate_at(store, settings, key, Utc::now())
    }

    pub fn gate_at(
        store: &dyn InvitationStore,
        settings: &InvitationSettings,
        key: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<GateDecision> {
        if !settings.invite_mode {
            return Ok(GateDecision::Open);
        }

        let key = match key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => key,
            None => return Ok(GateDecision::NoKey),
        };

        Ok(match Self::is_key_valid_at(store, Some(key), now)? {
            Some(invitation) => GateDecision::ValidKey(invitation),
            None => GateDecision::InvalidKey {
                key: key.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_input_is_split_into_recipients() {
        let recipients = InvitationsService::parse_bulk_recipients("a@x.com,Jane,Doe;b@x.com;");
        assert_eq!(
            recipients,
            vec![
                Recipient::with_names("a@x.com", Some("Jane".into()), Some("Doe".into())),
                Recipient::new("b@x.com"),
            ]
        );
    }

    #[test]
    fn bulk_entries_are_trimmed_and_blank_parts_dropped() {
        let recipients =
            InvitationsService::parse_bulk_recipients("  c@x.com , , Smith ; ,Nobody; ;");
        assert_eq!(
            recipients,
            vec![Recipient::with_names("c@x.com", None, Some("Smith".into()))]
        );
        assert!(InvitationsService::parse_bulk_recipients(" ; ;").is_empty());
    }

    #[test]
    fn gate_decisions_map_to_pages() {
        assert!(GateDecision::Open.is_allowed());
        assert!(GateDecision::Open.wrong_key_page().is_none());
        assert!(!GateDecision::NoKey.is_allowed());

        let page = GateDecision::InvalidKey {
            key: "abc".to_string(),
        }
        .wrong_key_page()
        .unwrap();
        assert_eq!(page.context["invalid_key"], true);
        assert_eq!(page.context["invitation_key"], "abc");
    }

    #[test]
    fn report_message_lists_failures() {
        let report = BulkSendReport {
            sent: vec!["b@x.com".into()],
            failed: vec!["a@x.com".into()],
            keys: Vec::new(),
        };
        assert!(report.message().contains("Mail to a@x.com failed"));
    }
}
