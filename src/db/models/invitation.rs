use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::schema::{invitation_keys, invitation_quotas};

/// Who an invitation is addressed to. Absent on keys handed out as a bare link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            first_name: None,
            last_name: None,
        }
    }

    pub fn with_names(
        email: impl Into<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name,
            last_name,
        }
    }

    /// "First Last", either half alone, or `None` when no names are known.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Which of a user's keys count against their quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPolicy {
    /// Every key ever issued counts, used or expired.
    #[default]
    Issued,
    /// Keys whose expiry is still in the future, used or not.
    Unexpired,
    /// Only keys that are neither used nor expired.
    Pending,
}

impl FromStr for QuotaPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "issued" => Ok(QuotaPolicy::Issued),
            "unexpired" => Ok(QuotaPolicy::Unexpired),
            "pending" => Ok(QuotaPolicy::Pending),
            other => Err(format!(
                "unknown invitation quota policy '{}' (expected issued, unexpired or pending)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Pending,
    Used,
    Expired,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[diesel(table_name = invitation_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InvitationKey {
    pub id: Uuid,
    pub key: String,
    pub from_user_id: Uuid,
    pub recipient_email: Option<String>,
    pub recipient_first_name: Option<String>,
    pub recipient_last_name: Option<String>,
    pub date_invited: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub registrant_id: Option<Uuid>,
    pub quota_exempt: bool,
}

impl InvitationKey {
    /// A fresh, unused key. Nothing is persisted here.
    pub fn issue(
        key: String,
        from_user_id: Uuid,
        recipient: Option<&Recipient>,
        now: DateTime<Utc>,
        lifetime: chrono::Duration,
        quota_exempt: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            from_user_id,
            recipient_email: recipient.map(|r| r.email.clone()),
            recipient_first_name: recipient.and_then(|r| r.first_name.clone()),
            recipient_last_name: recipient.and_then(|r| r.last_name.clone()),
            date_invited: now,
            expires_at: now + lifetime,
            used_at: None,
            registrant_id: None,
            quota_exempt,
        }
    }

    pub fn recipient(&self) -> Option<Recipient> {
        self.recipient_email.as_ref().map(|email| Recipient {
            email: email.clone(),
            first_name: self.recipient_first_name.clone(),
            last_name: self.recipient_last_name.clone(),
        })
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Valid iff never used and `now` is strictly before the expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired_at(now)
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> KeyStatus {
        if self.is_used() {
            KeyStatus::Used
        } else if self.is_expired_at(now) {
            KeyStatus::Expired
        } else {
            KeyStatus::Pending
        }
    }

    pub fn counts_against_quota(&self, policy: QuotaPolicy, now: DateTime<Utc>) -> bool {
        if self.quota_exempt {
            return false;
        }
        match policy {
            QuotaPolicy::Issued => true,
            QuotaPolicy::Unexpired => !self.is_expired_at(now),
            QuotaPolicy::Pending => self.is_valid_at(now),
        }
    }

    /// The one permitted transition. Returns false, leaving the key untouched,
    /// if it is no longer valid.
    pub fn mark_used(&mut self, registrant_id: Uuid, now: DateTime<Utc>) -> bool {
        if !self.is_valid_at(now) {
            return false;
        }
        self.used_at = Some(now);
        self.registrant_id = Some(registrant_id);
        true
    }
}

#[derive(Queryable, Selectable, Insertable, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[diesel(table_name = invitation_quotas)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InvitationQuota {
    pub user_id: Uuid,
    pub quota: i32,
    pub updated_at: DateTime<Utc>,
}

// Request DTOs
#[derive(Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub recipient_email: String,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(length(max = 2000, message = "Note is too long"))]
    pub sender_note: Option<String>,
}

impl InviteRequest {
    pub fn recipient(&self) -> Recipient {
        Recipient::with_names(
            self.recipient_email.trim(),
            non_blank(self.first_name.as_deref()),
            non_blank(self.last_name.as_deref()),
        )
    }
}

/// `to_emails` is `email[,first][,last]` entries separated by `;`.
#[derive(Deserialize, Validate)]
pub struct BulkInviteRequest {
    pub to_emails: String,
    #[serde(default)]
    pub sender_note: String,
    #[validate(email(message = "Enter a valid sender address"))]
    pub from_email: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct QuotaRequest {
    #[validate(range(min = 0, message = "Quota cannot be negative"))]
    pub quota: i32,
}

// Response DTOs
#[derive(Serialize, Debug, Clone)]
pub struct InvitationView {
    pub key: String,
    pub recipient: Option<Recipient>,
    pub status: KeyStatus,
    pub date_invited: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub registration_url: String,
}

impl InvitationView {
    pub fn new(key: &InvitationKey, registration_url: String, now: DateTime<Utc>) -> Self {
        Self {
            key: key.key.clone(),
            recipient: key.recipient(),
            status: key.status_at(now),
            date_invited: key.date_invited,
            expires_at: key.expires_at,
            used_at: key.used_at,
            registration_url,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct InviteResponse {
    pub invitation: InvitationView,
    pub email_sent: bool,
    pub remaining_invitations: i64,
}

#[derive(Serialize, Debug)]
pub struct InvitationListResponse {
    pub invitations: Vec<InvitationView>,
    pub remaining_invitations: i64,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
