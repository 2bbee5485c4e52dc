//! Persistence seam for the invitation workflow.
//!
//! Services only ever talk to [`InvitationStore`]; `PgStore` backs it with
//! PostgreSQL through diesel, `MemoryStore` keeps everything in-process.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::auth::User;
use crate::db::models::invitation::{InvitationKey, InvitationQuota, QuotaPolicy};
use crate::error::AppResult;

/// Result of creating an account, optionally consuming an invitation key in
/// the same unit of work.
#[derive(Debug, Clone)]
pub enum Registration {
    Created {
        user: User,
        invitation: Option<InvitationKey>,
    },
    /// The key was used or expired between the gate check and the write.
    /// Nothing was persisted.
    KeyUnavailable,
}

pub trait InvitationStore: Send + Sync {
    fn find_key(&self, key: &str) -> AppResult<Option<InvitationKey>>;

    fn key_exists(&self, key: &str) -> AppResult<bool>;

    fn insert_key(&self, key: &InvitationKey) -> AppResult<InvitationKey>;

    /// Newest first.
    fn list_keys_by_issuer(&self, issuer: Uuid) -> AppResult<Vec<InvitationKey>>;

    /// Number of the issuer's keys that count against their quota under `policy`.
    fn count_quota_keys(&self, issuer: Uuid, policy: QuotaPolicy, now: DateTime<Utc>) -> AppResult<i64>;

    fn quota_override(&self, user_id: Uuid) -> AppResult<Option<i32>>;

    fn set_quota_override(&self, user_id: Uuid, quota: i32, now: DateTime<Utc>) -> AppResult<InvitationQuota>;

    fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Looks the user up by username or email.
    fn find_user_by_login(&self, login: &str) -> AppResult<Option<User>>;

    fn username_taken(&self, username: &str) -> AppResult<bool>;

    fn email_taken(&self, email: &str) -> AppResult<bool>;

    /// Inserts `user` and, when `invitation_key` is given, marks that key used
    /// by the new user. Both happen or neither does.
    fn register_user(
        &self,
        user: &User,
        invitation_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Registration>;
}
