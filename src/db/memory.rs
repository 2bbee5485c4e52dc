//! Process-local store.
//!
//! Used when no `DATABASE_URL` is configured and by the test suite. Data is
//! lost on restart and is not shared between replicas.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::db::models::api::error_codes;
use crate::db::models::auth::User;
use crate::db::models::invitation::{InvitationKey, InvitationQuota, QuotaPolicy};
use crate::db::store::{InvitationStore, Registration};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct MemoryState {
    keys: HashMap<String, InvitationKey>,
    users: HashMap<Uuid, User>,
    quotas: HashMap<Uuid, InvitationQuota>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::internal("memory store lock poisoned"))
    }
}

impl InvitationStore for MemoryStore {
    fn find_key(&self, key: &str) -> AppResult<Option<InvitationKey>> {
        Ok(self.lock()?.keys.get(key).cloned())
    }

    fn key_exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.lock()?.keys.contains_key(key))
    }

    fn insert_key(&self, key: &InvitationKey) -> AppResult<InvitationKey> {
        let mut state = self.lock()?;
        if state.keys.contains_key(&key.key) {
            return Err(AppError::conflict_with_code(
                "Invitation key already exists",
                Some("key".to_string()),
                error_codes::INVITATION_KEY_EXISTS,
            ));
        }
        state.keys.insert(key.key.clone(), key.clone());
        Ok(key.clone())
    }

    fn list_keys_by_issuer(&self, issuer: Uuid) -> AppResult<Vec<InvitationKey>> {
        let state = self.lock()?;
        let mut keys: Vec<InvitationKey> = state
            .keys
            .values()
            .filter(|k| k.from_user_id == issuer)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.date_invited.cmp(&a.date_invited));
        Ok(keys)
    }

    fn count_quota_keys(&self, issuer: Uuid, policy: QuotaPolicy, now: DateTime<Utc>) -> AppResult<i64> {
        let state = self.lock()?;
        let count = state
            .keys
            .values()
            .filter(|k| k.from_user_id == issuer && k.counts_against_quota(policy, now))
            .count();
        Ok(count as i64)
    }

    fn quota_override(&self, user_id: Uuid) -> AppResult<Option<i32>> {
        Ok(self.lock()?.quotas.get(&user_id).map(|q| q.quota))
    }

    fn set_quota_override(&self, user_id: Uuid, quota: i32, now: DateTime<Utc>) -> AppResult<InvitationQuota> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user_id) {
            return Err(AppError::not_found("user"));
        }
        let row = InvitationQuota {
            user_id,
            quota,
            updated_at: now,
        };
        state.quotas.insert(user_id, row.clone());
        Ok(row)
    }

    fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    fn find_user_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|u| u.username == login || u.email == login)
            .cloned())
    }

    fn username_taken(&self, username: &str) -> AppResult<bool> {
        Ok(self.lock()?.users.values().any(|u| u.username == username))
    }

    fn email_taken(&self, email: &str) -> AppResult<bool> {
        Ok(self.lock()?.users.values().any(|u| u.email == email))
    }

    fn register_user(
        &self,
        user: &User,
        invitation_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Registration> {
        // One guard for the whole check-and-set.
        let mut state = self.lock()?;

        if state
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AppError::conflict_with_code(
                "Username or email already exists",
                None,
                error_codes::USER_USERNAME_EXISTS,
            ));
        }

        let invitation = match invitation_key {
            Some(token) => {
                let Some(key) = state.keys.get_mut(token) else {
                    return Ok(Registration::KeyUnavailable);
                };
                if !key.mark_used(user.id, now) {
                    return Ok(Registration::KeyUnavailable);
                }
                Some(key.clone())
            }
            None => None,
        };

        state.users.insert(user.id, user.clone());
        Ok(Registration::Created {
            user: user.clone(),
            invitation,
        })
    }
}
