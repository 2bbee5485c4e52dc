use chrono::{DateTime, Utc};
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{Connection, PgConnection};
use uuid::Uuid;

use crate::db::DbPool;
use crate::db::models::api::error_codes;
use crate::db::models::auth::User;
use crate::db::models::invitation::{InvitationKey, InvitationQuota, QuotaPolicy};
use crate::db::repositories::{AuthRepo, InvitationsRepo};
use crate::db::store::{InvitationStore, Registration};
use crate::error::{AppError, AppResult};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
        Ok(self.pool.get()?)
    }
}

fn unique_violation(err: &DieselError) -> bool {
    matches!(err, DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
}

impl InvitationStore for PgStore {
    fn find_key(&self, key: &str) -> AppResult<Option<InvitationKey>> {
        let mut conn = self.conn()?;
        Ok(InvitationsRepo::find_by_key(&mut conn, key)?)
    }

    fn key_exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn()?;
        Ok(InvitationsRepo::exists(&mut conn, key)?)
    }

    fn insert_key(&self, key: &InvitationKey) -> AppResult<InvitationKey> {
        let mut conn = self.conn()?;
        InvitationsRepo::insert(&mut conn, key).map_err(|e| {
            if unique_violation(&e) {
                AppError::conflict_with_code(
                    "Invitation key already exists",
                    Some("key".to_string()),
                    error_codes::INVITATION_KEY_EXISTS,
                )
            } else {
                e.into()
            }
        })
    }

    fn list_keys_by_issuer(&self, issuer: Uuid) -> AppResult<Vec<InvitationKey>> {
        let mut conn = self.conn()?;
        Ok(InvitationsRepo::list_by_issuer(&mut conn, issuer)?)
    }

    fn count_quota_keys(&self, issuer: Uuid, policy: QuotaPolicy, now: DateTime<Utc>) -> AppResult<i64> {
        let mut conn = self.conn()?;
        Ok(InvitationsRepo::count_for_quota(&mut conn, issuer, policy, now)?)
    }

    fn quota_override(&self, user_id: Uuid) -> AppResult<Option<i32>> {
        let mut conn = self.conn()?;
        Ok(InvitationsRepo::find_quota(&mut conn, user_id)?)
    }

    fn set_quota_override(&self, user_id: Uuid, quota: i32, now: DateTime<Utc>) -> AppResult<InvitationQuota> {
        let mut conn = self.conn()?;
        let row = InvitationQuota {
            user_id,
            quota,
            updated_at: now,
        };
        InvitationsRepo::upsert_quota(&mut conn, &row).map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                AppError::not_found("user")
            }
            e => e.into(),
        })
    }

    fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(AuthRepo::find_by_id(&mut conn, user_id)?)
    }

    fn find_user_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(AuthRepo::find_by_login(&mut conn, login)?)
    }

    fn username_taken(&self, username: &str) -> AppResult<bool> {
        let mut conn = self.conn()?;
        Ok(AuthRepo::exists_by_username(&mut conn, username)?)
    }

    fn email_taken(&self, email: &str) -> AppResult<bool> {
        let mut conn = self.conn()?;
        Ok(AuthRepo::exists_by_email(&mut conn, email)?)
    }

    fn register_user(
        &self,
        user: &User,
        invitation_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Registration> {
        let mut conn = self.conn()?;

        // The user row has to exist before the key can point at it, so the
        // insert goes first and a failed claim rolls both back.
        let result = conn.transaction::<_, DieselError, _>(|tx| {
            let created = AuthRepo::insert_user(tx, user)?;
            let invitation = match invitation_key {
                Some(token) => match InvitationsRepo::claim(tx, token, created.id, now)? {
                    Some(claimed) => Some(claimed),
                    None => return Err(DieselError::RollbackTransaction),
                },
                None => None,
            };
            Ok((created, invitation))
        });

        match result {
            Ok((user, invitation)) => Ok(Registration::Created { user, invitation }),
            Err(DieselError::RollbackTransaction) => Ok(Registration::KeyUnavailable),
            Err(e) if unique_violation(&e) => Err(AppError::conflict_with_code(
                "Username or email already exists",
                None,
                error_codes::USER_USERNAME_EXISTS,
            )),
            Err(e) => Err(e.into()),
        }
    }
}
