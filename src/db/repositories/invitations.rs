use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::models::invitation::{InvitationKey, InvitationQuota, QuotaPolicy};

pub struct InvitationsRepo;

impl InvitationsRepo {
    pub fn insert(conn: &mut PgConnection, new_key: &InvitationKey) -> Result<InvitationKey, diesel::result::Error> {
        diesel::insert_into(crate::schema::invitation_keys::table)
            .values(new_key)
            .returning(InvitationKey::as_returning())
            .get_result(conn)
    }

    pub fn find_by_key(conn: &mut PgConnection, token: &str) -> Result<Option<InvitationKey>, diesel::result::Error> {
        use crate::schema::invitation_keys::dsl as ik;
        ik::invitation_keys
            .filter(ik::key.eq(token))
            .select(InvitationKey::as_select())
            .first(conn)
            .optional()
    }

    pub fn exists(conn: &mut PgConnection, token: &str) -> Result<bool, diesel::result::Error> {
        use crate::schema::invitation_keys::dsl as ik;
        diesel::select(diesel::dsl::exists(ik::invitation_keys.filter(ik::key.eq(token))))
            .get_result(conn)
    }

    pub fn list_by_issuer(conn: &mut PgConnection, issuer: Uuid) -> Result<Vec<InvitationKey>, diesel::result::Error> {
        use crate::schema::invitation_keys::dsl as ik;
        ik::invitation_keys
            .filter(ik::from_user_id.eq(issuer))
            .order(ik::date_invited.desc())
            .select(InvitationKey::as_select())
            .load(conn)
    }

    pub fn count_for_quota(
        conn: &mut PgConnection,
        issuer: Uuid,
        policy: QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<i64, diesel::result::Error> {
        use crate::schema::invitation_keys::dsl as ik;
        let mut query = ik::invitation_keys
            .filter(ik::from_user_id.eq(issuer))
            .filter(ik::quota_exempt.eq(false))
            .into_boxed();

        match policy {
            QuotaPolicy::Issued => {}
            QuotaPolicy::Unexpired => {
                query = query.filter(ik::expires_at.gt(now));
            }
            QuotaPolicy::Pending => {
                query = query
                    .filter(ik::expires_at.gt(now))
                    .filter(ik::used_at.is_null());
            }
        }

        query.count().get_result(conn)
    }

    /// Marks the key used only if it is still unused and unexpired. `None`
    /// means another request got there first, or the key was never valid.
    pub fn claim(
        conn: &mut PgConnection,
        token: &str,
        registrant: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<InvitationKey>, diesel::result::Error> {
        use crate::schema::invitation_keys::dsl as ik;
        diesel::update(
            ik::invitation_keys
                .filter(ik::key.eq(token))
                .filter(ik::used_at.is_null())
                .filter(ik::expires_at.gt(now)),
        )
        .set((ik::used_at.eq(Some(now)), ik::registrant_id.eq(Some(registrant))))
        .returning(InvitationKey::as_returning())
        .get_result(conn)
        .optional()
    }

    pub fn find_quota(conn: &mut PgConnection, user: Uuid) -> Result<Option<i32>, diesel::result::Error> {
        use crate::schema::invitation_quotas::dsl as iq;
        iq::invitation_quotas
            .filter(iq::user_id.eq(user))
            .select(iq::quota)
            .first(conn)
            .optional()
    }

    pub fn upsert_quota(conn: &mut PgConnection, row: &InvitationQuota) -> Result<InvitationQuota, diesel::result::Error> {
        use crate::schema::invitation_quotas::dsl as iq;
        diesel::insert_into(iq::invitation_quotas)
            .values(row)
            .on_conflict(iq::user_id)
            .do_update()
            .set((iq::quota.eq(row.quota), iq::updated_at.eq(row.updated_at)))
            .returning(InvitationQuota::as_returning())
            .get_result(conn)
    }
}
