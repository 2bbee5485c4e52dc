//! Staff-only invitation management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    AppState,
    db::models::{
        api::ApiResponse,
        auth::StaffUser,
        invitation::{BulkInviteRequest, InvitationView, QuotaRequest},
        page::Page,
    },
    services::InvitationsService,
    validation::ValidatedJson,
};

#[derive(Serialize)]
pub struct BulkSendResponse {
    pub sent: Vec<String>,
    pub failed: Vec<String>,
    pub invitations: Vec<InvitationView>,
}

/// `GET /admin/invitations/bulk`
pub async fn bulk_invitation_form(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
) -> impl IntoResponse {
    match InvitationsService::preview_email(state.store.as_ref(), &state.settings, staff.id) {
        Ok(preview) => {
            let page = Page::bulk_invitation_form(&preview.html, &preview.text);
            let response = ApiResponse::success(page, "Bulk invitation form");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// `POST /admin/invitations/bulk`
pub async fn send_bulk_invitations(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    ValidatedJson(payload): ValidatedJson<BulkInviteRequest>,
) -> impl IntoResponse {
    let report = match InvitationsService::send_bulk_invitations(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.settings,
        staff.id,
        &payload.to_emails,
        &payload.sender_note,
        payload.from_email.as_deref(),
    )
    .await
    {
        Ok(report) => report,
        Err(err) => return err.into_response(),
    };

    let now = Utc::now();
    let message = report.message();
    let invitations = report
        .keys
        .iter()
        .map(|key| {
            let url = InvitationsService::registration_url(&state.settings, &key.key);
            InvitationView::new(key, url, now)
        })
        .collect();
    let result = BulkSendResponse {
        sent: report.sent,
        failed: report.failed,
        invitations,
    };

    let response = ApiResponse::success(result, &message);
    (StatusCode::OK, Json(response)).into_response()
}

/// `PUT /admin/invitation-quotas/:user_id`
pub async fn set_invitation_quota(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(user_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<QuotaRequest>,
) -> impl IntoResponse {
    match state
        .store
        .set_quota_override(user_id, payload.quota, Utc::now())
    {
        Ok(quota) => {
            tracing::info!(staff_id = %staff.id, user_id = %user_id, quota = quota.quota, "Invitation quota updated");
            let response = ApiResponse::success(quota, "Invitation quota updated");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
