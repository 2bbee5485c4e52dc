use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    AppState,
    db::models::{
        api::ApiResponse,
        auth::AuthUser,
        invitation::{InvitationListResponse, InvitationView, InviteRequest, InviteResponse},
        page::Page,
    },
    services::{InvitationsService, SenderNote},
    validation::ValidatedJson,
};

/// `GET /invitations/new`: remaining count plus a preview of the email.
pub async fn invitation_form(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let remaining =
        match InvitationsService::remaining_invitations_for_user(store, &state.settings, auth_user.id) {
            Ok(remaining) => remaining,
            Err(err) => return err.into_response(),
        };

    match InvitationsService::preview_email(store, &state.settings, auth_user.id) {
        Ok(preview) => {
            let page = Page::invitation_form(remaining, &preview.html);
            let response = ApiResponse::success(page, "Invitation form");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// `POST /invitations`
pub async fn invite(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidatedJson(payload): ValidatedJson<InviteRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let recipient = payload.recipient();

    let invitation = match InvitationsService::create_invitation(
        store,
        &state.settings,
        auth_user.id,
        Some(&recipient),
        true,
    ) {
        Ok(invitation) => invitation,
        Err(err) => return err.into_response(),
    };

    let note = payload
        .sender_note
        .as_deref()
        .filter(|note| !note.trim().is_empty())
        .map(SenderNote::User);
    let email_sent = match InvitationsService::send_to(
        state.mailer.as_ref(),
        &state.settings,
        &invitation,
        None,
        note,
        None,
    )
    .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(to = %recipient.email, error = %e, "Invitation email failed");
            false
        }
    };

    let remaining_invitations =
        match InvitationsService::remaining_invitations_for_user(store, &state.settings, auth_user.id) {
            Ok(remaining) => remaining,
            Err(err) => return err.into_response(),
        };

    let registration_url = InvitationsService::registration_url(&state.settings, &invitation.key);
    let message = if email_sent {
        format!("Invitation sent to {}", recipient.email)
    } else {
        format!(
            "Invitation created, but the email to {} could not be sent",
            recipient.email
        )
    };
    let result = InviteResponse {
        invitation: InvitationView::new(&invitation, registration_url, Utc::now()),
        email_sent,
        remaining_invitations,
    };

    let response = ApiResponse::created(result, &message);
    (StatusCode::CREATED, Json(response)).into_response()
}

/// `GET /invitations`: keys issued by the current user, newest first.
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let now = Utc::now();

    let keys = match store.list_keys_by_issuer(auth_user.id) {
        Ok(keys) => keys,
        Err(err) => return err.into_response(),
    };
    let remaining_invitations = match InvitationsService::remaining_invitations_for_user_at(
        store,
        &state.settings,
        auth_user.id,
        now,
    ) {
        Ok(remaining) => remaining,
        Err(err) => return err.into_response(),
    };

    let invitations = keys
        .iter()
        .map(|key| {
            let url = InvitationsService::registration_url(&state.settings, &key.key);
            InvitationView::new(key, url, now)
        })
        .collect();

    let result = InvitationListResponse {
        invitations,
        remaining_invitations,
    };
    let response = ApiResponse::success(result, "Invitations retrieved successfully");
    (StatusCode::OK, Json(response)).into_response()
}
