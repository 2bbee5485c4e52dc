//! Public side of the invitation gate: the link in the email, the
//! registration form and the form submission.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use std::sync::Arc;

use crate::{
    AppState,
    db::models::{
        api::{ApiResponse, error_codes},
        auth::{RegisterRequest, RegisterResponse, RegistrationQuery},
        page::Page,
    },
    error::AppError,
    services::{GateDecision, InvitationsService, RegistrationOutcome, RegistrationService},
    validation::ValidatedJson,
};

/// `GET /invited/:invitation_key`
pub async fn invited(
    State(state): State<Arc<AppState>>,
    Path(invitation_key): Path<String>,
) -> impl IntoResponse {
    if !state.settings.invite_mode {
        return Redirect::to("/register").into_response();
    }

    match InvitationsService::is_key_valid(state.store.as_ref(), Some(&invitation_key)) {
        Ok(Some(invitation)) => {
            state.signals.send_invited(&invitation);
            let page = Page::invited(&invitation.key, invitation.recipient().as_ref());
            let response = ApiResponse::success(page, "Invitation key is valid");
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => {
            let page = Page::wrong_invitation_key(Some(&invitation_key));
            let response = ApiResponse::success(page, "Invitation key is invalid");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// `GET /register?invitation_key=...`
pub async fn registration_form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegistrationQuery>,
) -> impl IntoResponse {
    let decision = match InvitationsService::gate(
        state.store.as_ref(),
        &state.settings,
        query.invitation_key.as_deref(),
    ) {
        Ok(decision) => decision,
        Err(err) => return err.into_response(),
    };

    let page = match &decision {
        GateDecision::Open => {
            Page::registration_form(state.registration.form_template(), None, None)
        }
        GateDecision::ValidKey(invitation) => Page::registration_form(
            state.registration.form_template(),
            Some(&invitation.key),
            invitation.recipient().as_ref(),
        ),
        GateDecision::NoKey | GateDecision::InvalidKey { .. } => decision
            .wrong_key_page()
            .unwrap_or_else(|| Page::wrong_invitation_key(None)),
    };

    let response = ApiResponse::success(page, "Registration form");
    (StatusCode::OK, Json(response)).into_response()
}

/// `POST /register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> impl IntoResponse {
    let outcome = RegistrationService::register(
        state.store.as_ref(),
        state.registration.as_ref(),
        &state.settings,
        &state.signals,
        &payload,
    );

    match outcome {
        Ok(RegistrationOutcome::Registered { user, .. }) => {
            let access_token = match state.auth_service.generate_access_token(&user) {
                Ok(token) => token,
                Err(err) => return AppError::from(err).into_response(),
            };
            let result = RegisterResponse {
                user,
                access_token,
                token_type: "Bearer".to_string(),
                expires_in: state.auth_service.expires_in(),
            };
            let response = ApiResponse::created(result, "Registration successful");
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Ok(RegistrationOutcome::Rejected(decision)) => {
            let (message, error_code) = match decision {
                GateDecision::NoKey => (
                    "An invitation key is required to register",
                    error_codes::INVITATION_KEY_MISSING,
                ),
                _ => (
                    "The invitation key is invalid, used or expired",
                    error_codes::INVITATION_KEY_INVALID,
                ),
            };
            let page = decision
                .wrong_key_page()
                .unwrap_or_else(|| Page::wrong_invitation_key(None));
            let response = ApiResponse::rejected(page, 403, message, error_code);
            (StatusCode::FORBIDDEN, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
