use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use crate::{
    AppState,
    db::models::{api::ApiResponse, auth::LoginRequest},
    services::AuthService,
    validation::ValidatedJson,
};

pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> impl IntoResponse {
    match AuthService::login(state.store.as_ref(), &state.auth_service, &payload) {
        Ok(result) => {
            let response = ApiResponse::success(result, "Login successful");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
