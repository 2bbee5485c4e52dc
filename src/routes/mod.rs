pub mod admin;
pub mod auth;
pub mod invitations;
pub mod registration;

use crate::{AppState, middleware::auth::auth_middleware};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Reachable without a token: login and the registration gate
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/invited/:invitation_key", get(registration::invited))
        .route(
            "/register",
            get(registration::registration_form).post(registration::register),
        );

    let protected_routes = Router::new()
        .route("/invitations/new", get(invitations::invitation_form))
        .route(
            "/invitations",
            get(invitations::list_invitations).post(invitations::invite),
        )
        .route(
            "/admin/invitations/bulk",
            get(admin::bulk_invitation_form).post(admin::send_bulk_invitations),
        )
        .route(
            "/admin/invitation-quotas/:user_id",
            put(admin::set_invitation_quota),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    public_routes.merge(protected_routes).with_state(state)
}
