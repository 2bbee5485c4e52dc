use axum::{Server, middleware::from_fn};
use invitation_backend::{
    AppState, config::Config, init_tracing, middleware::logger::logger, routes::create_router,
    services::{AuthService, signals::connect_default_receivers},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let admin = config.admin_bootstrap();
    let bcrypt_cost = config.bcrypt_cost;
    let server = config.server();
    let address: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;

    let state = Arc::new(AppState::from_config(config)?);
    connect_default_receivers(&state.signals);

    if let Some(admin) = admin {
        AuthService::ensure_admin(state.store.as_ref(), &admin, bcrypt_cost)?;
    }

    tracing::info!(
        invite_mode = state.settings.invite_mode,
        invitations_per_user = state.settings.invitations_per_user,
        quota_policy = ?state.settings.quota_policy,
        registration_backend = state.registration.name(),
        "Invitation settings loaded"
    );

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors).layer(from_fn(logger));

    tracing::info!(%address, "Server running");
    Server::bind(&address)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
