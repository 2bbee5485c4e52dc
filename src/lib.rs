pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod schema;
pub mod services;
pub mod utils;
pub mod validation;

use crate::config::{Config, InvitationSettings};
use crate::db::{InvitationStore, MemoryStore, PgStore};
use crate::email::Mailer;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthService;
use crate::services::{InvitationSignals, RegistrationBackend};
use std::sync::Arc;
use tracing::Level;

/// Shared by every handler. Built once at startup; nothing in here changes
/// while the server runs except what the store and signals hold.
pub struct AppState {
    pub store: Arc<dyn InvitationStore>,
    pub mailer: Arc<dyn Mailer>,
    pub registration: Arc<dyn RegistrationBackend>,
    pub signals: Arc<InvitationSignals>,
    pub settings: InvitationSettings,
    pub config: Arc<Config>,
    pub auth_service: AuthService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn InvitationStore>,
        mailer: Arc<dyn Mailer>,
    ) -> AppResult<Self> {
        let settings = config.invitations()?;
        let registration = config
            .registration_backend_kind()?
            .backend(config.bcrypt_cost);
        let auth_service = AuthService::new(config.auth());

        Ok(Self {
            store,
            mailer,
            registration,
            signals: Arc::new(InvitationSignals::new()),
            settings,
            config: Arc::new(config),
            auth_service,
        })
    }

    /// Picks the store and mailer from the configuration: PostgreSQL when
    /// `DATABASE_URL` is set, SMTP when `SMTP_HOST` is set.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let store: Arc<dyn InvitationStore> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections)
                    .map_err(|e| AppError::Config(format!("Failed to create database pool: {}", e)))?;
                Arc::new(PgStore::new(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        let mailer = email::create_mailer(config.smtp().as_ref())?;

        Self::new(config, store, mailer)
    }
}

pub fn init_tracing(config: &Config) {
    let logging = config.logging();
    let level = match logging.level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    match logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_max_level(level)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .init();
        }
    }
}
