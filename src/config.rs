use crate::db::models::invitation::QuotaPolicy;
use crate::error::{AppError, AppResult};
use crate::services::registration::RegistrationBackendKind;
use crate::utils::SiteUrlHelper;
use serde::Deserialize;
use url::Url;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    /// Unset means the process-local store is used.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_access_token_expires")]
    pub jwt_access_token_expires_in: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_invite_mode")]
    pub invite_mode: bool,
    #[serde(default = "default_invitations_per_user")]
    pub invitations_per_user: i64,
    #[serde(default = "default_invitation_key_lifetime_days")]
    pub invitation_key_lifetime_days: i64,
    #[serde(default = "default_invitation_quota_policy")]
    pub invitation_quota_policy: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_site_name")]
    pub site_name: String,
    #[serde(default = "default_from_email")]
    pub default_from_email: String,
    #[serde(default = "default_registration_backend")]
    pub registration_backend: String,

    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_use_tls")]
    pub smtp_use_tls: bool,

    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expires_in: u64,
    pub bcrypt_cost: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

#[derive(Clone, Debug)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Everything the invitation workflow needs, resolved once at startup and
/// threaded into every call instead of being read from globals.
#[derive(Clone, Debug)]
pub struct InvitationSettings {
    pub invite_mode: bool,
    pub invitations_per_user: i64,
    pub key_lifetime: chrono::Duration,
    pub quota_policy: QuotaPolicy,
    pub site_url: SiteUrlHelper,
    pub site_name: String,
    pub default_from_email: String,
}

impl InvitationSettings {
    pub fn lifetime_days(&self) -> i64 {
        self.key_lifetime.num_days()
    }
}

// Default value functions
fn default_max_connections() -> u32 {
    10
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_jwt_secret() -> String {
    "your-secret-key".to_string()
}
fn default_access_token_expires() -> u64 {
    3600
} // 1 hour
fn default_bcrypt_cost() -> u32 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_invite_mode() -> bool {
    true
}
fn default_invitations_per_user() -> i64 {
    5
}
fn default_invitation_key_lifetime_days() -> i64 {
    7
}
fn default_invitation_quota_policy() -> String {
    "issued".to_string()
}
fn default_site_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_site_name() -> String {
    "example.com".to_string()
}
fn default_from_email() -> String {
    "webmaster@localhost".to_string()
}
fn default_registration_backend() -> String {
    "username".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_smtp_use_tls() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: default_max_connections(),
            server_host: default_host(),
            server_port: default_port(),
            jwt_secret: default_jwt_secret(),
            jwt_access_token_expires_in: default_access_token_expires(),
            bcrypt_cost: default_bcrypt_cost(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            invite_mode: default_invite_mode(),
            invitations_per_user: default_invitations_per_user(),
            invitation_key_lifetime_days: default_invitation_key_lifetime_days(),
            invitation_quota_policy: default_invitation_quota_policy(),
            site_url: default_site_url(),
            site_name: default_site_name(),
            default_from_email: default_from_email(),
            registration_backend: default_registration_backend(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_use_tls: default_smtp_use_tls(),
            admin_username: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let config = envy::from_env::<Config>()
            .map_err(|e| AppError::Config(format!("Failed to load config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.database_max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be > 0".to_string(),
            ));
        }

        if self.jwt_secret == "your-secret-key" {
            return Err(AppError::Config(
                "JWT_SECRET must be set to a secure value".to_string(),
            ));
        }

        if self.jwt_access_token_expires_in == 0 {
            return Err(AppError::Config(
                "JWT_ACCESS_TOKEN_EXPIRES_IN must be > 0".to_string(),
            ));
        }

        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(AppError::Config(
                "BCRYPT_COST must be between 4 and 31".to_string(),
            ));
        }

        if self.invitations_per_user < 0 {
            return Err(AppError::Config(
                "INVITATIONS_PER_USER cannot be negative".to_string(),
            ));
        }

        if !(1..=3650).contains(&self.invitation_key_lifetime_days) {
            return Err(AppError::Config(
                "INVITATION_KEY_LIFETIME_DAYS must be between 1 and 3650".to_string(),
            ));
        }

        let admin_fields = [
            self.admin_username.is_some(),
            self.admin_email.is_some(),
            self.admin_password.is_some(),
        ];
        if admin_fields.iter().any(|set| *set) && !admin_fields.iter().all(|set| *set) {
            return Err(AppError::Config(
                "ADMIN_USERNAME, ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string(),
            ));
        }

        self.invitations()?;
        self.registration_backend_kind()?;

        Ok(())
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            host: self.server_host.clone(),
            port: self.server_port,
        }
    }

    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.jwt_secret.clone(),
            access_token_expires_in: self.jwt_access_token_expires_in,
            bcrypt_cost: self.bcrypt_cost,
        }
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format.clone(),
        }
    }

    pub fn smtp(&self) -> Option<SmtpConfig> {
        self.smtp_host.as_ref().map(|host| SmtpConfig {
            host: host.clone(),
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
            use_tls: self.smtp_use_tls,
        })
    }

    pub fn admin_bootstrap(&self) -> Option<AdminBootstrap> {
        match (&self.admin_username, &self.admin_email, &self.admin_password) {
            (Some(username), Some(email), Some(password)) => Some(AdminBootstrap {
                username: username.clone(),
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn invitations(&self) -> AppResult<InvitationSettings> {
        let quota_policy = self
            .invitation_quota_policy
            .parse::<QuotaPolicy>()
            .map_err(AppError::Config)?;

        let site_url = Url::parse(&self.site_url)
            .map_err(|e| AppError::Config(format!("SITE_URL is not a valid URL: {}", e)))?;
        if site_url.cannot_be_a_base() {
            return Err(AppError::Config("SITE_URL must be an absolute http(s) URL".to_string()));
        }

        Ok(InvitationSettings {
            invite_mode: self.invite_mode,
            invitations_per_user: self.invitations_per_user.max(0),
            key_lifetime: chrono::Duration::days(self.invitation_key_lifetime_days),
            quota_policy,
            site_url: SiteUrlHelper::new(&site_url),
            site_name: self.site_name.clone(),
            default_from_email: self.default_from_email.clone(),
        })
    }

    pub fn registration_backend_kind(&self) -> AppResult<RegistrationBackendKind> {
        self.registration_backend
            .parse::<RegistrationBackendKind>()
            .map_err(AppError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            jwt_secret: "a-real-secret".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn default_secret_is_rejected() {
        assert!(Config::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn invitation_settings_are_resolved() {
        let config = Config {
            invitation_quota_policy: "pending".to_string(),
            invitation_key_lifetime_days: 3,
            ..valid_config()
        };
        let settings = config.invitations().unwrap();
        assert_eq!(settings.quota_policy, QuotaPolicy::Pending);
        assert_eq!(settings.lifetime_days(), 3);
        assert!(settings.invite_mode);
    }

    #[test]
    fn bad_invitation_values_fail_validation() {
        let unknown_policy = Config {
            invitation_quota_policy: "sometimes".to_string(),
            ..valid_config()
        };
        assert!(unknown_policy.validate().is_err());

        let bad_url = Config {
            site_url: "not a url".to_string(),
            ..valid_config()
        };
        assert!(bad_url.validate().is_err());

        let zero_lifetime = Config {
            invitation_key_lifetime_days: 0,
            ..valid_config()
        };
        assert!(zero_lifetime.validate().is_err());

        let unknown_backend = Config {
            registration_backend: "ldap".to_string(),
            ..valid_config()
        };
        assert!(unknown_backend.validate().is_err());
    }

    #[test]
    fn partial_admin_bootstrap_is_rejected() {
        let config = Config {
            admin_username: Some("root".to_string()),
            ..valid_config()
        };
        assert!(config.validate().is_err());
        assert!(config.admin_bootstrap().is_none());
    }
}
