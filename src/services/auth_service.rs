use bcrypt::{hash, verify};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::AdminBootstrap,
    db::models::auth::{AuthUser, LoginRequest, LoginResponse, User},
    db::store::{InvitationStore, Registration},
    error::AppError,
    middleware::auth::AuthService as JwtService,
};

pub struct AuthService;

impl AuthService {
    pub fn login(
        store: &dyn InvitationStore,
        jwt: &JwtService,
        req: &LoginRequest,
    ) -> Result<LoginResponse, AppError> {
        let user = store
            .find_user_by_login(req.login.trim())?
            .filter(|user| user.is_active)
            .ok_or_else(|| AppError::auth("Invalid username or password"))?;

        let is_valid = verify(&req.password, &user.password_hash)
            .map_err(|_| AppError::internal("Failed to verify password"))?;

        if !is_valid {
            return Err(AppError::auth("Invalid username or password"));
        }

        let access_token = jwt.generate_access_token(&user)?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: jwt.expires_in(),
            user: AuthUser::from(&user),
        })
    }

    /// Creates the configured staff account unless a user with that username
    /// already exists.
    pub fn ensure_admin(
        store: &dyn InvitationStore,
        admin: &AdminBootstrap,
        bcrypt_cost: u32,
    ) -> Result<User, AppError> {
        if let Some(existing) = store.find_user_by_login(&admin.username)? {
            if !existing.is_staff {
                tracing::warn!(username = %admin.username, "Bootstrap admin exists but is not staff");
            }
            return Ok(existing);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: hash(&admin.password, bcrypt_cost)?,
            is_staff: true,
            is_active: true,
            created_at: Utc::now(),
        };

        match store.register_user(&user, None, Utc::now())? {
            Registration::Created { user, .. } => {
                tracing::info!(username = %user.username, "Bootstrap admin created");
                Ok(user)
            }
            Registration::KeyUnavailable => Err(AppError::internal("Unexpected key claim for admin")),
        }
    }
}
