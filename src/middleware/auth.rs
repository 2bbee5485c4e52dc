use crate::{
    AppState,
    config::AuthConfig,
    db::models::{AuthUser, User},
    error::AppError,
};
use axum::{
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: uuid::Uuid, // user_id
    pub username: String,
    pub is_staff: bool,
    pub exp: u64,    // expiration time
    pub iat: u64,    // issued at
    pub jti: String, // JWT ID
}

/// Issues and checks HS256 access tokens.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn expires_in(&self) -> u64 {
        self.config.access_token_expires_in
    }

    pub fn generate_access_token(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
            exp: now + self.config.access_token_expires_in,
            iat: now,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_ref()),
        )
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_ref()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

fn bearer_token<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_str| auth_str.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Rejects the request unless it carries a valid token for an active user,
/// whose `AuthUser` is then placed in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next<axum::body::Body>,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or_else(|| AppError::auth("Missing bearer token"))?;

    let claims = state
        .auth_service
        .verify_token(&token)
        .map_err(|_| AppError::auth("Invalid or expired token"))?;

    let user = state
        .store
        .find_user(claims.sub)?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::auth("Unknown or inactive user"))?;

    request.extensions_mut().insert(AuthUser::from(&user));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(expires_in: u64) -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: "test-secret".to_string(),
            access_token_expires_in: expires_in,
            bcrypt_cost: 4,
        })
    }

    fn user() -> User {
        User {
            id: uuid::Uuid::new_v4(),
            username: "staff".to_string(),
            email: "staff@example.com".to_string(),
            password_hash: String::new(),
            is_staff: true,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let service = service(3600);
        let user = user();
        let token = service.generate_access_token(&user).unwrap();
        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert!(claims.is_staff);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let token = service(3600).generate_access_token(&user()).unwrap();
        let other = AuthService::new(AuthConfig {
            jwt_secret: "other-secret".to_string(),
            access_token_expires_in: 3600,
            bcrypt_cost: 4,
        });
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Token abc")
            .body(())
            .unwrap();
        assert!(bearer_token(&request).is_none());

        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap();
        assert_eq!(bearer_token(&request).as_deref(), Some("abc"));
    }
}
