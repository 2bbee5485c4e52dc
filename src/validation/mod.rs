use axum::{
    async_trait,
    extract::FromRequest,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{
    db::models::api::{ApiResponse, ErrorDetail},
    error::AppError,
};

pub mod invitation;

/// JSON extractor that runs `validator` rules before the handler sees the
/// body. Failed rules come back as a 400 listing every offending field.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S, axum::body::Body> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request<axum::body::Body>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|_| AppError::validation("Invalid JSON format").into_response())?;

        value.validate().map_err(|errors| {
            let error_details: Vec<ErrorDetail> = errors
                .field_errors()
                .iter()
                .flat_map(|(field, field_errors)| {
                    field_errors.iter().map(move |error| ErrorDetail {
                        field: Some(field.to_string()),
                        code: error.code.to_string(),
                        message: error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Validation failed for field: {}", field)),
                    })
                })
                .collect();

            validation_error_response(error_details).into_response()
        })?;

        Ok(ValidatedJson(value))
    }
}

pub fn validation_error_response(errors: Vec<ErrorDetail>) -> (StatusCode, Json<ApiResponse<()>>) {
    let response = ApiResponse::validation_error(errors);
    (StatusCode::BAD_REQUEST, Json(response))
}

/// Shared field rules for `#[validate(custom(...))]`.
pub mod rules {
    use validator::ValidationError;

    /// At least three of: length >= 8, lowercase, uppercase, digit, symbol.
    pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
        let mut score = 0;

        if password.len() >= 8 {
            score += 1;
        }
        if password.chars().any(|c| c.is_lowercase()) {
            score += 1;
        }
        if password.chars().any(|c| c.is_uppercase()) {
            score += 1;
        }
        if password.chars().any(|c| c.is_numeric()) {
            score += 1;
        }
        if password.chars().any(|c| "!@#$%^&*()_+-=[]{}|;:,.<>?".contains(c)) {
            score += 1;
        }

        if score < 3 {
            let mut error = ValidationError::new("weak_password");
            error.message = Some("Password is too weak".into());
            return Err(error);
        }

        Ok(())
    }

    pub fn validate_username_format(username: &str) -> Result<(), ValidationError> {
        // letters, digits, '_', '-', '.', '@' and '+'
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '@' | '+'))
        {
            let mut error = ValidationError::new("invalid_username_format");
            error.message = Some("Username contains invalid characters".into());
            return Err(error);
        }

        if username.chars().next().map_or(false, |c| c.is_numeric()) {
            let mut error = ValidationError::new("username_starts_with_number");
            error.message = Some("Username cannot start with a number".into());
            return Err(error);
        }

        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn password_strength() {
            assert!(validate_password_strength("Password1").is_ok());
            assert!(validate_password_strength("password").is_err());
            assert!(validate_password_strength("abc").is_err());
        }

        #[test]
        fn username_format() {
            assert!(validate_username_format("jane.doe").is_ok());
            assert!(validate_username_format("jane doe").is_err());
            assert!(validate_username_format("1jane").is_err());
        }
    }
}
