use serde::Serialize;

// Unified API response envelope
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorDetail>>,
    pub timestamp: String,
}

#[derive(Serialize, Debug)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: &str) -> Self {
        Self {
            success: true,
            code: 200,
            message: message.to_string(),
            data: Some(data),
            errors: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn created(data: T, message: &str) -> Self {
        Self {
            success: true,
            code: 201,
            message: message.to_string(),
            data: Some(data),
            errors: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// A failed request that still carries a payload, e.g. the page to show
    /// instead of the one that was asked for.
    pub fn rejected(data: T, code: u16, message: &str, error_code: &str) -> Self {
        Self {
            success: false,
            code,
            message: message.to_string(),
            data: Some(data),
            errors: Some(vec![ErrorDetail {
                field: None,
                code: error_code.to_string(),
                message: message.to_string(),
            }]),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error_with_code(code: u16, message: &str, error_code: &str) -> Self {
        Self {
            success: false,
            code,
            message: message.to_string(),
            data: None,
            errors: Some(vec![ErrorDetail {
                field: None,
                code: error_code.to_string(),
                message: message.to_string(),
            }]),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn validation_error(errors: Vec<ErrorDetail>) -> Self {
        Self {
            success: false,
            code: 400,
            message: "Validation failed".to_string(),
            data: None,
            errors: Some(errors),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::error_with_code(401, message, "UNAUTHORIZED")
    }

    pub fn forbidden(message: &str) -> Self {
        Self::error_with_code(403, message, "FORBIDDEN")
    }

    pub fn not_found(message: &str) -> Self {
        Self::error_with_code(404, message, "NOT_FOUND")
    }

    pub fn conflict(message: &str, field: Option<String>, error_code: &str) -> Self {
        Self {
            success: false,
            code: 409,
            message: message.to_string(),
            data: None,
            errors: Some(vec![ErrorDetail {
                field,
                code: error_code.to_string(),
                message: message.to_string(),
            }]),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::error_with_code(400, message, "BAD_REQUEST")
    }

    pub fn internal_error(message: &str) -> Self {
        Self::error_with_code(500, message, "INTERNAL_ERROR")
    }
}

// Business error codes
pub mod error_codes {
    pub const USER_USERNAME_EXISTS: &str = "USER_USERNAME_EXISTS";
    pub const USER_EMAIL_EXISTS: &str = "USER_EMAIL_EXISTS";

    pub const INVITATION_KEY_INVALID: &str = "INVITATION_KEY_INVALID";
    pub const INVITATION_KEY_MISSING: &str = "INVITATION_KEY_MISSING";
    pub const INVITATION_KEY_EXISTS: &str = "INVITATION_KEY_EXISTS";
    pub const NO_INVITATIONS_REMAINING: &str = "NO_INVITATIONS_REMAINING";
}
