use serde::{Deserialize, Serialize};

/// Profile of the signed-in user as returned by `/auth/me` and `/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Request body for login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: &str, password: impl Into<String>) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.into(),
        }
    }
}

/// Login response: the token plus the user fields, flattened.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub user: UserProfile,
}

/// Request body for user registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Request body for consuming an email verification OTP.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
}

/// Request body for resend-verification and forgot-password.
#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Request body for consuming a password reset OTP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

/// `{message, success}` acknowledgement of the OTP and registration endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: Option<String>,
    pub success: bool,
}

impl MessageResponse {
    /// Accepts whatever the endpoint sent; a 2xx without a `success` flag counts as success.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            message: value
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_owned),
            success: value
                .get("success")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
        }
    }
}
