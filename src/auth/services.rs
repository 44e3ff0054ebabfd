use lazy_static::lazy_static;
use regex::Regex;
use tracing::instrument;

use crate::{
    auth::dto::{
        EmailRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
        ResetPasswordRequest, UserProfile, VerifyEmailRequest,
    },
    error::{ApiError, ValidationError},
    http::HttpClient,
};

pub const OTP_LEN: usize = 6;
const NAME_MAX: usize = 50;
const EMAIL_MAX: usize = 100;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 40;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Keeps the digits of an OTP input, at most six of them.
pub fn otp_digits(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_digit)
        .take(OTP_LEN)
        .collect()
}

pub(crate) fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::new("Email is required"));
    }
    if email.chars().count() > EMAIL_MAX || !is_valid_email(email.trim()) {
        return Err(ValidationError::new("Please enter a valid email address"));
    }
    Ok(())
}

fn validate_otp(otp: &str) -> Result<(), ValidationError> {
    if otp.len() != OTP_LEN || !otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("Please enter a valid 6-digit OTP"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err(ValidationError::new(
            "Password must be at least 6 characters long",
        ));
    }
    if len > PASSWORD_MAX {
        return Err(ValidationError::new(
            "Password must not exceed 40 characters",
        ));
    }
    Ok(())
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [("First name", &self.first_name), ("Last name", &self.last_name)] {
            if value.trim().is_empty() {
                return Err(ValidationError::new(format!("{label} is required")));
            }
            if value.trim().chars().count() > NAME_MAX {
                return Err(ValidationError::new(format!(
                    "{label} must not exceed {NAME_MAX} characters"
                )));
            }
        }
        validate_email(&self.email)?;
        validate_password(&self.password)
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = self.email.trim().to_string();
        self
    }
}

impl VerifyEmailRequest {
    pub fn new(email: &str, otp: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            otp: otp_digits(otp),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        validate_otp(&self.otp)
    }
}

impl ResetPasswordRequest {
    pub fn new(email: &str, otp: &str, new_password: impl Into<String>) -> Self {
        Self {
            email: email.trim().to_string(),
            otp: otp_digits(otp),
            new_password: new_password.into(),
        }
    }

    pub fn validate(&self, confirm_password: &str) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        validate_otp(&self.otp)?;
        if self.new_password != confirm_password {
            return Err(ValidationError::new("Passwords do not match"));
        }
        validate_password(&self.new_password)
    }
}

/// Calls to the remote Auth Service.
#[derive(Clone)]
pub struct AuthApi {
    http: HttpClient,
}

impl AuthApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    #[instrument(skip_all)]
    pub async fn login(&self, body: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.http.post_public("/auth/login", body).await
    }

    #[instrument(skip_all)]
    pub async fn register(&self, body: &RegisterRequest) -> Result<MessageResponse, ApiError> {
        self.post_message("/auth/register", body).await
    }

    #[instrument(skip_all)]
    pub async fn verify_email(
        &self,
        body: &VerifyEmailRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.post_message("/auth/verify-email", body).await
    }

    #[instrument(skip_all)]
    pub async fn resend_verification(
        &self,
        body: &EmailRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.post_message("/auth/resend-verification", body).await
    }

    #[instrument(skip_all)]
    pub async fn forgot_password(&self, body: &EmailRequest) -> Result<MessageResponse, ApiError> {
        self.post_message("/auth/forgot-password", body).await
    }

    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        body: &ResetPasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.post_message("/auth/reset-password", body).await
    }

    /// Profile for an explicit token; no stored credentials, no 401 teardown.
    #[instrument(skip_all)]
    pub async fn me_with_token(&self, token: &str) -> Result<UserProfile, ApiError> {
        self.http.get_json_with_token("/auth/me", token).await
    }

    async fn post_message<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<MessageResponse, ApiError> {
        let value: serde_json::Value = self.http.post_public(path, body).await?;
        Ok(MessageResponse::from_value(&value))
    }
}
