use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            EmailRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
            ResetPasswordRequest, VerifyEmailRequest,
        },
        services::{validate_email, AuthApi},
    },
    error::AuthFailure,
    state::{SessionCell, SessionState},
    storage::TokenStore,
};

const LOGIN_FAILED: &str = "Login failed";
const REGISTER_FAILED: &str = "Registration failed";
const VERIFY_FAILED: &str = "Email verification failed";
const RESEND_FAILED: &str = "Failed to resend verification";
const FORGOT_FAILED: &str = "Failed to send reset email";
const RESET_FAILED: &str = "Password reset failed";

/// Session store: owns the authentication lifecycle of one application run.
#[derive(Clone)]
pub struct Session {
    cell: SessionCell,
    api: AuthApi,
    store: Arc<dyn TokenStore>,
    initialized: Arc<OnceCell<()>>,
}

impl Session {
    pub fn new(cell: SessionCell, api: AuthApi, store: Arc<dyn TokenStore>) -> Self {
        Self {
            cell,
            api,
            store,
            initialized: Arc::new(OnceCell::new()),
        }
    }

    pub fn cell(&self) -> &SessionCell {
        &self.cell
    }

    pub fn snapshot(&self) -> SessionState {
        self.cell.snapshot()
    }

    /// Validates a persisted token against `/auth/me`. Runs once; always settles
    /// with `loading == false` and never fails.
    pub async fn initialize(&self) {
        self.initialized
            .get_or_init(|| async {
                self.restore().await;
                self.cell.finish_loading();
            })
            .await;
    }

    #[instrument(skip(self))]
    async fn restore(&self) {
        let stored = match self.store.load().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "could not read stored token");
                None
            }
        };
        let Some(token) = stored else {
            info!("no stored session");
            return;
        };
        match self.api.me_with_token(&token).await {
            Ok(user) => {
                info!(user_id = user.id, "session restored");
                self.cell.authenticate(token, user);
            }
            Err(e) => {
                warn!(error = %e, "stored token rejected; discarding it");
                if let Err(e) = self.store.remove().await {
                    error!(error = %e, "failed to remove stored token");
                }
                self.cell.clear();
            }
        }
    }

    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: LoginRequest) -> Result<LoginResponse, AuthFailure> {
        let resp = match self.api.login(&credentials).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "login rejected");
                return Err(AuthFailure::from_api(&e, LOGIN_FAILED));
            }
        };
        if let Err(e) = self.store.save(&resp.token).await {
            error!(error = %e, "could not persist token");
            return Err(AuthFailure::new(LOGIN_FAILED));
        }
        self.cell.authenticate(resp.token.clone(), resp.user.clone());
        info!(user_id = resp.user.id, "user logged in");
        Ok(resp)
    }

    /// Registration does not sign the user in; the email still needs verifying.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<MessageResponse, AuthFailure> {
        let request = request.normalized();
        request.validate()?;
        self.api.register(&request).await.map_err(|e| {
            warn!(error = %e, "registration rejected");
            AuthFailure::from_api(&e, REGISTER_FAILED)
        })
    }

    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn verify_email(
        &self,
        request: VerifyEmailRequest,
    ) -> Result<MessageResponse, AuthFailure> {
        request.validate()?;
        self.api.verify_email(&request).await.map_err(|e| {
            warn!(error = %e, "email verification rejected");
            AuthFailure::from_api(&e, VERIFY_FAILED)
        })
    }

    #[instrument(skip(self))]
    pub async fn resend_verification(&self, email: &str) -> Result<MessageResponse, AuthFailure> {
        validate_email(email)?;
        let body = EmailRequest {
            email: email.trim().to_string(),
        };
        self.api.resend_verification(&body).await.map_err(|e| {
            warn!(error = %e, "resend verification rejected");
            AuthFailure::from_api(&e, RESEND_FAILED)
        })
    }

    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, AuthFailure> {
        validate_email(email)?;
        let body = EmailRequest {
            email: email.trim().to_string(),
        };
        self.api.forgot_password(&body).await.map_err(|e| {
            warn!(error = %e, "forgot password rejected");
            AuthFailure::from_api(&e, FORGOT_FAILED)
        })
    }

    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
        confirm_password: &str,
    ) -> Result<MessageResponse, AuthFailure> {
        request.validate(confirm_password)?;
        self.api.reset_password(&request).await.map_err(|e| {
            warn!(error = %e, "password reset rejected");
            AuthFailure::from_api(&e, RESET_FAILED)
        })
    }

    /// Local sign-out. No request is made.
    pub async fn logout(&self) {
        self.cell.clear();
        if let Err(e) = self.store.remove().await {
            error!(error = %e, "failed to remove stored token");
        }
        info!("logged out");
    }
}
