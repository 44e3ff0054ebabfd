use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use url::Url;

use crate::{
    auth::{dto::UserProfile, services::AuthApi},
    routes::{Navigator, Route},
    state::SessionCell,
    storage::TokenStore,
};

pub const PROVIDER_FAILED: &str = "OAuth2 authentication failed";
pub const EXCHANGE_FAILED: &str = "Authentication failed. Please try again.";
pub const NO_TOKEN: &str = "No authentication token received";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Authenticated(UserProfile),
    /// Sent back to login carrying this message.
    Rejected(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Error(String),
    Token(String),
    Empty,
}

impl Callback {
    fn parse(url: &Url) -> Self {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        // the backend appends `error=false` to successful redirects
        let failed = param("error").is_some_and(|v| !v.is_empty() && v != "false");
        if failed {
            let message = param("message")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| PROVIDER_FAILED.to_string());
            return Callback::Error(message);
        }
        match param("token").filter(|t| !t.is_empty()) {
            Some(token) => Callback::Token(token),
            None => Callback::Empty,
        }
    }
}

/// Completes one arrival at the OAuth2 redirect URL. Consumed by [`complete`](Self::complete);
/// there is no retry.
pub struct RedirectHandler {
    api: AuthApi,
    store: Arc<dyn TokenStore>,
    session: SessionCell,
    navigator: Arc<dyn Navigator>,
}

impl RedirectHandler {
    pub fn new(
        api: AuthApi,
        store: Arc<dyn TokenStore>,
        session: SessionCell,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            api,
            store,
            session,
            navigator,
        }
    }

    #[instrument(skip_all, fields(path = redirect.path()))]
    pub async fn complete(self, redirect: &Url) -> RedirectOutcome {
        let token = match Callback::parse(redirect) {
            Callback::Error(message) => {
                warn!(%message, "provider reported a failure");
                return self.reject(message);
            }
            Callback::Empty => {
                warn!("redirect carried no token");
                return self.reject(NO_TOKEN.to_string());
            }
            Callback::Token(token) => token,
        };

        if let Err(e) = self.store.save(&token).await {
            error!(error = %e, "could not persist token");
            return self.reject(EXCHANGE_FAILED.to_string());
        }

        match self.api.me_with_token(&token).await {
            Ok(user) => {
                info!(user_id = user.id, "signed in through provider");
                self.session.authenticate(token, user.clone());
                self.navigator.navigate(Route::Dashboard);
                RedirectOutcome::Authenticated(user)
            }
            Err(e) => {
                warn!(error = %e, "token exchange failed; rolling back");
                if let Err(e) = self.store.remove().await {
                    error!(error = %e, "failed to remove stored token");
                }
                self.reject(EXCHANGE_FAILED.to_string())
            }
        }
    }

    fn reject(&self, message: String) -> RedirectOutcome {
        self.navigator.navigate(Route::login_with_error(message.clone()));
        RedirectOutcome::Rejected(message)
    }
}
