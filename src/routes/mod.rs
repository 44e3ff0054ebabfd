use tracing::{info, warn};

pub mod guard;

/// Views of the application. `Dashboard` is the only protected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login { error: Option<String> },
    Register,
    VerifyEmail { email: String },
    ForgotPassword,
    OAuthRedirect,
    Dashboard,
}

impl Route {
    pub fn login() -> Self {
        Route::Login { error: None }
    }

    pub fn login_with_error(message: impl Into<String>) -> Self {
        Route::Login {
            error: Some(message.into()),
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login { .. } => "/login",
            Route::Register => "/register",
            Route::VerifyEmail { .. } => "/verify-email",
            Route::ForgotPassword => "/forgot-password",
            Route::OAuthRedirect => "/oauth2/redirect",
            Route::Dashboard => "/dashboard",
        }
    }

    /// `/` and unknown paths land on the dashboard.
    pub fn resolve(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path.trim_end_matches('/') {
            "/login" => Route::login(),
            "/register" => Route::Register,
            "/verify-email" => Route::VerifyEmail {
                email: String::new(),
            },
            "/forgot-password" => Route::ForgotPassword,
            "/oauth2/redirect" => Route::OAuthRedirect,
            _ => Route::Dashboard,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

/// Where the core sends the user. Implemented by the front end.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Terminal front end: there is no view to switch, so navigation is reported.
#[derive(Debug, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: Route) {
        match &route {
            Route::Login { error: Some(message) } => {
                warn!(path = route.path(), %message, "sent back to login");
                eprintln!("{message}");
                eprintln!("Run `foodkeeper login` or `foodkeeper oauth` to sign in again.");
            }
            Route::Login { error: None } => {
                info!(path = route.path(), "login required");
                eprintln!("You are not signed in. Run `foodkeeper login` or `foodkeeper oauth`.");
            }
            Route::VerifyEmail { email } => {
                info!(path = route.path(), "email verification pending");
                eprintln!("Run `foodkeeper verify --email {email} --otp <code>` to verify your email.");
            }
            _ => info!(path = route.path(), "navigated"),
        }
    }
}
