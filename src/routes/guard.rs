use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::{Navigator, Route};
use crate::state::{SessionCell, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Denied,
    Admitted,
}

impl GuardState {
    pub fn of(session: &SessionState) -> Self {
        if session.loading {
            GuardState::Checking
        } else if session.is_authenticated {
            GuardState::Admitted
        } else {
            GuardState::Denied
        }
    }
}

/// Gates protected views on the session.
pub struct RouteGuard {
    session: watch::Receiver<SessionState>,
    navigator: Arc<dyn Navigator>,
}

impl RouteGuard {
    pub fn new(cell: &SessionCell, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            session: cell.subscribe(),
            navigator,
        }
    }

    pub fn state(&self) -> GuardState {
        GuardState::of(&self.session.borrow())
    }

    /// Waits out the start-up check, then decides once. A denied visit is sent to
    /// login; the requested destination is not remembered.
    pub async fn admit(&mut self) -> GuardState {
        let decision = match self.session.wait_for(|s| !s.loading).await {
            Ok(snapshot) => GuardState::of(&snapshot),
            // session owner dropped while still checking
            Err(_) => GuardState::Denied,
        };
        debug!(?decision, "route guard settled");
        if decision == GuardState::Denied {
            self.navigator.navigate(Route::login());
        }
        decision
    }
}
