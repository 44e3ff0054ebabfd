use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::dto::UserProfile;

/// Snapshot of the authentication session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
    /// True only until the start-up validation pass has settled.
    pub loading: bool,
}

impl SessionState {
    pub fn starting() -> Self {
        Self {
            token: None,
            user: None,
            is_authenticated: false,
            loading: true,
        }
    }
}

/// The one session of an application run. Cloning shares it.
#[derive(Clone)]
pub struct SessionCell {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::starting());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn authenticate(&self, token: String, user: UserProfile) {
        self.tx.send_modify(|s| {
            s.token = Some(token);
            s.user = Some(user);
            s.is_authenticated = true;
        });
    }

    pub fn clear(&self) {
        self.tx.send_modify(|s| {
            s.token = None;
            s.user = None;
            s.is_authenticated = false;
        });
    }

    /// Returns false if loading had already finished.
    pub fn finish_loading(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if s.loading {
                s.loading = false;
                true
            } else {
                false
            }
        })
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}
