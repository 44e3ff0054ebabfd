use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::runtime::Handle;
use tracing::debug;

/// How long a success banner stays up.
pub const BANNER_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Error(String),
}

#[derive(Debug, Default)]
struct Slot {
    banner: Option<Banner>,
    seq: u64,
}

/// The single feedback line of the food view. Any new message replaces the old one.
#[derive(Debug, Clone, Default)]
pub struct Banners {
    slot: Arc<Mutex<Slot>>,
}

impl Banners {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, banner: Option<Banner>) -> u64 {
        let mut slot = self.lock();
        slot.seq += 1;
        slot.banner = banner;
        slot.seq
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Shows `message` and clears it after [`BANNER_TTL`] unless something newer took its place.
    pub fn success(&self, message: impl Into<String>) {
        let seq = self.set(Some(Banner::Success(message.into())));
        let Ok(handle) = Handle::try_current() else {
            debug!("no runtime; success banner stays until replaced");
            return;
        };
        let slot = Arc::clone(&self.slot);
        handle.spawn(async move {
            tokio::time::sleep(BANNER_TTL).await;
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.seq == seq {
                slot.banner = None;
            }
        });
    }

    /// Error banners stay until the next operation clears them.
    pub fn error(&self, message: impl Into<String>) {
        self.set(Some(Banner::Error(message.into())));
    }

    pub fn current(&self) -> Option<Banner> {
        self.lock().banner.clone()
    }

    pub fn success_message(&self) -> Option<String> {
        match self.current() {
            Some(Banner::Success(message)) => Some(message),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self.current() {
            Some(Banner::Error(message)) => Some(message),
            _ => None,
        }
    }
}
