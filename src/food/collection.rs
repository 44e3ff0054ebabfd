use std::sync::Arc;

use reqwest::StatusCode;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ApiError, CrudError},
    food::{
        api::FoodApi,
        banner::Banners,
        dto::{FoodItem, FoodItemDraft},
        filter::{self, FilterState, FilteredView, Tab},
    },
};

pub const ADDED: &str = "Food item added successfully!";
pub const ADD_FAILED: &str = "Failed to add food item. Please try again.";
pub const UPDATED: &str = "Food item updated successfully!";
pub const UPDATE_FAILED: &str = "Failed to update food item. Please try again.";
pub const DELETED: &str = "Food item deleted successfully!";
pub const DELETE_FAILED: &str = "Failed to delete food item. Please try again.";
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this food item?";

const LOAD_UNAUTHORIZED: &str = "Please log in to view your food items.";
const LOAD_FORBIDDEN: &str = "You do not have permission to view food items.";
const LOAD_FAILED: &str =
    "Failed to load food items. Please make sure you are logged in and the backend server is running.";

/// Asks the user to approve a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

fn load_error_message(err: &ApiError) -> &'static str {
    match err.status() {
        Some(StatusCode::UNAUTHORIZED) => LOAD_UNAUTHORIZED,
        Some(StatusCode::FORBIDDEN) => LOAD_FORBIDDEN,
        _ => LOAD_FAILED,
    }
}

#[derive(Debug, Default)]
struct Inner {
    items: Vec<FoodItem>,
    filter: FilterState,
    loading: bool,
    load_error: Option<String>,
    /// Bumped by every load and by detach; a response is applied only under its own ticket.
    generation: u64,
    detached: bool,
}

/// Open edit surface for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub item_id: i64,
    pub draft: FoodItemDraft,
    /// Inline error shown on the form.
    pub error: Option<String>,
    open: bool,
}

impl EditForm {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }
}

/// In-memory copy of the user's food items plus the feedback of the view showing them.
#[derive(Clone)]
pub struct FoodCollection {
    api: FoodApi,
    inner: Arc<Mutex<Inner>>,
    banners: Banners,
}

impl FoodCollection {
    pub fn new(api: FoodApi) -> Self {
        Self {
            api,
            inner: Arc::new(Mutex::new(Inner::default())),
            banners: Banners::default(),
        }
    }

    pub fn banners(&self) -> &Banners {
        &self.banners
    }

    pub async fn items(&self) -> Vec<FoodItem> {
        self.inner.lock().await.items.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.loading
    }

    pub async fn load_error(&self) -> Option<String> {
        self.inner.lock().await.load_error.clone()
    }

    pub async fn filter(&self) -> FilterState {
        self.inner.lock().await.filter.clone()
    }

    pub async fn set_search_term(&self, term: impl Into<String>) {
        self.inner.lock().await.filter.search_term = term.into();
    }

    pub async fn set_tab(&self, tab: Tab) {
        self.inner.lock().await.filter.active_tab = tab;
    }

    pub async fn view(&self) -> FilteredView {
        self.view_at(OffsetDateTime::now_utc()).await
    }

    pub async fn view_at(&self, now: OffsetDateTime) -> FilteredView {
        let inner = self.inner.lock().await;
        filter::apply(&inner.items, &inner.filter, now)
    }

    /// Replaces the collection with the server's. Returns the item count, or
    /// [`CrudError::Discarded`] when a newer load or a detach overtook this one.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<usize, CrudError> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            if inner.detached {
                return Err(CrudError::Discarded);
            }
            inner.generation += 1;
            inner.loading = true;
            inner.load_error = None;
            inner.generation
        };

        let result = self.api.list().await;

        let mut inner = self.inner.lock().await;
        if inner.detached || inner.generation != ticket {
            debug!(ticket, current = inner.generation, "dropping stale load response");
            return Err(CrudError::Discarded);
        }
        inner.loading = false;
        match result {
            Ok(items) => {
                let count = items.len();
                inner.items = items;
                info!(count, "food items loaded");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "loading food items failed");
                let message = load_error_message(&e);
                inner.load_error = Some(message.to_string());
                Err(CrudError::Rejected(message.to_string()))
            }
        }
    }

    /// The view went away: outstanding responses are dropped.
    pub async fn detach(&self) {
        let mut inner = self.inner.lock().await;
        inner.detached = true;
        inner.generation += 1;
        inner.loading = false;
    }

    #[instrument(skip_all)]
    pub async fn add(&self, draft: FoodItemDraft) -> Result<FoodItem, CrudError> {
        self.banners.clear();
        let payload = draft
            .into_payload()
            .map_err(|e| CrudError::Validation(e.0))?;

        match self.api.create(&payload).await {
            Ok(item) => {
                let mut inner = self.inner.lock().await;
                if inner.detached {
                    return Err(CrudError::Discarded);
                }
                inner.items.push(item.clone());
                drop(inner);
                info!(item_id = item.id, "food item added");
                self.banners.success(ADDED);
                Ok(item)
            }
            Err(ApiError::Unauthorized(_)) => Err(CrudError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "adding food item failed");
                self.banners.error(ADD_FAILED);
                Err(CrudError::Rejected(ADD_FAILED.to_string()))
            }
        }
    }

    /// Opens the edit surface pre-filled from the item, if it is in the collection.
    pub async fn begin_edit(&self, id: i64) -> Option<EditForm> {
        let inner = self.inner.lock().await;
        inner.items.iter().find(|i| i.id == id).map(|item| EditForm {
            item_id: id,
            draft: FoodItemDraft::from_item(item),
            error: None,
            open: true,
        })
    }

    /// On success the item is replaced in place and the form closes. On failure the
    /// form stays open with its inline error set.
    #[instrument(skip_all, fields(item_id = form.item_id))]
    pub async fn submit_edit(&self, form: &mut EditForm) -> Result<FoodItem, CrudError> {
        if !form.open {
            return Err(CrudError::Discarded);
        }
        self.banners.clear();
        form.error = None;

        let payload = match form.draft.clone().into_payload() {
            Ok(payload) => payload,
            Err(e) => {
                form.error = Some(e.0.clone());
                return Err(CrudError::Validation(e.0));
            }
        };

        match self.api.update(form.item_id, &payload).await {
            Ok(item) => {
                let mut inner = self.inner.lock().await;
                if inner.detached {
                    return Err(CrudError::Discarded);
                }
                if let Some(slot) = inner.items.iter_mut().find(|i| i.id == form.item_id) {
                    *slot = item.clone();
                }
                drop(inner);
                form.open = false;
                info!("food item updated");
                self.banners.success(UPDATED);
                Ok(item)
            }
            Err(ApiError::Unauthorized(_)) => Err(CrudError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "updating food item failed");
                form.error = Some(UPDATE_FAILED.to_string());
                Err(CrudError::Rejected(UPDATE_FAILED.to_string()))
            }
        }
    }

    /// Deletes after confirmation. `Ok(false)` means the user declined.
    #[instrument(skip(self, confirm))]
    pub async fn delete(&self, id: i64, confirm: &dyn Confirm) -> Result<bool, CrudError> {
        if !confirm.confirm(DELETE_PROMPT) {
            debug!("delete declined");
            return Ok(false);
        }
        self.banners.clear();

        match self.api.delete(id).await {
            Ok(()) => {
                let mut inner = self.inner.lock().await;
                if inner.detached {
                    return Err(CrudError::Discarded);
                }
                inner.items.retain(|i| i.id != id);
                drop(inner);
                info!("food item deleted");
                self.banners.success(DELETED);
                Ok(true)
            }
            Err(ApiError::Unauthorized(_)) => Err(CrudError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "deleting food item failed");
                self.banners.error(DELETE_FAILED);
                Err(CrudError::Rejected(DELETE_FAILED.to_string()))
            }
        }
    }
}
