use std::sync::Arc;

use crate::{
    auth::{services::AuthApi, RedirectHandler, Session},
    config::ClientConfig,
    food::{FoodApi, FoodCollection},
    http::HttpClient,
    routes::{guard::RouteGuard, Navigator},
    state::SessionCell,
    storage::{FileTokenStore, TokenStore},
};

/// Everything one application run shares: a single session, one token store,
/// one request pipeline.
pub struct App {
    config: ClientConfig,
    navigator: Arc<dyn Navigator>,
    store: Arc<dyn TokenStore>,
    http: HttpClient,
    session: Session,
    auth_api: AuthApi,
    food_api: FoodApi,
}

impl App {
    pub fn new(config: ClientConfig, navigator: Arc<dyn Navigator>) -> anyhow::Result<Self> {
        let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
        Self::with_store(config, store, navigator)
    }

    pub fn with_store(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let cell = SessionCell::new();
        let http = HttpClient::new(
            config.api_base_url.clone(),
            store.clone(),
            cell.clone(),
            navigator.clone(),
        )?;
        let auth_api = AuthApi::new(http.clone());
        let session = Session::new(cell, auth_api.clone(), store.clone());
        let food_api = FoodApi::new(http.clone());
        Ok(Self {
            config,
            navigator,
            store,
            http,
            session,
            auth_api,
            food_api,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn food_api(&self) -> &FoodApi {
        &self.food_api
    }

    pub fn guard(&self) -> RouteGuard {
        RouteGuard::new(self.session.cell(), self.navigator.clone())
    }

    pub fn collection(&self) -> FoodCollection {
        FoodCollection::new(self.food_api.clone())
    }

    pub fn redirect_handler(&self) -> RedirectHandler {
        RedirectHandler::new(
            self.auth_api.clone(),
            self.store.clone(),
            self.session.cell().clone(),
            self.navigator.clone(),
        )
    }
}
