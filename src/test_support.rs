//! In-process stand-in for the backend plus a harness wiring an [`App`] to it.

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio::{net::TcpListener, task::JoinHandle};
use url::Url;

use crate::{
    app::App,
    auth::dto::UserProfile,
    config::{ClientConfig, OAuthConfig},
    food::dto::{wire_time, FoodItem},
    http::HttpClient,
    routes::{Navigator, Route},
    storage::MemoryTokenStore,
};

pub const GOOD_TOKEN: &str = "token-abc123";
pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct-horse";
pub const GOOD_OTP: &str = "123456";

pub fn profile() -> UserProfile {
    UserProfile {
        id: 7,
        email: EMAIL.into(),
        first_name: "Ada".into(),
        last_name: Some("Lovelace".into()),
        email_verified: true,
        profile_picture: None,
        provider: Some("local".into()),
    }
}

/// A stored item created an hour ago, whole seconds only.
pub fn item(id: i64, name: &str, calorie: Option<i32>) -> FoodItem {
    let created_at =
        OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp() - 3600)
            .unwrap();
    FoodItem {
        id,
        name: name.into(),
        description: None,
        calorie,
        quantity: None,
        consumed_date: None,
        created_at,
    }
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    hits: Mutex<HashMap<&'static str, usize>>,
    items: Mutex<Vec<FoodItem>>,
    next_id: AtomicI64,
    failing: AtomicBool,
    omit_disposition: AtomicBool,
    list_status: Mutex<Option<StatusCode>>,
    list_delay: Mutex<Option<Duration>>,
    last_authorization: Mutex<Option<String>>,
    last_query: Mutex<Option<String>>,
}

impl MockState {
    fn hit(&self, key: &'static str) {
        *self.hits.lock().unwrap().entry(key).or_default() += 1;
    }

    pub fn hits(&self, key: &str) -> usize {
        self.hits.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }

    pub fn set_items(&self, items: Vec<FoodItem>) {
        let last = items.iter().map(|i| i.id).max().unwrap_or(0);
        self.next_id.store(last, Ordering::SeqCst);
        *self.items.lock().unwrap() = items;
    }

    /// Every endpoint except login and `/auth/me` answers 500 with an empty body.
    pub fn fail_requests(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn set_list_status(&self, status: StatusCode) {
        *self.list_status.lock().unwrap() = Some(status);
    }

    pub fn delay_next_list(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn omit_disposition(&self) {
        self.omit_disposition.store(true, Ordering::SeqCst);
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().unwrap().clone()
    }

    fn failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        *self.last_authorization.lock().unwrap() = auth.clone();
        auth.as_deref() == Some(format!("Bearer {GOOD_TOKEN}").as_str())
    }
}

type Shared = State<Arc<MockState>>;

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response()
}

fn server_error() -> Response {
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn acknowledged(message: &str) -> Response {
    Json(json!({"message": message, "success": true})).into_response()
}

fn bad_otp() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "Invalid or expired OTP", "success": false})),
    )
        .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody {
    name: String,
    description: Option<String>,
    calorie: Option<i32>,
    quantity: Option<String>,
    #[serde(default, with = "wire_time::option")]
    consumed_date: Option<OffsetDateTime>,
}

async fn login(State(mock): Shared, Json(body): Json<Value>) -> Response {
    mock.hit("POST /auth/login");
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        let mut resp = serde_json::to_value(profile()).unwrap();
        resp["token"] = json!(GOOD_TOKEN);
        resp["type"] = json!("Bearer");
        return Json(resp).into_response();
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "Invalid email or password"})),
    )
        .into_response()
}

async fn me(State(mock): Shared, headers: HeaderMap) -> Response {
    mock.hit("GET /auth/me");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    Json(profile()).into_response()
}

async fn register(State(mock): Shared, Json(body): Json<Value>) -> Response {
    mock.hit("POST /auth/register");
    if mock.failing() {
        return server_error();
    }
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Error: Email is already in use!", "success": false})),
        )
            .into_response();
    }
    acknowledged("User registered successfully! Please check your email for the verification code.")
}

async fn verify_email(State(mock): Shared, Json(body): Json<Value>) -> Response {
    mock.hit("POST /auth/verify-email");
    if mock.failing() {
        return server_error();
    }
    if body["otp"] != GOOD_OTP {
        return bad_otp();
    }
    acknowledged("Email verified successfully!")
}

async fn resend(State(mock): Shared) -> Response {
    mock.hit("POST /auth/resend-verification");
    if mock.failing() {
        return server_error();
    }
    acknowledged("Verification code sent")
}

async fn forgot(State(mock): Shared) -> Response {
    mock.hit("POST /auth/forgot-password");
    if mock.failing() {
        return server_error();
    }
    acknowledged("Password reset code sent")
}

async fn reset(State(mock): Shared, Json(body): Json<Value>) -> Response {
    mock.hit("POST /auth/reset-password");
    if mock.failing() {
        return server_error();
    }
    if body["otp"] != GOOD_OTP {
        return bad_otp();
    }
    acknowledged("Password reset successfully")
}

async fn list_items(State(mock): Shared, headers: HeaderMap) -> Response {
    mock.hit("GET /food-items");
    let authorized = mock.authorized(&headers);
    let forced = *mock.list_status.lock().unwrap();
    if let Some(status) = forced {
        return status.into_response();
    }
    if !authorized {
        return unauthorized();
    }
    let delay = mock.list_delay.lock().unwrap().take();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if mock.failing() {
        return server_error();
    }
    let items = mock.items.lock().unwrap().clone();
    Json(items).into_response()
}

async fn create_item(State(mock): Shared, headers: HeaderMap, Json(body): Json<ItemBody>) -> Response {
    mock.hit("POST /food-items");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    if mock.failing() {
        return server_error();
    }
    let id = mock.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let mut created = item(id, &body.name, body.calorie);
    created.description = body.description;
    created.quantity = body.quantity;
    created.consumed_date = body.consumed_date;
    mock.items.lock().unwrap().push(created.clone());
    Json(created).into_response()
}

async fn get_item(State(mock): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    mock.hit("GET /food-items/:id");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    let found = mock.items.lock().unwrap().iter().find(|i| i.id == id).cloned();
    match found {
        Some(item) => Json(item).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Food item not found"})),
        )
            .into_response(),
    }
}

async fn update_item(
    State(mock): Shared,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ItemBody>,
) -> Response {
    mock.hit("PUT /food-items/:id");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    if mock.failing() {
        return server_error();
    }
    let mut items = mock.items.lock().unwrap();
    let Some(stored) = items.iter_mut().find(|i| i.id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    stored.name = body.name;
    stored.description = body.description;
    stored.calorie = body.calorie;
    stored.quantity = body.quantity;
    stored.consumed_date = body.consumed_date;
    Json(stored.clone()).into_response()
}

async fn delete_item(State(mock): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    mock.hit("DELETE /food-items/:id");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    if mock.failing() {
        return server_error();
    }
    let mut items = mock.items.lock().unwrap();
    let before = items.len();
    items.retain(|i| i.id != id);
    if items.len() == before {
        return StatusCode::NOT_FOUND.into_response();
    }
    StatusCode::OK.into_response()
}

#[derive(Deserialize)]
struct SearchParams {
    name: String,
}

async fn search_items(
    State(mock): Shared,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    Query(params): Query<SearchParams>,
) -> Response {
    mock.hit("GET /food-items/search");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    *mock.last_query.lock().unwrap() = query;
    let needle = params.name.to_lowercase();
    let found: Vec<FoodItem> = mock
        .items
        .lock()
        .unwrap()
        .iter()
        .filter(|i| i.name.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    Json(found).into_response()
}

async fn recent_items(State(mock): Shared, headers: HeaderMap) -> Response {
    mock.hit("GET /food-items/recent");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    let week_ago = OffsetDateTime::now_utc() - time::Duration::days(7);
    let items: Vec<FoodItem> = mock
        .items
        .lock()
        .unwrap()
        .iter()
        .filter(|i| i.created_at >= week_ago)
        .cloned()
        .collect();
    Json(items).into_response()
}

async fn recently_consumed(State(mock): Shared, headers: HeaderMap) -> Response {
    mock.hit("GET /food-items/recently-consumed");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    let items: Vec<FoodItem> = mock
        .items
        .lock()
        .unwrap()
        .iter()
        .filter(|i| i.consumed_date.is_some())
        .cloned()
        .collect();
    Json(items).into_response()
}

async fn count_items(State(mock): Shared, headers: HeaderMap) -> Response {
    mock.hit("GET /food-items/count");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    let count = mock.items.lock().unwrap().len();
    Json(count).into_response()
}

async fn export_items(
    State(mock): Shared,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    mock.hit("GET /food-items/export");
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    *mock.last_query.lock().unwrap() = query;
    if mock.failing() {
        return server_error();
    }
    let mut csv = String::from("ID,Name,Description,Calories,Quantity,Consumed Date,Created At\n");
    for item in mock.items.lock().unwrap().iter() {
        csv.push_str(&format!(
            "{},{},{},{},{},,\n",
            item.id,
            item.name,
            item.description.as_deref().unwrap_or_default(),
            item.calorie.map(|c| c.to_string()).unwrap_or_default(),
            item.quantity.as_deref().unwrap_or_default(),
        ));
    }
    let mut resp_headers = HeaderMap::new();
    resp_headers.insert(header::CONTENT_TYPE, "text/csv".parse().unwrap());
    if !mock.omit_disposition.load(Ordering::SeqCst) {
        resp_headers.insert(
            header::CONTENT_DISPOSITION,
            r#"form-data; name="attachment"; filename="food_items_export.csv""#
                .parse()
                .unwrap(),
        );
    }
    (resp_headers, csv).into_response()
}

fn api_routes() -> Router<Arc<MockState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/register", post(register))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-verification", post(resend))
        .route("/auth/forgot-password", post(forgot))
        .route("/auth/reset-password", post(reset))
        .route("/food-items", get(list_items).post(create_item))
        .route("/food-items/search", get(search_items))
        .route("/food-items/recent", get(recent_items))
        .route("/food-items/recently-consumed", get(recently_consumed))
        .route("/food-items/count", get(count_items))
        .route("/food-items/export", get(export_items))
        .route(
            "/food-items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
}

pub struct MockBackend {
    pub mock: Arc<MockState>,
    pub base_url: Url,
    task: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_backend() -> MockBackend {
    let mock = Arc::new(MockState::default());
    let app = Router::new()
        .nest("/api", api_routes())
        .with_state(mock.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockBackend {
        mock,
        base_url: Url::parse(&format!("http://{addr}/api")).unwrap(),
        task,
    }
}

pub struct Harness {
    pub backend: MockBackend,
    pub store: Arc<MemoryTokenStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub app: App,
}

impl Harness {
    pub fn http(&self) -> &HttpClient {
        self.app.http()
    }

    fn config(&self) -> ClientConfig {
        config_for(&self.backend.base_url)
    }

    /// A fresh application run over the same storage, like a page reload.
    pub fn rebuild(&self) -> App {
        App::with_store(self.config(), self.store.clone(), self.navigator.clone()).unwrap()
    }
}

fn config_for(base_url: &Url) -> ClientConfig {
    ClientConfig {
        api_base_url: base_url.clone(),
        token_path: PathBuf::from("unused-token.json"),
        oauth: OAuthConfig {
            authorize_url: Url::parse("http://localhost:8080/oauth2/authorize/google").unwrap(),
            callback_addr: "127.0.0.1:0".parse().unwrap(),
        },
    }
}

pub async fn harness() -> Harness {
    harness_with_token(None).await
}

pub async fn harness_with_token(token: Option<&str>) -> Harness {
    let backend = spawn_backend().await;
    let store = Arc::new(match token {
        Some(token) => MemoryTokenStore::with_token(token),
        None => MemoryTokenStore::new(),
    });
    let navigator = Arc::new(RecordingNavigator::default());
    let app = App::with_store(
        config_for(&backend.base_url),
        store.clone(),
        navigator.clone(),
    )
    .unwrap();
    Harness {
        backend,
        store,
        navigator,
        app,
    }
}
