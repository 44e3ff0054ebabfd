use reqwest::header::CONTENT_DISPOSITION;
use tracing::instrument;

use crate::{
    error::ApiError,
    food::{
        dto::{FoodItem, FoodItemPayload},
        export::{filename_from_disposition, CsvDownload, ExportRange},
    },
    http::HttpClient,
};

/// Calls to the remote Food Service. Every call is authenticated.
#[derive(Clone)]
pub struct FoodApi {
    http: HttpClient,
}

impl FoodApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// All items of the signed-in user. A `null` body reads as empty.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<FoodItem>, ApiError> {
        let items: Option<Vec<FoodItem>> = self.http.get_json("/food-items").await?;
        Ok(items.unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<FoodItem, ApiError> {
        self.http.get_json(&format!("/food-items/{id}")).await
    }

    #[instrument(skip_all)]
    pub async fn create(&self, payload: &FoodItemPayload) -> Result<FoodItem, ApiError> {
        self.http.post_json("/food-items", payload).await
    }

    #[instrument(skip(self, payload))]
    pub async fn update(&self, id: i64, payload: &FoodItemPayload) -> Result<FoodItem, ApiError> {
        self.http.put_json(&format!("/food-items/{id}"), payload).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.http.delete(&format!("/food-items/{id}")).await
    }

    /// Server-side name search.
    #[instrument(skip(self))]
    pub async fn search(&self, name: &str) -> Result<Vec<FoodItem>, ApiError> {
        let items: Option<Vec<FoodItem>> = self
            .http
            .get_json_query("/food-items/search", &[("name", name)])
            .await?;
        Ok(items.unwrap_or_default())
    }

    /// Items created in the last seven days, as the server counts them.
    #[instrument(skip(self))]
    pub async fn recent(&self) -> Result<Vec<FoodItem>, ApiError> {
        let items: Option<Vec<FoodItem>> = self.http.get_json("/food-items/recent").await?;
        Ok(items.unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn recently_consumed(&self) -> Result<Vec<FoodItem>, ApiError> {
        let items: Option<Vec<FoodItem>> =
            self.http.get_json("/food-items/recently-consumed").await?;
        Ok(items.unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<u64, ApiError> {
        self.http.get_json("/food-items/count").await
    }

    #[instrument(skip(self))]
    pub async fn export(&self, range: &ExportRange) -> Result<CsvDownload, ApiError> {
        let resp = self
            .http
            .get_raw("/food-items/export", &range.query())
            .await?;
        let filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| range.default_filename());
        let bytes = resp.bytes().await?;
        Ok(CsvDownload { bytes, filename })
    }
}
