use std::sync::Arc;

use anyhow::Context;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::{
    error::{ApiError, ErrorEnvelope},
    routes::{Navigator, Route},
    state::SessionCell,
    storage::TokenStore,
};

/// Outgoing request pipeline shared by every backend call.
///
/// Requests carry the stored bearer token when there is one. A 401 on an
/// authenticated call tears the session down (durable token, in-memory state)
/// and sends the user to login before the caller sees
/// [`ApiError::Unauthorized`]. Other failures are handed back untouched.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: Url,
    store: Arc<dyn TokenStore>,
    session: SessionCell,
    navigator: Arc<dyn Navigator>,
}

impl HttpClient {
    pub fn new(
        base_url: Url,
        store: Arc<dyn TokenStore>,
        session: SessionCell,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!("foodkeeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            inner,
            base_url,
            store,
            session,
            navigator,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner.request(method, self.url(path))
    }

    async fn bearer(&self) -> Option<String> {
        match self.store.load().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token store unreadable; sending request without credentials");
                None
            }
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let req = match self.bearer().await {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let envelope = read_envelope(resp).await;
        if status == StatusCode::UNAUTHORIZED {
            self.tear_down().await;
            return Err(ApiError::Unauthorized(envelope));
        }
        debug!(%status, "request rejected");
        Err(ApiError::Status { status, envelope })
    }

    async fn tear_down(&self) {
        warn!("backend answered 401; ending session");
        if let Err(e) = self.store.remove().await {
            error!(error = %e, "failed to remove stored token");
        }
        self.session.clear();
        self.navigator.navigate(Route::login());
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        decode(resp).await
    }

    pub async fn get_json_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let resp = self.send(self.request(Method::GET, path).query(query)).await?;
        decode(resp).await
    }

    /// Raw response of an authenticated GET, for non-JSON bodies.
    pub async fn get_raw<Q>(&self, path: &str, query: &Q) -> Result<Response, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(self.request(Method::POST, path).json(body)).await?;
        decode(resp).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(self.request(Method::PUT, path).json(body)).await?;
        decode(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// POST to a public endpoint (login, registration, OTP flows). No bearer is
    /// attached and a 401 is an ordinary rejection, so a failed sign-in attempt
    /// leaves the current session alone.
    pub async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.request(Method::POST, path).json(body).send().await?;
        let resp = reject_failure(resp).await?;
        decode(resp).await
    }

    /// GET with an explicit token, bypassing the stored one and the 401 teardown.
    pub async fn get_json_with_token<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, ApiError> {
        let resp = self
            .request(Method::GET, path)
            .bearer_auth(token)
            .send()
            .await?;
        let resp = reject_failure(resp).await?;
        decode(resp).await
    }
}

async fn read_envelope(resp: Response) -> ErrorEnvelope {
    let body = resp.text().await.unwrap_or_default();
    ErrorEnvelope::from_body(&body)
}

async fn reject_failure(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let envelope = read_envelope(resp).await;
    Err(ApiError::Status { status, envelope })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let body = resp.bytes().await?;
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &body
    };
    Ok(serde_json::from_slice(body)?)
}
