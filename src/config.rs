use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use url::Url;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Where the browser starts the provider sign-in.
    pub authorize_url: Url,
    /// Local address the backend redirects back to.
    pub callback_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub token_path: PathBuf,
    pub oauth: OAuthConfig,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_base_url = lookup("FOODKEEPER_API_URL")
            .unwrap_or_else(|| "http://localhost:8080/api".into());
        let api_base_url = Url::parse(&api_base_url)
            .with_context(|| format!("FOODKEEPER_API_URL is not a valid url: {api_base_url}"))?;

        let token_path = match lookup("FOODKEEPER_TOKEN_PATH") {
            Some(path) => PathBuf::from(path),
            None => lookup("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".foodkeeper")
                .join("token.json"),
        };

        let authorize_url = lookup("FOODKEEPER_OAUTH_AUTHORIZE_URL")
            .unwrap_or_else(|| "http://localhost:8080/oauth2/authorize/google".into());
        let authorize_url = Url::parse(&authorize_url).with_context(|| {
            format!("FOODKEEPER_OAUTH_AUTHORIZE_URL is not a valid url: {authorize_url}")
        })?;

        let callback_addr = lookup("FOODKEEPER_OAUTH_CALLBACK_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".into());
        let callback_addr: SocketAddr = callback_addr.parse().with_context(|| {
            format!("FOODKEEPER_OAUTH_CALLBACK_ADDR is not a socket address: {callback_addr}")
        })?;

        Ok(Self {
            api_base_url,
            token_path,
            oauth: OAuthConfig {
                authorize_url,
                callback_addr,
            },
        })
    }
}
