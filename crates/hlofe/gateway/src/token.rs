//! Bearer tokens for the entity store
//!
//! Tokens are issued by the token shim running next to the broker. The shim
//! is asked once and the answer cached until the store rejects it.

use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Source of the bearer token sent to the store
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current token; `None` means requests go out unauthenticated
    async fn token(&self) -> Result<Option<String>>;

    /// Drop any cached token after the store refused it
    async fn invalidate(&self) {}
}

/// No authentication
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

#[async_trait]
impl TokenProvider for NoToken {
    async fn token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Fixed token from configuration
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Token shim client (`GET {base}/token/cb`)
pub struct ShimTokenProvider {
    client: reqwest::Client,
    url: String,
    cached: RwLock<Option<String>>,
}

impl ShimTokenProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/token/cb", base_url.trim_end_matches('/')),
            cached: RwLock::new(None),
        })
    }

    async fn fetch(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GatewayError::Token(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Token(format!(
                "token shim answered {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Token(e.to_string()))?;

        match body.token.filter(|token| !token.is_empty()) {
            Some(token) => Ok(Some(token)),
            None => {
                info!(url = %self.url, "Token value not found in shim response");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TokenProvider for ShimTokenProvider {
    async fn token(&self) -> Result<Option<String>> {
        if let Some(token) = self.cached.read().await.clone() {
            return Ok(Some(token));
        }

        let token = self.fetch().await?;
        if token.is_some() {
            debug!(url = %self.url, "Cached store token");
            *self.cached.write().await = token.clone();
        }
        Ok(token)
    }

    async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
