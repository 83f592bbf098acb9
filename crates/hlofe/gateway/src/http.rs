//! NGSI-LD REST client
//!
//! Talks to `{base_url}/{api_path}entities`. Reads and writes use separate
//! timeouts: queries may fan out across federated brokers and are given more
//! time than single-entity writes.

use crate::error::{GatewayError, Result};
use crate::gateway::{CreateOutcome, EntityGateway};
use crate::query::QueryParams;
use crate::token::TokenProvider;
use async_trait::async_trait;
use hlofe_types::EntityId;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Header asking the broker to resolve entities across the federation
pub const FEDERATION_HEADER: &str = "aerios";

/// Connection settings for [`NgsiLdClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    /// Path of the API root, e.g. `ngsi-ld/v1/`
    pub api_path: String,
    pub query_timeout: Duration,
    pub write_timeout: Duration,
    pub federation: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1026".to_string(),
            api_path: "ngsi-ld/v1/".to_string(),
            query_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(1),
            federation: true,
        }
    }
}

/// HTTP implementation of [`EntityGateway`]
pub struct NgsiLdClient {
    client: Client,
    entities_url: Url,
    settings: ClientSettings,
    tokens: Arc<dyn TokenProvider>,
}

impl NgsiLdClient {
    pub fn new(settings: ClientSettings, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if settings.federation {
            headers.insert(FEDERATION_HEADER, HeaderValue::from_static("true"));
        }

        let client = Client::builder().default_headers(headers).build()?;

        let raw = format!(
            "{}/{}entities",
            settings.base_url.trim_end_matches('/'),
            settings.api_path.trim_start_matches('/')
        );
        let entities_url =
            Url::parse(&raw).map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if entities_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(raw));
        }

        Ok(Self {
            client,
            entities_url,
            settings,
            tokens,
        })
    }

    pub fn entities_url(&self) -> &str {
        self.entities_url.as_str()
    }

    /// `{entities}/{id}` with the id percent-encoded as one path segment
    fn entity_url(&self, id: &EntityId) -> Result<Url> {
        let mut url = self.entities_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.entities_url.to_string()))?
            .push(id.as_str());
        Ok(url)
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match self.tokens.token().await? {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Ok(request),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).await?.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        Ok(response)
    }

    async fn rejected(response: Response) -> GatewayError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        GatewayError::Rejected { status, message }
    }
}

#[async_trait]
impl EntityGateway for NgsiLdClient {
    #[instrument(skip(self, params), fields(entity_id = %id))]
    async fn query_entity(&self, id: &EntityId, params: &QueryParams) -> Result<Option<Value>> {
        id.validate()?;
        let request = self
            .client
            .get(self.entity_url(id)?)
            .query(&params.to_pairs())
            .timeout(self.settings.query_timeout);

        let response = self.send(request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(Self::rejected(response).await),
        }
    }

    #[instrument(skip(self, params), fields(query = %params))]
    async fn query_entities(&self, params: &QueryParams) -> Result<Vec<Value>> {
        let request = self
            .client
            .get(self.entities_url.clone())
            .query(&params.to_pairs())
            .timeout(self.settings.query_timeout);

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        Ok(response.json().await?)
    }

    async fn create_entity(&self, entity: Value) -> Result<CreateOutcome> {
        let id = entity
            .get("id")
            .and_then(Value::as_str)
            .map(EntityId::new)
            .unwrap_or_default();
        debug!(entity_id = %id, "Creating entity");

        let request = self
            .client
            .post(self.entities_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&entity)
            .timeout(self.settings.write_timeout);

        let response = self.send(request).await?;
        match response.status() {
            StatusCode::CONFLICT => Ok(CreateOutcome::Conflict),
            status if status.is_success() => Ok(CreateOutcome::Created),
            _ => Err(Self::rejected(response).await),
        }
    }

    async fn patch_entity(&self, id: &EntityId, fragment: Value) -> Result<u16> {
        id.validate()?;
        let request = self
            .client
            .patch(self.entity_url(id)?)
            .header(CONTENT_TYPE, "application/json")
            .json(&fragment)
            .timeout(self.settings.write_timeout);

        let response = self.send(request).await?;
        if !response.status().is_success() {
            warn!(entity_id = %id, status = %response.status(), "Patch rejected");
            return Err(Self::rejected(response).await);
        }
        Ok(response.status().as_u16())
    }

    async fn delete_entity(&self, id: &EntityId) -> Result<u16> {
        id.validate()?;
        let request = self
            .client
            .delete(self.entity_url(id)?)
            .timeout(self.settings.write_timeout);

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        Ok(response.status().as_u16())
    }
}
