//! Local domain lookup

use crate::error::Result;
use crate::gateway::EntityGateway;
use crate::query::QueryParams;
use async_trait::async_trait;
use hlofe_types::{entity_type, EntityId};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Finds the domain this front end serves
#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// Id of the single locally registered domain, if any
    async fn local_domain(&self) -> Result<Option<EntityId>>;
}

/// Asks the store for the domain registered as local on the broker
pub struct StoreDomainResolver {
    gateway: Arc<dyn EntityGateway>,
}

impl StoreDomainResolver {
    pub fn new(gateway: Arc<dyn EntityGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl DomainResolver for StoreDomainResolver {
    async fn local_domain(&self) -> Result<Option<EntityId>> {
        let params = QueryParams::new()
            .of_type(entity_type::DOMAIN)
            .attr("publicUrl")
            .local();

        // A broker only has its own domain registered locally
        let domain = self
            .gateway
            .query_entities(&params)
            .await?
            .into_iter()
            .next()
            .and_then(|row| row.get("id").and_then(Value::as_str).map(EntityId::new));

        debug!(domain = ?domain, "Resolved local domain");
        Ok(domain)
    }
}

/// Domain fixed by configuration
#[derive(Debug, Clone, Default)]
pub struct FixedDomain(pub Option<EntityId>);

#[async_trait]
impl DomainResolver for FixedDomain {
    async fn local_domain(&self) -> Result<Option<EntityId>> {
        Ok(self.0.clone())
    }
}
