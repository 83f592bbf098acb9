//! Entity store gateway contract
//!
//! The gateway is the only source of truth for service state. Nothing is
//! cached between calls; every existence or status check goes to the store.

use crate::error::Result;
use crate::query::QueryParams;
use async_trait::async_trait;
use hlofe_types::{entity_type, ComponentRecord, EntityId, ServiceRecord};
use serde_json::Value;
use tracing::warn;

/// Result of a create call that reached the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// An entity with the same id already exists
    Conflict,
}

/// Create, query, patch and delete against the entity store
#[async_trait]
pub trait EntityGateway: Send + Sync {
    /// Fetch one entity; `None` when it does not exist
    async fn query_entity(&self, id: &EntityId, params: &QueryParams) -> Result<Option<Value>>;

    /// Fetch every entity matching `params`
    async fn query_entities(&self, params: &QueryParams) -> Result<Vec<Value>>;

    /// Create an entity; the body carries its `id` and `type`
    async fn create_entity(&self, entity: Value) -> Result<CreateOutcome>;

    /// Merge attributes into an existing entity, returning the status code
    async fn patch_entity(&self, id: &EntityId, fragment: Value) -> Result<u16>;

    /// Delete an entity, returning the status code
    ///
    /// Empty or non-URN ids are rejected before any request is made.
    async fn delete_entity(&self, id: &EntityId) -> Result<u16>;
}

/// Entities requested per page by [`query_all`]
pub const PAGE_SIZE: usize = 100;

/// Fetch every entity matching `params`, one page at a time
///
/// Brokers cap unpaged queries at a default page size, so listings that must
/// be complete go through here. Paging stops at the first short page.
pub async fn query_all(
    gateway: &dyn EntityGateway,
    params: &QueryParams,
    page_size: usize,
) -> Result<Vec<Value>> {
    let page_size = page_size.max(1);
    let mut rows = Vec::new();
    loop {
        let page = params.clone().page(page_size, rows.len());
        let batch = gateway.query_entities(&page).await?;
        let done = batch.len() < page_size;
        rows.extend(batch);
        if done {
            return Ok(rows);
        }
    }
}

/// Read the service entity; `None` when absent or not a service
pub async fn fetch_service(
    gateway: &dyn EntityGateway,
    service_id: &EntityId,
) -> Result<Option<ServiceRecord>> {
    let Some(body) = gateway.query_entity(service_id, &QueryParams::new()).await? else {
        return Ok(None);
    };
    let record: ServiceRecord = serde_json::from_value(body)?;
    Ok(record.is_service().then_some(record))
}

/// Read every component whose `service` relationship points at `service_id`
///
/// Rows that cannot be read as components are skipped with a warning.
pub async fn fetch_components(
    gateway: &dyn EntityGateway,
    service_id: &EntityId,
) -> Result<Vec<ComponentRecord>> {
    let params = QueryParams::new()
        .of_type(entity_type::SERVICE_COMPONENT)
        .where_eq("service", service_id.as_str());

    let rows = query_all(gateway, &params, PAGE_SIZE).await?;
    let mut components = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<ComponentRecord>(row) {
            Ok(record) => components.push(record),
            Err(e) => warn!(
                service_id = %service_id,
                error = %e,
                "Skipping unreadable service component"
            ),
        }
    }
    Ok(components)
}
