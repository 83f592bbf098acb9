//! Entity graph publication
//!
//! Entities are created one at a time in graph order. A conflict on the
//! service entity means the service already exists and stops publication
//! before anything else is written; any other failure is logged and the
//! remaining entities are still attempted.

use hlofe_gateway::{CreateOutcome, EntityGateway};
use hlofe_types::{ContinuumEntity, EntityGraph, EntityId, ToNgsiLd};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Result of publishing a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every entity was created
    Created,
    /// Some entities were not created
    Incomplete { failed: Vec<EntityId> },
    /// The service entity already existed; nothing was written
    ServiceExists,
}

impl PublishOutcome {
    /// An existing service counts as success, the caller restarts it
    pub fn succeeded(&self) -> bool {
        matches!(self, PublishOutcome::Created | PublishOutcome::ServiceExists)
    }
}

/// Writes compiled graphs to the store
pub struct EntityPublisher {
    gateway: Arc<dyn EntityGateway>,
}

impl EntityPublisher {
    pub fn new(gateway: Arc<dyn EntityGateway>) -> Self {
        Self { gateway }
    }

    #[instrument(skip(self, graph), fields(service_id = %graph.service.id))]
    pub async fn publish(&self, graph: &EntityGraph) -> PublishOutcome {
        let mut failed = Vec::new();

        for entity in graph.entities() {
            let id = entity.id().clone();
            let kind = entity.entity_type();
            let is_service = matches!(entity, ContinuumEntity::Service(_));

            // Bodies may carry registry credentials, log ids only
            match self.gateway.create_entity(entity.to_ngsi_ld()).await {
                Ok(CreateOutcome::Created) => {
                    info!(entity_id = %id, entity_type = kind, "Entity created");
                }
                Ok(CreateOutcome::Conflict) if is_service => {
                    info!(entity_id = %id, "Service already exists, not publishing");
                    return PublishOutcome::ServiceExists;
                }
                Ok(CreateOutcome::Conflict) => {
                    warn!(entity_id = %id, entity_type = kind, "Entity already exists");
                    failed.push(id);
                }
                Err(e) => {
                    error!(entity_id = %id, entity_type = kind, error = %e, "Entity creation failed");
                    failed.push(id);
                }
            }
        }

        if failed.is_empty() {
            info!(entities = graph.entity_count(), "Entity graph published");
            PublishOutcome::Created
        } else {
            warn!(failed = failed.len(), "Entity graph published incompletely");
            PublishOutcome::Incomplete { failed }
        }
    }
}
