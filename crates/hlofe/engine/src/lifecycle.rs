//! Lifecycle Controller - Service lifecycle operations
//!
//! Drives the two state axes of a service: the service action
//! (`DEPLOYING`, `DESTROYING`, ...) and the status of each component. All
//! state is read from the store at the start of an operation; nothing is
//! remembered between calls except a per-service lock that serializes
//! operations on the same service within this process.

use crate::compiler::EntityCompiler;
use crate::error::{LifecycleError, Result};
use crate::notify::{notify_best_effort, Notifier};
use crate::publisher::{EntityPublisher, PublishOutcome};
use dashmap::DashMap;
use hlofe_gateway::{fetch_components, fetch_service, DomainResolver, EntityGateway};
use hlofe_types::{
    component_status_patch, parse_descriptor, service_action_patch, ComponentRecord,
    ComponentStatusEntry, Descriptor, EntityId, ServiceActionType, ServiceComponentStatus,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};

/// Result of an allocate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocateOutcome {
    /// A component is already running or starting; nothing was done
    AlreadyActive,
    /// The entity graph was published
    Allocated,
    /// The service already existed and was reset for redeployment
    Restarted { reset: usize },
    /// Some entities could not be created; no notification was sent
    Incomplete { failed: Vec<EntityId> },
}

/// Result of a re-allocate request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReallocateOutcome {
    AlreadyActive,
    Restarted { reset: usize },
}

/// Components moved to `LOCATING` by an update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub relocated: Vec<EntityId>,
}

/// Components moved to `REMOVING` by a deallocate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeallocateReport {
    pub removing: Vec<EntityId>,
    /// Whether the service action was set to `DESTROYING`
    pub service_updated: bool,
}

/// Entities removed by a purge, in deletion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub deleted: Vec<EntityId>,
    pub failed: Vec<EntityId>,
}

impl PurgeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates allocate, re-allocate, update, deallocate and purge
pub struct LifecycleController {
    gateway: Arc<dyn EntityGateway>,
    domains: Arc<dyn DomainResolver>,
    notifier: Arc<dyn Notifier>,
    compiler: EntityCompiler,
    publisher: EntityPublisher,
    locks: DashMap<EntityId, Arc<Mutex<()>>>,
}

impl LifecycleController {
    pub fn new(
        gateway: Arc<dyn EntityGateway>,
        domains: Arc<dyn DomainResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            compiler: EntityCompiler::new(domains.clone()),
            publisher: EntityPublisher::new(gateway.clone()),
            gateway,
            domains,
            notifier,
            locks: DashMap::new(),
        }
    }

    /// Serialize operations on one service
    async fn lock(&self, service_id: &EntityId) -> ServiceLock<'_> {
        let lock = Arc::clone(&self.locks.entry(service_id.clone()).or_default());
        ServiceLock {
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
            service_id: service_id.clone(),
        }
    }

    /// Whether the store holds a service with this id
    pub async fn service_exists(&self, service_id: &EntityId) -> Result<bool> {
        service_id.validate()?;
        Ok(fetch_service(self.gateway.as_ref(), service_id)
            .await?
            .is_some())
    }

    /// Compile and publish a service unless it is already active
    #[instrument(skip(self, descriptor), fields(service_id = %service_id))]
    pub async fn allocate(
        &self,
        service_id: &EntityId,
        descriptor: &Descriptor,
    ) -> Result<AllocateOutcome> {
        service_id.validate()?;
        let _guard = self.lock(service_id).await;

        if fetch_service(self.gateway.as_ref(), service_id).await?.is_some() {
            let components = fetch_components(self.gateway.as_ref(), service_id).await?;
            if any_active(&components) {
                info!("Service already active, allocation skipped");
                return Ok(AllocateOutcome::AlreadyActive);
            }
        }

        let graph = self
            .compiler
            .compile(service_id, descriptor)
            .await
            .map_err(|e| {
                error!(error = %e, "Descriptor could not be compiled");
                LifecycleError::from(e)
            })?;

        match self.publisher.publish(&graph).await {
            PublishOutcome::Created => {
                notify_best_effort(self.notifier.as_ref(), service_id).await;
                info!(components = graph.components.len(), "Service allocated");
                Ok(AllocateOutcome::Allocated)
            }
            PublishOutcome::ServiceExists => {
                let components = fetch_components(self.gateway.as_ref(), service_id).await?;
                let reset = self.restart(service_id, &components).await;
                notify_best_effort(self.notifier.as_ref(), service_id).await;
                info!(reset, "Existing service restarted");
                Ok(AllocateOutcome::Restarted { reset })
            }
            PublishOutcome::Incomplete { failed } => {
                error!(failed = failed.len(), "Service allocation incomplete, not notifying");
                Ok(AllocateOutcome::Incomplete { failed })
            }
        }
    }

    /// Redeploy an existing service whose components have all stopped
    #[instrument(skip(self), fields(service_id = %service_id))]
    pub async fn reallocate(&self, service_id: &EntityId) -> Result<ReallocateOutcome> {
        service_id.validate()?;
        let _guard = self.lock(service_id).await;

        if fetch_service(self.gateway.as_ref(), service_id).await?.is_none() {
            return Err(LifecycleError::NotFound(service_id.clone()));
        }

        let components = fetch_components(self.gateway.as_ref(), service_id).await?;
        if any_active(&components) {
            info!("Service already active, re-allocation skipped");
            return Ok(ReallocateOutcome::AlreadyActive);
        }

        let reset = self.restart(service_id, &components).await;
        notify_best_effort(self.notifier.as_ref(), service_id).await;
        info!(reset, "Service re-allocated");
        Ok(ReallocateOutcome::Restarted { reset })
    }

    /// Mark the components named by a new descriptor for relocation
    #[instrument(skip(self, descriptor_text), fields(service_id = %service_id))]
    pub async fn update(&self, service_id: &EntityId, descriptor_text: &str) -> Result<UpdateReport> {
        service_id.validate()?;
        let descriptor = parse_descriptor(descriptor_text)?;
        let _guard = self.lock(service_id).await;

        if fetch_service(self.gateway.as_ref(), service_id).await?.is_none() {
            return Err(LifecycleError::NotFound(service_id.clone()));
        }

        let existing: HashSet<EntityId> = fetch_components(self.gateway.as_ref(), service_id)
            .await?
            .into_iter()
            .map(|component| component.id)
            .collect();

        let mut report = UpdateReport::default();
        for (name, _) in descriptor.supported_components() {
            let id = EntityId::component(service_id, name);
            if !existing.contains(&id) {
                debug!(component_id = %id, "Component not deployed, skipping");
                continue;
            }
            let patch = component_status_patch(ServiceComponentStatus::Locating);
            match self.gateway.patch_entity(&id, patch).await {
                Ok(_) => report.relocated.push(id),
                Err(e) => warn!(component_id = %id, error = %e, "Failed to mark component for relocation"),
            }
        }

        notify_best_effort(self.notifier.as_ref(), service_id).await;
        info!(relocated = report.relocated.len(), "Service updated");
        Ok(report)
    }

    /// Tear down a service once every component is running or failed
    #[instrument(skip(self), fields(service_id = %service_id))]
    pub async fn deallocate(&self, service_id: &EntityId) -> Result<DeallocateReport> {
        service_id.validate()?;
        let _guard = self.lock(service_id).await;

        if fetch_service(self.gateway.as_ref(), service_id).await?.is_none() {
            return Err(LifecycleError::NotFound(service_id.clone()));
        }

        let components = fetch_components(self.gateway.as_ref(), service_id).await?;
        let blocking: Vec<String> = components
            .iter()
            .filter(|component| !component.status().is_some_and(|s| s.can_remove()))
            .map(|component| component.id.to_string())
            .collect();
        if !blocking.is_empty() {
            warn!(blocking = blocking.len(), "Deallocation refused");
            return Err(LifecycleError::Precondition(format!(
                "components not running or failed: {}",
                blocking.join(", ")
            )));
        }

        let mut report = DeallocateReport::default();
        for component in &components {
            let patch = component_status_patch(ServiceComponentStatus::Removing);
            match self.gateway.patch_entity(&component.id, patch).await {
                Ok(_) => report.removing.push(component.id.clone()),
                Err(e) => warn!(component_id = %component.id, error = %e, "Failed to mark component for removal"),
            }
        }

        let patch = service_action_patch(ServiceActionType::Destroying, None);
        match self.gateway.patch_entity(service_id, patch).await {
            Ok(_) => report.service_updated = true,
            Err(e) => error!(error = %e, "Failed to set service action"),
        }

        notify_best_effort(self.notifier.as_ref(), service_id).await;
        info!(removing = report.removing.len(), "Service deallocation requested");
        Ok(report)
    }

    /// Delete a torn-down service and every entity derived from it
    #[instrument(skip(self), fields(service_id = %service_id))]
    pub async fn purge(&self, service_id: &EntityId) -> Result<PurgeReport> {
        service_id.validate()?;
        let _guard = self.lock(service_id).await;

        let service = fetch_service(self.gateway.as_ref(), service_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(service_id.clone()))?;

        if !service.action().is_some_and(|action| action.allows_purge()) {
            return Err(LifecycleError::Precondition(format!(
                "service action is {}, expected FINISHED, HANDLED or DESTROYING",
                service.action_type.as_deref().unwrap_or("unset")
            )));
        }

        let components = fetch_components(self.gateway.as_ref(), service_id).await?;
        let mut seen = HashSet::new();
        let mut ports = Vec::new();
        let mut requirements = Vec::new();
        for component in &components {
            for port in component.network_port_ids() {
                if seen.insert(port.clone()) {
                    ports.push(port);
                }
            }
            if let Some(id) = component.requirements_id() {
                if seen.insert(id.clone()) {
                    requirements.push(id);
                }
            }
        }
        let component_ids = components
            .into_iter()
            .map(|component| component.id)
            .filter(|id| seen.insert(id.clone()));

        let mut report = PurgeReport::default();
        let order = std::iter::once(service_id.clone())
            .chain(ports)
            .chain(requirements)
            .chain(component_ids);
        for id in order {
            match self.gateway.delete_entity(&id).await {
                Ok(_) => report.deleted.push(id),
                Err(e) => {
                    warn!(entity_id = %id, error = %e, "Failed to delete entity");
                    report.failed.push(id);
                }
            }
        }

        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Service purged"
        );
        Ok(report)
    }

    /// Every component of the service with its current status
    #[instrument(skip(self), fields(service_id = %service_id))]
    pub async fn service_status(&self, service_id: &EntityId) -> Result<Vec<ComponentStatusEntry>> {
        service_id.validate()?;

        if fetch_service(self.gateway.as_ref(), service_id).await?.is_none() {
            return Err(LifecycleError::NotFound(service_id.clone()));
        }

        let components = fetch_components(self.gateway.as_ref(), service_id).await?;
        Ok(components.iter().map(ComponentStatusEntry::from).collect())
    }

    /// Reset stopped components and ask for deployment again
    async fn restart(&self, service_id: &EntityId, components: &[ComponentRecord]) -> usize {
        let mut reset = 0;
        for component in components
            .iter()
            .filter(|component| component.status().is_some_and(|s| s.can_restart()))
        {
            let patch = component_status_patch(ServiceComponentStatus::Starting);
            match self.gateway.patch_entity(&component.id, patch).await {
                Ok(_) => reset += 1,
                Err(e) => warn!(component_id = %component.id, error = %e, "Failed to reset component"),
            }
        }

        let domain = match self.domains.local_domain().await {
            Ok(domain) => domain,
            Err(e) => {
                warn!(error = %e, "Local domain lookup failed, keeping previous handler");
                None
            }
        };

        let patch = service_action_patch(ServiceActionType::Deploying, domain.as_ref());
        if let Err(e) = self.gateway.patch_entity(service_id, patch).await {
            error!(error = %e, "Failed to set service action");
        }
        reset
    }
}

/// Held for the duration of one operation on a service
///
/// On release the map entry is dropped once no other caller holds or awaits
/// the same mutex, so the map only tracks services with operations in flight.
struct ServiceLock<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<EntityId, Arc<Mutex<()>>>,
    service_id: EntityId,
}

impl Drop for ServiceLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.service_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn any_active(components: &[ComponentRecord]) -> bool {
    components
        .iter()
        .any(|component| component.status().is_some_and(|s| s.is_active()))
}
