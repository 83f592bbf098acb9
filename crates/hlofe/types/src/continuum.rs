//! Continuum entity model
//!
//! The entities a compiled service is made of. Relationship fields hold plain
//! identifiers; optional fields are `None` when the descriptor did not set
//! them and are left out of the wire payload.

use crate::ids::EntityId;
use crate::secret::Secret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity type names as used by the store
pub mod entity_type {
    pub const SERVICE: &str = "Service";
    pub const SERVICE_COMPONENT: &str = "ServiceComponent";
    pub const INFRASTRUCTURE_ELEMENT_REQUIREMENTS: &str = "InfrastructureElementRequirements";
    pub const NETWORK_PORT: &str = "NetworkPort";
    pub const DOMAIN: &str = "Domain";
}

/// Per-component lifecycle status
///
/// Stored as a relationship to a status entity, hence the URN values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceComponentStatus {
    #[serde(rename = "urn:ngsi-ld:ServiceComponentStatus:Starting")]
    Starting,
    #[serde(rename = "urn:ngsi-ld:ServiceComponentStatus:Running")]
    Running,
    #[serde(rename = "urn:ngsi-ld:ServiceComponentStatus:Overload")]
    Overload,
    #[serde(rename = "urn:ngsi-ld:ServiceComponentStatus:Failed")]
    Failed,
    #[serde(rename = "urn:ngsi-ld:ServiceComponentStatus:Migrating")]
    Migrating,
    #[serde(rename = "urn:ngsi-ld:ServiceComponentStatus:Locating")]
    Locating,
    #[serde(rename = "urn:ngsi-ld:ServiceComponentStatus:Removing")]
    Removing,
    #[serde(rename = "urn:ngsi-ld:ServiceComponentStatus:Finished")]
    Finished,
}

impl ServiceComponentStatus {
    pub const ALL: [ServiceComponentStatus; 8] = [
        ServiceComponentStatus::Starting,
        ServiceComponentStatus::Running,
        ServiceComponentStatus::Overload,
        ServiceComponentStatus::Failed,
        ServiceComponentStatus::Migrating,
        ServiceComponentStatus::Locating,
        ServiceComponentStatus::Removing,
        ServiceComponentStatus::Finished,
    ];

    pub fn urn(&self) -> &'static str {
        match self {
            ServiceComponentStatus::Starting => "urn:ngsi-ld:ServiceComponentStatus:Starting",
            ServiceComponentStatus::Running => "urn:ngsi-ld:ServiceComponentStatus:Running",
            ServiceComponentStatus::Overload => "urn:ngsi-ld:ServiceComponentStatus:Overload",
            ServiceComponentStatus::Failed => "urn:ngsi-ld:ServiceComponentStatus:Failed",
            ServiceComponentStatus::Migrating => "urn:ngsi-ld:ServiceComponentStatus:Migrating",
            ServiceComponentStatus::Locating => "urn:ngsi-ld:ServiceComponentStatus:Locating",
            ServiceComponentStatus::Removing => "urn:ngsi-ld:ServiceComponentStatus:Removing",
            ServiceComponentStatus::Finished => "urn:ngsi-ld:ServiceComponentStatus:Finished",
        }
    }

    pub fn entity_id(&self) -> EntityId {
        EntityId::new(self.urn())
    }

    /// Component is deployed or being deployed
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ServiceComponentStatus::Running | ServiceComponentStatus::Starting
        )
    }

    /// Only terminal-ish components may be reset to `Starting`
    pub fn can_restart(&self) -> bool {
        matches!(
            self,
            ServiceComponentStatus::Failed | ServiceComponentStatus::Finished
        )
    }

    /// Component may be torn down
    pub fn can_remove(&self) -> bool {
        matches!(
            self,
            ServiceComponentStatus::Running | ServiceComponentStatus::Failed
        )
    }
}

impl fmt::Display for ServiceComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.urn())
    }
}

impl FromStr for ServiceComponentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceComponentStatus::ALL
            .into_iter()
            .find(|status| status.urn() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Service-level lifecycle intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceActionType {
    #[serde(rename = "DEPLOYING")]
    Deploying,
    #[serde(rename = "DESTROYING")]
    Destroying,
    #[serde(rename = "DEPLOYED")]
    Deployed,
    #[serde(rename = "FINISHED")]
    Finished,
    /// The deployment engine has consumed the last request
    #[serde(rename = "urn:ngsi-ld:null")]
    Handled,
}

impl ServiceActionType {
    pub const ALL: [ServiceActionType; 5] = [
        ServiceActionType::Deploying,
        ServiceActionType::Destroying,
        ServiceActionType::Deployed,
        ServiceActionType::Finished,
        ServiceActionType::Handled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceActionType::Deploying => "DEPLOYING",
            ServiceActionType::Destroying => "DESTROYING",
            ServiceActionType::Deployed => "DEPLOYED",
            ServiceActionType::Finished => "FINISHED",
            ServiceActionType::Handled => crate::ids::NULL_ID,
        }
    }

    /// Service has been torn down, or is being, and may be purged
    pub fn allows_purge(&self) -> bool {
        matches!(
            self,
            ServiceActionType::Finished
                | ServiceActionType::Handled
                | ServiceActionType::Destroying
        )
    }
}

impl fmt::Display for ServiceActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceActionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceActionType::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Unrecognized enumeration value read from the store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value `{0}`")]
pub struct UnknownVariant(pub String);

/// A deployed service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    /// Domain that handles the service; unset when no local domain is known
    pub domain_handler: Option<EntityId>,
    pub action_type: ServiceActionType,
    pub has_overlay: bool,
}

/// `{key, value}` pair for container arguments and environment
///
/// Values are always text; an empty YAML value becomes an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// One deployable component of a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceComponent {
    pub id: EntityId,
    pub service: EntityId,
    /// Hosting element, set by the placement engine after allocation
    pub infrastructure_element: Option<EntityId>,
    pub service_component_status: ServiceComponentStatus,
    pub infrastructure_element_requirements: EntityId,
    pub network_ports: Vec<EntityId>,
    pub container_image: String,
    pub cli_args: Vec<KeyValue>,
    pub env_vars: Vec<KeyValue>,
    pub expose_ports: bool,
    pub is_job: bool,
    pub is_private: bool,
    pub repo_username: Option<String>,
    pub repo_password: Option<Secret>,
}

/// Polygon area, GeoJSON shaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

impl Area {
    /// Single-ring polygon
    pub fn polygon(ring: Vec<Vec<f64>>) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: vec![ring],
        }
    }
}

/// Placement constraints of one component
///
/// Either `infrastructure_element` is non-empty and the capability fields are
/// all `None`, or the element list is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureElementRequirements {
    pub id: EntityId,
    pub infrastructure_element: Vec<EntityId>,
    /// Percentage, 0 to 100
    pub required_cpu_usage: Option<u32>,
    /// Megabytes
    pub required_ram: Option<u64>,
    pub cpu_architecture: Option<EntityId>,
    pub real_time_capable: Option<bool>,
    /// Percentage, 0 to 100
    pub energy_efficiency_ratio: Option<u32>,
    /// Percentage, 0 to 100
    pub green_energy_ratio: Option<u32>,
    pub domain_id: Option<EntityId>,
    pub area: Option<Area>,
}

impl InfrastructureElementRequirements {
    pub fn targeting(id: EntityId, elements: Vec<EntityId>) -> Self {
        Self {
            id,
            infrastructure_element: elements,
            ..Default::default()
        }
    }

    pub fn has_capability_fields(&self) -> bool {
        self.required_cpu_usage.is_some()
            || self.required_ram.is_some()
            || self.cpu_architecture.is_some()
            || self.real_time_capable.is_some()
            || self.energy_efficiency_ratio.is_some()
            || self.green_energy_ratio.is_some()
            || self.domain_id.is_some()
            || self.area.is_some()
    }
}

/// A container port exposed by a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPort {
    pub id: EntityId,
    pub port_number: u16,
    pub port_protocol: String,
}

/// Any entity of a compiled graph
#[derive(Debug, Clone, PartialEq)]
pub enum ContinuumEntity {
    Service(Service),
    ServiceComponent(ServiceComponent),
    InfrastructureElementRequirements(InfrastructureElementRequirements),
    NetworkPort(NetworkPort),
}

impl ContinuumEntity {
    pub fn id(&self) -> &EntityId {
        match self {
            ContinuumEntity::Service(e) => &e.id,
            ContinuumEntity::ServiceComponent(e) => &e.id,
            ContinuumEntity::InfrastructureElementRequirements(e) => &e.id,
            ContinuumEntity::NetworkPort(e) => &e.id,
        }
    }

    pub fn entity_type(&self) -> &'static str {
        match self {
            ContinuumEntity::Service(_) => entity_type::SERVICE,
            ContinuumEntity::ServiceComponent(_) => entity_type::SERVICE_COMPONENT,
            ContinuumEntity::InfrastructureElementRequirements(_) => {
                entity_type::INFRASTRUCTURE_ELEMENT_REQUIREMENTS
            }
            ContinuumEntity::NetworkPort(_) => entity_type::NETWORK_PORT,
        }
    }
}

/// Compiled entity graph of one service
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGraph {
    pub service: Service,
    pub components: Vec<ServiceComponent>,
    pub requirements: Vec<InfrastructureElementRequirements>,
    pub network_ports: Vec<NetworkPort>,
}

impl EntityGraph {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            components: Vec::new(),
            requirements: Vec::new(),
            network_ports: Vec::new(),
        }
    }

    /// Entities in publication order: the service, then ports and
    /// requirements, then the components that reference them
    pub fn entities(&self) -> impl Iterator<Item = ContinuumEntity> + '_ {
        std::iter::once(ContinuumEntity::Service(self.service.clone()))
            .chain(
                self.network_ports
                    .iter()
                    .cloned()
                    .map(ContinuumEntity::NetworkPort),
            )
            .chain(
                self.requirements
                    .iter()
                    .cloned()
                    .map(ContinuumEntity::InfrastructureElementRequirements),
            )
            .chain(
                self.components
                    .iter()
                    .cloned()
                    .map(ContinuumEntity::ServiceComponent),
            )
    }

    pub fn entity_count(&self) -> usize {
        1 + self.components.len() + self.requirements.len() + self.network_ports.len()
    }
}
