//! Entities as read back from the store
//!
//! Queries use the simplified representation, where a relationship is either
//! a bare target id or, when the store expands it, the target entity itself.
//! Both forms are accepted here and normalized to identifiers.

use crate::continuum::{entity_type, ServiceActionType, ServiceComponentStatus};
use crate::de::{null_as_default, OneOrMany};
use crate::ids::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A relationship value in simplified form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    Reference(EntityId),
    Embedded(EmbeddedEntity),
}

/// Related entity inlined into a relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedEntity {
    pub id: EntityId,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Link {
    pub fn id(&self) -> &EntityId {
        match self {
            Link::Reference(id) => id,
            Link::Embedded(entity) => &entity.id,
        }
    }

    /// Collapse to a plain reference
    pub fn normalize(self) -> EntityId {
        match self {
            Link::Reference(id) => id,
            Link::Embedded(entity) => entity.id,
        }
    }
}

/// Identifier of a link unless it is the null sentinel
fn resolved(link: Option<&Link>) -> Option<EntityId> {
    link.map(Link::id).filter(|id| !id.is_null()).cloned()
}

/// Service entity, only the fields lifecycle decisions need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: EntityId,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub action_type: Option<String>,

    #[serde(default)]
    pub domain_handler: Option<Link>,
}

impl ServiceRecord {
    pub fn is_service(&self) -> bool {
        self.kind.as_deref() == Some(entity_type::SERVICE)
    }

    /// Parsed action; `None` when absent or not a known value
    pub fn action(&self) -> Option<ServiceActionType> {
        self.action_type.as_deref()?.parse().ok()
    }

    pub fn domain_handler(&self) -> Option<EntityId> {
        resolved(self.domain_handler.as_ref())
    }
}

/// Service component entity as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: EntityId,

    #[serde(default)]
    pub service: Option<Link>,

    #[serde(default)]
    pub service_component_status: Option<Link>,

    #[serde(default)]
    pub infrastructure_element_requirements: Option<Link>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub network_ports: OneOrMany<Link>,
}

impl ComponentRecord {
    /// Parsed status; unknown values read as `None`
    pub fn status(&self) -> Option<ServiceComponentStatus> {
        self.service_component_status
            .as_ref()
            .map(Link::id)
            .and_then(|id| id.as_str().parse().ok())
    }

    pub fn requirements_id(&self) -> Option<EntityId> {
        resolved(self.infrastructure_element_requirements.as_ref())
    }

    pub fn network_port_ids(&self) -> Vec<EntityId> {
        self.network_ports
            .clone()
            .into_vec()
            .into_iter()
            .map(Link::normalize)
            .filter(|id| !id.is_null())
            .collect()
    }
}

/// One row of the service status listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatusEntry {
    pub id: EntityId,

    #[serde(rename = "type")]
    pub kind: String,

    pub service_component_status: Option<String>,
}

impl From<&ComponentRecord> for ComponentStatusEntry {
    fn from(record: &ComponentRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: entity_type::SERVICE_COMPONENT.to_string(),
            service_component_status: record
                .service_component_status
                .as_ref()
                .map(|link| link.id().to_string()),
        }
    }
}
