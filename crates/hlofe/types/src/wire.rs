//! NGSI-LD wire form
//!
//! Scalars are framed as `{"type":"Property","value":v}` and references as
//! `{"type":"Relationship","object":id}`. Unset optionals, null references
//! and empty reference lists are never written, so a create or patch does
//! not clobber values another component already stored.

use crate::continuum::{
    entity_type, Area, ContinuumEntity, InfrastructureElementRequirements, KeyValue, NetworkPort,
    Service, ServiceActionType, ServiceComponent, ServiceComponentStatus,
};
use crate::ids::EntityId;
use serde_json::{json, Map, Value};

/// Builder for an entity or patch body
#[derive(Debug, Clone, Default)]
pub struct Payload {
    attrs: Map<String, Value>,
}

impl Payload {
    /// Full entity body with `id` and `type`
    pub fn entity(id: &EntityId, kind: &str) -> Self {
        let mut attrs = Map::new();
        attrs.insert("id".to_string(), Value::String(id.to_string()));
        attrs.insert("type".to_string(), Value::String(kind.to_string()));
        Self { attrs }
    }

    /// Attribute fragment for a patch
    pub fn patch() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(
            name.to_string(),
            json!({ "type": "Property", "value": value.into() }),
        );
        self
    }

    pub fn optional_property<T: Into<Value>>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.property(name, value),
            None => self,
        }
    }

    pub fn geo_property(mut self, name: &str, area: &Area) -> Self {
        self.attrs.insert(
            name.to_string(),
            json!({
                "type": "GeoProperty",
                "value": { "type": area.kind, "coordinates": area.coordinates },
            }),
        );
        self
    }

    /// Reference to another entity; the null sentinel is skipped
    pub fn relationship(mut self, name: &str, target: &EntityId) -> Self {
        if !target.is_null() {
            self.attrs.insert(name.to_string(), relationship_object(target));
        }
        self
    }

    pub fn optional_relationship(self, name: &str, target: Option<&EntityId>) -> Self {
        match target {
            Some(target) => self.relationship(name, target),
            None => self,
        }
    }

    /// One relationship object per element; an empty list is skipped
    pub fn relationships(mut self, name: &str, targets: &[EntityId]) -> Self {
        let objects: Vec<Value> = targets
            .iter()
            .filter(|id| !id.is_null())
            .map(relationship_object)
            .collect();
        if !objects.is_empty() {
            self.attrs.insert(name.to_string(), Value::Array(objects));
        }
        self
    }

    /// `[{key, value}]` list property; an empty list is skipped
    pub fn key_values(self, name: &str, pairs: &[KeyValue]) -> Self {
        if pairs.is_empty() {
            return self;
        }
        let list: Vec<Value> = pairs
            .iter()
            .map(|pair| json!({ "key": pair.key, "value": pair.value }))
            .collect();
        self.property(name, Value::Array(list))
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.attrs)
    }
}

fn relationship_object(target: &EntityId) -> Value {
    json!({ "type": "Relationship", "object": target.as_str() })
}

/// Conversion of a continuum entity to its store body
pub trait ToNgsiLd {
    fn to_ngsi_ld(&self) -> Value;
}

impl ToNgsiLd for Service {
    fn to_ngsi_ld(&self) -> Value {
        Payload::entity(&self.id, entity_type::SERVICE)
            .property("name", self.name.as_str())
            .property("description", self.description.as_str())
            .optional_relationship("domainHandler", self.domain_handler.as_ref())
            .property("actionType", self.action_type.as_str())
            .property("hasOverlay", self.has_overlay)
            .into_value()
    }
}

impl ToNgsiLd for ServiceComponent {
    fn to_ngsi_ld(&self) -> Value {
        Payload::entity(&self.id, entity_type::SERVICE_COMPONENT)
            .optional_relationship("infrastructureElement", self.infrastructure_element.as_ref())
            .relationship("service", &self.service)
            .relationship(
                "serviceComponentStatus",
                &self.service_component_status.entity_id(),
            )
            .optional_property(
                "containerImage",
                Some(self.container_image.as_str()).filter(|image| !image.is_empty()),
            )
            .relationship(
                "infrastructureElementRequirements",
                &self.infrastructure_element_requirements,
            )
            .relationships("networkPorts", &self.network_ports)
            .key_values("cliArgs", &self.cli_args)
            .key_values("envVars", &self.env_vars)
            .property("exposePorts", self.expose_ports)
            .property("isJob", self.is_job)
            .property("isPrivate", self.is_private)
            .optional_property("repoUsername", self.repo_username.as_deref())
            .optional_property(
                "repoPassword",
                self.repo_password
                    .as_ref()
                    .filter(|secret| !secret.is_empty())
                    .map(|secret| secret.expose()),
            )
            .into_value()
    }
}

impl ToNgsiLd for InfrastructureElementRequirements {
    fn to_ngsi_ld(&self) -> Value {
        let payload = Payload::entity(&self.id, entity_type::INFRASTRUCTURE_ELEMENT_REQUIREMENTS)
            .relationships("infrastructureElement", &self.infrastructure_element)
            .optional_property("requiredCpuUsage", self.required_cpu_usage)
            .optional_property("requiredRam", self.required_ram)
            .optional_relationship("cpuArchitecture", self.cpu_architecture.as_ref())
            .optional_property("realTimeCapable", self.real_time_capable)
            .optional_property("energyEfficiencyRatio", self.energy_efficiency_ratio)
            .optional_property("greenEnergyRatio", self.green_energy_ratio)
            .optional_relationship("domainId", self.domain_id.as_ref());

        match &self.area {
            Some(area) => payload.geo_property("area", area),
            None => payload,
        }
        .into_value()
    }
}

impl ToNgsiLd for NetworkPort {
    fn to_ngsi_ld(&self) -> Value {
        Payload::entity(&self.id, entity_type::NETWORK_PORT)
            .property("portNumber", self.port_number)
            .property("portProtocol", self.port_protocol.as_str())
            .into_value()
    }
}

impl ToNgsiLd for ContinuumEntity {
    fn to_ngsi_ld(&self) -> Value {
        match self {
            ContinuumEntity::Service(e) => e.to_ngsi_ld(),
            ContinuumEntity::ServiceComponent(e) => e.to_ngsi_ld(),
            ContinuumEntity::InfrastructureElementRequirements(e) => e.to_ngsi_ld(),
            ContinuumEntity::NetworkPort(e) => e.to_ngsi_ld(),
        }
    }
}

/// Patch body moving a component to `status`
pub fn component_status_patch(status: ServiceComponentStatus) -> Value {
    Payload::patch()
        .relationship("serviceComponentStatus", &status.entity_id())
        .into_value()
}

/// Patch body setting the service action, and the handling domain if known
pub fn service_action_patch(action: ServiceActionType, domain_handler: Option<&EntityId>) -> Value {
    Payload::patch()
        .property("actionType", action.as_str())
        .optional_relationship("domainHandler", domain_handler)
        .into_value()
}
