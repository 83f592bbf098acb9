//! Service descriptor model
//!
//! A descriptor is the TOSCA-style YAML document a client submits to deploy a
//! service. Field names follow the document (`node_templates`, `isJob`,
//! `node_filter`, ...) so the structs deserialize it directly; the compiler
//! only reads it.

use crate::de::{null_as_default, OneOrMany, Scalar};
use crate::ids::EntityId;
use crate::secret::Secret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node template kind handled by the compiler
pub const CONTAINER_APPLICATION: &str = "tosca.nodes.Container.Application";

/// Capability entry that carries the host filter
pub const HOST_CAPABILITY: &str = "host";

/// Root of a service descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    /// TOSCA grammar version, e.g. `tosca_simple_yaml_1_3`
    pub tosca_definitions_version: String,

    /// Free-text service description
    pub description: String,

    /// Whether the service requests an overlay network
    #[serde(
        rename = "serviceOverlay",
        default,
        deserialize_with = "null_as_default"
    )]
    pub service_overlay: bool,

    /// Component templates keyed by component name
    #[serde(rename = "node_templates")]
    pub components: BTreeMap<String, ComponentTemplate>,
}

impl Descriptor {
    /// Component templates the compiler knows how to deploy
    pub fn supported_components(&self) -> impl Iterator<Item = (&String, &ComponentTemplate)> {
        self.components
            .iter()
            .filter(|(_, template)| template.is_container_application())
    }
}

/// A deployable component template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentTemplate {
    /// Node type tag
    #[serde(rename = "type")]
    pub kind: String,

    /// Run-to-completion workload instead of a long-running one
    #[serde(rename = "isJob", default, deserialize_with = "null_as_default")]
    pub is_job: bool,

    /// Deployment artifacts keyed by artifact name
    pub artifacts: BTreeMap<String, Artifact>,

    /// Placement and network requirements, in document order
    pub requirements: Vec<Requirement>,

    /// Lifecycle interfaces keyed by interface name (usually `Standard`)
    pub interfaces: BTreeMap<String, InterfaceDefinition>,
}

impl ComponentTemplate {
    pub fn is_container_application(&self) -> bool {
        self.kind == CONTAINER_APPLICATION
    }
}

/// Container image artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Image reference, e.g. `nginx:latest`
    pub file: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// Registry host or a public registry alias such as `docker_hub`
    pub repository: String,

    #[serde(rename = "isPrivate", default, deserialize_with = "null_as_default")]
    pub is_private: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<Secret>,
}

/// One entry of a component's requirement list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Requirement {
    #[serde(default)]
    pub host: Option<HostRequirement>,

    #[serde(default)]
    pub network: Option<NetworkRequirement>,
}

/// Host placement requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRequirement {
    pub node_filter: NodeFilter,
}

/// Either explicit targets or a capability filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFilter {
    #[serde(default)]
    pub properties: Option<TargetProperties>,

    #[serde(default)]
    pub capabilities: Option<Vec<BTreeMap<String, HostCapability>>>,
}

/// Explicit infrastructure element selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetProperties {
    #[serde(default)]
    pub id: Option<OneOrMany<String>>,
}

/// Placement form of a host requirement
#[derive(Debug, Clone, PartialEq)]
pub enum Placement<'a> {
    /// Pinned to the listed infrastructure elements
    Targets(Vec<EntityId>),
    /// Matched against a capability filter; `None` when no `host` entry exists
    Capabilities(Option<&'a CapabilityFilter>),
}

impl HostRequirement {
    /// Explicit targets win over the capability filter
    pub fn placement(&self) -> Placement<'_> {
        let targets: Vec<EntityId> = self
            .node_filter
            .properties
            .as_ref()
            .and_then(|p| p.id.clone())
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .filter(|id| !id.trim().is_empty())
            .map(EntityId::new)
            .collect();

        if !targets.is_empty() {
            return Placement::Targets(targets);
        }

        let filter = self
            .node_filter
            .capabilities
            .iter()
            .flatten()
            .find_map(|entry| entry.get(HOST_CAPABILITY))
            .map(|capability| &capability.properties);

        Placement::Capabilities(filter)
    }
}

/// Wrapper around the capability properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCapability {
    pub properties: CapabilityFilter,
}

/// `{ less_or_equal: v }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessOrEqual<T> {
    pub less_or_equal: Option<T>,
}

/// `{ greater_or_equal: v }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreaterOrEqual<T> {
    pub greater_or_equal: Option<T>,
}

/// `{ equal: v }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equal<T> {
    pub equal: Option<T>,
}

/// Capability constraints on the hosting infrastructure element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityFilter {
    /// Maximum CPU usage as a fraction in `[0, 1]`
    #[serde(default)]
    pub cpu_usage: Option<LessOrEqual<Scalar>>,

    #[serde(default)]
    pub cpu_arch: Option<Equal<String>>,

    /// Minimum memory, e.g. `2000 MB`
    #[serde(default)]
    pub mem_size: Option<GreaterOrEqual<Scalar>>,

    #[serde(default)]
    pub realtime: Option<Equal<bool>>,

    #[serde(default)]
    pub energy_efficiency: Option<GreaterOrEqual<Scalar>>,

    #[serde(default)]
    pub green: Option<GreaterOrEqual<Scalar>>,

    #[serde(default)]
    pub domain_id: Option<Equal<String>>,

    #[serde(default)]
    pub area: Option<AreaFilter>,
}

impl CapabilityFilter {
    pub fn cpu_usage_max(&self) -> Option<&Scalar> {
        self.cpu_usage.as_ref()?.less_or_equal.as_ref()
    }

    pub fn cpu_arch(&self) -> Option<&str> {
        self.cpu_arch.as_ref()?.equal.as_deref()
    }

    pub fn mem_size_min(&self) -> Option<&Scalar> {
        self.mem_size.as_ref()?.greater_or_equal.as_ref()
    }

    pub fn realtime_required(&self) -> Option<bool> {
        self.realtime.as_ref()?.equal
    }

    pub fn energy_efficiency_min(&self) -> Option<&Scalar> {
        self.energy_efficiency.as_ref()?.greater_or_equal.as_ref()
    }

    pub fn green_ratio_min(&self) -> Option<&Scalar> {
        self.green.as_ref()?.greater_or_equal.as_ref()
    }

    pub fn domain_id_equals(&self) -> Option<&str> {
        self.domain_id.as_ref()?.equal.as_deref()
    }
}

/// Ring of `[longitude, latitude]` points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaFilter {
    pub coordinates: Vec<Vec<f64>>,
}

/// Network requirement wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRequirement {
    pub properties: NetworkProperties,
}

/// Declared ports and exposure flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkProperties {
    pub ports: BTreeMap<String, ExposedPort>,

    #[serde(rename = "exposePorts", default)]
    pub expose_ports: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposedPort {
    pub properties: PortProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortProperties {
    /// Protocols, only the first is used
    pub protocol: Vec<String>,

    /// Container port
    pub source: u16,
}

/// Lifecycle interface, only `create` is interpreted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    #[serde(default)]
    pub create: Option<CreateOperation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOperation {
    /// Name of the artifact the operation deploys
    #[serde(default)]
    pub implementation: Option<String>,

    #[serde(default)]
    pub inputs: Option<CreateInputs>,
}

/// Container arguments and environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateInputs {
    #[serde(rename = "cliArgs", default, deserialize_with = "null_as_default")]
    pub cli_args: Vec<BTreeMap<String, Option<Scalar>>>,

    #[serde(rename = "envVars", default, deserialize_with = "null_as_default")]
    pub env_vars: Vec<BTreeMap<String, Option<Scalar>>>,
}
