//! HLO-FE Types - Service descriptors and continuum entities
//!
//! The HLO front end accepts a TOSCA-style service descriptor, compiles it
//! into a graph of continuum entities and publishes that graph to an NGSI-LD
//! context broker, where the rest of the orchestration pipeline picks it up.
//!
//! ## Key Concepts
//!
//! - **Descriptor**: The YAML document a client submits (`node_templates`,
//!   artifacts, host and network requirements)
//! - **EntityGraph**: One `Service` plus its `ServiceComponent`,
//!   `InfrastructureElementRequirements` and `NetworkPort` entities
//! - **Wire form**: Property/Relationship framing used by the broker
//! - **Records**: Entities read back from the broker in simplified form

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod continuum;
pub mod de;
pub mod descriptor;
pub mod ids;
pub mod records;
pub mod secret;
pub mod validate;
pub mod wire;

// Re-export main types
pub use continuum::{
    entity_type, Area, ContinuumEntity, EntityGraph, InfrastructureElementRequirements, KeyValue,
    NetworkPort, Service, ServiceActionType, ServiceComponent, ServiceComponentStatus,
    UnknownVariant,
};
pub use de::{OneOrMany, Scalar};
pub use descriptor::{
    Artifact, CapabilityFilter, ComponentTemplate, Descriptor, HostRequirement,
    NetworkRequirement, Placement, Requirement, CONTAINER_APPLICATION,
};
pub use ids::{EntityId, IdError, NULL_ID, URN_PREFIX};
pub use records::{ComponentRecord, ComponentStatusEntry, EmbeddedEntity, Link, ServiceRecord};
pub use secret::Secret;
pub use validate::{parse_descriptor, DescriptorError};
pub use wire::{component_status_patch, service_action_patch, Payload, ToNgsiLd};

#[cfg(test)]
pub(crate) use validate::fixtures;
