//! Identifiers for continuum entities
//!
//! Every entity in the store is addressed by a URN of the form
//! `urn:ngsi-ld:<Type>:<rest>`. Component and requirement identifiers are
//! derived from the owning service id so they survive re-allocation; network
//! port identifiers are opaque tokens generated per compilation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Prefix shared by all recognized entity identifiers
pub const URN_PREFIX: &str = "urn:ngsi-ld:";

/// Sentinel used by the store for an unset relationship
pub const NULL_ID: &str = "urn:ngsi-ld:null";

/// Identifier validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("entity id must not be empty")]
    Empty,

    #[error("entity id `{0}` is not a recognized identifier")]
    Unrecognized(String),
}

/// Identifier of an entity in the continuum store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an id and reject empty or non-URN values
    pub fn parse(id: impl Into<String>) -> Result<Self, IdError> {
        let id = Self(id.into());
        id.validate()?;
        Ok(id)
    }

    /// The null relationship sentinel
    pub fn null() -> Self {
        Self(NULL_ID.to_string())
    }

    pub fn is_null(&self) -> bool {
        self.0 == NULL_ID
    }

    /// Check the identifier is non-empty and uses the URN convention
    pub fn validate(&self) -> Result<(), IdError> {
        if self.0.trim().is_empty() {
            return Err(IdError::Empty);
        }
        match self.0.strip_prefix(URN_PREFIX) {
            Some(rest) if !rest.is_empty() => Ok(()),
            _ => Err(IdError::Unrecognized(self.0.clone())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// `<service>:Component:<name>`
    pub fn component(service_id: &EntityId, component_name: &str) -> Self {
        Self(format!("{}:Component:{}", service_id.0, component_name))
    }

    /// `<component>:InfrastructureElementRequirements`
    pub fn requirements(component_id: &EntityId) -> Self {
        Self(format!("{}:InfrastructureElementRequirements", component_id.0))
    }

    /// Fresh `urn:ngsi-ld:NetworkPort:<token>` identifier
    pub fn generate_network_port() -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self(format!("{}NetworkPort:{}", URN_PREFIX, &token[..8]))
    }

    /// `urn:ngsi-ld:CpuArchitecture:<arch>`
    pub fn cpu_architecture(arch: &str) -> Self {
        Self(format!("{}CpuArchitecture:{}", URN_PREFIX, arch))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::null()
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
