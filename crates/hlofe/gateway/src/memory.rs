//! In-memory implementation of the gateway
//!
//! Keeps entities in their normalized form and renders them the way a broker
//! does on read. Suitable for development and testing; every mutation is
//! journaled so callers can assert on exactly what was written.

use crate::error::{GatewayError, Result};
use crate::gateway::{CreateOutcome, EntityGateway};
use crate::query::QueryParams;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use hlofe_types::{entity_type, EntityId};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::warn;

/// A write applied to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Created(EntityId),
    Patched(EntityId, Value),
    Deleted(EntityId),
}

impl Mutation {
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Mutation::Created(id) | Mutation::Patched(id, _) | Mutation::Deleted(id) => id,
        }
    }
}

/// In-memory entity store
pub struct InMemoryEntityStore {
    entities: DashMap<EntityId, Map<String, Value>>,
    local_domains: DashSet<EntityId>,
    journal: RwLock<Vec<Mutation>>,
    failing_types: DashSet<String>,
    unavailable: AtomicBool,
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
            local_domains: DashSet::new(),
            journal: RwLock::new(Vec::new()),
            failing_types: DashSet::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Register the domain served by this broker
    pub fn register_local_domain(&self, id: EntityId, public_url: &str) {
        let mut entity = Map::new();
        entity.insert("id".to_string(), json!(id.as_str()));
        entity.insert("type".to_string(), json!(entity_type::DOMAIN));
        entity.insert(
            "publicUrl".to_string(),
            json!({ "type": "Property", "value": public_url }),
        );
        self.entities.insert(id.clone(), entity);
        self.local_domains.insert(id);
    }

    /// Insert an entity without journaling it
    pub fn seed(&self, entity: Value) {
        let Value::Object(entity) = entity else {
            warn!("Ignoring non-object seed entity");
            return;
        };
        match entity.get("id").and_then(Value::as_str) {
            Some(id) => {
                self.entities.insert(EntityId::new(id), entity);
            }
            None => warn!("Ignoring seed entity without id"),
        }
    }

    /// Make every create of `kind` fail with a server error
    pub fn fail_creates_of_type(&self, kind: &str) {
        self.failing_types.insert(kind.to_string());
    }

    /// Simulate a broker that cannot be reached
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Entity in simplified form
    pub fn get(&self, id: &EntityId) -> Option<Value> {
        self.entities
            .get(id)
            .map(|entity| render(&entity, &QueryParams::new()))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub async fn mutations(&self) -> Vec<Mutation> {
        self.journal.read().await.clone()
    }

    pub async fn clear_mutations(&self) {
        self.journal.write().await.clear();
    }

    async fn record(&self, mutation: Mutation) {
        self.journal.write().await.push(mutation);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn matches(&self, id: &EntityId, entity: &Map<String, Value>, params: &QueryParams) -> bool {
        if let Some(expected) = &params.entity_type {
            if entity.get("type").and_then(Value::as_str) != Some(expected.as_str()) {
                return false;
            }
        }
        if params.local && !self.local_domains.contains(id) {
            return false;
        }
        params.equals.iter().all(|(attr, expected)| {
            match entity.get(attr).map(simplify) {
                Some(Value::String(actual)) => actual == *expected,
                Some(Value::Array(items)) => items.iter().any(|item| item == expected.as_str()),
                _ => false,
            }
        })
    }
}

/// Collapse Property/Relationship framing to bare values
fn simplify(attr: &Value) -> Value {
    match attr {
        Value::Object(framed) => match framed.get("type").and_then(Value::as_str) {
            Some("Property") | Some("GeoProperty") => {
                framed.get("value").cloned().unwrap_or(Value::Null)
            }
            Some("Relationship") => framed.get("object").cloned().unwrap_or(Value::Null),
            _ => attr.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(simplify).collect()),
        other => other.clone(),
    }
}

fn render(entity: &Map<String, Value>, params: &QueryParams) -> Value {
    let mut out = Map::new();
    for (name, attr) in entity {
        let keep = name == "id"
            || name == "type"
            || params.attrs.is_empty()
            || params.attrs.iter().any(|wanted| wanted == name);
        if !keep {
            continue;
        }
        let rendered = if name != "id" && name != "type" {
            simplify(attr)
        } else {
            attr.clone()
        };
        out.insert(name.clone(), rendered);
    }
    Value::Object(out)
}

#[async_trait]
impl EntityGateway for InMemoryEntityStore {
    async fn query_entity(&self, id: &EntityId, params: &QueryParams) -> Result<Option<Value>> {
        id.validate()?;
        self.check_available()?;
        Ok(self.entities.get(id).map(|entity| render(&entity, params)))
    }

    async fn query_entities(&self, params: &QueryParams) -> Result<Vec<Value>> {
        self.check_available()?;
        let mut rows: Vec<(EntityId, Value)> = self
            .entities
            .iter()
            .filter(|entry| self.matches(entry.key(), entry.value(), params))
            .map(|entry| (entry.key().clone(), render(entry.value(), params)))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows
            .into_iter()
            .skip(params.offset)
            .take(params.limit.unwrap_or(usize::MAX))
            .map(|(_, row)| row)
            .collect())
    }

    async fn create_entity(&self, entity: Value) -> Result<CreateOutcome> {
        self.check_available()?;
        let Value::Object(entity) = entity else {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "entity body must be an object".to_string(),
            });
        };
        let id = EntityId::parse(entity.get("id").and_then(Value::as_str).unwrap_or_default())?;

        let kind = entity.get("type").and_then(Value::as_str).unwrap_or_default();
        if self.failing_types.contains(kind) {
            return Err(GatewayError::Rejected {
                status: 500,
                message: format!("injected failure for {}", kind),
            });
        }

        match self.entities.entry(id.clone()) {
            Entry::Occupied(_) => return Ok(CreateOutcome::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(entity);
            }
        }
        self.record(Mutation::Created(id)).await;
        Ok(CreateOutcome::Created)
    }

    async fn patch_entity(&self, id: &EntityId, fragment: Value) -> Result<u16> {
        id.validate()?;
        self.check_available()?;
        let Value::Object(attrs) = &fragment else {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "patch body must be an object".to_string(),
            });
        };

        match self.entities.get_mut(id) {
            Some(mut entity) => {
                for (name, value) in attrs {
                    entity.insert(name.clone(), value.clone());
                }
            }
            None => {
                return Err(GatewayError::Rejected {
                    status: 404,
                    message: format!("entity {} not found", id),
                })
            }
        }
        self.record(Mutation::Patched(id.clone(), fragment)).await;
        Ok(204)
    }

    async fn delete_entity(&self, id: &EntityId) -> Result<u16> {
        id.validate()?;
        self.check_available()?;
        if self.entities.remove(id).is_none() {
            return Err(GatewayError::Rejected {
                status: 404,
                message: format!("entity {} not found", id),
            });
        }
        self.local_domains.remove(id);
        self.record(Mutation::Deleted(id.clone())).await;
        Ok(204)
    }
}
