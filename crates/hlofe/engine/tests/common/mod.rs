//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hlofe_engine::{LifecycleController, Notifier, NotifyError};
use hlofe_gateway::{InMemoryEntityStore, StoreDomainResolver};
use hlofe_types::EntityId;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const SERVICE: &str = "urn:ngsi-ld:Service:05";
pub const DOMAIN: &str = "urn:ngsi-ld:Domain:NCSRD";
pub const COMPONENT: &str = "urn:ngsi-ld:Service:05:Component:simple_application";
pub const REQUIREMENTS: &str =
    "urn:ngsi-ld:Service:05:Component:simple_application:InfrastructureElementRequirements";

/// One container application with two ports and a capability filter
pub const DESCRIPTOR: &str = r#"
tosca_definitions_version: tosca_simple_yaml_1_3
description: rt application
node_templates:
  simple_application:
    type: tosca.nodes.Container.Application
    requirements:
    - network:
        properties:
          ports:
            exposedport1:
              properties:
                protocol: [udp]
                source: 1625
            exposedport2:
              properties:
                protocol: [udp, tcp]
                source: 35
    - host:
        node_filter:
          capabilities:
          - host:
              properties:
                cpu_usage:
                  less_or_equal: 0.3
                cpu_arch:
                  equal: x86_64
                mem_size:
                  greater_or_equal: 2000 MB
                realtime:
                  equal: true
    artifacts:
      application_image:
        file: busybox
        type: tosca.artifacts.Deployment.Image.Container.Docker
        repository: docker_hub
    interfaces:
      Standard:
        create:
          implementation: application_image
          inputs:
            cliArgs:
            - RTperiodicity: 123
            envVars:
            - Var1: 22
"#;

/// Records every notification instead of sending it
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<EntityId>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<EntityId> {
        self.sent.lock().expect("notifier lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, service_id: &EntityId) -> Result<(), NotifyError> {
        self.sent.lock().expect("notifier lock").push(service_id.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub struct Harness {
    pub store: Arc<InMemoryEntityStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub controller: Arc<LifecycleController>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryEntityStore::new());
        store.register_local_domain(EntityId::new(DOMAIN), "https://ncsrd.example.eu");

        let notifier = Arc::new(RecordingNotifier::default());
        let controller = Arc::new(LifecycleController::new(
            store.clone(),
            Arc::new(StoreDomainResolver::new(store.clone())),
            notifier.clone(),
        ));

        Self {
            store,
            notifier,
            controller,
        }
    }

    pub fn service_id(&self) -> EntityId {
        EntityId::new(SERVICE)
    }

    pub fn seed_service(&self, action: &str) {
        self.store.seed(json!({
            "id": SERVICE,
            "type": "Service",
            "name": {"type": "Property", "value": "aeriOS_service_urn:ngsi-ld:Service:05"},
            "actionType": {"type": "Property", "value": action},
        }));
    }

    /// Component `name` of the test service with its requirements and ports
    pub fn seed_component(&self, name: &str, status: &str, ports: &[&str]) -> EntityId {
        let service = self.service_id();
        let id = EntityId::component(&service, name);
        let requirements = EntityId::requirements(&id);

        self.store.seed(json!({
            "id": requirements.as_str(),
            "type": "InfrastructureElementRequirements",
        }));
        for port in ports {
            self.store.seed(json!({
                "id": port,
                "type": "NetworkPort",
                "portNumber": {"type": "Property", "value": 80},
            }));
        }

        let port_links: Vec<Value> = ports
            .iter()
            .map(|port| json!({"type": "Relationship", "object": port}))
            .collect();
        self.store.seed(json!({
            "id": id.as_str(),
            "type": "ServiceComponent",
            "service": {"type": "Relationship", "object": SERVICE},
            "serviceComponentStatus": {
                "type": "Relationship",
                "object": format!("urn:ngsi-ld:ServiceComponentStatus:{}", status),
            },
            "infrastructureElementRequirements": {
                "type": "Relationship",
                "object": requirements.as_str(),
            },
            "networkPorts": port_links,
        }));
        id
    }

    /// Simplified attribute of a stored entity
    pub fn attr(&self, id: &str, name: &str) -> Value {
        self.store
            .get(&EntityId::new(id))
            .and_then(|entity| entity.get(name).cloned())
            .unwrap_or(Value::Null)
    }
}
