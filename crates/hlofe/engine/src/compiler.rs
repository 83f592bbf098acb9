//! Entity Compiler - Descriptor to continuum entity graph
//!
//! Compilation is all-or-nothing: the first attribute that cannot be mapped
//! aborts it and no partial graph is returned. Component and requirement ids
//! derive from the service id, so compiling the same descriptor twice yields
//! the same component ids; network port ids are fresh each time.

use crate::error::CompileError;
use hlofe_gateway::DomainResolver;
use hlofe_types::{
    Area, Artifact, CapabilityFilter, ComponentTemplate, Descriptor, EntityGraph, EntityId,
    InfrastructureElementRequirements, KeyValue, NetworkPort, Placement, Scalar, Secret, Service,
    ServiceActionType, ServiceComponent, ServiceComponentStatus, CONTAINER_APPLICATION,
};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument, warn};

/// Prefix of the generated service name
pub const SERVICE_NAME_PREFIX: &str = "aeriOS_service_";

type CompileResult<T> = std::result::Result<T, CompileError>;

/// Compiles descriptors into entity graphs
pub struct EntityCompiler {
    domains: Arc<dyn DomainResolver>,
}

impl EntityCompiler {
    pub fn new(domains: Arc<dyn DomainResolver>) -> Self {
        Self { domains }
    }

    /// Build the entity graph of `service_id` from `descriptor`
    #[instrument(skip(self, descriptor), fields(service_id = %service_id))]
    pub async fn compile(
        &self,
        service_id: &EntityId,
        descriptor: &Descriptor,
    ) -> CompileResult<EntityGraph> {
        let domain_handler = match self.domains.local_domain().await {
            Ok(domain) => domain,
            Err(e) => {
                warn!(error = %e, "Local domain lookup failed, service will have no handler");
                None
            }
        };

        let service = Service {
            id: service_id.clone(),
            name: format!("{}{}", SERVICE_NAME_PREFIX, service_id),
            description: descriptor.description.clone(),
            domain_handler,
            action_type: ServiceActionType::Deploying,
            has_overlay: descriptor.service_overlay,
        };

        let mut graph = EntityGraph::new(service);
        let mut port_ids = HashSet::new();

        for (name, template) in descriptor.supported_components() {
            compile_component(service_id, name, template, &mut graph, &mut port_ids)?;
        }

        let skipped = descriptor.components.len() - graph.components.len();
        if skipped > 0 {
            debug!(skipped, "Ignored component templates of unsupported kind");
        }

        if graph.components.is_empty() {
            return Err(CompileError::new(
                "node_templates",
                format!("no component of type {}", CONTAINER_APPLICATION),
            ));
        }

        info!(
            components = graph.components.len(),
            ports = graph.network_ports.len(),
            "Compiled entity graph"
        );
        Ok(graph)
    }
}

fn compile_component(
    service_id: &EntityId,
    name: &str,
    template: &ComponentTemplate,
    graph: &mut EntityGraph,
    port_ids: &mut HashSet<EntityId>,
) -> CompileResult<()> {
    let path = format!("node_templates.{}", name);
    if !is_id_segment(name) {
        return Err(CompileError::new(
            path,
            "component names may only use letters, digits and `-_.`",
        ));
    }
    let component_id = EntityId::component(service_id, name);

    let artifact = select_artifact(&path, template)?;
    let image = resolve_image(&path, artifact)?;

    let mut network_ports = Vec::new();
    let mut expose_ports = false;
    for network in template.requirements.iter().filter_map(|r| r.network.as_ref()) {
        if let Some(expose) = network.properties.expose_ports {
            expose_ports = expose;
        }
        for (port_name, port) in &network.properties.ports {
            let protocol = port.properties.protocol.first().ok_or_else(|| {
                CompileError::new(
                    format!("{}.requirements.network.ports.{}.protocol", path, port_name),
                    "at least one protocol is required",
                )
            })?;

            let id = unique_port_id(port_ids);
            network_ports.push(id.clone());
            graph.network_ports.push(NetworkPort {
                id,
                port_number: port.properties.source,
                port_protocol: protocol.clone(),
            });
        }
    }

    let mut hosts = template.requirements.iter().filter_map(|r| r.host.as_ref());
    let host = hosts.next().ok_or_else(|| {
        CompileError::new(format!("{}.requirements", path), "host requirement is missing")
    })?;
    if hosts.next().is_some() {
        warn!(component = name, "Only the first host requirement is used");
    }

    let requirements_id = EntityId::requirements(&component_id);
    let requirements = match host.placement() {
        Placement::Targets(targets) => {
            InfrastructureElementRequirements::targeting(requirements_id.clone(), targets)
        }
        Placement::Capabilities(Some(filter)) => {
            compile_capabilities(&path, requirements_id.clone(), filter)?
        }
        Placement::Capabilities(None) => {
            return Err(CompileError::new(
                format!("{}.requirements.host.node_filter", path),
                "neither target ids nor a host capability filter is given",
            ))
        }
    };
    graph.requirements.push(requirements);

    let (cli_args, env_vars) = create_inputs(&path, template)?;

    graph.components.push(ServiceComponent {
        id: component_id,
        service: service_id.clone(),
        infrastructure_element: None,
        service_component_status: ServiceComponentStatus::Starting,
        infrastructure_element_requirements: requirements_id,
        network_ports,
        container_image: image.reference,
        cli_args,
        env_vars,
        expose_ports,
        is_job: template.is_job,
        is_private: image.is_private,
        repo_username: image.username,
        repo_password: image.password,
    });
    Ok(())
}

/// Names become part of entity ids and must not need escaping
fn is_id_segment(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn unique_port_id(taken: &mut HashSet<EntityId>) -> EntityId {
    loop {
        let id = EntityId::generate_network_port();
        if taken.insert(id.clone()) {
            return id;
        }
    }
}

/// The artifact named by a `create` operation, else the first one by name
fn select_artifact<'a>(path: &str, template: &'a ComponentTemplate) -> CompileResult<&'a Artifact> {
    let implemented = template
        .interfaces
        .values()
        .filter_map(|interface| interface.create.as_ref()?.implementation.as_deref())
        .find_map(|name| template.artifacts.get(name));

    implemented
        .or_else(|| template.artifacts.values().next())
        .ok_or_else(|| CompileError::new(format!("{}.artifacts", path), "no artifact declared"))
}

/// Resolved container image and pull credentials
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub reference: String,
    pub is_private: bool,
    pub username: Option<String>,
    pub password: Option<Secret>,
}

/// Prefix the image with its registry unless it comes from the public default
pub fn resolve_image(path: &str, artifact: &Artifact) -> CompileResult<ImageRef> {
    let file = artifact.file.trim();
    if file.is_empty() {
        return Err(CompileError::new(
            format!("{}.artifacts.file", path),
            "image reference is empty",
        ));
    }

    let repository = artifact.repository.trim().trim_end_matches('/');
    let reference = if repository.is_empty() || repository.to_lowercase().contains("docker") {
        file.to_string()
    } else {
        format!("{}/{}", repository, file)
    };

    let (username, password) = if artifact.is_private {
        (artifact.username.clone(), artifact.password.clone())
    } else {
        (None, None)
    };

    Ok(ImageRef {
        reference,
        is_private: artifact.is_private,
        username,
        password,
    })
}

fn digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn compile_capabilities(
    path: &str,
    id: EntityId,
    filter: &CapabilityFilter,
) -> CompileResult<InfrastructureElementRequirements> {
    let attr = |name: &str| format!("{}.requirements.host.capabilities.{}", path, name);

    let required_cpu_usage = filter
        .cpu_usage_max()
        .map(|value| {
            let fraction = number(value, || attr("cpu_usage"))?;
            if !(0.0..=1.0).contains(&fraction) {
                return Err(CompileError::new(
                    attr("cpu_usage"),
                    format!("{} is not a fraction between 0 and 1", fraction),
                ));
            }
            Ok((fraction * 100.0).round() as u32)
        })
        .transpose()?;

    let required_ram = filter
        .mem_size_min()
        .map(|value| {
            megabytes(value).ok_or_else(|| {
                CompileError::new(attr("mem_size"), format!("no size in `{}`", value))
            })
        })
        .transpose()?;

    let cpu_architecture = filter
        .cpu_arch()
        .map(str::trim)
        .filter(|arch| !arch.is_empty())
        .map(|arch| EntityId::cpu_architecture(normalize_arch(arch)));

    let energy_efficiency_ratio = filter
        .energy_efficiency_min()
        .map(|value| percentage(value, || attr("energy_efficiency")))
        .transpose()?;

    let green_energy_ratio = filter
        .green_ratio_min()
        .map(|value| percentage(value, || attr("green")))
        .transpose()?;

    let domain_id = filter
        .domain_id_equals()
        .map(str::trim)
        .filter(|domain| !domain.is_empty())
        .map(EntityId::new);

    let area = match &filter.area {
        Some(area) if !area.coordinates.is_empty() => {
            if area.coordinates.iter().any(|point| point.len() != 2) {
                return Err(CompileError::new(
                    attr("area.coordinates"),
                    "every point must be a [longitude, latitude] pair",
                ));
            }
            Some(Area::polygon(area.coordinates.clone()))
        }
        _ => None,
    };

    Ok(InfrastructureElementRequirements {
        id,
        infrastructure_element: Vec::new(),
        required_cpu_usage,
        required_ram,
        cpu_architecture,
        real_time_capable: filter.realtime_required(),
        energy_efficiency_ratio,
        green_energy_ratio,
        domain_id,
        area,
    })
}

fn number(value: &Scalar, attribute: impl Fn() -> String) -> CompileResult<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CompileError::new(attribute(), format!("`{}` is not a number", value)))
}

/// Leading integer of a size such as `2000 MB`
fn megabytes(value: &Scalar) -> Option<u64> {
    match value {
        Scalar::Int(v) => u64::try_from(*v).ok(),
        Scalar::Float(v) if *v >= 0.0 && v.is_finite() => Some(v.trunc() as u64),
        Scalar::Text(text) => digits().find(text)?.as_str().parse().ok(),
        _ => None,
    }
}

/// Whole percentage between 0 and 100, passed through unchanged
fn percentage(value: &Scalar, attribute: impl Fn() -> String) -> CompileResult<u32> {
    let raw = number(value, &attribute)?;
    if raw.fract() != 0.0 || !(0.0..=100.0).contains(&raw) {
        return Err(CompileError::new(
            attribute(),
            format!("{} is not a whole percentage between 0 and 100", raw),
        ));
    }
    Ok(raw as u32)
}

fn normalize_arch(arch: &str) -> &str {
    match arch {
        "x86_64" | "amd64" => "x64",
        other => other,
    }
}

fn create_inputs(
    path: &str,
    template: &ComponentTemplate,
) -> CompileResult<(Vec<KeyValue>, Vec<KeyValue>)> {
    let mut cli_args = Vec::new();
    let mut env_vars = Vec::new();

    for (name, interface) in &template.interfaces {
        let inputs = interface
            .create
            .as_ref()
            .and_then(|create| create.inputs.as_ref())
            .ok_or_else(|| {
                CompileError::new(
                    format!("{}.interfaces.{}.create.inputs", path, name),
                    "create inputs are missing",
                )
            })?;
        cli_args.extend(flatten(&inputs.cli_args));
        env_vars.extend(flatten(&inputs.env_vars));
    }

    Ok((cli_args, env_vars))
}

fn flatten(entries: &[BTreeMap<String, Option<Scalar>>]) -> Vec<KeyValue> {
    entries
        .iter()
        .flat_map(|entry| entry.iter())
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: value.as_ref().map(Scalar::to_string).unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlofe_gateway::FixedDomain;
    use hlofe_types::parse_descriptor;

    const TWO_PORTS: &str = r#"
tosca_definitions_version: tosca_simple_yaml_1_3
description: ports and capability filter
node_templates:
  simple_application:
    type: tosca.nodes.Container.Application
    requirements:
    - host:
        node_filter:
          capabilities:
          - host:
              properties:
                cpu_usage: { less_or_equal: 0.3 }
                cpu_arch: { equal: x86_64 }
                mem_size: { greater_or_equal: 2000 MB }
                realtime: { equal: true }
                energy_efficiency: { greater_or_equal: '50' }
                green: { greater_or_equal: 70 }
                domain_id: { equal: 'urn:ngsi-ld:Domain:NCSRD' }
                area:
                  coordinates:
                  - [-0.34, 39.48]
                  - [-0.34, 39.41]
                  - [-0.30, 39.48]
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
          exposePorts: true
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
            - RTdeadline: 23
            envVars:
            - Var1: 22
            - Var2:
  database:
    type: tosca.nodes.Database
    requirements: []
    artifacts: {}
    interfaces: {}
"#;

    const PINNED: &str = r#"
tosca_definitions_version: tosca_simple_yaml_1_3
description: pinned component behind a private registry
serviceOverlay: true
node_templates:
  manual-sc:
    isJob: true
    artifacts:
      application_image:
        file: mosquitto:latest
        repository: registry.example.eu/
        type: tosca.artifacts.Deployment.Image.Container.Docker
        isPrivate: true
        username: robot
        password: s3cret
    interfaces:
      Standard:
        create:
          implementation: application_image
          inputs:
            cliArgs:
            - verbose: aa
            envVars:
            - AA: aa
    requirements:
    - host:
        node_filter:
          capabilities:
          - host:
              properties:
                cpu_usage: { less_or_equal: 0.9 }
          properties:
            id:
            - urn:ngsi-ld:InfrastructureElement:NCSRD:fac2b1a81a2e
            - urn:ngsi-ld:InfrastructureElement:NCSRD:0b1c
    type: tosca.nodes.Container.Application
"#;

    fn compiler(domain: Option<&str>) -> EntityCompiler {
        EntityCompiler::new(Arc::new(FixedDomain(domain.map(EntityId::new))))
    }

    fn service_id() -> EntityId {
        EntityId::new("urn:ngsi-ld:Service:05")
    }

    #[tokio::test]
    async fn test_compile_capability_filter() {
        let descriptor = parse_descriptor(TWO_PORTS).unwrap();
        let graph = compiler(Some("urn:ngsi-ld:Domain:NCSRD"))
            .compile(&service_id(), &descriptor)
            .await
            .unwrap();

        assert_eq!(graph.service.name, "aeriOS_service_urn:ngsi-ld:Service:05");
        assert_eq!(graph.service.action_type, ServiceActionType::Deploying);
        assert_eq!(
            graph.service.domain_handler,
            Some(EntityId::new("urn:ngsi-ld:Domain:NCSRD"))
        );
        assert_eq!(graph.components.len(), 1);

        let requirements = &graph.requirements[0];
        assert_eq!(
            requirements.id.as_str(),
            "urn:ngsi-ld:Service:05:Component:simple_application:InfrastructureElementRequirements"
        );
        assert!(requirements.infrastructure_element.is_empty());
        assert_eq!(requirements.required_cpu_usage, Some(30));
        assert_eq!(requirements.required_ram, Some(2000));
        assert_eq!(
            requirements.cpu_architecture,
            Some(EntityId::new("urn:ngsi-ld:CpuArchitecture:x64"))
        );
        assert_eq!(requirements.real_time_capable, Some(true));
        assert_eq!(requirements.energy_efficiency_ratio, Some(50));
        assert_eq!(requirements.green_energy_ratio, Some(70));
        assert_eq!(
            requirements.domain_id,
            Some(EntityId::new("urn:ngsi-ld:Domain:NCSRD"))
        );
        assert_eq!(requirements.area.as_ref().unwrap().coordinates[0].len(), 3);
    }

    #[tokio::test]
    async fn test_first_protocol_wins() {
        let descriptor = parse_descriptor(TWO_PORTS).unwrap();
        let graph = compiler(None).compile(&service_id(), &descriptor).await.unwrap();

        let mut ports: Vec<(u16, &str)> = graph
            .network_ports
            .iter()
            .map(|p| (p.port_number, p.port_protocol.as_str()))
            .collect();
        ports.sort();
        assert_eq!(ports, vec![(35, "udp"), (1625, "udp")]);

        let component = &graph.components[0];
        assert_eq!(component.network_ports.len(), 2);
        assert!(component.expose_ports);
        assert_ne!(graph.network_ports[0].id, graph.network_ports[1].id);
    }

    #[tokio::test]
    async fn test_component_fields() {
        let descriptor = parse_descriptor(TWO_PORTS).unwrap();
        let graph = compiler(None).compile(&service_id(), &descriptor).await.unwrap();
        let component = &graph.components[0];

        assert_eq!(
            component.id.as_str(),
            "urn:ngsi-ld:Service:05:Component:simple_application"
        );
        assert_eq!(component.service_component_status, ServiceComponentStatus::Starting);
        assert_eq!(component.container_image, "busybox");
        assert!(!component.is_private);
        assert_eq!(component.repo_username, None);
        assert_eq!(
            component.cli_args,
            vec![
                KeyValue { key: "RTperiodicity".into(), value: "123".into() },
                KeyValue { key: "RTdeadline".into(), value: "23".into() },
            ]
        );
        assert_eq!(component.env_vars[0].value, "22");
        assert_eq!(
            component.env_vars[1],
            KeyValue { key: "Var2".into(), value: String::new() }
        );
        assert_eq!(graph.service.domain_handler, None);
    }

    #[tokio::test]
    async fn test_component_ids_are_deterministic() {
        let descriptor = parse_descriptor(TWO_PORTS).unwrap();
        let compiler = compiler(None);
        let first = compiler.compile(&service_id(), &descriptor).await.unwrap();
        let second = compiler.compile(&service_id(), &descriptor).await.unwrap();

        let ids = |g: &EntityGraph| g.components.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_ne!(first.network_ports[0].id, second.network_ports[0].id);
    }

    #[tokio::test]
    async fn test_targets_exclude_capabilities() {
        let descriptor = parse_descriptor(PINNED).unwrap();
        let graph = compiler(None).compile(&service_id(), &descriptor).await.unwrap();

        let requirements = &graph.requirements[0];
        assert_eq!(requirements.infrastructure_element.len(), 2);
        assert!(!requirements.has_capability_fields());

        let component = &graph.components[0];
        assert!(component.network_ports.is_empty());
        assert!(!component.expose_ports);
        assert!(component.is_job);
        assert!(graph.service.has_overlay);
    }

    #[tokio::test]
    async fn test_private_registry_image() {
        let descriptor = parse_descriptor(PINNED).unwrap();
        let graph = compiler(None).compile(&service_id(), &descriptor).await.unwrap();
        let component = &graph.components[0];

        assert_eq!(component.container_image, "registry.example.eu/mosquitto:latest");
        assert!(component.is_private);
        assert_eq!(component.repo_username.as_deref(), Some("robot"));
        assert_eq!(
            component.repo_password.as_ref().map(Secret::expose),
            Some("s3cret")
        );
    }

    #[tokio::test]
    async fn test_missing_host_requirement() {
        let mut descriptor = parse_descriptor(TWO_PORTS).unwrap();
        let app = descriptor.components.get_mut("simple_application").unwrap();
        app.requirements.retain(|r| r.host.is_none());

        let err = compiler(None).compile(&service_id(), &descriptor).await.unwrap_err();
        assert_eq!(err.attribute, "node_templates.simple_application.requirements");
    }

    #[tokio::test]
    async fn test_no_supported_component() {
        let mut descriptor = parse_descriptor(TWO_PORTS).unwrap();
        descriptor.components.remove("simple_application");

        let err = compiler(None).compile(&service_id(), &descriptor).await.unwrap_err();
        assert_eq!(err.attribute, "node_templates");
    }

    #[tokio::test]
    async fn test_bad_memory_size() {
        let text = TWO_PORTS.replace("2000 MB", "lots");
        let descriptor = parse_descriptor(&text).unwrap();
        let err = compiler(None).compile(&service_id(), &descriptor).await.unwrap_err();
        assert!(err.attribute.ends_with("capabilities.mem_size"));
    }

    #[tokio::test]
    async fn test_cpu_usage_out_of_range() {
        let text = TWO_PORTS.replace("less_or_equal: 0.3", "less_or_equal: 30");
        let descriptor = parse_descriptor(&text).unwrap();
        let err = compiler(None).compile(&service_id(), &descriptor).await.unwrap_err();
        assert!(err.attribute.ends_with("capabilities.cpu_usage"));
    }

    #[tokio::test]
    async fn test_ratios_are_whole_percentages() {
        let low = TWO_PORTS.replace("green: { greater_or_equal: 70 }", "green: { greater_or_equal: 1 }");
        let graph = compiler(None)
            .compile(&service_id(), &parse_descriptor(&low).unwrap())
            .await
            .unwrap();
        assert_eq!(graph.requirements[0].green_energy_ratio, Some(1));

        for bad in ["0.5", "150", "-1"] {
            let text = TWO_PORTS.replace(
                "green: { greater_or_equal: 70 }",
                &format!("green: {{ greater_or_equal: {} }}", bad),
            );
            let err = compiler(None)
                .compile(&service_id(), &parse_descriptor(&text).unwrap())
                .await
                .unwrap_err();
            assert!(err.attribute.ends_with("capabilities.green"), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_component_name_must_not_need_escaping() {
        let mut descriptor = parse_descriptor(TWO_PORTS).unwrap();
        let app = descriptor.components.remove("simple_application").unwrap();
        descriptor.components.insert("web#2".to_string(), app);

        let err = compiler(None).compile(&service_id(), &descriptor).await.unwrap_err();
        assert_eq!(err.attribute, "node_templates.web#2");

        assert!(is_id_segment("manual-sc"));
        assert!(is_id_segment("simple_application.v2"));
        assert!(!is_id_segment("web/2"));
        assert!(!is_id_segment("web 2"));
        assert!(!is_id_segment(""));
    }

    #[tokio::test]
    async fn test_missing_create_inputs() {
        let mut descriptor = parse_descriptor(TWO_PORTS).unwrap();
        let app = descriptor.components.get_mut("simple_application").unwrap();
        for interface in app.interfaces.values_mut() {
            if let Some(create) = interface.create.as_mut() {
                create.inputs = None;
            }
        }
        let err = compiler(None).compile(&service_id(), &descriptor).await.unwrap_err();
        assert!(err.attribute.ends_with("create.inputs"));
    }

    #[test]
    fn test_megabytes() {
        assert_eq!(megabytes(&Scalar::Text("2000 MB".into())), Some(2000));
        assert_eq!(megabytes(&Scalar::Text("1".into())), Some(1));
        assert_eq!(megabytes(&Scalar::Int(512)), Some(512));
        assert_eq!(megabytes(&Scalar::Text("MB".into())), None);
    }

    #[test]
    fn test_resolve_image_default_registry() {
        let artifact = Artifact {
            file: "nginx:latest".into(),
            kind: "tosca.artifacts.Deployment.Image.Container.Docker".into(),
            repository: "docker_hub".into(),
            is_private: false,
            username: Some("ignored".into()),
            password: None,
        };
        let image = resolve_image("app", &artifact).unwrap();
        assert_eq!(image.reference, "nginx:latest");
        assert_eq!(image.username, None);
    }
}
