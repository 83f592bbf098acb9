mod common;

use common::{Harness, COMPONENT, DESCRIPTOR, DOMAIN, SERVICE};
use hlofe_engine::{AllocateOutcome, LifecycleError, ReallocateOutcome};
use hlofe_gateway::{EntityGateway, Mutation, PAGE_SIZE};
use hlofe_types::{parse_descriptor, EntityId};
use serde_json::json;

fn status(name: &str) -> serde_json::Value {
    json!(format!("urn:ngsi-ld:ServiceComponentStatus:{}", name))
}

#[tokio::test]
async fn allocate_publishes_and_notifies_once() {
    let h = Harness::new();
    let descriptor = parse_descriptor(DESCRIPTOR).expect("descriptor should parse");

    let outcome = h
        .controller
        .allocate(&h.service_id(), &descriptor)
        .await
        .expect("allocate should succeed");

    assert_eq!(outcome, AllocateOutcome::Allocated);
    assert_eq!(h.notifier.sent(), vec![h.service_id()]);
    assert_eq!(h.attr(SERVICE, "actionType"), json!("DEPLOYING"));
    assert_eq!(h.attr(SERVICE, "domainHandler"), json!(DOMAIN));
    assert_eq!(h.attr(COMPONENT, "serviceComponentStatus"), status("Starting"));
}

#[tokio::test]
async fn allocate_is_noop_while_components_start() {
    let h = Harness::new();
    let descriptor = parse_descriptor(DESCRIPTOR).expect("descriptor should parse");
    h.controller
        .allocate(&h.service_id(), &descriptor)
        .await
        .expect("first allocate should succeed");
    h.store.clear_mutations().await;
    let entities = h.store.len();

    let outcome = h
        .controller
        .allocate(&h.service_id(), &descriptor)
        .await
        .expect("second allocate should succeed");

    assert_eq!(outcome, AllocateOutcome::AlreadyActive);
    assert!(h.store.mutations().await.is_empty());
    assert_eq!(h.store.len(), entities);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn allocate_over_stopped_service_restarts_it() {
    let h = Harness::new();
    h.seed_service("FINISHED");
    h.seed_component("simple_application", "Failed", &[]);
    let other = h.seed_component("sidecar", "Finished", &[]);
    let descriptor = parse_descriptor(DESCRIPTOR).expect("descriptor should parse");

    let outcome = h
        .controller
        .allocate(&h.service_id(), &descriptor)
        .await
        .expect("conflict must not surface as an error");

    assert_eq!(outcome, AllocateOutcome::Restarted { reset: 2 });
    assert_eq!(h.attr(COMPONENT, "serviceComponentStatus"), status("Starting"));
    assert_eq!(
        h.attr(other.as_str(), "serviceComponentStatus"),
        status("Starting")
    );
    assert_eq!(h.attr(SERVICE, "actionType"), json!("DEPLOYING"));
    assert_eq!(h.attr(SERVICE, "domainHandler"), json!(DOMAIN));
    assert_eq!(h.notifier.sent(), vec![h.service_id()]);

    let created = h
        .store
        .mutations()
        .await
        .into_iter()
        .filter(|m| matches!(m, Mutation::Created(_)))
        .count();
    assert_eq!(created, 0);
}

#[tokio::test]
async fn concurrent_allocations_publish_once() {
    let h = Harness::new();
    let descriptor = parse_descriptor(DESCRIPTOR).expect("descriptor should parse");

    let first = {
        let controller = h.controller.clone();
        let descriptor = descriptor.clone();
        tokio::spawn(async move { controller.allocate(&EntityId::new(SERVICE), &descriptor).await })
    };
    let second = {
        let controller = h.controller.clone();
        let descriptor = descriptor.clone();
        tokio::spawn(async move { controller.allocate(&EntityId::new(SERVICE), &descriptor).await })
    };

    let mut outcomes = vec![
        first.await.expect("task").expect("allocate"),
        second.await.expect("task").expect("allocate"),
    ];
    outcomes.sort_by_key(|o| matches!(o, AllocateOutcome::Allocated));

    assert_eq!(
        outcomes,
        vec![AllocateOutcome::AlreadyActive, AllocateOutcome::Allocated]
    );
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn reallocate_missing_service_is_not_found() {
    let h = Harness::new();

    let err = h
        .controller
        .reallocate(&h.service_id())
        .await
        .expect_err("missing service must be rejected");

    assert!(matches!(err, LifecycleError::NotFound(id) if id.as_str() == SERVICE));
    assert!(h.store.mutations().await.is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn reallocate_resets_failed_components() {
    let h = Harness::new();
    h.seed_service("FINISHED");
    h.seed_component("simple_application", "Failed", &[]);
    h.seed_component("sidecar", "Removing", &[]);

    let outcome = h
        .controller
        .reallocate(&h.service_id())
        .await
        .expect("reallocate should succeed");

    assert_eq!(outcome, ReallocateOutcome::Restarted { reset: 1 });
    assert_eq!(h.attr(COMPONENT, "serviceComponentStatus"), status("Starting"));
    assert_eq!(h.attr(SERVICE, "actionType"), json!("DEPLOYING"));
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn reallocate_running_service_is_noop() {
    let h = Harness::new();
    h.seed_service("DEPLOYED");
    h.seed_component("simple_application", "Running", &[]);

    let outcome = h.controller.reallocate(&h.service_id()).await.expect("reallocate");

    assert_eq!(outcome, ReallocateOutcome::AlreadyActive);
    assert!(h.store.mutations().await.is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn update_marks_described_components_locating() {
    let h = Harness::new();
    h.seed_service("DEPLOYED");
    h.seed_component("simple_application", "Running", &[]);
    let sidecar = h.seed_component("sidecar", "Running", &[]);

    let report = h
        .controller
        .update(&h.service_id(), DESCRIPTOR)
        .await
        .expect("update should succeed");

    assert_eq!(report.relocated, vec![EntityId::new(COMPONENT)]);
    assert_eq!(h.attr(COMPONENT, "serviceComponentStatus"), status("Locating"));
    assert_eq!(h.attr(sidecar.as_str(), "serviceComponentStatus"), status("Running"));
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn update_missing_service_is_not_found() {
    let h = Harness::new();

    let err = h
        .controller
        .update(&h.service_id(), DESCRIPTOR)
        .await
        .expect_err("missing service must be rejected");

    assert!(matches!(err, LifecycleError::NotFound(_)));
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn deallocate_refuses_unless_every_component_is_settled() {
    let h = Harness::new();
    h.seed_service("DEPLOYED");
    h.seed_component("simple_application", "Running", &[]);
    h.seed_component("sidecar", "Starting", &[]);

    let err = h
        .controller
        .deallocate(&h.service_id())
        .await
        .expect_err("a starting component blocks deallocation");

    assert!(matches!(err, LifecycleError::Precondition(_)));
    assert!(h.store.mutations().await.is_empty());
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.attr(COMPONENT, "serviceComponentStatus"), status("Running"));
}

#[tokio::test]
async fn deallocate_moves_components_to_removing() {
    let h = Harness::new();
    h.seed_service("DEPLOYED");
    h.seed_component("simple_application", "Running", &[]);
    let sidecar = h.seed_component("sidecar", "Failed", &[]);

    let report = h
        .controller
        .deallocate(&h.service_id())
        .await
        .expect("deallocate should succeed");

    assert_eq!(report.removing.len(), 2);
    assert!(report.service_updated);
    assert_eq!(h.attr(COMPONENT, "serviceComponentStatus"), status("Removing"));
    assert_eq!(h.attr(sidecar.as_str(), "serviceComponentStatus"), status("Removing"));
    assert_eq!(h.attr(SERVICE, "actionType"), json!("DESTROYING"));
    assert_eq!(h.notifier.sent(), vec![h.service_id()]);
}

#[tokio::test]
async fn purge_refuses_deploying_service() {
    let h = Harness::new();
    h.seed_service("DEPLOYING");
    h.seed_component("simple_application", "Running", &[]);

    let err = h
        .controller
        .purge(&h.service_id())
        .await
        .expect_err("deploying service must not be purged");

    assert!(matches!(err, LifecycleError::Precondition(_)));
    assert!(h.store.mutations().await.is_empty());
    assert!(h.store.contains(&h.service_id()));
}

#[tokio::test]
async fn purge_deletes_every_entity_once_in_order() {
    let h = Harness::new();
    h.seed_service("urn:ngsi-ld:null");
    let app = h.seed_component(
        "simple_application",
        "Finished",
        &["urn:ngsi-ld:NetworkPort:aaaa0001", "urn:ngsi-ld:NetworkPort:aaaa0002"],
    );
    let sidecar = h.seed_component("sidecar", "Finished", &["urn:ngsi-ld:NetworkPort:bbbb0001"]);

    let report = h.controller.purge(&h.service_id()).await.expect("purge");

    let deleted: Vec<EntityId> = h
        .store
        .mutations()
        .await
        .into_iter()
        .map(|m| match m {
            Mutation::Deleted(id) => id,
            other => panic!("unexpected mutation {:?}", other),
        })
        .collect();

    // Components are listed by id, so the sidecar comes first
    let expected = vec![
        h.service_id(),
        EntityId::new("urn:ngsi-ld:NetworkPort:bbbb0001"),
        EntityId::new("urn:ngsi-ld:NetworkPort:aaaa0001"),
        EntityId::new("urn:ngsi-ld:NetworkPort:aaaa0002"),
        EntityId::requirements(&sidecar),
        EntityId::requirements(&app),
        sidecar,
        app,
    ];
    assert_eq!(deleted, expected);
    assert_eq!(report.deleted, expected);
    assert!(report.is_complete());

    // Only the registered domain is left
    assert_eq!(h.store.len(), 1);
    assert!(h.store.contains(&EntityId::new(DOMAIN)));
}

#[tokio::test]
async fn purge_keeps_deleting_after_a_failure() {
    let h = Harness::new();
    h.seed_service("FINISHED");
    let app = h.seed_component(
        "simple_application",
        "Finished",
        &["urn:ngsi-ld:NetworkPort:gone0001", "urn:ngsi-ld:NetworkPort:aaaa0002"],
    );
    let gone = EntityId::new("urn:ngsi-ld:NetworkPort:gone0001");
    h.store.delete_entity(&gone).await.expect("remove port");
    h.store.clear_mutations().await;

    let report = h.controller.purge(&h.service_id()).await.expect("purge");

    assert_eq!(report.failed, vec![gone]);
    assert!(!report.is_complete());
    assert_eq!(
        report.deleted,
        vec![
            h.service_id(),
            EntityId::new("urn:ngsi-ld:NetworkPort:aaaa0002"),
            EntityId::requirements(&app),
            app.clone(),
        ]
    );
    assert!(!h.store.contains(&app));
    assert!(!h.store.contains(&EntityId::requirements(&app)));
}

#[tokio::test]
async fn purge_reaches_components_beyond_one_page() {
    let h = Harness::new();
    h.seed_service("DESTROYING");
    let count = PAGE_SIZE + 20;
    for n in 0..count {
        h.seed_component(&format!("c{:03}", n), "Removing", &[]);
    }

    let report = h.controller.purge(&h.service_id()).await.expect("purge");

    assert!(report.is_complete());
    assert_eq!(report.deleted.len(), 1 + 2 * count);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn deallocate_guard_sees_every_page() {
    let h = Harness::new();
    h.seed_service("DEPLOYED");
    for n in 0..PAGE_SIZE {
        h.seed_component(&format!("c{:03}", n), "Running", &[]);
    }
    h.seed_component("zz_last", "Starting", &[]);

    let err = h
        .controller
        .deallocate(&h.service_id())
        .await
        .expect_err("last component is still starting");

    assert!(matches!(err, LifecycleError::Precondition(_)));
    assert!(h.store.mutations().await.is_empty());
}

#[tokio::test]
async fn allocate_rejects_component_names_that_need_escaping() {
    let h = Harness::new();
    let text = DESCRIPTOR.replace("  simple_application:\n", "  web#2:\n");
    let descriptor = parse_descriptor(&text).expect("valid descriptor");
    assert!(descriptor.components.contains_key("web#2"));

    let err = h
        .controller
        .allocate(&h.service_id(), &descriptor)
        .await
        .expect_err("name is not a valid id segment");

    assert!(matches!(err, LifecycleError::Compile(_)));
    assert!(h.store.mutations().await.is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn service_status_lists_components() {
    let h = Harness::new();
    h.seed_service("DEPLOYED");
    h.seed_component("simple_application", "Running", &[]);
    h.seed_component("sidecar", "Overload", &[]);

    let statuses = h
        .controller
        .service_status(&h.service_id())
        .await
        .expect("status should be readable");

    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].id.as_str(), "urn:ngsi-ld:Service:05:Component:sidecar");
    assert_eq!(
        statuses[0].service_component_status.as_deref(),
        Some("urn:ngsi-ld:ServiceComponentStatus:Overload")
    );
    assert_eq!(statuses[1].kind, "ServiceComponent");

    let missing = h
        .controller
        .service_status(&EntityId::new("urn:ngsi-ld:Service:404"))
        .await;
    assert!(matches!(missing, Err(LifecycleError::NotFound(_))));
}

#[tokio::test]
async fn unavailable_store_surfaces_as_store_error() {
    let h = Harness::new();
    h.store.set_unavailable(true);

    let err = h
        .controller
        .deallocate(&h.service_id())
        .await
        .expect_err("store is down");

    assert!(matches!(err, LifecycleError::Store(_)));
}
