#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Node, NodeAddress, NodeStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use serde_json::json;

use remora_meta::{
    FieldOption, Generator, MetaOptions, NodeGenerator, ResourceProjector, WorkloadGenerator,
};
use remora_store::{NameStore, Resource, SnapshotStore};

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn controller(kind: &str, name: &str, api_version: &str) -> OwnerReference {
    OwnerReference {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        controller: Some(true),
        ..Default::default()
    }
}

fn replicaset(name: &str, deployment: &str) -> Resource {
    Resource::from(ReplicaSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some(format!("uid-{name}")),
            owner_references: Some(vec![controller("Deployment", deployment, "apps/v1")]),
            ..Default::default()
        },
        ..Default::default()
    })
}

fn job(name: &str, cronjob: &str) -> Resource {
    Resource::from(Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            owner_references: Some(vec![controller("CronJob", cronjob, "batch/v1")]),
            ..Default::default()
        },
        ..Default::default()
    })
}

fn node(name: &str, hostname: Option<&str>) -> Resource {
    Resource::from(Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(format!("uid-{name}")),
            labels: Some(labels(&[("zone", "a")])),
            ..Default::default()
        },
        status: hostname.map(|h| NodeStatus {
            addresses: Some(vec![
                NodeAddress { address: "10.0.0.1".to_string(), type_: "InternalIP".to_string() },
                NodeAddress { address: h.to_string(), type_: "Hostname".to_string() },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn projector() -> ResourceProjector {
    ResourceProjector::new(MetaOptions::default())
}

#[test]
fn workload_generators_check_their_kind() {
    let rs_gen = WorkloadGenerator::replicaset(projector(), None);
    let job_gen = WorkloadGenerator::job(projector(), None);

    let rs = replicaset("web-7d9f", "web");
    let jb = job("backup-29381", "backup");

    assert!(rs_gen.generate_k8s(&rs, &[]).is_some());
    assert!(rs_gen.generate_k8s(&jb, &[]).is_none());
    assert!(job_gen.generate_k8s(&jb, &[]).is_some());
    assert!(job_gen.generate_k8s(&rs, &[]).is_none());
    assert_eq!(rs_gen.kind(), "replicaset");
}

#[test]
fn terminal_workload_kinds_project_their_own_documents() {
    let deployment = Resource::from(Deployment {
        metadata: ObjectMeta {
            name: Some("web".to_string()),
            namespace: Some("default".to_string()),
            uid: Some("uid-web".to_string()),
            ..Default::default()
        },
        ..Default::default()
    });
    let cronjob = Resource::from(CronJob {
        metadata: ObjectMeta {
            name: Some("backup".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        ..Default::default()
    });

    let doc = WorkloadGenerator::deployment(projector(), None)
        .generate_k8s(&deployment, &[])
        .unwrap();
    assert_eq!(doc.get_str("deployment.name"), Some("web"));
    assert_eq!(doc.get_str("deployment.uid"), Some("uid-web"));

    let doc =
        WorkloadGenerator::cronjob(projector(), None).generate_k8s(&cronjob, &[]).unwrap();
    assert_eq!(doc.get_str("cronjob.name"), Some("backup"));
    assert!(WorkloadGenerator::cronjob(projector(), None).generate_k8s(&deployment, &[]).is_none());
}

#[test]
fn replicaset_document_carries_its_deployment_owner() {
    let doc = WorkloadGenerator::replicaset(projector(), None)
        .generate_k8s(&replicaset("web-7d9f", "web"), &[])
        .unwrap();

    assert_eq!(doc.get_str("replicaset.name"), Some("web-7d9f"));
    assert_eq!(doc.get_str("replicaset.uid"), Some("uid-web-7d9f"));
    assert_eq!(doc.get_str("deployment.name"), Some("web"));
    assert_eq!(doc.get_str("namespace.name"), Some("default"));
}

#[test]
fn job_document_carries_its_cronjob_owner() {
    let doc = WorkloadGenerator::job(projector(), None)
        .generate_k8s(&job("backup-29381", "backup"), &[])
        .unwrap();

    assert_eq!(doc.get_str("job.name"), Some("backup-29381"));
    assert_eq!(doc.get_str("cronjob.name"), Some("backup"));
}

#[test]
fn node_hostname_comes_from_status_addresses() {
    let generator = NodeGenerator::new(projector(), None);

    let doc = generator.generate_k8s(&node("n1", Some("n1.internal")), &[]).unwrap();
    assert_eq!(doc.get_str("node.name"), Some("n1"));
    assert_eq!(doc.get_str("node.hostname"), Some("n1.internal"));

    let doc = generator.generate_k8s(&node("n2", None), &[]).unwrap();
    assert!(!doc.contains("node.hostname"));
}

#[test]
fn node_section_request_returns_one_block() {
    let generator = NodeGenerator::new(projector(), None);

    let doc = generator
        .generate_k8s(&node("n1", Some("n1.internal")), &[FieldOption::section("node")])
        .unwrap();
    assert_eq!(
        serde_json::to_value(&doc).unwrap(),
        json!({
            "node": {
                "hostname": "n1.internal",
                "labels": {"zone": "a"},
                "name": "n1",
                "uid": "uid-n1",
            }
        })
    );
}

#[test]
fn peer_lookup_semantics() {
    let store = SnapshotStore::new("replicaset");
    store.upsert(replicaset("web-7d9f", "web"));
    let handle: Arc<dyn NameStore> = Arc::new(store.clone());

    let generator = WorkloadGenerator::replicaset(projector(), Some(handle));
    let doc = generator.generate_from_name("web-7d9f", &[]).unwrap();
    assert_eq!(doc.get_str("deployment.name"), Some("web"));

    assert!(generator.generate_from_name("missing", &[]).is_none());

    // wrong kind behind the store
    store.upsert(job("sneaky", "nope"));
    assert!(generator.generate_from_name("sneaky", &[]).is_none());

    // no store attached
    let storeless = WorkloadGenerator::replicaset(projector(), None);
    assert!(storeless.generate_from_name("web-7d9f", &[]).is_none());
}

#[test]
fn peer_generate_wraps_native_and_standardized_trees() {
    let generator = WorkloadGenerator::replicaset(
        ResourceProjector::new(MetaOptions {
            cluster_name: Some("prod".to_string()),
            ..Default::default()
        }),
        None,
    );

    let doc = generator.generate(&replicaset("web-7d9f", "web"), &[]).unwrap();
    assert_eq!(doc.get_str("kubernetes.replicaset.name"), Some("web-7d9f"));
    assert_eq!(doc.get_str("kubernetes.deployment.name"), Some("web"));
    assert_eq!(doc.get_str("orchestrator.resource.type"), Some("replicaset"));
    assert_eq!(doc.get_str("orchestrator.cluster.name"), Some("prod"));
}
