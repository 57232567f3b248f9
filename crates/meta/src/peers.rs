//! Peer resolvers the pod generator hops through.

use std::sync::Arc;

use remora_core::Document;
use remora_store::{NameStore, Resource};

use crate::{FieldOption, Generator, ResourceProjector};

/// Node metadata, extended with the hostname from the node's status
/// addresses.
pub struct NodeGenerator {
    projector: ResourceProjector,
    store: Option<Arc<dyn NameStore>>,
}

impl NodeGenerator {
    pub fn new(projector: ResourceProjector, store: Option<Arc<dyn NameStore>>) -> Self {
        Self { projector, store }
    }
}

impl Generator for NodeGenerator {
    fn generate_ecs(&self, resource: &Resource) -> Option<Document> {
        Some(self.projector.project_ecs(resource))
    }

    fn generate_k8s(&self, resource: &Resource, opts: &[FieldOption]) -> Option<Document> {
        let node = match resource {
            Resource::Node(node) => node,
            _ => return None,
        };
        let mut doc = self.projector.project_k8s(resource, opts);
        let hostname = node
            .status
            .as_ref()
            .and_then(|status| status.addresses.as_ref())
            .and_then(|addresses| addresses.iter().find(|a| a.type_ == "Hostname"))
            .map(|a| a.address.as_str())
            .filter(|hostname| !hostname.is_empty());
        if let Some(hostname) = hostname {
            doc.put("node.hostname", hostname);
        }
        Some(doc)
    }

    fn generate_from_name(&self, name: &str, opts: &[FieldOption]) -> Option<Document> {
        let resource = self.store.as_ref()?.get_by_key(name)?;
        self.generate_k8s(&resource, opts)
    }
}

/// Namespace metadata. Namespaces are cluster-scoped, so this resolver never
/// carries a namespace peer of its own.
pub struct NamespaceGenerator {
    projector: ResourceProjector,
    store: Option<Arc<dyn NameStore>>,
}

impl NamespaceGenerator {
    pub fn new(projector: ResourceProjector, store: Option<Arc<dyn NameStore>>) -> Self {
        Self { projector, store }
    }
}

impl Generator for NamespaceGenerator {
    fn generate_ecs(&self, resource: &Resource) -> Option<Document> {
        Some(self.projector.project_ecs(resource))
    }

    fn generate_k8s(&self, resource: &Resource, opts: &[FieldOption]) -> Option<Document> {
        if !matches!(resource, Resource::Namespace(_)) {
            return None;
        }
        Some(self.projector.project_k8s(resource, opts))
    }

    fn generate_from_name(&self, name: &str, opts: &[FieldOption]) -> Option<Document> {
        let resource = self.store.as_ref()?.get_by_key(name)?;
        self.generate_k8s(&resource, opts)
    }
}

/// Controller workload metadata (ReplicaSet, Job, Deployment, CronJob), one
/// implementation tagged by kind.
///
/// The owner hops read through these: a replicaset's document carries
/// `deployment.name` from its controller reference, a job's carries
/// `cronjob.name`.
pub struct WorkloadGenerator {
    kind: &'static str,
    projector: ResourceProjector,
    store: Option<Arc<dyn NameStore>>,
}

impl WorkloadGenerator {
    pub fn replicaset(projector: ResourceProjector, store: Option<Arc<dyn NameStore>>) -> Self {
        Self { kind: "replicaset", projector, store }
    }

    pub fn job(projector: ResourceProjector, store: Option<Arc<dyn NameStore>>) -> Self {
        Self { kind: "job", projector, store }
    }

    pub fn deployment(projector: ResourceProjector, store: Option<Arc<dyn NameStore>>) -> Self {
        Self { kind: "deployment", projector, store }
    }

    pub fn cronjob(projector: ResourceProjector, store: Option<Arc<dyn NameStore>>) -> Self {
        Self { kind: "cronjob", projector, store }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl Generator for WorkloadGenerator {
    fn generate_ecs(&self, resource: &Resource) -> Option<Document> {
        Some(self.projector.project_ecs(resource))
    }

    fn generate_k8s(&self, resource: &Resource, opts: &[FieldOption]) -> Option<Document> {
        if resource.kind_label() != self.kind {
            return None;
        }
        Some(self.projector.project_k8s(resource, opts))
    }

    fn generate_from_name(&self, name: &str, opts: &[FieldOption]) -> Option<Document> {
        let resource = self.store.as_ref()?.get_by_key(name)?;
        self.generate_k8s(&resource, opts)
    }
}
