//! Pod resolver: shared projection plus owner-chain and node/IP enrichment.

use std::sync::Arc;

use tracing::trace;

use remora_core::Document;
use remora_store::{NameStore, Resource};

use crate::{FieldOption, Generator, ResolveOptions, ResourceProjector};

/// Resolves pod metadata: base projection, then the Deployment hop (via the
/// pod's ReplicaSet), the CronJob hop (via its Job), the node block, and the
/// pod IP.
///
/// Hops are independent and any one failing only omits its field. Peers are
/// attached at construction; the peer graph is acyclic (pod resolvers point
/// at replicaset/job/node resolvers, never the other way).
pub struct PodGenerator {
    projector: ResourceProjector,
    store: Option<Arc<dyn NameStore>>,
    node: Option<Arc<dyn Generator>>,
    replicaset: Option<Arc<dyn Generator>>,
    job: Option<Arc<dyn Generator>>,
    resolve: ResolveOptions,
}

impl PodGenerator {
    pub fn new(
        projector: ResourceProjector,
        store: Option<Arc<dyn NameStore>>,
        resolve: ResolveOptions,
    ) -> Self {
        Self { projector, store, node: None, replicaset: None, job: None, resolve }
    }

    pub fn with_node(mut self, peer: Arc<dyn Generator>) -> Self {
        self.node = Some(peer);
        self
    }

    pub fn with_replicaset(mut self, peer: Arc<dyn Generator>) -> Self {
        self.replicaset = Some(peer);
        self
    }

    pub fn with_job(mut self, peer: Arc<dyn Generator>) -> Self {
        self.job = Some(peer);
        self
    }

    /// One owner hop: read the link field from the in-progress document,
    /// resolve the named owner through the peer, read the target field from
    /// the owner's document. Any missing link yields `None`.
    fn hop(
        doc: &Document,
        peer: &Arc<dyn Generator>,
        link_field: &str,
        target_field: &str,
    ) -> Option<String> {
        let owner_name = doc.get_str(link_field).filter(|n| !n.is_empty())?;
        let owner_doc = peer.generate_from_name(owner_name, &[]);
        match owner_doc.as_ref().and_then(|d| d.get_str(target_field)).filter(|n| !n.is_empty()) {
            Some(target) => Some(target.to_string()),
            None => {
                trace!(owner = owner_name, field = target_field, "owner hop unresolved");
                None
            }
        }
    }
}

impl Generator for PodGenerator {
    fn generate_ecs(&self, resource: &Resource) -> Option<Document> {
        Some(self.projector.project_ecs(resource))
    }

    fn generate_k8s(&self, resource: &Resource, opts: &[FieldOption]) -> Option<Document> {
        let pod = match resource {
            Resource::Pod(pod) => pod,
            _ => return None,
        };

        let mut doc = self.projector.project_k8s(resource, opts);

        // Deployment -> ReplicaSet -> Pod
        if self.resolve.deployment {
            if let Some(peer) = &self.replicaset {
                if let Some(name) = Self::hop(&doc, peer, "replicaset.name", "deployment.name") {
                    doc.put("deployment.name", name);
                }
            }
        }

        // CronJob -> Job -> Pod; the lookup goes through the job resolver
        if self.resolve.cronjob {
            if let Some(peer) = &self.job {
                if let Some(name) = Self::hop(&doc, peer, "job.name", "cronjob.name") {
                    doc.put("cronjob.name", name);
                }
            }
        }

        let node_name = pod.spec.as_ref().and_then(|s| s.node_name.as_deref()).unwrap_or("");
        let node_section = self.node.as_ref().and_then(|peer| {
            peer.generate_from_name(node_name, &[FieldOption::section("node")])
                .and_then(|mut node_doc| node_doc.remove("node"))
        });
        match node_section {
            // replaces any partial node info wholesale
            Some(section) => doc.put("node", section),
            None => doc.put("node.name", node_name),
        }

        if let Some(ip) = pod.status.as_ref().and_then(|s| s.pod_ip.as_deref()) {
            if !ip.is_empty() {
                doc.put("pod.ip", ip);
            }
        }

        Some(doc)
    }

    fn generate_from_name(&self, name: &str, opts: &[FieldOption]) -> Option<Document> {
        let store = self.store.as_ref()?;
        let resource = store.get_by_key(name)?;
        self.generate_k8s(&resource, opts)
    }
}
