//! Remora metadata resolvers: shared projection plus the pod owner-chain.

#![forbid(unsafe_code)]

mod peers;
mod pod;
mod project;

use std::sync::Arc;

use serde::Deserialize;

use remora_core::Document;
use remora_store::{NameStore, Resource, SnapshotStore, StoreSet};

pub use peers::{NamespaceGenerator, NodeGenerator, WorkloadGenerator};
pub use pod::PodGenerator;
pub use project::ResourceProjector;

/// Field-selection directive accepted by every generator operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOption {
    /// Restrict the output to one named sub-document, folding the generic
    /// `labels`/`annotations` sections under it.
    Section(String),
}

impl FieldOption {
    pub fn section(name: impl Into<String>) -> Self {
        FieldOption::Section(name.into())
    }
}

/// Projection settings shared by every generator in one pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetaOptions {
    /// Label keys to project; empty means all.
    pub include_labels: Vec<String>,
    /// Label keys to drop; wins over `include_labels`.
    pub exclude_labels: Vec<String>,
    /// Annotation keys to project. Annotations are opt-in, default none.
    pub include_annotations: Vec<String>,
    pub cluster_name: Option<String>,
    pub cluster_url: Option<String>,
}

/// Owner-chain hop toggles, fixed at construction.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    pub deployment: bool,
    pub cronjob: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { deployment: true, cronjob: true }
    }
}

/// Wiring configuration for one enrichment pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichOptions {
    pub resource: MetaOptions,
    pub resolve: ResolveOptions,
    /// Attach a node generator (full `node` sub-documents instead of the
    /// bare `node.name` fallback).
    pub node: bool,
    /// Attach a namespace generator (namespace labels and annotations merged
    /// into every namespaced document).
    pub namespace: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            resource: MetaOptions::default(),
            resolve: ResolveOptions::default(),
            node: true,
            namespace: true,
        }
    }
}

/// One resource kind's metadata resolver.
///
/// Every kind exposes the same four operations, and owner hops call peer
/// resolvers through this contract. Calls are synchronous snapshot reads;
/// partial failures are absorbed by omitting fields, never surfaced.
pub trait Generator: Send + Sync {
    /// Full document: the native tree under `kubernetes`, standardized
    /// fields deep-merged over it (standardized leaves win on collision).
    fn generate(&self, resource: &Resource, opts: &[FieldOption]) -> Option<Document> {
        let native = self.generate_k8s(resource, opts)?;
        let mut doc = Document::wrapping("kubernetes", native);
        if let Some(standard) = self.generate_ecs(resource) {
            doc.deep_merge(standard);
        }
        Some(doc)
    }

    /// Standardized-schema projection (`orchestrator.*`).
    fn generate_ecs(&self, resource: &Resource) -> Option<Document>;

    /// Native projection. `None` when `resource` is not this generator's
    /// kind; callers treat that as "not applicable", not as an error.
    fn generate_k8s(&self, resource: &Resource, opts: &[FieldOption]) -> Option<Document>;

    /// Store lookup by object name, then [`generate_k8s`](Self::generate_k8s).
    /// `None` when no store is attached, the key is absent, or the stored
    /// object has the wrong kind.
    fn generate_from_name(&self, name: &str, opts: &[FieldOption]) -> Option<Document>;
}

/// Compose the standard pod pipeline over `stores`.
///
/// Peers are attached per the options: namespace metadata folds into every
/// namespaced document, the node peer serves full `node` sub-documents, and
/// the replicaset/job peers back the deployment and cronjob hops. The peer
/// graph never points back at the pod generator.
pub fn pod_generator(stores: &StoreSet, opts: &EnrichOptions) -> PodGenerator {
    let meta = &opts.resource;

    let projector = if opts.namespace {
        let namespaces = NamespaceGenerator::new(
            ResourceProjector::new(meta.clone()),
            Some(store_handle(&stores.namespaces)),
        );
        ResourceProjector::with_namespace_peer(meta.clone(), Arc::new(namespaces))
    } else {
        ResourceProjector::new(meta.clone())
    };

    let mut generator =
        PodGenerator::new(projector, Some(store_handle(&stores.pods)), opts.resolve);

    if opts.node {
        generator = generator.with_node(Arc::new(NodeGenerator::new(
            ResourceProjector::new(meta.clone()),
            Some(store_handle(&stores.nodes)),
        )));
    }
    if opts.resolve.deployment {
        generator = generator.with_replicaset(Arc::new(WorkloadGenerator::replicaset(
            ResourceProjector::new(meta.clone()),
            Some(store_handle(&stores.replica_sets)),
        )));
    }
    if opts.resolve.cronjob {
        generator = generator.with_job(Arc::new(WorkloadGenerator::job(
            ResourceProjector::new(meta.clone()),
            Some(store_handle(&stores.jobs)),
        )));
    }
    generator
}

fn store_handle(store: &SnapshotStore) -> Arc<dyn NameStore> {
    Arc::new(store.clone())
}
