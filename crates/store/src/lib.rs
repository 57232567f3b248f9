//! Remora stores: name-keyed resource snapshots behind `ArcSwap`.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use metrics::{counter, gauge};
use rustc_hash::FxHashMap;
use tracing::debug;

/// A watched Kubernetes object, tagged by kind and shared via `Arc`.
#[derive(Debug, Clone)]
pub enum Resource {
    Pod(Arc<Pod>),
    Node(Arc<Node>),
    Namespace(Arc<Namespace>),
    ReplicaSet(Arc<ReplicaSet>),
    Deployment(Arc<Deployment>),
    Job(Arc<Job>),
    CronJob(Arc<CronJob>),
}

macro_rules! impl_resource_from {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Resource {
                fn from(obj: $ty) -> Self { Resource::$variant(Arc::new(obj)) }
            }
            impl From<Arc<$ty>> for Resource {
                fn from(obj: Arc<$ty>) -> Self { Resource::$variant(obj) }
            }
        )+
    };
}

impl_resource_from! {
    Pod => Pod,
    Node => Node,
    Namespace => Namespace,
    ReplicaSet => ReplicaSet,
    Deployment => Deployment,
    Job => Job,
    CronJob => CronJob,
}

impl Resource {
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Resource::Pod(o) => &o.metadata,
            Resource::Node(o) => &o.metadata,
            Resource::Namespace(o) => &o.metadata,
            Resource::ReplicaSet(o) => &o.metadata,
            Resource::Deployment(o) => &o.metadata,
            Resource::Job(o) => &o.metadata,
            Resource::CronJob(o) => &o.metadata,
        }
    }

    /// Lowercased kind, as used in document field paths and store labels.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Resource::Pod(_) => "pod",
            Resource::Node(_) => "node",
            Resource::Namespace(_) => "namespace",
            Resource::ReplicaSet(_) => "replicaset",
            Resource::Deployment(_) => "deployment",
            Resource::Job(_) => "job",
            Resource::CronJob(_) => "cronjob",
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or("")
    }

    pub fn uid(&self) -> Option<&str> {
        self.metadata().uid.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().labels.as_ref()
    }

    pub fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().annotations.as_ref()
    }

    pub fn owner_references(&self) -> &[OwnerReference] {
        self.metadata().owner_references.as_deref().unwrap_or(&[])
    }
}

/// Read side of a store: look resources up by object name.
///
/// A missing key is an ordinary outcome, not an error; callers degrade by
/// omitting whatever the hit would have contributed.
pub trait NameStore: Send + Sync {
    fn get_by_key(&self, key: &str) -> Option<Resource>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Map = FxHashMap<String, Resource>;

/// Lock-free name-keyed store: readers load a full snapshot `Arc`, the watch
/// task swaps in rebuilt maps. Clones share the same map.
#[derive(Clone)]
pub struct SnapshotStore {
    kind: &'static str,
    map: Arc<ArcSwap<Map>>,
}

impl SnapshotStore {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, map: Arc::new(ArcSwap::from_pointee(Map::default())) }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Current snapshot; later writes never mutate it.
    pub fn snapshot(&self) -> Arc<Map> {
        self.map.load_full()
    }

    pub fn upsert(&self, resource: Resource) {
        let name = resource.name();
        if name.is_empty() {
            debug!(kind = self.kind, "store: dropping unnamed object");
            return;
        }
        let name = name.to_string();
        let cur = self.map.load_full();
        let mut next = Map::clone(&cur);
        next.insert(name, resource);
        let count = next.len();
        self.map.store(Arc::new(next));
        counter!("remora_store_events_total", "kind" => self.kind, "op" => "upsert").increment(1);
        gauge!("remora_store_objects", "kind" => self.kind).set(count as f64);
    }

    pub fn remove(&self, name: &str) {
        let cur = self.map.load_full();
        if !cur.contains_key(name) {
            return;
        }
        let mut next = Map::clone(&cur);
        next.remove(name);
        let count = next.len();
        self.map.store(Arc::new(next));
        counter!("remora_store_events_total", "kind" => self.kind, "op" => "remove").increment(1);
        gauge!("remora_store_objects", "kind" => self.kind).set(count as f64);
    }

    /// Swap in a full relist, dropping everything not in `items`.
    pub fn replace_all(&self, items: Vec<Resource>) {
        let mut next = Map::with_capacity_and_hasher(items.len(), Default::default());
        for item in items {
            let name = item.name();
            if name.is_empty() {
                continue;
            }
            next.insert(name.to_string(), item);
        }
        let count = next.len();
        self.map.store(Arc::new(next));
        counter!("remora_store_events_total", "kind" => self.kind, "op" => "replace").increment(1);
        gauge!("remora_store_objects", "kind" => self.kind).set(count as f64);
        debug!(kind = self.kind, count, "store: snapshot replaced");
    }
}

impl NameStore for SnapshotStore {
    fn get_by_key(&self, key: &str) -> Option<Resource> {
        self.map.load().get(key).cloned()
    }

    fn len(&self) -> usize {
        self.map.load().len()
    }
}

/// The per-kind stores one enrichment pipeline reads from.
///
/// Kinds the configuration does not watch keep their empty store, so lookups
/// against them miss instead of failing.
#[derive(Clone)]
pub struct StoreSet {
    pub pods: SnapshotStore,
    pub nodes: SnapshotStore,
    pub namespaces: SnapshotStore,
    pub replica_sets: SnapshotStore,
    pub jobs: SnapshotStore,
}

impl StoreSet {
    pub fn new() -> Self {
        Self {
            pods: SnapshotStore::new("pod"),
            nodes: SnapshotStore::new("node"),
            namespaces: SnapshotStore::new("namespace"),
            replica_sets: SnapshotStore::new("replicaset"),
            jobs: SnapshotStore::new("job"),
        }
    }
}

impl Default for StoreSet {
    fn default() -> Self {
        Self::new()
    }
}
