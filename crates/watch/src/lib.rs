//! Remora watch layer: one list+watch task per kind, feeding the stores.

#![forbid(unsafe_code)]

use std::fmt::Debug;
use std::time::Duration;

use futures::{pin_mut, StreamExt};
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::api::ListParams;
use kube::runtime::watcher::{self, Event};
use kube::{Api, Client, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use remora_meta::EnrichOptions;
use remora_store::{Resource, SnapshotStore, StoreSet};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("kube client init: {0}")]
    ClientInit(#[source] kube::Error),
    #[error("listing {kind}: {source}")]
    ResourceList { kind: &'static str, source: kube::Error },
    #[error("timed out waiting for {kind} store sync")]
    SyncTimeout { kind: &'static str },
    #[error("{kind} watcher stopped before first sync")]
    WatchStopped { kind: &'static str },
}

pub type WatchResult<T> = Result<T, WatchError>;

/// Connect with in-cluster config when available, else the local kubeconfig.
pub async fn client() -> WatchResult<Client> {
    Client::try_default().await.map_err(WatchError::ClientInit)
}

/// First-sync signals for every spawned watcher.
pub struct Synced {
    ready: Vec<(&'static str, oneshot::Receiver<()>)>,
}

impl Synced {
    /// Wait until every watched kind has landed its first full list, under
    /// one shared deadline.
    pub async fn wait(self, timeout: Duration) -> WatchResult<()> {
        let deadline = Instant::now() + timeout;
        for (kind, ready) in self.ready {
            match timeout_at(deadline, ready).await {
                Ok(Ok(())) => debug!(kind, "store synced"),
                Ok(Err(_)) => return Err(WatchError::WatchStopped { kind }),
                Err(_) => return Err(WatchError::SyncTimeout { kind }),
            }
        }
        Ok(())
    }
}

/// Start watchers for every kind the options call for and hand back the
/// stores they populate.
///
/// Kinds the options disable keep empty stores, so resolver lookups against
/// them miss instead of failing. Each kind is probed with a one-item list
/// first, surfacing connectivity and RBAC problems as typed errors instead
/// of silent retry loops.
pub async fn spawn_store_set(
    client: &Client,
    opts: &EnrichOptions,
) -> WatchResult<(StoreSet, Synced)> {
    let stores = StoreSet::new();
    let mut ready = Vec::new();

    ready.push(("pod", spawn_kind::<Pod>(client, stores.pods.clone()).await?));
    if opts.namespace {
        ready.push(("namespace", spawn_kind::<Namespace>(client, stores.namespaces.clone()).await?));
    }
    if opts.node {
        ready.push(("node", spawn_kind::<Node>(client, stores.nodes.clone()).await?));
    }
    if opts.resolve.deployment {
        ready.push(("replicaset", spawn_kind::<ReplicaSet>(client, stores.replica_sets.clone()).await?));
    }
    if opts.resolve.cronjob {
        ready.push(("job", spawn_kind::<Job>(client, stores.jobs.clone()).await?));
    }

    Ok((stores, Synced { ready }))
}

async fn spawn_kind<K>(client: &Client, store: SnapshotStore) -> WatchResult<oneshot::Receiver<()>>
where
    K: kube::Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    Resource: From<K>,
{
    let api: Api<K> = Api::all(client.clone());
    api.list(&ListParams::default().limit(1))
        .await
        .map_err(|source| WatchError::ResourceList { kind: store.kind(), source })?;

    let (tx, rx) = oneshot::channel();
    tokio::spawn(run_watcher(api, store, tx));
    Ok(rx)
}

async fn run_watcher<K>(api: Api<K>, store: SnapshotStore, ready: oneshot::Sender<()>)
where
    K: kube::Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    Resource: From<K>,
{
    let kind = store.kind();
    let stream = watcher::watcher(api, watcher::Config::default());
    pin_mut!(stream);
    let mut ready = Some(ready);
    info!(kind, "watcher started");

    while let Some(next) = stream.next().await {
        match next {
            Ok(Event::Applied(obj)) => store.upsert(Resource::from(obj)),
            Ok(Event::Deleted(obj)) => store.remove(&obj.name_any()),
            Ok(Event::Restarted(list)) => {
                store.replace_all(list.into_iter().map(Resource::from).collect());
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
            }
            // the watcher stream re-lists by itself; keep the last snapshot
            Err(err) => warn!(kind, error = %err, "watch error"),
        }
    }
    warn!(kind, "watcher stream ended");
}
