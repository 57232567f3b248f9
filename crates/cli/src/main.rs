#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use tokio::signal;
use tracing::info;

use remora_core::Document;
use remora_meta::{pod_generator, EnrichOptions, Generator};
use remora_store::{Resource, StoreSet};

#[derive(Parser, Debug)]
#[command(name = "remora", version, about = "Kubernetes pod metadata enrichment")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Enrichment options as a JSON file; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cluster name stamped into the orchestrator fields
    #[arg(long = "cluster-name", env = "REMORA_CLUSTER_NAME", global = true)]
    cluster_name: Option<String>,

    /// Cluster URL stamped into the orchestrator fields
    #[arg(long = "cluster-url", env = "REMORA_CLUSTER_URL", global = true)]
    cluster_url: Option<String>,

    /// Keep only these label keys (repeatable; default keeps all)
    #[arg(long = "include-label", global = true)]
    include_labels: Vec<String>,

    /// Drop these label keys (repeatable; wins over --include-label)
    #[arg(long = "exclude-label", global = true)]
    exclude_labels: Vec<String>,

    /// Copy these annotation keys (repeatable; none are copied by default)
    #[arg(long = "include-annotation", global = true)]
    include_annotations: Vec<String>,

    /// Skip the replicaset-to-deployment owner hop
    #[arg(long = "no-deployment", action = ArgAction::SetTrue, global = true)]
    no_deployment: bool,

    /// Skip the job-to-cronjob owner hop
    #[arg(long = "no-cronjob", action = ArgAction::SetTrue, global = true)]
    no_cronjob: bool,

    /// Skip node metadata (pods keep the bare node name)
    #[arg(long = "no-node", action = ArgAction::SetTrue, global = true)]
    no_node: bool,

    /// Skip namespace metadata
    #[arg(long = "no-namespace", action = ArgAction::SetTrue, global = true)]
    no_namespace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the cluster and print enriched pod metadata as pods change
    Watch {
        /// Seconds between pod cache scans
        #[arg(long = "interval", default_value_t = 2)]
        interval: u64,
    },
    /// Enrich one pod manifest offline from local JSON fixtures
    Enrich {
        /// Pod manifest (JSON)
        pod: PathBuf,
        /// ReplicaSet fixtures, a JSON array
        #[arg(long)]
        replicasets: Option<PathBuf>,
        /// Job fixtures, a JSON array
        #[arg(long)]
        jobs: Option<PathBuf>,
        /// Node fixtures, a JSON array
        #[arg(long)]
        nodes: Option<PathBuf>,
        /// Namespace fixtures, a JSON array
        #[arg(long)]
        namespaces: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env = std::env::var("REMORA_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("REMORA_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid REMORA_METRICS_ADDR; expected host:port");
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn load_options(cli: &Cli) -> Result<EnrichOptions> {
    let mut opts: EnrichOptions = match &cli.config {
        Some(path) => read_json(path)?,
        None => EnrichOptions::default(),
    };
    if let Some(name) = &cli.cluster_name {
        opts.resource.cluster_name = Some(name.clone());
    }
    if let Some(url) = &cli.cluster_url {
        opts.resource.cluster_url = Some(url.clone());
    }
    if !cli.include_labels.is_empty() {
        opts.resource.include_labels = cli.include_labels.clone();
    }
    if !cli.exclude_labels.is_empty() {
        opts.resource.exclude_labels = cli.exclude_labels.clone();
    }
    if !cli.include_annotations.is_empty() {
        opts.resource.include_annotations = cli.include_annotations.clone();
    }
    if cli.no_deployment {
        opts.resolve.deployment = false;
    }
    if cli.no_cronjob {
        opts.resolve.cronjob = false;
    }
    if cli.no_node {
        opts.node = false;
    }
    if cli.no_namespace {
        opts.namespace = false;
    }
    Ok(opts)
}

/// One-line summary for human output: the first workload owner found in the
/// document, most specific kind first.
fn owner_label(doc: &Document) -> Option<String> {
    for kind in ["deployment", "cronjob", "statefulset", "daemonset", "job", "replicaset"] {
        if let Some(name) = doc.get_str(&format!("kubernetes.{kind}.name")) {
            return Some(format!("{kind}/{name}"));
        }
    }
    None
}

fn summary_line(resource: &Resource, doc: &Document) -> String {
    let ns = resource.namespace().unwrap_or("-");
    let node = doc
        .get_str("kubernetes.node.name")
        .filter(|s| !s.is_empty())
        .unwrap_or("-");
    let owner = owner_label(doc).unwrap_or_else(|| "-".to_string());
    format!("{}/{} node={} owner={}", ns, resource.name(), node, owner)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let opts = load_options(&cli)?;

    match cli.command {
        Commands::Watch { interval } => {
            info!(interval, "watch invoked");
            let client = remora_watch::client().await?;
            let (stores, synced) = remora_watch::spawn_store_set(&client, &opts).await?;

            // Wait for the initial lists (configurable)
            let wait_secs = std::env::var("REMORA_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(8);
            synced.wait(Duration::from_secs(wait_secs)).await?;
            info!("stores synced; resolving pods");

            let generator = pod_generator(&stores, &opts);

            // Rescan the pod store on a timer and print documents for pods
            // whose resourceVersion moved.
            let mut seen_rv: HashMap<String, String> = HashMap::new();
            let mut tick = tokio::time::interval(Duration::from_secs(interval.max(1)));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let snap = stores.pods.snapshot();
                        let mut names: Vec<&String> = snap.keys().collect();
                        names.sort();
                        for name in names {
                            let Some(resource) = snap.get(name) else { continue };
                            let rv = resource
                                .metadata()
                                .resource_version
                                .clone()
                                .unwrap_or_default();
                            if seen_rv.get(name.as_str()) == Some(&rv) {
                                continue;
                            }
                            seen_rv.insert(name.clone(), rv);
                            let Some(doc) = generator.generate(resource, &[]) else { continue };
                            match cli.output {
                                Output::Human => println!("+ {}", summary_line(resource, &doc)),
                                Output::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
                            }
                        }
                        seen_rv.retain(|name, _| {
                            let keep = snap.contains_key(name);
                            if !keep && cli.output == Output::Human {
                                println!("- {name}");
                            }
                            keep
                        });
                    }
                    _ = signal::ctrl_c() => {
                        info!("Ctrl-C received; shutting down watch loop");
                        break;
                    }
                }
            }
        }
        Commands::Enrich { pod, replicasets, jobs, nodes, namespaces } => {
            let manifest: Pod = read_json(&pod)?;
            let stores = StoreSet::new();
            if let Some(path) = replicasets {
                for item in read_json::<Vec<ReplicaSet>>(&path)? {
                    stores.replica_sets.upsert(item.into());
                }
            }
            if let Some(path) = jobs {
                for item in read_json::<Vec<Job>>(&path)? {
                    stores.jobs.upsert(item.into());
                }
            }
            if let Some(path) = nodes {
                for item in read_json::<Vec<Node>>(&path)? {
                    stores.nodes.upsert(item.into());
                }
            }
            if let Some(path) = namespaces {
                for item in read_json::<Vec<Namespace>>(&path)? {
                    stores.namespaces.upsert(item.into());
                }
            }

            let generator = pod_generator(&stores, &opts);
            let resource: Resource = manifest.into();
            let doc = generator
                .generate(&resource, &[])
                .context("manifest is not a pod")?;
            match cli.output {
                Output::Human => println!("{}", summary_line(&resource, &doc)),
                Output::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
            }
        }
    }
    Ok(())
}
