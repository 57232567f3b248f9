//! Shared projection from typed resources to metadata documents.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use remora_core::Document;
use remora_store::Resource;

use crate::{FieldOption, Generator, MetaOptions};

/// Converts one typed resource into its native and standardized documents.
///
/// Shared by every generator; kind-specific logic lives in the generators
/// wrapping it. Deterministic and side-effect free: projecting the same
/// resource twice yields identical documents.
pub struct ResourceProjector {
    opts: MetaOptions,
    namespace_peer: Option<Arc<dyn Generator>>,
}

impl ResourceProjector {
    pub fn new(opts: MetaOptions) -> Self {
        Self { opts, namespace_peer: None }
    }

    /// A projector that also merges namespace metadata into every namespaced
    /// resource's document, via the namespace resolver.
    pub fn with_namespace_peer(opts: MetaOptions, peer: Arc<dyn Generator>) -> Self {
        Self { opts, namespace_peer: Some(peer) }
    }

    /// Native view: `<kind>.name` / `<kind>.uid`, controller owner names,
    /// filtered labels and annotations, the namespace block, then any caller
    /// options.
    pub fn project_k8s(&self, resource: &Resource, opts: &[FieldOption]) -> Document {
        let kind = resource.kind_label();
        let mut doc = Document::new();

        doc.put(&format!("{kind}.name"), resource.name());
        if let Some(uid) = resource.uid() {
            doc.put(&format!("{kind}.uid"), uid);
        }

        for owner in resource.owner_references() {
            if owner.controller != Some(true) {
                continue;
            }
            if let Some(owner_kind) = workload_kind_label(&owner.kind) {
                doc.put(&format!("{owner_kind}.name"), owner.name.as_str());
            }
        }

        let labels = self.filter_labels(resource.labels());
        if !labels.is_empty() {
            // label keys may contain dots; they are data, not paths
            doc.put("labels", Value::Object(to_object(labels)));
        }

        let annotations = self.select_annotations(resource.annotations());
        if !annotations.is_empty() {
            doc.put("annotations", Value::Object(to_object(annotations)));
        }

        if let Some(ns) = resource.namespace() {
            doc.put("namespace.name", ns);
            if let Some(peer) = &self.namespace_peer {
                if let Some(ns_doc) =
                    peer.generate_from_name(ns, &[FieldOption::section("namespace")])
                {
                    doc.deep_merge(ns_doc);
                }
            }
        }

        apply_options(&mut doc, opts);
        doc
    }

    /// Standardized view: the ECS `orchestrator` fieldset.
    pub fn project_ecs(&self, resource: &Resource) -> Document {
        let mut doc = Document::new();
        doc.put("orchestrator.type", "kubernetes");
        if let Some(name) = self.opts.cluster_name.as_deref() {
            doc.put("orchestrator.cluster.name", name);
        }
        if let Some(url) = self.opts.cluster_url.as_deref() {
            doc.put("orchestrator.cluster.url", url);
        }
        if let Some(ns) = resource.namespace() {
            doc.put("orchestrator.namespace", ns);
        }
        doc.put("orchestrator.resource.name", resource.name());
        if let Some(uid) = resource.uid() {
            doc.put("orchestrator.resource.id", uid);
        }
        doc.put("orchestrator.resource.type", resource.kind_label());

        let labels = self.filter_labels(resource.labels());
        if !labels.is_empty() {
            let list: Vec<Value> =
                labels.into_iter().map(|(k, v)| Value::String(format!("{k}={v}"))).collect();
            doc.put("orchestrator.resource.label", Value::Array(list));
        }
        doc
    }

    fn filter_labels<'a>(
        &self,
        labels: Option<&'a BTreeMap<String, String>>,
    ) -> Vec<(&'a str, &'a str)> {
        let Some(labels) = labels else { return Vec::new() };
        labels
            .iter()
            .filter(|(key, _)| {
                self.opts.include_labels.is_empty()
                    || self.opts.include_labels.iter().any(|k| k == *key)
            })
            .filter(|(key, _)| !self.opts.exclude_labels.iter().any(|k| k == *key))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    fn select_annotations<'a>(
        &self,
        annotations: Option<&'a BTreeMap<String, String>>,
    ) -> Vec<(&'a str, &'a str)> {
        let Some(annotations) = annotations else { return Vec::new() };
        annotations
            .iter()
            .filter(|(key, _)| self.opts.include_annotations.iter().any(|k| k == *key))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

fn apply_options(doc: &mut Document, opts: &[FieldOption]) {
    for opt in opts {
        match opt {
            FieldOption::Section(section) => doc.restrict_to(section),
        }
    }
}

fn to_object(entries: Vec<(&str, &str)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

fn workload_kind_label(kind: &str) -> Option<&'static str> {
    match kind {
        "Deployment" => Some("deployment"),
        "ReplicaSet" => Some("replicaset"),
        "StatefulSet" => Some("statefulset"),
        "DaemonSet" => Some("daemonset"),
        "Job" => Some("job"),
        "CronJob" => Some("cronjob"),
        _ => None,
    }
}
