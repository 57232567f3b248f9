//! Remora core types: the metadata `Document` model.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nested metadata document addressed by dotted field paths.
///
/// Backed by `serde_json::Map` (BTreeMap keys), so iteration and
/// serialization order is stable: generating the same document twice yields
/// byte-identical JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Resolve a dotted path (`"replicaset.name"`) to a value, if every
    /// intermediate segment exists and is an object.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Like [`get`](Self::get), narrowed to string leaves.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Insert a value at a dotted path, creating intermediate objects as
    /// needed. A non-object intermediate is replaced by a fresh object.
    pub fn put(&mut self, path: &str, value: impl Into<Value>) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = match segments.pop() {
            Some(leaf) => leaf,
            None => return,
        };
        let mut current = &mut self.0;
        for segment in segments {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot.as_object_mut() {
                Some(map) => map,
                None => return,
            };
        }
        current.insert(leaf.to_string(), value.into());
    }

    /// Remove the value at a dotted path, returning it if present.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments.pop()?;
        let mut current = &mut self.0;
        for segment in segments {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        current.remove(leaf)
    }

    /// Recursive union: nested objects merge, any other value from `other`
    /// overwrites what is already there.
    pub fn deep_merge(&mut self, other: Document) {
        merge_objects(&mut self.0, other.0);
    }

    /// Restrict the document to one named sub-document: fold the generic
    /// `labels` and `annotations` sections under it, drop everything else.
    ///
    /// Used when one resolver asks another for a single section, e.g. a
    /// node's `node` tree.
    pub fn restrict_to(&mut self, section: &str) {
        if let Some(labels) = self.0.remove("labels") {
            self.put(&format!("{section}.labels"), labels);
        }
        if let Some(annotations) = self.0.remove("annotations") {
            self.put(&format!("{section}.annotations"), annotations);
        }
        let kept = self.0.remove(section);
        self.0.clear();
        if let Some(sub) = kept {
            self.0.insert(section.to_string(), sub);
        }
    }

    /// Build a single-key document wrapping `inner` under `key`.
    pub fn wrapping(key: &str, inner: impl Into<Value>) -> Self {
        let mut doc = Self::new();
        doc.put(key, inner);
        doc
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc.0)
    }
}

fn merge_objects(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (key, value) in src {
        match (dst.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_objects(existing, incoming)
            }
            (_, value) => {
                dst.insert(key, value);
            }
        }
    }
}

pub mod prelude {
    pub use super::Document;
}
