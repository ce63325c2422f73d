//! Resource store seam over the dashboard's cluster state.
//!
//! Everything that persists settings or agent configuration goes through
//! [`ResourceStore`], so callers never depend on a concrete global store.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Resource types the extension reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Secret,
    ConfigMap,
    Deployment,
    AgentConfig,
}

impl ResourceKind {
    /// Schema id as the dashboard store names it.
    pub fn schema_id(&self) -> &'static str {
        match self {
            ResourceKind::Secret => "secret",
            ResourceKind::ConfigMap => "configmap",
            ResourceKind::Deployment => "apps.deployment",
            ResourceKind::AgentConfig => "ai.cattle.io.aiagentconfig",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    List,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// A stored object. `data` carries secret/config-map payloads, `spec` everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl Resource {
    pub fn new(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..Default::default()
            },
            type_: None,
            data: BTreeMap::new(),
            spec: serde_json::Value::Null,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("not allowed to {verb:?} {kind}")]
    Forbidden { kind: ResourceKind, verb: Verb },

    #[error("invalid patch for {kind} {name}: {message}")]
    InvalidPatch {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Whether the caller's schema grants `verb` on `kind`.
    fn can(&self, kind: ResourceKind, verb: Verb) -> bool;

    async fn find(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Resource, StoreError>;

    async fn find_all(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<Resource>, StoreError>;

    /// Create the resource, replacing any existing one with the same name.
    async fn create(&self, resource: Resource) -> Result<Resource, StoreError>;

    /// Apply a JSON merge patch to the stored resource.
    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<Resource, StoreError>;

    async fn remove(&self, kind: ResourceKind, namespace: &str, name: &str)
        -> Result<(), StoreError>;
}

/// RFC 7386 merge patch.
pub fn merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match patch {
        serde_json::Value::Object(fields) => {
            if !target.is_object() {
                *target = serde_json::Value::Object(Default::default());
            }
            if let serde_json::Value::Object(map) = target {
                for (key, value) in fields {
                    if value.is_null() {
                        map.remove(key);
                    } else {
                        merge_patch(
                            map.entry(key.clone()).or_insert(serde_json::Value::Null),
                            value,
                        );
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

type Key = (ResourceKind, String, String);

/// A recorded store call, for asserting on side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub verb: Verb,
    pub kind: ResourceKind,
    pub name: String,
}

/// In-process [`ResourceStore`]. Everything is permitted unless denied.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<Key, Resource>>,
    denied: RwLock<HashSet<(ResourceKind, Verb)>>,
    failing: RwLock<HashSet<(ResourceKind, Verb)>>,
    calls: RwLock<Vec<StoreCall>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, resource: Resource) -> Self {
        self.insert(resource);
        self
    }

    pub fn insert(&self, resource: Resource) {
        let key = (
            resource.kind,
            resource.metadata.namespace.clone(),
            resource.metadata.name.clone(),
        );
        self.objects.write().insert(key, resource);
    }

    pub fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<Resource> {
        self.objects
            .read()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Revoke a permission, as a restricted user would see it.
    pub fn deny(&self, kind: ResourceKind, verb: Verb) {
        self.denied.write().insert((kind, verb));
    }

    /// Make calls of this kind fail with a backend error.
    pub fn fail_on(&self, kind: ResourceKind, verb: Verb) {
        self.failing.write().insert((kind, verb));
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().clone()
    }

    fn record(&self, verb: Verb, kind: ResourceKind, name: &str) -> Result<(), StoreError> {
        self.calls.write().push(StoreCall {
            verb,
            kind,
            name: name.to_string(),
        });
        if self.denied.read().contains(&(kind, verb)) {
            return Err(StoreError::Forbidden { kind, verb });
        }
        if self.failing.read().contains(&(kind, verb)) {
            return Err(StoreError::Backend(format!(
                "injected failure on {:?} {}",
                verb, kind
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    fn can(&self, kind: ResourceKind, verb: Verb) -> bool {
        !self.denied.read().contains(&(kind, verb))
    }

    async fn find(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Resource, StoreError> {
        self.record(Verb::List, kind, name)?;
        self.get(kind, namespace, name)
            .ok_or_else(|| StoreError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn find_all(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<Resource>, StoreError> {
        self.record(Verb::List, kind, "*")?;
        let mut found: Vec<Resource> = self
            .objects
            .read()
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, r)| r.clone())
            .collect();
        found.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(found)
    }

    async fn create(&self, resource: Resource) -> Result<Resource, StoreError> {
        self.record(Verb::Create, resource.kind, &resource.metadata.name)?;
        self.insert(resource.clone());
        Ok(resource)
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<Resource, StoreError> {
        self.record(Verb::Update, kind, name)?;
        let key = (kind, namespace.to_string(), name.to_string());
        let mut objects = self.objects.write();
        let existing = objects.get(&key).ok_or_else(|| StoreError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })?;

        let invalid = |e: serde_json::Error| StoreError::InvalidPatch {
            kind,
            name: name.to_string(),
            message: e.to_string(),
        };
        let mut value = serde_json::to_value(existing).map_err(invalid)?;
        merge_patch(&mut value, &patch);
        let updated: Resource = serde_json::from_value(value).map_err(invalid)?;
        objects.insert(key, updated.clone());
        Ok(updated)
    }

    async fn remove(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        self.record(Verb::Delete, kind, name)?;
        self.objects
            .write()
            .remove(&(kind, namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch() {
        let mut target = json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge_patch(&mut target, &json!({"b": {"c": null, "e": 4}, "f": "x"}));
        assert_eq!(target, json!({"a": 1, "b": {"d": 3, "e": 4}, "f": "x"}));
    }

    #[tokio::test]
    async fn test_find_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .find(ResourceKind::Secret, "ns", "missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_replaces_and_find_all_filters_namespace() {
        let store = MemoryStore::new();
        let mut cm = Resource::new(ResourceKind::ConfigMap, "ns", "one");
        cm.data.insert("k".into(), "v1".into());
        store.create(cm.clone()).await.unwrap();
        cm.data.insert("k".into(), "v2".into());
        store.create(cm).await.unwrap();
        store
            .create(Resource::new(ResourceKind::ConfigMap, "other", "two"))
            .await
            .unwrap();

        let all = store.find_all(ResourceKind::ConfigMap, "ns").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data["k"], "v2");
    }

    #[tokio::test]
    async fn test_patch_merges_spec() {
        let mut deployment = Resource::new(ResourceKind::Deployment, "ns", "agent");
        deployment.spec = json!({"replicas": 1});
        let store = MemoryStore::new().with(deployment);

        let updated = store
            .patch(
                ResourceKind::Deployment,
                "ns",
                "agent",
                json!({"spec": {"template": {"metadata": {"annotations": {"x": "y"}}}}}),
            )
            .await
            .unwrap();
        assert_eq!(updated.spec["replicas"], 1);
        assert_eq!(updated.spec["template"]["metadata"]["annotations"]["x"], "y");
    }

    #[tokio::test]
    async fn test_denied_verbs() {
        let store = MemoryStore::new();
        store.deny(ResourceKind::AgentConfig, Verb::Create);
        assert!(!store.can(ResourceKind::AgentConfig, Verb::Create));
        assert!(store.can(ResourceKind::AgentConfig, Verb::List));

        let err = store
            .create(Resource::new(ResourceKind::AgentConfig, "ns", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden { .. }));
    }
}
