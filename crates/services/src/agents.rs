//! Per-agent configuration resources and their basic-auth secrets.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::dialog::DeleteDialog;
use crate::settings_store::encode_value;
use crate::store::{Resource, ResourceKind, ResourceStore, StoreError};

const PASSWORD_LEN: usize = 24;
const AGENT_LABEL: &str = "ai.cattle.io/agent";
const BASIC_AUTH_TYPE: &str = "kubernetes.io/basic-auth";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthType {
    #[default]
    None,
    Basic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfigSpec {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "mcpURL")]
    pub mcp_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub authentication_type: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_secret: Option<String>,
}

impl Default for AgentConfigSpec {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            description: String::new(),
            mcp_url: String::new(),
            enabled: true,
            authentication_type: AuthType::None,
            authentication_secret: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    /// Fresh credentials with a random alphanumeric password.
    pub fn generate(username: &str) -> Self {
        Self {
            username: username.to_string(),
            password: random_string(PASSWORD_LEN),
        }
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub spec: AgentConfigSpec,
    /// Credentials typed into the form; written to the secret on save and
    /// never kept in the resource itself.
    pub credentials: Option<BasicCredentials>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, mcp_url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            spec: AgentConfigSpec {
                display_name: name.clone(),
                mcp_url: mcp_url.into(),
                ..Default::default()
            },
            name,
            credentials: None,
        }
    }

    pub fn from_resource(resource: &Resource) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name: resource.metadata.name.clone(),
            spec: serde_json::from_value(resource.spec.clone())?,
            credentials: None,
        })
    }

    pub fn to_resource(&self, namespace: &str) -> Result<Resource, serde_json::Error> {
        let mut resource = Resource::new(ResourceKind::AgentConfig, namespace, &self.name);
        resource.spec = serde_json::to_value(&self.spec)?;
        Ok(resource)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Agent name is required".to_string());
        } else if !is_dns_label(&self.name) {
            errors.push(format!(
                "Agent name '{}' must be lowercase letters, digits and '-'",
                self.name
            ));
        }
        if self.spec.mcp_url.trim().is_empty() {
            errors.push(format!("Agent '{}' needs a URL", self.name));
        }
        errors
    }
}

/// Kubernetes object-name shape: 1-63 chars of `[a-z0-9-]`, alphanumeric at both ends.
pub fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}

/// The editable list of agents shown under the settings form.
#[derive(Debug, Default)]
pub struct AgentConfigList {
    agents: Vec<AgentConfig>,
    delete_dialog: DeleteDialog<String>,
}

impl AgentConfigList {
    pub fn new(agents: Vec<AgentConfig>) -> Self {
        Self {
            agents,
            delete_dialog: DeleteDialog::Closed,
        }
    }

    /// Read every agent resource. A missing resource type reads as an empty list.
    pub async fn load(store: &dyn ResourceStore, namespace: &str) -> Result<Self, StoreError> {
        let resources = match store.find_all(ResourceKind::AgentConfig, namespace).await {
            Ok(resources) => resources,
            Err(e) if e.is_not_found() => {
                tracing::warn!("{}; no agent configs", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let agents = resources
            .iter()
            .filter_map(|r| match AgentConfig::from_resource(r) {
                Ok(agent) => Some(agent),
                Err(e) => {
                    tracing::warn!(agent = %r.name(), "skipping malformed agent config: {}", e);
                    None
                }
            })
            .collect();
        Ok(Self::new(agents))
    }

    pub fn agents(&self) -> &[AgentConfig] {
        &self.agents
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AgentConfig> {
        self.agents.iter_mut().find(|a| a.name == name)
    }

    pub fn add(&mut self, agent: AgentConfig) {
        self.agents.push(agent);
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        for agent in &self.agents {
            errors.extend(agent.validate());
            if !agent.name.is_empty() && !seen.insert(agent.name.as_str()) {
                errors.push(format!("Agent name '{}' is used more than once", agent.name));
            }
        }
        errors
    }

    pub fn delete_dialog(&self) -> &DeleteDialog<String> {
        &self.delete_dialog
    }

    pub fn request_delete(&mut self, name: &str) {
        if self.agents.iter().any(|a| a.name == name) {
            self.delete_dialog.open(name.to_string());
        }
    }

    pub fn cancel_delete(&mut self) {
        self.delete_dialog.cancel();
    }

    /// Delete the agent awaiting confirmation along with its auth secret.
    pub async fn confirm_delete(
        &mut self,
        store: &dyn ResourceStore,
        namespace: &str,
    ) -> Result<Option<AgentConfig>, StoreError> {
        let Some(name) = self.delete_dialog.take() else {
            return Ok(None);
        };
        let Some(index) = self.agents.iter().position(|a| a.name == name) else {
            return Ok(None);
        };

        ignore_not_found(
            store
                .remove(ResourceKind::AgentConfig, namespace, &name)
                .await,
        )?;
        if let Some(secret) = &self.agents[index].spec.authentication_secret {
            ignore_not_found(store.remove(ResourceKind::Secret, namespace, secret).await)?;
        }

        tracing::info!(agent = %name, "agent config deleted");
        Ok(Some(self.agents.remove(index)))
    }

    /// Write auth secrets first, then the agent resources.
    pub async fn persist(
        &mut self,
        store: &dyn ResourceStore,
        namespace: &str,
    ) -> Result<(), StoreError> {
        for agent in &mut self.agents {
            persist_auth(store, namespace, agent).await?;
            let resource = agent
                .to_resource(namespace)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            store.create(resource).await?;
            tracing::debug!(agent = %agent.name, "agent config saved");
        }
        Ok(())
    }
}

async fn persist_auth(
    store: &dyn ResourceStore,
    namespace: &str,
    agent: &mut AgentConfig,
) -> Result<(), StoreError> {
    match agent.spec.authentication_type {
        AuthType::None => {
            if let Some(secret) = agent.spec.authentication_secret.take() {
                ignore_not_found(store.remove(ResourceKind::Secret, namespace, &secret).await)?;
            }
            agent.credentials = None;
        }
        AuthType::Basic => {
            let needs_secret = agent.spec.authentication_secret.is_none();
            if !needs_secret && agent.credentials.is_none() {
                return Ok(());
            }
            let credentials = agent
                .credentials
                .take()
                .unwrap_or_else(|| BasicCredentials::generate(&agent.name));
            let secret_name = agent
                .spec
                .authentication_secret
                .clone()
                .unwrap_or_else(|| {
                    format!("{}-auth-{}", agent.name, random_string(5).to_lowercase())
                });

            let mut secret = Resource::new(ResourceKind::Secret, namespace, &secret_name);
            secret.type_ = Some(BASIC_AUTH_TYPE.to_string());
            secret
                .metadata
                .labels
                .insert(AGENT_LABEL.to_string(), agent.name.clone());
            secret
                .data
                .insert("username".into(), encode_value(&credentials.username));
            secret
                .data
                .insert("password".into(), encode_value(&credentials.password));
            store.create(secret).await?;
            agent.spec.authentication_secret = Some(secret_name);
        }
    }
    Ok(())
}

fn ignore_not_found(result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::warn!("{}; nothing to delete", e);
            Ok(())
        }
        other => other,
    }
}
