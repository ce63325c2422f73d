//! Runtime configuration for the dashboard extension.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_server_url() -> String {
    "https://127.0.0.1".to_string()
}

fn default_api_path() -> String {
    "/api/v1/namespaces/cattle-ai-agent-system/services/http:rancher-ai-agent:80/proxy/v1/api"
        .to_string()
}

fn default_namespace() -> String {
    "cattle-ai-agent-system".to_string()
}

fn default_deployment() -> String {
    "rancher-ai-agent".to_string()
}

fn default_settings_secret() -> String {
    "llm-config".to_string()
}

fn default_settings_config_map() -> String {
    "llm-config".to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Dashboard origin the proxy path hangs off.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Prefix every backend route is resolved against.
    #[serde(default = "default_api_path")]
    pub api_path: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Backend deployment restarted after a save.
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default = "default_settings_secret")]
    pub settings_secret: String,
    #[serde(default = "default_settings_config_map")]
    pub settings_config_map: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_path: default_api_path(),
            namespace: default_namespace(),
            deployment: default_deployment(),
            settings_secret: default_settings_secret(),
            settings_config_map: default_settings_config_map(),
            debounce_ms: default_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl DashboardConfig {
    /// Defaults overlaid with any `AI_AGENT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("AI_AGENT_SERVER_URL") {
            config.server_url = v;
        }
        if let Ok(v) = std::env::var("AI_AGENT_API_PATH") {
            config.api_path = v;
        }
        if let Ok(v) = std::env::var("AI_AGENT_NAMESPACE") {
            config.namespace = v;
        }
        if let Ok(v) = std::env::var("AI_AGENT_DEPLOYMENT") {
            config.deployment = v;
        }
        if let Ok(v) = std::env::var("AI_AGENT_SETTINGS_SECRET") {
            config.settings_secret = v;
        }
        if let Ok(v) = std::env::var("AI_AGENT_SETTINGS_CONFIGMAP") {
            config.settings_config_map = v;
        }
        if let Some(ms) = std::env::var("AI_AGENT_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.debounce_ms = ms;
        }
        config
    }

    /// Load from a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Absolute base URL for backend routes.
    pub fn api_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.api_path.trim_start_matches('/')
        )
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.namespace, "cattle-ai-agent-system");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server_url": "http://localhost:8000/", "api_path": "/v1/api", "debounce_ms": 50}}"#
        )
        .unwrap();

        let config = DashboardConfig::load(file.path()).unwrap();
        assert_eq!(config.api_url(), "http://localhost:8000/v1/api");
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.deployment, "rancher-ai-agent");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DashboardConfig::load(&dir.path().join("nope.json")).is_err());
    }
}
