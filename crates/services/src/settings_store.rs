//! Mapping between the flat settings record and its two backing resources.
//!
//! Credential-bearing keys live in a secret (base64 at rest); everything
//! else lives in a config map.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use shared::config::DashboardConfig;
use shared::{SettingKey, SettingsFormData};
use std::collections::BTreeMap;

use crate::store::{Resource, ResourceKind, ResourceStore, StoreError};

/// Settings split by destination. Values are plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSettings {
    pub secret: BTreeMap<String, String>,
    pub config: BTreeMap<String, String>,
}

fn is_secret_key(raw: &str) -> bool {
    SettingKey::parse(raw).map(|k| k.is_secret()).unwrap_or(false)
}

/// Route every non-empty value to the secret or the config map.
pub fn split_settings(data: &SettingsFormData) -> SplitSettings {
    let mut split = SplitSettings::default();
    for (key, value) in data.iter() {
        if value.is_empty() {
            continue;
        }
        let target = if is_secret_key(key) {
            &mut split.secret
        } else {
            &mut split.config
        };
        target.insert(key.to_string(), value.to_string());
    }
    split
}

/// Rebuild the form record. Secret values are expected base64-encoded.
pub fn merge_settings(
    secret_data: &BTreeMap<String, String>,
    config_data: &BTreeMap<String, String>,
) -> SettingsFormData {
    let mut data: SettingsFormData = config_data
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (key, encoded) in secret_data {
        match decode_value(encoded) {
            Some(value) => data.set_raw(key.clone(), value),
            None => tracing::warn!(key = %key, "skipping secret value that is not valid base64"),
        }
    }
    data
}

pub fn encode_value(value: &str) -> String {
    BASE64.encode(value.as_bytes())
}

pub fn decode_value(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Read the persisted settings. Missing resources read as empty.
pub async fn load_settings(
    store: &dyn ResourceStore,
    config: &DashboardConfig,
) -> Result<SettingsFormData, StoreError> {
    let secret = find_or_empty(
        store,
        ResourceKind::Secret,
        &config.namespace,
        &config.settings_secret,
    )
    .await?;
    let config_map = find_or_empty(
        store,
        ResourceKind::ConfigMap,
        &config.namespace,
        &config.settings_config_map,
    )
    .await?;
    Ok(merge_settings(&secret, &config_map))
}

async fn find_or_empty(
    store: &dyn ResourceStore,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
) -> Result<BTreeMap<String, String>, StoreError> {
    match store.find(kind, namespace, name).await {
        Ok(resource) => Ok(resource.data),
        Err(e) if e.is_not_found() => {
            tracing::warn!("{}; using defaults", e);
            Ok(BTreeMap::new())
        }
        Err(e) => Err(e),
    }
}

/// Write the secret and the config map, replacing previous contents.
pub async fn save_settings(
    store: &dyn ResourceStore,
    config: &DashboardConfig,
    data: &SettingsFormData,
) -> Result<(), StoreError> {
    let split = split_settings(data);

    let mut secret = Resource::new(
        ResourceKind::Secret,
        &config.namespace,
        &config.settings_secret,
    );
    secret.type_ = Some("Opaque".to_string());
    secret.data = split
        .secret
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    store.create(secret).await?;

    let mut config_map = Resource::new(
        ResourceKind::ConfigMap,
        &config.namespace,
        &config.settings_config_map,
    );
    config_map.data = split.config;
    store.create(config_map).await?;

    tracing::info!(
        secret = %config.settings_secret,
        config_map = %config.settings_config_map,
        "settings saved"
    );
    Ok(())
}
