//! Setting keys and the flat settings record edited by the form.
//!
//! The backend stores settings as a flat string map. Known keys are modelled
//! by [`SettingKey`]; unknown keys coming back from the backend are kept
//! verbatim so a round trip never drops data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Every key the settings form knows how to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingKey {
    ActiveLlm,
    OllamaUrl,
    OpenaiApiKey,
    GoogleApiKey,
    AwsBearerTokenBedrock,
    AwsRegion,
    LocalModel,
    OpenaiModel,
    GeminiModel,
    BedrockModel,
    OpenaiUrl,
    LangfuseHost,
    LangfusePublicKey,
    LangfuseSecretKey,
}

impl SettingKey {
    pub fn all() -> &'static [SettingKey] {
        &[
            SettingKey::ActiveLlm,
            SettingKey::OllamaUrl,
            SettingKey::OpenaiApiKey,
            SettingKey::GoogleApiKey,
            SettingKey::AwsBearerTokenBedrock,
            SettingKey::AwsRegion,
            SettingKey::LocalModel,
            SettingKey::OpenaiModel,
            SettingKey::GeminiModel,
            SettingKey::BedrockModel,
            SettingKey::OpenaiUrl,
            SettingKey::LangfuseHost,
            SettingKey::LangfusePublicKey,
            SettingKey::LangfuseSecretKey,
        ]
    }

    /// Wire name, as stored by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::ActiveLlm => "ACTIVE_LLM",
            SettingKey::OllamaUrl => "OLLAMA_URL",
            SettingKey::OpenaiApiKey => "OPENAI_API_KEY",
            SettingKey::GoogleApiKey => "GOOGLE_API_KEY",
            SettingKey::AwsBearerTokenBedrock => "AWS_BEARER_TOKEN_BEDROCK",
            SettingKey::AwsRegion => "AWS_REGION",
            SettingKey::LocalModel => "LOCAL_MODEL",
            SettingKey::OpenaiModel => "OPENAI_MODEL",
            SettingKey::GeminiModel => "GEMINI_MODEL",
            SettingKey::BedrockModel => "BEDROCK_MODEL",
            SettingKey::OpenaiUrl => "OPENAI_URL",
            SettingKey::LangfuseHost => "LANGFUSE_HOST",
            SettingKey::LangfusePublicKey => "LANGFUSE_PUBLIC_KEY",
            SettingKey::LangfuseSecretKey => "LANGFUSE_SECRET_KEY",
        }
    }

    pub fn parse(raw: &str) -> Option<SettingKey> {
        SettingKey::all().iter().copied().find(|k| k.as_str() == raw)
    }

    /// Keys persisted in the settings secret rather than the config map.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            SettingKey::ActiveLlm
                | SettingKey::OllamaUrl
                | SettingKey::OpenaiApiKey
                | SettingKey::GoogleApiKey
                | SettingKey::AwsBearerTokenBedrock
        )
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat settings record keyed by wire name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsFormData {
    values: BTreeMap<String, String>,
}

impl SettingsFormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: SettingKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Value for `key`, or `""` when absent.
    pub fn get(&self, key: SettingKey) -> &str {
        self.values.get(key.as_str()).map(|v| v.as_str()).unwrap_or("")
    }

    /// True when `key` holds something other than whitespace.
    pub fn is_filled(&self, key: SettingKey) -> bool {
        !self.get(key).trim().is_empty()
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        self.values.insert(key.as_str().to_string(), value.into());
    }

    pub fn clear(&mut self, key: SettingKey) {
        self.values.insert(key.as_str().to_string(), String::new());
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }

    pub fn set_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for SettingsFormData {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_round_trip() {
        for key in SettingKey::all() {
            assert_eq!(SettingKey::parse(key.as_str()), Some(*key));
        }
        assert_eq!(SettingKey::parse("NOT_A_KEY"), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&SettingKey::AwsBearerTokenBedrock).unwrap();
        assert_eq!(json, "\"AWS_BEARER_TOKEN_BEDROCK\"");
    }

    #[test]
    fn test_secret_routing() {
        let secret: Vec<_> = SettingKey::all().iter().filter(|k| k.is_secret()).collect();
        assert_eq!(secret.len(), 5);
        assert!(SettingKey::ActiveLlm.is_secret());
        assert!(!SettingKey::AwsRegion.is_secret());
        assert!(!SettingKey::LangfuseHost.is_secret());
    }

    #[test]
    fn test_form_data_keeps_unknown_keys() {
        let data: SettingsFormData =
            serde_json::from_str(r#"{"ACTIVE_LLM":"OPENAI","EXTRA":"kept"}"#).unwrap();
        assert_eq!(data.get(SettingKey::ActiveLlm), "OPENAI");
        assert_eq!(data.get_raw("EXTRA"), Some("kept"));
        assert_eq!(data.get(SettingKey::OllamaUrl), "");
    }

    #[test]
    fn test_is_filled_ignores_whitespace() {
        let data = SettingsFormData::new().with(SettingKey::AwsRegion, "   ");
        assert!(!data.is_filled(SettingKey::AwsRegion));
    }
}
