//! LLM provider identity and active-provider resolution.

use crate::settings::{SettingKey, SettingsFormData};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Local,
    OpenAI,
    Gemini,
    Bedrock,
}

impl Provider {
    pub fn all() -> &'static [Provider] {
        &[
            Provider::Local,
            Provider::OpenAI,
            Provider::Gemini,
            Provider::Bedrock,
        ]
    }

    /// Value stored under `ACTIVE_LLM`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "LOCAL",
            Provider::OpenAI => "OPENAI",
            Provider::Gemini => "GEMINI",
            Provider::Bedrock => "BEDROCK",
        }
    }

    /// Path segment used by `/llm/{provider}/models`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
            Provider::Bedrock => "bedrock",
        }
    }

    pub fn parse(raw: &str) -> Option<Provider> {
        Provider::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == raw.trim())
    }

    /// Field holding the provider's primary credential.
    pub fn credential_key(&self) -> SettingKey {
        match self {
            Provider::Local => SettingKey::OllamaUrl,
            Provider::OpenAI => SettingKey::OpenaiApiKey,
            Provider::Gemini => SettingKey::GoogleApiKey,
            Provider::Bedrock => SettingKey::AwsBearerTokenBedrock,
        }
    }

    /// Field holding the selected model name.
    pub fn model_key(&self) -> SettingKey {
        match self {
            Provider::Local => SettingKey::LocalModel,
            Provider::OpenAI => SettingKey::OpenaiModel,
            Provider::Gemini => SettingKey::GeminiModel,
            Provider::Bedrock => SettingKey::BedrockModel,
        }
    }

    /// Every field that must be non-empty while this provider is active.
    pub fn required_keys(&self) -> &'static [SettingKey] {
        match self {
            Provider::Local => &[SettingKey::OllamaUrl, SettingKey::LocalModel],
            Provider::OpenAI => &[SettingKey::OpenaiApiKey, SettingKey::OpenaiModel],
            Provider::Gemini => &[SettingKey::GoogleApiKey, SettingKey::GeminiModel],
            Provider::Bedrock => &[
                SettingKey::AwsBearerTokenBedrock,
                SettingKey::AwsRegion,
                SettingKey::BedrockModel,
            ],
        }
    }

    /// Provider whose fields include `key`, if any.
    pub fn owning(key: SettingKey) -> Option<Provider> {
        Provider::all()
            .iter()
            .copied()
            .find(|p| p.required_keys().contains(&key))
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::Local
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential probes in fallback priority order.
const FALLBACK_ORDER: [(SettingKey, Provider); 4] = [
    (SettingKey::AwsBearerTokenBedrock, Provider::Bedrock),
    (SettingKey::OpenaiApiKey, Provider::OpenAI),
    (SettingKey::GoogleApiKey, Provider::Gemini),
    (SettingKey::OllamaUrl, Provider::Local),
];

/// Work out which provider the record describes.
///
/// An explicit `ACTIVE_LLM` always wins. Otherwise the first filled credential
/// in the order Bedrock, OpenAI, Gemini, Ollama decides, and an empty record
/// resolves to [`Provider::Local`].
pub fn resolve_active_provider(data: &SettingsFormData) -> Provider {
    if let Some(explicit) = Provider::parse(data.get(SettingKey::ActiveLlm)) {
        return explicit;
    }

    FALLBACK_ORDER
        .iter()
        .find(|(key, _)| data.is_filled(*key))
        .map(|(_, provider)| *provider)
        .unwrap_or_default()
}
