//! Static description of the LLM providers the settings form offers.

use serde::Serialize;
use shared::{Provider, SettingKey};

/// An input the form renders for a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderOption {
    pub key: SettingKey,
    pub label: &'static str,
    pub placeholder: &'static str,
    /// Rendered as a password field and stored in the secret.
    pub secret: bool,
    pub required: bool,
}

/// Display metadata and field wiring for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub provider: Provider,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub credential_key: SettingKey,
    pub model_key: SettingKey,
    pub options: Vec<ProviderOption>,
}

impl ProviderInfo {
    pub fn option(&self, key: SettingKey) -> Option<&ProviderOption> {
        self.options.iter().find(|o| o.key == key)
    }
}

/// Descriptor for `provider`.
pub fn provider_info(provider: Provider) -> ProviderInfo {
    match provider {
        Provider::Local => ProviderInfo {
            provider,
            name: "Local LLM",
            description: "Run models on your own infrastructure with Ollama",
            icon: "icon-ollama",
            credential_key: provider.credential_key(),
            model_key: provider.model_key(),
            options: vec![ProviderOption {
                key: SettingKey::OllamaUrl,
                label: "Ollama URL",
                placeholder: "http://ollama.ollama.svc:11434",
                secret: false,
                required: true,
            }],
        },
        Provider::OpenAI => ProviderInfo {
            provider,
            name: "OpenAI",
            description: "GPT models hosted by OpenAI or any compatible endpoint",
            icon: "icon-openai",
            credential_key: provider.credential_key(),
            model_key: provider.model_key(),
            options: vec![
                ProviderOption {
                    key: SettingKey::OpenaiApiKey,
                    label: "API Key",
                    placeholder: "sk-...",
                    secret: true,
                    required: true,
                },
                ProviderOption {
                    key: SettingKey::OpenaiUrl,
                    label: "Base URL",
                    placeholder: "https://api.openai.com/v1",
                    secret: false,
                    required: false,
                },
            ],
        },
        Provider::Gemini => ProviderInfo {
            provider,
            name: "Gemini",
            description: "Google Gemini models via the Generative Language API",
            icon: "icon-gemini",
            credential_key: provider.credential_key(),
            model_key: provider.model_key(),
            options: vec![ProviderOption {
                key: SettingKey::GoogleApiKey,
                label: "API Key",
                placeholder: "AIza...",
                secret: true,
                required: true,
            }],
        },
        Provider::Bedrock => ProviderInfo {
            provider,
            name: "Amazon Bedrock",
            description: "Foundation models served by AWS Bedrock",
            icon: "icon-aws",
            credential_key: provider.credential_key(),
            model_key: provider.model_key(),
            options: vec![
                ProviderOption {
                    key: SettingKey::AwsBearerTokenBedrock,
                    label: "Bearer Token",
                    placeholder: "ABSK...",
                    secret: true,
                    required: true,
                },
                ProviderOption {
                    key: SettingKey::AwsRegion,
                    label: "Region",
                    placeholder: "us-east-1",
                    secret: false,
                    required: true,
                },
            ],
        },
    }
}

/// All providers in display order.
pub fn all_providers() -> Vec<ProviderInfo> {
    Provider::all().iter().copied().map(provider_info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_every_provider() {
        let all = all_providers();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].provider, Provider::Local);
    }

    #[test]
    fn test_required_options_match_validator() {
        for info in all_providers() {
            for option in info.options.iter().filter(|o| o.required) {
                assert!(
                    info.provider.required_keys().contains(&option.key),
                    "{} option {} not validated",
                    info.name,
                    option.key
                );
            }
            assert!(info.option(info.credential_key).is_some());
        }
    }

    #[test]
    fn test_secret_options() {
        let bedrock = provider_info(Provider::Bedrock);
        assert!(bedrock.option(SettingKey::AwsBearerTokenBedrock).unwrap().secret);
        assert!(!bedrock.option(SettingKey::AwsRegion).unwrap().secret);
    }
}
