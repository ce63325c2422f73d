//! Model listing seam used by the settings form.

use async_trait::async_trait;
use shared::Provider;

use crate::error::ApiError;

/// Extra inputs `/llm/{provider}/models` needs for some providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelQuery {
    /// Ollama base URL.
    pub url: Option<String>,
    /// Bedrock region.
    pub region: Option<String>,
    /// Bedrock bearer token.
    pub bearer_token: Option<String>,
}

impl ModelQuery {
    pub fn local(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn bedrock(bearer_token: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(bearer_token.into()),
            region: Some(region.into()),
            ..Default::default()
        }
    }

    /// Query-string pairs, skipping fields that are not set.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(url) = &self.url {
            pairs.push(("url", url.as_str()));
        }
        if let Some(region) = &self.region {
            pairs.push(("region", region.as_str()));
        }
        if let Some(token) = &self.bearer_token {
            pairs.push(("bearerToken", token.as_str()));
        }
        pairs
    }
}

/// Anything that can list the models a provider offers.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn list_models(
        &self,
        provider: Provider,
        query: &ModelQuery,
    ) -> Result<Vec<String>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_skip_unset() {
        assert!(ModelQuery::default().pairs().is_empty());
        assert_eq!(
            ModelQuery::local("http://ollama:11434").pairs(),
            vec![("url", "http://ollama:11434")]
        );
        assert_eq!(
            ModelQuery::bedrock("tok", "us-west-2").pairs(),
            vec![("region", "us-west-2"), ("bearerToken", "tok")]
        );
    }
}
