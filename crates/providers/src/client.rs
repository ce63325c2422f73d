//! HTTP gateway to the agent backend.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::chat_api::{Chat, ChatMessage, ChatUpdate};
use shared::config::DashboardConfig;
use shared::{Provider, SettingsFormData};
use std::time::Duration;
use url::Url;

use crate::catalog::{ModelCatalog, ModelQuery};
use crate::error::{extract_detail, ApiError};

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()?;
        Ok(Self {
            http,
            base: Url::parse(base)?,
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url(), config.request_timeout())
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn models_url(&self, provider: Provider, query: &ModelQuery) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["llm", provider.path_segment(), "models"])?;
        let pairs = query.pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// Storage metadata of the saved settings. Failures are logged and read as absent.
    pub async fn get_settings(&self) -> Option<serde_json::Value> {
        let result: Result<serde_json::Value, ApiError> = async {
            let url = self.endpoint(&["settings"])?;
            let resp = self.http.get(url).send().await?;
            decode(resp).await
        }
        .await;
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("failed to load settings: {}", e);
                None
            }
        }
    }

    pub async fn put_settings(
        &self,
        settings: &SettingsFormData,
    ) -> Result<SettingsFormData, ApiError> {
        let url = self.endpoint(&["settings"])?;
        let resp = self.http.put(url).json(settings).send().await?;
        decode(resp).await
    }

    pub async fn fetch_models(
        &self,
        provider: Provider,
        query: &ModelQuery,
    ) -> Result<Vec<String>, ApiError> {
        let url = self.models_url(provider, query)?;
        tracing::debug!(provider = %provider, "listing models");
        let resp = self.http.get(url).send().await?;
        decode(resp).await
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>, ApiError> {
        let url = self.endpoint(&["chats"])?;
        let resp = self.http.get(url).send().await?;
        decode(resp).await
    }

    pub async fn get_chat(&self, id: &str) -> Result<Chat, ApiError> {
        let url = self.endpoint(&["chats", id])?;
        let resp = self.http.get(url).send().await?;
        decode(resp).await
    }

    pub async fn update_chat(&self, id: &str, update: &ChatUpdate) -> Result<Chat, ApiError> {
        let url = self.endpoint(&["chats", id])?;
        let resp = self.http.put(url).json(update).send().await?;
        decode(resp).await
    }

    pub async fn delete_chat(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["chats", id])?;
        let resp = self.http.delete(url).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    pub async fn delete_all_chats(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["chats"])?;
        let resp = self.http.delete(url).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    pub async fn chat_messages(&self, id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let url = self.endpoint(&["chats", id, "messages"])?;
        let resp = self.http.get(url).send().await?;
        decode(resp).await
    }
}

#[async_trait]
impl ModelCatalog for ApiClient {
    async fn list_models(
        &self,
        provider: Provider,
        query: &ModelQuery,
    ) -> Result<Vec<String>, ApiError> {
        self.fetch_models(provider, query).await
    }
}

async fn ensure_success(resp: Response) -> Result<Response, ApiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Http {
        status,
        detail: extract_detail(status, &body),
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let resp = ensure_success(resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
