//! LLM settings form controller.
//!
//! Owns the transient edit state of the settings form: the working copy of
//! the record, the per-provider model lists and validation status, and the
//! in-flight model requests. Every change is pushed to the host as a
//! [`FormEvent`]; the host keeps the durable copy.

use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use providers::{ModelCatalog, ModelQuery};
use shared::events::FormEvent;
use shared::{
    resolve_active_provider, validate_settings, ModelValidationState, Provider, SettingKey,
    SettingsFormData, ValidationStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::debounce::Debouncer;

const OLLAMA_URL_DEBOUNCE: &str = "ollama-url";
const BEDROCK_TOKEN_DEBOUNCE: &str = "bedrock-token";
const BEDROCK_REGION_DEBOUNCE: &str = "bedrock-region";

/// How a model fetch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded(Vec<String>),
    Failed(String),
    /// A newer fetch for the same provider was issued; nothing was applied.
    Superseded,
}

struct InFlight {
    request_id: Uuid,
    abort: AbortHandle,
}

struct FormState {
    value: SettingsFormData,
    models: HashMap<Provider, Vec<String>>,
    validation: HashMap<Provider, ModelValidationState>,
    in_flight: HashMap<Provider, InFlight>,
}

struct Inner {
    catalog: Arc<dyn ModelCatalog>,
    events: UnboundedSender<FormEvent>,
    state: Mutex<FormState>,
    debouncer: Debouncer,
}

/// Cheap-to-clone handle to one mounted settings form.
#[derive(Clone)]
pub struct SettingsForm {
    inner: Arc<Inner>,
}

impl SettingsForm {
    pub fn new(
        value: SettingsFormData,
        catalog: Arc<dyn ModelCatalog>,
        events: UnboundedSender<FormEvent>,
        debounce: Duration,
    ) -> Self {
        let validation = Provider::all()
            .iter()
            .map(|p| (*p, ModelValidationState::validating()))
            .collect();
        Self {
            inner: Arc::new(Inner {
                catalog,
                events,
                state: Mutex::new(FormState {
                    value,
                    models: HashMap::new(),
                    validation,
                    in_flight: HashMap::new(),
                }),
                debouncer: Debouncer::new(debounce),
            }),
        }
    }

    /// Validate the initial record and fetch models for the active provider.
    pub fn mount(&self) -> JoinHandle<FetchOutcome> {
        self.validate();
        let provider = self.active_provider();
        self.spawn_fetch(provider, ModelQuery::default())
    }

    /// Stop pending debounced edits and ignore any in-flight responses.
    pub fn unmount(&self) {
        self.inner.debouncer.cancel_all();
        let mut state = self.inner.state.lock();
        for (_, request) in state.in_flight.drain() {
            request.abort.abort();
        }
    }

    /// Replace the working copy with a record pushed down by the host.
    pub fn set_value(&self, value: SettingsFormData) {
        self.inner.state.lock().value = value;
        self.validate();
    }

    /// The raw working copy.
    pub fn value(&self) -> SettingsFormData {
        self.inner.state.lock().value.clone()
    }

    /// Working copy with `ACTIVE_LLM` filled in from [`resolve_active_provider`].
    pub fn form_view(&self) -> SettingsFormData {
        form_view_of(&self.inner.state.lock().value)
    }

    pub fn active_provider(&self) -> Provider {
        resolve_active_provider(&self.inner.state.lock().value)
    }

    /// Cached model list. `None` means never fetched.
    pub fn models(&self, provider: Provider) -> Option<Vec<String>> {
        self.inner.state.lock().models.get(&provider).cloned()
    }

    pub fn validation(&self, provider: Provider) -> ModelValidationState {
        self.inner
            .state
            .lock()
            .validation
            .get(&provider)
            .cloned()
            .unwrap_or_default()
    }

    /// Error banner text for `provider`, shown only after the user edited it.
    pub fn visible_error(&self, provider: Provider) -> Option<String> {
        self.validation(provider).visible_error().map(str::to_string)
    }

    /// Run the validator, report the result upward and return it.
    pub fn validate(&self) -> bool {
        let has_error = validate_settings(&self.value()).has_error();
        self.emit(FormEvent::ValidationError(has_error));
        has_error
    }

    /// Apply a user edit immediately.
    pub fn update_value(&self, key: SettingKey, value: impl Into<String>) {
        self.apply_value(key, value.into(), true);
    }

    /// Pick a model for `provider`.
    pub fn update_model_value(&self, provider: Provider, model: impl Into<String>) {
        self.update_value(provider.model_key(), model);
    }

    /// Switch providers. Fetches models only if this provider was never fetched.
    pub fn set_active_provider(&self, provider: Provider) -> Option<JoinHandle<FetchOutcome>> {
        self.apply_value(SettingKey::ActiveLlm, provider.as_str().to_string(), false);
        if self.models(provider).is_some() {
            return None;
        }
        Some(self.spawn_fetch(provider, ModelQuery::default()))
    }

    pub fn update_ollama_url_value(&self, url: impl Into<String>) {
        let url = url.into();
        let form = self.clone();
        self.inner.debouncer.call(OLLAMA_URL_DEBOUNCE, async move {
            form.update_value(SettingKey::OllamaUrl, url.clone());
            form.fetch_models(Provider::Local, ModelQuery::local(url)).await;
        });
    }

    pub fn update_bedrock_token_value(&self, token: impl Into<String>) {
        let token = token.into();
        let form = self.clone();
        self.inner.debouncer.call(BEDROCK_TOKEN_DEBOUNCE, async move {
            form.update_value(SettingKey::AwsBearerTokenBedrock, token.clone());
            let query = ModelQuery {
                bearer_token: Some(token),
                ..Default::default()
            };
            form.fetch_models(Provider::Bedrock, query).await;
        });
    }

    pub fn update_bedrock_region_value(&self, region: impl Into<String>) {
        let region = region.into();
        let form = self.clone();
        self.inner.debouncer.call(BEDROCK_REGION_DEBOUNCE, async move {
            form.update_value(SettingKey::AwsRegion, region.clone());
            let query = ModelQuery {
                region: Some(region),
                ..Default::default()
            };
            form.fetch_models(Provider::Bedrock, query).await;
        });
    }

    /// Fetch models on a background task.
    pub fn spawn_fetch(&self, provider: Provider, overrides: ModelQuery) -> JoinHandle<FetchOutcome> {
        let form = self.clone();
        tokio::spawn(async move { form.fetch_models(provider, overrides).await })
    }

    /// List models for `provider`, superseding any fetch already running for it.
    ///
    /// Fields missing from `overrides` fall back to the working copy.
    pub async fn fetch_models(&self, provider: Provider, overrides: ModelQuery) -> FetchOutcome {
        let request_id = Uuid::new_v4();
        let (abort, registration) = AbortHandle::new_pair();
        let query = {
            let mut state = self.inner.state.lock();
            let query = build_query(provider, overrides, &state.value);
            if let Some(previous) = state
                .in_flight
                .insert(provider, InFlight { request_id, abort })
            {
                tracing::debug!(provider = %provider, "superseding model request {}", previous.request_id);
                previous.abort.abort();
            }
            state.models.insert(provider, Vec::new());
            let validation = state.validation.entry(provider).or_default();
            validation.status = ValidationStatus::Validating;
            validation.message.clear();
            query
        };

        let catalog = self.inner.catalog.clone();
        let result = Abortable::new(
            async move { catalog.list_models(provider, &query).await },
            registration,
        )
        .await;

        // The response, the touched-model clear and the default model are all
        // applied under one lock so a newer fetch never sees a partial update.
        let (outcome, snapshot) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let current = state
                .in_flight
                .get(&provider)
                .map(|f| f.request_id == request_id)
                .unwrap_or(false);
            let response = match result {
                Ok(response) if current => response,
                _ => {
                    tracing::debug!(provider = %provider, "dropping superseded model response");
                    return FetchOutcome::Superseded;
                }
            };
            state.in_flight.remove(&provider);

            let model_key = provider.model_key();
            let mut changed = false;
            let outcome = match response {
                Ok(models) => {
                    tracing::info!(provider = %provider, count = models.len(), "models loaded");
                    state.models.insert(provider, models.clone());
                    let validation = state.validation.entry(provider).or_default();
                    validation.status = ValidationStatus::Success;
                    validation.message.clear();
                    FetchOutcome::Loaded(models)
                }
                Err(e) => {
                    let message = e.message();
                    tracing::warn!(provider = %provider, "model listing failed: {}", message);
                    let validation = state.validation.entry(provider).or_default();
                    validation.status = ValidationStatus::Error;
                    validation.message = message.clone();
                    if validation.touched && state.value.is_filled(model_key) {
                        state.value.set(model_key, String::new());
                        changed = true;
                    }
                    FetchOutcome::Failed(message)
                }
            };

            if !state.value.is_filled(model_key) {
                let first = state
                    .models
                    .get(&provider)
                    .and_then(|models| models.first().cloned());
                if let Some(model) = first {
                    state.value.set(model_key, model);
                    changed = true;
                }
            }
            (outcome, changed.then(|| form_view_of(&state.value)))
        };

        if let Some(snapshot) = snapshot {
            self.emit(FormEvent::Input(snapshot));
        }
        self.emit(FormEvent::ModelStatus {
            provider,
            request_id,
            status: match outcome {
                FetchOutcome::Loaded(_) => ValidationStatus::Success,
                _ => ValidationStatus::Error,
            },
        });
        self.validate();
        outcome
    }

    fn apply_value(&self, key: SettingKey, value: String, user_edit: bool) {
        let snapshot = {
            let mut state = self.inner.state.lock();
            state.value.set(key, value);
            if user_edit {
                if let Some(provider) = Provider::owning(key) {
                    state.validation.entry(provider).or_default().touched = true;
                }
            }
            form_view_of(&state.value)
        };
        self.emit(FormEvent::Input(snapshot));
        self.validate();
    }

    fn emit(&self, event: FormEvent) {
        let _ = self.inner.events.send(event);
    }
}

fn form_view_of(value: &SettingsFormData) -> SettingsFormData {
    let provider = resolve_active_provider(value);
    value.clone().with(SettingKey::ActiveLlm, provider.as_str())
}

fn build_query(provider: Provider, overrides: ModelQuery, value: &SettingsFormData) -> ModelQuery {
    let current = |key: SettingKey| Some(value.get(key).to_string());
    match provider {
        Provider::Local => ModelQuery {
            url: overrides.url.or_else(|| current(SettingKey::OllamaUrl)),
            ..Default::default()
        },
        Provider::Bedrock => ModelQuery {
            bearer_token: overrides
                .bearer_token
                .or_else(|| current(SettingKey::AwsBearerTokenBedrock)),
            region: overrides.region.or_else(|| current(SettingKey::AwsRegion)),
            ..Default::default()
        },
        Provider::OpenAI | Provider::Gemini => ModelQuery::default(),
    }
}
