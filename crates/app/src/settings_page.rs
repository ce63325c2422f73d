//! Settings page: loads persisted settings, hosts the form and the agent
//! list, and runs the save/redeploy pipeline.

use providers::registry::provider_info;
use providers::ModelCatalog;
use serde_json::json;
use services::agents::{AgentConfig, AgentConfigList};
use services::settings_store::{load_settings, save_settings};
use services::{ResourceKind, ResourceStore, StoreError, Verb};
use shared::config::DashboardConfig;
use shared::events::FormEvent;
use shared::{validate_settings, SettingKey, SettingsFormData};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::settings_form::{FetchOutcome, SettingsForm};

/// Annotation whose change makes the deployment roll its pods.
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Deployment check and resource loads still running.
    Loading,
    /// The agent backend is not installed. Terminal for this page instance.
    NoDeployment,
    /// Loaded, but the caller may not write settings or agent configs.
    ReadyNoPermission,
    ReadyEditable,
}

/// What the caller's schema lets them do on this page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    /// May read the settings secret and config map; the form is only loaded
    /// when this holds.
    pub list_secrets: bool,
    /// May write the settings secret and config map.
    pub create_secrets: bool,
    /// May read the agent config resources.
    pub list_agent_configs: bool,
    /// May write agent configs and their auth secrets.
    pub create_agent_configs: bool,
}

impl Permissions {
    pub fn from_store(store: &dyn ResourceStore) -> Self {
        Self {
            list_secrets: store.can(ResourceKind::Secret, Verb::List),
            create_secrets: store.can(ResourceKind::Secret, Verb::Create),
            list_agent_configs: store.can(ResourceKind::AgentConfig, Verb::List),
            create_agent_configs: store.can(ResourceKind::AgentConfig, Verb::Create),
        }
    }

    pub fn can_edit(&self) -> bool {
        self.create_secrets || self.create_agent_configs
    }
}

/// Stage of the save pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Settings,
    AgentConfigs,
    Redeploy,
}

impl fmt::Display for SaveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStep::Settings => f.write_str("save settings"),
            SaveStep::AgentConfigs => f.write_str("save agent configurations"),
            SaveStep::Redeploy => f.write_str("redeploy the agent"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("Settings cannot be saved: {0}")]
    NotReady(String),

    #[error("Failed to {step}: {source}")]
    Step {
        step: SaveStep,
        #[source]
        source: StoreError,
    },
}

impl SaveError {
    fn at(step: SaveStep) -> impl FnOnce(StoreError) -> SaveError {
        move |source| SaveError::Step { step, source }
    }
}

pub struct SettingsPage {
    store: Arc<dyn ResourceStore>,
    catalog: Arc<dyn ModelCatalog>,
    config: DashboardConfig,
    state: PageState,
    permissions: Permissions,
    settings: SettingsFormData,
    form_invalid: bool,
    form: Option<SettingsForm>,
    events: Option<UnboundedReceiver<FormEvent>>,
    mount_task: Option<JoinHandle<FetchOutcome>>,
    agents: AgentConfigList,
    confirming_save: bool,
    saving: bool,
    banner: Option<String>,
}

impl SettingsPage {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        catalog: Arc<dyn ModelCatalog>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            config,
            state: PageState::Loading,
            permissions: Permissions::default(),
            settings: SettingsFormData::new(),
            form_invalid: false,
            form: None,
            events: None,
            mount_task: None,
            agents: AgentConfigList::default(),
            confirming_save: false,
            saving: false,
            banner: None,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// The durable copy of the settings record.
    pub fn settings(&self) -> &SettingsFormData {
        &self.settings
    }

    pub fn form(&self) -> Option<&SettingsForm> {
        self.form.as_ref()
    }

    pub fn agents(&self) -> &AgentConfigList {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut AgentConfigList {
        &mut self.agents
    }

    /// Error shown above the form after a failed save or load.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Check for the backend, then fetch whatever the caller may read.
    ///
    /// Only runs once; later calls return the current state.
    pub async fn load(&mut self) -> PageState {
        if self.state != PageState::Loading {
            return self.state;
        }

        let namespace = self.config.namespace.clone();
        if let Err(e) = self
            .store
            .find(ResourceKind::Deployment, &namespace, &self.config.deployment)
            .await
        {
            tracing::warn!("agent deployment unavailable: {}", e);
            self.state = PageState::NoDeployment;
            return self.state;
        }

        self.permissions = Permissions::from_store(self.store.as_ref());
        tracing::debug!(permissions = ?self.permissions, "settings page permissions");

        if self.permissions.list_secrets {
            match load_settings(self.store.as_ref(), &self.config).await {
                Ok(settings) => self.settings = settings,
                Err(e) => {
                    tracing::warn!("failed to load settings: {}", e);
                    self.banner = Some(e.to_string());
                }
            }
        }

        if self.permissions.list_agent_configs {
            match AgentConfigList::load(self.store.as_ref(), &namespace).await {
                Ok(agents) => self.agents = agents,
                Err(e) => {
                    tracing::warn!("failed to load agent configs: {}", e);
                    self.banner = Some(e.to_string());
                }
            }
        }

        // Without read access there is no record to edit or check models for.
        if self.permissions.list_secrets {
            let (tx, rx) = unbounded_channel();
            let form = SettingsForm::new(
                self.settings.clone(),
                self.catalog.clone(),
                tx,
                self.config.debounce(),
            );
            self.mount_task = Some(form.mount());
            self.form = Some(form);
            self.events = Some(rx);
            self.pump_events();
        }

        self.state = if self.permissions.can_edit() {
            PageState::ReadyEditable
        } else {
            PageState::ReadyNoPermission
        };
        tracing::info!(state = ?self.state, "settings page loaded");
        self.state
    }

    /// Wait for the initial model fetch, then apply what the form emitted.
    pub async fn settle(&mut self) -> Option<FetchOutcome> {
        let outcome = match self.mount_task.take() {
            Some(task) => task.await.ok(),
            None => None,
        };
        self.pump_events();
        outcome
    }

    /// Apply queued form events to the page. Returns how many were handled.
    pub fn pump_events(&mut self) -> usize {
        let Some(events) = self.events.as_mut() else {
            return 0;
        };
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                FormEvent::Input(data) => self.settings = data,
                FormEvent::ValidationError(has_error) => self.form_invalid = has_error,
                FormEvent::ModelStatus {
                    provider, status, ..
                } => {
                    tracing::debug!(provider = %provider, ?status, "model status changed");
                }
            }
            handled += 1;
        }
        handled
    }

    /// Whether saving writes the LLM settings: the form is loaded and the
    /// caller may create the settings secret.
    pub fn manages_settings(&self) -> bool {
        self.permissions.create_secrets && self.form.is_some()
    }

    /// Every reason the page cannot be saved right now.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = if self.manages_settings() {
            self.settings_errors()
        } else {
            Vec::new()
        };
        errors.extend(self.agents.validation_errors());
        errors
    }

    fn settings_errors(&self) -> Vec<String> {
        let result = validate_settings(&self.settings);
        let info = provider_info(result.provider);
        let mut errors: Vec<String> = result
            .missing
            .iter()
            .map(|key| {
                let label = info
                    .option(*key)
                    .map(|o| o.label)
                    .unwrap_or(if *key == info.model_key {
                        "Model"
                    } else {
                        key.as_str()
                    });
                format!("{}: {} is required", info.name, label)
            })
            .collect();
        if self.form_invalid && errors.is_empty() {
            errors.push("The LLM settings are incomplete".to_string());
        }
        errors
    }

    pub fn can_save(&self) -> bool {
        self.state == PageState::ReadyEditable && !self.saving && self.validation_errors().is_empty()
    }

    pub fn is_confirming_save(&self) -> bool {
        self.confirming_save
    }

    /// Ask for confirmation, since saving restarts the agent.
    pub fn request_save(&mut self) -> bool {
        self.pump_events();
        self.confirming_save = self.can_save();
        self.confirming_save
    }

    pub fn cancel_save(&mut self) {
        self.confirming_save = false;
    }

    pub async fn confirm_save(&mut self) -> Result<bool, SaveError> {
        if !std::mem::take(&mut self.confirming_save) {
            return Ok(false);
        }
        self.save().await.map(|_| true)
    }

    /// Persist settings and agent configs, then restart the backend.
    ///
    /// Steps the caller lacks permission for are skipped. The first failing
    /// step stops the pipeline and becomes the banner; completed steps stay.
    pub async fn save(&mut self) -> Result<(), SaveError> {
        self.pump_events();
        if self.state != PageState::ReadyEditable {
            return Err(SaveError::NotReady(format!("page is {:?}", self.state)));
        }
        if let Some(first) = self.validation_errors().into_iter().next() {
            return Err(SaveError::NotReady(first));
        }

        self.saving = true;
        self.banner = None;
        let result = self.run_save().await;
        self.saving = false;

        match &result {
            Ok(()) => tracing::info!(deployment = %self.config.deployment, "settings saved and agent restarted"),
            Err(e) => {
                tracing::error!("{}", e);
                self.banner = Some(e.to_string());
            }
        }
        result
    }

    async fn run_save(&mut self) -> Result<(), SaveError> {
        let store = self.store.clone();
        let namespace = self.config.namespace.clone();

        if self.manages_settings() {
            save_settings(store.as_ref(), &self.config, &self.settings)
                .await
                .map_err(SaveError::at(SaveStep::Settings))?;
        }

        if self.permissions.create_agent_configs {
            self.agents
                .persist(store.as_ref(), &namespace)
                .await
                .map_err(SaveError::at(SaveStep::AgentConfigs))?;
        }

        redeploy(store.as_ref(), &namespace, &self.config.deployment)
            .await
            .map_err(SaveError::at(SaveStep::Redeploy))
    }

    pub fn add_agent(&mut self, agent: AgentConfig) {
        self.agents.add(agent);
    }

    /// Delete the agent awaiting confirmation in the agent list.
    pub async fn confirm_agent_delete(&mut self) -> Result<Option<AgentConfig>, StoreError> {
        let store = self.store.clone();
        let result = self
            .agents
            .confirm_delete(store.as_ref(), &self.config.namespace)
            .await;
        if let Err(e) = &result {
            self.banner = Some(e.to_string());
        }
        result
    }

    /// Convenience for hosts that edit a single field outside the form.
    pub fn update_setting(&mut self, key: SettingKey, value: &str) {
        if let Some(form) = &self.form {
            form.update_value(key, value);
        }
        self.pump_events();
    }
}

/// Bump the restart annotation on the pod template so the deployment rolls.
pub async fn redeploy(
    store: &dyn ResourceStore,
    namespace: &str,
    deployment: &str,
) -> Result<(), StoreError> {
    let now = chrono::Utc::now().to_rfc3339();
    let patch = json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": { RESTARTED_AT_ANNOTATION: now }
                }
            }
        }
    });
    store
        .patch(ResourceKind::Deployment, namespace, deployment, patch)
        .await?;
    tracing::info!(deployment = %deployment, restarted_at = %now, "deployment restart requested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use providers::{ApiError, ModelQuery};
    use services::settings_store::encode_value;
    use services::store::StoreCall;
    use services::{MemoryStore, Resource};
    use shared::Provider;

    struct StaticCatalog(Vec<&'static str>);

    #[async_trait]
    impl ModelCatalog for StaticCatalog {
        async fn list_models(
            &self,
            _provider: Provider,
            _query: &ModelQuery,
        ) -> Result<Vec<String>, ApiError> {
            Ok(self.0.iter().map(|m| m.to_string()).collect())
        }
    }

    fn config() -> DashboardConfig {
        DashboardConfig::default()
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let config = config();
        let mut secret = Resource::new(
            ResourceKind::Secret,
            &config.namespace,
            &config.settings_secret,
        );
        secret
            .data
            .insert("ACTIVE_LLM".into(), encode_value("OPENAI"));
        secret
            .data
            .insert("OPENAI_API_KEY".into(), encode_value("sk-test"));

        let store = MemoryStore::new()
            .with(Resource::new(
                ResourceKind::Deployment,
                &config.namespace,
                &config.deployment,
            ))
            .with(secret);
        Arc::new(store)
    }

    fn page(store: Arc<MemoryStore>) -> SettingsPage {
        SettingsPage::new(store, Arc::new(StaticCatalog(vec!["gpt-4o", "gpt-4o-mini"])), config())
    }

    fn called(calls: &[StoreCall], verb: Verb, kind: ResourceKind) -> bool {
        calls.iter().any(|c| c.verb == verb && c.kind == kind)
    }

    #[tokio::test]
    async fn test_missing_deployment_is_terminal() {
        let store = Arc::new(MemoryStore::new());
        let mut page = page(store.clone());

        assert_eq!(page.load().await, PageState::NoDeployment);
        assert_eq!(page.load().await, PageState::NoDeployment);
        assert!(page.form().is_none());

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, ResourceKind::Deployment);
        assert!(!page.can_save());
    }

    #[tokio::test]
    async fn test_load_adopts_first_model() {
        let store = seeded_store();
        let mut page = page(store);

        assert_eq!(page.load().await, PageState::ReadyEditable);
        assert_eq!(page.settings().get(SettingKey::OpenaiApiKey), "sk-test");
        assert!(!page.can_save());

        let outcome = page.settle().await;
        assert!(matches!(outcome, Some(FetchOutcome::Loaded(_))));
        assert_eq!(page.settings().get(SettingKey::OpenaiModel), "gpt-4o");
        assert!(page.validation_errors().is_empty());
        assert!(page.can_save());
    }

    #[tokio::test]
    async fn test_save_without_agent_permission_skips_agents() {
        let store = seeded_store();
        store.deny(ResourceKind::AgentConfig, Verb::Create);
        let mut page = page(store.clone());
        page.load().await;
        page.settle().await;
        page.add_agent(AgentConfig::new("docs", "http://docs-mcp:8080/mcp"));

        page.save().await.unwrap();

        let calls = store.calls();
        assert!(called(&calls, Verb::Create, ResourceKind::Secret));
        assert!(called(&calls, Verb::Create, ResourceKind::ConfigMap));
        assert!(!called(&calls, Verb::Create, ResourceKind::AgentConfig));
        assert!(called(&calls, Verb::Update, ResourceKind::Deployment));

        let config = config();
        let deployment = store
            .get(ResourceKind::Deployment, &config.namespace, &config.deployment)
            .unwrap();
        let restarted = &deployment.spec["template"]["metadata"]["annotations"]
            [RESTARTED_AT_ANNOTATION];
        assert!(restarted.is_string());

        let config_map = store
            .get(ResourceKind::ConfigMap, &config.namespace, &config.settings_config_map)
            .unwrap();
        assert_eq!(config_map.data.get("OPENAI_MODEL").map(String::as_str), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn test_failed_step_stops_pipeline() {
        let store = seeded_store();
        store.fail_on(ResourceKind::ConfigMap, Verb::Create);
        let mut page = page(store.clone());
        page.load().await;
        page.settle().await;

        let err = page.save().await.unwrap_err();
        assert!(matches!(
            err,
            SaveError::Step {
                step: SaveStep::Settings,
                ..
            }
        ));
        assert!(page.banner().unwrap().starts_with("Failed to save settings"));
        assert!(!called(&store.calls(), Verb::Update, ResourceKind::Deployment));
        assert_eq!(page.settings().get(SettingKey::OpenaiModel), "gpt-4o");
        assert!(page.can_save());
    }

    #[tokio::test]
    async fn test_read_only_user() {
        let store = seeded_store();
        store.deny(ResourceKind::Secret, Verb::List);
        store.deny(ResourceKind::Secret, Verb::Create);
        store.deny(ResourceKind::AgentConfig, Verb::Create);
        let mut page = page(store.clone());

        assert_eq!(page.load().await, PageState::ReadyNoPermission);
        assert!(!called(&store.calls(), Verb::List, ResourceKind::Secret));
        assert!(page.settings().is_empty());
        assert!(!page.request_save());
        assert!(matches!(page.save().await, Err(SaveError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_agent_only_user_saves_agents() {
        let store = seeded_store();
        store.deny(ResourceKind::Secret, Verb::List);
        store.deny(ResourceKind::Secret, Verb::Create);
        let mut page = page(store.clone());

        assert_eq!(page.load().await, PageState::ReadyEditable);
        assert!(page.form().is_none());
        assert!(!page.manages_settings());
        assert_eq!(page.settle().await, None);

        page.add_agent(AgentConfig::new("docs", "http://docs-mcp:8080/mcp"));
        assert!(page.validation_errors().is_empty());
        assert!(page.can_save());
        page.save().await.unwrap();

        let calls = store.calls();
        assert!(!called(&calls, Verb::Create, ResourceKind::Secret));
        assert!(!called(&calls, Verb::Create, ResourceKind::ConfigMap));
        assert!(called(&calls, Verb::Create, ResourceKind::AgentConfig));
        assert!(called(&calls, Verb::Update, ResourceKind::Deployment));
    }

    #[tokio::test]
    async fn test_save_needs_confirmation() {
        let store = seeded_store();
        let mut page = page(store.clone());
        page.load().await;
        page.settle().await;

        assert!(page.request_save());
        page.cancel_save();
        assert!(!page.confirm_save().await.unwrap());
        assert!(!called(&store.calls(), Verb::Update, ResourceKind::Deployment));

        assert!(page.request_save());
        assert!(page.confirm_save().await.unwrap());
        assert!(called(&store.calls(), Verb::Update, ResourceKind::Deployment));
    }

    #[tokio::test]
    async fn test_validation_errors_name_missing_fields() {
        let store = seeded_store();
        let mut page = page(store);
        page.load().await;
        page.settle().await;

        page.update_setting(SettingKey::OpenaiApiKey, " ");
        assert_eq!(
            page.validation_errors(),
            vec!["OpenAI: API Key is required".to_string()]
        );

        page.update_setting(SettingKey::OpenaiApiKey, "sk-other");
        page.add_agent(AgentConfig::new("Bad Name", "http://mcp"));
        assert_eq!(page.validation_errors().len(), 1);
        assert!(!page.can_save());
    }
}
