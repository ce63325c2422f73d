//! Async validation feedback and the settings validator.

use crate::provider::{resolve_active_provider, Provider};
use crate::settings::{SettingKey, SettingsFormData};
use serde::{Deserialize, Serialize};

/// Progress of an asynchronous credential/model check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Idle,
    Validating,
    Success,
    Error,
}

impl Default for ValidationStatus {
    fn default() -> Self {
        ValidationStatus::Idle
    }
}

/// Per-provider model check state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelValidationState {
    /// Where the latest model check for this provider stands.
    pub status: ValidationStatus,
    /// Backend detail from the last failed check; empty otherwise.
    pub message: String,
    /// Set once the user edits one of the provider's fields.
    pub touched: bool,
}

impl ModelValidationState {
    pub fn validating() -> Self {
        Self {
            status: ValidationStatus::Validating,
            message: String::new(),
            touched: false,
        }
    }

    /// Message to show in an error banner, if one should be shown at all.
    pub fn visible_error(&self) -> Option<&str> {
        if self.touched && self.status == ValidationStatus::Error {
            Some(self.message.as_str())
        } else {
            None
        }
    }
}

impl Default for ModelValidationState {
    fn default() -> Self {
        Self::validating()
    }
}

/// Outcome of [`validate_settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsValidation {
    /// Provider the record resolved to.
    pub provider: Provider,
    /// Required keys that are empty, in the provider's field order.
    pub missing: Vec<SettingKey>,
}

impl SettingsValidation {
    pub fn has_error(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Check that the active provider's credential(s) and model are filled in.
///
/// Fields of inactive providers are ignored.
pub fn validate_settings(data: &SettingsFormData) -> SettingsValidation {
    let provider = resolve_active_provider(data);
    let missing = provider
        .required_keys()
        .iter()
        .copied()
        .filter(|key| !data.is_filled(*key))
        .collect();
    SettingsValidation { provider, missing }
}
