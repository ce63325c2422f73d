//! Events the settings form emits to whoever hosts it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::Provider;
use crate::settings::SettingsFormData;
use crate::validation::ValidationStatus;

/// Upward notifications from the settings form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormEvent {
    /// The edited record changed; the host owns the durable copy.
    Input(SettingsFormData),
    /// Result of the latest validator run. `true` means saving must be blocked.
    ValidationError(bool),
    /// A model fetch finished and changed the provider's status.
    ModelStatus {
        /// Provider whose model list was fetched.
        provider: Provider,
        /// Id of the fetch that produced this status; older ids were superseded.
        request_id: Uuid,
        /// `Success` or `Error`; superseded fetches never report.
        status: ValidationStatus,
    },
}

impl FormEvent {
    pub fn as_input(&self) -> Option<&SettingsFormData> {
        match self {
            FormEvent::Input(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_validation_error(&self) -> Option<bool> {
        match self {
            FormEvent::ValidationError(has_error) => Some(*has_error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingKey;

    #[test]
    fn test_event_accessors() {
        let data = SettingsFormData::new().with(SettingKey::AwsRegion, "eu-west-1");
        let event = FormEvent::Input(data.clone());
        assert_eq!(event.as_input(), Some(&data));
        assert_eq!(event.as_validation_error(), None);

        let event = FormEvent::ValidationError(true);
        assert_eq!(event.as_validation_error(), Some(true));
        assert!(event.as_input().is_none());
    }
}
