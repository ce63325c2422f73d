pub mod config;
pub mod events;
pub mod provider;
pub mod settings;
pub mod validation;

pub use provider::{resolve_active_provider, Provider};
pub use settings::{SettingKey, SettingsFormData};
pub use validation::{validate_settings, ModelValidationState, ValidationStatus};

pub mod chat_api {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    /// A stored conversation as listed by `/chats`.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Chat {
        #[serde(alias = "chatId")]
        pub id: String,
        #[serde(default)]
        pub name: String,
        #[serde(default, alias = "createdAt")]
        pub created_at: Option<DateTime<Utc>>,
        #[serde(default, alias = "updatedAt")]
        pub updated_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ChatMessage {
        #[serde(default)]
        pub id: Option<String>,
        pub role: String, // "user" | "assistant" | "system"
        pub content: String,
        #[serde(default, alias = "createdAt")]
        pub created_at: Option<DateTime<Utc>>,
    }

    /// Body of `PUT /chats/{id}`.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ChatUpdate {
        pub name: String,
    }
}
