//! Persistence for the AI agent settings page.
//!
//! - settings split across a secret and a config map
//! - per-agent configuration resources with generated auth secrets
//! - chat history with confirmed deletes

pub mod agents;
pub mod chat_history;
pub mod dialog;
pub mod settings_store;
pub mod store;

pub use dialog::DeleteDialog;
pub use store::{MemoryStore, Resource, ResourceKind, ResourceStore, StoreError, Verb};
