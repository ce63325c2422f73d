//! Settings page controllers for the AI agent dashboard extension.

pub mod debounce;
pub mod settings_form;
pub mod settings_page;

pub use debounce::Debouncer;
pub use settings_form::{FetchOutcome, SettingsForm};
pub use settings_page::{PageState, Permissions, SaveError, SaveStep, SettingsPage};
