//! Provider catalogue and the HTTP gateway to the agent backend.

pub mod catalog;
pub mod client;
pub mod error;
pub mod registry;

pub use catalog::{ModelCatalog, ModelQuery};
pub use client::ApiClient;
pub use error::ApiError;
