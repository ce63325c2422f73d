//! Chat history listing with rename and confirmed delete.

use async_trait::async_trait;
use providers::{ApiClient, ApiError};
use shared::chat_api::{Chat, ChatMessage, ChatUpdate};
use std::sync::Arc;

use crate::dialog::DeleteDialog;

/// The `/chats` routes the history view needs.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_chats(&self) -> Result<Vec<Chat>, ApiError>;
    async fn chat_messages(&self, id: &str) -> Result<Vec<ChatMessage>, ApiError>;
    async fn update_chat(&self, id: &str, update: &ChatUpdate) -> Result<Chat, ApiError>;
    async fn delete_chat(&self, id: &str) -> Result<(), ApiError>;
    async fn delete_all_chats(&self) -> Result<(), ApiError>;
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_chats(&self) -> Result<Vec<Chat>, ApiError> {
        ApiClient::list_chats(self).await
    }

    async fn chat_messages(&self, id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        ApiClient::chat_messages(self, id).await
    }

    async fn update_chat(&self, id: &str, update: &ChatUpdate) -> Result<Chat, ApiError> {
        ApiClient::update_chat(self, id, update).await
    }

    async fn delete_chat(&self, id: &str) -> Result<(), ApiError> {
        ApiClient::delete_chat(self, id).await
    }

    async fn delete_all_chats(&self) -> Result<(), ApiError> {
        ApiClient::delete_all_chats(self).await
    }
}

/// What the delete dialog is about to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatDeletion {
    One(String),
    All,
}

pub struct ChatHistory {
    backend: Arc<dyn ChatBackend>,
    chats: Vec<Chat>,
    delete_dialog: DeleteDialog<ChatDeletion>,
}

impl ChatHistory {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            chats: Vec::new(),
            delete_dialog: DeleteDialog::Closed,
        }
    }

    /// Most recently updated first.
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let mut chats = self.backend.list_chats().await?;
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.chats = chats;
        Ok(())
    }

    pub async fn open(&self, id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.backend.chat_messages(id).await
    }

    pub async fn rename(&mut self, id: &str, name: &str) -> Result<(), ApiError> {
        let update = ChatUpdate {
            name: name.trim().to_string(),
        };
        let updated = self.backend.update_chat(id, &update).await?;
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == id) {
            *chat = updated;
        }
        Ok(())
    }

    pub fn delete_dialog(&self) -> &DeleteDialog<ChatDeletion> {
        &self.delete_dialog
    }

    pub fn request_delete(&mut self, id: &str) {
        self.delete_dialog.open(ChatDeletion::One(id.to_string()));
    }

    pub fn request_delete_all(&mut self) {
        self.delete_dialog.open(ChatDeletion::All);
    }

    pub fn cancel_delete(&mut self) {
        self.delete_dialog.cancel();
    }

    /// Carry out the pending deletion. Returns `false` when nothing was pending.
    pub async fn confirm_delete(&mut self) -> Result<bool, ApiError> {
        match self.delete_dialog.take() {
            Some(ChatDeletion::One(id)) => {
                self.backend.delete_chat(&id).await?;
                self.chats.retain(|c| c.id != id);
                tracing::info!(chat = %id, "chat deleted");
                Ok(true)
            }
            Some(ChatDeletion::All) => {
                self.backend.delete_all_chats().await?;
                self.chats.clear();
                tracing::info!("all chats deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use reqwest::StatusCode;

    #[derive(Default)]
    struct FakeBackend {
        chats: Mutex<Vec<Chat>>,
        deleted: Mutex<Vec<String>>,
    }

    fn chat(id: &str, hour: u32) -> Chat {
        Chat {
            id: id.to_string(),
            name: format!("chat {}", id),
            created_at: None,
            updated_at: Some(Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()),
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn list_chats(&self) -> Result<Vec<Chat>, ApiError> {
            Ok(self.chats.lock().clone())
        }

        async fn chat_messages(&self, id: &str) -> Result<Vec<ChatMessage>, ApiError> {
            if id == "missing" {
                return Err(ApiError::Http {
                    status: StatusCode::NOT_FOUND,
                    detail: "Chat not found".into(),
                });
            }
            Ok(vec![ChatMessage {
                id: None,
                role: "user".into(),
                content: "hello".into(),
                created_at: None,
            }])
        }

        async fn update_chat(&self, id: &str, update: &ChatUpdate) -> Result<Chat, ApiError> {
            let mut chats = self.chats.lock();
            let chat = chats.iter_mut().find(|c| c.id == id).ok_or(ApiError::Http {
                status: StatusCode::NOT_FOUND,
                detail: "Chat not found".into(),
            })?;
            chat.name = update.name.clone();
            Ok(chat.clone())
        }

        async fn delete_chat(&self, id: &str) -> Result<(), ApiError> {
            self.deleted.lock().push(id.to_string());
            self.chats.lock().retain(|c| c.id != id);
            Ok(())
        }

        async fn delete_all_chats(&self) -> Result<(), ApiError> {
            self.deleted.lock().push("*".to_string());
            self.chats.lock().clear();
            Ok(())
        }
    }

    fn history() -> (Arc<FakeBackend>, ChatHistory) {
        let backend = Arc::new(FakeBackend::default());
        *backend.chats.lock() = vec![chat("a", 1), chat("b", 5), chat("c", 3)];
        let history = ChatHistory::new(backend.clone());
        (backend, history)
    }

    #[tokio::test]
    async fn test_refresh_sorts_newest_first() {
        let (_, mut history) = history();
        history.refresh().await.unwrap();
        let ids: Vec<_> = history.chats().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_rename_trims() {
        let (_, mut history) = history();
        history.refresh().await.unwrap();
        history.rename("a", "  Upgrade plan  ").await.unwrap();
        let renamed = history.chats().iter().find(|c| c.id == "a").unwrap();
        assert_eq!(renamed.name, "Upgrade plan");
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let (backend, mut history) = history();
        history.refresh().await.unwrap();

        history.request_delete("a");
        history.cancel_delete();
        assert!(!history.confirm_delete().await.unwrap());
        assert!(backend.deleted.lock().is_empty());

        history.request_delete("a");
        assert!(history.confirm_delete().await.unwrap());
        assert_eq!(*backend.deleted.lock(), vec!["a".to_string()]);
        assert_eq!(history.chats().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let (_, mut history) = history();
        history.refresh().await.unwrap();
        history.request_delete_all();
        assert!(history.confirm_delete().await.unwrap());
        assert!(history.chats().is_empty());
    }

    #[tokio::test]
    async fn test_open_surfaces_detail() {
        let (_, history) = history();
        assert_eq!(history.open("a").await.unwrap().len(), 1);
        let err = history.open("missing").await.unwrap_err();
        assert_eq!(err.message(), "Chat not found");
    }
}
