//! Transient user-facing messages. The dashboard renders these as toasts;
//! emission never blocks or fails a mutation path.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Clone)]
pub struct NotificationService {
    sender: broadcast::Sender<Notification>,
}

impl NotificationService {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(NotificationLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.publish(NotificationLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(NotificationLevel::Error, message);
    }

    fn publish(&self, level: NotificationLevel, message: impl Into<String>) {
        // A send with no subscribers is fine; nothing is listening yet.
        let _ = self.sender.send(Notification {
            level,
            message: message.into(),
        });
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let notifications = NotificationService::new();
        let mut receiver = notifications.subscribe();

        notifications.success("Pedido criado com sucesso!");

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.level, NotificationLevel::Success);
        assert_eq!(received.message, "Pedido criado com sucesso!");
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let notifications = NotificationService::new();
        notifications.error("Erro ao atualizar pedido");
    }
}
