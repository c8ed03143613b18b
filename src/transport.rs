//! Chat transport interface
//!
//! The engine talks to the chat layer through this narrow seam. All calls
//! are fire-and-forget from the state machine's perspective except `send`,
//! which must return a message id for report association.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::Keyboard;
use crate::Result;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, user_id: i64, text: &str, keyboard: Option<Keyboard>) -> Result<i64>;

    async fn edit(
        &self,
        user_id: i64,
        message_id: i64,
        text: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    async fn delete(&self, user_id: i64, message_id: i64) -> Result<()>;
}

/// One outbound transport call, as observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum SentItem {
    Message {
        user_id: i64,
        message_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        user_id: i64,
        message_id: i64,
        text: Option<String>,
        keyboard: Option<Keyboard>,
    },
    Delete {
        user_id: i64,
        message_id: i64,
    },
}

/// Transport double that records outbound traffic and hands out sequential
/// message ids. Used by the demo binary and by tests.
pub struct RecordingTransport {
    log: Arc<Mutex<Vec<SentItem>>>,
    next_message_id: Arc<Mutex<i64>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            next_message_id: Arc::new(Mutex::new(1)),
        }
    }

    pub async fn sent(&self) -> Vec<SentItem> {
        self.log.lock().await.clone()
    }

    /// Text of the most recent `send` or text-bearing `edit`, if any.
    pub async fn last_text(&self) -> Option<String> {
        self.log.lock().await.iter().rev().find_map(|item| match item {
            SentItem::Message { text, .. } => Some(text.clone()),
            SentItem::Edit { text: Some(text), .. } => Some(text.clone()),
            _ => None,
        })
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, user_id: i64, text: &str, keyboard: Option<Keyboard>) -> Result<i64> {
        let mut next = self.next_message_id.lock().await;
        let message_id = *next;
        *next += 1;
        drop(next);

        self.log.lock().await.push(SentItem::Message {
            user_id,
            message_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(message_id)
    }

    async fn edit(
        &self,
        user_id: i64,
        message_id: i64,
        text: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.log.lock().await.push(SentItem::Edit {
            user_id,
            message_id,
            text: text.map(|t| t.to_string()),
            keyboard,
        });
        Ok(())
    }

    async fn delete(&self, user_id: i64, message_id: i64) -> Result<()> {
        self.log
            .lock()
            .await
            .push(SentItem::Delete { user_id, message_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_returns_sequential_ids() {
        let transport = RecordingTransport::new();
        let first = transport.send(1, "hello", None).await.unwrap();
        let second = transport.send(1, "again", None).await.unwrap();
        assert_eq!(second, first + 1);

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(transport.last_text().await.as_deref(), Some("again"));
    }
}
