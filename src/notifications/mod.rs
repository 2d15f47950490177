//! Outbound notification hand-off.
//!
//! The pipeline only produces the message; delivery and retries belong to
//! the notification system behind [`NotificationSink`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::SealedTriageRecord;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    pub incident_id: Uuid,
    pub stakeholders: Vec<String>,
    pub summary: String,
}

impl NotificationMessage {
    /// Build the message for a sealed record. Aborted runs that never
    /// reached planning notify the security team only.
    pub fn for_record(record: &SealedTriageRecord) -> Self {
        let stakeholders = record
            .plan
            .as_ref()
            .map(|p| p.stakeholders.clone())
            .unwrap_or_else(|| vec!["Security Team".to_string()]);

        Self {
            incident_id: record.incident_id,
            stakeholders,
            summary: record.summary(),
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &NotificationMessage) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, message: &NotificationMessage) -> Result<()> {
        info!(
            incident_id = %message.incident_id,
            stakeholders = ?message.stakeholders,
            summary = %message.summary,
            "Stakeholder notification queued"
        );
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSink {
    messages: Arc<Mutex<Vec<NotificationMessage>>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, message: &NotificationMessage) -> Result<()> {
        self.messages.lock().push(message.clone());
        Ok(())
    }
}
