use crate::error::{AppError, Result};
use crate::models::{PipelineState, PriorityLevel, SealedTriageRecord};
use crate::state::AuditSink;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Filter for listing stored records
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub states: Vec<PipelineState>,
    pub priorities: Vec<PriorityLevel>,
    pub review_required_only: bool,
}

/// In-memory audit store (for embedding and testing)
#[derive(Clone, Default)]
pub struct InMemoryAuditStore {
    records: Arc<DashMap<Uuid, SealedTriageRecord>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, incident_id: &Uuid) -> Option<SealedTriageRecord> {
        self.records.get(incident_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records matching the filter, newest first
    pub fn list(&self, filter: &RecordFilter) -> Vec<SealedTriageRecord> {
        let mut records: Vec<SealedTriageRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|record| {
                let state_match = filter.states.is_empty() || filter.states.contains(&record.state);

                let priority_match = filter.priorities.is_empty()
                    || record
                        .priority
                        .as_ref()
                        .map(|p| filter.priorities.contains(&p.priority))
                        .unwrap_or(false);

                let review_match = !filter.review_required_only || record.human_review_required;

                state_match && priority_match && review_match
            })
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditStore {
    async fn persist(&self, record: &SealedTriageRecord) -> Result<()> {
        // sealed records are write-once
        if self.records.contains_key(&record.incident_id) {
            return Err(AppError::InvalidStateTransition(format!(
                "triage record for incident {} already persisted",
                record.incident_id
            )));
        }

        self.records.insert(record.incident_id, record.clone());
        tracing::debug!(incident_id = %record.incident_id, "Triage record persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Incident, IncidentCategory, Severity, TriageOutcome, TriageRecord};

    fn aborted_record() -> SealedTriageRecord {
        let incident = Incident::new(IncidentCategory::General, Severity::Low, "test", "unit");
        TriageRecord::new(&incident).abort(TriageOutcome::Cancelled {
            at: PipelineState::Created,
        })
    }

    #[tokio::test]
    async fn test_persist_and_get() {
        let store = InMemoryAuditStore::new();
        let record = aborted_record();
        store.persist(&record).await.unwrap();

        let stored = store.get(&record.incident_id).unwrap();
        assert_eq!(stored.incident_id, record.incident_id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_is_write_once() {
        let store = InMemoryAuditStore::new();
        let record = aborted_record();
        store.persist(&record).await.unwrap();
        assert!(store.persist(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_state() {
        let store = InMemoryAuditStore::new();
        store.persist(&aborted_record()).await.unwrap();
        store.persist(&aborted_record()).await.unwrap();

        let aborted = store.list(&RecordFilter {
            states: vec![PipelineState::Aborted],
            ..Default::default()
        });
        assert_eq!(aborted.len(), 2);

        let sealed = store.list(&RecordFilter {
            states: vec![PipelineState::Sealed],
            ..Default::default()
        });
        assert!(sealed.is_empty());

        let review = store.list(&RecordFilter {
            review_required_only: true,
            ..Default::default()
        });
        assert!(review.is_empty());
    }
}
