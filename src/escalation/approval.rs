use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::metrics::TRIAGE_PENDING_APPROVALS;
use crate::models::{ApprovalDecision, PriorityLevel};

/// Payload sent to the approval workflow when a run suspends
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequest {
    pub incident_id: Uuid,
    pub priority: PriorityLevel,
    pub risk_score: u8,

    /// After this instant the run aborts; `None` waits indefinitely
    pub deadline: Option<DateTime<Utc>>,

    pub requested_at: DateTime<Utc>,
    pub summary: String,
}

/// Outbound side of the approval workflow
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    async fn request_approval(&self, request: &ApprovalRequest) -> Result<()>;
}

/// Writes approval requests to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingApprovalNotifier;

#[async_trait]
impl ApprovalNotifier for LoggingApprovalNotifier {
    async fn request_approval(&self, request: &ApprovalRequest) -> Result<()> {
        info!(
            incident_id = %request.incident_id,
            priority = %request.priority,
            risk_score = request.risk_score,
            deadline = ?request.deadline,
            "Human approval requested"
        );
        Ok(())
    }
}

struct PendingApproval {
    request: ApprovalRequest,
    sender: oneshot::Sender<ApprovalDecision>,
}

/// Inbound side of the approval workflow.
///
/// Each suspended run registers a one-shot channel keyed by incident id;
/// an external decision resolves that channel exactly once.
#[derive(Default)]
pub struct ApprovalBroker {
    pending: DashMap<Uuid, PendingApproval>,
}

impl ApprovalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a suspended run and get the receiving end of its decision
    pub fn register(&self, request: ApprovalRequest) -> Result<oneshot::Receiver<ApprovalDecision>> {
        let incident_id = request.incident_id;
        match self.pending.entry(incident_id) {
            Entry::Occupied(_) => Err(AppError::InvalidStateTransition(format!(
                "incident {} is already awaiting approval",
                incident_id
            ))),
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                slot.insert(PendingApproval { request, sender });
                TRIAGE_PENDING_APPROVALS.inc();
                Ok(receiver)
            }
        }
    }

    pub fn approve(&self, incident_id: Uuid, decided_by: impl Into<String>) -> Result<()> {
        self.decide(incident_id, ApprovalDecision::approve(decided_by))
    }

    pub fn reject(
        &self,
        incident_id: Uuid,
        decided_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<()> {
        self.decide(incident_id, ApprovalDecision::reject(decided_by, reason))
    }

    /// Deliver a decision to the waiting run
    pub fn decide(&self, incident_id: Uuid, decision: ApprovalDecision) -> Result<()> {
        let (_, pending) = self.pending.remove(&incident_id).ok_or_else(|| {
            AppError::NotFound(format!("no pending approval for incident {}", incident_id))
        })?;
        TRIAGE_PENDING_APPROVALS.dec();

        let approved = decision.approved;
        let decided_by = decision.decided_by.clone();

        pending.sender.send(decision).map_err(|_| {
            warn!(incident_id = %incident_id, "Approval decision arrived after run stopped waiting");
            AppError::NotFound(format!("incident {} is no longer awaiting approval", incident_id))
        })?;

        info!(
            incident_id = %incident_id,
            approved,
            decided_by = %decided_by,
            "Approval decision delivered"
        );
        Ok(())
    }

    /// Drop a pending entry after timeout or cancellation
    pub fn withdraw(&self, incident_id: &Uuid) {
        if self.pending.remove(incident_id).is_some() {
            TRIAGE_PENDING_APPROVALS.dec();
        }
    }

    pub fn is_pending(&self, incident_id: &Uuid) -> bool {
        self.pending.contains_key(incident_id)
    }

    /// Snapshot of all requests currently waiting
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        let mut requests: Vec<ApprovalRequest> = self
            .pending
            .iter()
            .map(|entry| entry.value().request.clone())
            .collect();
        requests.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        requests
    }
}
