use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;
use strum::{Display, EnumString};
use uuid::Uuid;

use super::assessment::{
    Classification, ComplianceResult, ComplianceStatus, PolicyCheckResult, PriorityAssessment,
};
use super::incident::Incident;
use super::plan::{ExecutionResult, ResponsePlan};
use crate::error::{AppError, Result};

/// Lifecycle of a single triage run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
pub enum PipelineState {
    Created,
    Classified,
    PriorityAssessed,
    PolicyChecked,
    ComplianceValidated,
    PlanGenerated,
    AwaitingApproval,
    Executed,
    Sealed,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Sealed | PipelineState::Aborted)
    }

    /// Allowed forward transitions. Any non-terminal state may abort.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        if next == Aborted {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Created, Classified)
                | (Classified, PriorityAssessed)
                | (PriorityAssessed, PolicyChecked)
                | (PolicyChecked, ComplianceValidated)
                | (ComplianceValidated, PlanGenerated)
                | (PlanGenerated, AwaitingApproval)
                | (PlanGenerated, Executed)
                | (AwaitingApproval, Executed)
                | (Executed, Sealed)
        )
    }
}

/// Pipeline stage names, used for failures and metrics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
pub enum PipelineStage {
    Classification,
    RiskAssessment,
    PolicyCheck,
    ComplianceValidation,
    ResponsePlanning,
    Approval,
    Execution,
}

/// External decision on an escalated incident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub decided_by: String,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ApprovalDecision {
    pub fn approve(decided_by: impl Into<String>) -> Self {
        Self {
            approved: true,
            decided_by: decided_by.into(),
            comment: None,
            decided_at: Utc::now(),
        }
    }

    pub fn reject(decided_by: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            decided_by: decided_by.into(),
            comment: Some(reason.into()),
            decided_at: Utc::now(),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriageOutcome {
    Completed,
    ApprovalRejected { decided_by: String },
    ApprovalTimeout,
    StageFailed { stage: PipelineStage, error: String },
    Cancelled { at: PipelineState },
}

impl TriageOutcome {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            TriageOutcome::Completed => "completed",
            TriageOutcome::ApprovalRejected { .. } => "approval_rejected",
            TriageOutcome::ApprovalTimeout => "approval_timeout",
            TriageOutcome::StageFailed { .. } => "stage_failed",
            TriageOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: PipelineState,
    pub to: PipelineState,
    pub at: DateTime<Utc>,
}

/// Aggregate result of one triage run.
///
/// Only the pipeline mutates a record; callers receive it as a
/// [`SealedTriageRecord`] once the run reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRecord {
    pub incident_id: Uuid,
    pub incident_fingerprint: String,
    pub state: PipelineState,

    pub classification: Option<Classification>,
    pub priority: Option<PriorityAssessment>,
    pub policy: Option<PolicyCheckResult>,
    pub compliance: Option<ComplianceResult>,
    pub plan: Option<ResponsePlan>,
    pub execution: Option<ExecutionResult>,

    pub human_review_required: bool,
    pub approval: Option<ApprovalDecision>,

    /// Combined policy and regulatory verdict
    pub compliance_status: Option<ComplianceStatus>,

    pub outcome: Option<TriageOutcome>,
    pub history: Vec<StateTransition>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sealed_at: Option<DateTime<Utc>>,
}

impl TriageRecord {
    pub(crate) fn new(incident: &Incident) -> Self {
        let now = Utc::now();
        Self {
            incident_id: incident.id,
            incident_fingerprint: incident.fingerprint(),
            state: PipelineState::Created,
            classification: None,
            priority: None,
            policy: None,
            compliance: None,
            plan: None,
            execution: None,
            human_review_required: false,
            approval: None,
            compliance_status: None,
            outcome: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            sealed_at: None,
        }
    }

    fn transition(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition(format!(
                "{} -> {} for incident {}",
                self.state, next, self.incident_id
            )));
        }

        let now = Utc::now();
        self.history.push(StateTransition {
            from: self.state,
            to: next,
            at: now,
        });
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    pub(crate) fn attach_classification(&mut self, classification: Classification) -> Result<()> {
        self.transition(PipelineState::Classified)?;
        self.classification = Some(classification);
        Ok(())
    }

    pub(crate) fn attach_priority(&mut self, assessment: PriorityAssessment) -> Result<()> {
        self.transition(PipelineState::PriorityAssessed)?;
        self.priority = Some(assessment);
        Ok(())
    }

    pub(crate) fn attach_policy(&mut self, result: PolicyCheckResult) -> Result<()> {
        self.transition(PipelineState::PolicyChecked)?;
        self.policy = Some(result);
        Ok(())
    }

    pub(crate) fn attach_compliance(&mut self, result: ComplianceResult) -> Result<()> {
        self.transition(PipelineState::ComplianceValidated)?;

        let policy_ok = self.policy.as_ref().map(|p| p.is_compliant()).unwrap_or(false);
        self.compliance_status = Some(if policy_ok && result.passed {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NonCompliant
        });
        self.compliance = Some(result);
        Ok(())
    }

    pub(crate) fn attach_plan(&mut self, plan: ResponsePlan, human_review_required: bool) -> Result<()> {
        self.transition(PipelineState::PlanGenerated)?;
        self.plan = Some(plan);
        self.human_review_required = human_review_required;
        Ok(())
    }

    pub(crate) fn await_approval(&mut self) -> Result<()> {
        self.transition(PipelineState::AwaitingApproval)
    }

    pub(crate) fn record_approval(&mut self, decision: ApprovalDecision) {
        self.approval = Some(decision);
        self.updated_at = Utc::now();
    }

    /// Execution may only be attached once policy and compliance results exist.
    pub(crate) fn attach_execution(&mut self, result: ExecutionResult) -> Result<()> {
        if self.policy.is_none() || self.compliance.is_none() {
            return Err(AppError::InvalidStateTransition(format!(
                "incident {} executed before policy and compliance checks",
                self.incident_id
            )));
        }
        self.transition(PipelineState::Executed)?;
        self.execution = Some(result);
        Ok(())
    }

    /// Whether all six stage results are attached
    pub fn is_complete(&self) -> bool {
        self.classification.is_some()
            && self.priority.is_some()
            && self.policy.is_some()
            && self.compliance.is_some()
            && self.plan.is_some()
            && self.execution.is_some()
    }

    fn check_sealable(&self) -> Result<()> {
        if !self.is_complete() {
            return Err(AppError::InvalidStateTransition(format!(
                "incident {} sealed with missing stage results",
                self.incident_id
            )));
        }
        if !self.state.can_transition_to(PipelineState::Sealed) {
            return Err(AppError::InvalidStateTransition(format!(
                "{} -> {} for incident {}",
                self.state,
                PipelineState::Sealed,
                self.incident_id
            )));
        }
        Ok(())
    }

    fn into_sealed(mut self) -> SealedTriageRecord {
        let now = Utc::now();
        self.history.push(StateTransition {
            from: self.state,
            to: PipelineState::Sealed,
            at: now,
        });
        self.state = PipelineState::Sealed;
        self.updated_at = now;
        self.outcome = Some(TriageOutcome::Completed);
        self.sealed_at = Some(now);
        SealedTriageRecord(Arc::new(self))
    }

    /// Seal a completed run
    pub(crate) fn seal(self) -> Result<SealedTriageRecord> {
        self.check_sealable()?;
        Ok(self.into_sealed())
    }

    /// Seal a completed run, or abort it as a failure of `stage` when it
    /// cannot be sealed
    pub(crate) fn seal_or_abort(self, stage: PipelineStage) -> SealedTriageRecord {
        match self.check_sealable() {
            Ok(()) => self.into_sealed(),
            Err(e) => self.abort(TriageOutcome::StageFailed {
                stage,
                error: e.to_string(),
            }),
        }
    }

    /// Seal a run that ended early; always succeeds
    pub(crate) fn abort(mut self, outcome: TriageOutcome) -> SealedTriageRecord {
        if !self.state.is_terminal() {
            let now = Utc::now();
            self.history.push(StateTransition {
                from: self.state,
                to: PipelineState::Aborted,
                at: now,
            });
            self.state = PipelineState::Aborted;
            self.updated_at = now;
        }
        self.outcome = Some(outcome);
        self.sealed_at = Some(self.updated_at);
        SealedTriageRecord(Arc::new(self))
    }
}

/// Read-only view of a terminal triage record
#[derive(Debug, Clone)]
pub struct SealedTriageRecord(Arc<TriageRecord>);

impl SealedTriageRecord {
    pub fn outcome(&self) -> &TriageOutcome {
        // seal() and abort() always set an outcome
        self.0.outcome.as_ref().unwrap_or(&TriageOutcome::Completed)
    }

    pub fn is_aborted(&self) -> bool {
        self.0.state == PipelineState::Aborted
    }

    /// One-line summary for notifications
    pub fn summary(&self) -> String {
        let category = self
            .classification
            .as_ref()
            .map(|c| c.category.to_string())
            .unwrap_or_else(|| "Unclassified".to_string());
        let priority = self
            .priority
            .as_ref()
            .map(|p| format!("{} (risk {}/10)", p.priority, p.risk_score))
            .unwrap_or_else(|| "unassessed".to_string());
        let action = self
            .plan
            .as_ref()
            .map(|p| p.action.as_str())
            .unwrap_or("no action planned");

        format!(
            "Incident {} [{}] priority {}: {}; outcome {}",
            self.incident_id,
            category,
            priority,
            action,
            self.outcome().label()
        )
    }
}

impl Deref for SealedTriageRecord {
    type Target = TriageRecord;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for SealedTriageRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ExecutionStatus, IncidentCategory, PriorityLevel, Severity,
    };
    use std::collections::BTreeSet;

    fn incident() -> Incident {
        Incident::new(IncidentCategory::General, Severity::Low, "Lost key card", "front-desk")
    }

    fn classification() -> Classification {
        Classification {
            category: IncidentCategory::General,
            confidence: 20,
            reasoning: "no evidence".to_string(),
            signals: vec![],
        }
    }

    fn assessment() -> PriorityAssessment {
        PriorityAssessment {
            risk_score: 3,
            raw_score: 3,
            priority: PriorityLevel::Low,
            factors: vec![],
        }
    }

    fn policy() -> PolicyCheckResult {
        PolicyCheckResult {
            status: ComplianceStatus::Compliant,
            applicable_policies: vec!["General Security Policy".to_string()],
            violation_count: 0,
            violations: vec![],
        }
    }

    fn compliance() -> ComplianceResult {
        ComplianceResult {
            frameworks: vec![],
            notification_deadline: None,
            passed: true,
            requires_regulatory_notification: false,
        }
    }

    fn plan() -> ResponsePlan {
        ResponsePlan {
            category: IncidentCategory::General,
            priority: PriorityLevel::Low,
            action: "Standard security response protocol".to_string(),
            timeline: "Within 1 hour".to_string(),
            stakeholders: vec![],
            resolution_estimate: "2-4 hours".to_string(),
            actions: vec![],
            regulatory_deadline: None,
            strict_escalation: false,
        }
    }

    fn execution() -> ExecutionResult {
        ExecutionResult {
            status: ExecutionStatus::Success,
            actions_taken: vec![],
            systems_updated: BTreeSet::new(),
            notification_count: 0,
            outcomes: vec![],
        }
    }

    #[test]
    fn test_full_lifecycle_seals() {
        let mut record = TriageRecord::new(&incident());
        record.attach_classification(classification()).unwrap();
        record.attach_priority(assessment()).unwrap();
        record.attach_policy(policy()).unwrap();
        record.attach_compliance(compliance()).unwrap();
        record.attach_plan(plan(), false).unwrap();
        record.attach_execution(execution()).unwrap();

        let sealed = record.seal().unwrap();
        assert_eq!(sealed.state, PipelineState::Sealed);
        assert_eq!(sealed.outcome(), &TriageOutcome::Completed);
        assert_eq!(sealed.compliance_status, Some(ComplianceStatus::Compliant));
        assert_eq!(sealed.history.len(), 7);
        assert!(sealed.sealed_at.is_some());
    }

    #[test]
    fn test_stage_cannot_be_skipped() {
        let mut record = TriageRecord::new(&incident());
        record.attach_classification(classification()).unwrap();
        let err = record.attach_policy(policy()).unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));
    }

    #[test]
    fn test_seal_requires_all_results() {
        let mut record = TriageRecord::new(&incident());
        record.attach_classification(classification()).unwrap();
        assert!(!record.is_complete());
        assert!(record.seal().is_err());
    }

    #[test]
    fn test_seal_or_abort_reports_stage() {
        let mut record = TriageRecord::new(&incident());
        record.attach_classification(classification()).unwrap();

        let sealed = record.seal_or_abort(PipelineStage::Execution);
        assert!(sealed.is_aborted());
        assert!(matches!(
            sealed.outcome(),
            TriageOutcome::StageFailed { stage: PipelineStage::Execution, .. }
        ));
    }

    #[test]
    fn test_abort_from_awaiting_approval() {
        let mut record = TriageRecord::new(&incident());
        record.attach_classification(classification()).unwrap();
        record.attach_priority(assessment()).unwrap();
        record.attach_policy(policy()).unwrap();
        record.attach_compliance(compliance()).unwrap();
        record.attach_plan(plan(), true).unwrap();
        record.await_approval().unwrap();

        let sealed = record.abort(TriageOutcome::ApprovalTimeout);
        assert!(sealed.is_aborted());
        assert_eq!(sealed.outcome().label(), "approval_timeout");
        assert!(sealed.execution.is_none());
        assert!(sealed.summary().contains("approval_timeout"));
    }

    #[test]
    fn test_non_compliant_policy_marks_record() {
        let mut record = TriageRecord::new(&incident());
        record.attach_classification(classification()).unwrap();
        record.attach_priority(assessment()).unwrap();
        let mut failing = policy();
        failing.status = ComplianceStatus::NonCompliant;
        failing.violation_count = 1;
        record.attach_policy(failing).unwrap();
        record.attach_compliance(compliance()).unwrap();
        assert_eq!(record.compliance_status, Some(ComplianceStatus::NonCompliant));
    }

    #[test]
    fn test_transition_table() {
        use PipelineState::*;
        assert!(PlanGenerated.can_transition_to(AwaitingApproval));
        assert!(PlanGenerated.can_transition_to(Executed));
        assert!(!AwaitingApproval.can_transition_to(Sealed));
        assert!(Classified.can_transition_to(Aborted));
        assert!(!Sealed.can_transition_to(Aborted));
        assert!(!Aborted.can_transition_to(Created));
    }
}
