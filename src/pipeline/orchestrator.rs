use chrono::Utc;
use futures::future;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classification::{IncidentClassifier, KeywordClassifier};
use crate::compliance::{ComplianceRuleEvaluator, ComplianceValidator};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::escalation::{
    requires_human_review, ApprovalBroker, ApprovalNotifier, ApprovalRequest, LoggingApprovalNotifier,
};
use crate::execution::{DispatchContext, DispatcherRegistry, Executor};
use crate::metrics::{
    TRIAGE_RISK_SCORE, TRIAGE_RUNS_TOTAL, TRIAGE_STAGE_DURATION_SECONDS, TRIAGE_STAGE_RETRIES_TOTAL,
};
use crate::models::{
    ApprovalDecision, Incident, PipelineStage, PipelineState, SealedTriageRecord, TriageOutcome,
    TriageRecord,
};
use crate::notifications::{LoggingNotificationSink, NotificationMessage, NotificationSink};
use crate::policy::{PolicyChecker, PolicyRuleEvaluator};
use crate::response::ResponsePlanner;
use crate::risk::RiskScorer;
use crate::state::{AuditSink, InMemoryAuditStore};
use crate::tables::{TableStore, TriageTables};

/// A stage gets at most one retry after a recoverable failure
pub const MAX_STAGE_RETRIES: u32 = 1;

/// Why a run stopped before sealing
type Halt = TriageOutcome;

/// Runs incidents through the triage stages and seals one record per run.
///
/// The pipeline holds no per-run state, so one instance can triage many
/// incidents concurrently.
pub struct TriagePipeline {
    classifier: Arc<dyn IncidentClassifier>,
    scorer: RiskScorer,
    policy_checker: PolicyChecker,
    compliance_validator: ComplianceValidator,
    planner: ResponsePlanner,
    executor: Executor,
    broker: Arc<ApprovalBroker>,
    approval_notifier: Arc<dyn ApprovalNotifier>,
    audit_sink: Arc<dyn AuditSink>,
    notification_sink: Arc<dyn NotificationSink>,
    tables: TableStore,
    stage_retries: u32,
    approval_timeout: Option<Duration>,
}

impl Default for TriagePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TriagePipeline {
    /// Pipeline with built-in tables, simulated dispatchers and logging sinks
    pub fn new() -> Self {
        Self {
            classifier: Arc::new(KeywordClassifier::new()),
            scorer: RiskScorer::new(),
            policy_checker: PolicyChecker::default(),
            compliance_validator: ComplianceValidator::default(),
            planner: ResponsePlanner::new(),
            executor: Executor::new(Arc::new(DispatcherRegistry::simulated())),
            broker: Arc::new(ApprovalBroker::new()),
            approval_notifier: Arc::new(LoggingApprovalNotifier),
            audit_sink: Arc::new(InMemoryAuditStore::new()),
            notification_sink: Arc::new(LoggingNotificationSink),
            tables: TableStore::default(),
            stage_retries: MAX_STAGE_RETRIES,
            approval_timeout: None,
        }
    }

    /// Build a pipeline from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let tables = match &config.tables.path {
            Some(path) => TriageTables::from_yaml_file(path)?,
            None => TriageTables::default(),
        };

        let mut classifier = KeywordClassifier::new();
        if let Some(jitter) = config.pipeline.jitter() {
            classifier = classifier.with_jitter(jitter);
        }

        Ok(Self::new()
            .with_classifier(Arc::new(classifier))
            .with_tables(TableStore::new(tables))
            .with_stage_retries(config.pipeline.stage_retries)
            .with_approval_timeout(config.pipeline.approval_timeout()))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IncidentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_policy_evaluator(mut self, evaluator: Arc<dyn PolicyRuleEvaluator>) -> Self {
        self.policy_checker = PolicyChecker::new(evaluator);
        self
    }

    pub fn with_compliance_evaluator(mut self, evaluator: Arc<dyn ComplianceRuleEvaluator>) -> Self {
        self.compliance_validator = ComplianceValidator::new(evaluator);
        self
    }

    pub fn with_dispatchers(mut self, registry: DispatcherRegistry) -> Self {
        self.executor = Executor::new(Arc::new(registry));
        self
    }

    /// Share an approval broker, e.g. with a notifier that answers requests
    pub fn with_broker(mut self, broker: Arc<ApprovalBroker>) -> Self {
        self.broker = broker;
        self
    }

    pub fn with_approval_notifier(mut self, notifier: Arc<dyn ApprovalNotifier>) -> Self {
        self.approval_notifier = notifier;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = sink;
        self
    }

    pub fn with_tables(mut self, tables: TableStore) -> Self {
        self.tables = tables;
        self
    }

    /// Retries per stage, capped at [`MAX_STAGE_RETRIES`]
    pub fn with_stage_retries(mut self, retries: u32) -> Self {
        self.stage_retries = retries.min(MAX_STAGE_RETRIES);
        self
    }

    /// `None` waits for a decision indefinitely
    pub fn with_approval_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Inbound side of the approval workflow
    pub fn broker(&self) -> Arc<ApprovalBroker> {
        self.broker.clone()
    }

    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    /// Triage an incident to a sealed record.
    ///
    /// Only a malformed incident is returned as an error; every other
    /// failure ends in an aborted record.
    pub async fn triage(&self, incident: Incident) -> Result<SealedTriageRecord> {
        self.triage_with_cancellation(incident, CancellationToken::new()).await
    }

    /// Like [`triage`](Self::triage), stopping at the next stage boundary
    /// or approval wait once `cancel` fires
    pub async fn triage_with_cancellation(
        &self,
        incident: Incident,
        cancel: CancellationToken,
    ) -> Result<SealedTriageRecord> {
        incident.ensure_valid()?;

        let tables = self.tables.snapshot();
        let mut record = TriageRecord::new(&incident);

        info!(
            incident_id = %incident.id,
            category = %incident.category,
            severity = %incident.severity,
            "Triage started"
        );

        let sealed = match self.drive(&incident, &tables, &mut record, &cancel).await {
            Ok(()) => record.seal_or_abort(PipelineStage::Execution),
            Err(halt) => {
                warn!(
                    incident_id = %incident.id,
                    state = %record.state,
                    outcome = halt.label(),
                    "Triage aborted"
                );
                record.abort(halt)
            }
        };

        TRIAGE_RUNS_TOTAL
            .with_label_values(&[sealed.outcome().label()])
            .inc();

        self.hand_off(&sealed).await;

        info!(
            incident_id = %sealed.incident_id,
            state = %sealed.state,
            outcome = sealed.outcome().label(),
            human_review_required = sealed.human_review_required,
            "Triage sealed"
        );

        Ok(sealed)
    }

    async fn drive(
        &self,
        incident: &Incident,
        tables: &TriageTables,
        record: &mut TriageRecord,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), Halt> {
        let id = incident.id;

        check_cancelled(record, cancel)?;
        let classification = self
            .run_stage(id, PipelineStage::Classification, || {
                future::ready(Ok(self.classifier.classify(incident, &tables.classifier)))
            })
            .await?;
        let category = classification.category;
        attach(
            PipelineStage::Classification,
            record.attach_classification(classification.clone()),
        )?;

        check_cancelled(record, cancel)?;
        let assessment = self
            .run_stage(id, PipelineStage::RiskAssessment, || {
                future::ready(Ok(self.scorer.assess(incident, &classification)))
            })
            .await?;
        let priority = assessment.priority;
        let risk_score = assessment.risk_score;
        TRIAGE_RISK_SCORE.observe(risk_score as f64);
        attach(PipelineStage::RiskAssessment, record.attach_priority(assessment))?;

        check_cancelled(record, cancel)?;
        let policy = self
            .run_stage(id, PipelineStage::PolicyCheck, || {
                self.policy_checker.check(incident, category, &tables.policies)
            })
            .await?;
        attach(PipelineStage::PolicyCheck, record.attach_policy(policy.clone()))?;

        check_cancelled(record, cancel)?;
        let compliance = self
            .run_stage(id, PipelineStage::ComplianceValidation, || {
                self.compliance_validator.validate(incident, &tables.compliance)
            })
            .await?;
        attach(
            PipelineStage::ComplianceValidation,
            record.attach_compliance(compliance.clone()),
        )?;

        check_cancelled(record, cancel)?;
        let plan = self
            .run_stage(id, PipelineStage::ResponsePlanning, || {
                future::ready(Ok(self.planner.plan(
                    category,
                    priority,
                    &policy,
                    &compliance,
                    &tables.responses,
                )))
            })
            .await?;
        let review = requires_human_review(priority);
        attach(PipelineStage::ResponsePlanning, record.attach_plan(plan.clone(), review))?;

        if review {
            check_cancelled(record, cancel)?;
            attach(PipelineStage::Approval, record.await_approval())?;

            let decision = self.await_decision(record, risk_score, cancel).await?;
            let approved = decision.approved;
            let decided_by = decision.decided_by.clone();
            record.record_approval(decision);

            if !approved {
                return Err(TriageOutcome::ApprovalRejected { decided_by });
            }
        }

        check_cancelled(record, cancel)?;
        let context = DispatchContext {
            incident_id: id,
            category,
            priority,
            stakeholders: plan.stakeholders.clone(),
        };
        let started = std::time::Instant::now();
        let execution = self.executor.execute(&plan, &context).await;
        TRIAGE_STAGE_DURATION_SECONDS
            .with_label_values(&[&PipelineStage::Execution.to_string()])
            .observe(started.elapsed().as_secs_f64());
        attach(PipelineStage::Execution, record.attach_execution(execution))?;

        Ok(())
    }

    /// Run one stage, retrying recoverable failures at the stage boundary
    async fn run_stage<T, F, Fut>(&self, incident_id: Uuid, stage: PipelineStage, mut op: F) -> std::result::Result<T, Halt>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let stage_label = stage.to_string();
        let timer = TRIAGE_STAGE_DURATION_SECONDS
            .with_label_values(&[&stage_label])
            .start_timer();

        let mut retries = 0;
        let result = loop {
            match op().await {
                Ok(value) => break Ok(value),
                Err(e) if e.is_retryable() && retries < self.stage_retries => {
                    retries += 1;
                    TRIAGE_STAGE_RETRIES_TOTAL.with_label_values(&[&stage_label]).inc();
                    warn!(
                        incident_id = %incident_id,
                        stage = %stage,
                        retry = retries,
                        error = %e,
                        "Stage failed, retrying"
                    );
                }
                Err(e) => {
                    error!(
                        incident_id = %incident_id,
                        stage = %stage,
                        error = %e,
                        "Stage failed"
                    );
                    break Err(TriageOutcome::StageFailed {
                        stage,
                        error: e.to_string(),
                    });
                }
            }
        };

        timer.observe_duration();
        if result.is_ok() {
            debug!(incident_id = %incident_id, stage = %stage, "Stage complete");
        }
        result
    }

    /// Suspend until a decision arrives, the timeout elapses or the run is cancelled
    async fn await_decision(
        &self,
        record: &TriageRecord,
        risk_score: u8,
        cancel: &CancellationToken,
    ) -> std::result::Result<ApprovalDecision, Halt> {
        let incident_id = record.incident_id;
        let priority = record
            .priority
            .as_ref()
            .map(|p| p.priority)
            .ok_or_else(|| stage_failed(PipelineStage::Approval, "priority missing"))?;
        let summary = record
            .plan
            .as_ref()
            .map(|p| format!("{} ({})", p.action, p.timeline))
            .unwrap_or_default();

        let requested_at = Utc::now();
        let request = ApprovalRequest {
            incident_id,
            priority,
            risk_score,
            deadline: self
                .approval_timeout
                .and_then(|t| chrono::Duration::from_std(t).ok())
                .and_then(|t| requested_at.checked_add_signed(t)),
            requested_at,
            summary,
        };

        let receiver = self
            .broker
            .register(request.clone())
            .map_err(|e| stage_failed(PipelineStage::Approval, e.to_string()))?;

        if let Err(halt) = self
            .run_stage(incident_id, PipelineStage::Approval, || {
                self.approval_notifier.request_approval(&request)
            })
            .await
        {
            self.broker.withdraw(&incident_id);
            return Err(halt);
        }

        info!(
            incident_id = %incident_id,
            priority = %priority,
            timeout_secs = ?self.approval_timeout.map(|t| t.as_secs()),
            "Awaiting approval"
        );

        let timeout = self.approval_timeout;
        let wait = async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, receiver).await.ok(),
                None => Some(receiver.await),
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                self.broker.withdraw(&incident_id);
                Err(TriageOutcome::Cancelled { at: PipelineState::AwaitingApproval })
            }
            decision = wait => match decision {
                Some(Ok(decision)) => Ok(decision),
                Some(Err(_)) => Err(stage_failed(
                    PipelineStage::Approval,
                    "approval channel closed without a decision",
                )),
                None => {
                    self.broker.withdraw(&incident_id);
                    warn!(incident_id = %incident_id, "Approval timed out");
                    Err(TriageOutcome::ApprovalTimeout)
                }
            }
        }
    }

    /// Audit and notification hand-off; failures are logged, never returned
    async fn hand_off(&self, sealed: &SealedTriageRecord) {
        if let Err(e) = self.audit_sink.persist(sealed).await {
            error!(
                incident_id = %sealed.incident_id,
                error = %e,
                "Failed to persist triage record"
            );
        }

        let message = NotificationMessage::for_record(sealed);
        if let Err(e) = self.notification_sink.notify(&message).await {
            error!(
                incident_id = %sealed.incident_id,
                error = %e,
                "Failed to notify stakeholders"
            );
        }
    }
}

fn check_cancelled(record: &TriageRecord, cancel: &CancellationToken) -> std::result::Result<(), Halt> {
    if cancel.is_cancelled() {
        info!(incident_id = %record.incident_id, state = %record.state, "Triage cancelled");
        return Err(TriageOutcome::Cancelled { at: record.state });
    }
    Ok(())
}

fn attach(stage: PipelineStage, result: Result<()>) -> std::result::Result<(), Halt> {
    result.map_err(|e: AppError| stage_failed(stage, e.to_string()))
}

fn stage_failed(stage: PipelineStage, error: impl Into<String>) -> Halt {
    TriageOutcome::StageFailed {
        stage,
        error: error.into(),
    }
}
