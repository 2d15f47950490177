use std::sync::Arc;
use tracing::{info, warn};

use crate::execution::dispatcher::{DispatchContext, DispatcherRegistry};
use crate::metrics::TRIAGE_ACTIONS_TOTAL;
use crate::models::{ActionOutcome, ExecutionResult, PlannedAction, ResponsePlan};

/// Initial attempt plus one retry
pub const MAX_ATTEMPTS: u8 = 2;

/// Carries out a response plan against external systems
pub struct Executor {
    registry: Arc<DispatcherRegistry>,
}

impl Executor {
    pub fn new(registry: Arc<DispatcherRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch every planned action in order.
    ///
    /// A failed action is retried once, immediately. Failures never stop
    /// the remaining actions; they are reported in the result.
    pub async fn execute(&self, plan: &ResponsePlan, context: &DispatchContext) -> ExecutionResult {
        let mut outcomes = Vec::with_capacity(plan.actions.len());

        for action in &plan.actions {
            let outcome = self.execute_action(action, context).await;
            TRIAGE_ACTIONS_TOTAL
                .with_label_values(&[
                    &action.target.to_string(),
                    if outcome.succeeded { "success" } else { "failure" },
                ])
                .inc();
            outcomes.push(outcome);
        }

        let result = ExecutionResult::from_outcomes(outcomes);

        info!(
            incident_id = %context.incident_id,
            status = %result.status,
            actions_taken = result.actions_taken.len(),
            notifications = result.notification_count,
            "Plan executed"
        );

        result
    }

    async fn execute_action(&self, action: &PlannedAction, context: &DispatchContext) -> ActionOutcome {
        let Some(dispatcher) = self.registry.get(action.target) else {
            warn!(
                incident_id = %context.incident_id,
                system = %action.target,
                "No dispatcher registered"
            );
            return ActionOutcome {
                action: *action,
                succeeded: false,
                attempts: 0,
                detail: None,
                error: Some(format!("no dispatcher registered for {}", action.target)),
            };
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            match dispatcher.dispatch(action, context).await {
                Ok(receipt) => {
                    return ActionOutcome {
                        action: *action,
                        succeeded: true,
                        attempts: attempt,
                        detail: Some(receipt.detail),
                        error: None,
                    };
                }
                Err(e) => {
                    warn!(
                        incident_id = %context.incident_id,
                        action = %action,
                        attempt,
                        error = %e,
                        "Action attempt failed"
                    );

                    if attempt >= MAX_ATTEMPTS {
                        return ActionOutcome {
                            action: *action,
                            succeeded: false,
                            attempts: attempt,
                            detail: None,
                            error: Some(e.to_string()),
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::execution::dispatcher::{ActionDispatcher, DispatchReceipt, SimulatedDispatcher};
    use crate::models::{
        ActionKind, ExecutionStatus, IncidentCategory, PriorityLevel, TargetSystem,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    /// Fails the first `failures` calls, then succeeds
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ActionDispatcher for Flaky {
        async fn dispatch(&self, _action: &PlannedAction, _context: &DispatchContext) -> Result<DispatchReceipt> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AppError::Integration {
                    system: "test".to_string(),
                    message: format!("failure {}", call + 1),
                })
            } else {
                Ok(DispatchReceipt::new("ok"))
            }
        }
    }

    fn context() -> DispatchContext {
        DispatchContext {
            incident_id: Uuid::new_v4(),
            category: IncidentCategory::PaymentFraud,
            priority: PriorityLevel::Medium,
            stakeholders: vec![],
        }
    }

    fn plan(actions: Vec<PlannedAction>) -> ResponsePlan {
        ResponsePlan {
            category: IncidentCategory::PaymentFraud,
            priority: PriorityLevel::Medium,
            action: String::new(),
            timeline: String::new(),
            stakeholders: vec![],
            resolution_estimate: String::new(),
            actions,
            regulatory_deadline: None,
            strict_escalation: false,
        }
    }

    fn fraud_plan() -> ResponsePlan {
        plan(vec![
            PlannedAction::new(ActionKind::BlockTransaction, TargetSystem::Pms),
            PlannedAction::new(ActionKind::AlertFraudTeam, TargetSystem::Notification),
            PlannedAction::new(ActionKind::ContactGuest, TargetSystem::Notification),
        ])
    }

    #[tokio::test]
    async fn test_all_actions_succeed() {
        let executor = Executor::new(Arc::new(DispatcherRegistry::simulated()));
        let result = executor.execute(&fraud_plan(), &context()).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.notification_count, 2);
        assert!(result.outcomes.iter().all(|o| o.attempts == 1));
    }

    #[tokio::test]
    async fn test_single_failure_is_retried_once() {
        let flaky = Arc::new(Flaky::new(1));
        let registry = DispatcherRegistry::simulated().with(TargetSystem::Pms, flaky.clone());
        let executor = Executor::new(Arc::new(registry));

        let result = executor.execute(&fraud_plan(), &context()).await;
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.outcomes[0].attempts, 2);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_more_than_one_retry() {
        let flaky = Arc::new(Flaky::new(u32::MAX));
        let registry = DispatcherRegistry::simulated().with(TargetSystem::Pms, flaky.clone());
        let executor = Executor::new(Arc::new(registry));

        let result = executor.execute(&fraud_plan(), &context()).await;
        assert_eq!(result.status, ExecutionStatus::PartialFailure);
        assert_eq!(result.outcomes[0].attempts, MAX_ATTEMPTS);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
        assert!(result.outcomes[0].error.as_deref().unwrap().contains("failure 2"));
        assert_eq!(result.actions_taken, vec!["alert_fraud_team", "contact_guest"]);
    }

    #[tokio::test]
    async fn test_every_action_failing_is_failed() {
        let down: Arc<dyn ActionDispatcher> = Arc::new(Flaky::new(u32::MAX));
        let registry = DispatcherRegistry::new()
            .with(TargetSystem::Pms, down.clone())
            .with(TargetSystem::Notification, down);
        let executor = Executor::new(Arc::new(registry));

        let result = executor.execute(&fraud_plan(), &context()).await;
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.actions_taken.is_empty());
    }

    #[tokio::test]
    async fn test_missing_dispatcher_fails_action() {
        let registry = DispatcherRegistry::new().with(TargetSystem::Pms, Arc::new(SimulatedDispatcher));
        let executor = Executor::new(Arc::new(registry));

        let result = executor.execute(&fraud_plan(), &context()).await;
        assert_eq!(result.status, ExecutionStatus::PartialFailure);
        assert_eq!(result.outcomes[1].attempts, 0);
    }
}
