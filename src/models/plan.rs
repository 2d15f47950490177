use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use strum::{Display, EnumString};

use super::assessment::PriorityLevel;
use super::incident::IncidentCategory;

/// External system an action is dispatched to
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetSystem {
    /// Property management system
    Pms,
    AccessControl,
    Notification,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    DenyAccess,
    NotifyGuest,
    OfferAssistance,
    BlockTransaction,
    AlertFraudTeam,
    ContactGuest,
    ContainBreach,
    AssessImpact,
    NotifyAuthorities,
    LogSecurityEvent,
    DispatchSecurity,
}

/// A single step of a response plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PlannedAction {
    pub kind: ActionKind,
    pub target: TargetSystem,
}

impl PlannedAction {
    pub fn new(kind: ActionKind, target: TargetSystem) -> Self {
        Self { kind, target }
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.kind, self.target)
    }
}

/// Output of the response planning stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponsePlan {
    pub category: IncidentCategory,
    pub priority: PriorityLevel,

    /// Human-readable action summary
    pub action: String,

    /// SLA for first response
    pub timeline: String,

    pub stakeholders: Vec<String>,
    pub resolution_estimate: String,

    /// Concrete actions, dispatched in order
    pub actions: Vec<PlannedAction>,

    pub regulatory_deadline: Option<Duration>,

    /// Set when the policy check reported violations
    pub strict_escalation: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
pub enum ExecutionStatus {
    Success,
    PartialFailure,
    Failed,
}

/// Result of dispatching one planned action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionOutcome {
    pub action: PlannedAction,
    pub succeeded: bool,
    pub attempts: u8,
    pub detail: Option<String>,
    pub error: Option<String>,
}

/// Output of the execution stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub actions_taken: Vec<String>,
    pub systems_updated: BTreeSet<TargetSystem>,
    pub notification_count: u32,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionResult {
    /// Build the aggregate from per-action outcomes
    pub fn from_outcomes(outcomes: Vec<ActionOutcome>) -> Self {
        let succeeded: Vec<&ActionOutcome> = outcomes.iter().filter(|o| o.succeeded).collect();

        let status = if succeeded.len() == outcomes.len() {
            ExecutionStatus::Success
        } else if succeeded.is_empty() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::PartialFailure
        };

        let actions_taken = succeeded.iter().map(|o| o.action.kind.to_string()).collect();
        let systems_updated = succeeded.iter().map(|o| o.action.target).collect();
        let notification_count = succeeded
            .iter()
            .filter(|o| o.action.target == TargetSystem::Notification)
            .count() as u32;

        Self {
            status,
            actions_taken,
            systems_updated,
            notification_count,
            outcomes,
        }
    }

    pub fn failed_actions(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }
}
