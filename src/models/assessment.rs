use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

use super::incident::IncidentCategory;

/// Output of the classification stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub category: IncidentCategory,

    /// Confidence in [0, 100]
    pub confidence: u8,

    pub reasoning: String,

    /// Evidence the classifier relied on, in discovery order
    pub signals: Vec<String>,
}

/// Four-level priority derived from the risk score
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display,
)]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    /// Threshold table: >=8 Critical, >=6 High, >=4 Medium, else Low.
    ///
    /// Every escalation decision in the crate goes through this function.
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 8 => PriorityLevel::Critical,
            s if s >= 6 => PriorityLevel::High,
            s if s >= 4 => PriorityLevel::Medium,
            _ => PriorityLevel::Low,
        }
    }
}

/// One additive contribution to the risk score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    pub name: String,
    pub weight: i32,
}

/// Output of the risk scoring stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityAssessment {
    /// Clamped to [0, 10]
    pub risk_score: u8,

    /// Sum of all factors before clamping
    pub raw_score: i32,

    pub priority: PriorityLevel,

    /// Factors in the order they were applied
    pub factors: Vec<RiskFactor>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
}

/// A policy rule that an incident breaks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyViolation {
    pub policy: String,
    pub description: String,
}

/// Output of the policy check stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyCheckResult {
    pub status: ComplianceStatus,
    pub applicable_policies: Vec<String>,
    pub violation_count: usize,
    pub violations: Vec<PolicyViolation>,
}

impl PolicyCheckResult {
    pub fn is_compliant(&self) -> bool {
        self.status == ComplianceStatus::Compliant
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComplianceFramework {
    DataProtection,
    Payment,
    CrossBorder,
}

/// Verdict of a single regulatory framework
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameworkResult {
    pub framework: ComplianceFramework,
    pub passed: bool,
    pub status: String,

    /// Notification window imposed when this framework fails
    pub notification_window: Option<Duration>,
}

/// Output of the compliance validation stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceResult {
    pub frameworks: Vec<FrameworkResult>,

    /// Shortest window among failing frameworks
    pub notification_deadline: Option<Duration>,

    pub passed: bool,
    pub requires_regulatory_notification: bool,
}

impl ComplianceResult {
    pub fn framework(&self, framework: ComplianceFramework) -> Option<&FrameworkResult> {
        self.frameworks.iter().find(|f| f.framework == framework)
    }

    /// Deadline expressed in whole hours, rounded up
    pub fn deadline_hours(&self) -> Option<u64> {
        self.notification_deadline
            .map(|d| d.as_secs().div_ceil(3600))
    }
}
