//! Regulatory framework checks and notification deadlines.
//!
//! Each framework is evaluated on its own. A failing framework imposes a
//! notification window; the overall deadline is the shortest one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{ComplianceFramework, ComplianceResult, FrameworkResult, Incident};

/// Longest notification window a table may configure (one year)
pub const MAX_NOTIFICATION_WINDOW_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameworkRule {
    /// Regime name shown in status strings
    pub regime: String,
    pub notification_window_hours: u64,
}

impl FrameworkRule {
    fn new(regime: &str, notification_window_hours: u64) -> Self {
        Self {
            regime: regime.to_string(),
            notification_window_hours,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.notification_window_hours.saturating_mul(3600))
    }
}

/// Rule set for the three supported frameworks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceRules {
    pub data_protection: FrameworkRule,
    pub payment: FrameworkRule,
    pub cross_border: FrameworkRule,
}

impl Default for ComplianceRules {
    fn default() -> Self {
        Self {
            data_protection: FrameworkRule::new("GDPR", 72),
            payment: FrameworkRule::new("PCI DSS", 24),
            cross_border: FrameworkRule::new("Cross-border transfer", 72),
        }
    }
}

impl ComplianceRules {
    /// Rules paired with the framework they apply to
    pub fn rules(&self) -> [(ComplianceFramework, &FrameworkRule); 3] {
        [
            (ComplianceFramework::DataProtection, &self.data_protection),
            (ComplianceFramework::Payment, &self.payment),
            (ComplianceFramework::CrossBorder, &self.cross_border),
        ]
    }

    fn rule(&self, framework: ComplianceFramework) -> &FrameworkRule {
        match framework {
            ComplianceFramework::DataProtection => &self.data_protection,
            ComplianceFramework::Payment => &self.payment,
            ComplianceFramework::CrossBorder => &self.cross_border,
        }
    }
}

/// Extra failure reported by a pluggable evaluator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceFinding {
    pub framework: ComplianceFramework,
    pub reason: String,
}

/// Hook for regulatory checks beyond the built-in flag rules
#[async_trait]
pub trait ComplianceRuleEvaluator: Send + Sync {
    async fn evaluate(&self, incident: &Incident) -> Result<Vec<ComplianceFinding>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoFindings;

#[async_trait]
impl ComplianceRuleEvaluator for NoFindings {
    async fn evaluate(&self, _incident: &Incident) -> Result<Vec<ComplianceFinding>> {
        Ok(Vec::new())
    }
}

pub struct ComplianceValidator {
    evaluator: Arc<dyn ComplianceRuleEvaluator>,
}

impl Default for ComplianceValidator {
    fn default() -> Self {
        Self::new(Arc::new(NoFindings))
    }
}

impl ComplianceValidator {
    pub fn new(evaluator: Arc<dyn ComplianceRuleEvaluator>) -> Self {
        Self { evaluator }
    }

    pub async fn validate(&self, incident: &Incident, rules: &ComplianceRules) -> Result<ComplianceResult> {
        let findings = self.evaluator.evaluate(incident).await?;

        let builtin = [
            (
                ComplianceFramework::DataProtection,
                incident.personal_data_exposed,
                "personal data exposed",
                "no personal data exposure",
            ),
            (
                ComplianceFramework::Payment,
                incident.payment_data_involved,
                "cardholder data involved",
                "no cardholder data involved",
            ),
            (
                ComplianceFramework::CrossBorder,
                incident.cross_border && incident.personal_data_exposed,
                "personal data crossed a jurisdiction boundary",
                "no restricted cross-border transfer",
            ),
        ];

        let frameworks: Vec<FrameworkResult> = builtin
            .into_iter()
            .map(|(framework, violated, fail_reason, pass_reason)| {
                let rule = rules.rule(framework);
                let mut reasons: Vec<String> = Vec::new();
                if violated {
                    reasons.push(fail_reason.to_string());
                }
                reasons.extend(
                    findings
                        .iter()
                        .filter(|f| f.framework == framework)
                        .map(|f| f.reason.clone()),
                );

                if reasons.is_empty() {
                    FrameworkResult {
                        framework,
                        passed: true,
                        status: format!("{}: {}", rule.regime, pass_reason),
                        notification_window: None,
                    }
                } else {
                    FrameworkResult {
                        framework,
                        passed: false,
                        status: format!(
                            "{}: {}; notification due within {} hours",
                            rule.regime,
                            reasons.join(", "),
                            rule.notification_window_hours
                        ),
                        notification_window: Some(rule.window()),
                    }
                }
            })
            .collect();

        let notification_deadline = frameworks
            .iter()
            .filter_map(|f| f.notification_window)
            .min();
        let passed = frameworks.iter().all(|f| f.passed);

        if passed {
            debug!(incident_id = %incident.id, "All compliance frameworks passed");
        } else {
            warn!(
                incident_id = %incident.id,
                deadline_hours = notification_deadline.map(|d| d.as_secs() / 3600),
                "Regulatory notification required"
            );
        }

        Ok(ComplianceResult {
            frameworks,
            notification_deadline,
            passed,
            requires_regulatory_notification: !passed,
        })
    }
}
