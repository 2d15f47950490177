//! Policy lookup and violation checks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{ComplianceStatus, Incident, IncidentCategory, PolicyCheckResult, PolicyViolation};

/// Category to applicable policy names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyTable {
    pub policies: BTreeMap<IncidentCategory, Vec<String>>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let names = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();

        Self {
            policies: BTreeMap::from([
                (
                    IncidentCategory::AccessViolation,
                    names(&["Guest Access Policy", "Physical Security Policy"]),
                ),
                (
                    IncidentCategory::PaymentFraud,
                    names(&["Payment Security Policy", "Fraud Prevention Policy"]),
                ),
                (
                    IncidentCategory::DataBreach,
                    names(&["Data Protection Policy", "Incident Response Plan"]),
                ),
                (
                    IncidentCategory::OperationalSecurity,
                    names(&["Operational Security Policy"]),
                ),
                (IncidentCategory::General, names(&["General Security Policy"])),
            ]),
        }
    }
}

impl PolicyTable {
    pub fn for_category(&self, category: IncidentCategory) -> Vec<String> {
        self.policies.get(&category).cloned().unwrap_or_default()
    }
}

/// Hook for real violation detection.
///
/// Implementations may consult external systems, so evaluation is async
/// and fallible; an error is treated as a stage failure.
#[async_trait]
pub trait PolicyRuleEvaluator: Send + Sync {
    async fn evaluate(&self, incident: &Incident, policies: &[String]) -> Result<Vec<PolicyViolation>>;
}

/// Reports no violations
#[derive(Debug, Clone, Copy, Default)]
pub struct NoViolations;

#[async_trait]
impl PolicyRuleEvaluator for NoViolations {
    async fn evaluate(&self, _incident: &Incident, _policies: &[String]) -> Result<Vec<PolicyViolation>> {
        Ok(Vec::new())
    }
}

pub struct PolicyChecker {
    evaluator: Arc<dyn PolicyRuleEvaluator>,
}

impl Default for PolicyChecker {
    fn default() -> Self {
        Self::new(Arc::new(NoViolations))
    }
}

impl PolicyChecker {
    pub fn new(evaluator: Arc<dyn PolicyRuleEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Check an incident under the policies mapped to `category`
    pub async fn check(
        &self,
        incident: &Incident,
        category: IncidentCategory,
        table: &PolicyTable,
    ) -> Result<PolicyCheckResult> {
        let applicable_policies = table.for_category(category);
        let violations = self.evaluator.evaluate(incident, &applicable_policies).await?;

        let status = if violations.is_empty() {
            ComplianceStatus::Compliant
        } else {
            warn!(
                incident_id = %incident.id,
                violations = violations.len(),
                "Policy violations detected"
            );
            ComplianceStatus::NonCompliant
        };

        debug!(
            incident_id = %incident.id,
            policies = applicable_policies.len(),
            status = %status,
            "Policy check complete"
        );

        Ok(PolicyCheckResult {
            status,
            applicable_policies,
            violation_count: violations.len(),
            violations,
        })
    }
}
