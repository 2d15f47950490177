//! Response planning decision table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{
    ActionKind, ComplianceResult, IncidentCategory, PlannedAction, PolicyCheckResult, PriorityLevel,
    ResponsePlan, TargetSystem,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEntry {
    pub action: String,
    pub timeline: String,
    pub actions: Vec<PlannedAction>,
}

impl ResponseEntry {
    fn new(action: &str, timeline: &str, actions: &[(ActionKind, TargetSystem)]) -> Self {
        Self {
            action: action.to_string(),
            timeline: timeline.to_string(),
            actions: actions
                .iter()
                .map(|(kind, target)| PlannedAction::new(*kind, *target))
                .collect(),
        }
    }
}

/// Category keyed response table with a fallback row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseTable {
    pub entries: BTreeMap<IncidentCategory, ResponseEntry>,
    pub fallback: ResponseEntry,
    pub stakeholders: Vec<String>,
    pub resolution_min_hours: u64,
    pub resolution_max_hours: u64,
}

impl Default for ResponseTable {
    fn default() -> Self {
        use ActionKind::*;
        use TargetSystem::*;

        Self {
            entries: BTreeMap::from([
                (
                    IncidentCategory::AccessViolation,
                    ResponseEntry::new(
                        "Deny access, notify guest, offer assistance",
                        "Immediate",
                        &[
                            (DenyAccess, AccessControl),
                            (NotifyGuest, Notification),
                            (OfferAssistance, Pms),
                        ],
                    ),
                ),
                (
                    IncidentCategory::PaymentFraud,
                    ResponseEntry::new(
                        "Block transaction, alert fraud team, contact guest",
                        "Within 15 minutes",
                        &[
                            (BlockTransaction, Pms),
                            (AlertFraudTeam, Notification),
                            (ContactGuest, Notification),
                        ],
                    ),
                ),
                (
                    IncidentCategory::DataBreach,
                    ResponseEntry::new(
                        "Contain breach, assess impact, notify authorities",
                        "Immediate; starts regulatory clock",
                        &[
                            (ContainBreach, AccessControl),
                            (AssessImpact, Pms),
                            (NotifyAuthorities, Notification),
                        ],
                    ),
                ),
            ]),
            fallback: ResponseEntry::new(
                "Standard security response protocol",
                "Within 1 hour",
                &[(LogSecurityEvent, Pms), (DispatchSecurity, Notification)],
            ),
            stakeholders: vec![
                "Security Team".to_string(),
                "Guest Services".to_string(),
                "Management".to_string(),
            ],
            resolution_min_hours: 2,
            resolution_max_hours: 4,
        }
    }
}

impl ResponseTable {
    pub fn entry(&self, category: IncidentCategory) -> &ResponseEntry {
        self.entries.get(&category).unwrap_or(&self.fallback)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsePlanner;

impl ResponsePlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(
        &self,
        category: IncidentCategory,
        priority: PriorityLevel,
        policy: &PolicyCheckResult,
        compliance: &ComplianceResult,
        table: &ResponseTable,
    ) -> ResponsePlan {
        let entry = table.entry(category);

        let mut timeline = entry.timeline.clone();
        let mut resolution_estimate = format!(
            "{}-{} hours",
            table.resolution_min_hours, table.resolution_max_hours
        );

        let regulatory_deadline = compliance
            .requires_regulatory_notification
            .then_some(compliance.notification_deadline)
            .flatten();

        if priority == PriorityLevel::Critical {
            if let Some(hours) = regulatory_deadline.and(compliance.deadline_hours()) {
                timeline = format!("Immediate; regulatory notification due within {} hours", hours);
                if hours < table.resolution_max_hours {
                    resolution_estimate = format!("Within {} hours", hours);
                }
            }
        }

        let strict_escalation = !policy.is_compliant();

        debug!(
            category = %category,
            priority = %priority,
            actions = entry.actions.len(),
            strict_escalation,
            "Response plan generated"
        );

        ResponsePlan {
            category,
            priority,
            action: entry.action.clone(),
            timeline,
            stakeholders: table.stakeholders.clone(),
            resolution_estimate,
            actions: entry.actions.clone(),
            regulatory_deadline,
            strict_escalation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComplianceStatus;
    use std::time::Duration;

    fn compliant_policy() -> PolicyCheckResult {
        PolicyCheckResult {
            status: ComplianceStatus::Compliant,
            applicable_policies: vec![],
            violation_count: 0,
            violations: vec![],
        }
    }

    fn compliance(deadline_hours: Option<u64>) -> ComplianceResult {
        ComplianceResult {
            frameworks: vec![],
            notification_deadline: deadline_hours.map(|h| Duration::from_secs(h * 3600)),
            passed: deadline_hours.is_none(),
            requires_regulatory_notification: deadline_hours.is_some(),
        }
    }

    fn plan(category: IncidentCategory, priority: PriorityLevel, deadline: Option<u64>) -> ResponsePlan {
        ResponsePlanner::new().plan(
            category,
            priority,
            &compliant_policy(),
            &compliance(deadline),
            &ResponseTable::default(),
        )
    }

    #[test]
    fn test_access_violation_row() {
        let plan = plan(IncidentCategory::AccessViolation, PriorityLevel::High, None);
        assert_eq!(plan.action, "Deny access, notify guest, offer assistance");
        assert_eq!(plan.timeline, "Immediate");
        assert_eq!(plan.actions[0].kind, ActionKind::DenyAccess);
        assert_eq!(plan.resolution_estimate, "2-4 hours");
    }

    #[test]
    fn test_payment_fraud_row() {
        let plan = plan(IncidentCategory::PaymentFraud, PriorityLevel::Medium, None);
        assert_eq!(plan.timeline, "Within 15 minutes");
        assert_eq!(plan.actions.len(), 3);
    }

    #[test]
    fn test_other_categories_use_fallback() {
        for category in [IncidentCategory::General, IncidentCategory::OperationalSecurity] {
            let plan = plan(category, PriorityLevel::Low, None);
            assert_eq!(plan.action, "Standard security response protocol");
            assert_eq!(plan.timeline, "Within 1 hour");
        }
    }

    #[test]
    fn test_stakeholders_fixed() {
        let plan = plan(IncidentCategory::DataBreach, PriorityLevel::Low, None);
        assert_eq!(plan.stakeholders, vec!["Security Team", "Guest Services", "Management"]);
    }

    #[test]
    fn test_critical_deadline_overrides_timeline() {
        let plan = plan(IncidentCategory::DataBreach, PriorityLevel::Critical, Some(72));
        assert_eq!(plan.timeline, "Immediate; regulatory notification due within 72 hours");
        assert_eq!(plan.resolution_estimate, "2-4 hours");
        assert_eq!(plan.regulatory_deadline, Some(Duration::from_secs(72 * 3600)));
    }

    #[test]
    fn test_short_deadline_caps_resolution() {
        let mut table = ResponseTable::default();
        table.resolution_max_hours = 48;
        let plan = ResponsePlanner::new().plan(
            IncidentCategory::PaymentFraud,
            PriorityLevel::Critical,
            &compliant_policy(),
            &compliance(Some(24)),
            &table,
        );
        assert_eq!(plan.resolution_estimate, "Within 24 hours");
    }

    #[test]
    fn test_non_critical_keeps_table_timeline() {
        let plan = plan(IncidentCategory::DataBreach, PriorityLevel::High, Some(72));
        assert_eq!(plan.timeline, "Immediate; starts regulatory clock");
        assert!(plan.regulatory_deadline.is_some());
    }

    #[test]
    fn test_non_compliant_policy_flags_strict_escalation() {
        let mut policy = compliant_policy();
        policy.status = ComplianceStatus::NonCompliant;
        policy.violation_count = 1;
        let plan = ResponsePlanner::new().plan(
            IncidentCategory::AccessViolation,
            PriorityLevel::Low,
            &policy,
            &compliance(None),
            &ResponseTable::default(),
        );
        assert!(plan.strict_escalation);
        assert!(!plan.actions.is_empty());
    }
}
