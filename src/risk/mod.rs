//! Additive risk scoring.

use tracing::debug;

use crate::models::{
    Classification, Incident, IncidentCategory, PriorityAssessment, PriorityLevel, RiskFactor,
    Severity,
};

pub const BASE_SCORE: i32 = 3;
pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 10;

/// Weight of the classified category
pub fn category_weight(category: IncidentCategory) -> i32 {
    match category {
        IncidentCategory::DataBreach => 4,
        IncidentCategory::PaymentFraud => 3,
        IncidentCategory::AccessViolation => 2,
        IncidentCategory::OperationalSecurity | IncidentCategory::General => 0,
    }
}

/// Weight of the declared severity
pub fn severity_weight(severity: Severity) -> i32 {
    match severity {
        Severity::Critical => 3,
        Severity::High => 2,
        Severity::Medium => 1,
        Severity::Low => 0,
    }
}

const ELEVATED_GUEST_WEIGHT: i32 = 1;
const PERSONAL_DATA_WEIGHT: i32 = 2;

/// Turns incident attributes into a bounded score and priority
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(&self, incident: &Incident, classification: &Classification) -> PriorityAssessment {
        let mut factors = vec![RiskFactor {
            name: "base".to_string(),
            weight: BASE_SCORE,
        }];

        let category = category_weight(classification.category);
        if category > 0 {
            factors.push(RiskFactor {
                name: format!("category:{}", classification.category),
                weight: category,
            });
        }

        if incident.has_elevated_guest() {
            factors.push(RiskFactor {
                name: "elevated_loyalty_tier".to_string(),
                weight: ELEVATED_GUEST_WEIGHT,
            });
        }

        let severity = severity_weight(incident.severity);
        if severity > 0 {
            factors.push(RiskFactor {
                name: format!("severity:{}", incident.severity),
                weight: severity,
            });
        }

        if incident.personal_data_exposed {
            factors.push(RiskFactor {
                name: "personal_data_exposed".to_string(),
                weight: PERSONAL_DATA_WEIGHT,
            });
        }

        let raw_score: i32 = factors.iter().map(|f| f.weight).sum();
        let risk_score = raw_score.clamp(MIN_SCORE, MAX_SCORE) as u8;
        let priority = PriorityLevel::from_score(risk_score);

        debug!(
            incident_id = %incident.id,
            raw_score,
            risk_score,
            priority = %priority,
            "Risk assessed"
        );

        PriorityAssessment {
            risk_score,
            raw_score,
            priority,
            factors,
        }
    }
}
