use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};

/// A reported security or service incident at a property.
///
/// Incidents are immutable once created; the pipeline only reads them and
/// attaches derived results to a separate `TriageRecord`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Incident {
    /// Unique identifier; generated when absent from the input
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Declared category
    pub category: IncidentCategory,

    /// Free-text description from the reporter
    #[validate(length(min = 1, max = 4000))]
    pub description: String,

    /// Declared severity
    pub severity: Severity,

    /// Guest involved, if any
    #[validate(nested)]
    #[serde(default)]
    pub guest: Option<GuestReference>,

    /// Monetary amount at stake (payment incidents)
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub financial_amount: Option<f64>,

    /// Systems touched by the incident (PMS, door locks, POS, ...)
    #[serde(default)]
    pub affected_systems: BTreeSet<String>,

    /// Guest or staff personal data was exposed
    #[serde(default)]
    pub personal_data_exposed: bool,

    /// Cardholder or payment data is involved
    #[serde(default)]
    pub payment_data_involved: bool,

    /// Data crossed or may cross a jurisdiction boundary
    #[serde(default)]
    pub cross_border: bool,

    /// Who or what reported the incident
    #[validate(length(min = 1, max = 255))]
    pub reported_by: String,

    /// Property the incident belongs to
    #[serde(default)]
    pub property_id: Option<String>,
}

impl Incident {
    /// Create a new incident
    pub fn new(
        category: IncidentCategory,
        severity: Severity,
        description: impl Into<String>,
        reported_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            category,
            description: description.into(),
            severity,
            guest: None,
            financial_amount: None,
            affected_systems: BTreeSet::new(),
            personal_data_exposed: false,
            payment_data_involved: false,
            cross_border: false,
            reported_by: reported_by.into(),
            property_id: None,
        }
    }

    pub fn with_guest(mut self, guest_id: impl Into<String>, loyalty_tier: LoyaltyTier) -> Self {
        self.guest = Some(GuestReference {
            guest_id: guest_id.into(),
            loyalty_tier,
        });
        self
    }

    pub fn with_financial_amount(mut self, amount: f64) -> Self {
        self.financial_amount = Some(amount);
        self
    }

    pub fn with_affected_system(mut self, system: impl Into<String>) -> Self {
        self.affected_systems.insert(system.into());
        self
    }

    pub fn with_personal_data_exposed(mut self, exposed: bool) -> Self {
        self.personal_data_exposed = exposed;
        self
    }

    pub fn with_payment_data(mut self, involved: bool) -> Self {
        self.payment_data_involved = involved;
        self
    }

    pub fn with_cross_border(mut self, cross_border: bool) -> Self {
        self.cross_border = cross_border;
        self
    }

    pub fn with_property(mut self, property_id: impl Into<String>) -> Self {
        self.property_id = Some(property_id.into());
        self
    }

    /// Whether the guest holds an elevated (VIP) loyalty tier
    pub fn has_elevated_guest(&self) -> bool {
        self.guest
            .as_ref()
            .map(|g| g.loyalty_tier.is_elevated())
            .unwrap_or(false)
    }

    /// Reject incidents that cannot enter the pipeline.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()?;

        if self.id.is_nil() {
            return Err(AppError::Validation("incident id must not be nil".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::Validation(
                "incident description must not be blank".to_string(),
            ));
        }
        if let Some(amount) = self.financial_amount {
            if !amount.is_finite() {
                return Err(AppError::Validation(
                    "financial amount must be a finite number".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Content fingerprint, stable across runs of the same incident
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(self.category.to_string().as_bytes());
        hasher.update(self.severity.to_string().as_bytes());
        hasher.update(self.description.as_bytes());
        for system in &self.affected_systems {
            hasher.update(system.as_bytes());
        }
        hasher.update([
            self.personal_data_exposed as u8,
            self.payment_data_involved as u8,
            self.cross_border as u8,
        ]);

        format!("{:x}", hasher.finalize())
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display,
)]
pub enum IncidentCategory {
    AccessViolation,
    PaymentFraud,
    DataBreach,
    OperationalSecurity,
    General,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display,
)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct GuestReference {
    #[validate(length(min = 1, max = 128))]
    pub guest_id: String,

    #[serde(default)]
    pub loyalty_tier: LoyaltyTier,
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, EnumString, Display,
)]
pub enum LoyaltyTier {
    #[default]
    Standard,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    /// Gold and above are treated as VIP
    pub fn is_elevated(&self) -> bool {
        matches!(self, LoyaltyTier::Gold | LoyaltyTier::Platinum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incident_creation() {
        let incident = Incident::new(
            IncidentCategory::PaymentFraud,
            Severity::High,
            "Card declined repeatedly at front desk",
            "front-desk",
        )
        .with_guest("G-1001", LoyaltyTier::Platinum)
        .with_financial_amount(420.0)
        .with_affected_system("pos");

        assert_eq!(incident.category, IncidentCategory::PaymentFraud);
        assert!(incident.has_elevated_guest());
        assert!(incident.affected_systems.contains("pos"));
        assert!(incident.ensure_valid().is_ok());
    }

    #[test]
    fn test_blank_description_rejected() {
        let incident = Incident::new(IncidentCategory::General, Severity::Low, "   ", "ops");
        assert!(matches!(incident.ensure_valid(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_empty_reporter_rejected() {
        let incident = Incident::new(IncidentCategory::General, Severity::Low, "Lobby door ajar", "");
        assert!(matches!(incident.ensure_valid(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let incident = Incident::new(IncidentCategory::PaymentFraud, Severity::Low, "Refund", "pos")
            .with_financial_amount(-5.0);
        assert!(matches!(incident.ensure_valid(), Err(AppError::Validation(_))));

        let incident = Incident::new(IncidentCategory::PaymentFraud, Severity::Low, "Refund", "pos")
            .with_financial_amount(f64::NAN);
        assert!(incident.ensure_valid().is_err());
    }

    #[test]
    fn test_missing_guest_id_rejected() {
        let incident = Incident::new(IncidentCategory::AccessViolation, Severity::Low, "Key misuse", "door")
            .with_guest("", LoyaltyTier::Gold);
        assert!(incident.ensure_valid().is_err());
    }

    #[test]
    fn test_loyalty_tiers() {
        assert!(!LoyaltyTier::Standard.is_elevated());
        assert!(!LoyaltyTier::Silver.is_elevated());
        assert!(LoyaltyTier::Gold.is_elevated());
        assert!(LoyaltyTier::Platinum.is_elevated());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let incident = Incident::new(IncidentCategory::DataBreach, Severity::Critical, "Leak", "soc")
            .with_personal_data_exposed(true);
        let fingerprint = incident.fingerprint();
        assert_eq!(fingerprint.len(), 64);
        assert_eq!(fingerprint, incident.clone().fingerprint());

        let changed = incident.clone().with_cross_border(true);
        assert_ne!(fingerprint, changed.fingerprint());
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = format!(
            r#"{{"id":"{}","created_at":"2026-01-01T00:00:00Z","category":"General",
               "description":"Noise complaint","severity":"Low","reported_by":"guest-app"}}"#,
            Uuid::new_v4()
        );
        let incident: Incident = serde_json::from_str(&json).unwrap();
        assert!(incident.guest.is_none());
        assert!(!incident.personal_data_exposed);
        assert!(incident.affected_systems.is_empty());
    }
}
