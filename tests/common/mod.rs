//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hotel_incident_triage::{
    escalation::{ApprovalNotifier, ApprovalRequest},
    models::{Incident, IncidentCategory, LoyaltyTier, Severity},
    Result,
};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Scenario 1: critical breach with guest personal data exposed
pub fn data_breach_incident() -> Incident {
    Incident::new(
        IncidentCategory::DataBreach,
        Severity::Critical,
        "Reservation database breach exposed personal data of guests",
        "it-security",
    )
    .with_personal_data_exposed(true)
    .with_affected_system("pms")
}

/// Scenario 2: medium access violation
pub fn access_violation_incident() -> Incident {
    Incident::new(
        IncidentCategory::AccessViolation,
        Severity::Medium,
        "Unauthorized access to a restricted area with a cloned key card",
        "night-manager",
    )
}

/// Scenario 3: low-risk general report
pub fn general_incident() -> Incident {
    Incident::new(
        IncidentCategory::General,
        Severity::Low,
        "Guest reported a noisy hallway on the fourth floor",
        "front-desk",
    )
}

pub fn payment_fraud_incident() -> Incident {
    Incident::new(
        IncidentCategory::PaymentFraud,
        Severity::Critical,
        "Stolen card used for an unauthorized charge at the spa",
        "finance",
    )
    .with_payment_data(true)
    .with_financial_amount(1850.0)
    .with_guest("G-2231", LoyaltyTier::Platinum)
}

/// Approval notifier that forwards every request to the test body
pub struct ChannelApprovalNotifier {
    sender: mpsc::UnboundedSender<ApprovalRequest>,
}

impl ChannelApprovalNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ApprovalRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ApprovalNotifier for ChannelApprovalNotifier {
    async fn request_approval(&self, request: &ApprovalRequest) -> Result<()> {
        // the test may have stopped listening
        let _ = self.sender.send(request.clone());
        Ok(())
    }
}

/// Parse Prometheus exposition text into metric name -> lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}

/// Value of the first sample line that contains every fragment
/// Example: `runs_total{outcome="completed"} 3` -> Some(3.0)
pub fn sample_value(output: &str, fragments: &[&str]) -> Option<f64> {
    output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find(|line| fragments.iter().all(|f| line.contains(f)))
        .and_then(|line| line.split_whitespace().last())
        .and_then(|value| value.parse::<f64>().ok())
}
