//! Hotel incident triage
//!
//! Decision pipeline that classifies security incidents reported at a
//! property, scores their risk, checks internal policy and regulatory
//! obligations, plans a response, gates high-risk incidents behind human
//! approval and dispatches the planned actions.

pub mod classification;
pub mod compliance;
pub mod config;
pub mod error;
pub mod escalation;
pub mod execution;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod pipeline;
pub mod policy;
pub mod response;
pub mod risk;
pub mod state;
pub mod tables;

pub use error::{AppError, Result};
pub use models::{Incident, SealedTriageRecord, TriageOutcome};
pub use pipeline::TriagePipeline;
