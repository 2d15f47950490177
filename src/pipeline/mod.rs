//! Triage orchestration.
//!
//! A run moves an incident through classification, risk assessment,
//! policy and compliance checks, planning, an optional approval wait and
//! execution, then seals the record and hands it to the audit and
//! notification sinks. Every run that passes input validation ends in a
//! sealed record, including runs that abort.

pub mod orchestrator;

pub use orchestrator::{TriagePipeline, MAX_STAGE_RETRIES};
