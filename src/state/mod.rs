pub mod store;

pub use store::*;

use crate::error::Result;
use crate::models::SealedTriageRecord;
use async_trait::async_trait;

/// Outbound audit/storage hand-off for sealed triage records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist a sealed record. Called exactly once per run.
    async fn persist(&self, record: &SealedTriageRecord) -> Result<()>;
}
