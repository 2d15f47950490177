use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{IncidentCategory, PlannedAction, PriorityLevel, TargetSystem};

/// What a dispatcher knows about the run it acts for
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub incident_id: Uuid,
    pub category: IncidentCategory,
    pub priority: PriorityLevel,
    pub stakeholders: Vec<String>,
}

/// Acknowledgement from an external system
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReceipt {
    pub detail: String,
}

impl DispatchReceipt {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Client for one external system (PMS, access control, notification)
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, action: &PlannedAction, context: &DispatchContext) -> Result<DispatchReceipt>;
}

/// Registry of dispatchers keyed by target system
#[derive(Default, Clone)]
pub struct DispatcherRegistry {
    dispatchers: HashMap<TargetSystem, Arc<dyn ActionDispatcher>>,
}

impl DispatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dispatcher for a target system
    pub fn register(&mut self, system: TargetSystem, dispatcher: Arc<dyn ActionDispatcher>) {
        self.dispatchers.insert(system, dispatcher);
    }

    pub fn with(mut self, system: TargetSystem, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        self.register(system, dispatcher);
        self
    }

    pub fn get(&self, system: TargetSystem) -> Option<&Arc<dyn ActionDispatcher>> {
        self.dispatchers.get(&system)
    }

    /// Every system backed by the simulated dispatcher
    pub fn simulated() -> Self {
        let dispatcher: Arc<dyn ActionDispatcher> = Arc::new(SimulatedDispatcher);
        Self::new()
            .with(TargetSystem::Pms, dispatcher.clone())
            .with(TargetSystem::AccessControl, dispatcher.clone())
            .with(TargetSystem::Notification, dispatcher)
    }
}

/// Logs the action and reports success; for demos and dry runs
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedDispatcher;

#[async_trait]
impl ActionDispatcher for SimulatedDispatcher {
    async fn dispatch(&self, action: &PlannedAction, context: &DispatchContext) -> Result<DispatchReceipt> {
        info!(
            incident_id = %context.incident_id,
            action = %action.kind,
            system = %action.target,
            "Simulated dispatch"
        );
        Ok(DispatchReceipt::new(format!("{} accepted by {}", action.kind, action.target)))
    }
}
