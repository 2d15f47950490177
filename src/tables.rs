//! Decision tables consumed by the pipeline stages.
//!
//! Tables are plain data. Each run takes one [`TableStore::snapshot`] at the
//! start and uses it for every stage, so a reload mid-run never mixes two
//! table versions inside a single record.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::classification::KeywordTable;
use crate::compliance::{ComplianceRules, MAX_NOTIFICATION_WINDOW_HOURS};
use crate::error::{AppError, Result};
use crate::policy::PolicyTable;
use crate::response::ResponseTable;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriageTables {
    pub classifier: KeywordTable,
    pub policies: PolicyTable,
    pub compliance: ComplianceRules,
    pub responses: ResponseTable,
}

impl TriageTables {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let tables: TriageTables = serde_yaml::from_str(yaml)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents).map_err(|e| {
            AppError::Configuration(format!("invalid triage tables in {}: {}", path.display(), e))
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.responses.resolution_min_hours > self.responses.resolution_max_hours {
            return Err(AppError::Configuration(format!(
                "resolution band {}-{} hours is inverted",
                self.responses.resolution_min_hours, self.responses.resolution_max_hours
            )));
        }

        if self
            .classifier
            .entries
            .iter()
            .any(|entry| entry.keywords.iter().any(|k| k.trim().is_empty()))
        {
            return Err(AppError::Configuration("classifier keywords must not be blank".to_string()));
        }

        for (framework, rule) in self.compliance.rules() {
            if rule.notification_window_hours == 0
                || rule.notification_window_hours > MAX_NOTIFICATION_WINDOW_HOURS
            {
                return Err(AppError::Configuration(format!(
                    "{} notification window of {} hours is outside 1-{}",
                    framework, rule.notification_window_hours, MAX_NOTIFICATION_WINDOW_HOURS
                )));
            }
        }

        Ok(())
    }
}

/// Shared, swappable handle to the active tables
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    current: Arc<RwLock<Arc<TriageTables>>>,
}

impl TableStore {
    pub fn new(tables: TriageTables) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(tables))),
        }
    }

    pub fn snapshot(&self) -> Arc<TriageTables> {
        self.current.read().clone()
    }

    /// Install new tables; runs already in flight keep their snapshot
    pub fn replace(&self, tables: TriageTables) {
        *self.current.write() = Arc::new(tables);
        info!("Triage tables replaced");
    }

    pub fn reload_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let tables = TriageTables::from_yaml_file(path)?;
        self.replace(tables);
        Ok(())
    }
}
