//! Persistence layer for setup run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteSetupStore;

pub use crate::core::SetupStatus;
use crate::core::SetupState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Record of one setup run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupRecord {
    /// Unique run ID
    pub run_id: Uuid,

    /// Project name
    pub project_name: String,

    /// Final (or current) status
    pub status: SetupStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,

    pub image_built: bool,
    pub functions_registered: usize,
    pub workflows_attached: usize,

    /// Error that aborted the run
    pub error: Option<String>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a setup record, replacing one with the same run ID
    async fn save_record(&self, record: &SetupRecord) -> Result<()>;

    /// Load a record by run ID
    async fn load_record(&self, run_id: Uuid) -> Result<Option<SetupRecord>>;

    /// List records for a project, newest first
    async fn list_records(&self, project_name: &str) -> Result<Vec<SetupRecord>>;

    /// List all project names with recorded runs
    async fn list_projects(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    records: RwLock<HashMap<Uuid, SetupRecord>>,
    by_project: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            by_project: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_record(&self, record: &SetupRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let replaced = records.insert(record.run_id, record.clone()).is_some();

        if !replaced {
            let mut by_project = self.by_project.write().await;
            by_project
                .entry(record.project_name.clone())
                .or_default()
                .push(record.run_id);
        }

        Ok(())
    }

    async fn load_record(&self, run_id: Uuid) -> Result<Option<SetupRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&run_id).cloned())
    }

    async fn list_records(&self, project_name: &str) -> Result<Vec<SetupRecord>> {
        let records = self.records.read().await;
        let by_project = self.by_project.read().await;

        let mut result: Vec<SetupRecord> = by_project
            .get(project_name)
            .map(|ids| ids.iter().filter_map(|id| records.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let by_project = self.by_project.read().await;
        let mut names: Vec<String> = by_project.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Create a record from a setup run
pub fn create_record(project_name: &str, state: &SetupState) -> SetupRecord {
    SetupRecord {
        run_id: state.run_id,
        project_name: project_name.to_string(),
        status: state.status,
        started_at: state.started_at.unwrap_or_else(Utc::now),
        completed_at: state.completed_at,
        image_built: state.image_built,
        functions_registered: state.functions_registered,
        workflows_attached: state.workflows_attached,
        error: state.error.clone(),
    }
}

/// Record a finished setup run in the history.
///
/// A history failure is logged and never masks the outcome of the run.
pub async fn record_setup(
    store: &dyn PersistenceBackend,
    project_name: &str,
    state: &SetupState,
) -> Option<SetupRecord> {
    let record = create_record(project_name, state);
    match store.save_record(&record).await {
        Ok(()) => Some(record),
        Err(e) => {
            warn!("Failed to save setup {} to history: {:#}", record.run_id, e);
            None
        }
    }
}
