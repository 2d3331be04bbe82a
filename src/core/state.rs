//! Setup run state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall setup status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupStatus {
    /// Setup has not started
    Pending,
    /// Setup is currently running
    Running,
    /// Project was saved
    Completed,
    /// Setup aborted
    Failed,
}

/// State of one setup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current status
    pub status: SetupStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Whether a container image was built
    pub image_built: bool,

    /// Whether secrets were stored
    pub secrets_stored: bool,

    /// Number of functions registered
    pub functions_registered: usize,

    /// Number of workflows attached
    pub workflows_attached: usize,

    /// Error that aborted the run
    pub error: Option<String>,
}

impl SetupState {
    /// Create a new setup state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: SetupStatus::Pending,
            started_at: None,
            completed_at: None,
            image_built: false,
            secrets_stored: false,
            functions_registered: 0,
            workflows_attached: 0,
            error: None,
        }
    }

    /// Mark setup as started
    pub fn start(&mut self) {
        self.status = SetupStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark setup as completed
    pub fn complete(&mut self) {
        self.status = SetupStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark setup as failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = SetupStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SetupStatus::Completed | SetupStatus::Failed)
    }
}

impl Default for SetupState {
    fn default() -> Self {
        Self::new()
    }
}
