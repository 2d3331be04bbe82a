//! SQLite-based setup history store

use crate::persistence::{PersistenceBackend, SetupRecord, SetupStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const COLUMNS: &str = "id, project_name, status, started_at, completed_at, image_built, \
                       functions_registered, workflows_attached, error";

/// SQLite setup store
pub struct SqliteSetupStore {
    pool: SqlitePool,
}

impl SqliteSetupStore {
    /// Create a new SQLite store
    pub async fn new(db_path: &str) -> Result<Self> {
        // An in-memory database lives and dies with its connection.
        let (url, max_connections) = if db_path == ":memory:" {
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{}?mode=rwc", db_path), 4)
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let db_path = Self::default_path();
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Self::open(&db_path).await
    }

    /// Open a store at a filesystem path
    pub async fn open(path: &Path) -> Result<Self> {
        let db_path = path
            .to_str()
            .with_context(|| format!("Database path is not valid UTF-8: {}", path.display()))?;
        Self::new(db_path).await
    }

    /// `<data dir>/mlsetup/setups.db`
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mlsetup")
            .join("setups.db")
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS setups (
                id TEXT PRIMARY KEY,
                project_name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                image_built INTEGER NOT NULL DEFAULT 0,
                functions_registered INTEGER NOT NULL DEFAULT 0,
                workflows_attached INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_project_name ON setups(project_name);
            CREATE INDEX IF NOT EXISTS idx_started_at ON setups(started_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn status_name(status: SetupStatus) -> &'static str {
        match status {
            SetupStatus::Pending => "Pending",
            SetupStatus::Running => "Running",
            SetupStatus::Completed => "Completed",
            SetupStatus::Failed => "Failed",
        }
    }

    fn parse_status(name: &str) -> SetupStatus {
        match name {
            "Running" => SetupStatus::Running,
            "Completed" => SetupStatus::Completed,
            "Failed" => SetupStatus::Failed,
            _ => SetupStatus::Pending,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<SetupRecord> {
        Ok(SetupRecord {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            project_name: row.get("project_name"),
            status: Self::parse_status(&row.get::<String, _>("status")),
            started_at: Self::from_naive(row.get("started_at")),
            completed_at: row
                .get::<Option<NaiveDateTime>, _>("completed_at")
                .map(Self::from_naive),
            image_built: row.get("image_built"),
            functions_registered: row.get::<i64, _>("functions_registered") as usize,
            workflows_attached: row.get::<i64, _>("workflows_attached") as usize,
            error: row.get("error"),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteSetupStore {
    async fn save_record(&self, record: &SetupRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO setups ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            COLUMNS
        ))
        .bind(record.run_id.to_string())
        .bind(&record.project_name)
        .bind(Self::status_name(record.status))
        .bind(Self::to_naive(record.started_at))
        .bind(record.completed_at.map(Self::to_naive))
        .bind(record.image_built)
        .bind(record.functions_registered as i64)
        .bind(record.workflows_attached as i64)
        .bind(&record.error)
        .execute(&self.pool)
        .await
        .context("Failed to save setup record")?;

        Ok(())
    }

    async fn load_record(&self, run_id: Uuid) -> Result<Option<SetupRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM setups WHERE id = ?1", COLUMNS))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load setup record")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_records(&self, project_name: &str) -> Result<Vec<SetupRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM setups WHERE project_name = ?1 ORDER BY started_at DESC",
            COLUMNS
        ))
        .bind(project_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list setup records")?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT project_name FROM setups ORDER BY project_name ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list projects")?;

        Ok(rows.iter().map(|row| row.get("project_name")).collect())
    }
}
