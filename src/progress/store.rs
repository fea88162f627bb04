use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{types::Json, PgPool, Row};
use thiserror::Error;
use tokio::sync::RwLock;

use super::{CatalogTotals, CompletionEvent, ProgressError, ProgressRecord};
use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Malformed progress document for learner {learner_id}: {reason}")]
    MalformedDocument { learner_id: String, reason: String },

    #[error(transparent)]
    Progress(#[from] ProgressError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::Sqlx(err))
    }
}

/// Reads and updates per-learner progress documents
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// `None` when the learner has never completed anything
    async fn get_progress(&self, learner_id: &str) -> Result<Option<ProgressRecord>, StoreError>;

    /// Apply one completion, creating the learner's record on first use
    async fn record_completion(
        &self,
        learner_id: &str,
        event: CompletionEvent,
    ) -> Result<ProgressRecord, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Counts published content per category
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn published_counts(&self) -> Result<CatalogTotals, StoreError>;
}

/// Progress documents kept as JSONB, one row per learner
#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_document(learner_id: &str, row: &sqlx::postgres::PgRow) -> Result<ProgressRecord, StoreError> {
    let Json(record): Json<ProgressRecord> =
        row.try_get("document").map_err(|e| StoreError::MalformedDocument {
            learner_id: learner_id.to_string(),
            reason: e.to_string(),
        })?;
    Ok(record)
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn get_progress(&self, learner_id: &str) -> Result<Option<ProgressRecord>, StoreError> {
        let row = sqlx::query("SELECT document FROM learner_progress WHERE learner_id = $1")
            .bind(learner_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_document(learner_id, &row)).transpose()
    }

    async fn record_completion(
        &self,
        learner_id: &str,
        event: CompletionEvent,
    ) -> Result<ProgressRecord, StoreError> {
        // nothing is created for a learner until a valid completion arrives
        event.validate()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO learner_progress (learner_id, document) VALUES ($1, $2) \
             ON CONFLICT (learner_id) DO NOTHING",
        )
        .bind(learner_id)
        .bind(Json(ProgressRecord::empty(learner_id)))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT document FROM learner_progress WHERE learner_id = $1 FOR UPDATE")
            .bind(learner_id)
            .fetch_one(&mut *tx)
            .await?;
        let mut record = decode_document(learner_id, &row)?;

        record.apply(event, Utc::now())?;

        sqlx::query("UPDATE learner_progress SET document = $2, updated_at = now() WHERE learner_id = $1")
            .bind(learner_id)
            .bind(Json(&record))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            learner = learner_id,
            modules = record.modules.len(),
            quizzes = record.quizzes.len(),
            simulations = record.simulations.len(),
            "Recorded completion"
        );
        Ok(record)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Published counts read from the catalog tables
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn published_counts(&self) -> Result<CatalogTotals, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM modules WHERE published) AS modules,
                (SELECT COUNT(*) FROM quizzes WHERE published) AS quizzes,
                (SELECT COUNT(*) FROM simulations WHERE published) AS simulations
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let totals = CatalogTotals::try_from_counts(
            row.try_get("modules")?,
            row.try_get("quizzes")?,
            row.try_get("simulations")?,
        )?;
        Ok(totals)
    }
}

/// Process-local store backing both traits, for local runs and tests
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ProgressRecord>>,
    catalog: RwLock<CatalogTotals>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(totals: CatalogTotals) -> Self {
        Self {
            records: RwLock::default(),
            catalog: RwLock::new(totals),
        }
    }

    pub async fn set_catalog(&self, totals: CatalogTotals) {
        *self.catalog.write().await = totals;
    }

    /// Replace a learner's record wholesale
    pub async fn insert(&self, record: ProgressRecord) {
        self.records
            .write()
            .await
            .insert(record.learner_id.clone(), record);
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get_progress(&self, learner_id: &str) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(self.records.read().await.get(learner_id).cloned())
    }

    async fn record_completion(
        &self,
        learner_id: &str,
        event: CompletionEvent,
    ) -> Result<ProgressRecord, StoreError> {
        event.validate()?;

        let mut records = self.records.write().await;
        let record = records
            .entry(learner_id.to_string())
            .or_insert_with(|| ProgressRecord::empty(learner_id));
        record.apply(event, Utc::now())?;
        Ok(record.clone())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn published_counts(&self) -> Result<CatalogTotals, StoreError> {
        Ok(*self.catalog.read().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_learner_has_no_record() {
        let store = MemoryStore::new();
        assert_eq!(store.get_progress("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn first_completion_creates_record_lazily() {
        let store = MemoryStore::new();
        let record = store
            .record_completion("learner-1", CompletionEvent::Module { module_id: "m1".into() })
            .await
            .unwrap();

        assert_eq!(record.learner_id, "learner-1");
        assert_eq!(record.modules.len(), 1);
        assert_eq!(store.get_progress("learner-1").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn invalid_event_creates_nothing() {
        let store = MemoryStore::new();
        let result = store
            .record_completion("learner-1", CompletionEvent::Quiz { quiz_id: "q".into(), score: 250, passed: true })
            .await;

        assert!(matches!(result, Err(StoreError::Progress(ProgressError::InvalidInput(_)))));
        assert_eq!(store.get_progress("learner-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_completions_are_not_lost() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .record_completion(
                        "learner-1",
                        CompletionEvent::Simulation { simulation_id: format!("s{}", i), outcome: json!(i) },
                    )
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let record = store.get_progress("learner-1").await.unwrap().unwrap();
        assert_eq!(record.simulations.len(), 16);
    }

    #[tokio::test]
    async fn catalog_counts_are_replaceable() {
        let store = MemoryStore::with_catalog(CatalogTotals::new(1, 2, 3));
        assert_eq!(store.published_counts().await.unwrap(), CatalogTotals::new(1, 2, 3));
        store.set_catalog(CatalogTotals::new(5, 4, 2)).await;
        assert_eq!(store.published_counts().await.unwrap(), CatalogTotals::new(5, 4, 2));
    }
}
