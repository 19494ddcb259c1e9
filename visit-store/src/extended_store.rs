//! Extended store adapter: the flexible, document-shaped representation of
//! a visit.

use async_trait::async_trait;
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use visit_model::{ExtendedPatch, ExtendedRecord, TaskCompletion};

use crate::connection::StorePool;
use crate::error::{StoreError, StoreResult};

/// Attempts before an insert-or-merge gives up on concurrent writers.
const MERGE_RETRY_LIMIT: u32 = 3;

/// Adapter over the flexible document representation of a visit.
///
/// Upsert is insert-or-merge-by-identity: fields absent from the patch are
/// untouched, while the task ledger and media arrays are wholesale-replaced
/// when provided. The ledger has a dedicated targeted write,
/// [`replace_tasks`], guarded by the optimistic version the caller read.
///
/// [`replace_tasks`]: ExtendedStore::replace_tasks
#[async_trait]
pub trait ExtendedStore: Send + Sync {
    async fn find(&self, id: Uuid) -> StoreResult<Option<ExtendedRecord>>;

    /// Insert-or-merge a partial update.
    async fn upsert(&self, id: Uuid, patch: &ExtendedPatch) -> StoreResult<ExtendedRecord>;

    /// Replace the task ledger, conditional on `expected_version`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] when no extended record exists for `id`.
    /// - [`StoreError::VersionConflict`] when another writer advanced the
    ///   record since `expected_version` was read.
    async fn replace_tasks(
        &self,
        id: Uuid,
        tasks: Vec<TaskCompletion>,
        expected_version: i64,
    ) -> StoreResult<ExtendedRecord>;

    /// Returns true when a record was removed.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[derive(Debug, FromRow)]
struct ExtendedRow {
    doc: serde_json::Value,
    version: i64,
}

impl ExtendedRow {
    fn into_record(self) -> StoreResult<ExtendedRecord> {
        let mut record: ExtendedRecord = serde_json::from_value(self.doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        record.version = self.version;
        Ok(record)
    }
}

/// PostgreSQL implementation over a single JSONB document per visit.
///
/// Postgres cannot express a targeted update of one array element inside
/// the document, so every write is read-modify-write with a version
/// precondition, retried on conflict.
#[derive(Clone)]
pub struct PgExtendedStore {
    pool: StorePool,
}

impl PgExtendedStore {
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid) -> StoreResult<Option<ExtendedRow>> {
        let row: Option<ExtendedRow> =
            sqlx::query_as("SELECT doc, version FROM visits_extended WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.pool())
                .await?;
        Ok(row)
    }

    /// Write `record` conditional on `expected_version`; None inserts a new
    /// row. Returns false when the precondition failed.
    async fn write_conditional(
        &self,
        id: Uuid,
        record: &ExtendedRecord,
        expected_version: Option<i64>,
    ) -> StoreResult<bool> {
        let doc =
            serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let affected = match expected_version {
            Some(version) => {
                sqlx::query(
                    "UPDATE visits_extended \
                     SET doc = $2, version = version + 1, updated_at = NOW() \
                     WHERE id = $1 AND version = $3",
                )
                .bind(id)
                .bind(&doc)
                .bind(version)
                .execute(self.pool.pool())
                .await?
                .rows_affected()
            }
            None => {
                sqlx::query(
                    "INSERT INTO visits_extended (id, doc, version) VALUES ($1, $2, 0) \
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(id)
                .bind(&doc)
                .execute(self.pool.pool())
                .await?
                .rows_affected()
            }
        };

        Ok(affected > 0)
    }
}

#[async_trait]
impl ExtendedStore for PgExtendedStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<ExtendedRecord>> {
        self.fetch(id).await?.map(ExtendedRow::into_record).transpose()
    }

    async fn upsert(&self, id: Uuid, patch: &ExtendedPatch) -> StoreResult<ExtendedRecord> {
        for attempt in 0..MERGE_RETRY_LIMIT {
            let existing = self.fetch(id).await?;
            let expected_version = existing.as_ref().map(|row| row.version);

            let mut record = match existing {
                Some(row) => row.into_record()?,
                None => ExtendedRecord::new(id),
            };
            record.apply_patch(patch);

            if self.write_conditional(id, &record, expected_version).await? {
                record.version = expected_version.map_or(0, |v| v + 1);
                return Ok(record);
            }

            debug!(
                visit_id = %id,
                attempt = attempt + 1,
                "Extended upsert lost a concurrent write race, retrying"
            );
        }

        Err(StoreError::VersionConflict)
    }

    async fn replace_tasks(
        &self,
        id: Uuid,
        tasks: Vec<TaskCompletion>,
        expected_version: i64,
    ) -> StoreResult<ExtendedRecord> {
        let mut record = self
            .fetch(id)
            .await?
            .ok_or(StoreError::NotFound)?
            .into_record()?;

        if record.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        record.task_completions = tasks;
        if self
            .write_conditional(id, &record, Some(expected_version))
            .await?
        {
            record.version = expected_version + 1;
            Ok(record)
        } else {
            Err(StoreError::VersionConflict)
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM visits_extended WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
