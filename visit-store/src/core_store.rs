//! Core store adapter: the single source of truth for visit identity and
//! lifecycle status.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use visit_model::{append_note, CoreRecord, VisitStatus};

use crate::connection::StorePool;
use crate::error::{StoreError, StoreResult};

/// Lifecycle facts persisted by a status transition. Produced by the state
/// machine; the core store is the only writer of these fields.
#[derive(Debug, Clone)]
pub struct LifecycleChange {
    pub status: VisitStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Appended to the visit's notes, never overwriting prior text.
    pub audit_note: String,
}

/// Adapter over the rigid relational representation of a visit.
///
/// Upsert is insert-or-replace-by-identity: denormalized display fields are
/// always overwritten with the latest value. Status is only changed through
/// [`apply_transition`]; generic updates carry the status already stored.
///
/// [`apply_transition`]: CoreStore::apply_transition
#[async_trait]
pub trait CoreStore: Send + Sync {
    async fn upsert(&self, record: &CoreRecord) -> StoreResult<CoreRecord>;

    async fn find(&self, id: Uuid) -> StoreResult<Option<CoreRecord>>;

    /// Lookup by the client-minted offline id.
    async fn find_by_offline_id(&self, offline_id: &str) -> StoreResult<Option<CoreRecord>>;

    /// Persist a validated lifecycle transition: status, timestamps, and
    /// the audit note appended to the visit's notes.
    async fn apply_transition(&self, id: Uuid, change: &LifecycleChange)
        -> StoreResult<CoreRecord>;

    /// Returns true when a record was removed.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    async fn list_by_patient(
        &self,
        patient_id: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)>;

    async fn list_by_nurse(
        &self,
        nurse_id: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)>;

    /// Visits scheduled on the given calendar day (UTC).
    async fn list_for_date(
        &self,
        date: NaiveDate,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)>;
}

/// Row shape for the `visits_core` table. Status is stored as text and
/// normalized through the canonical vocabulary on read.
#[derive(Debug, FromRow)]
struct CoreRow {
    id: Uuid,
    offline_id: Option<String>,
    patient_id: String,
    patient_name: Option<String>,
    nurse_id: String,
    nurse_name: Option<String>,
    scheduled_time: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    status: String,
    location: Option<String>,
    notes: Option<String>,
    visit_type: Option<String>,
    is_regulated: bool,
    requires_license: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CoreRow> for CoreRecord {
    type Error = StoreError;

    fn try_from(row: CoreRow) -> Result<Self, Self::Error> {
        let status = VisitStatus::parse(&row.status)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(CoreRecord {
            id: row.id,
            offline_id: row.offline_id,
            patient_id: row.patient_id,
            patient_name: row.patient_name,
            nurse_id: row.nurse_id,
            nurse_name: row.nurse_name,
            scheduled_time: row.scheduled_time,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            location: row.location,
            notes: row.notes,
            visit_type: row.visit_type,
            is_regulated: row.is_regulated,
            requires_license: row.requires_license,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL implementation of the core store.
#[derive(Clone)]
pub struct PgCoreStore {
    pool: StorePool,
}

impl PgCoreStore {
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    async fn list_where(
        &self,
        filter_sql: &str,
        filter_value: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM visits_core WHERE {filter_sql}"
        ))
        .bind(filter_value)
        .fetch_one(self.pool.pool())
        .await?;

        let rows: Vec<CoreRow> = sqlx::query_as(&format!(
            "SELECT * FROM visits_core WHERE {filter_sql} \
             ORDER BY scheduled_time DESC LIMIT $2 OFFSET $3"
        ))
        .bind(filter_value)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(self.pool.pool())
        .await?;

        let records = rows
            .into_iter()
            .map(CoreRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, total as u64))
    }
}

#[async_trait]
impl CoreStore for PgCoreStore {
    async fn upsert(&self, record: &CoreRecord) -> StoreResult<CoreRecord> {
        debug!(visit_id = %record.id, "Upserting core visit record");

        let row: CoreRow = sqlx::query_as(
            r#"
            INSERT INTO visits_core (
                id, offline_id, patient_id, patient_name, nurse_id, nurse_name,
                scheduled_time, start_time, end_time, status, location, notes,
                visit_type, is_regulated, requires_license, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW())
            ON CONFLICT (id) DO UPDATE SET
                offline_id = EXCLUDED.offline_id,
                patient_id = EXCLUDED.patient_id,
                patient_name = EXCLUDED.patient_name,
                nurse_id = EXCLUDED.nurse_id,
                nurse_name = EXCLUDED.nurse_name,
                scheduled_time = EXCLUDED.scheduled_time,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                status = EXCLUDED.status,
                location = EXCLUDED.location,
                notes = EXCLUDED.notes,
                visit_type = EXCLUDED.visit_type,
                is_regulated = EXCLUDED.is_regulated,
                requires_license = EXCLUDED.requires_license,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(&record.offline_id)
        .bind(&record.patient_id)
        .bind(&record.patient_name)
        .bind(&record.nurse_id)
        .bind(&record.nurse_name)
        .bind(record.scheduled_time)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.status.as_str())
        .bind(&record.location)
        .bind(&record.notes)
        .bind(&record.visit_type)
        .bind(record.is_regulated)
        .bind(record.requires_license)
        .bind(record.created_at)
        .fetch_one(self.pool.pool())
        .await?;

        row.try_into()
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<CoreRecord>> {
        let row: Option<CoreRow> = sqlx::query_as("SELECT * FROM visits_core WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.map(CoreRecord::try_from).transpose()
    }

    async fn find_by_offline_id(&self, offline_id: &str) -> StoreResult<Option<CoreRecord>> {
        let row: Option<CoreRow> = sqlx::query_as(
            "SELECT * FROM visits_core WHERE offline_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(offline_id)
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(CoreRecord::try_from).transpose()
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        change: &LifecycleChange,
    ) -> StoreResult<CoreRecord> {
        let row: Option<CoreRow> = sqlx::query_as(
            r#"
            UPDATE visits_core SET
                status = $2,
                start_time = $3,
                end_time = $4,
                notes = CASE
                    WHEN notes IS NULL OR notes = '' THEN $5
                    ELSE notes || E'\n' || $5
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(change.status.as_str())
        .bind(change.start_time)
        .bind(change.end_time)
        .bind(&change.audit_note)
        .fetch_optional(self.pool.pool())
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM visits_core WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_patient(
        &self,
        patient_id: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)> {
        self.list_where("patient_id = $1", patient_id, offset, limit)
            .await
    }

    async fn list_by_nurse(
        &self,
        nurse_id: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)> {
        self.list_where("nurse_id = $1", nurse_id, offset, limit)
            .await
    }

    async fn list_for_date(
        &self,
        date: NaiveDate,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)> {
        let day_start = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| StoreError::QueryFailed("invalid date".to_string()))?
            .and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM visits_core WHERE scheduled_time >= $1 AND scheduled_time < $2",
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(self.pool.pool())
        .await?;

        let rows: Vec<CoreRow> = sqlx::query_as(
            "SELECT * FROM visits_core WHERE scheduled_time >= $1 AND scheduled_time < $2 \
             ORDER BY scheduled_time LIMIT $3 OFFSET $4",
        )
        .bind(day_start)
        .bind(day_end)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(self.pool.pool())
        .await?;

        let records = rows
            .into_iter()
            .map(CoreRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, total as u64))
    }
}

/// Apply a lifecycle change to an in-memory core record. Shared by the
/// memory store so audit-note appending matches the SQL path.
pub(crate) fn apply_change(record: &mut CoreRecord, change: &LifecycleChange, now: DateTime<Utc>) {
    record.status = change.status;
    record.start_time = change.start_time;
    record.end_time = change.end_time;
    append_note(&mut record.notes, &change.audit_note);
    record.updated_at = now;
}
