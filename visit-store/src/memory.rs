//! In-memory store implementations.
//!
//! Used by the test suites and by embedded deployments that run without a
//! database. Semantics match the PostgreSQL adapters, including the
//! optimistic version check on the extended record.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use visit_model::{CoreRecord, ExtendedPatch, ExtendedRecord, TaskCompletion};

use crate::core_store::{apply_change, CoreStore, LifecycleChange};
use crate::error::{StoreError, StoreResult};
use crate::extended_store::ExtendedStore;

/// In-memory core store backed by a map keyed by visit id.
#[derive(Default)]
pub struct MemoryCoreStore {
    records: RwLock<HashMap<Uuid, CoreRecord>>,
}

impl MemoryCoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn page(mut records: Vec<CoreRecord>, offset: u64, limit: u32) -> (Vec<CoreRecord>, u64) {
        records.sort_by_key(|r| r.scheduled_time);
        let total = records.len() as u64;
        let items = records
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        (items, total)
    }
}

#[async_trait]
impl CoreStore for MemoryCoreStore {
    async fn upsert(&self, record: &CoreRecord) -> StoreResult<CoreRecord> {
        let mut stored = record.clone();
        stored.updated_at = Utc::now();
        self.records.write().await.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<CoreRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_offline_id(&self, offline_id: &str) -> StoreResult<Option<CoreRecord>> {
        let records = self.records.read().await;
        let mut matches: Vec<&CoreRecord> = records
            .values()
            .filter(|r| r.offline_id.as_deref() == Some(offline_id))
            .collect();
        matches.sort_by_key(|r| r.created_at);
        Ok(matches.first().map(|r| (*r).clone()))
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        change: &LifecycleChange,
    ) -> StoreResult<CoreRecord> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound)?;
        apply_change(record, change, Utc::now());
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn list_by_patient(
        &self,
        patient_id: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)> {
        let records = self.records.read().await;
        let matches = records
            .values()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(Self::page(matches, offset, limit))
    }

    async fn list_by_nurse(
        &self,
        nurse_id: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)> {
        let records = self.records.read().await;
        let matches = records
            .values()
            .filter(|r| r.nurse_id == nurse_id)
            .cloned()
            .collect();
        Ok(Self::page(matches, offset, limit))
    }

    async fn list_for_date(
        &self,
        date: NaiveDate,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<CoreRecord>, u64)> {
        let records = self.records.read().await;
        let matches = records
            .values()
            .filter(|r| r.scheduled_time.date_naive() == date)
            .cloned()
            .collect();
        Ok(Self::page(matches, offset, limit))
    }
}

/// In-memory extended store with the same version semantics as the
/// PostgreSQL adapter.
#[derive(Default)]
pub struct MemoryExtendedStore {
    records: RwLock<HashMap<Uuid, ExtendedRecord>>,
}

impl MemoryExtendedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExtendedStore for MemoryExtendedStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<ExtendedRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn upsert(&self, id: Uuid, patch: &ExtendedPatch) -> StoreResult<ExtendedRecord> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => {
                record.apply_patch(patch);
                record.version += 1;
                Ok(record.clone())
            }
            None => {
                let mut record = ExtendedRecord::new(id);
                record.apply_patch(patch);
                records.insert(id, record.clone());
                Ok(record)
            }
        }
    }

    async fn replace_tasks(
        &self,
        id: Uuid,
        tasks: Vec<TaskCompletion>,
        expected_version: i64,
    ) -> StoreResult<ExtendedRecord> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound)?;

        if record.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        record.task_completions = tasks;
        record.version += 1;
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
