use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use error_common::{VisitError, VisitResult};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use visit_lifecycle::{plan_transition, transition_for_target, Transition};
use visit_model::{
    projection, validate_ledger, Actor, CoreRecord, CreateVisit, ExtendedPatch, ExtendedRecord,
    Page, PaginationParams, SyncStatus, TaskCompletion, TaskStats, UpdateVisit, VisitStatus,
    VisitView,
};
use visit_store::{CoreStore, ExtendedStore, LifecycleChange, StoreError};

use crate::tasks::TaskLedger;

/// Orchestration facade over the two visit stores.
///
/// Core writes are fatal on failure; extended writes degrade with a
/// warning. Both store handles are injected at construction.
pub struct VisitService {
    core: Arc<dyn CoreStore>,
    extended: Arc<dyn ExtendedStore>,
    ledger: TaskLedger,
}

impl VisitService {
    pub fn new(core: Arc<dyn CoreStore>, extended: Arc<dyn ExtendedStore>) -> Self {
        let ledger = TaskLedger::new(extended.clone());
        Self {
            core,
            extended,
            ledger,
        }
    }

    /// Create a visit interactively.
    ///
    /// The core record is written first and must succeed; the extended
    /// record (initial ledger, vitals, photos) is then written and may
    /// degrade.
    pub async fn create_visit(&self, input: CreateVisit) -> VisitResult<VisitView> {
        input.validate()?;
        if let Some(tasks) = &input.task_completions {
            validate_ledger(tasks)?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let core = self
            .core
            .upsert(&input.to_core(id, now))
            .await
            .map_err(core_err)?;

        info!(visit_id = %id, patient_id = %core.patient_id, "Visit created");

        let patch = ExtendedPatch {
            task_completions: input.task_completions,
            vital_signs: input.vital_signs,
            photos: input.photos,
            sync_status: Some(SyncStatus::Synced),
            ..ExtendedPatch::default()
        };
        let extended = self.write_extended_degraded(id, &patch).await;

        Ok(VisitView::from_parts(core, extended))
    }

    /// Apply an interactive edit to the core fields.
    pub async fn update_visit(&self, id: Uuid, update: UpdateVisit) -> VisitResult<VisitView> {
        if update.is_empty() {
            return Err(VisitError::Validation(
                "update contains no fields".to_string(),
            ));
        }

        let mut core = self.find_core(id).await?;
        update.apply_to(&mut core, Utc::now());
        let core = self.core.upsert(&core).await.map_err(core_err)?;

        let extended = self.read_extended_degraded(id).await;
        Ok(VisitView::from_parts(core, extended))
    }

    pub async fn start_visit(&self, id: Uuid, actor: &Actor) -> VisitResult<VisitView> {
        self.transition(id, Transition::Start, actor).await
    }

    /// Complete a visit. Gated on the task ledger: every high/critical
    /// task must already be completed.
    pub async fn complete_visit(&self, id: Uuid, actor: &Actor) -> VisitResult<VisitView> {
        self.transition(id, Transition::Complete, actor).await
    }

    pub async fn cancel_visit(&self, id: Uuid, actor: &Actor) -> VisitResult<VisitView> {
        self.transition(id, Transition::Cancel, actor).await
    }

    /// Generic status change: the target (legacy synonyms accepted) is
    /// mapped onto the legal transition set.
    pub async fn change_status(
        &self,
        id: Uuid,
        target: &str,
        actor: &Actor,
    ) -> VisitResult<VisitView> {
        let target = VisitStatus::parse(target)?;
        let core = self.find_core(id).await?;
        let transition = transition_for_target(core.status, target)?;
        self.transition(id, transition, actor).await
    }

    /// Remove a visit from both stores.
    ///
    /// The core delete is authoritative; an extended delete failure leaves
    /// an orphan document that reads tolerate, and is only logged.
    pub async fn delete_visit(&self, id: Uuid) -> VisitResult<()> {
        let removed = self.core.delete(id).await.map_err(core_err)?;
        if !removed {
            return Err(VisitError::NotFound(id.to_string()));
        }
        info!(visit_id = %id, "Visit deleted from core store");

        match self.extended.delete(id).await {
            Ok(_) => {}
            Err(e) => {
                warn!(
                    visit_id = %id,
                    error = %e,
                    "Extended store delete failed, orphan document tolerated"
                );
            }
        }

        Ok(())
    }

    /// Merged core + extended view of one visit.
    pub async fn get_by_id(&self, id: Uuid) -> VisitResult<VisitView> {
        let core = self.find_core(id).await?;
        let extended = self.read_extended_degraded(id).await;
        Ok(VisitView::from_parts(core, extended))
    }

    /// Render the core record in the external interchange format. Pure
    /// read-time transform, nothing is persisted.
    pub async fn get_encounter(&self, id: Uuid) -> VisitResult<JsonValue> {
        let core = self.find_core(id).await?;
        Ok(projection::to_encounter(&core))
    }

    pub async fn list_by_patient(
        &self,
        patient_id: &str,
        params: &PaginationParams,
    ) -> VisitResult<Page<VisitView>> {
        let (records, total) = self
            .core
            .list_by_patient(patient_id, params.offset(), params.limit())
            .await
            .map_err(core_err)?;
        Ok(Page::new(self.merge_views(records).await, total, params))
    }

    pub async fn list_by_nurse(
        &self,
        nurse_id: &str,
        params: &PaginationParams,
    ) -> VisitResult<Page<VisitView>> {
        let (records, total) = self
            .core
            .list_by_nurse(nurse_id, params.offset(), params.limit())
            .await
            .map_err(core_err)?;
        Ok(Page::new(self.merge_views(records).await, total, params))
    }

    pub async fn list_for_date(
        &self,
        date: NaiveDate,
        params: &PaginationParams,
    ) -> VisitResult<Page<VisitView>> {
        let (records, total) = self
            .core
            .list_for_date(date, params.offset(), params.limit())
            .await
            .map_err(core_err)?;
        Ok(Page::new(self.merge_views(records).await, total, params))
    }

    /// Append tasks to a visit's ledger.
    pub async fn add_tasks(
        &self,
        id: Uuid,
        tasks: Vec<TaskCompletion>,
    ) -> VisitResult<Vec<TaskCompletion>> {
        self.find_core(id).await?;
        self.ledger.add_tasks(id, tasks).await
    }

    pub async fn complete_task(
        &self,
        id: Uuid,
        task_id: &str,
        actor: &Actor,
        notes: Option<&str>,
    ) -> VisitResult<TaskCompletion> {
        self.find_core(id).await?;
        self.ledger.complete_task(id, task_id, actor, notes).await
    }

    pub async fn uncomplete_task(
        &self,
        id: Uuid,
        task_id: &str,
        reason: Option<&str>,
    ) -> VisitResult<TaskCompletion> {
        self.find_core(id).await?;
        self.ledger.uncomplete_task(id, task_id, reason).await
    }

    pub async fn task_stats(&self, id: Uuid) -> VisitResult<TaskStats> {
        self.find_core(id).await?;
        self.ledger.stats(id).await
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
        actor: &Actor,
    ) -> VisitResult<VisitView> {
        let core = self.find_core(id).await?;
        // degraded or missing extended data means an empty ledger, so the
        // completion gate does not apply
        let extended = self.read_extended_degraded(id).await;
        let tasks = extended
            .as_ref()
            .map(|e| e.task_completions.as_slice())
            .unwrap_or(&[]);

        let outcome = plan_transition(&core, transition, tasks, actor, Utc::now())?;
        let change = LifecycleChange {
            status: outcome.status,
            start_time: outcome.start_time,
            end_time: outcome.end_time,
            audit_note: outcome.audit_note,
        };

        let updated = match self.core.apply_transition(id, &change).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => return Err(VisitError::NotFound(id.to_string())),
            Err(e) => return Err(core_err(e)),
        };

        info!(
            visit_id = %id,
            status = %updated.status,
            actor = %actor.user_id,
            "Visit status transition applied"
        );

        Ok(VisitView::from_parts(updated, extended))
    }

    async fn find_core(&self, id: Uuid) -> VisitResult<CoreRecord> {
        self.core
            .find(id)
            .await
            .map_err(core_err)?
            .ok_or_else(|| VisitError::NotFound(id.to_string()))
    }

    /// Extended read with degraded-store tolerance: an error is logged and
    /// treated as "no extended data available".
    async fn read_extended_degraded(&self, id: Uuid) -> Option<ExtendedRecord> {
        match self.extended.find(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    visit_id = %id,
                    error = %e,
                    "Extended store read failed, serving core data only"
                );
                None
            }
        }
    }

    /// Extended write with degraded-store tolerance: the core fact already
    /// committed, so a failure here is reported as a warning only.
    async fn write_extended_degraded(
        &self,
        id: Uuid,
        patch: &ExtendedPatch,
    ) -> Option<ExtendedRecord> {
        match self.extended.upsert(id, patch).await {
            Ok(record) => Some(record),
            Err(e) => {
                error_common::log_error(
                    "extended_write",
                    &VisitError::ExtendedStoreDegraded(e.to_string()),
                );
                None
            }
        }
    }

    async fn merge_views(&self, records: Vec<CoreRecord>) -> Vec<VisitView> {
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            let extended = self.read_extended_degraded(record.id).await;
            views.push(VisitView::from_parts(record, extended));
        }
        views
    }
}

fn core_err(e: StoreError) -> VisitError {
    VisitError::StoreFailure(e.to_string())
}
