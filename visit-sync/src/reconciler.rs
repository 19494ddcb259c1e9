//! Batch reconciliation of device-uploaded visit candidates.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use error_common::{ErrorDetail, VisitError, VisitResult};
use visit_model::{
    validate_ledger, CoreRecord, ExtendedPatch, SyncStatus, VisitCandidate, VisitStatus,
};
use visit_store::{CoreStore, ExtendedStore};

use crate::identity::IdentityResolver;

/// Outcome of one candidate in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncOutcome {
    Synced,
    Failed,
}

/// Per-candidate result returned to the device, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResultEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub status: SyncOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Applies a device's sync batch with create-or-update semantics.
///
/// Candidates are processed sequentially in input order. Each candidate is
/// resolved against the core store, merged or created, and stamped with
/// sync provenance on its extended record. A failure of any step marks that
/// candidate failed and the batch continues.
pub struct SyncReconciler {
    core: Arc<dyn CoreStore>,
    extended: Arc<dyn ExtendedStore>,
    resolver: IdentityResolver,
}

impl SyncReconciler {
    pub fn new(core: Arc<dyn CoreStore>, extended: Arc<dyn ExtendedStore>) -> Self {
        let resolver = IdentityResolver::new(core.clone());
        Self {
            core,
            extended,
            resolver,
        }
    }

    /// Reconcile a whole batch. Never fails as a whole: every candidate
    /// yields exactly one entry, failed or synced.
    pub async fn reconcile(
        &self,
        candidates: &[VisitCandidate],
        device_id: &str,
    ) -> Vec<SyncResultEntry> {
        info!(
            device_id = %device_id,
            batch_size = candidates.len(),
            "Sync batch received"
        );

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let entry = match self.reconcile_one(candidate, device_id).await {
                Ok(id) => SyncResultEntry {
                    offline_id: candidate.offline_id.clone(),
                    id: Some(id),
                    status: SyncOutcome::Synced,
                    error: None,
                },
                Err(e) => {
                    warn!(
                        device_id = %device_id,
                        offline_id = candidate.offline_id.as_deref().unwrap_or("-"),
                        error = %e,
                        "Candidate rejected, continuing batch"
                    );
                    SyncResultEntry {
                        offline_id: candidate.offline_id.clone(),
                        id: candidate.id,
                        status: SyncOutcome::Failed,
                        error: Some(e.to_detail()),
                    }
                }
            };
            results.push(entry);
        }

        let failed = results
            .iter()
            .filter(|r| r.status == SyncOutcome::Failed)
            .count();
        info!(
            device_id = %device_id,
            synced = results.len() - failed,
            failed,
            "Sync batch reconciled"
        );

        results
    }

    async fn reconcile_one(
        &self,
        candidate: &VisitCandidate,
        device_id: &str,
    ) -> VisitResult<Uuid> {
        // device uploads get the same ledger validation as interactive
        // writes: unique task ids, consistent completion fields
        if let Some(tasks) = &candidate.task_completions {
            validate_ledger(tasks)?;
        }

        let now = Utc::now();
        let core = match self.resolver.resolve(candidate).await? {
            Some(existing) => merge_candidate(existing, candidate, now)?,
            None => candidate_to_core(candidate, now)?,
        };

        let core = self
            .core
            .upsert(&core)
            .await
            .map_err(|e| VisitError::StoreFailure(e.to_string()))?;

        // sync provenance is stamped even when the candidate carried no
        // extended payload
        let mut patch = candidate.extended_patch().unwrap_or_default();
        patch.sync_status = Some(SyncStatus::Synced);
        patch.device_id = Some(device_id.to_string());
        patch.sync_timestamp = Some(now);

        // a candidate's extended payload is part of its upload; failing to
        // persist it fails the candidate so the device retries
        self.extended
            .upsert(core.id, &patch)
            .await
            .map_err(|e| VisitError::ExtendedStoreDegraded(e.to_string()))?;

        Ok(core.id)
    }
}

/// Overlay a candidate onto an existing core record, last write wins.
///
/// Lifecycle facts (`status`, `start_time`, `end_time`) are applied directly
/// rather than replayed through the state machine: the device already
/// performed the transitions offline and this is a record of fact.
fn merge_candidate(
    mut core: CoreRecord,
    candidate: &VisitCandidate,
    now: chrono::DateTime<Utc>,
) -> VisitResult<CoreRecord> {
    if let Some(status) = candidate.parsed_status()? {
        core.status = status;
    }
    if core.offline_id.is_none() {
        core.offline_id = candidate.offline_id.clone();
    }
    if !candidate.patient_id.trim().is_empty() {
        core.patient_id = candidate.patient_id.clone();
    }
    if let Some(v) = &candidate.patient_name {
        core.patient_name = Some(v.clone());
    }
    if !candidate.nurse_id.trim().is_empty() {
        core.nurse_id = candidate.nurse_id.clone();
    }
    if let Some(v) = &candidate.nurse_name {
        core.nurse_name = Some(v.clone());
    }
    if let Some(v) = candidate.scheduled_time {
        core.scheduled_time = v;
    }
    if let Some(v) = candidate.start_time {
        core.start_time = Some(v);
    }
    if let Some(v) = candidate.end_time {
        core.end_time = Some(v);
    }
    if let Some(v) = &candidate.location {
        core.location = Some(v.clone());
    }
    if let Some(v) = &candidate.notes {
        core.notes = Some(v.clone());
    }
    if let Some(v) = &candidate.visit_type {
        core.visit_type = Some(v.clone());
    }
    if let Some(v) = candidate.is_regulated {
        core.is_regulated = v;
    }
    if let Some(v) = candidate.requires_license {
        core.requires_license = v;
    }
    core.updated_at = now;
    Ok(core)
}

/// Build a brand-new core record from a candidate. The candidate's own id
/// is honored when present so a device-minted uuid stays stable.
fn candidate_to_core(
    candidate: &VisitCandidate,
    now: chrono::DateTime<Utc>,
) -> VisitResult<CoreRecord> {
    candidate.validate_for_create()?;
    let status = candidate.parsed_status()?.unwrap_or(VisitStatus::Planned);

    Ok(CoreRecord {
        id: candidate.id.unwrap_or_else(Uuid::new_v4),
        offline_id: candidate.offline_id.clone(),
        patient_id: candidate.patient_id.clone(),
        patient_name: candidate.patient_name.clone(),
        nurse_id: candidate.nurse_id.clone(),
        nurse_name: candidate.nurse_name.clone(),
        scheduled_time: candidate.scheduled_time.unwrap_or(now),
        start_time: candidate.start_time,
        end_time: candidate.end_time,
        status,
        location: candidate.location.clone(),
        notes: candidate.notes.clone(),
        visit_type: candidate.visit_type.clone(),
        is_regulated: candidate.is_regulated.unwrap_or(false),
        requires_license: candidate.requires_license.unwrap_or(false),
        created_at: now,
        updated_at: now,
    })
}
