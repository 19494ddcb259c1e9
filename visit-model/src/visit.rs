use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::{SyncStatus, VisitStatus};
use crate::task::TaskCompletion;
use crate::update::ExtendedPatch;

/// Actor identity supplied by the calling layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    pub user_name: String,
}

/// The rigid, regulatory-facing representation of a visit.
///
/// Lives in the relational core store, which is the single source of truth
/// for identity and lifecycle status. `status`, `start_time` and `end_time`
/// are lifecycle facts written only through the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreRecord {
    /// Server identity; the join key between the two stores.
    pub id: Uuid,
    /// Client-minted identifier from before the record had a server
    /// identity. Stable for the life of the record once assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_id: Option<String>,
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    pub nurse_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurse_name: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: VisitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_type: Option<String>,
    #[serde(default)]
    pub is_regulated: bool,
    #[serde(default)]
    pub requires_license: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The flexible representation of a visit: task ledger, clinical payload,
/// media references and device sync metadata.
///
/// Keyed by the same `id` as the core record. `version` is the optimistic
/// concurrency revision maintained by the extended store; every successful
/// write increments it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRecord {
    pub id: Uuid,
    #[serde(default)]
    pub task_completions: Vec<TaskCompletion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vital_signs: Option<serde_json::Value>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_recording_path: Option<String>,
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: i64,
}

impl ExtendedRecord {
    /// Empty extended record for an interactively created visit.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            task_completions: Vec::new(),
            vital_signs: None,
            photos: Vec::new(),
            audio_recording_path: None,
            sync_status: SyncStatus::Synced,
            device_id: None,
            sync_timestamp: None,
            version: 0,
        }
    }

    /// Merge a partial update into this record.
    ///
    /// Fields absent from the patch are left untouched. The task ledger and
    /// the photo array are wholesale-replaced when provided.
    pub fn apply_patch(&mut self, patch: &ExtendedPatch) {
        if let Some(tasks) = &patch.task_completions {
            self.task_completions = tasks.clone();
        }
        if let Some(vitals) = &patch.vital_signs {
            self.vital_signs = Some(vitals.clone());
        }
        if let Some(photos) = &patch.photos {
            self.photos = photos.clone();
        }
        if let Some(path) = &patch.audio_recording_path {
            self.audio_recording_path = Some(path.clone());
        }
        if let Some(status) = patch.sync_status {
            self.sync_status = status;
        }
        if let Some(device) = &patch.device_id {
            self.device_id = Some(device.clone());
        }
        if let Some(at) = patch.sync_timestamp {
            self.sync_timestamp = Some(at);
        }
    }
}

/// The merged core + extended view returned to callers.
///
/// `extended_available` is false when the extended record is missing or the
/// extended store was unreachable; the visit itself still exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitView {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_id: Option<String>,
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    pub nurse_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurse_name: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: VisitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_type: Option<String>,
    pub is_regulated: bool,
    pub requires_license: bool,
    #[serde(default)]
    pub task_completions: Vec<TaskCompletion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vital_signs: Option<serde_json::Value>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_recording_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_timestamp: Option<DateTime<Utc>>,
    pub extended_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VisitView {
    /// Build the merged view. A missing extended record is "no extended
    /// data available", never an error.
    pub fn from_parts(core: CoreRecord, extended: Option<ExtendedRecord>) -> Self {
        let extended_available = extended.is_some();
        let ext = extended.unwrap_or_else(|| ExtendedRecord::new(core.id));

        Self {
            id: core.id,
            offline_id: core.offline_id,
            patient_id: core.patient_id,
            patient_name: core.patient_name,
            nurse_id: core.nurse_id,
            nurse_name: core.nurse_name,
            scheduled_time: core.scheduled_time,
            start_time: core.start_time,
            end_time: core.end_time,
            status: core.status,
            location: core.location,
            notes: core.notes,
            visit_type: core.visit_type,
            is_regulated: core.is_regulated,
            requires_license: core.requires_license,
            task_completions: ext.task_completions,
            vital_signs: ext.vital_signs,
            photos: ext.photos,
            audio_recording_path: ext.audio_recording_path,
            sync_status: extended_available.then_some(ext.sync_status),
            device_id: ext.device_id,
            sync_timestamp: ext.sync_timestamp,
            extended_available,
            created_at: core.created_at,
            updated_at: core.updated_at,
        }
    }
}
