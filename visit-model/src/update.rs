//! Allow-listed mutation payloads.
//!
//! Inbound request bodies are never spread into records wholesale; each
//! operation has an explicit struct of the fields it may touch, and unknown
//! fields are rejected at deserialization.

use chrono::{DateTime, Utc};
use error_common::{VisitError, VisitResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::status::{SyncStatus, VisitStatus};
use crate::task::TaskCompletion;
use crate::visit::CoreRecord;

/// Payload for interactive visit creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CreateVisit {
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub nurse_id: String,
    pub nurse_name: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub offline_id: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub visit_type: Option<String>,
    pub is_regulated: Option<bool>,
    pub requires_license: Option<bool>,
    pub task_completions: Option<Vec<TaskCompletion>>,
    pub vital_signs: Option<JsonValue>,
    pub photos: Option<Vec<String>>,
}

impl CreateVisit {
    /// Check required fields, naming every missing one.
    pub fn validate(&self) -> VisitResult<()> {
        let mut missing = Vec::new();
        if self.patient_id.trim().is_empty() {
            missing.push("patientId");
        }
        if self.nurse_id.trim().is_empty() {
            missing.push("nurseId");
        }
        if self.scheduled_time.is_none() {
            missing.push("scheduledTime");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(VisitError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Build the initial core record. Call [`validate`] first.
    ///
    /// [`validate`]: CreateVisit::validate
    pub fn to_core(&self, id: Uuid, now: DateTime<Utc>) -> CoreRecord {
        CoreRecord {
            id,
            offline_id: self.offline_id.clone(),
            patient_id: self.patient_id.clone(),
            patient_name: self.patient_name.clone(),
            nurse_id: self.nurse_id.clone(),
            nurse_name: self.nurse_name.clone(),
            scheduled_time: self.scheduled_time.unwrap_or(now),
            start_time: None,
            end_time: None,
            status: VisitStatus::Planned,
            location: self.location.clone(),
            notes: self.notes.clone(),
            visit_type: self.visit_type.clone(),
            is_regulated: self.is_regulated.unwrap_or(false),
            requires_license: self.requires_license.unwrap_or(false),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload for interactive visit edits.
///
/// Lifecycle facts (`status`, `startTime`, `endTime`) are deliberately not
/// part of this struct; they change only through the state machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct UpdateVisit {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub nurse_id: Option<String>,
    pub nurse_name: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub visit_type: Option<String>,
    pub is_regulated: Option<bool>,
    pub requires_license: Option<bool>,
}

impl UpdateVisit {
    /// Overwrite present fields on the core record; absent fields are left
    /// untouched.
    pub fn apply_to(&self, core: &mut CoreRecord, now: DateTime<Utc>) {
        if let Some(v) = &self.patient_id {
            core.patient_id = v.clone();
        }
        if let Some(v) = &self.patient_name {
            core.patient_name = Some(v.clone());
        }
        if let Some(v) = &self.nurse_id {
            core.nurse_id = v.clone();
        }
        if let Some(v) = &self.nurse_name {
            core.nurse_name = Some(v.clone());
        }
        if let Some(v) = self.scheduled_time {
            core.scheduled_time = v;
        }
        if let Some(v) = &self.location {
            core.location = Some(v.clone());
        }
        if let Some(v) = &self.notes {
            core.notes = Some(v.clone());
        }
        if let Some(v) = &self.visit_type {
            core.visit_type = Some(v.clone());
        }
        if let Some(v) = self.is_regulated {
            core.is_regulated = v;
        }
        if let Some(v) = self.requires_license {
            core.requires_license = v;
        }
        core.updated_at = now;
    }

    pub fn is_empty(&self) -> bool {
        self.patient_id.is_none()
            && self.patient_name.is_none()
            && self.nurse_id.is_none()
            && self.nurse_name.is_none()
            && self.scheduled_time.is_none()
            && self.location.is_none()
            && self.notes.is_none()
            && self.visit_type.is_none()
            && self.is_regulated.is_none()
            && self.requires_license.is_none()
    }
}

/// Partial update of the extended record. Fields absent from the patch are
/// left untouched; the task ledger and photo array are wholesale-replaced
/// when provided.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ExtendedPatch {
    pub task_completions: Option<Vec<TaskCompletion>>,
    pub vital_signs: Option<JsonValue>,
    pub photos: Option<Vec<String>>,
    pub audio_recording_path: Option<String>,
    pub sync_status: Option<SyncStatus>,
    pub device_id: Option<String>,
    pub sync_timestamp: Option<DateTime<Utc>>,
}

/// One record in a device's sync batch.
///
/// A candidate may carry an `offlineId`, a server `id`, or both — a device
/// that created the record offline later learns its server id and resubmits
/// with both set. `status` is carried as a raw string because devices may
/// still emit the legacy vocabulary; it is normalized when applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct VisitCandidate {
    pub id: Option<Uuid>,
    pub offline_id: Option<String>,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub nurse_id: String,
    pub nurse_name: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub visit_type: Option<String>,
    pub is_regulated: Option<bool>,
    pub requires_license: Option<bool>,
    pub task_completions: Option<Vec<TaskCompletion>>,
    pub vital_signs: Option<JsonValue>,
    pub photos: Option<Vec<String>>,
    pub audio_recording_path: Option<String>,
}

impl VisitCandidate {
    /// Normalized status carried by the candidate, if any.
    pub fn parsed_status(&self) -> VisitResult<Option<VisitStatus>> {
        match &self.status {
            Some(raw) => Ok(Some(VisitStatus::parse(raw)?)),
            None => Ok(None),
        }
    }

    /// Check the fields a brand-new visit needs.
    pub fn validate_for_create(&self) -> VisitResult<()> {
        let mut missing = Vec::new();
        if self.patient_id.trim().is_empty() {
            missing.push("patientId");
        }
        if self.nurse_id.trim().is_empty() {
            missing.push("nurseId");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(VisitError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Extended-record patch carried by this candidate, if it has any
    /// extended payload at all.
    pub fn extended_patch(&self) -> Option<ExtendedPatch> {
        if self.task_completions.is_none()
            && self.vital_signs.is_none()
            && self.photos.is_none()
            && self.audio_recording_path.is_none()
        {
            return None;
        }

        Some(ExtendedPatch {
            task_completions: self.task_completions.clone(),
            vital_signs: self.vital_signs.clone(),
            photos: self.photos.clone(),
            audio_recording_path: self.audio_recording_path.clone(),
            ..ExtendedPatch::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validate_names_missing_fields() {
        let create = CreateVisit::default();
        let err = create.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("patientId"));
        assert!(msg.contains("nurseId"));
        assert!(msg.contains("scheduledTime"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{"patientId": "p1", "nurseId": "n1", "role": "admin"}"#;
        let parsed: Result<UpdateVisit, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_update_cannot_carry_status() {
        // status is lifecycle-owned; the allow-list must reject it
        let json = r#"{"status": "completed"}"#;
        let parsed: Result<UpdateVisit, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_update_apply_leaves_absent_fields() {
        let now = Utc::now();
        let create = CreateVisit {
            patient_id: "p1".into(),
            nurse_id: "n1".into(),
            scheduled_time: Some(now),
            location: Some("12 Elm St".into()),
            ..CreateVisit::default()
        };
        let mut core = create.to_core(Uuid::new_v4(), now);

        let update = UpdateVisit {
            nurse_name: Some("Ada Gray".into()),
            ..UpdateVisit::default()
        };
        update.apply_to(&mut core, now);

        assert_eq!(core.nurse_name.as_deref(), Some("Ada Gray"));
        assert_eq!(core.location.as_deref(), Some("12 Elm St"));
        assert_eq!(core.status, VisitStatus::Planned);
    }

    #[test]
    fn test_candidate_status_normalization() {
        let candidate = VisitCandidate {
            status: Some("finished".into()),
            ..VisitCandidate::default()
        };
        assert_eq!(
            candidate.parsed_status().unwrap(),
            Some(VisitStatus::Completed)
        );

        let bad = VisitCandidate {
            status: Some("archived".into()),
            ..VisitCandidate::default()
        };
        assert!(bad.parsed_status().is_err());
    }

    #[test]
    fn test_candidate_extended_patch_presence() {
        let bare = VisitCandidate::default();
        assert!(bare.extended_patch().is_none());

        let with_tasks = VisitCandidate {
            task_completions: Some(vec![]),
            ..VisitCandidate::default()
        };
        assert!(with_tasks.extended_patch().is_some());
    }
}
