use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codes;

/// Reference to a task blocking the `completed` transition.
///
/// Carried inside [`VisitError::IncompleteRequiredTasks`] so the caller can
/// present the offending tasks to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredTaskRef {
    pub task_id: String,
    pub task_title: String,
    pub priority: String,
}

/// Error taxonomy for visit record operations
#[derive(Error, Debug)]
pub enum VisitError {
    /// No visit record for the given identity
    #[error("Visit not found: {0}")]
    NotFound(String),

    /// Missing or malformed required input fields
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Lifecycle gate violation
    #[error("Invalid status transition from '{from}' via '{attempted}'")]
    InvalidTransition { from: String, attempted: String },

    /// Completion gate violation; carries the offending tasks
    #[error("{} required task(s) incomplete", tasks.len())]
    IncompleteRequiredTasks { tasks: Vec<RequiredTaskRef> },

    /// Task id not present in the visit's ledger
    #[error("Task not found in ledger: {0}")]
    TaskNotFound(String),

    /// Task id already present in the visit's ledger
    #[error("Duplicate task id(s) in ledger: {}", task_ids.join(", "))]
    DuplicateTask { task_ids: Vec<String> },

    /// Offline id and server id resolve to different records
    #[error("Identity conflict: offlineId '{offline_id}' and id '{id}' resolve to different visits")]
    IdentityConflict { offline_id: String, id: String },

    /// Extended store failed after the core operation committed
    #[error("Extended store degraded: {0}")]
    ExtendedStoreDegraded(String),

    /// Core store failure, fatal to the enclosing write
    #[error("Store failure: {0}")]
    StoreFailure(String),

    /// Wrapped internal errors
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl VisitError {
    /// Stable machine-readable code for this error (see [`codes`]).
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => codes::visit::NOT_FOUND,
            Self::Validation(_) => codes::visit::VALIDATION_FAILED,
            Self::InvalidTransition { .. } => codes::lifecycle::INVALID_TRANSITION,
            Self::IncompleteRequiredTasks { .. } => codes::lifecycle::INCOMPLETE_REQUIRED_TASKS,
            Self::TaskNotFound(_) => codes::task::TASK_NOT_FOUND,
            Self::DuplicateTask { .. } => codes::task::DUPLICATE_TASK,
            Self::IdentityConflict { .. } => codes::sync::IDENTITY_CONFLICT,
            Self::ExtendedStoreDegraded(_) => codes::store::EXTENDED_DEGRADED,
            Self::StoreFailure(_) | Self::Internal(_) => codes::store::STORE_FAILURE,
        }
    }

    /// Serializable payload for per-record sync outcomes and API responses.
    pub fn to_detail(&self) -> ErrorDetail {
        let context = match self {
            Self::IncompleteRequiredTasks { tasks } => {
                serde_json::to_value(tasks).ok()
            }
            Self::DuplicateTask { task_ids } => serde_json::to_value(task_ids).ok(),
            _ => None,
        };

        ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
            context,
        }
    }
}

/// Wire representation of an error: stable code, message, optional context
/// (e.g. the offending task ids for a gate violation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Result type alias for visit operations
pub type VisitResult<T> = std::result::Result<T, VisitError>;

/// Log an error with its stable code attached.
pub fn log_error(context: &str, error: &VisitError) {
    tracing::error!(
        context = context,
        error_code = error.code(),
        error = %error,
        "Visit operation failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(VisitError::NotFound("v1".into()).code(), "VISIT_1001");
        assert_eq!(
            VisitError::IdentityConflict {
                offline_id: "o1".into(),
                id: "i1".into()
            }
            .code(),
            "SYNC_4001"
        );
        assert_eq!(
            VisitError::ExtendedStoreDegraded("timeout".into()).code(),
            "STORE_5001"
        );
    }

    #[test]
    fn test_incomplete_tasks_detail_carries_context() {
        let err = VisitError::IncompleteRequiredTasks {
            tasks: vec![RequiredTaskRef {
                task_id: "t1".into(),
                task_title: "Check vitals".into(),
                priority: "critical".into(),
            }],
        };

        let detail = err.to_detail();
        assert_eq!(detail.code, "LIFECYCLE_2002");
        let ctx = detail.context.unwrap();
        assert_eq!(ctx[0]["taskId"], "t1");
        assert_eq!(ctx[0]["priority"], "critical");
    }

    #[test]
    fn test_detail_serializes_camel_case() {
        let detail = VisitError::TaskNotFound("t9".into()).to_detail();
        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains(r#""code":"TASK_3001""#));
        assert!(!json.contains("context"));
    }
}
