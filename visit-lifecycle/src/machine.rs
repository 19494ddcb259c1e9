use chrono::{DateTime, Utc};
use error_common::{VisitError, VisitResult};
use serde::{Deserialize, Serialize};
use visit_model::{Actor, CoreRecord, TaskCompletion, VisitStatus};

use crate::gate::check_required_tasks;

/// Lifecycle transitions exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transition {
    Start,
    Complete,
    Cancel,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }

    /// Status reached when the transition succeeds.
    pub fn target(&self) -> VisitStatus {
        match self {
            Self::Start => VisitStatus::InProgress,
            Self::Complete => VisitStatus::Completed,
            Self::Cancel => VisitStatus::Cancelled,
        }
    }
}

/// The lifecycle facts a successful transition produces. The caller
/// persists these through the core store; nothing is written here.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub status: VisitStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Audit line to append to the visit's notes.
    pub audit_note: String,
}

/// Validate a transition against the current core record and task ledger.
///
/// `tasks` is the visit's ledger, or an empty slice when no extended data
/// is available — the completion gate only applies to a non-empty ledger.
///
/// # Errors
///
/// - [`VisitError::InvalidTransition`] when the edge is not legal from the
///   current status (terminal states reject everything).
/// - [`VisitError::IncompleteRequiredTasks`] when `complete` is attempted
///   with required tasks still open.
pub fn plan_transition(
    core: &CoreRecord,
    transition: Transition,
    tasks: &[TaskCompletion],
    actor: &Actor,
    now: DateTime<Utc>,
) -> VisitResult<TransitionOutcome> {
    let legal = match transition {
        Transition::Start => core.status == VisitStatus::Planned,
        Transition::Complete => core.status == VisitStatus::InProgress,
        Transition::Cancel => !core.status.is_terminal(),
    };

    if !legal {
        return Err(VisitError::InvalidTransition {
            from: core.status.as_str().to_string(),
            attempted: transition.as_str().to_string(),
        });
    }

    if transition == Transition::Complete {
        check_required_tasks(tasks)?;
    }

    let status = transition.target();
    let start_time = match transition {
        // set on first start, never overwritten
        Transition::Start => core.start_time.or(Some(now)),
        _ => core.start_time,
    };
    let end_time = match transition {
        Transition::Complete => core.end_time.or(Some(now)),
        _ => core.end_time,
    };

    Ok(TransitionOutcome {
        status,
        start_time,
        end_time,
        audit_note: audit_note(actor, now, status),
    })
}

/// Map a requested target status onto the transition that reaches it, for
/// the generic `changeStatus` operation.
///
/// # Errors
///
/// [`VisitError::InvalidTransition`] when no legal edge reaches `target`
/// from `current` (including `planned`, which is only ever an initial
/// state).
pub fn transition_for_target(
    current: VisitStatus,
    target: VisitStatus,
) -> VisitResult<Transition> {
    match target {
        VisitStatus::InProgress => Ok(Transition::Start),
        VisitStatus::Completed => Ok(Transition::Complete),
        VisitStatus::Cancelled => Ok(Transition::Cancel),
        VisitStatus::Planned => Err(VisitError::InvalidTransition {
            from: current.as_str().to_string(),
            attempted: "planned".to_string(),
        }),
    }
}

/// Audit line recorded on every transition: actor, timestamp, resulting
/// status.
fn audit_note(actor: &Actor, at: DateTime<Utc>, status: VisitStatus) -> String {
    format!(
        "[{}] status changed to {} by {} ({})",
        at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        status.as_str(),
        actor.user_name,
        actor.user_id
    )
}
