use chrono::{DateTime, Utc};
use error_common::{VisitError, VisitResult};
use serde::{Deserialize, Serialize};

use crate::visit::Actor;

/// Task priority. `High` and `Critical` tasks gate the `completed`
/// lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Required tasks must be completed before the visit may finish.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// One entry in a visit's task-completion ledger.
///
/// Invariants:
/// - `completed == true` implies `completed_at` and `completed_by` are set;
///   `completed == false` implies both are cleared. Use [`mark_completed`]
///   and [`mark_uncompleted`] rather than mutating fields directly.
/// - `task_id` is unique within a single visit's ledger (enforced by the
///   ledger operations, not by this type).
///
/// [`mark_completed`]: TaskCompletion::mark_completed
/// [`mark_uncompleted`]: TaskCompletion::mark_uncompleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    pub task_id: String,
    pub task_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_category: Option<String>,
    pub priority: TaskPriority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TaskCompletion {
    /// New, not-yet-completed ledger entry.
    pub fn new(task_id: impl Into<String>, task_title: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            task_id: task_id.into(),
            task_title: task_title.into(),
            task_category: None,
            priority,
            completed: false,
            completed_at: None,
            completed_by: None,
            notes: None,
        }
    }

    /// Mark the task completed by `actor` at `at`, optionally appending a
    /// note. Prior notes are preserved.
    pub fn mark_completed(&mut self, actor: Actor, at: DateTime<Utc>, notes: Option<&str>) {
        self.completed = true;
        self.completed_at = Some(at);
        self.completed_by = Some(actor);
        if let Some(text) = notes {
            append_note(&mut self.notes, text);
        }
    }

    /// Revert the task to not-completed, appending `reason` to the notes
    /// rather than discarding them.
    pub fn mark_uncompleted(&mut self, reason: Option<&str>) {
        self.completed = false;
        self.completed_at = None;
        self.completed_by = None;
        if let Some(text) = reason {
            append_note(&mut self.notes, text);
        }
    }

    /// A required task blocks visit completion while incomplete.
    pub fn blocks_completion(&self) -> bool {
        self.priority.is_required() && !self.completed
    }
}

/// Validate a caller-supplied ledger before it is persisted.
///
/// Enforces both [`TaskCompletion`] invariants: task ids must be unique
/// within the ledger, and every entry must be internally consistent
/// (`completed` entries carry `completedAt` and `completedBy`; open entries
/// carry neither). Device uploads pass through here as well as interactive
/// creates, so a malformed entry can never enter a ledger by either path.
///
/// # Errors
///
/// - [`VisitError::DuplicateTask`] listing every repeated task id.
/// - [`VisitError::Validation`] naming the first entry that breaks the
///   completion invariant.
pub fn validate_ledger(tasks: &[TaskCompletion]) -> VisitResult<()> {
    let mut seen = std::collections::HashSet::new();
    let duplicates: Vec<String> = tasks
        .iter()
        .filter(|t| !seen.insert(t.task_id.as_str()))
        .map(|t| t.task_id.clone())
        .collect();
    if !duplicates.is_empty() {
        return Err(VisitError::DuplicateTask {
            task_ids: duplicates,
        });
    }

    for task in tasks {
        let consistent = if task.completed {
            task.completed_at.is_some() && task.completed_by.is_some()
        } else {
            task.completed_at.is_none() && task.completed_by.is_none()
        };
        if !consistent {
            return Err(VisitError::Validation(format!(
                "task '{}' breaks the completion invariant: completed={} \
                 with completedAt {} and completedBy {}",
                task.task_id,
                task.completed,
                if task.completed_at.is_some() { "set" } else { "unset" },
                if task.completed_by.is_some() { "set" } else { "unset" },
            )));
        }
    }

    Ok(())
}

/// Append a line to a free-text notes field, never overwriting prior text.
pub fn append_note(notes: &mut Option<String>, line: &str) {
    match notes {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(line);
        }
        None => *notes = Some(line.to_string()),
    }
}

/// Aggregate completion statistics over one visit's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub percentage: u32,
}

impl TaskStats {
    /// `percentage` is round(100 * completed / total), and 0 for an empty
    /// ledger rather than a division error.
    pub fn for_tasks(tasks: &[TaskCompletion]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        let percentage = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };

        Self {
            total,
            completed,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> Actor {
        Actor {
            user_id: "nurse-1".into(),
            user_name: "Ada Gray".into(),
        }
    }

    #[test]
    fn test_completion_invariant_holds() {
        let mut task = TaskCompletion::new("t1", "Medication check", TaskPriority::High);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        assert!(task.completed_by.is_none());

        task.mark_completed(actor(), Utc::now(), Some("done at bedside"));
        assert!(task.completed);
        assert!(task.completed_at.is_some());
        assert!(task.completed_by.is_some());
        assert_eq!(task.notes.as_deref(), Some("done at bedside"));

        task.mark_uncompleted(Some("logged against wrong patient"));
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        assert!(task.completed_by.is_none());
        // reason appended, prior note preserved
        assert_eq!(
            task.notes.as_deref(),
            Some("done at bedside\nlogged against wrong patient")
        );
    }

    #[test]
    fn test_required_priorities_gate() {
        assert!(TaskPriority::High.is_required());
        assert!(TaskPriority::Critical.is_required());
        assert!(!TaskPriority::Medium.is_required());
        assert!(!TaskPriority::Low.is_required());

        let task = TaskCompletion::new("t1", "Wound care", TaskPriority::Critical);
        assert!(task.blocks_completion());

        let low = TaskCompletion::new("t2", "Tidy up", TaskPriority::Low);
        assert!(!low.blocks_completion());
    }

    #[test]
    fn test_stats_rounding() {
        let mut tasks = vec![
            TaskCompletion::new("t1", "a", TaskPriority::Low),
            TaskCompletion::new("t2", "b", TaskPriority::Low),
            TaskCompletion::new("t3", "c", TaskPriority::Low),
        ];
        tasks[0].mark_completed(actor(), Utc::now(), None);

        let stats = TaskStats::for_tasks(&tasks);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        // 33.33 rounds to 33
        assert_eq!(stats.percentage, 33);

        tasks[1].mark_completed(actor(), Utc::now(), None);
        let stats = TaskStats::for_tasks(&tasks);
        // 66.67 rounds to 67
        assert_eq!(stats.percentage, 67);
    }

    #[test]
    fn test_stats_empty_ledger_is_zero() {
        let stats = TaskStats::for_tasks(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.percentage, 0);
    }

    #[test]
    fn test_validate_ledger_rejects_duplicate_ids() {
        let tasks = vec![
            TaskCompletion::new("t1", "Vitals", TaskPriority::High),
            TaskCompletion::new("t2", "Tidy up", TaskPriority::Low),
            TaskCompletion::new("t1", "Vitals again", TaskPriority::Low),
        ];
        let err = validate_ledger(&tasks).unwrap_err();
        match err {
            VisitError::DuplicateTask { task_ids } => assert_eq!(task_ids, vec!["t1"]),
            other => panic!("expected DuplicateTask, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_ledger_rejects_inconsistent_completion() {
        // completed without timestamps
        let mut bare = TaskCompletion::new("t1", "Vitals", TaskPriority::High);
        bare.completed = true;
        let err = validate_ledger(std::slice::from_ref(&bare)).unwrap_err();
        assert!(matches!(err, VisitError::Validation(_)));
        assert!(err.to_string().contains("t1"));

        // open entry with a stale timestamp
        let mut stale = TaskCompletion::new("t2", "Medication", TaskPriority::High);
        stale.completed_at = Some(Utc::now());
        assert!(validate_ledger(std::slice::from_ref(&stale)).is_err());
    }

    #[test]
    fn test_validate_ledger_accepts_consistent_entries() {
        let mut done = TaskCompletion::new("t1", "Vitals", TaskPriority::High);
        done.mark_completed(actor(), Utc::now(), None);
        let open = TaskCompletion::new("t2", "Tidy up", TaskPriority::Low);
        assert!(validate_ledger(&[done, open]).is_ok());
    }

    #[test]
    fn test_serde_camel_case() {
        let task = TaskCompletion::new("t1", "Vitals", TaskPriority::Critical);
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains(r#""taskId":"t1""#));
        assert!(json.contains(r#""priority":"critical""#));
        assert!(!json.contains("completedAt"));
    }
}
