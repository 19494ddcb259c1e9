//! Required-task completion gate.

use error_common::{RequiredTaskRef, VisitError, VisitResult};
use visit_model::TaskCompletion;

/// Check that no required (high/critical) task is still incomplete.
///
/// A visit with no tasks defined is always completable; the gate only
/// applies when a non-empty ledger exists.
///
/// # Errors
///
/// [`VisitError::IncompleteRequiredTasks`] carrying every offending task so
/// the caller can present them.
pub fn check_required_tasks(tasks: &[TaskCompletion]) -> VisitResult<()> {
    let blocking: Vec<RequiredTaskRef> = tasks
        .iter()
        .filter(|t| t.blocks_completion())
        .map(|t| RequiredTaskRef {
            task_id: t.task_id.clone(),
            task_title: t.task_title.clone(),
            priority: t.priority.as_str().to_string(),
        })
        .collect();

    if blocking.is_empty() {
        Ok(())
    } else {
        Err(VisitError::IncompleteRequiredTasks { tasks: blocking })
    }
}
