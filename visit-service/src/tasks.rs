//! Task-completion ledger operations.
//!
//! Each mutation is a read-modify-write scoped to a single task entry,
//! guarded by the extended record's optimistic version and retried on
//! conflict — two actors completing different tasks on the same visit do
//! not clobber each other.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use error_common::{VisitError, VisitResult};
use tracing::debug;
use uuid::Uuid;

use visit_model::{Actor, ExtendedPatch, TaskCompletion, TaskStats};
use visit_store::{ExtendedStore, StoreError};

/// Retries before a version conflict is surfaced to the caller.
const VERSION_RETRY_LIMIT: u32 = 3;

/// Ledger operations over one visit's extended record.
pub struct TaskLedger {
    extended: Arc<dyn ExtendedStore>,
}

impl TaskLedger {
    pub fn new(extended: Arc<dyn ExtendedStore>) -> Self {
        Self { extended }
    }

    /// Append entries to the ledger.
    ///
    /// # Errors
    ///
    /// [`VisitError::DuplicateTask`] when any task id in the batch already
    /// exists in the ledger (or repeats within the batch); nothing is
    /// applied in that case.
    pub async fn add_tasks(
        &self,
        visit_id: Uuid,
        new_tasks: Vec<TaskCompletion>,
    ) -> VisitResult<Vec<TaskCompletion>> {
        if new_tasks.is_empty() {
            return Err(VisitError::Validation("no tasks provided".to_string()));
        }

        for attempt in 0..VERSION_RETRY_LIMIT {
            let existing = self
                .extended
                .find(visit_id)
                .await
                .map_err(ledger_store_err)?;

            let (current, version) = match &existing {
                Some(record) => (record.task_completions.clone(), Some(record.version)),
                None => (Vec::new(), None),
            };

            check_no_duplicates(&current, &new_tasks)?;

            let mut merged = current;
            merged.extend(new_tasks.iter().cloned());

            let result = match version {
                Some(v) => self.extended.replace_tasks(visit_id, merged, v).await,
                // first ledger write also creates the extended record
                None => {
                    self.extended
                        .upsert(
                            visit_id,
                            &ExtendedPatch {
                                task_completions: Some(merged),
                                ..ExtendedPatch::default()
                            },
                        )
                        .await
                }
            };

            match result {
                Ok(record) => return Ok(record.task_completions),
                Err(StoreError::VersionConflict) => {
                    debug!(visit_id = %visit_id, attempt = attempt + 1, "Ledger write conflict, retrying");
                }
                Err(e) => return Err(ledger_store_err(e)),
            }
        }

        Err(VisitError::StoreFailure(
            "ledger update exhausted version-conflict retries".to_string(),
        ))
    }

    /// Mark one task completed by `actor`.
    ///
    /// # Errors
    ///
    /// [`VisitError::TaskNotFound`] when `task_id` is absent from the
    /// ledger.
    pub async fn complete_task(
        &self,
        visit_id: Uuid,
        task_id: &str,
        actor: &Actor,
        notes: Option<&str>,
    ) -> VisitResult<TaskCompletion> {
        let actor = actor.clone();
        let notes = notes.map(String::from);
        self.modify_task(visit_id, task_id, move |task| {
            task.mark_completed(actor.clone(), Utc::now(), notes.as_deref());
        })
        .await
    }

    /// Revert one task to not-completed, appending `reason` to its notes.
    ///
    /// # Errors
    ///
    /// [`VisitError::TaskNotFound`] when `task_id` is absent from the
    /// ledger.
    pub async fn uncomplete_task(
        &self,
        visit_id: Uuid,
        task_id: &str,
        reason: Option<&str>,
    ) -> VisitResult<TaskCompletion> {
        let reason = reason.map(String::from);
        self.modify_task(visit_id, task_id, move |task| {
            task.mark_uncompleted(reason.as_deref());
        })
        .await
    }

    /// Aggregate completion statistics. A visit without extended data has
    /// an empty ledger and reports zeros.
    pub async fn stats(&self, visit_id: Uuid) -> VisitResult<TaskStats> {
        let record = self
            .extended
            .find(visit_id)
            .await
            .map_err(ledger_store_err)?;

        let tasks = record.map(|r| r.task_completions).unwrap_or_default();
        Ok(TaskStats::for_tasks(&tasks))
    }

    /// Read-modify-write of a single ledger entry under the version guard.
    async fn modify_task<F>(
        &self,
        visit_id: Uuid,
        task_id: &str,
        mutate: F,
    ) -> VisitResult<TaskCompletion>
    where
        F: Fn(&mut TaskCompletion),
    {
        for attempt in 0..VERSION_RETRY_LIMIT {
            let record = self
                .extended
                .find(visit_id)
                .await
                .map_err(ledger_store_err)?
                .ok_or_else(|| VisitError::TaskNotFound(task_id.to_string()))?;

            let version = record.version;
            let mut tasks = record.task_completions;
            let task = tasks
                .iter_mut()
                .find(|t| t.task_id == task_id)
                .ok_or_else(|| VisitError::TaskNotFound(task_id.to_string()))?;

            mutate(task);
            let updated = task.clone();

            match self.extended.replace_tasks(visit_id, tasks, version).await {
                Ok(_) => return Ok(updated),
                Err(StoreError::VersionConflict) => {
                    debug!(visit_id = %visit_id, task_id, attempt = attempt + 1, "Ledger write conflict, retrying");
                }
                Err(e) => return Err(ledger_store_err(e)),
            }
        }

        Err(VisitError::StoreFailure(
            "ledger update exhausted version-conflict retries".to_string(),
        ))
    }
}

/// Duplicate check over the existing ledger plus the inbound batch.
fn check_no_duplicates(
    current: &[TaskCompletion],
    incoming: &[TaskCompletion],
) -> VisitResult<()> {
    let existing: HashSet<&str> = current.iter().map(|t| t.task_id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicates = Vec::new();

    for task in incoming {
        let id = task.task_id.as_str();
        if existing.contains(id) || !seen.insert(id) {
            duplicates.push(id.to_string());
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(VisitError::DuplicateTask {
            task_ids: duplicates,
        })
    }
}

fn ledger_store_err(e: StoreError) -> VisitError {
    VisitError::StoreFailure(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use visit_model::TaskPriority;
    use visit_store::MemoryExtendedStore;

    fn actor() -> Actor {
        Actor {
            user_id: "nurse-1".into(),
            user_name: "Ada Gray".into(),
        }
    }

    fn ledger() -> TaskLedger {
        TaskLedger::new(Arc::new(MemoryExtendedStore::new()))
    }

    #[tokio::test]
    async fn test_add_tasks_creates_extended_record() {
        let ledger = ledger();
        let visit_id = Uuid::new_v4();
        let tasks = vec![
            TaskCompletion::new("t1", "Vitals", TaskPriority::High),
            TaskCompletion::new("t2", "Tidy up", TaskPriority::Low),
        ];

        let stored = ledger.add_tasks(visit_id, tasks).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_add_tasks_rejects_duplicates_without_partial_apply() {
        let ledger = ledger();
        let visit_id = Uuid::new_v4();
        ledger
            .add_tasks(
                visit_id,
                vec![TaskCompletion::new("t1", "Vitals", TaskPriority::High)],
            )
            .await
            .unwrap();

        let batch = vec![
            TaskCompletion::new("t2", "New task", TaskPriority::Low),
            TaskCompletion::new("t1", "Duplicate", TaskPriority::Low),
        ];
        let err = ledger.add_tasks(visit_id, batch).await.unwrap_err();
        match err {
            VisitError::DuplicateTask { task_ids } => assert_eq!(task_ids, vec!["t1"]),
            other => panic!("expected DuplicateTask, got {other:?}"),
        }

        // t2 must not have been applied
        let stats = ledger.stats(visit_id).await.unwrap();
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn test_add_tasks_rejects_duplicates_within_batch() {
        let ledger = ledger();
        let batch = vec![
            TaskCompletion::new("t1", "a", TaskPriority::Low),
            TaskCompletion::new("t1", "b", TaskPriority::Low),
        ];
        let err = ledger.add_tasks(Uuid::new_v4(), batch).await.unwrap_err();
        assert!(matches!(err, VisitError::DuplicateTask { .. }));
    }

    #[tokio::test]
    async fn test_complete_and_uncomplete_round_trip() {
        let ledger = ledger();
        let visit_id = Uuid::new_v4();
        ledger
            .add_tasks(
                visit_id,
                vec![TaskCompletion::new("t1", "Vitals", TaskPriority::High)],
            )
            .await
            .unwrap();

        let done = ledger
            .complete_task(visit_id, "t1", &actor(), Some("all normal"))
            .await
            .unwrap();
        assert!(done.completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.completed_by.as_ref().unwrap().user_id, "nurse-1");

        let undone = ledger
            .uncomplete_task(visit_id, "t1", Some("entered in error"))
            .await
            .unwrap();
        assert!(!undone.completed);
        assert!(undone.completed_at.is_none());
        assert!(undone.completed_by.is_none());
        assert_eq!(
            undone.notes.as_deref(),
            Some("all normal\nentered in error")
        );
    }

    #[tokio::test]
    async fn test_complete_unknown_task() {
        let ledger = ledger();
        let visit_id = Uuid::new_v4();
        ledger
            .add_tasks(
                visit_id,
                vec![TaskCompletion::new("t1", "Vitals", TaskPriority::High)],
            )
            .await
            .unwrap();

        let err = ledger
            .complete_task(visit_id, "t9", &actor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitError::TaskNotFound(id) if id == "t9"));
    }

    #[tokio::test]
    async fn test_stats_without_extended_record() {
        let ledger = ledger();
        let stats = ledger.stats(Uuid::new_v4()).await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.percentage, 0);
    }

    #[tokio::test]
    async fn test_concurrent_completions_do_not_clobber() {
        let store = Arc::new(MemoryExtendedStore::new());
        let ledger = TaskLedger::new(store.clone());
        let visit_id = Uuid::new_v4();
        ledger
            .add_tasks(
                visit_id,
                vec![
                    TaskCompletion::new("t1", "Vitals", TaskPriority::High),
                    TaskCompletion::new("t2", "Medication", TaskPriority::High),
                ],
            )
            .await
            .unwrap();

        let a = TaskLedger::new(store.clone());
        let b = TaskLedger::new(store.clone());
        let actor_a = actor();
        let actor_b = actor();
        let (ra, rb) = tokio::join!(
            a.complete_task(visit_id, "t1", &actor_a, None),
            b.complete_task(visit_id, "t2", &actor_b, None),
        );
        ra.unwrap();
        rb.unwrap();

        let stats = ledger.stats(visit_id).await.unwrap();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.percentage, 100);
    }
}
