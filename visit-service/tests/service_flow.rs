//! End-to-end flows over the in-memory stores, including degraded
//! extended-store behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use error_common::VisitError;
use visit_model::{
    Actor, CreateVisit, ExtendedPatch, ExtendedRecord, PaginationParams, SyncStatus,
    TaskCompletion, TaskPriority, UpdateVisit, VisitStatus,
};
use visit_service::VisitService;
use visit_store::{
    ExtendedStore, MemoryCoreStore, MemoryExtendedStore, StoreError, StoreResult,
};

/// Extended store wrapper that fails on demand, simulating an unreachable
/// document store.
struct FlakyExtendedStore {
    inner: MemoryExtendedStore,
    fail: AtomicBool,
}

impl FlakyExtendedStore {
    fn new() -> Self {
        Self {
            inner: MemoryExtendedStore::new(),
            fail: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ExtendedStore for FlakyExtendedStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<ExtendedRecord>> {
        self.check()?;
        self.inner.find(id).await
    }

    async fn upsert(&self, id: Uuid, patch: &ExtendedPatch) -> StoreResult<ExtendedRecord> {
        self.check()?;
        self.inner.upsert(id, patch).await
    }

    async fn replace_tasks(
        &self,
        id: Uuid,
        tasks: Vec<TaskCompletion>,
        expected_version: i64,
    ) -> StoreResult<ExtendedRecord> {
        self.check()?;
        self.inner.replace_tasks(id, tasks, expected_version).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(id).await
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn actor() -> Actor {
    Actor {
        user_id: "nurse-1".into(),
        user_name: "Ada Gray".into(),
    }
}

fn service() -> VisitService {
    init_tracing();
    VisitService::new(
        Arc::new(MemoryCoreStore::new()),
        Arc::new(MemoryExtendedStore::new()),
    )
}

fn flaky_service() -> (VisitService, Arc<FlakyExtendedStore>) {
    init_tracing();
    let flaky = Arc::new(FlakyExtendedStore::new());
    let service = VisitService::new(Arc::new(MemoryCoreStore::new()), flaky.clone());
    (service, flaky)
}

fn create_input(tasks: Option<Vec<TaskCompletion>>) -> CreateVisit {
    CreateVisit {
        patient_id: "patient-7".into(),
        patient_name: Some("Rosa Vance".into()),
        nurse_id: "nurse-1".into(),
        nurse_name: Some("Ada Gray".into()),
        scheduled_time: Some(Utc::now()),
        location: Some("12 Elm St".into()),
        task_completions: tasks,
        ..CreateVisit::default()
    }
}

#[tokio::test]
async fn required_task_gates_completion_round_trip() {
    let service = service();
    let tasks = vec![TaskCompletion::new("t1", "Wound care", TaskPriority::High)];
    let visit = service.create_visit(create_input(Some(tasks))).await.unwrap();
    assert_eq!(visit.status, VisitStatus::Planned);
    assert!(visit.extended_available);

    service.start_visit(visit.id, &actor()).await.unwrap();

    // completion blocked while the high-priority task is open
    let err = service.complete_visit(visit.id, &actor()).await.unwrap_err();
    match err {
        VisitError::IncompleteRequiredTasks { tasks } => {
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].task_id, "t1");
        }
        other => panic!("expected IncompleteRequiredTasks, got {other:?}"),
    }

    service
        .complete_task(visit.id, "t1", &actor(), None)
        .await
        .unwrap();
    let completed = service.complete_visit(visit.id, &actor()).await.unwrap();

    assert_eq!(completed.status, VisitStatus::Completed);
    assert!(completed.end_time.is_some());

    // audit trail: one note per transition, appended in order
    let notes = completed.notes.unwrap();
    let lines: Vec<&str> = notes.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("inProgress"));
    assert!(lines[1].contains("completed"));
    assert!(lines[1].contains("Ada Gray"));
}

#[tokio::test]
async fn visit_without_tasks_is_always_completable() {
    let service = service();
    let visit = service.create_visit(create_input(None)).await.unwrap();

    service.start_visit(visit.id, &actor()).await.unwrap();
    let completed = service.complete_visit(visit.id, &actor()).await.unwrap();
    assert_eq!(completed.status, VisitStatus::Completed);
}

#[tokio::test]
async fn terminal_visit_rejects_further_transitions() {
    let service = service();
    let visit = service.create_visit(create_input(None)).await.unwrap();
    service.cancel_visit(visit.id, &actor()).await.unwrap();

    let err = service.start_visit(visit.id, &actor()).await.unwrap_err();
    assert!(matches!(err, VisitError::InvalidTransition { .. }));
}

#[tokio::test]
async fn change_status_accepts_legacy_vocabulary() {
    let service = service();
    let visit = service.create_visit(create_input(None)).await.unwrap();

    let started = service
        .change_status(visit.id, "in-progress", &actor())
        .await
        .unwrap();
    assert_eq!(started.status, VisitStatus::InProgress);

    let finished = service
        .change_status(visit.id, "finished", &actor())
        .await
        .unwrap();
    assert_eq!(finished.status, VisitStatus::Completed);
}

#[tokio::test]
async fn degraded_extended_write_does_not_fail_create() {
    let (service, flaky) = flaky_service();
    flaky.set_failing(true);

    let tasks = vec![TaskCompletion::new("t1", "Vitals", TaskPriority::High)];
    let visit = service.create_visit(create_input(Some(tasks))).await.unwrap();

    // core fact committed, extended data reported absent
    assert!(!visit.extended_available);
    assert!(visit.task_completions.is_empty());

    flaky.set_failing(false);
    let fetched = service.get_by_id(visit.id).await.unwrap();
    assert_eq!(fetched.id, visit.id);
}

#[tokio::test]
async fn degraded_extended_read_serves_core_view() {
    let (service, flaky) = flaky_service();
    let visit = service.create_visit(create_input(None)).await.unwrap();

    flaky.set_failing(true);
    let view = service.get_by_id(visit.id).await.unwrap();
    assert!(!view.extended_available);
    assert!(view.sync_status.is_none());
    assert_eq!(view.patient_id, "patient-7");
}

#[tokio::test]
async fn delete_with_failing_extended_store_still_removes_core() {
    let (service, flaky) = flaky_service();
    let visit = service.create_visit(create_input(None)).await.unwrap();

    flaky.set_failing(true);
    service.delete_visit(visit.id).await.unwrap();

    flaky.set_failing(false);
    let err = service.get_by_id(visit.id).await.unwrap_err();
    assert!(matches!(err, VisitError::NotFound(_)));
}

#[tokio::test]
async fn delete_unknown_visit_is_not_found() {
    let service = service();
    let err = service.delete_visit(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, VisitError::NotFound(_)));
}

#[tokio::test]
async fn update_overwrites_only_present_fields() {
    let service = service();
    let visit = service.create_visit(create_input(None)).await.unwrap();

    let updated = service
        .update_visit(
            visit.id,
            UpdateVisit {
                nurse_name: Some("Bo Lindgren".into()),
                ..UpdateVisit::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.nurse_name.as_deref(), Some("Bo Lindgren"));
    assert_eq!(updated.location.as_deref(), Some("12 Elm St"));
    assert_eq!(updated.status, VisitStatus::Planned);
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let service = service();
    let visit = service.create_visit(create_input(None)).await.unwrap();

    let err = service
        .update_visit(visit.id, UpdateVisit::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VisitError::Validation(_)));
}

#[tokio::test]
async fn listings_paginate_and_merge_extended_data() {
    let service = service();
    for _ in 0..3 {
        service.create_visit(create_input(None)).await.unwrap();
    }

    let params = PaginationParams {
        page: Some(1),
        limit: Some(2),
    };
    let page = service.list_by_patient("patient-7", &params).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 3);
    assert_eq!(page.pages, 2);
    assert!(page.items.iter().all(|v| v.extended_available));

    let by_nurse = service
        .list_by_nurse("nurse-1", &PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(by_nurse.total, 3);

    let today = Utc::now().date_naive();
    let for_date = service
        .list_for_date(today, &PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(for_date.total, 3);
}

#[tokio::test]
async fn task_stats_and_interactive_sync_status() {
    let service = service();
    let tasks = vec![
        TaskCompletion::new("t1", "Vitals", TaskPriority::High),
        TaskCompletion::new("t2", "Tidy up", TaskPriority::Low),
    ];
    let visit = service.create_visit(create_input(Some(tasks))).await.unwrap();
    assert_eq!(visit.sync_status, Some(SyncStatus::Synced));

    service
        .complete_task(visit.id, "t1", &actor(), None)
        .await
        .unwrap();

    let stats = service.task_stats(visit.id).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.percentage, 50);
}

#[tokio::test]
async fn encounter_projection_reflects_core_record() {
    let service = service();
    let visit = service.create_visit(create_input(None)).await.unwrap();
    service.start_visit(visit.id, &actor()).await.unwrap();

    let resource = service.get_encounter(visit.id).await.unwrap();
    assert_eq!(resource["resourceType"], "Encounter");
    assert_eq!(resource["status"], "in-progress");
    assert_eq!(resource["subject"]["reference"], "Patient/patient-7");
}

#[tokio::test]
async fn create_rejects_malformed_task_ledger() {
    let service = service();

    let duplicated = vec![
        TaskCompletion::new("t1", "Vitals", TaskPriority::High),
        TaskCompletion::new("t1", "Vitals again", TaskPriority::Low),
    ];
    let err = service
        .create_visit(create_input(Some(duplicated)))
        .await
        .unwrap_err();
    assert!(matches!(err, VisitError::DuplicateTask { .. }));

    // completed claimed without completedAt/completedBy
    let mut phantom = TaskCompletion::new("t1", "Vitals", TaskPriority::High);
    phantom.completed = true;
    let err = service
        .create_visit(create_input(Some(vec![phantom])))
        .await
        .unwrap_err();
    assert!(matches!(err, VisitError::Validation(_)));
}

#[tokio::test]
async fn ledger_operations_require_existing_visit() {
    let service = service();
    let err = service
        .add_tasks(
            Uuid::new_v4(),
            vec![TaskCompletion::new("t1", "Vitals", TaskPriority::High)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VisitError::NotFound(_)));
}
