mod common;

use std::sync::Arc;

use chrono::Duration;
use followup_dispatcher::{DeferredJobRunner, RetryService};
use followup_domain::entities::{retry_check_key, JobStatus, LeadStatus, NewDeferredJob, TaskStatus};
use followup_domain::repositories::DeferredJobRepository;
use followup_testing_utils::{at, FailPoint, TaskBuilder};

use common::Harness;

fn runner(h: &Harness) -> DeferredJobRunner {
    let retry: Arc<dyn RetryService> = Arc::new(h.retry_service());
    DeferredJobRunner::new(h.store.clone(), h.store.clone(), retry, h.clock.clone(), 10)
}

#[tokio::test]
async fn test_job_runs_only_after_due_time() {
    let h = Harness::new();
    h.seed_lead(1);
    let task = h.seed_unreached_task(10, 1, 1);
    h.store
        .enqueue(&NewDeferredJob::retry_check(&task, 1, at(2024, 3, 2, 0, 0)))
        .await
        .unwrap();

    let report = runner(&h).run_due_jobs().await.unwrap();
    assert_eq!(report.claimed, 0);

    h.clock.advance(Duration::days(1));
    let report = runner(&h).run_due_jobs().await.unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.completed, 1);

    assert_eq!(h.store.children_of(10).len(), 1);
    let job = h
        .store
        .find_by_key(&retry_check_key(1, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.attempts, 1);

    // 新重试任务的检查作业已排到其到期日
    assert!(h
        .store
        .find_by_key(&retry_check_key(1, 2))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_status_change_then_job_escalates_last_attempt() {
    let h = Harness::new();
    h.seed_lead(1);
    h.store.insert_task(
        TaskBuilder::new()
            .with_id(10)
            .with_lead(Some(1))
            .with_attempt(10, 10)
            .build(),
    );

    h.status_handler()
        .change_task_status(10, TaskStatus::CallNotConnected)
        .await
        .unwrap();
    let report = runner(&h).run_due_jobs().await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(h.store.lead(1).unwrap().status, LeadStatus::InactiveDropped);
    assert!(h.store.children_of(10).is_empty());
}

#[tokio::test]
async fn test_job_for_missing_task_fails() {
    let h = Harness::new();
    let ghost = h.seed_unreached_task(10, 1, 1);
    h.store
        .enqueue(&NewDeferredJob::retry_check(&ghost, 1, at(2024, 3, 1, 0, 0)))
        .await
        .unwrap();
    // 作业指向一个不存在的任务
    let mut job = NewDeferredJob::retry_check(&ghost, 5, at(2024, 3, 1, 0, 0));
    job.task_id = 404;
    h.store.enqueue(&job).await.unwrap();
    h.seed_lead(1);

    let report = runner(&h).run_due_jobs().await.unwrap();

    assert_eq!(report.claimed, 2);
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    let failed = h
        .store
        .find_by_key(&retry_check_key(5, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.last_error.is_some());
}

#[tokio::test]
async fn test_running_job_is_not_claimed_twice() {
    let h = Harness::new();
    h.seed_lead(1);
    let task = h.seed_unreached_task(10, 1, 1);
    h.store
        .enqueue(&NewDeferredJob::retry_check(&task, 1, at(2024, 3, 1, 0, 0)))
        .await
        .unwrap();

    let claimed = h
        .store
        .claim_due(at(2024, 3, 1, 9, 0), at(2024, 3, 1, 8, 0), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    let report = runner(&h).run_due_jobs().await.unwrap();
    assert_eq!(report.claimed, 0);
    assert!(h.store.children_of(10).is_empty());
}

#[tokio::test]
async fn test_stale_running_job_is_reclaimed_after_lease() {
    let h = Harness::new();
    h.seed_lead(1);
    let task = h.seed_unreached_task(10, 1, 1);
    h.store
        .enqueue(&NewDeferredJob::retry_check(&task, 1, at(2024, 3, 1, 0, 0)))
        .await
        .unwrap();

    // 执行方认领后失联
    h.store
        .claim_due(h.clock_now(), h.clock_now(), 10)
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(20));
    assert_eq!(runner(&h).run_due_jobs().await.unwrap().claimed, 0);

    h.clock.advance(Duration::minutes(15));
    let report = runner(&h).run_due_jobs().await.unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(h.store.children_of(10).len(), 1);

    let job = h
        .store
        .find_by_key(&retry_check_key(1, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.attempts, 2);
}

#[tokio::test]
async fn test_result_write_failure_does_not_abort_batch() {
    let h = Harness::new();
    h.seed_lead(1);
    h.seed_lead(2);
    let first = h.seed_unreached_task(10, 1, 1);
    let second = h.seed_unreached_task(11, 2, 1);
    for (task, lead_id) in [(&first, 1), (&second, 2)] {
        h.store
            .enqueue(&NewDeferredJob::retry_check(task, lead_id, at(2024, 3, 1, 0, 0)))
            .await
            .unwrap();
    }
    h.store.fail_on(FailPoint::JobComplete);

    let report = runner(&h).run_due_jobs().await.unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(report.completed, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(h.store.children_of(10).len(), 1);
    assert_eq!(h.store.children_of(11).len(), 1);

    // 租约到期后重新认领，重试标志保证不会重复创建任务
    h.store.clear_failures();
    h.clock.advance(Duration::minutes(31));
    let report = runner(&h).run_due_jobs().await.unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(report.completed, 2);
    assert_eq!(h.store.children_of(10).len(), 1);
    assert_eq!(h.store.children_of(11).len(), 1);
}
