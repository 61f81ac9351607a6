mod support;

use async_trait::async_trait;
use multistep_core::app::drain;
use multistep_core::ports::WorkQueue;
use multistep_core::typed::{AroundHook, FailureHook, FnHook, Next};
use multistep_core::{ExecutionMode, HookSet, Job, JobContext, JobError, JobSpec, TaskError};
use rstest::rstest;
use serde_json::{Value, json};

use support::{CounterJob, FailJob, FailOnceJob, Harness, RecordJob, Recorder, SlowJob};

#[rstest]
#[tokio::test]
async fn finalization_jobs_run_in_registration_order(
    #[values(ExecutionMode::Sync, ExecutionMode::Async)] mode: ExecutionMode,
) {
    let h = Harness::new(mode);
    let task = h.coordinator.create(None).await.unwrap();

    for label in ["a", "b", "c"] {
        task.add_finalization_job::<SlowJob>((label.to_string(),))
            .await
            .unwrap();
    }
    task.add_job::<CounterJob>(("k".to_string(),)).await.unwrap();
    task.finalizable().await.unwrap();
    drain(&h.coordinator).await.unwrap();

    assert_eq!(
        h.recorder.entries(),
        vec!["start:a", "end:a", "start:b", "end:b", "start:c", "end:c"]
    );
    assert_eq!(task.task_id().slug(), "multi-step-task");
    assert!(!h.coordinator.is_active(task.task_id()).await.unwrap());
}

#[tokio::test]
async fn only_one_finalization_unit_is_queued_at_a_time() {
    let h = Harness::new(ExecutionMode::Async);
    let task = h.coordinator.create(None).await.unwrap();

    task.add_finalization_job::<RecordJob>(("a".to_string(),))
        .await
        .unwrap();
    task.add_finalization_job::<RecordJob>(("b".to_string(),))
        .await
        .unwrap();
    task.finalizable().await.unwrap();

    // AssureFinalization → claims the lease and queues "a" only
    let delivery = h.queue.try_lease().await.unwrap().unwrap();
    h.coordinator.execute_unit(delivery.unit).await.unwrap();

    assert_eq!(h.queue.queue_len(task.queue_name()).await, 1);
    assert_eq!(
        task.finalization_jobs().await.unwrap(),
        vec![JobSpec::new("test.record", vec![json!("b")])]
    );
}

#[tokio::test]
async fn failed_finalization_job_resumes_after_retry() {
    let h = Harness::new(ExecutionMode::Async);
    let task = h.coordinator.create(None).await.unwrap();

    task.add_finalization_job::<FailOnceJob>(("A".to_string(),))
        .await
        .unwrap();
    task.add_finalization_job::<RecordJob>(("B".to_string(),))
        .await
        .unwrap();
    task.finalizable().await.unwrap();

    let report = drain(&h.coordinator).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(h.recorder.entries().is_empty());
    assert!(task.unfinalized_because_of_errors().await.unwrap());
    assert_eq!(h.queue.failure_count().await, 1);

    h.queue.requeue_failure(0).await.unwrap();
    drain(&h.coordinator).await.unwrap();

    assert_eq!(h.recorder.entries(), vec!["A", "B"]);
    assert!(!h.coordinator.is_active(task.task_id()).await.unwrap());
    assert_eq!(h.queue.failure_count().await, 0);
}

#[tokio::test]
async fn sync_finalization_failure_stops_the_chain() {
    let h = Harness::new(ExecutionMode::Sync);
    let task = h.coordinator.create(None).await.unwrap();

    task.add_finalization_job::<FailJob>(()).await.unwrap();
    task.add_finalization_job::<RecordJob>(("after".to_string(),))
        .await
        .unwrap();

    let err = task.finalizable().await.unwrap_err();
    assert!(err.is_job_failure());
    assert!(h.recorder.entries().is_empty());
    assert_eq!(task.failed_count().await.unwrap(), 1);
    assert!(task.unfinalized_because_of_errors().await.unwrap());
    assert!(h.coordinator.is_active(task.task_id()).await.unwrap());

    // the failed step is gone and the lease is still held
    let remaining = task.finalization_jobs().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].job_type, RecordJob::TYPE);
    let err = task.finalize().await.unwrap_err();
    assert!(matches!(err, TaskError::AlreadyFinalizing(_)));
    assert!(h.recorder.entries().is_empty());
}

#[tokio::test]
async fn finalize_twice_fails_with_already_finalizing() {
    let h = Harness::new(ExecutionMode::Async);
    let task = h.coordinator.create(None).await.unwrap();
    task.add_finalization_job::<RecordJob>(("fin".to_string(),))
        .await
        .unwrap();
    task.finalizable().await.unwrap();

    task.finalize().await.unwrap();
    assert!(matches!(
        task.finalize().await,
        Err(TaskError::AlreadyFinalizing(_))
    ));

    drain(&h.coordinator).await.unwrap();
    assert_eq!(h.recorder.entries(), vec!["fin"]);
    assert!(matches!(
        task.finalize().await,
        Err(TaskError::AlreadyFinalizing(_))
    ));
}

struct Wrap(Recorder, &'static str);

#[async_trait]
impl AroundHook for Wrap {
    async fn around(
        &self,
        _ctx: &JobContext,
        _args: &[Value],
        next: Next<'_>,
    ) -> Result<(), JobError> {
        self.0.push(format!("{}:enter", self.1));
        let result = next.await;
        self.0.push(format!("{}:exit", self.1));
        result
    }
}

struct SeeFailure(Recorder);

#[async_trait]
impl FailureHook for SeeFailure {
    async fn on_failure(&self, _ctx: &JobContext, _args: &[Value], error: &JobError) {
        self.0.push(format!("failure:{}", error.message()));
    }
}

fn hooks(log: &Recorder) -> HookSet {
    let before = log.clone();
    let after = log.clone();
    HookSet::new()
        .before(FnHook(move |_: &JobContext, _: &[Value]| -> Result<(), JobError> {
            before.push("before");
            Ok(())
        }))
        .around(Wrap(log.clone(), "outer"))
        .around(Wrap(log.clone(), "inner"))
        .after(FnHook(move |_: &JobContext, args: &[Value]| -> Result<(), JobError> {
            after.push(format!("after:{}", args[0].as_str().unwrap_or_default()));
            Ok(())
        }))
        .on_failure(SeeFailure(log.clone()))
}

#[rstest]
#[tokio::test]
async fn hooks_wrap_finalization_jobs_in_order(
    #[values(ExecutionMode::Sync, ExecutionMode::Async)] mode: ExecutionMode,
) {
    let log = Recorder::default();
    let h = Harness::with_hooks(mode, hooks(&log));
    let task = h.coordinator.create(None).await.unwrap();

    task.add_finalization_job::<RecordJob>(("fin".to_string(),))
        .await
        .unwrap();
    task.finalizable().await.unwrap();
    drain(&h.coordinator).await.unwrap();

    assert_eq!(
        log.entries(),
        vec![
            "before",
            "outer:enter",
            "inner:enter",
            "inner:exit",
            "outer:exit",
            "after:fin"
        ]
    );
    assert_eq!(h.recorder.entries(), vec!["fin"]);
}

#[tokio::test]
async fn failing_before_hook_skips_the_job_and_counts_a_failure() {
    let log = Recorder::default();
    let seen = log.clone();
    let hooks = HookSet::new()
        .before(FnHook(|_: &JobContext, _: &[Value]| -> Result<(), JobError> {
            Err(JobError::new("not today"))
        }))
        .on_failure(SeeFailure(seen));
    let h = Harness::with_hooks(ExecutionMode::Async, hooks);
    let task = h.coordinator.create(None).await.unwrap();

    task.add_finalization_job::<RecordJob>(("fin".to_string(),))
        .await
        .unwrap();
    task.finalizable().await.unwrap();
    let report = drain(&h.coordinator).await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(h.recorder.entries().is_empty());
    assert_eq!(log.entries(), vec!["failure:not today"]);
    assert_eq!(task.failed_count().await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_finalization_job_type_is_a_failure() {
    let h = Harness::new(ExecutionMode::Async);
    let task = h.coordinator.create(None).await.unwrap();

    task.add_finalization_job_spec(JobSpec::without_args("test.nobody"))
        .await
        .unwrap();
    task.finalizable().await.unwrap();
    drain(&h.coordinator).await.unwrap();

    let failures = h.queue.failures().await;
    assert_eq!(failures.len(), 1);
    assert!(failures[0].error.contains("test.nobody"));
    assert_eq!(task.failed_count().await.unwrap(), 1);
}
