mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use multistep_core::impls::InMemoryStore;
use multistep_core::ports::{SharedStore, StoreError};
use multistep_core::{CoordinatorBuilder, CoordinatorConfig, ExecutionMode, TaskError, WorkerGroup};
use tokio::sync::Notify;

use support::{CounterJob, Harness, RecordJob, SlowJob};

async fn wait_until_finished(h: &Harness, task_id: &multistep_core::TaskId) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while h.coordinator.is_active(task_id).await.unwrap() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task did not finish in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_workers_finalize_exactly_once() {
    let h = Harness::new(ExecutionMode::Async);
    let task = h.coordinator.create(Some("fan-out")).await.unwrap();

    for _ in 0..50 {
        task.add_job::<CounterJob>(("k".to_string(),)).await.unwrap();
    }
    task.add_finalization_job::<RecordJob>(("fin".to_string(),))
        .await
        .unwrap();

    let workers = WorkerGroup::spawn(8, h.coordinator.clone());
    task.finalizable().await.unwrap();
    wait_until_finished(&h, task.task_id()).await;
    workers.shutdown_and_join().await;

    assert_eq!(h.counter("k").await, 50);
    assert_eq!(h.recorder.entries(), vec!["fin"]);
    assert_eq!(h.queue.failure_count().await, 0);
    assert!(!h.queue.has_queue(task.queue_name()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn finalization_jobs_never_overlap_under_many_workers() {
    let h = Harness::new(ExecutionMode::Async);
    let task = h.coordinator.create(None).await.unwrap();

    for _ in 0..10 {
        task.add_job::<CounterJob>(("k".to_string(),)).await.unwrap();
    }
    for label in ["a", "b", "c", "d"] {
        task.add_finalization_job::<SlowJob>((label.to_string(),))
            .await
            .unwrap();
    }
    task.finalizable().await.unwrap();

    let workers = WorkerGroup::spawn(6, h.coordinator.clone());
    wait_until_finished(&h, task.task_id()).await;
    workers.shutdown_and_join().await;

    assert_eq!(
        h.recorder.entries(),
        vec![
            "start:a", "end:a", "start:b", "end:b", "start:c", "end:c", "start:d", "end:d"
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_finalize_calls_have_one_winner() {
    let h = Harness::new(ExecutionMode::Async);
    let task = h.coordinator.create(None).await.unwrap();
    task.add_finalization_job::<RecordJob>(("fin".to_string(),))
        .await
        .unwrap();
    task.finalizable().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let task = task.clone();
        handles.push(tokio::spawn(async move { task.finalize().await }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => won += 1,
            Err(TaskError::AlreadyFinalizing(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(won, 1);
    assert!(task.finalization_jobs().await.unwrap().is_empty());
}

/// Holds the first claim of a `lock` key until released; everything else goes
/// straight to the inner store.
struct LeaseGate {
    inner: Arc<InMemoryStore>,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl LeaseGate {
    fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl SharedStore for LeaseGate {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.incr(key).await
    }

    async fn get_int(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.get_int(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        if key.ends_with(":lock") && self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.set_if_absent(key, value).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.set_remove(key, member).await
    }

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.set_is_member(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.inner.set_members(key).await
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.inner.list_push(key, value).await
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.list_pop(key).await
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list_range(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        self.inner.delete_prefix(prefix).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn late_lease_claim_after_the_task_finished_is_refused() {
    let inner = Arc::new(InMemoryStore::new());
    let gate = Arc::new(LeaseGate::new(inner.clone()));
    let coordinator = CoordinatorBuilder::new()
        .config(CoordinatorConfig::default())
        .store(gate.clone())
        .build()
        .unwrap();

    let task = coordinator.create(Some("gated")).await.unwrap();
    task.finalizable().await.unwrap();

    // the first caller passes the barrier checks, then stalls on the claim
    let late = {
        let task = task.clone();
        tokio::spawn(async move { task.finalize().await })
    };
    tokio::time::timeout(Duration::from_secs(5), gate.entered.notified())
        .await
        .expect("first caller never reached the claim");

    // with no finalization jobs the second caller finishes and wipes the task
    task.finalize().await.unwrap();
    assert!(!coordinator.is_active(task.task_id()).await.unwrap());

    gate.release.notify_one();
    let err = late.await.unwrap().unwrap_err();
    assert!(matches!(err, TaskError::AlreadyFinalizing(_)));

    let prefix = format!("{}:{}:", CoordinatorConfig::default().namespace, task.task_id());
    assert!(inner.keys(&prefix).unwrap().is_empty());
    assert!(!coordinator.is_active(task.task_id()).await.unwrap());
}
