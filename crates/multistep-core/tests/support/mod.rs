#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use multistep_core::impls::InMemoryWorkQueue;
use multistep_core::{
    Coordinator, CoordinatorBuilder, CoordinatorConfig, ExecutionMode, HookSet, Job, JobContext,
    JobError,
};

/// Shared log the test jobs and hooks append to.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Increments a store key outside any task namespace, so the value survives
/// the task being removed.
pub struct CounterJob;

#[async_trait]
impl Job for CounterJob {
    const TYPE: &'static str = "test.counter";
    type Args = (String,);

    async fn perform(&self, ctx: &JobContext, (key,): Self::Args) -> Result<(), JobError> {
        ctx.task().coordinator().store().incr(&key).await?;
        Ok(())
    }
}

pub struct RecordJob(pub Recorder);

#[async_trait]
impl Job for RecordJob {
    const TYPE: &'static str = "test.record";
    type Args = (String,);

    async fn perform(&self, _ctx: &JobContext, (label,): Self::Args) -> Result<(), JobError> {
        self.0.push(label);
        Ok(())
    }
}

/// Records `start:<label>`, yields for a while, then records `end:<label>`.
pub struct SlowJob(pub Recorder);

#[async_trait]
impl Job for SlowJob {
    const TYPE: &'static str = "test.slow";
    type Args = (String,);

    async fn perform(&self, _ctx: &JobContext, (label,): Self::Args) -> Result<(), JobError> {
        self.0.push(format!("start:{label}"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.0.push(format!("end:{label}"));
        Ok(())
    }
}

pub struct FailJob;

#[async_trait]
impl Job for FailJob {
    const TYPE: &'static str = "test.fail";
    type Args = ();

    async fn perform(&self, _ctx: &JobContext, _args: ()) -> Result<(), JobError> {
        Err(JobError::new("boom"))
    }
}

/// Fails on its first run, then records its label.
pub struct FailOnceJob {
    pub recorder: Recorder,
    tripped: AtomicBool,
}

impl FailOnceJob {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            tripped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Job for FailOnceJob {
    const TYPE: &'static str = "test.fail_once";
    type Args = (String,);

    async fn perform(&self, _ctx: &JobContext, (label,): Self::Args) -> Result<(), JobError> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(JobError::new(format!("{label} failed on first attempt")));
        }
        self.recorder.push(label);
        Ok(())
    }
}

/// Records the id of the task it runs under.
pub struct BackRefJob(pub Recorder);

#[async_trait]
impl Job for BackRefJob {
    const TYPE: &'static str = "test.back_ref";
    type Args = ();

    async fn perform(&self, ctx: &JobContext, _args: ()) -> Result<(), JobError> {
        assert_eq!(ctx.task_id(), ctx.task().task_id());
        self.0.push(ctx.task_id().to_string());
        Ok(())
    }
}

pub struct Harness {
    pub coordinator: Coordinator,
    pub queue: Arc<InMemoryWorkQueue>,
    pub recorder: Recorder,
}

impl Harness {
    pub fn new(mode: ExecutionMode) -> Self {
        Self::with_hooks(mode, HookSet::new())
    }

    /// `hooks` are attached to [`RecordJob`].
    pub fn with_hooks(mode: ExecutionMode, hooks: HookSet) -> Self {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let recorder = Recorder::default();

        let coordinator = CoordinatorBuilder::new()
            .config(CoordinatorConfig::default().with_mode(mode))
            .queue(queue.clone())
            .register(CounterJob)
            .unwrap()
            .register_with_hooks(RecordJob(recorder.clone()), hooks)
            .unwrap()
            .register(SlowJob(recorder.clone()))
            .unwrap()
            .register(FailJob)
            .unwrap()
            .register(FailOnceJob::new(recorder.clone()))
            .unwrap()
            .register(BackRefJob(recorder.clone()))
            .unwrap()
            .build()
            .unwrap();

        Self {
            coordinator,
            queue,
            recorder,
        }
    }

    pub async fn counter(&self, key: &str) -> i64 {
        self.coordinator.store().get_int(key).await.unwrap()
    }
}
