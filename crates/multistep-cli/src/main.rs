//! multistep demo - fan out N jobs, then run a two-step finalization chain.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::Parser;
use serde::Serialize;
use tokio::time::{Duration, Instant, sleep};
use tracing::{info, warn};

use multistep_core::impls::InMemoryWorkQueue;
use multistep_core::{
    Coordinator, CoordinatorBuilder, CoordinatorConfig, ExecutionMode, Job, JobContext, JobError,
    WorkerGroup,
};

const PROCESSED_KEY: &str = "demo:processed";
const REPORTED_KEY: &str = "demo:reported";

#[derive(Debug, Parser)]
#[command(name = "multistep", about = "Run a demo multi-step task on in-memory workers")]
struct Args {
    /// Execution mode: sync runs every job inline, async hands them to workers
    #[arg(long, env = "MULTISTEP_MODE", default_value = "async")]
    mode: ExecutionMode,

    /// Number of workers (async mode)
    #[arg(long, short = 'w', env = "MULTISTEP_WORKERS", default_value = "4")]
    workers: usize,

    /// Number of normal jobs to fan out
    #[arg(long, short = 'n', env = "MULTISTEP_JOBS", default_value = "20")]
    jobs: u32,

    /// Store key prefix
    #[arg(long, env = "MULTISTEP_NAMESPACE", default_value = "multisteptask")]
    namespace: String,

    /// Readable part of the task id
    #[arg(long)]
    slug: Option<String>,

    /// Make the first report attempt fail, then retry it (async mode)
    #[arg(long)]
    fail_once: bool,

    /// Give up waiting after this many seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    task_id: String,
    mode: ExecutionMode,
    jobs: u32,
    processed: i64,
    reported: Option<String>,
    retried_units: usize,
}

/// Normal job: one unit of fan-out work.
struct Tally;

#[async_trait]
impl Job for Tally {
    const TYPE: &'static str = "demo.tally";
    type Args = (u32,);

    async fn perform(&self, ctx: &JobContext, (index,): Self::Args) -> Result<(), JobError> {
        let processed = ctx.task().coordinator().store().incr(PROCESSED_KEY).await?;
        tracing::debug!(task_id = %ctx.task_id(), index, processed, "tallied");
        Ok(())
    }
}

/// First finalization step: reads what the normal jobs produced.
struct Report {
    fail_first: AtomicBool,
}

#[async_trait]
impl Job for Report {
    const TYPE: &'static str = "demo.report";
    type Args = (u32,);

    async fn perform(&self, ctx: &JobContext, (expected,): Self::Args) -> Result<(), JobError> {
        if self.fail_first.swap(false, Ordering::SeqCst) {
            return Err(JobError::new("report backend unavailable"));
        }

        let store = ctx.task().coordinator().store();
        let processed = store.get_int(PROCESSED_KEY).await?;
        if processed != i64::from(expected) {
            return Err(JobError::new(format!(
                "expected {expected} tallies, found {processed}"
            )));
        }
        store.set(REPORTED_KEY, &processed.to_string()).await?;
        info!(task_id = %ctx.task_id(), processed, "report written");
        Ok(())
    }
}

/// Last finalization step.
struct Announce;

#[async_trait]
impl Job for Announce {
    const TYPE: &'static str = "demo.announce";
    type Args = ();

    async fn perform(&self, ctx: &JobContext, _args: ()) -> Result<(), JobError> {
        let completed = ctx
            .task()
            .completed_count()
            .await
            .map_err(|e| JobError::with_source("reading completed_count", e))?;
        info!(task_id = %ctx.task_id(), completed, "all done");
        Ok(())
    }
}

fn build(args: &Args, queue: Arc<InMemoryWorkQueue>) -> anyhow::Result<Coordinator> {
    let config = CoordinatorConfig::default()
        .with_mode(args.mode)
        .with_namespace(args.namespace.clone());

    let coordinator = CoordinatorBuilder::new()
        .config(config)
        .queue(queue)
        .register(Tally)?
        .register(Report {
            fail_first: AtomicBool::new(args.fail_once),
        })?
        .register(Announce)?
        .expect_jobs(&[Tally::TYPE, Report::TYPE, Announce::TYPE])
        .build()?;
    Ok(coordinator)
}

/// Poll until the task is gone, retrying failed units as they show up.
async fn wait_for(
    coordinator: &Coordinator,
    queue: &InMemoryWorkQueue,
    task_id: &multistep_core::TaskId,
    timeout: Duration,
) -> anyhow::Result<usize> {
    let deadline = Instant::now() + timeout;
    let mut retried = 0;
    while coordinator.is_active(task_id).await? {
        if Instant::now() >= deadline {
            bail!("task {task_id} did not finish within {}s", timeout.as_secs());
        }
        if let Some(failed) = queue.failures().await.first() {
            warn!(
                queue = %failed.delivery.queue,
                attempt = failed.delivery.attempt,
                error = %failed.error,
                "retrying failed unit"
            );
            queue.requeue_failure(0).await?;
            retried += 1;
        }
        sleep(Duration::from_millis(20)).await;
    }
    Ok(retried)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.fail_once && args.mode == ExecutionMode::Sync {
        bail!("--fail-once needs async mode: sync mode has no queue to retry from");
    }

    let queue = Arc::new(InMemoryWorkQueue::new());
    let coordinator = build(&args, queue.clone()).context("wiring coordinator")?;

    let workers = match args.mode {
        ExecutionMode::Async => Some(WorkerGroup::spawn(args.workers.max(1), coordinator.clone())),
        ExecutionMode::Sync => None,
    };

    let jobs = args.jobs;
    let task = coordinator
        .create_with(args.slug.as_deref(), |plan| {
            for index in 0..jobs {
                plan.add_job::<Tally>((index,));
            }
            plan.add_finalization_job::<Report>((jobs,))
                .add_finalization_job::<Announce>(());
        })
        .await
        .context("creating task")?;
    info!(task_id = %task.task_id(), jobs, "task submitted");

    let waited = wait_for(
        &coordinator,
        &queue,
        task.task_id(),
        Duration::from_secs(args.timeout_secs),
    )
    .await;

    if let Some(workers) = workers {
        workers.shutdown_and_join().await;
    }
    let retried_units = waited?;

    let store = coordinator.store();
    let summary = Summary {
        task_id: task.task_id().to_string(),
        mode: args.mode,
        jobs,
        processed: store.get_int(PROCESSED_KEY).await?,
        reported: store.get(REPORTED_KEY).await?,
        retried_units,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "task {} finished: processed={} reported={} retried={}",
            summary.task_id,
            summary.processed,
            summary.reported.as_deref().unwrap_or("-"),
            summary.retried_units,
        );
    }
    Ok(())
}
