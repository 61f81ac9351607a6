//! Hooks around job execution.
//!
//! Order for one execution:
//! 1. every `before` hook, in registration order
//! 2. the `around` hooks, first registered outermost, wrapping the job body
//! 3. every `after` hook, in registration order
//!
//! A failure anywhere stops the sequence; `on_failure` hooks then observe the
//! error before it is returned.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use super::job::{DynJob, JobContext};
use crate::error::JobError;

/// The rest of the execution an around hook wraps.
pub type Next<'a> = BoxFuture<'a, Result<(), JobError>>;

#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, ctx: &JobContext, args: &[Value]) -> Result<(), JobError>;
}

#[async_trait]
pub trait AroundHook: Send + Sync {
    /// Must await `next` exactly once to run the wrapped job.
    async fn around(
        &self,
        ctx: &JobContext,
        args: &[Value],
        next: Next<'_>,
    ) -> Result<(), JobError>;
}

#[async_trait]
pub trait FailureHook: Send + Sync {
    async fn on_failure(&self, ctx: &JobContext, args: &[Value], error: &JobError);
}

/// Adapts a plain closure into a [`Hook`].
pub struct FnHook<F>(pub F);

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&JobContext, &[Value]) -> Result<(), JobError> + Send + Sync,
{
    async fn call(&self, ctx: &JobContext, args: &[Value]) -> Result<(), JobError> {
        (self.0)(ctx, args)
    }
}

/// Hooks attached to one job type at registration.
#[derive(Clone, Default)]
pub struct HookSet {
    before: Vec<Arc<dyn Hook>>,
    around: Vec<Arc<dyn AroundHook>>,
    after: Vec<Arc<dyn Hook>>,
    on_failure: Vec<Arc<dyn FailureHook>>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, hook: impl Hook + 'static) -> Self {
        self.before.push(Arc::new(hook));
        self
    }

    pub fn around(mut self, hook: impl AroundHook + 'static) -> Self {
        self.around.push(Arc::new(hook));
        self
    }

    pub fn after(mut self, hook: impl Hook + 'static) -> Self {
        self.after.push(Arc::new(hook));
        self
    }

    pub fn on_failure(mut self, hook: impl FailureHook + 'static) -> Self {
        self.on_failure.push(Arc::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.around.is_empty()
            && self.after.is_empty()
            && self.on_failure.is_empty()
    }

    /// Run `job` wrapped in these hooks.
    pub async fn run(
        &self,
        job: &dyn DynJob,
        ctx: &JobContext,
        args: &[Value],
    ) -> Result<(), JobError> {
        let result = self.run_stages(job, ctx, args).await;
        if let Err(err) = &result {
            for hook in &self.on_failure {
                hook.on_failure(ctx, args, err).await;
            }
        }
        result
    }

    async fn run_stages(
        &self,
        job: &dyn DynJob,
        ctx: &JobContext,
        args: &[Value],
    ) -> Result<(), JobError> {
        for hook in &self.before {
            hook.call(ctx, args).await?;
        }

        // innermost first, so the first registered hook ends up outermost
        let mut next: Next<'_> = job.execute(ctx, args);
        for hook in self.around.iter().rev() {
            next = hook.around(ctx, args, next);
        }
        next.await?;

        for hook in &self.after {
            hook.call(ctx, args).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HookSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSet")
            .field("before", &self.before.len())
            .field("around", &self.around.len())
            .field("after", &self.after.len())
            .field("on_failure", &self.on_failure.len())
            .finish()
    }
}
