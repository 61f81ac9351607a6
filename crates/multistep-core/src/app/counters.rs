//! Progress counters on [`MultiStepTask`].
//!
//! Each counter is a plain integer key in the task's namespace. Increments are
//! atomic in the store, which is what makes the barrier safe across workers.

use super::task::MultiStepTask;
use crate::domain::Counter;
use crate::error::Result;

macro_rules! counter_accessors {
    ($($counter:ident => $read:ident, $incr:ident;)*) => {
        impl MultiStepTask {
            $(
                pub async fn $read(&self) -> Result<i64> {
                    Ok(self.ns().get_int(Counter::$counter.key()).await?)
                }

                pub(crate) async fn $incr(&self) -> Result<i64> {
                    Ok(self.ns().incr(Counter::$counter.key()).await?)
                }
            )*
        }
    };
}

counter_accessors! {
    NormalJobCount => normal_job_count, increment_normal_job_count;
    FinalizeJobCount => finalize_job_count, increment_finalize_job_count;
    CompletedCount => completed_count, increment_completed_count;
    FailedCount => failed_count, increment_failed_count;
}

impl MultiStepTask {
    /// Snapshot of all four counters, in [`Counter::ALL`] order.
    pub async fn counters(&self) -> Result<Vec<(Counter, i64)>> {
        let mut out = Vec::with_capacity(Counter::ALL.len());
        for counter in Counter::ALL {
            out.push((counter, self.ns().get_int(counter.key()).await?));
        }
        Ok(out)
    }
}
