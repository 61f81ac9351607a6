//! Names of the per-task progress counters.

use std::fmt;

/// The four monotonically increasing counters kept for every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    NormalJobCount,
    FinalizeJobCount,
    CompletedCount,
    FailedCount,
}

impl Counter {
    pub const ALL: [Counter; 4] = [
        Counter::NormalJobCount,
        Counter::FinalizeJobCount,
        Counter::CompletedCount,
        Counter::FailedCount,
    ];

    /// Store key inside the task's namespace.
    pub fn key(self) -> &'static str {
        match self {
            Counter::NormalJobCount => "normal_job_count",
            Counter::FinalizeJobCount => "finalize_job_count",
            Counter::CompletedCount => "completed_count",
            Counter::FailedCount => "failed_count",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
