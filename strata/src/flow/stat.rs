use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Invocation count and accumulated latency for one stage.
///
/// All workers of a stage share one `ExecutionStat`, so the counters are
/// atomic.
#[derive(Debug)]
pub struct ExecutionStat {
    stage: String,
    executions: AtomicU64,
    total_nanos: AtomicU64,
}

/// A point-in-time copy of an [`ExecutionStat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatSnapshot {
    pub stage: String,
    pub executions: u64,
    pub total: Duration,
}

impl StatSnapshot {
    /// Mean time per invocation, `None` before the first one.
    #[must_use]
    pub fn average(&self) -> Option<Duration> {
        if self.executions == 0 {
            return None;
        }
        let nanos = self.total.as_nanos() / u128::from(self.executions);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

impl ExecutionStat {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            executions: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Counts one invocation and adds the wall-clock time `fut` takes.
    pub async fn record<F: Future>(&self, fut: F) -> F::Output {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let output = fut.await;
        self.add_elapsed(started.elapsed());
        output
    }

    fn add_elapsed(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            stage: self.stage.clone(),
            executions: self.executions.load(Ordering::Relaxed),
            total: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
        }
    }
}
