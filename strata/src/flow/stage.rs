use super::context::StageContext;
use super::types::StageFuture;
use crate::payload::Payload;
use std::time::Duration;

/// A unit of work in a pipeline.
///
/// `process` is called once per input payload and may emit any number of
/// payloads through the context. When it cannot continue it returns an error
/// (or calls [`StageContext::cancel`]), which aborts the whole run.
///
/// With [`Stage::concurrency`] above 1, several `process` calls run at once on
/// the same instance and their outputs interleave in no particular order.
pub trait Stage: Send + Sync {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a>;

    /// Called exactly once after the input is exhausted and every `process`
    /// call has returned. Use it to flush buffered output.
    fn finish<'a>(&'a self, _ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    /// Stable label used in logs and statistics.
    fn describe(&self) -> String;

    /// Number of workers; 0 and 1 both mean sequential.
    fn concurrency(&self) -> usize {
        1
    }

    /// Deadline for each `process`/`finish` call. `None` falls back to the
    /// pipeline's configured default.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}
