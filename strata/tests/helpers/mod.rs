use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata::{Payload, Stage, StageContext, StageError, StageFuture};
use tracing_subscriber::EnvFilter;

// Test Stages
pub struct PassthroughStage {
    pub workers: usize,
}

/// Counts `process` and `finish` calls through shared counters.
#[derive(Clone, Default)]
pub struct RecordingStage {
    pub name: &'static str,
    pub processed: Arc<AtomicUsize>,
    pub finished: Arc<AtomicUsize>,
}

/// Fails on its `fail_on`-th call (1-based).
pub struct FailingStage {
    pub fail_on: usize,
    pub workers: usize,
    pub calls: AtomicUsize,
}

/// Cancels through the context instead of returning an error.
pub struct CancellingStage;

/// Buffers every input and emits a single count in `finish`.
#[derive(Default)]
pub struct CountingStage {
    pub seen: Mutex<Vec<Payload>>,
}

pub struct SlowStage {
    pub delay: Duration,
    pub deadline: Option<Duration>,
}

pub struct PanickingStage;

pub struct FailingFinishStage;

/// Ignores its trigger and emits `count` numbered payloads.
pub struct ProducerStage {
    pub count: usize,
}

/// Emits each input `copies` times.
pub struct FanOutStage {
    pub copies: usize,
}

/// Parses raw JSON inputs into row payloads.
pub struct JsonStage;

/// Fails on one specific raw input and passes everything else through.
pub struct RejectingStage {
    pub reject: &'static str,
}

// Implementations
impl Stage for PassthroughStage {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move { ctx.emit(input).await })
    }

    fn describe(&self) -> String {
        "Passthrough".to_string()
    }

    fn concurrency(&self) -> usize {
        self.workers
    }
}

impl Stage for RecordingStage {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        self.processed.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { ctx.emit(input).await })
    }

    fn finish<'a>(&'a self, _ctx: &'a StageContext) -> StageFuture<'a> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn describe(&self) -> String {
        self.name.to_string()
    }
}

impl FailingStage {
    pub fn new(fail_on: usize, workers: usize) -> Self {
        Self {
            fail_on,
            workers,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Stage for FailingStage {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = call == self.fail_on;
        Box::pin(async move {
            if fail {
                return Err(StageError::fatal(format!("failed on call {call}")));
            }
            ctx.emit(input).await
        })
    }

    fn describe(&self) -> String {
        "Failing".to_string()
    }

    fn concurrency(&self) -> usize {
        self.workers
    }
}

impl Stage for CancellingStage {
    fn process<'a>(&'a self, _input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            ctx.cancel(StageError::fatal("giving up"));
            Ok(())
        })
    }

    fn describe(&self) -> String {
        "Cancelling".to_string()
    }
}

impl Stage for CountingStage {
    fn process<'a>(&'a self, input: Payload, _ctx: &'a StageContext) -> StageFuture<'a> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(input);
        }
        Box::pin(async { Ok(()) })
    }

    fn finish<'a>(&'a self, ctx: &'a StageContext) -> StageFuture<'a> {
        let count = self.seen.lock().map(|seen| seen.len()).unwrap_or_default();
        Box::pin(async move { ctx.emit(Payload::from_raw(count.to_string())).await })
    }

    fn describe(&self) -> String {
        "Counting".to_string()
    }
}

impl Stage for SlowStage {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            ctx.emit(input).await
        })
    }

    fn describe(&self) -> String {
        "Slow".to_string()
    }

    fn timeout(&self) -> Option<Duration> {
        self.deadline
    }
}

impl Stage for PanickingStage {
    fn process<'a>(&'a self, _input: Payload, _ctx: &'a StageContext) -> StageFuture<'a> {
        panic!("stage exploded")
    }

    fn describe(&self) -> String {
        "Panicking".to_string()
    }
}

impl Stage for FailingFinishStage {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move { ctx.emit(input).await })
    }

    fn finish<'a>(&'a self, _ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async { Err(StageError::fatal("flush failed")) })
    }

    fn describe(&self) -> String {
        "FailingFinish".to_string()
    }
}

impl Stage for ProducerStage {
    fn process<'a>(&'a self, _input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            for i in 0..self.count {
                ctx.emit(numbered(i)).await?;
            }
            Ok::<(), StageError>(())
        })
    }

    fn describe(&self) -> String {
        "Producer".to_string()
    }
}

impl Stage for FanOutStage {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            for _ in 0..self.copies {
                ctx.emit(input.clone()).await?;
            }
            Ok::<(), StageError>(())
        })
    }

    fn describe(&self) -> String {
        "FanOut".to_string()
    }
}

impl Stage for JsonStage {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            let raw = input
                .as_raw()
                .ok_or_else(|| StageError::fatal("expected raw input"))?;
            ctx.emit(Payload::from_json(raw)?).await
        })
    }

    fn describe(&self) -> String {
        "Json".to_string()
    }
}

impl Stage for RejectingStage {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            if input.as_raw() == Some(self.reject.as_bytes()) {
                return Err(StageError::fatal(format!("rejected {}", self.reject)));
            }
            ctx.emit(input).await
        })
    }

    fn describe(&self) -> String {
        "Rejecting".to_string()
    }

    fn concurrency(&self) -> usize {
        2
    }
}

// Helper Functions
pub fn numbered(i: usize) -> Payload {
    Payload::from_raw(i.to_string())
}

pub fn numbered_inputs(count: usize) -> Vec<Payload> {
    (0..count).map(numbered).collect()
}

pub fn as_number(payload: &Payload) -> usize {
    std::str::from_utf8(payload.as_raw().unwrap())
        .unwrap()
        .parse()
        .unwrap()
}

// Add this function to initialize tracing for tests
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("strata=debug".parse().unwrap())
                .add_directive("test=debug".parse().unwrap()),
        )
        .with_test_writer()
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .compact()
        .try_init();

    if subscriber.is_err() {
        println!("Warning: tracing already initialized");
    }
}
