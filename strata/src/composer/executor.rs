use super::pipeline::{PipelineGraph, StageNode};
use crate::{
    flow::{
        cancel::Cancellation,
        context::StageContext,
        stat::{ExecutionStat, StatSnapshot},
        types::StageFuture,
    },
    Payload, PipelineError,
};
use flume::{Receiver, Sender};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};

/// Result of a run that completed without cancellation.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Everything the last stage emitted. Order is only meaningful when every
    /// stage runs a single worker.
    pub outputs: Vec<Payload>,
    /// Per-stage statistics of this run, in stage order
    pub stats: Vec<StatSnapshot>,
}

impl PipelineGraph {
    /// Feeds `inputs` to the first stage and collects what the last stage
    /// emits.
    ///
    /// # Errors
    ///
    /// Returns the first cancellation reason if any stage aborted the run.
    pub async fn run<I>(&self, inputs: I) -> Result<RunReport, PipelineError>
    where
        I: IntoIterator<Item = Payload>,
        I::IntoIter: Send + 'static,
    {
        let cancellation = self.cancellation.child();
        let (tx, rx) = flume::bounded(self.capacity);
        let feeder = tokio::spawn(feed(inputs.into_iter(), tx, cancellation.clone()));
        let result = self.execute(rx, None, cancellation).await;
        if let Err(e) = feeder.await {
            warn!("input feeder failed: {e}");
        }
        result
    }

    /// Runs the pipeline with a single empty payload as the trigger, for
    /// chains whose first stage produces its own data.
    ///
    /// # Errors
    ///
    /// Returns the first cancellation reason if any stage aborted the run.
    pub async fn run_once(&self) -> Result<RunReport, PipelineError> {
        self.run(std::iter::once(Payload::empty())).await
    }

    /// Runs the pipeline over a stream of payloads until `input` closes, a
    /// stage aborts, or `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Shutdown`] on an external shutdown, otherwise
    /// the first reason a stage cancelled with.
    pub async fn run_stream(
        &self,
        input: Receiver<Payload>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<RunReport, PipelineError> {
        self.execute(input, Some(shutdown), self.cancellation.child()).await
    }

    #[instrument(skip_all, fields(stages = self.nodes.len()))]
    async fn execute(
        &self,
        input: Receiver<Payload>,
        shutdown: Option<broadcast::Receiver<()>>,
        cancellation: Cancellation,
    ) -> Result<RunReport, PipelineError> {
        if let Some(reason) = cancellation.reason() {
            warn!("pipeline already cancelled, not starting");
            return Err(reason);
        }
        info!("Starting pipeline execution");

        let watcher = shutdown.map(|rx| tokio::spawn(watch_shutdown(rx, cancellation.clone())));

        let stats: Vec<Arc<ExecutionStat>> = self
            .nodes
            .iter()
            .map(|node| Arc::new(ExecutionStat::new(node.name.clone())))
            .collect();
        let mut upstream = input;
        let mut supervisors = Vec::with_capacity(self.nodes.len());
        for (node, stat) in self.nodes.iter().zip(&stats) {
            let (tx, rx) = flume::bounded(self.capacity);
            let handle = tokio::spawn(run_stage(
                Arc::clone(node),
                Arc::clone(stat),
                upstream,
                tx,
                cancellation.clone(),
            ));
            supervisors.push((Arc::clone(node), handle));
            upstream = rx;
        }

        let mut outputs = Vec::new();
        loop {
            tokio::select! {
                biased;
                () = cancellation.cancelled() => break,
                item = upstream.recv_async() => match item {
                    Ok(payload) => outputs.push(payload),
                    Err(_) => break,
                },
            }
        }
        drop(upstream);

        for (node, handle) in supervisors {
            if let Err(e) = handle.await {
                cancellation.cancel(panicked(&node, e));
            }
        }
        if let Some(watcher) = watcher {
            watcher.abort();
        }

        if let Some(reason) = cancellation.reason() {
            error!(%reason, discarded = outputs.len(), "pipeline run failed");
            return Err(reason);
        }
        info!(outputs = outputs.len(), "Pipeline execution completed successfully");
        Ok(RunReport {
            outputs,
            stats: stats.iter().map(|stat| stat.snapshot()).collect(),
        })
    }
}

async fn feed<I>(inputs: I, tx: Sender<Payload>, cancellation: Cancellation)
where
    I: Iterator<Item = Payload>,
{
    for payload in inputs {
        tokio::select! {
            biased;
            () = cancellation.cancelled() => break,
            sent = tx.send_async(payload) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

async fn watch_shutdown(mut shutdown: broadcast::Receiver<()>, cancellation: Cancellation) {
    tokio::select! {
        () = cancellation.cancelled() => {}
        received = shutdown.recv() => {
            if matches!(received, Err(RecvError::Closed)) {
                return;
            }
            warn!("Received shutdown signal");
            cancellation.cancel(PipelineError::Shutdown);
        }
    }
}

// Fans a stage out over its workers, then runs `finish` once they are done.
// Dropping the last output sender on return closes the next stage's input.
async fn run_stage(
    node: Arc<StageNode>,
    stat: Arc<ExecutionStat>,
    input: Receiver<Payload>,
    output: Sender<Payload>,
    cancellation: Cancellation,
) {
    debug!(stage = %node.name, workers = node.workers, "starting stage");

    let mut workers = JoinSet::new();
    for id in 0..node.workers {
        let ctx = StageContext::new(node.name.clone(), output.clone(), cancellation.clone());
        workers.spawn(run_worker(
            id,
            Arc::clone(&node),
            Arc::clone(&stat),
            input.clone(),
            ctx,
        ));
    }
    drop(input);

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            cancellation.cancel(panicked(&node, e));
        }
    }

    if cancellation.is_cancelled() {
        debug!(stage = %node.name, "skipping finish after cancellation");
        return;
    }

    let ctx = StageContext::new(node.name.clone(), output, cancellation.clone());
    if let Err(reason) = invoke(&node, node.stage.finish(&ctx)).await {
        error!(stage = %node.name, %reason, "finish failed");
        cancellation.cancel(reason);
        return;
    }
    debug!(stage = %node.name, "stage completed");
}

async fn run_worker(
    id: usize,
    node: Arc<StageNode>,
    stat: Arc<ExecutionStat>,
    input: Receiver<Payload>,
    ctx: StageContext,
) {
    let cancellation = ctx.cancellation().clone();
    loop {
        let payload = tokio::select! {
            biased;
            () = cancellation.cancelled() => break,
            next = input.recv_async() => match next {
                Ok(payload) => payload,
                Err(_) => break,
            },
        };

        let result = stat
            .record(invoke(&node, node.stage.process(payload, &ctx)))
            .await;
        if let Err(reason) = result {
            if cancellation.is_cancelled() {
                debug!(stage = %node.name, worker = id, "stopping after cancellation");
            } else {
                error!(stage = %node.name, worker = id, %reason, "process failed");
            }
            cancellation.cancel(reason);
            break;
        }
    }
    debug!(stage = %node.name, worker = id, "worker exiting");
}

// Awaits one stage call under the node's deadline.
async fn invoke(node: &StageNode, call: StageFuture<'_>) -> Result<(), PipelineError> {
    let result = match node.timeout {
        Some(after) => tokio::time::timeout(after, call)
            .await
            .map_err(|_| PipelineError::Timeout {
                stage: node.name.clone(),
                after,
            })?,
        None => call.await,
    };
    result.map_err(|source| PipelineError::Stage {
        stage: node.name.clone(),
        source,
    })
}

fn panicked(node: &StageNode, err: JoinError) -> PipelineError {
    let message = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    };
    PipelineError::Panicked {
        stage: node.name.clone(),
        message,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
