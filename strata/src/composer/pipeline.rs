use crate::{
    flow::{cancel::Cancellation, stage::Stage},
    PipelineError,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Run-wide settings for a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Buffer size of every channel between stages. `0` makes every hand-off
    /// a rendezvous.
    pub channel_capacity: usize,
    /// Deadline for each stage call, in milliseconds, for stages that do not
    /// set their own
    pub stage_timeout_ms: Option<u64>,
}

impl PipelineConfig {
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            stage_timeout_ms: None,
        }
    }
}

/// A builder for a linear chain of stages.
///
/// Stage *i*'s output feeds stage *i + 1*. [`Pipeline::build`] assembles the
/// chain into a [`PipelineGraph`] that can be inspected before it runs.
///
/// # Examples
///
/// ```
/// use strata::{Payload, Pipeline, Stage, StageContext, StageFuture};
///
/// struct Upper;
///
/// impl Stage for Upper {
///     fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
///         Box::pin(async move {
///             let text = String::from_utf8_lossy(input.as_raw().unwrap_or_default());
///             ctx.emit(Payload::from_raw(text.to_uppercase())).await
///         })
///     }
///
///     fn describe(&self) -> String {
///         "Upper".to_string()
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let graph = Pipeline::new().stage(Upper).build().unwrap();
///     let report = graph.run(vec![Payload::from_raw("hi")]).await.unwrap();
///     assert_eq!(report.outputs, vec![Payload::from_raw("HI")]);
/// }
/// ```
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline with no stages and the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a stage to the chain.
    #[must_use]
    pub fn stage<S>(self, stage: S) -> Self
    where
        S: Stage + 'static,
    {
        self.shared_stage(Arc::new(stage))
    }

    /// Appends a stage that is also held elsewhere.
    #[must_use]
    pub fn shared_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Default deadline for stage calls.
    #[must_use]
    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.config.stage_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Resolves worker counts and deadlines and creates the graph's root
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoStages`] for an empty pipeline.
    pub fn build(self) -> Result<PipelineGraph, PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        let default_timeout = self.config.stage_timeout();
        let nodes = self
            .stages
            .into_iter()
            .map(|stage| {
                let name = stage.describe();
                Arc::new(StageNode {
                    workers: stage.concurrency().max(1),
                    timeout: stage.timeout().or(default_timeout),
                    name,
                    stage,
                })
            })
            .collect();
        Ok(PipelineGraph {
            nodes,
            capacity: self.config.channel_capacity,
            cancellation: Cancellation::new(),
        })
    }
}

/// One stage in an assembled graph.
pub struct StageNode {
    pub(crate) name: String,
    pub(crate) workers: usize,
    pub(crate) timeout: Option<Duration>,
    pub(crate) stage: Arc<dyn Stage>,
}

impl StageNode {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Worker count, at least 1.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// An assembled chain of stages.
///
/// Each run gets its own child of the graph's [`Cancellation`] and its own
/// statistics, so concurrent runs on one graph do not affect each other.
/// Cancelling the graph's cancellation aborts every run and refuses new ones.
pub struct PipelineGraph {
    pub(crate) nodes: Vec<Arc<StageNode>>,
    pub(crate) capacity: usize,
    pub(crate) cancellation: Cancellation,
}

impl PipelineGraph {
    pub fn nodes(&self) -> impl Iterator<Item = &StageNode> {
        self.nodes.iter().map(Arc::as_ref)
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.nodes().map(StageNode::name).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Buffer size of each inter-stage channel.
    #[must_use]
    pub const fn channel_capacity(&self) -> usize {
        self.capacity
    }

    /// A handle on the graph's cancellation, for aborting from outside.
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }
}
