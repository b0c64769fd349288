use super::cancel::Cancellation;
use crate::error::{PipelineError, StageError, StageResult};
use crate::payload::Payload;
use flume::Sender;

/// What a stage call sees of the running pipeline: where to emit and how to
/// abort.
#[derive(Clone, Debug)]
pub struct StageContext {
    stage: String,
    output: Sender<Payload>,
    cancellation: Cancellation,
}

impl StageContext {
    pub(crate) fn new(stage: String, output: Sender<Payload>, cancellation: Cancellation) -> Self {
        Self {
            stage,
            output,
            cancellation,
        }
    }

    /// Label of the stage this context belongs to.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Sends `payload` downstream, waiting while the channel is full.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Cancelled`] if the run is cancelled before the
    /// payload is accepted, or if the downstream side is gone.
    pub async fn emit(&self, payload: Payload) -> StageResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(StageError::Cancelled),
            sent = self.output.send_async(payload) => sent.map_err(|_| StageError::Cancelled),
        }
    }

    /// Aborts the whole run with `error` attributed to this stage.
    pub fn cancel(&self, error: StageError) {
        self.cancellation.cancel(PipelineError::Stage {
            stage: self.stage.clone(),
            source: error,
        });
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    #[must_use]
    pub const fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }
}
