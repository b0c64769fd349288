use crate::error::PipelineError;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

/// The run-wide abort signal.
///
/// Every stage call and the executor of one run share one `Cancellation`.
/// The first reason passed to [`Cancellation::cancel`] is kept; later calls
/// only re-trigger an already cancelled token.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    token: CancellationToken,
    reason: Arc<OnceLock<PipelineError>>,
    parent: Option<Arc<OnceLock<PipelineError>>>,
}

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cancellation that fires when `self` does, but whose own cancel does
    /// not reach `self` or its other children.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::default(),
            parent: Some(Arc::clone(&self.reason)),
        }
    }

    /// Aborts the run. Returns `true` if `reason` became the recorded reason,
    /// which it cannot once a parent has been cancelled.
    pub fn cancel(&self, reason: PipelineError) -> bool {
        let inherited = self.parent.as_deref().and_then(OnceLock::get).is_some();
        let first = !inherited && self.reason.set(reason.clone()).is_ok();
        if first {
            warn!(%reason, "cancelling pipeline");
        }
        self.token.cancel();
        first
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The first recorded reason, if the run was cancelled. A child without a
    /// reason of its own reports its parent's.
    #[must_use]
    pub fn reason(&self) -> Option<PipelineError> {
        self.reason
            .get()
            .or_else(|| self.parent.as_deref().and_then(OnceLock::get))
            .cloned()
    }

    /// Completes once the run is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
