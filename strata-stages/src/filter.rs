//! Filter stages for payload streams

use strata::{Payload, Stage, StageContext, StageFuture};
use tracing::trace;

/// Forwards only the payloads that satisfy a predicate.
pub struct FilterStage<F>
where
    F: Fn(&Payload) -> bool,
{
    predicate: F,
}

impl<F> FilterStage<F>
where
    F: Fn(&Payload) -> bool + Send + Sync + 'static,
{
    /// Creates a new filter stage with the given predicate
    #[must_use]
    pub const fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> Stage for FilterStage<F>
where
    F: Fn(&Payload) -> bool + Send + Sync + 'static,
{
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        let keep = (self.predicate)(&input);
        Box::pin(async move {
            if !keep {
                trace!(stage = ctx.stage(), "dropping payload");
                return Ok(());
            }
            ctx.emit(input).await
        })
    }

    fn describe(&self) -> String {
        "FilterStage".to_string()
    }
}
