//! Transform stages for payload streams

use strata::{Payload, Stage, StageContext, StageFuture};

/// Runs a function on every payload and emits the result.
///
/// Good for simple reshaping; anything that needs to buffer, fan out or fail
/// deserves its own [`Stage`] implementation.
pub struct FuncTransformer<F>
where
    F: Fn(Payload) -> Payload,
{
    transform: F,
    name: Option<String>,
    concurrency: usize,
}

impl<F> FuncTransformer<F>
where
    F: Fn(Payload) -> Payload + Send + Sync + 'static,
{
    /// Creates a new transformer around the given function
    #[must_use]
    pub const fn new(transform: F) -> Self {
        Self {
            transform,
            name: None,
            concurrency: 1,
        }
    }

    /// Sets the label used in logs and statistics
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the number of workers
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

impl<F> Stage for FuncTransformer<F>
where
    F: Fn(Payload) -> Payload + Send + Sync + 'static,
{
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        let output = (self.transform)(input);
        Box::pin(async move { ctx.emit(output).await })
    }

    fn describe(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| "FuncTransformer".to_string())
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }
}
