//! File stages

use std::path::PathBuf;
use strata::{Payload, Stage, StageContext, StageFuture};
use tracing::debug;

type PathFn = Box<dyn Fn(&Payload) -> PathBuf + Send + Sync>;

enum PathSource {
    Fixed(PathBuf),
    Dynamic(PathFn),
}

/// Reads a whole file per input payload and emits its bytes as a raw payload.
///
/// For buffered or line-by-line reading, write a dedicated stage. A read
/// failure cancels the run.
pub struct FileReader {
    path: PathSource,
}

impl FileReader {
    /// Reads the same file for every input
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: PathSource::Fixed(path.into()),
        }
    }

    /// Derives the file to read from each input payload
    pub fn dynamic<F>(path: F) -> Self
    where
        F: Fn(&Payload) -> PathBuf + Send + Sync + 'static,
    {
        Self {
            path: PathSource::Dynamic(Box::new(path)),
        }
    }

    fn resolve(&self, input: &Payload) -> PathBuf {
        match &self.path {
            PathSource::Fixed(path) => path.clone(),
            PathSource::Dynamic(path) => path(input),
        }
    }
}

impl Stage for FileReader {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        let path = self.resolve(&input);
        Box::pin(async move {
            debug!(path = %path.display(), "reading file");
            let bytes = tokio::fs::read(&path).await?;
            ctx.emit(Payload::from_raw(bytes)).await
        })
    }

    fn describe(&self) -> String {
        "FileReader".to_string()
    }
}
