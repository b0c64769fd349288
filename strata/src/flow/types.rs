use std::future::Future;
use std::pin::Pin;

use crate::error::StageResult;

// Boxed future returned by every stage call
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = StageResult<()>> + Send + 'a>>;
