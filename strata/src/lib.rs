//! Strata
//!
//! Streaming pipelines of independent stages connected by bounded channels.
//! Stages exchange [`Payload`]s, either raw bytes or normalized tables, fan
//! out over a configurable number of workers, and share one [`Cancellation`]
//! that aborts the whole run on the first fatal error.

pub mod composer;
pub mod error;
pub mod flow;
pub mod payload;

// Re-export main types for easier access
pub use composer::{Pipeline, PipelineConfig, PipelineGraph, RunReport, StageNode};
pub use error::{NormalizeError, PipelineError, StageError};
pub use flow::cancel::Cancellation;
pub use flow::context::StageContext;
pub use flow::stage::Stage;
pub use flow::stat::{ExecutionStat, StatSnapshot};
pub use flow::types::StageFuture;
pub use payload::{Payload, PayloadKind, Row, Schema, SchemaBuilder, Table};
