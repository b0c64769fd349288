mod executor;
pub mod pipeline;

pub use self::executor::RunReport;
pub use self::pipeline::{Pipeline, PipelineConfig, PipelineGraph, StageNode};
