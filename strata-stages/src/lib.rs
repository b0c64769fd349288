//! Strata Stages
//!
//! This crate provides ready-made stage implementations that can be used with
//! the strata pipeline framework.

#![warn(missing_docs)]

pub mod file;
pub mod filter;
pub mod transform;

pub use file::FileReader;
pub use filter::FilterStage;
pub use transform::FuncTransformer;
