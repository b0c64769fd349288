pub mod cancel;
pub mod context;
pub mod stage;
pub mod stat;
pub mod types;
