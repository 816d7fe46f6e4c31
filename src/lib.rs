pub mod cli;
pub mod config;
pub mod distribution;
pub mod error;
pub mod estimator;
pub mod feed;
pub mod market;
pub mod markets;
pub mod pipeline;
pub mod settlement;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod value;

pub use error::{EngineError, EngineResult};
