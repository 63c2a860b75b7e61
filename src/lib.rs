pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::config::CliConfig;
pub use crate::core::chain::{FnTransform, Transform, TransformChain};
pub use crate::core::limiter::{Acquire, TokenLimiter};
pub use crate::core::metrics::{PipelineMetrics, PipelineStats};
pub use crate::core::pipeline::{Pipeline, PipelineConfig, State};
pub use crate::domain::model::{Record, Rejection, TransformResult};
pub use crate::utils::error::{EtlError, Result};
