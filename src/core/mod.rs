pub mod chain;
pub mod limiter;
pub mod metrics;
pub mod pipeline;
pub mod transformers;

pub use crate::domain::model::{Record, Rejection, TransformResult};
pub use crate::utils::error::Result;
