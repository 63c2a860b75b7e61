use crate::core::chain::{Transform, TransformChain};
use crate::core::pipeline::PipelineConfig;
use crate::core::transformers;
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_positive_number, Validate};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "stream-etl")]
#[command(about = "Streaming JSON ETL with a rate-limited transform chain and fan-out sinks")]
pub struct CliConfig {
    /// Interval between rate limiter token replenishments, in milliseconds
    /// (0 disables rate limiting)
    #[arg(long, default_value = "100")]
    pub rate_ms: u64,

    /// Maximum number of banked rate limiter tokens
    #[arg(long, default_value = "10")]
    pub burst: u32,

    /// Number of concurrent sink workers
    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// Ordered transform chain, e.g. "reject-eq:id=557,rename:lng=geo_lng"
    #[arg(long = "transform", value_delimiter = ',')]
    pub transforms: Vec<String>,

    /// Read records from a file instead of stdin
    #[arg(long)]
    pub input: Option<String>,

    /// Write records to a file instead of stdout
    #[arg(long)]
    pub output: Option<String>,

    /// Enable verbose output
    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            rate: Duration::from_millis(self.rate_ms),
            burst: self.burst,
            workers: self.workers,
        }
    }

    pub fn build_chain(&self) -> Result<TransformChain> {
        let mut ops: Vec<Box<dyn Transform>> = Vec::with_capacity(self.transforms.len());
        for spec in &self.transforms {
            ops.push(transformers::from_spec(spec)?);
        }
        Ok(TransformChain::new(ops))
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("workers", self.workers, 1)?;
        validate_positive_number("burst", self.burst as usize, 1)?;

        if let Some(path) = &self.input {
            validate_path("input", path)?;
        }
        if let Some(path) = &self.output {
            validate_path("output", path)?;
        }

        for spec in &self.transforms {
            transformers::from_spec(spec)?;
        }

        Ok(())
    }
}
