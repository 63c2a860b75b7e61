use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use stream_etl::utils::{logger, validation::Validate};
use stream_etl::{CliConfig, Pipeline};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting stream-etl");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let chain = config.build_chain()?;
    let cancel = CancellationToken::new();

    // First interrupt cancels the run; a second one exits immediately.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling pipeline");
                cancel.cancel();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("second interrupt, exiting immediately");
                std::process::exit(130);
            }
        });
    }

    let source: Box<dyn Read + Send> = match &config.input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("failed to open input file {}", path))?,
        ),
        None => Box::new(std::io::stdin()),
    };
    let sink: Box<dyn Write + Send> = match &config.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create output file {}", path))?,
        )),
        None => Box::new(std::io::stdout()),
    };

    let pipeline = Pipeline::new(source, sink, chain, config.pipeline_config(), cancel);
    let stats = pipeline.run().await?;

    tracing::info!("Pipeline complete: {}", stats);
    Ok(())
}
