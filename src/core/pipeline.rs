//! Pipeline execution engine.
//!
//! Stages are connected by bounded queues and joined by [`Pipeline::run`]:
//!
//! ```text
//! input ──▶ decode ──▶ work queue ──▶ transform ──▶ output queue ──▶ sink pool
//!                      (mpsc, SPSC)  (rate-limited) (async_channel,   (N workers)
//!                                                    SPMC)               │
//!                                                                        ▼
//!                                              output ◀── writer ◀── write queue
//!                                                          (owns stream) (mpsc)
//! ```
//!
//! The transform stage is the sole reader of the work queue and the sole
//! writer of the output queue; keeping it single-threaded is what makes the
//! rate limiter a single global throughput ceiling. Sink workers serialize
//! in parallel, but every byte reaches the output stream through the one
//! writer task, so concurrent workers never interleave within a record.

use crate::core::chain::TransformChain;
use crate::core::limiter::{Acquire, TokenLimiter};
use crate::core::metrics::{PipelineMetrics, PipelineStats};
use crate::domain::model::{Record, TransformResult};
use crate::utils::error::{EtlError, Result};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio_util::sync::CancellationToken;

/// Capacity of each inter-stage queue. Bounded so a slow stage exerts
/// backpressure instead of buffering the whole input.
const QUEUE_CAPACITY: usize = 64;

/// Lifecycle of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Draining,
    Done,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Interval between rate limiter token replenishments; zero disables
    /// rate limiting.
    pub rate: Duration,

    /// Maximum number of banked rate limiter tokens.
    pub burst: u32,

    /// Number of concurrent sink workers.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate: Duration::from_millis(100),
            burst: 10,
            workers: 4,
        }
    }
}

/// Streaming ETL pipeline over a source and sink stream.
///
/// A pipeline instance performs exactly one run: [`Pipeline::run`] consumes
/// it and resolves once every stage has exited.
pub struct Pipeline<R, W> {
    source: R,
    sink: W,
    chain: TransformChain,
    config: PipelineConfig,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
    state_tx: watch::Sender<State>,
}

impl<R, W> Pipeline<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn new(
        source: R,
        sink: W,
        chain: TransformChain,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(State::Idle);
        Self {
            source,
            sink,
            chain,
            config,
            cancel,
            metrics: PipelineMetrics::new(),
            state_tx,
        }
    }

    /// Watch lifecycle transitions for this run.
    pub fn state(&self) -> watch::Receiver<State> {
        self.state_tx.subscribe()
    }

    /// Counters shared by the stages of this run.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run the pipeline until the input is exhausted or cancellation fires,
    /// then join every stage and return the run counters.
    ///
    /// Per-record failures never surface here; the only error paths are a
    /// panicked stage. Rejected and failed records are visible in the
    /// returned [`PipelineStats`].
    pub async fn run(self) -> Result<PipelineStats> {
        let Pipeline {
            source,
            sink,
            chain,
            config,
            cancel,
            metrics,
            state_tx,
        } = self;
        let workers = config.workers.max(1);

        state_tx.send_replace(State::Running);
        tracing::debug!(
            workers,
            rate_ms = config.rate.as_millis() as u64,
            burst = config.burst,
            transforms = chain.len(),
            "pipeline running"
        );

        let (work_tx, work_rx) = mpsc::channel::<Record>(QUEUE_CAPACITY);
        let (out_tx, out_rx) = async_channel::bounded::<TransformResult>(QUEUE_CAPACITY);
        let (write_tx, write_rx) = mpsc::channel::<Vec<u8>>(QUEUE_CAPACITY);

        let mut decode = task::spawn_blocking({
            let metrics = Arc::clone(&metrics);
            let cancel = cancel.clone();
            move || decode_stage(source, work_tx, metrics, cancel)
        });

        let limiter = TokenLimiter::new(config.rate, config.burst, cancel.clone());
        let transform = tokio::spawn(transform_stage(
            work_rx,
            out_tx,
            chain,
            limiter,
            Arc::clone(&metrics),
            cancel.clone(),
        ));

        let mut sinks = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            sinks.push(tokio::spawn(sink_worker(
                worker_id,
                out_rx.clone(),
                write_tx.clone(),
                Arc::clone(&metrics),
                cancel.clone(),
            )));
        }
        drop(out_rx);
        drop(write_tx);

        let writer = task::spawn_blocking({
            let metrics = Arc::clone(&metrics);
            move || write_stage(sink, write_rx, metrics)
        });

        // Running -> Draining on end-of-input or cancellation, whichever
        // comes first. A cancelled decode stage unblocks once the transform
        // stage drops the work queue receiver.
        tokio::select! {
            _ = cancel.cancelled() => {
                state_tx.send_replace(State::Draining);
                tracing::debug!("cancellation observed, draining stages");
                decode.await?;
            }
            joined = &mut decode => {
                joined?;
                state_tx.send_replace(State::Draining);
                tracing::debug!("end of input, draining stages");
            }
        }

        transform.await?;
        for sink_task in sinks {
            sink_task.await?;
        }
        writer.await?;

        state_tx.send_replace(State::Done);
        let stats = metrics.snapshot();
        tracing::debug!(%stats, "pipeline done");
        Ok(stats)
    }
}

/// Decode stage: deserializes one record at a time from the input stream
/// and feeds the work queue in arrival order.
///
/// Runs on the blocking pool. Terminates at end-of-stream; a decode error
/// terminates the stage and abandons the rest of the stream without failing
/// the run.
fn decode_stage<R: Read>(
    source: R,
    work_tx: mpsc::Sender<Record>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) {
    let stream = serde_json::Deserializer::from_reader(source).into_iter::<Record>();

    for item in stream {
        if cancel.is_cancelled() {
            tracing::debug!("decode stage stopping on cancellation");
            return;
        }

        let record = match item {
            Ok(record) => record,
            Err(e) => {
                metrics.add_decode_failure();
                let e = EtlError::DecodeError(e);
                tracing::debug!(error = %e, "abandoning input stream");
                return;
            }
        };
        metrics.add_decoded();

        // A full queue blocks here; the send fails once the transform stage
        // exits, which doubles as the cancellation path for this stage.
        if work_tx.blocking_send(record).is_err() {
            tracing::debug!("work queue closed, decode stage stopping");
            return;
        }
    }
}

/// Transform stage: sole consumer of the work queue and sole producer of
/// the output queue. Acquires one rate limiter token per record, runs the
/// chain, and forwards accepted results.
async fn transform_stage(
    mut work_rx: mpsc::Receiver<Record>,
    out_tx: async_channel::Sender<TransformResult>,
    chain: TransformChain,
    mut limiter: TokenLimiter,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) {
    loop {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            record = work_rx.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };

        if limiter.acquire(1).await == Acquire::Cancelled {
            break;
        }

        match chain.apply(record).await {
            Ok(result) => {
                metrics.add_accepted();
                if out_tx.send(result).await.is_err() {
                    // every sink worker has exited
                    break;
                }
            }
            Err(rejection) => {
                metrics.add_rejected();
                tracing::debug!(op = %rejection.op, reason = %rejection.reason, "record rejected");
            }
        }
    }
}

/// Sink worker: takes accepted results off the shared output queue (each
/// item goes to exactly one worker), serializes them to newline-terminated
/// JSON frames, and hands the frames to the writer task.
async fn sink_worker(
    worker_id: usize,
    out_rx: async_channel::Receiver<TransformResult>,
    write_tx: mpsc::Sender<Vec<u8>>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = out_rx.recv() => match result {
                Ok(result) => result,
                // output queue closed and drained
                Err(_) => break,
            },
        };

        let record = result.into_record();
        let mut frame = match serde_json::to_vec(&record) {
            Ok(frame) => frame,
            Err(e) => {
                metrics.add_encode_failure();
                let e = EtlError::EncodeError(e);
                tracing::debug!(worker_id, error = %e, "dropping record");
                continue;
            }
        };
        frame.push(b'\n');

        if write_tx.send(frame).await.is_err() {
            break;
        }
    }
    tracing::debug!(worker_id, "sink worker exited");
}

/// Writer: exclusively owns the output stream and writes frames in arrival
/// order, so concurrent sink workers can never interleave bytes within a
/// record. Runs on the blocking pool. A failed write drops that frame and
/// continues.
fn write_stage<W: Write>(
    mut sink: W,
    mut write_rx: mpsc::Receiver<Vec<u8>>,
    metrics: Arc<PipelineMetrics>,
) {
    while let Some(frame) = write_rx.blocking_recv() {
        if let Err(e) = sink.write_all(&frame) {
            metrics.add_encode_failure();
            tracing::debug!(error = %e, "failed to write record to output stream");
            continue;
        }
        metrics.add_written();
    }

    if let Err(e) = sink.flush() {
        tracing::debug!(error = %e, "failed to flush output stream");
    }
}
