//! Two-stage measurement pipeline: latency filter, then throughput ranking.

use std::cmp::Ordering;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use crate::model::MeasurementRecord;
use crate::probe::latency::{self, LatencyOptions};
use crate::probe::throughput::{self, ThroughputOptions};
use crate::probe::{Dialer, TcpDialer};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The candidate list was empty before any probing began.
    #[error("no candidates to probe")]
    NoCandidates,
}

/// Everything the pipeline needs, assembled from configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub latency: LatencyOptions,
    pub throughput: ThroughputOptions,
    /// How many latency finalists advance to the throughput stage.
    pub top_n: usize,
}

/// Run both stages with the real TCP dialer.
pub async fn run(
    candidates: Vec<IpAddr>,
    options: &PipelineOptions,
) -> Result<Vec<MeasurementRecord>, PipelineError> {
    run_with_dialer(candidates, options, Arc::new(TcpDialer)).await
}

/// Run both stages with a caller-supplied dialer for the latency probes.
///
/// Candidates are filtered by the latency stage, ranked by connection
/// quality, truncated to the `top_n` finalists, measured for availability
/// and throughput, and finally ranked by download speed. An empty result is
/// valid; an empty input is not.
pub async fn run_with_dialer(
    candidates: Vec<IpAddr>,
    options: &PipelineOptions,
    dialer: Arc<dyn Dialer>,
) -> Result<Vec<MeasurementRecord>, PipelineError> {
    if candidates.is_empty() {
        return Err(PipelineError::NoCandidates);
    }

    let total = candidates.len();
    let started = Instant::now();
    info!(candidates = total, "latency stage started");

    let survivors = latency::run(candidates, &options.latency, dialer).await;
    info!(
        kept = survivors.len(),
        dropped = total - survivors.len(),
        elapsed = ?started.elapsed(),
        "latency stage finished"
    );

    if survivors.is_empty() {
        warn!("no candidate survived the latency stage");
        return Ok(Vec::new());
    }

    let finalists = select_finalists(survivors, options.top_n);
    if finalists.is_empty() {
        warn!(top_n = options.top_n, "finalist cut left nothing to measure");
        return Ok(Vec::new());
    }

    let speed_started = Instant::now();
    info!(records = finalists.len(), "throughput stage started");

    let mut measured = throughput::run(finalists, &options.throughput).await;
    info!(
        available = measured.iter().filter(|r| r.is_available).count(),
        elapsed = ?speed_started.elapsed(),
        "throughput stage finished"
    );

    rank_by_speed(&mut measured);
    Ok(measured)
}

/// Rank by connection quality and keep the best `top_n`.
fn select_finalists(
    mut records: Vec<MeasurementRecord>,
    top_n: usize,
) -> Vec<MeasurementRecord> {
    rank_by_quality(&mut records);
    records.truncate(top_n);
    records
}

/// Lowest packet loss first, then lowest mean latency. The sort is stable,
/// so full ties keep their input order.
fn rank_by_quality(records: &mut [MeasurementRecord]) {
    records.sort_by(|a, b| {
        a.packet_loss
            .partial_cmp(&b.packet_loss)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.mean_latency.cmp(&b.mean_latency))
    });
}

/// Highest download speed first, then lowest mean latency.
fn rank_by_speed(records: &mut [MeasurementRecord]) {
    records.sort_by(|a, b| {
        b.download_speed_mbps
            .partial_cmp(&a.download_speed_mbps)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.mean_latency.cmp(&b.mean_latency))
    });
}
