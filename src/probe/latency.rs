//! Stage one: timed TCP connects measuring mean latency and packet loss.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::model::MeasurementRecord;
use crate::pool;
use crate::probe::{Dialer, PROBE_PORT};

/// Tunables for the latency stage.
#[derive(Debug, Clone)]
pub struct LatencyOptions {
    /// Upper bound on candidates probed at once.
    pub concurrency: usize,
    /// Connection attempts per candidate.
    pub retries: u32,
    /// Per-attempt connect timeout.
    pub connect_timeout: Duration,
    /// Candidates whose mean latency exceeds this are dropped.
    pub latency_max: Duration,
}

/// Probe every candidate and keep the ones with flawless connects inside the
/// latency ceiling. Returned records follow the input order.
pub async fn run(
    candidates: Vec<IpAddr>,
    options: &LatencyOptions,
    dialer: Arc<dyn Dialer>,
) -> Vec<MeasurementRecord> {
    let total = candidates.len();
    let latency_max = options.latency_max;
    let job_options = options.clone();

    let records = pool::run_pool(candidates, options.concurrency, move |address| {
        let dialer = Arc::clone(&dialer);
        let options = job_options.clone();
        async move { measure_candidate(address, &options, dialer.as_ref()).await }
    })
    .await;

    let kept: Vec<MeasurementRecord> = records
        .into_iter()
        .filter(|record| qualifies(record, latency_max))
        .collect();

    debug!(candidates = total, kept = kept.len(), "latency stage complete");
    kept
}

/// Dial one candidate `retries` times in sequence and fold the outcomes into
/// a record. Attempts after a failure still run; the loss rate needs them.
async fn measure_candidate(
    address: IpAddr,
    options: &LatencyOptions,
    dialer: &dyn Dialer,
) -> MeasurementRecord {
    let target = SocketAddr::new(address, PROBE_PORT);
    let mut successes = 0u32;
    let mut total = Duration::ZERO;

    for attempt in 0..options.retries {
        match dialer.dial(target, options.connect_timeout).await {
            Ok(elapsed) => {
                successes += 1;
                total += elapsed;
            }
            Err(error) => {
                debug!(%address, attempt, %error, "connect attempt failed");
            }
        }
    }

    let mean = if successes > 0 {
        total / successes
    } else {
        Duration::ZERO
    };
    let packet_loss = f64::from(options.retries - successes) / f64::from(options.retries);
    debug!(
        %address,
        mean_ms = mean.as_secs_f64() * 1000.0,
        loss = packet_loss,
        "candidate probed"
    );

    MeasurementRecord::new(address, mean, packet_loss)
}

/// Acceptance gate: every attempt connected and the mean sits inside the
/// ceiling. A candidate that never connected has a zero mean and fails the
/// `mean > 0` arm.
fn qualifies(record: &MeasurementRecord, latency_max: Duration) -> bool {
    record.packet_loss == 0.0
        && record.mean_latency > Duration::ZERO
        && record.mean_latency <= latency_max
}
