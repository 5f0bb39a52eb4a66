//! Stage two: HTTP availability and download throughput over pinned connections.
//!
//! Every request resolves the probe and payload hostnames to the record's own
//! address, so the measurement reflects that specific edge rather than
//! whatever DNS would hand out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::model::MeasurementRecord;
use crate::pool;
use crate::probe::PROBE_PORT;

const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Tunables for the throughput stage.
#[derive(Debug, Clone)]
pub struct ThroughputOptions {
    /// Upper bound on records measured at once.
    pub concurrency: usize,
    /// Small-response endpoint answering the availability HEAD.
    pub probe_url: Url,
    /// Large payload streamed to gauge throughput.
    pub speed_url: Url,
    /// Whole-request budget for the availability check.
    pub http_timeout: Duration,
    /// Whole-request budget for the payload download.
    pub speed_timeout: Duration,
}

/// Measure availability and download speed for each surviving record.
/// Returned records follow the input order; failures are recorded in the
/// fields, never surfaced as errors.
pub async fn run(
    records: Vec<MeasurementRecord>,
    options: &ThroughputOptions,
) -> Vec<MeasurementRecord> {
    let concurrency = options.concurrency;
    let options = Arc::new(options.clone());

    pool::run_pool(records, concurrency, move |record| {
        let options = Arc::clone(&options);
        async move { measure_record(record, options.as_ref()).await }
    })
    .await
}

/// HEAD the probe endpoint, then pull the payload if the edge answered.
/// A failed download leaves the speed at zero without revoking availability.
async fn measure_record(
    mut record: MeasurementRecord,
    options: &ThroughputOptions,
) -> MeasurementRecord {
    let client = match pinned_client(&record, options) {
        Ok(client) => client,
        Err(error) => {
            debug!(address = %record.address, %error, "client build failed");
            return record;
        }
    };

    match client
        .head(options.probe_url.clone())
        .timeout(options.http_timeout)
        .send()
        .await
    {
        Ok(response) if counts_as_available(response.status()) => {
            record.is_available = true;
        }
        Ok(response) => {
            debug!(
                address = %record.address,
                status = %response.status(),
                "availability check rejected",
            );
            return record;
        }
        Err(error) => {
            debug!(address = %record.address, %error, "availability check failed");
            return record;
        }
    }

    match measure_speed(&client, options).await {
        Ok(speed) => record.download_speed_mbps = speed,
        Err(error) => {
            debug!(address = %record.address, %error, "speed measurement failed");
        }
    }

    record
}

/// Client whose connections for both measurement hosts go to the record's
/// address. The URL's scheme and port still pick the transport port.
fn pinned_client(
    record: &MeasurementRecord,
    options: &ThroughputOptions,
) -> reqwest::Result<Client> {
    let pinned = SocketAddr::new(record.address, PROBE_PORT);
    let mut builder = Client::builder()
        .danger_accept_invalid_certs(true)
        .tcp_keepalive(TCP_KEEPALIVE)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT);

    for url in [&options.probe_url, &options.speed_url] {
        if let Some(host) = url.host_str() {
            builder = builder.resolve(host, pinned);
        }
    }

    builder.build()
}

/// Stream the payload to completion, counting bytes as they arrive.
async fn measure_speed(client: &Client, options: &ThroughputOptions) -> reqwest::Result<f64> {
    let started = Instant::now();
    let mut response = client
        .get(options.speed_url.clone())
        .timeout(options.speed_timeout)
        .send()
        .await?;

    let mut bytes: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        bytes += chunk.len() as u64;
    }

    Ok(download_speed_mbps(bytes, started.elapsed()))
}

/// Success and redirect statuses count as reachable.
fn counts_as_available(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

/// Mean download rate in MB/s, with 1 MB = 1,048,576 bytes. Zero when no
/// time has elapsed.
fn download_speed_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / (1024.0 * 1024.0)) / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_mebibytes_in_two_seconds_is_five_mbps() {
        let speed = download_speed_mbps(10_485_760, Duration::from_secs(2));
        assert_eq!(speed, 5.0);
    }

    #[test]
    fn zero_elapsed_yields_zero_speed() {
        assert_eq!(download_speed_mbps(10_485_760, Duration::ZERO), 0.0);
    }

    #[test]
    fn zero_bytes_yields_zero_speed() {
        assert_eq!(download_speed_mbps(0, Duration::from_secs(5)), 0.0);
    }

    #[test]
    fn availability_window_spans_success_and_redirects() {
        assert!(counts_as_available(StatusCode::OK));
        assert!(counts_as_available(StatusCode::NO_CONTENT));
        assert!(counts_as_available(StatusCode::PERMANENT_REDIRECT));

        assert!(!counts_as_available(StatusCode::CONTINUE));
        assert!(!counts_as_available(StatusCode::BAD_REQUEST));
        assert!(!counts_as_available(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
