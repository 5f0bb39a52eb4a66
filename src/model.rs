//! Measurement records produced by the probing pipeline.

use serde::{Serialize, Serializer};
use std::net::IpAddr;
use std::time::Duration;

/// Result of probing a single candidate address.
///
/// Created by the latency stage for candidates that pass the quality bar,
/// then enriched by the throughput stage. `address` is unique within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub address: IpAddr,
    /// Mean TCP connect latency over the successful attempts.
    #[serde(rename = "mean_latency_ms", serialize_with = "duration_as_millis")]
    pub mean_latency: Duration,
    /// Fraction of connect attempts that failed, in [0.0, 1.0].
    pub packet_loss: f64,
    /// Set by the throughput stage; stays false until the HEAD probe passes.
    pub is_available: bool,
    /// Download speed in MB/s; 0.0 if the speed test was skipped or failed.
    pub download_speed_mbps: f64,
}

impl MeasurementRecord {
    /// A record as the latency stage emits it: reachable, not yet
    /// availability- or speed-tested.
    pub fn new(address: IpAddr, mean_latency: Duration, packet_loss: f64) -> Self {
        Self {
            address,
            mean_latency,
            packet_loss,
            is_available: false,
            download_speed_mbps: 0.0,
        }
    }

    /// Mean latency in fractional milliseconds, for display.
    pub fn latency_millis(&self) -> f64 {
        self.mean_latency.as_secs_f64() * 1000.0
    }

    /// Packet loss as a percentage, for display.
    pub fn loss_percent(&self) -> f64 {
        self.packet_loss * 100.0
    }
}

fn duration_as_millis<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(value.as_secs_f64() * 1000.0)
}
