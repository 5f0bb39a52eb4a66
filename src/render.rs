//! Result rendering: console table, CSV file, or JSON dump.

use std::io;
use std::path::Path;

use clap::ValueEnum;
use serde::Deserialize;

use crate::model::MeasurementRecord;

/// How ranked results leave the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

const HEADERS: [&str; 4] = [
    "IP Address",
    "Avg Latency (ms)",
    "Download Speed (MB/s)",
    "Packet Loss (%)",
];

/// Render the available edges as an aligned console table. Records that
/// failed the availability check are left out.
pub fn format_table(records: &[MeasurementRecord]) -> String {
    let rows: Vec<&MeasurementRecord> = records.iter().filter(|r| r.is_available).collect();
    if rows.is_empty() {
        return "no available edges found".to_string();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format!(
        "{:<40} {:>16} {:>22} {:>16}",
        HEADERS[0], HEADERS[1], HEADERS[2], HEADERS[3]
    ));
    for record in rows {
        lines.push(format!(
            "{:<40} {:>16.2} {:>22.2} {:>16.2}",
            record.address,
            record.latency_millis(),
            record.download_speed_mbps,
            record.loss_percent()
        ));
    }
    lines.join("\n")
}

/// Render the available edges as CSV, header row included.
pub fn format_csv(records: &[MeasurementRecord]) -> String {
    let mut out = String::new();
    out.push_str(&HEADERS.join(","));
    out.push('\n');

    for record in records.iter().filter(|r| r.is_available) {
        out.push_str(&format!(
            "{},{:.2},{:.2},{:.2}\n",
            record.address,
            record.latency_millis(),
            record.download_speed_mbps,
            record.loss_percent()
        ));
    }
    out
}

/// Write the CSV rendering to `path`.
pub fn write_csv(records: &[MeasurementRecord], path: &Path) -> io::Result<()> {
    std::fs::write(path, format_csv(records))
}

/// Serialize every record, available or not, as pretty JSON.
pub fn to_json(records: &[MeasurementRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::time::Duration;

    fn available(address: &str, latency_ms: u64, speed: f64) -> MeasurementRecord {
        let mut record = MeasurementRecord::new(
            address.parse::<IpAddr>().unwrap(),
            Duration::from_millis(latency_ms),
            0.0,
        );
        record.is_available = true;
        record.download_speed_mbps = speed;
        record
    }

    fn unavailable(address: &str) -> MeasurementRecord {
        MeasurementRecord::new(
            address.parse::<IpAddr>().unwrap(),
            Duration::from_millis(50),
            0.0,
        )
    }

    #[test]
    fn table_lists_only_available_records() {
        let records = vec![
            available("192.0.2.1", 10, 5.0),
            unavailable("192.0.2.2"),
            available("192.0.2.3", 20, 1.5),
        ];
        let table = format_table(&records);

        assert!(table.contains("IP Address"));
        assert!(table.contains("192.0.2.1"));
        assert!(table.contains("192.0.2.3"));
        assert!(!table.contains("192.0.2.2"));
        assert_eq!(table.lines().count(), 3);
    }

    #[test]
    fn table_reports_when_nothing_is_available() {
        let records = vec![unavailable("192.0.2.2")];
        assert_eq!(format_table(&records), "no available edges found");
    }

    #[test]
    fn csv_matches_expected_rows() {
        let records = vec![available("192.0.2.1", 10, 5.0), unavailable("192.0.2.2")];
        let csv = format_csv(&records);

        assert_eq!(
            csv,
            "IP Address,Avg Latency (ms),Download Speed (MB/s),Packet Loss (%)\n\
             192.0.2.1,10.00,5.00,0.00\n"
        );
    }

    #[test]
    fn json_keeps_unavailable_records() {
        let records = vec![available("192.0.2.1", 10, 5.0), unavailable("192.0.2.2")];
        let json = to_json(&records).unwrap();

        assert!(json.contains("192.0.2.2"));
        assert!(json.contains("\"mean_latency_ms\": 10.0"));
        assert!(json.contains("\"is_available\": false"));
    }
}
