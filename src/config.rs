//! Configuration loading: TOML file with per-field defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::pipeline::PipelineOptions;
use crate::probe::latency::LatencyOptions;
use crate::probe::throughput::ThroughputOptions;
use crate::render::OutputFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything tunable, grouped the way the stages consume it. A missing
/// file or section falls back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeConfig,
    pub http: HttpConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Upper bound on in-flight probes, shared by both stages.
    pub concurrency: usize,
    /// TCP connection attempts per candidate.
    pub retries: u32,
    pub connect_timeout_ms: u64,
    /// Mean latency ceiling for the first stage.
    pub latency_max_ms: u64,
    /// Latency finalists that advance to the throughput stage.
    pub top_n: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: 1000,
            retries: 4,
            connect_timeout_ms: 5000,
            latency_max_ms: 400,
            top_n: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Small-response endpoint for the availability HEAD.
    pub probe_url: String,
    /// Large payload for the download measurement.
    pub speed_url: String,
    pub http_timeout_ms: u64,
    pub speed_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            probe_url: "https://www.google.com/generate_204".to_string(),
            speed_url: "https://cachefly.cachefly.net/100mb.test".to_string(),
            http_timeout_ms: 5000,
            speed_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Candidate list file, one address or CIDR block per line.
    pub file: PathBuf,
    /// Remote list fetched when the file does not exist.
    pub url: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("ip.txt"),
            url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Destination for `format = "csv"`.
    pub csv_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            csv_path: PathBuf::from("result.csv"),
        }
    }
}

impl Config {
    /// Read and parse the file at `path`. A missing file yields the default
    /// configuration; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn nonzero(value: u64, field: &str) -> Result<(), ConfigError> {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be greater than zero"
                )));
            }
            Ok(())
        }

        nonzero(self.probe.concurrency as u64, "probe.concurrency")?;
        nonzero(u64::from(self.probe.retries), "probe.retries")?;
        nonzero(self.probe.connect_timeout_ms, "probe.connect_timeout_ms")?;
        nonzero(self.probe.latency_max_ms, "probe.latency_max_ms")?;
        nonzero(self.http.http_timeout_ms, "http.http_timeout_ms")?;
        nonzero(self.http.speed_timeout_ms, "http.speed_timeout_ms")?;

        parse_url("http.probe_url", &self.http.probe_url)?;
        parse_url("http.speed_url", &self.http.speed_url)?;
        Ok(())
    }

    /// Assemble the stage options the pipeline consumes.
    pub fn pipeline_options(&self) -> Result<PipelineOptions, ConfigError> {
        Ok(PipelineOptions {
            latency: LatencyOptions {
                concurrency: self.probe.concurrency,
                retries: self.probe.retries,
                connect_timeout: Duration::from_millis(self.probe.connect_timeout_ms),
                latency_max: Duration::from_millis(self.probe.latency_max_ms),
            },
            throughput: ThroughputOptions {
                concurrency: self.probe.concurrency,
                probe_url: parse_url("http.probe_url", &self.http.probe_url)?,
                speed_url: parse_url("http.speed_url", &self.http.speed_url)?,
                http_timeout: Duration::from_millis(self.http.http_timeout_ms),
                speed_timeout: Duration::from_millis(self.http.speed_timeout_ms),
            },
            top_n: self.probe.top_n,
        })
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|error| ConfigError::Invalid(format!("{field} {value:?}: {error}")))?;
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid(format!(
            "{field} {value:?} has no host"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(text: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edgesift.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.probe.concurrency, 1000);
        assert_eq!(config.probe.retries, 4);
        assert_eq!(config.probe.top_n, 20);
        assert_eq!(config.http.speed_timeout_ms, 30_000);
        assert_eq!(config.source.file, PathBuf::from("ip.txt"));
        assert_eq!(config.output.format, OutputFormat::Table);
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let (_dir, path) = write_config("[probe]\nconcurrency = 64\n\n[output]\nformat = \"csv\"\n");
        let config = Config::load(&path).unwrap();

        assert_eq!(config.probe.concurrency, 64);
        assert_eq!(config.probe.retries, 4);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.output.csv_path, PathBuf::from("result.csv"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (_dir, path) = write_config("[probe\nconcurrency = \n");
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn zero_retries_fail_validation() {
        let (_dir, path) = write_config("[probe]\nretries = 0\n");
        let config = Config::load(&path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn url_without_host_fails_validation() {
        let (_dir, path) = write_config("[http]\nprobe_url = \"not a url\"\n");
        let config = Config::load(&path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn pipeline_options_convert_milliseconds() {
        let config = Config::default();
        let options = config.pipeline_options().unwrap();

        assert_eq!(options.latency.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.latency.latency_max, Duration::from_millis(400));
        assert_eq!(options.throughput.speed_timeout, Duration::from_secs(30));
        assert_eq!(options.top_n, 20);
        assert_eq!(
            options.throughput.probe_url.as_str(),
            "https://www.google.com/generate_204"
        );
    }
}
