//! Candidate acquisition: local list file first, remote list as fallback.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use ipnet::IpNet;
use thiserror::Error;
use tracing::{debug, warn};

/// Expanding a single CIDR block stops after this many hosts.
const MAX_BLOCK_HOSTS: usize = 65_536;

const REMOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read candidate list {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to fetch candidate list from {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },
    #[error("candidate list fetch from {url} answered {status}")]
    RemoteStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("no candidate source: {path} is missing and no list url is configured")]
    NoSource { path: String },
}

/// Load candidates from the list file, falling back to the remote URL when
/// the file does not exist.
pub async fn load_candidates(path: &Path, url: Option<&str>) -> Result<Vec<IpAddr>, SourceError> {
    if path.exists() {
        debug!(path = %path.display(), "loading candidates from file");
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Read {
                path: path.display().to_string(),
                source,
            })?;
        return Ok(parse_candidate_list(&text));
    }

    if let Some(url) = url {
        debug!(url, "loading candidates from remote list");
        return fetch_candidates(url).await;
    }

    Err(SourceError::NoSource {
        path: path.display().to_string(),
    })
}

async fn fetch_candidates(url: &str) -> Result<Vec<IpAddr>, SourceError> {
    let fetch_error = |source| SourceError::Fetch {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(REMOTE_FETCH_TIMEOUT)
        .build()
        .map_err(fetch_error)?;
    let response = client.get(url).send().await.map_err(fetch_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::RemoteStatus {
            url: url.to_string(),
            status,
        });
    }

    let text = response.text().await.map_err(fetch_error)?;
    Ok(parse_candidate_list(&text))
}

/// Parse one address or CIDR block per line. Blank lines and `#` comments
/// are skipped, unparseable lines are logged and dropped, and duplicates
/// keep their first occurrence.
pub fn parse_candidate_list(text: &str) -> Vec<IpAddr> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for line in text.lines() {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }

        if entry.contains('/') {
            let block: IpNet = match entry.parse() {
                Ok(block) => block,
                Err(error) => {
                    warn!(line = entry, %error, "skipping unparseable block");
                    continue;
                }
            };
            let mut expanded = 0usize;
            for host in block.hosts() {
                if expanded >= MAX_BLOCK_HOSTS {
                    warn!(block = entry, cap = MAX_BLOCK_HOSTS, "block truncated");
                    break;
                }
                expanded += 1;
                if seen.insert(host) {
                    candidates.push(host);
                }
            }
        } else {
            match entry.parse::<IpAddr>() {
                Ok(address) => {
                    if seen.insert(address) {
                        candidates.push(address);
                    }
                }
                Err(error) => warn!(line = entry, %error, "skipping unparseable address"),
            }
        }
    }

    debug!(count = candidates.len(), "candidate list parsed");
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::assert_ok;

    fn addrs(text: &str) -> Vec<String> {
        parse_candidate_list(text)
            .into_iter()
            .map(|a| a.to_string())
            .collect()
    }

    #[test]
    fn parses_plain_addresses_and_skips_noise() {
        let text = "# edge list\n192.0.2.1\n\n  198.51.100.7  \n# trailing comment\n2001:db8::1\n";
        assert_eq!(addrs(text), vec!["192.0.2.1", "198.51.100.7", "2001:db8::1"]);
    }

    #[test]
    fn expands_cidr_blocks_into_host_addresses() {
        // A /30 leaves two hosts after the network and broadcast addresses.
        assert_eq!(addrs("192.0.2.0/30\n"), vec!["192.0.2.1", "192.0.2.2"]);
    }

    #[test]
    fn single_host_block_yields_one_address() {
        assert_eq!(addrs("192.0.2.9/32\n"), vec!["192.0.2.9"]);
    }

    #[test]
    fn duplicates_keep_their_first_occurrence() {
        // The /30 expands to .1 and .2, both seen already.
        let text = "192.0.2.2\n192.0.2.1\n192.0.2.2\n192.0.2.0/30\n";
        assert_eq!(addrs(text), vec!["192.0.2.2", "192.0.2.1"]);
    }

    #[test]
    fn unparseable_lines_are_dropped() {
        let text = "not-an-ip\n192.0.2.1\n10.0.0.0/99\n";
        assert_eq!(addrs(text), vec!["192.0.2.1"]);
    }

    #[test]
    fn oversized_blocks_are_capped() {
        // A /111 holds 131,072 addresses; expansion stops at the cap.
        let candidates = parse_candidate_list("2001:db8::/111\n");
        assert_eq!(candidates.len(), MAX_BLOCK_HOSTS);
    }

    #[tokio::test]
    async fn loads_from_file_when_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ip.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "192.0.2.1\n192.0.2.2").unwrap();

        let candidates =
            assert_ok!(load_candidates(&path, Some("http://unused.invalid/list")).await);
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_without_url_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");

        let result = load_candidates(&path, None).await;
        assert!(matches!(result, Err(SourceError::NoSource { .. })));
    }
}
