//! edgesift -- find the fastest CDN edge addresses reachable from here.
//!
//! This crate provides the measurement pipeline: a TCP latency filter over
//! the candidate list, a pinned-connection HTTP availability and throughput
//! stage over the finalists, and the ranking, acquisition, and rendering
//! around them.

pub mod config;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod probe;
pub mod render;
pub mod source;

use anyhow::Result;

/// Run the whole measurement: load candidates, probe both stages, and hand
/// back the ranked records.
pub async fn measure(config: &config::Config) -> Result<Vec<model::MeasurementRecord>> {
    config.validate()?;
    let options = config.pipeline_options()?;

    let candidates =
        source::load_candidates(&config.source.file, config.source.url.as_deref()).await?;
    tracing::info!(candidates = candidates.len(), "candidate list loaded");

    let records = pipeline::run(candidates, &options).await?;
    Ok(records)
}
