use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "edgesift",
    about = "Find the fastest CDN edge addresses reachable from your network",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "edgesift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the candidate list and rank the surviving edges
    Run {
        /// Candidate list file (overrides the config)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Remote candidate list URL (overrides the config)
        #[arg(long)]
        url: Option<String>,

        /// Output format
        #[arg(long, value_enum)]
        format: Option<edgesift::render::OutputFormat>,

        /// CSV destination, for the csv format
        #[arg(long)]
        out: Option<PathBuf>,

        /// In-flight probe cap for both stages
        #[arg(long)]
        concurrency: Option<usize>,

        /// Latency finalists that advance to the throughput stage
        #[arg(long)]
        top: Option<usize>,
    },

    /// Parse and print the candidate list without probing
    Candidates {
        /// Candidate list file (overrides the config)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Remote candidate list URL (overrides the config)
        #[arg(long)]
        url: Option<String>,

        /// Print at most this many addresses
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the rendered results.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = edgesift::config::Config::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            file,
            url,
            format,
            out,
            concurrency,
            top,
        } => {
            if let Some(path) = file {
                config.source.file = path;
            }
            if let Some(value) = url {
                config.source.url = Some(value);
            }
            if let Some(value) = concurrency {
                config.probe.concurrency = value;
            }
            if let Some(value) = top {
                config.probe.top_n = value;
            }
            if let Some(value) = format {
                config.output.format = value;
            }
            if let Some(path) = out {
                config.output.csv_path = path;
            }

            tracing::info!(
                source = %config.source.file.display(),
                concurrency = config.probe.concurrency,
                top_n = config.probe.top_n,
                "starting measurement run"
            );
            let records = edgesift::measure(&config).await?;

            match config.output.format {
                edgesift::render::OutputFormat::Table => {
                    println!("{}", edgesift::render::format_table(&records));
                }
                edgesift::render::OutputFormat::Csv => {
                    edgesift::render::write_csv(&records, &config.output.csv_path)?;
                    println!("results written to {}", config.output.csv_path.display());
                }
                edgesift::render::OutputFormat::Json => {
                    println!("{}", edgesift::render::to_json(&records)?);
                }
            }
        }
        Commands::Candidates { file, url, limit } => {
            if let Some(path) = file {
                config.source.file = path;
            }
            if let Some(value) = url {
                config.source.url = Some(value);
            }

            let candidates = edgesift::source::load_candidates(
                &config.source.file,
                config.source.url.as_deref(),
            )
            .await?;

            tracing::info!(count = candidates.len(), "candidate list parsed");
            for address in candidates.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("{address}");
            }
        }
    }

    Ok(())
}
