mod cli;
mod config;
mod download;
mod jobs;
mod paths;
mod persistence;
mod quality;
mod sources;
mod tmdb;
mod ytdlp;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use paths::Library;

/// Locate and download movie/TV streams picked through a metadata search.
#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Root directory for cached lookups, saved jobs, and the config file
  #[arg(long, default_value = "data")]
  data_dir: PathBuf,

  /// Directory downloaded media is written to
  #[arg(long, default_value = "downloads")]
  downloads_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // Diagnostics go to stderr so they don't tangle with the prompts;
  // user-facing progress uses plain stdout lines.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let library = Library::new(&args.data_dir);
  cli::run(&library, &args.downloads_dir).await
}
