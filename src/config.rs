use anyhow::{Context, Result};
use inquire::Select;
use serde::{Deserialize, Serialize};

use crate::paths::Library;
use crate::persistence;
use crate::quality::Quality;

/// The persisted download gate: whether to actually fetch files and at what
/// preferred resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
  /// `false` switches every acquisition into link-only mode.
  pub download: bool,
  pub resolution: Quality,
}

/// Load the persisted config, prompting for it on first use. Never
/// re-prompted and never invalidated after that.
pub async fn obtain(library: &Library) -> Result<Config> {
  persistence::obtain(&library.config(), || async { prompt() }).await
}

const DOWNLOAD_CHOICES: [&str; 2] = ["Yes, try to download them.", "No, just display download links."];
const RESOLUTION_CHOICES: [Quality; 5] = [Quality::Q2160, Quality::Q1080, Quality::Q720, Quality::Q480, Quality::Q360];

fn prompt() -> Result<Config> {
  let download = Select::new("Do you want the downloader to attempt downloading files?", DOWNLOAD_CHOICES.to_vec())
    .prompt()
    .context("Download preference prompt aborted")?
    == DOWNLOAD_CHOICES[0];
  let resolution = Select::new("What resolution do you prefer?", RESOLUTION_CHOICES.to_vec())
    .with_help_message("Higher choices fall back to the closest available rendition")
    .prompt()
    .context("Resolution prompt aborted")?;
  Ok(Config { download, resolution })
}
