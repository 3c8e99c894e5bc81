use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Environment override for the yt-dlp executable path.
pub const PATH_ENV: &str = "YT_DLP_PATH";

/// One rendition from a `-J` probe. Formats without a finite aspect ratio
/// cannot be quality-matched and are skipped by the selector.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoFormat {
  pub format_id: String,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub width: Option<u32>,
  #[serde(default)]
  pub height: Option<u32>,
  #[serde(default)]
  pub aspect_ratio: Option<f64>,
}

/// The subset of `yt-dlp -J` output the selector needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeInfo {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub formats: Vec<VideoFormat>,
}

/// Narrow seam around the downloader subprocess: probe a playlist's
/// renditions, learn the destination filename, perform the fetch. The
/// orchestrator only ever talks to this trait, so tests inject a fake.
#[async_trait]
pub trait StreamFetcher {
  /// Dump the rendition list for an adaptive playlist (simulate only).
  async fn probe(&self, url: &str) -> Result<ProbeInfo>;

  /// Ask for the destination filename the fetch would produce, without
  /// fetching anything.
  async fn resolve_filename(&self, url: &str, dest_dir: &Path, template: &str) -> Result<String>;

  /// Perform the real fetch. Returns the destination filename as reported by
  /// the downloader.
  async fn fetch(&self, url: &str, dest_dir: &Path, template: &str) -> Result<String>;
}

/// The production fetcher: drives the yt-dlp executable.
pub struct YtDlp {
  program: PathBuf,
}

impl YtDlp {
  /// Locate the executable: [`PATH_ENV`] override, then `$PATH`, then the
  /// bundled default next to the binary.
  pub fn locate() -> Self {
    if let Ok(path) = std::env::var(PATH_ENV)
      && !path.is_empty()
    {
      return Self { program: path.into() };
    }
    if let Some(found) = find_in_path(if cfg!(windows) { "yt-dlp.exe" } else { "yt-dlp" }) {
      return Self { program: found };
    }
    let fallback = if cfg!(windows) { "./bin/yt-dlp.exe" } else { "./bin/yt-dlp" };
    Self { program: fallback.into() }
  }

  async fn run(&self, mut cmd: Command) -> Result<Vec<u8>> {
    let output = cmd
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .output()
      .await
      .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
          anyhow!(
            "yt-dlp not found at {}. Install it (e.g. pip install yt-dlp) or set {}",
            self.program.display(),
            PATH_ENV
          )
        } else {
          anyhow!(e).context("Failed to execute yt-dlp")
        }
      })?;

    if !output.status.success() {
      return Err(anyhow!("yt-dlp exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr)));
    }
    Ok(output.stdout)
  }

  fn filename_command(&self, url: &str, dest_dir: &Path, template: &str, simulate: bool) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.args(["--print", "filename"]);
    cmd.arg(if simulate { "--simulate" } else { "--no-simulate" });
    cmd.arg("-P").arg(dest_dir);
    cmd.args(["-o", template, "--restrict-filenames", "--"]);
    cmd.arg(url);
    cmd
  }
}

#[async_trait]
impl StreamFetcher for YtDlp {
  async fn probe(&self, url: &str) -> Result<ProbeInfo> {
    debug!(url, "probing playlist formats");
    let mut cmd = Command::new(&self.program);
    cmd.args(["-J", "--"]).arg(url);
    let stdout = self.run(cmd).await?;
    serde_json::from_slice(&stdout).context("yt-dlp probe output was not valid JSON")
  }

  async fn resolve_filename(&self, url: &str, dest_dir: &Path, template: &str) -> Result<String> {
    let stdout = self.run(self.filename_command(url, dest_dir, template, true)).await?;
    let name = String::from_utf8(stdout).context("yt-dlp filename output was not UTF-8")?;
    Ok(name.trim().to_string())
  }

  async fn fetch(&self, url: &str, dest_dir: &Path, template: &str) -> Result<String> {
    debug!(url, template, "fetching stream");
    let stdout = self.run(self.filename_command(url, dest_dir, template, false)).await?;
    let name = String::from_utf8(stdout).context("yt-dlp filename output was not UTF-8")?;
    Ok(name.trim().to_string())
  }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
  let path = std::env::var_os("PATH")?;
  std::env::split_paths(&path).map(|dir| dir.join(name)).find(|candidate| candidate.is_file())
}
