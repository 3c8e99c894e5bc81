//! Stream acquisition: resolve sources for a job, pick a rendition, drive
//! the downloader, and collect caption sidecars.
//!
//! Failures scope to one acquisition unit. A movie job has a single unit, so
//! its failures are fatal; a TV job keeps going with the next episode.

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{error, warn};

use crate::config::Config;
use crate::jobs::Job;
use crate::paths::{self, Library};
use crate::persistence;
use crate::quality::{self, Quality};
use crate::sources::{Caption, MediaQuery, QualityFile, SourceResolver, SourceResult, Stream};
use crate::tmdb::{Details, MediaKind, MovieDetails, TvDetails};
use crate::ytdlp::StreamFetcher;

/// Caption tracks outside this allow-list are ignored.
const CAPTION_LANGUAGES: [&str; 1] = ["en"];

/// Filename stem caps leave room for the suffixes yt-dlp appends.
const MOVIE_STEM_MAX: usize = 240;
const EPISODE_STEM_MAX: usize = 230;

/// Everything one acquisition run needs. The resolver and fetcher sit behind
/// traits so tests can drive the orchestration without a network or a
/// subprocess.
pub struct Engine<'a> {
  pub library: &'a Library,
  pub downloads_dir: &'a Path,
  pub http: &'a reqwest::Client,
  pub resolver: &'a dyn SourceResolver,
  pub fetcher: &'a dyn StreamFetcher,
  pub config: Config,
}

/// One unit of acquisition: a movie, or a single episode.
enum Unit<'a> {
  Movie(&'a MovieDetails),
  Episode { tv: &'a TvDetails, season: u32, episode: u32 },
}

impl Unit<'_> {
  /// Output template handed to the downloader; `%(ext)s` is filled in by it.
  fn template(&self) -> String {
    match self {
      Unit::Movie(movie) => format!("{}.%(ext)s", paths::kebab(&movie.title, MOVIE_STEM_MAX)),
      Unit::Episode { tv, season, episode } => {
        format!("{}-S{season:02}-E{episode:02}.%(ext)s", paths::kebab(&tv.name, EPISODE_STEM_MAX))
      }
    }
  }

  fn describe(&self) -> String {
    match self {
      Unit::Movie(movie) => movie.title.clone(),
      Unit::Episode { tv, season, episode } => format!("{} S{season}E{episode}", tv.name),
    }
  }
}

impl Engine<'_> {
  pub async fn run(&self, job: &Job) -> Result<()> {
    match job.kind {
      MediaKind::Movie => self.movie(job).await,
      MediaKind::Tv => self.tv(job).await,
    }
  }

  async fn movie(&self, job: &Job) -> Result<()> {
    let details: Option<Details> = persistence::load(&self.library.details(job.kind, job.tmdb_id)).await?;
    let Some(Details::Movie(movie)) = details else {
      bail!("Movie not found.");
    };

    let path = self.library.movie_sources(job.kind, movie.id);
    let Some(sources) = self.resolve(&MediaQuery::movie(&movie), &path, &movie.title).await else {
      bail!("No sources found.");
    };
    println!("Located movie.");

    self.acquire(&sources.stream, &Unit::Movie(&movie)).await
  }

  async fn tv(&self, job: &Job) -> Result<()> {
    let details: Option<Details> = persistence::load(&self.library.details(job.kind, job.tmdb_id)).await?;
    let Some(Details::Tv(tv)) = details else {
      bail!("TV show not found.");
    };

    for (&season, episodes) in &job.episodes {
      for &episode in episodes {
        let path = self.library.episode_sources(job.kind, tv.id, season, episode);
        let media = MediaQuery::episode(&tv, season, episode);
        let unit = Unit::Episode { tv: &tv, season, episode };

        let Some(sources) = self.resolve(&media, &path, &unit.describe()).await else {
          eprintln!("No sources found for S{season}E{episode}.");
          continue;
        };
        println!("Located S{season}E{episode}.");

        if let Err(e) = self.acquire(&sources.stream, &unit).await {
          warn!(unit = %unit.describe(), err = %e, "acquisition failed");
          eprintln!("Failed to acquire {}: {e:#}", unit.describe());
        }
      }
    }
    Ok(())
  }

  /// Resolve sources through the memoization cache. Engine errors are logged
  /// and reported as absent; nothing is cached for them, so a rerun retries.
  async fn resolve(&self, media: &MediaQuery, path: &Path, unit: &str) -> Option<SourceResult> {
    match persistence::obtain(path, || async { self.resolver.resolve(media).await }).await {
      Ok(result) => result,
      Err(e) => {
        error!(unit, err = %e, "source resolution failed");
        None
      }
    }
  }

  async fn acquire(&self, stream: &Stream, unit: &Unit<'_>) -> Result<()> {
    match stream {
      Stream::File { qualities, captions } => self.acquire_file(qualities, captions, unit).await,
      Stream::Hls { playlist } => self.acquire_hls(playlist, unit).await,
    }
  }

  async fn acquire_file(
    &self,
    qualities: &BTreeMap<Quality, QualityFile>,
    captions: &[Caption],
    unit: &Unit<'_>,
  ) -> Result<()> {
    if !self.config.download {
      print_file_urls(qualities);
      return Ok(());
    }

    let matched = quality::match_file(qualities, self.config.resolution);
    let Some(file) = qualities.get(&matched) else {
      eprintln!("No matching download URLs found for {} or below.", self.config.resolution);
      print_file_urls(qualities);
      return Ok(());
    };
    println!("Quality matched: {matched}");

    let template = unit.template();
    let destination = self.fetcher.resolve_filename(&file.url, self.downloads_dir, &template).await?;
    self.fetcher.fetch(&file.url, self.downloads_dir, &template).await?;
    println!("Downloaded {destination}.");

    let base = destination.rsplit_once('.').map_or(destination.as_str(), |(stem, _)| stem);
    self.captions(captions, base).await
  }

  async fn acquire_hls(&self, playlist: &str, unit: &Unit<'_>) -> Result<()> {
    if !self.config.download {
      println!("{playlist}");
      return Ok(());
    }

    let wanted = quality::preference_order(self.config.resolution);
    let info = self.fetcher.probe(playlist).await?;
    let url = quality::select_adaptive(&wanted, &info.formats).and_then(|f| f.url.as_deref());
    let Some(url) = url else {
      eprintln!("No matching download URLs found for {}.", self.config.resolution);
      println!("{playlist}");
      return Ok(());
    };

    let template = unit.template();
    let destination = self.fetcher.resolve_filename(url, self.downloads_dir, &template).await?;
    self.fetcher.fetch(url, self.downloads_dir, &template).await?;
    println!("Downloaded {destination}.");
    Ok(())
  }

  /// Fetch allow-listed caption tracks next to the video as
  /// `<base>.<language>.<kind>`.
  async fn captions(&self, captions: &[Caption], base: &str) -> Result<()> {
    let matching =
      captions.iter().filter(|c| !c.language.is_empty() && CAPTION_LANGUAGES.contains(&c.language.as_str()));
    for caption in matching {
      let sidecar = format!("{base}.{}.{}", caption.language, caption.kind);
      let response = self
        .http
        .get(&caption.url)
        .send()
        .await
        .with_context(|| format!("Caption request failed for {}", caption.url))?
        .error_for_status()
        .context("Caption fetch returned an error status")?;
      let body = response.bytes().await.context("Failed to read caption body")?;
      tokio::fs::write(&sidecar, &body).await.with_context(|| format!("Failed to write {sidecar}"))?;
      println!("Saved captions {sidecar}.");
    }
    Ok(())
  }
}

fn print_file_urls(qualities: &BTreeMap<Quality, QualityFile>) {
  for (quality, file) in qualities {
    println!("{quality} - {} - {}", file.kind, file.url);
  }
}
