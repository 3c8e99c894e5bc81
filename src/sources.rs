use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::quality::Quality;
use crate::tmdb::{MovieDetails, TvDetails};

/// Environment variable naming the resolver endpoint.
pub const RESOLVER_URL_ENV: &str = "RESOLVER_URL";

/// External identifier attached to a season or episode number. The id may be
/// empty when the metadata source did not provide one; the resolver then
/// works from numbers alone, which can reduce match precision but is not an
/// error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberedId {
  pub number: u32,
  #[serde(rename = "tmdbId")]
  pub tmdb_id: String,
}

/// What the resolver is asked to locate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaQuery {
  #[serde(rename_all = "camelCase")]
  Movie { title: String, release_year: i32, tmdb_id: String },
  #[serde(rename = "show", rename_all = "camelCase")]
  Show { title: String, release_year: i32, tmdb_id: String, season: NumberedId, episode: NumberedId },
}

impl MediaQuery {
  pub fn movie(movie: &MovieDetails) -> Self {
    MediaQuery::Movie {
      title: movie.title.clone(),
      release_year: release_year(&movie.release_date),
      tmdb_id: movie.id.to_string(),
    }
  }

  /// Query for one episode. The season id comes from the show's season list;
  /// a season selected against a stale detail record simply gets an empty id.
  /// Per-episode ids are not present in the detail record at all.
  pub fn episode(tv: &TvDetails, season_number: u32, episode_number: u32) -> Self {
    let season_tmdb_id = tv
      .seasons
      .iter()
      .find(|s| s.season_number == season_number)
      .map(|s| s.id.to_string())
      .unwrap_or_default();
    MediaQuery::Show {
      title: tv.name.clone(),
      release_year: release_year(&tv.first_air_date),
      tmdb_id: tv.id.to_string(),
      season: NumberedId { number: season_number, tmdb_id: season_tmdb_id },
      episode: NumberedId { number: episode_number, tmdb_id: String::new() },
    }
  }
}

/// Degraded-input policy for upstream date strings: the 4-digit year prefix,
/// or 0 when the string doesn't start with one. A zero year is a valid,
/// deliberately vague query.
pub fn release_year(date: &str) -> i32 {
  date.get(0..4).and_then(|s| s.parse().ok()).unwrap_or(0)
}

/// A playable stream descriptor, exactly one of the two shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Stream {
  File {
    #[serde(default)]
    qualities: BTreeMap<Quality, QualityFile>,
    #[serde(default)]
    captions: Vec<Caption>,
  },
  Hls {
    playlist: String,
  },
}

/// One direct-file rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFile {
  #[serde(rename = "type")]
  pub kind: String,
  pub url: String,
}

/// A caption track offered alongside a file-based stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
  #[serde(rename = "type")]
  pub kind: String,
  pub url: String,
  #[serde(default)]
  pub language: String,
}

/// The resolver's answer for one media query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
  #[serde(rename = "sourceId")]
  pub source_id: String,
  #[serde(rename = "embedId", default, skip_serializing_if = "Option::is_none")]
  pub embed_id: Option<String>,
  pub stream: Stream,
}

/// Seam around the external stream-discovery engine. Callers never invoke it
/// directly: every call goes through the memoization cache at a path derived
/// in [`crate::paths`], so a given movie or episode is resolved at most once.
#[async_trait]
pub trait SourceResolver {
  /// `Ok(None)` means resolution ran and found nothing usable; errors are
  /// transport or engine failures and are never cached.
  async fn resolve(&self, media: &MediaQuery) -> Result<Option<SourceResult>>;
}

/// Production resolver: posts the query to a self-hosted resolver endpoint
/// that wraps the discovery engine.
pub struct HttpResolver {
  client: Client,
  endpoint: String,
}

impl HttpResolver {
  pub fn from_env(client: Client) -> Result<Self> {
    let endpoint = std::env::var(RESOLVER_URL_ENV)
      .with_context(|| format!("{RESOLVER_URL_ENV} is not set; point it at a stream resolver endpoint"))?;
    Ok(Self { client, endpoint })
  }

  pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
    Self { client, endpoint: endpoint.into() }
  }
}

#[async_trait]
impl SourceResolver for HttpResolver {
  async fn resolve(&self, media: &MediaQuery) -> Result<Option<SourceResult>> {
    let response = self
      .client
      .post(&self.endpoint)
      .json(media)
      .send()
      .await
      .context("Source resolution request failed")?
      .error_for_status()
      .context("Source resolver returned an error status")?;
    // The engine answers `null` when it found nothing; that is a real result
    // and gets cached like any other.
    response.json().await.context("Source resolver response was not valid JSON")
  }
}
