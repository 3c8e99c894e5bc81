use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::paths::{self, Library};
use crate::persistence;
use crate::tmdb::MediaKind;

/// Season number → selected episode numbers. Seasons iterate in ascending
/// order, which is also the acquisition order.
pub type EpisodeSelection = BTreeMap<u32, Vec<u32>>;

/// Durable record of what the user asked to download. Created once when
/// selection finishes, persisted immediately, never mutated; loading one
/// later re-drives acquisition, and the memoization cache makes that
/// idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub name: String,
  pub kind: MediaKind,
  pub query: String,
  #[serde(rename = "tmdbId")]
  pub tmdb_id: u64,
  /// Empty (and absent from the wire) for movie jobs.
  #[serde(default, skip_serializing_if = "EpisodeSelection::is_empty", with = "season_keys")]
  pub episodes: EpisodeSelection,
}

impl Job {
  pub fn movie(query: &str, title: &str, tmdb_id: u64) -> Self {
    Self { name: derive_name(title), kind: MediaKind::Movie, query: query.to_string(), tmdb_id, episodes: EpisodeSelection::new() }
  }

  pub fn tv(query: &str, name: &str, tmdb_id: u64, episodes: EpisodeSelection) -> Self {
    Self { name: derive_name(name), kind: MediaKind::Tv, query: query.to_string(), tmdb_id, episodes }
  }

  /// Persist under the name-derived path. Write-once; jobs have no update or
  /// delete operation.
  pub async fn store(&self, library: &Library) -> Result<()> {
    persistence::save(&library.job(&self.name), self).await.context("Failed to store job")
  }
}

fn derive_name(title: &str) -> String {
  let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
  format!("{}-{stamp}", paths::kebab(title, 80))
}

/// Names of every persisted job, sorted, for the resume menu.
pub async fn list(library: &Library) -> Result<Vec<String>> {
  let dir = library.jobs_dir();
  let mut entries = match tokio::fs::read_dir(&dir).await {
    Ok(entries) => entries,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
  };

  let mut names = Vec::new();
  while let Some(entry) = entries.next_entry().await? {
    let path = entry.path();
    if path.extension().and_then(|e| e.to_str()) == Some("json")
      && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
    {
      names.push(stem.to_string());
    }
  }
  names.sort();
  Ok(names)
}

pub async fn load(library: &Library, name: &str) -> Result<Job> {
  match persistence::load(&library.job(name)).await? {
    Some(job) => Ok(job),
    None => bail!("No saved job named '{name}'."),
  }
}

/// Wire format for the episode mapping: keys are `"season-<n>"` strings for
/// compatibility with existing job files; in memory they are integers.
mod season_keys {
  use super::EpisodeSelection;
  use serde::de::{self, Deserializer};
  use serde::ser::{SerializeMap, Serializer};
  use serde::Deserialize;
  use std::collections::BTreeMap;

  pub fn serialize<S: Serializer>(map: &EpisodeSelection, serializer: S) -> Result<S::Ok, S::Error> {
    let mut out = serializer.serialize_map(Some(map.len()))?;
    for (season, episodes) in map {
      out.serialize_entry(&format!("season-{season}"), episodes)?;
    }
    out.end()
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EpisodeSelection, D::Error> {
    let raw: BTreeMap<String, Vec<u32>> = BTreeMap::deserialize(deserializer)?;
    raw
      .into_iter()
      .map(|(key, episodes)| {
        let season = key
          .strip_prefix("season-")
          .and_then(|n| n.parse::<u32>().ok())
          .ok_or_else(|| de::Error::custom(format!("invalid season key '{key}'")))?;
        Ok((season, episodes))
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tv_job_round_trips_season_keys() {
    let mut episodes = EpisodeSelection::new();
    episodes.insert(1, vec![1, 2]);
    episodes.insert(2, vec![5]);
    let job = Job::tv("ben 10", "Ben 10: Alien Force", 6040, episodes);

    let json = serde_json::to_value(&job).unwrap();
    assert_eq!(json["kind"], "tv");
    assert_eq!(json["tmdbId"], 6040);
    assert_eq!(json["episodes"]["season-1"], serde_json::json!([1, 2]));
    assert_eq!(json["episodes"]["season-2"], serde_json::json!([5]));

    let back: Job = serde_json::from_value(json).unwrap();
    assert_eq!(back, job);
    assert_eq!(back.episodes.get(&1), Some(&vec![1, 2]));
    assert_eq!(back.episodes.get(&2), Some(&vec![5]));
  }

  #[test]
  fn movie_job_omits_episodes() {
    let job = Job::movie("matrix", "The Matrix", 603);
    let json = serde_json::to_value(&job).unwrap();
    assert!(json.get("episodes").is_none());
    let back: Job = serde_json::from_value(json).unwrap();
    assert!(back.episodes.is_empty());
  }

  #[test]
  fn bad_season_key_is_rejected() {
    let raw = r#"{"name": "x", "kind": "tv", "query": "x", "tmdbId": 1, "episodes": {"series-1": [1]}}"#;
    assert!(serde_json::from_str::<Job>(raw).is_err());
  }

  #[test]
  fn job_name_is_filesystem_safe() {
    let job = Job::movie("matrix", "The Matrix: Reloaded?!", 604);
    assert!(job.name.starts_with("the-matrix-reloaded-"));
    assert!(job.name.chars().all(|c| c.is_alphanumeric() || c == '-'));
  }

  #[tokio::test]
  async fn store_list_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let library = Library::new(dir.path());

    assert!(list(&library).await.unwrap().is_empty());

    let job = Job::movie("dune", "Dune", 438631);
    job.store(&library).await.unwrap();

    let names = list(&library).await.unwrap();
    assert_eq!(names, vec![job.name.clone()]);

    let loaded = load(&library, &job.name).await.unwrap();
    assert_eq!(loaded, job);
  }

  #[tokio::test]
  async fn load_missing_job_fails() {
    let dir = tempfile::tempdir().unwrap();
    let library = Library::new(dir.path());
    assert!(load(&library, "nope").await.is_err());
  }
}
