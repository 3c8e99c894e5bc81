use std::path::{Path, PathBuf};

use crate::tmdb::MediaKind;

/// Longest sanitized query token kept in a search artifact filename.
const QUERY_MAX_LEN: usize = 100;

/// The storage namespace root. All cached lookups, saved jobs, and the config
/// file live underneath it, one subtree per artifact type. Path derivation is
/// deterministic: identical inputs always yield identical paths, which is
/// what lets [`crate::persistence`] behave like a durable key-value store.
#[derive(Debug, Clone)]
pub struct Library {
  root: PathBuf,
}

impl Library {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Cached search results for a query.
  pub fn search(&self, kind: MediaKind, query: &str) -> PathBuf {
    self.root.join("search").join(kind.as_str()).join(format!("{}.json", sanitize(query, QUERY_MAX_LEN)))
  }

  /// Cached detail record for one item.
  pub fn details(&self, kind: MediaKind, id: u64) -> PathBuf {
    self.root.join("details").join(kind.as_str()).join(format!("{id}.json"))
  }

  /// Cached source-resolution result for a movie.
  pub fn movie_sources(&self, kind: MediaKind, id: u64) -> PathBuf {
    self.root.join("sources").join(kind.as_str()).join(format!("{id}.json"))
  }

  /// Cached source-resolution result for one TV episode.
  pub fn episode_sources(&self, kind: MediaKind, id: u64, season: u32, episode: u32) -> PathBuf {
    self
      .root
      .join("sources")
      .join(kind.as_str())
      .join(id.to_string())
      .join(format!("s{season}"))
      .join(format!("e{episode}.json"))
  }

  pub fn config(&self) -> PathBuf {
    self.root.join("config.json")
  }

  pub fn jobs_dir(&self) -> PathBuf {
    self.root.join("jobs")
  }

  pub fn job(&self, name: &str) -> PathBuf {
    self.jobs_dir().join(format!("{name}.json"))
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

/// Reduce free-form text to a filesystem-safe token: runs of anything other
/// than ASCII alphanumerics become a single `-`, trimmed at both ends, capped
/// at `max` bytes on a char boundary.
pub fn sanitize(text: &str, max: usize) -> String {
  let mut out = String::with_capacity(text.len());
  let mut pending_dash = false;
  for c in text.chars() {
    if c.is_ascii_alphanumeric() {
      if pending_dash && !out.is_empty() {
        out.push('-');
      }
      pending_dash = false;
      out.push(c);
    } else {
      pending_dash = true;
    }
  }
  truncate_on_boundary(&out, max)
}

/// Kebab-cased filename stem for downloaded media: lowercase words joined by
/// `-`, anything non-alphanumeric acting as a separator, capped at `max`
/// bytes. Unicode letters survive (yt-dlp's own restrict pass handles the
/// rest).
pub fn kebab(title: &str, max: usize) -> String {
  let mut out = String::with_capacity(title.len());
  let mut pending_dash = false;
  for c in title.chars() {
    if c.is_alphanumeric() {
      if pending_dash && !out.is_empty() {
        out.push('-');
      }
      pending_dash = false;
      for lower in c.to_lowercase() {
        out.push(lower);
      }
    } else {
      pending_dash = true;
    }
  }
  truncate_on_boundary(&out, max)
}

fn truncate_on_boundary(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut take = max;
  while take > 0 && !s.is_char_boundary(take) {
    take -= 1;
  }
  s[..take].trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn library() -> Library {
    Library::new("data")
  }

  // --- derivation determinism ---

  #[test]
  fn identical_inputs_identical_paths() {
    let lib = library();
    assert_eq!(lib.search(MediaKind::Tv, "ben 10"), lib.search(MediaKind::Tv, "ben 10"));
    assert_eq!(lib.details(MediaKind::Movie, 603), lib.details(MediaKind::Movie, 603));
    assert_eq!(
      lib.episode_sources(MediaKind::Tv, 6040, 1, 12),
      lib.episode_sources(MediaKind::Tv, 6040, 1, 12)
    );
  }

  #[test]
  fn distinct_ids_distinct_paths() {
    let lib = library();
    for id in 0..50u64 {
      assert_ne!(lib.details(MediaKind::Movie, id), lib.details(MediaKind::Movie, id + 1));
      assert_ne!(lib.movie_sources(MediaKind::Movie, id), lib.movie_sources(MediaKind::Movie, id + 1));
    }
    assert_ne!(
      lib.episode_sources(MediaKind::Tv, 6040, 1, 2),
      lib.episode_sources(MediaKind::Tv, 6040, 2, 1)
    );
  }

  #[test]
  fn kind_separates_subtrees() {
    let lib = library();
    assert_ne!(lib.details(MediaKind::Movie, 42), lib.details(MediaKind::Tv, 42));
    assert_ne!(lib.search(MediaKind::Movie, "dune"), lib.search(MediaKind::Tv, "dune"));
  }

  #[test]
  fn expected_layout() {
    let lib = library();
    assert_eq!(lib.search(MediaKind::Tv, "ben 10"), PathBuf::from("data/search/tv/ben-10.json"));
    assert_eq!(lib.details(MediaKind::Movie, 603), PathBuf::from("data/details/movie/603.json"));
    assert_eq!(lib.movie_sources(MediaKind::Movie, 603), PathBuf::from("data/sources/movie/603.json"));
    assert_eq!(
      lib.episode_sources(MediaKind::Tv, 6040, 1, 12),
      PathBuf::from("data/sources/tv/6040/s1/e12.json")
    );
    assert_eq!(lib.config(), PathBuf::from("data/config.json"));
    assert_eq!(lib.job("dune-20240101-120000"), PathBuf::from("data/jobs/dune-20240101-120000.json"));
  }

  // --- sanitize ---

  #[test]
  fn sanitize_collapses_runs() {
    assert_eq!(sanitize("ben 10: alien force", 100), "ben-10-alien-force");
    assert_eq!(sanitize("  spaced   out  ", 100), "spaced-out");
    assert_eq!(sanitize("a/b\\c", 100), "a-b-c");
  }

  #[test]
  fn sanitize_caps_length() {
    let long = "x".repeat(300);
    assert_eq!(sanitize(&long, 100).len(), 100);
  }

  #[test]
  fn sanitize_drops_trailing_separator_after_cap() {
    // A dash falling exactly on the cap boundary must not survive.
    let text = format!("{} tail", "x".repeat(99));
    let token = sanitize(&text, 100);
    assert!(!token.ends_with('-'));
  }

  // --- kebab ---

  #[test]
  fn kebab_lowercases_and_joins() {
    assert_eq!(kebab("The Matrix Reloaded", 240), "the-matrix-reloaded");
    assert_eq!(kebab("Ben 10: Alien Force", 230), "ben-10-alien-force");
  }

  #[test]
  fn kebab_keeps_unicode_letters() {
    assert_eq!(kebab("Amélie", 240), "amélie");
  }

  #[test]
  fn kebab_caps_on_char_boundary() {
    let title = "é".repeat(200); // 2 bytes per char
    let stem = kebab(&title, 9);
    assert!(stem.len() <= 9);
    assert!(stem.chars().all(|c| c == 'é'));
  }
}
