use anyhow::{Context, Result, bail};
use inquire::{MultiSelect, Select, Text};
use std::fmt;
use std::path::Path;

use crate::config;
use crate::download::Engine;
use crate::jobs::{self, EpisodeSelection, Job};
use crate::paths::Library;
use crate::persistence;
use crate::sources::HttpResolver;
use crate::tmdb::{Details, MediaKind, SearchPage, Tmdb, TvDetails};
use crate::ytdlp::YtDlp;

/// Interactive flow: gather what to download (or pick a saved job), then
/// hand it to the acquisition engine.
pub async fn run(library: &Library, downloads_dir: &Path) -> Result<()> {
  let http = reqwest::Client::new();

  let job = select_job(library, &http).await?;
  let config = config::obtain(library).await?;

  let resolver = HttpResolver::from_env(http.clone())?;
  let fetcher = YtDlp::locate();
  let engine =
    Engine { library, downloads_dir, http: &http, resolver: &resolver, fetcher: &fetcher, config };
  engine.run(&job).await
}

const NEW_DOWNLOAD: &str = "Start a new download";
const RESUME_JOB: &str = "Resume a saved job";

async fn select_job(library: &Library, http: &reqwest::Client) -> Result<Job> {
  let saved = jobs::list(library).await?;
  if !saved.is_empty() {
    let choice = Select::new("What would you like to do?", vec![NEW_DOWNLOAD, RESUME_JOB])
      .prompt()
      .context("Selection aborted")?;
    if choice == RESUME_JOB {
      let name =
        Select::new("Which job would you like to resume?", saved).prompt().context("Selection aborted")?;
      return jobs::load(library, &name).await;
    }
  }
  new_job(library, http).await
}

/// A search hit as a menu entry; the index points back into the page.
struct ResultChoice {
  index: usize,
  label: String,
}

impl fmt::Display for ResultChoice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.label)
  }
}

async fn new_job(library: &Library, http: &reqwest::Client) -> Result<Job> {
  let kind = Select::new("What do you want to download?", vec![MediaKind::Movie, MediaKind::Tv])
    .prompt()
    .context("Selection aborted")?;
  let query = Text::new("Enter the search query:").prompt().context("Selection aborted")?;

  let tmdb = Tmdb::from_env(http.clone())?;

  let page: SearchPage = persistence::obtain(&library.search(kind, &query), || async {
    tmdb.search(kind, &query).await
  })
  .await
  .with_context(|| format!("Search failed for '{query}' (nothing was cached; try again)"))?;
  if page.results.is_empty() {
    bail!("No results for '{query}'.");
  }

  let choices: Vec<ResultChoice> =
    page.results.iter().enumerate().map(|(index, item)| ResultChoice { index, label: item.label() }).collect();
  let chosen = Select::new("Which item would you like to download?", choices)
    .prompt()
    .context("Selection aborted")?;
  let item = &page.results[chosen.index];

  let details: Details = persistence::obtain(&library.details(kind, item.id), || async {
    tmdb.details(kind, item.id).await
  })
  .await
  .context("Unable to get details!")?;

  let job = match details {
    Details::Movie(movie) => Job::movie(&query, &movie.title, movie.id),
    Details::Tv(tv) => {
      let episodes = select_episodes(&tv)?;
      Job::tv(&query, &tv.name, tv.id, episodes)
    }
  };

  job.store(library).await?;
  println!("Saved job '{}'.", job.name);
  Ok(job)
}

/// A season as a menu entry, keyed by its number.
struct SeasonChoice {
  number: u32,
  label: String,
}

impl fmt::Display for SeasonChoice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.label)
  }
}

fn select_episodes(tv: &TvDetails) -> Result<EpisodeSelection> {
  let season_choices: Vec<SeasonChoice> = tv
    .seasons
    .iter()
    .map(|s| SeasonChoice {
      number: s.season_number,
      label: format!("{}: {} ({})", s.season_number, s.name, s.air_date.as_deref().unwrap_or("unaired")),
    })
    .collect();
  let selected = MultiSelect::new("Which seasons would you like to download?", season_choices)
    .prompt()
    .context("Selection aborted")?;

  let mut episodes = EpisodeSelection::new();
  for choice in selected {
    let Some(season) = tv.seasons.iter().find(|s| s.season_number == choice.number) else {
      continue;
    };
    let numbers: Vec<u32> = (1..=season.episode_count).collect();
    let message =
      format!("Which episodes would you like to download for {} ({})?", season.name, season.season_number);
    let picked = MultiSelect::new(&message, numbers).prompt().context("Selection aborted")?;
    if !picked.is_empty() {
      episodes.insert(season.season_number, picked);
    }
  }

  if episodes.is_empty() {
    bail!("No episodes selected.");
  }
  Ok(episodes)
}
