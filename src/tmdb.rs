use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BASE_URL: &str = "https://api.themoviedb.org/3";

/// Environment variable holding the TMDB read access token (v4 bearer).
pub const TOKEN_ENV: &str = "TMDB_API_READ_ACCESS_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
  Movie,
  Tv,
}

impl MediaKind {
  pub fn as_str(self) -> &'static str {
    match self {
      MediaKind::Movie => "movie",
      MediaKind::Tv => "tv",
    }
  }
}

impl fmt::Display for MediaKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
  pub page: u32,
  pub results: Vec<SearchItem>,
  pub total_pages: u32,
  pub total_results: u32,
}

/// A single search hit. Movie results carry `title`/`release_date`, TV
/// results carry `name`/`first_air_date`; the other set stays `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
  pub id: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub original_title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub release_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub original_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_air_date: Option<String>,
  #[serde(default)]
  pub overview: String,
}

impl SearchItem {
  /// The display title, whichever of the movie/tv field pair is present.
  pub fn display_title(&self) -> &str {
    self.title.as_deref().or(self.name.as_deref()).unwrap_or("(untitled)")
  }

  /// Menu label: `Title (date)`, with the original-language title appended
  /// when it differs.
  pub fn label(&self) -> String {
    let title = self.display_title();
    let original = self.original_title.as_deref().or(self.original_name.as_deref());
    let date = self.release_date.as_deref().or(self.first_air_date.as_deref()).unwrap_or("");
    match original {
      Some(orig) if orig != title => format!("{title} = {orig} ({date})"),
      _ => format!("{title} ({date})"),
    }
  }
}

/// Full detail record for one item, tagged by kind so cached artifacts carry
/// their discriminant like every other stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Details {
  #[serde(rename = "movie")]
  Movie(MovieDetails),
  #[serde(rename = "tv")]
  Tv(TvDetails),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetails {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub original_title: String,
  #[serde(default)]
  pub release_date: String,
  #[serde(default)]
  pub overview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvDetails {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub original_name: String,
  #[serde(default)]
  pub first_air_date: String,
  #[serde(default)]
  pub overview: String,
  #[serde(default)]
  pub seasons: Vec<Season>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
  pub id: u64,
  pub season_number: u32,
  #[serde(default)]
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub air_date: Option<String>,
  #[serde(default)]
  pub episode_count: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub overview: Option<String>,
}

/// TMDB v3 client: title search plus movie/show detail fetches. Only the
/// fields this program consumes are modeled; the rest of the response is
/// dropped.
pub struct Tmdb {
  client: Client,
  token: String,
}

impl Tmdb {
  /// Build a client using the bearer token from [`TOKEN_ENV`].
  pub fn from_env(client: Client) -> Result<Self> {
    let token =
      std::env::var(TOKEN_ENV).with_context(|| format!("{TOKEN_ENV} is not set; a TMDB read access token is required"))?;
    Ok(Self { client, token })
  }

  pub async fn search(&self, kind: MediaKind, query: &str) -> Result<SearchPage> {
    let url = format!("{BASE_URL}/search/{kind}");
    let response = self
      .client
      .get(&url)
      .query(&[("query", query)])
      .bearer_auth(&self.token)
      .header("accept", "application/json")
      .send()
      .await
      .with_context(|| format!("TMDB search request failed for '{query}'"))?
      .error_for_status()
      .context("TMDB search returned an error status")?;
    response.json().await.context("TMDB search response was not valid JSON")
  }

  pub async fn details(&self, kind: MediaKind, id: u64) -> Result<Details> {
    let url = format!("{BASE_URL}/{kind}/{id}");
    let response = self
      .client
      .get(&url)
      .bearer_auth(&self.token)
      .header("accept", "application/json")
      .send()
      .await
      .with_context(|| format!("TMDB details request failed for {kind} {id}"))?
      .error_for_status()
      .context("TMDB details returned an error status")?;
    match kind {
      MediaKind::Movie => Ok(Details::Movie(response.json().await.context("TMDB movie details were not valid JSON")?)),
      MediaKind::Tv => Ok(Details::Tv(response.json().await.context("TMDB show details were not valid JSON")?)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn search_item_label_formats() {
    let item = SearchItem {
      id: 6040,
      title: None,
      original_title: None,
      release_date: None,
      name: Some("Ben 10: Alien Force".into()),
      original_name: Some("Ben 10: Alien Force".into()),
      first_air_date: Some("2008-04-18".into()),
      overview: String::new(),
    };
    assert_eq!(item.label(), "Ben 10: Alien Force (2008-04-18)");
  }

  #[test]
  fn search_item_label_shows_differing_original() {
    let item = SearchItem {
      id: 129,
      title: Some("Spirited Away".into()),
      original_title: Some("千と千尋の神隠し".into()),
      release_date: Some("2001-07-20".into()),
      name: None,
      original_name: None,
      first_air_date: None,
      overview: String::new(),
    };
    assert_eq!(item.label(), "Spirited Away = 千と千尋の神隠し (2001-07-20)");
  }

  #[test]
  fn details_round_trip_keeps_kind_tag() {
    let details = Details::Movie(MovieDetails {
      id: 603,
      title: "The Matrix".into(),
      original_title: "The Matrix".into(),
      release_date: "1999-03-31".into(),
      overview: String::new(),
    });
    let json = serde_json::to_value(&details).unwrap();
    assert_eq!(json["kind"], "movie");
    assert_eq!(json["id"], 603);
    let back: Details = serde_json::from_value(json).unwrap();
    assert!(matches!(back, Details::Movie(m) if m.title == "The Matrix"));
  }

  #[test]
  fn tv_details_parse_ignores_unknown_fields() {
    let raw = r#"{
      "kind": "tv",
      "id": 6040,
      "name": "Ben 10: Alien Force",
      "first_air_date": "2008-04-18",
      "number_of_episodes": 46,
      "seasons": [
        {"id": 17402, "season_number": 1, "name": "Season 1", "episode_count": 13, "vote_average": 7.1}
      ]
    }"#;
    let details: Details = serde_json::from_str(raw).unwrap();
    let Details::Tv(tv) = details else { panic!("expected tv details") };
    assert_eq!(tv.seasons.len(), 1);
    assert_eq!(tv.seasons[0].season_number, 1);
    assert_eq!(tv.seasons[0].episode_count, 13);
  }
}
