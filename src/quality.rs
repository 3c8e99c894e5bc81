use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ytdlp::VideoFormat;

/// Used only to decide which dimension a rendition is compared on.
pub const DEFAULT_ASPECT_RATIO: f64 = 16.0 / 9.0;

/// Quality labels, best first. The derived `Ord` follows declaration order,
/// so maps keyed by `Quality` iterate best-to-worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
  #[serde(rename = "4k")]
  Q2160,
  #[serde(rename = "1080")]
  Q1080,
  #[serde(rename = "720")]
  Q720,
  #[serde(rename = "480")]
  Q480,
  #[serde(rename = "360")]
  Q360,
  #[serde(rename = "unknown")]
  Unknown,
}

/// Fixed preference order, best first.
pub const ORDER: [Quality; 6] =
  [Quality::Q2160, Quality::Q1080, Quality::Q720, Quality::Q480, Quality::Q360, Quality::Unknown];

impl Quality {
  pub fn label(self) -> &'static str {
    match self {
      Quality::Q2160 => "4k",
      Quality::Q1080 => "1080",
      Quality::Q720 => "720",
      Quality::Q480 => "480",
      Quality::Q360 => "360",
      Quality::Unknown => "unknown",
    }
  }

  /// Reference width for adaptive matching.
  pub fn width(self) -> u32 {
    match self {
      Quality::Q2160 => 3840,
      Quality::Q1080 => 1920,
      Quality::Q720 => 1280,
      Quality::Q480 => 854,
      Quality::Q360 => 640,
      Quality::Unknown => 1920,
    }
  }

  /// Reference height for adaptive matching.
  pub fn height(self) -> u32 {
    match self {
      Quality::Q2160 => 2160,
      Quality::Q1080 => 1080,
      Quality::Q720 => 720,
      Quality::Q480 => 480,
      Quality::Q360 => 360,
      Quality::Unknown => 1080,
    }
  }

  fn rank(self) -> usize {
    ORDER.iter().position(|&q| q == self).unwrap_or(ORDER.len() - 1)
  }
}

impl fmt::Display for Quality {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Candidate order for a preferred label: the label itself, then every
/// strictly better label closest-first, then every strictly worse label
/// closest-first. `unknown` sits at the end of [`ORDER`], so it is always
/// included.
pub fn preference_order(preferred: Quality) -> Vec<Quality> {
  let idx = preferred.rank();
  let mut order = Vec::with_capacity(ORDER.len());
  order.push(preferred);
  order.extend(ORDER[..idx].iter().rev());
  order.extend(&ORDER[idx + 1..]);
  order
}

/// Pick the label to download from a file-based stream's declared set:
/// the first label of [`preference_order`] the stream declares, falling back
/// to `unknown`. The caller still has to check the label actually carries a
/// URL.
pub fn match_file<V>(declared: &std::collections::BTreeMap<Quality, V>, preferred: Quality) -> Quality {
  preference_order(preferred).into_iter().find(|q| declared.contains_key(q)).unwrap_or(Quality::Unknown)
}

/// Normalized distance between a rendition and a label's reference
/// dimensions. Wide formats compare on width, narrow ones on height; the
/// missing dimension is reconstructed through the aspect ratio.
pub fn distance(quality: Quality, format: &VideoFormat, aspect_ratio: f64) -> f64 {
  if aspect_ratio >= DEFAULT_ASPECT_RATIO {
    let target = quality.width() as f64;
    let effective = match format.width {
      Some(w) => w as f64,
      None => format.height.unwrap_or(0) as f64 * aspect_ratio,
    };
    (effective - target).abs() / target
  } else {
    let target = quality.height() as f64;
    let effective = match format.height {
      Some(h) => h as f64,
      None => format.width.unwrap_or(0) as f64 / aspect_ratio,
    };
    (effective - target).abs() / target
  }
}

/// Pick the best rendition for the wanted label order.
///
/// Every (candidate, label) pair is scored with the label's distance times a
/// tie-break weight of `1 + (rank + 1) / 10`, so among equally close
/// candidates the more-preferred label wins. Formats without a finite aspect
/// ratio are unusable and excluded; if that leaves nothing, fall back to the
/// last element of the unfiltered list rather than failing.
pub fn select_adaptive<'a>(wanted: &[Quality], formats: &'a [VideoFormat]) -> Option<&'a VideoFormat> {
  let mut candidates: Vec<(f64, &VideoFormat)> = formats
    .iter()
    .filter_map(|f| f.aspect_ratio.filter(|a| a.is_finite()).map(|a| (f, a)))
    .flat_map(|(f, aspect)| {
      wanted
        .iter()
        .enumerate()
        .map(move |(i, &q)| (distance(q, f, aspect) * (1.0 + (i as f64 + 1.0) / 10.0), f))
    })
    .collect();
  candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
  candidates.first().map(|&(_, f)| f).or_else(|| formats.last())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  fn format(id: &str, width: Option<u32>, height: Option<u32>, aspect_ratio: Option<f64>) -> VideoFormat {
    VideoFormat { format_id: id.to_string(), url: Some(format!("https://cdn/{id}")), width, height, aspect_ratio }
  }

  // --- preference_order ---

  #[test]
  fn preference_order_middle_label() {
    assert_eq!(
      preference_order(Quality::Q1080),
      vec![Quality::Q1080, Quality::Q2160, Quality::Q720, Quality::Q480, Quality::Q360, Quality::Unknown]
    );
  }

  #[test]
  fn preference_order_best_label() {
    assert_eq!(
      preference_order(Quality::Q2160),
      vec![Quality::Q2160, Quality::Q1080, Quality::Q720, Quality::Q480, Quality::Q360, Quality::Unknown]
    );
  }

  #[test]
  fn preference_order_worst_real_label() {
    assert_eq!(
      preference_order(Quality::Q360),
      vec![Quality::Q360, Quality::Q480, Quality::Q720, Quality::Q1080, Quality::Q2160, Quality::Unknown]
    );
  }

  // --- match_file ---

  fn declared(labels: &[Quality]) -> BTreeMap<Quality, ()> {
    labels.iter().map(|&q| (q, ())).collect()
  }

  #[test]
  fn file_match_prefers_next_better_over_worse() {
    let set = declared(&[Quality::Q720, Quality::Q360]);
    assert_eq!(match_file(&set, Quality::Q1080), Quality::Q720);
  }

  #[test]
  fn file_match_falls_to_worse_when_nothing_better() {
    let set = declared(&[Quality::Q360]);
    assert_eq!(match_file(&set, Quality::Q1080), Quality::Q360);
  }

  #[test]
  fn file_match_exact_wins() {
    let set = declared(&[Quality::Q2160, Quality::Q1080, Quality::Q360]);
    assert_eq!(match_file(&set, Quality::Q1080), Quality::Q1080);
  }

  #[test]
  fn file_match_empty_set_reports_unknown() {
    let set: BTreeMap<Quality, ()> = BTreeMap::new();
    assert_eq!(match_file(&set, Quality::Q1080), Quality::Unknown);
  }

  // --- distance ---

  #[test]
  fn distance_exact_width_is_zero() {
    let f = format("a", Some(1920), Some(1080), Some(16.0 / 9.0));
    assert_eq!(distance(Quality::Q1080, &f, 16.0 / 9.0), 0.0);
  }

  #[test]
  fn distance_narrower_width() {
    let f = format("a", Some(1280), Some(720), Some(16.0 / 9.0));
    let d = distance(Quality::Q1080, &f, 16.0 / 9.0);
    assert!((d - (1920.0 - 1280.0) / 1920.0).abs() < 1e-9);
  }

  #[test]
  fn distance_reconstructs_width_from_height() {
    let f = format("a", None, Some(1080), Some(16.0 / 9.0));
    let d = distance(Quality::Q1080, &f, 16.0 / 9.0);
    assert!(d < 1e-9);
  }

  #[test]
  fn distance_tall_formats_compare_height() {
    // 9:16 vertical video: height is the meaningful dimension.
    let f = format("a", Some(608), Some(1080), Some(9.0 / 16.0));
    let d = distance(Quality::Q1080, &f, 9.0 / 16.0);
    assert!(d < 1e-9);
  }

  // --- select_adaptive ---

  #[test]
  fn adaptive_picks_exact_match() {
    let formats = vec![
      format("240", Some(426), Some(240), Some(16.0 / 9.0)),
      format("1080", Some(1920), Some(1080), Some(16.0 / 9.0)),
      format("720", Some(1280), Some(720), Some(16.0 / 9.0)),
    ];
    let wanted = preference_order(Quality::Q1080);
    let best = select_adaptive(&wanted, &formats).unwrap();
    assert_eq!(best.format_id, "1080");
  }

  #[test]
  fn adaptive_penalty_prefers_better_label_at_equal_distance() {
    // Both formats sit at raw distance 0.1 from their nearest label; the one
    // whose nearest label ranks higher in the preference order must win.
    let formats = vec![
      format("near-4k", Some(3456), None, Some(16.0 / 9.0)),
      format("near-1080", Some(2112), None, Some(16.0 / 9.0)),
    ];
    let wanted = preference_order(Quality::Q1080);
    let best = select_adaptive(&wanted, &formats).unwrap();
    assert_eq!(best.format_id, "near-1080");
  }

  #[test]
  fn adaptive_skips_formats_without_aspect_ratio() {
    let formats = vec![
      format("audio", None, None, None),
      format("480", Some(854), Some(480), Some(16.0 / 9.0)),
    ];
    let wanted = preference_order(Quality::Q1080);
    let best = select_adaptive(&wanted, &formats).unwrap();
    assert_eq!(best.format_id, "480");
  }

  #[test]
  fn adaptive_empty_pool_falls_back_to_last() {
    let formats = vec![format("a", Some(640), Some(360), None), format("b", Some(854), Some(480), None)];
    let wanted = preference_order(Quality::Q1080);
    let best = select_adaptive(&wanted, &formats).unwrap();
    assert_eq!(best.format_id, "b");
  }

  #[test]
  fn adaptive_no_formats_is_none() {
    let wanted = preference_order(Quality::Q1080);
    assert!(select_adaptive(&wanted, &[]).is_none());
  }

  // --- serde labels ---

  #[test]
  fn quality_serializes_to_wire_labels() {
    assert_eq!(serde_json::to_string(&Quality::Q2160).unwrap(), "\"4k\"");
    assert_eq!(serde_json::to_string(&Quality::Unknown).unwrap(), "\"unknown\"");
    assert_eq!(serde_json::from_str::<Quality>("\"1080\"").unwrap(), Quality::Q1080);
  }
}
