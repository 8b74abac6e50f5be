//! Release title filters applied before results leave the aggregator.
//!
//! - Blacklist: case-insensitive substring match on configured words.
//! - Movies: year must match the expected year or the year after; undated
//!   titles only pass for recent movies.
//! - Series: exact episode > season pack > season mention, in decreasing
//!   strictness.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::{EpisodeRange, ReleaseCandidate};
use crate::media::{MediaItem, MediaKind};

static EPISODE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bs(\d{1,2})[ ._]?e(\d{1,3})(?:[ ._]?(?:-[ ._]?e?|e)(\d{1,3}))?")
        .expect("valid episode regex")
});

static CROSS_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})x(\d{2,3})\b").expect("valid NxNN regex"));

static SEASON_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:s|seasons?[ ._-]?)(\d{1,2})[ ._]?-[ ._]?s?(\d{1,2})\b")
        .expect("valid season range regex")
});

static SEASON_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:s|season[ ._-]?|saison[ ._-]?|staffel[ ._-]?|temporada[ ._-]?|stagione[ ._-]?)(\d{1,2})\b")
        .expect("valid season regex")
});

static YEAR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9x])((?:19|20)\d{2})(?:$|[^0-9xp])").expect("valid year regex")
});

/// Explicit season-pack markers, including localized ones.
const PACK_MARKERS: &[&str] = &[
    "complete",
    "full season",
    "season pack",
    "integrale",
    "intégrale",
    "komplett",
    "completa",
    "completo",
    "complète",
    "volledig",
];

/// An `SxxEyy`-style tag found in a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeTag {
    pub season: u32,
    pub first: u32,
    pub last: u32,
}

/// How a series release relates to the requested episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeriesMatch {
    /// Names the requested episode (possibly within a multi-episode range).
    ExactEpisode,
    /// A pack for the requested season.
    SeasonPack,
    /// Merely covers the season (multi-season range or undated complete set).
    SeasonMention,
}

/// Case-insensitive substring match against the blacklist.
pub fn is_blacklisted(title: &str, words: &[String]) -> bool {
    let lower = title.to_lowercase();
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .any(|w| !w.is_empty() && lower.contains(&w))
}

/// All year-like tokens (1900-2099) in a title, excluding resolutions such as
/// `1920x1080`.
pub fn extract_years(title: &str) -> Vec<u32> {
    // Separators are consumed by the match, so pad between tokens to let
    // adjacent years ("2019.2020") both match.
    let spaced = title.replace(['.', '_', ' ', '-', '(', ')', '[', ']'], "  ");
    YEAR_TOKEN
        .captures_iter(&spaced)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Year rule for movie releases.
///
/// A dated release passes when any year token equals `expected` or
/// `expected + 1`. An undated release passes only when `expected` is within
/// `recent_window` years of `current_year`.
pub fn matches_movie_year(title: &str, expected: u32, current_year: u32, recent_window: u32) -> bool {
    let years = extract_years(title);
    if years.is_empty() {
        return expected.saturating_add(recent_window) >= current_year;
    }
    years
        .iter()
        .any(|&y| y == expected || y == expected.saturating_add(1))
}

/// All `SxxEyy` / `NxNN` tags in a title.
pub fn episode_tags(title: &str) -> Vec<EpisodeTag> {
    let mut tags: Vec<EpisodeTag> = EPISODE_TAG
        .captures_iter(title)
        .filter_map(|caps| {
            let season = caps.get(1)?.as_str().parse().ok()?;
            let first: u32 = caps.get(2)?.as_str().parse().ok()?;
            let last = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .filter(|&l: &u32| l >= first)
                .unwrap_or(first);
            Some(EpisodeTag {
                season,
                first,
                last,
            })
        })
        .collect();

    tags.extend(CROSS_TAG.captures_iter(title).filter_map(|caps| {
        let season = caps.get(1)?.as_str().parse().ok()?;
        let episode = caps.get(2)?.as_str().parse().ok()?;
        Some(EpisodeTag {
            season,
            first: episode,
            last: episode,
        })
    }));

    tags
}

/// Season numbers mentioned without an episode (`S02`, `Season 2`, ...).
fn season_tokens(title: &str) -> Vec<u32> {
    SEASON_TOKEN
        .captures_iter(title)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

fn season_ranges(title: &str) -> Vec<(u32, u32)> {
    SEASON_RANGE
        .captures_iter(title)
        .filter_map(|caps| {
            let from = caps.get(1)?.as_str().parse().ok()?;
            let to = caps.get(2)?.as_str().parse().ok()?;
            (to > from).then_some((from, to))
        })
        .collect()
}

fn has_pack_marker(title: &str) -> bool {
    let normalized = title.to_lowercase().replace(['.', '_', '-'], " ");
    PACK_MARKERS.iter().any(|m| normalized.contains(m))
}

/// Season-pack heuristic: an explicit marker, or a mention of the season
/// with no episode tag next to it.
pub fn is_season_pack(title: &str, season: u32) -> bool {
    if has_pack_marker(title) {
        return true;
    }
    episode_tags(title).is_empty() && season_tokens(title).contains(&season)
}

/// Classify a series release against the requested episode.
///
/// Returns `None` when the release names other episodes or other seasons only.
pub fn classify_series(title: &str, season: u32, episode: u32) -> Option<(SeriesMatch, Option<EpisodeRange>)> {
    let tags = episode_tags(title);
    if !tags.is_empty() {
        return tags
            .iter()
            .find(|t| t.season == season && (t.first..=t.last).contains(&episode))
            .map(|t| {
                let range = (t.last > t.first).then_some(EpisodeRange {
                    first: t.first,
                    last: t.last,
                });
                (SeriesMatch::ExactEpisode, range)
            });
    }

    let ranges = season_ranges(title);
    if ranges.iter().any(|&(from, to)| (from..=to).contains(&season)) {
        return Some((SeriesMatch::SeasonMention, None));
    }

    let seasons = season_tokens(title);
    if seasons.contains(&season) {
        return Some((SeriesMatch::SeasonPack, None));
    }

    if seasons.is_empty() && ranges.is_empty() && has_pack_marker(title) {
        return Some((SeriesMatch::SeasonMention, None));
    }

    None
}

/// Stateless filter settings shared by one aggregation pass.
#[derive(Debug, Clone)]
pub struct ReleaseFilter {
    pub blacklist: Vec<String>,
    pub current_year: u32,
    pub recent_window: u32,
}

impl ReleaseFilter {
    /// Keep the candidates acceptable for `item`, annotating series results
    /// with pack metadata.
    pub fn apply(&self, item: &MediaItem, candidates: Vec<ReleaseCandidate>) -> Vec<ReleaseCandidate> {
        candidates
            .into_iter()
            .filter(|c| !is_blacklisted(&c.title, &self.blacklist))
            .filter_map(|c| self.accept(item, c))
            .collect()
    }

    fn accept(&self, item: &MediaItem, mut candidate: ReleaseCandidate) -> Option<ReleaseCandidate> {
        match item.kind() {
            MediaKind::Movie => match item.year {
                Some(year)
                    if !matches_movie_year(
                        &candidate.title,
                        year,
                        self.current_year,
                        self.recent_window,
                    ) =>
                {
                    None
                }
                _ => Some(candidate),
            },
            MediaKind::Episode => {
                let (kind, range) = classify_series(&candidate.title, item.season, item.episode)?;
                candidate.episode_range = range;
                candidate.season_pack = match kind {
                    SeriesMatch::ExactEpisode => range.is_some(),
                    SeriesMatch::SeasonPack | SeriesMatch::SeasonMention => true,
                };
                Some(candidate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_blacklist_case_insensitive() {
        let list = words(&["CAM", "hdts"]);
        assert!(is_blacklisted("Movie.2024.cam.x264", &list));
        assert!(is_blacklisted("Movie.2024.HDTS", &list));
        assert!(!is_blacklisted("Movie.2024.1080p.WEB-DL", &list));
    }

    #[test]
    fn test_blacklist_ignores_empty_words() {
        assert!(!is_blacklisted("Anything", &words(&["", "  "])));
    }

    #[test]
    fn test_extract_years() {
        assert_eq!(extract_years("Heat.1995.1080p.BluRay"), vec![1995]);
        assert_eq!(extract_years("Blade Runner 2049 (2017) 2160p"), vec![2049, 2017]);
        assert!(extract_years("Movie.1920x1080.WEB").is_empty());
        assert!(extract_years("Movie.2160p.HDR").is_empty());
        assert_eq!(extract_years("Movie.2019.2020.Remaster"), vec![2019, 2020]);
    }

    #[test]
    fn test_year_match_exact_and_next() {
        assert!(matches_movie_year("Dune.2021.2160p", 2021, 2026, 2));
        assert!(matches_movie_year("Dune.2022.2160p", 2021, 2026, 2));
        assert!(!matches_movie_year("Dune.1984.1080p", 2021, 2026, 2));
        assert!(!matches_movie_year("Dune.2020.1080p", 2021, 2026, 2));
    }

    #[test]
    fn test_year_match_undated_recency() {
        assert!(matches_movie_year("Movie.1080p.WEB", 2025, 2026, 2));
        assert!(matches_movie_year("Movie.1080p.WEB", 2024, 2026, 2));
        assert!(!matches_movie_year("Movie.1080p.WEB", 2020, 2026, 2));
    }

    #[test]
    fn test_year_match_extreme_values_do_not_overflow() {
        assert!(matches_movie_year("Movie.1080p.WEB", u32::MAX, 2026, 2));
        assert!(matches_movie_year("Movie.1080p.WEB", 2000, 2026, u32::MAX));
        assert!(!matches_movie_year("Dune.2021.2160p", u32::MAX, 2026, 2));
    }

    #[test]
    fn test_episode_tags() {
        assert_eq!(
            episode_tags("Show.S01E02.1080p"),
            vec![EpisodeTag { season: 1, first: 2, last: 2 }]
        );
        assert_eq!(
            episode_tags("Show.S01E01-E03.720p"),
            vec![EpisodeTag { season: 1, first: 1, last: 3 }]
        );
        assert_eq!(
            episode_tags("Show.S02E04E05"),
            vec![EpisodeTag { season: 2, first: 4, last: 5 }]
        );
        assert_eq!(
            episode_tags("Show 3x07 HDTV"),
            vec![EpisodeTag { season: 3, first: 7, last: 7 }]
        );
        assert!(episode_tags("Show.S01.1080p").is_empty());
        assert!(episode_tags("Movie.1920x1080").is_empty());
    }

    #[test]
    fn test_season_pack_detection() {
        assert!(is_season_pack("Show.S01.1080p.WEB-DL", 1));
        assert!(is_season_pack("Show Season 2 720p", 2));
        assert!(is_season_pack("Show.Staffel.3.German", 3));
        assert!(is_season_pack("Show.COMPLETE.1080p", 1));
        assert!(is_season_pack("Show.Full.Season.1080p", 4));
        assert!(!is_season_pack("Show.S01E03.1080p", 1));
        assert!(!is_season_pack("Show.S02.1080p", 1));
    }

    #[test]
    fn test_classify_series_strictness_order() {
        assert_eq!(
            classify_series("Show.S01E02.1080p", 1, 2),
            Some((SeriesMatch::ExactEpisode, None))
        );
        assert_eq!(
            classify_series("Show.S01E01-E05.1080p", 1, 2),
            Some((SeriesMatch::ExactEpisode, Some(EpisodeRange { first: 1, last: 5 })))
        );
        assert_eq!(
            classify_series("Show.S01.1080p", 1, 2),
            Some((SeriesMatch::SeasonPack, None))
        );
        assert_eq!(
            classify_series("Show.S01-S03.1080p", 2, 2),
            Some((SeriesMatch::SeasonMention, None))
        );
        assert_eq!(
            classify_series("Show.Complete.Series.1080p", 2, 2),
            Some((SeriesMatch::SeasonMention, None))
        );
    }

    #[test]
    fn test_classify_series_rejects_other_episodes() {
        assert_eq!(classify_series("Show.S01E05.1080p", 1, 2), None);
        assert_eq!(classify_series("Show.S02E02.1080p", 1, 2), None);
        assert_eq!(classify_series("Show.S02.1080p", 1, 2), None);
        assert_eq!(classify_series("Show.1080p.WEB", 1, 2), None);
    }

    fn filter() -> ReleaseFilter {
        ReleaseFilter {
            blacklist: words(&["cam"]),
            current_year: 2026,
            recent_window: 2,
        }
    }

    #[test]
    fn test_filter_movie() {
        let item = MediaItem::movie("m1", "Dune", Some(2021));
        let candidates = vec![
            ReleaseCandidate::new("Dune.2021.2160p", 1, "p"),
            ReleaseCandidate::new("Dune.2021.CAM", 1, "p"),
            ReleaseCandidate::new("Dune.1984.1080p", 1, "p"),
            ReleaseCandidate::new("Dune.1080p", 1, "p"),
        ];
        let kept: Vec<_> = filter()
            .apply(&item, candidates)
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(kept, vec!["Dune.2021.2160p"]);
    }

    #[test]
    fn test_filter_movie_without_year_keeps_everything_clean() {
        let item = MediaItem::movie("m1", "Dune", None);
        let candidates = vec![
            ReleaseCandidate::new("Dune.1984.1080p", 1, "p"),
            ReleaseCandidate::new("Dune.1080p", 1, "p"),
        ];
        assert_eq!(filter().apply(&item, candidates).len(), 2);
    }

    #[test]
    fn test_filter_series_annotates_packs() {
        let item = MediaItem::episode("e1", "Show", 1, 2);
        let candidates = vec![
            ReleaseCandidate::new("Show.S01E02.1080p", 1, "p"),
            ReleaseCandidate::new("Show.S01.1080p", 1, "p"),
            ReleaseCandidate::new("Show.S01E03.1080p", 1, "p"),
        ];
        let kept = filter().apply(&item, candidates);
        assert_eq!(kept.len(), 2);
        assert!(!kept[0].season_pack);
        assert!(kept[1].season_pack);
    }
}
