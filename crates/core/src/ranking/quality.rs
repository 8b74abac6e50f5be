//! Torrent candidate ordering: remux, then resolution, then size.

use std::cmp::Ordering;

use crate::searcher::ReleaseCandidate;

/// Resolution assumed when a title carries no recognizable token.
pub const DEFAULT_RESOLUTION: u32 = 480;

/// Lexical resolution tokens, checked in this order.
const RESOLUTION_TOKENS: &[(&[&str], u32)] = &[
    (&["8k", "4320p"], 8000),
    (&["4k", "2160p", "uhd"], 2160),
    (&["1440p", "2k", "qhd"], 1440),
    (&["1080p", "1080i", "fhd", "fullhd"], 1080),
    (&["720p"], 720),
    (&["576p", "576i"], 576),
    (&["480p", "sd"], 480),
    (&["360p"], 360),
    (&["240p"], 240),
    (&["hd"], 1080),
];

fn tokens(title: &str) -> impl Iterator<Item = String> + '_ {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

/// Numeric resolution of a release title. Total: every title maps to one
/// tier, [`DEFAULT_RESOLUTION`] when nothing matches.
pub fn resolution_of(title: &str) -> u32 {
    let words: Vec<String> = tokens(title).collect();
    RESOLUTION_TOKENS
        .iter()
        .find(|(names, _)| words.iter().any(|w| names.contains(&w.as_str())))
        .map(|(_, value)| *value)
        .unwrap_or(DEFAULT_RESOLUTION)
}

/// Whether the title advertises a remux.
pub fn is_remux(title: &str) -> bool {
    title.to_lowercase().contains("remux")
}

/// Preference order, `Less` meaning `a` is preferred.
pub fn compare_candidates(a: &ReleaseCandidate, b: &ReleaseCandidate) -> Ordering {
    is_remux(&b.title)
        .cmp(&is_remux(&a.title))
        .then_with(|| resolution_of(&b.title).cmp(&resolution_of(&a.title)))
        .then_with(|| b.size_bytes.cmp(&a.size_bytes))
}

/// Sort candidates, most preferred first. Stable for full ties.
pub fn rank(mut candidates: Vec<ReleaseCandidate>) -> Vec<ReleaseCandidate> {
    candidates.sort_by(compare_candidates);
    candidates
}

/// Collapse candidates sharing a content hash, keeping the first one.
/// Candidates without a hash are kept as-is.
pub fn dedup_by_hash(candidates: Vec<ReleaseCandidate>) -> Vec<ReleaseCandidate> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|c| !c.has_hash() || seen.insert(c.info_hash.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, size: u64) -> ReleaseCandidate {
        ReleaseCandidate::new(title, size, "test")
    }

    #[test]
    fn test_resolution_tokens() {
        assert_eq!(resolution_of("Movie.2024.8K.HDR"), 8000);
        assert_eq!(resolution_of("Movie.2024.2160p.WEB"), 2160);
        assert_eq!(resolution_of("Movie 2024 UHD BluRay"), 2160);
        assert_eq!(resolution_of("Movie.2024.4K"), 2160);
        assert_eq!(resolution_of("Movie.2024.1440p"), 1440);
        assert_eq!(resolution_of("Movie.2024.1080p.WEB-DL"), 1080);
        assert_eq!(resolution_of("Movie.2024.1080i.HDTV"), 1080);
        assert_eq!(resolution_of("Movie.2024.720p"), 720);
        assert_eq!(resolution_of("Movie.2024.576p"), 576);
        assert_eq!(resolution_of("Movie.2024.480p"), 480);
        assert_eq!(resolution_of("Movie.2024.360p"), 360);
        assert_eq!(resolution_of("Movie.2024.240p"), 240);
        assert_eq!(resolution_of("Movie.2024.HD.x264"), 1080);
    }

    #[test]
    fn test_resolution_default_and_idempotent() {
        assert_eq!(resolution_of("Movie.2024.x264-GROUP"), DEFAULT_RESOLUTION);
        assert_eq!(resolution_of(""), DEFAULT_RESOLUTION);
        // "HDR" and "HDTV" are not the generic HD token.
        assert_eq!(resolution_of("Movie.HDR.HDTV"), DEFAULT_RESOLUTION);
        let title = "Show.S01E01.720p.HDTV";
        assert_eq!(resolution_of(title), resolution_of(title));
    }

    #[test]
    fn test_remux_detection() {
        assert!(is_remux("Movie.2024.1080p.BluRay.REMUX"));
        assert!(is_remux("movie remux"));
        assert!(!is_remux("Movie.2024.2160p.WEB"));
    }

    #[test]
    fn test_remux_beats_resolution_and_size() {
        let ranked = rank(vec![
            candidate("Show.S01E02.1080p.WEB-DL", 4_000_000_000),
            candidate("Show.S01E02.720p.REMUX", 3_000_000_000),
        ]);
        assert_eq!(ranked[0].title, "Show.S01E02.720p.REMUX");
    }

    #[test]
    fn test_resolution_beats_size() {
        let ranked = rank(vec![
            candidate("Movie.720p", 9_000),
            candidate("Movie.2160p", 1_000),
            candidate("Movie.1080p", 5_000),
        ]);
        let titles: Vec<_> = ranked.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Movie.2160p", "Movie.1080p", "Movie.720p"]);
    }

    #[test]
    fn test_size_breaks_ties_and_stable() {
        let ranked = rank(vec![
            candidate("A.1080p", 100),
            candidate("B.1080p", 300),
            candidate("C.1080p", 100),
        ]);
        let titles: Vec<_> = ranked.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["B.1080p", "A.1080p", "C.1080p"]);
    }

    #[test]
    fn test_compare_is_antisymmetric() {
        let a = candidate("A.REMUX.720p", 1);
        let b = candidate("B.2160p", 100);
        assert_eq!(compare_candidates(&a, &b), Ordering::Less);
        assert_eq!(compare_candidates(&b, &a), Ordering::Greater);
        assert_eq!(compare_candidates(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_dedup_by_hash_keeps_first() {
        let deduped = dedup_by_hash(vec![
            candidate("A", 1).with_hash("aa"),
            candidate("B", 1),
            candidate("C", 1).with_hash("aa"),
            candidate("D", 1),
            candidate("E", 1).with_hash("bb"),
        ]);
        let titles: Vec<_> = deduped.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "D", "E"]);
    }
}
