use std::collections::VecDeque;

use super::{dedup_by_hash, rank, rank_usenet};
use crate::media::Protocol;
use crate::searcher::ReleaseCandidate;

/// Ranked candidates of one protocol, consumed in preference order.
///
/// The ordering policy is chosen when the source is built, so callers only
/// ever pull the next candidate.
#[derive(Debug, Clone, Default)]
pub struct RankedCandidates {
    queue: VecDeque<ReleaseCandidate>,
}

impl RankedCandidates {
    /// Torrent candidates: ranked, then collapsed by hash.
    pub fn torrents(candidates: Vec<ReleaseCandidate>) -> Self {
        Self {
            queue: dedup_by_hash(rank(candidates)).into(),
        }
    }

    /// NZB candidates: the largest release per resolution tier, best tier first.
    pub fn usenet(candidates: Vec<ReleaseCandidate>) -> Self {
        Self {
            queue: rank_usenet(&candidates).into_iter().cloned().collect(),
        }
    }

    /// Build the source matching `protocol`, ignoring other protocols.
    pub fn for_protocol(protocol: Protocol, candidates: &[ReleaseCandidate]) -> Self {
        let matching: Vec<_> = candidates
            .iter()
            .filter(|c| c.protocol == protocol)
            .cloned()
            .collect();
        match protocol {
            Protocol::Torrent => Self::torrents(matching),
            Protocol::Usenet => Self::usenet(matching),
        }
    }

    pub fn has_next(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Iterator for RankedCandidates {
    type Item = ReleaseCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torrent_source_ranks_and_dedups() {
        let mut source = RankedCandidates::torrents(vec![
            ReleaseCandidate::new("Show.S01E02.1080p.WEB-DL", 4_000_000_000, "a").with_hash("aa"),
            ReleaseCandidate::new("Show.S01E02.720p.REMUX", 3_000_000_000, "b").with_hash("bb"),
            ReleaseCandidate::new("Show.S01E02.1080p.WEB-DL.mirror", 4_000_000_000, "c")
                .with_hash("aa"),
        ]);

        assert_eq!(source.len(), 2);
        assert!(source.has_next());
        assert_eq!(source.next().unwrap().title, "Show.S01E02.720p.REMUX");
        assert_eq!(source.next().unwrap().source, "a");
        assert!(!source.has_next());
        assert!(source.next().is_none());
    }

    #[test]
    fn test_for_protocol_filters() {
        let candidates = vec![
            ReleaseCandidate::new("Movie.2160p", 8, "nzb").with_protocol(Protocol::Usenet),
            ReleaseCandidate::new("Movie.2160p.small", 5, "nzb").with_protocol(Protocol::Usenet),
            ReleaseCandidate::new("Movie.1080p", 1, "jackett"),
        ];
        let usenet: Vec<_> = RankedCandidates::for_protocol(Protocol::Usenet, &candidates).collect();
        assert_eq!(usenet.len(), 1);
        assert_eq!(usenet[0].size_bytes, 8);

        let torrents = RankedCandidates::for_protocol(Protocol::Torrent, &candidates);
        assert_eq!(torrents.len(), 1);
    }
}
