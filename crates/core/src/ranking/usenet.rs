//! NZB candidate selection.
//!
//! Usenet releases carry no reliable remux flag and no seed count, so
//! resolution is the primary key: bucket by tier, keep the largest entry per
//! tier, prefer higher tiers.

use std::collections::BTreeMap;

use super::resolution_of;
use crate::searcher::ReleaseCandidate;

/// Resolution tier of an NZB release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UsenetTier {
    Other,
    Hd720,
    Hd1080,
    Uhd2160,
}

impl UsenetTier {
    pub fn of(title: &str) -> Self {
        match resolution_of(title) {
            r if r >= 2160 => UsenetTier::Uhd2160,
            r if r >= 1080 => UsenetTier::Hd1080,
            720 => UsenetTier::Hd720,
            _ => UsenetTier::Other,
        }
    }
}

/// Largest candidate of each tier, highest tier first.
pub fn rank_usenet(candidates: &[ReleaseCandidate]) -> Vec<&ReleaseCandidate> {
    let mut best: BTreeMap<UsenetTier, &ReleaseCandidate> = BTreeMap::new();
    for candidate in candidates {
        let tier = UsenetTier::of(&candidate.title);
        let replace = best
            .get(&tier)
            .map_or(true, |current| candidate.size_bytes > current.size_bytes);
        if replace {
            best.insert(tier, candidate);
        }
    }
    best.into_values().rev().collect()
}

/// The preferred NZB candidate, if any.
pub fn select_usenet(candidates: &[ReleaseCandidate]) -> Option<&ReleaseCandidate> {
    rank_usenet(candidates).into_iter().next()
}
