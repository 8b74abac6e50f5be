use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::media::{AcquisitionRecord, MediaItem, PackId};

/// Derived view of one season pack.
///
/// Never stored as truth: always recomputed from the consumed-episode sets
/// of the pack's records and the backlog's episode list for the season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonPackStatus {
    pub pack_id: PackId,
    /// Distinct episodes the backlog knows for the season.
    pub total_episodes: usize,
    /// Episodes found in the pack's file listing.
    pub known_episodes: BTreeSet<u32>,
    /// Episodes recorded as consumed.
    pub consumed: BTreeSet<u32>,
    pub complete: bool,
}

impl SeasonPackStatus {
    /// Compute the status from the pack's records and the season's items.
    pub fn compute(pack_id: PackId, records: &[AcquisitionRecord], season_items: &[MediaItem]) -> Self {
        let known_episodes: BTreeSet<u32> = records
            .iter()
            .flat_map(|r| r.episodes.iter().copied())
            .collect();
        let consumed: BTreeSet<u32> = records
            .iter()
            .flat_map(|r| r.episodes_consumed.iter().copied())
            .collect();
        let season_episodes: BTreeSet<u32> = season_items.iter().map(|item| item.episode).collect();
        let total_episodes = season_episodes.len();

        let complete = is_complete(&known_episodes, &consumed, &season_episodes);

        Self {
            pack_id,
            total_episodes,
            known_episodes,
            consumed,
            complete,
        }
    }
}

/// Both conditions are required: every episode listed in the pack is
/// consumed, and every episode the backlog knows for the season is consumed
/// (the listing may predate the end of the season). Consumed numbers outside
/// the season never count towards its total.
pub fn is_complete(known: &BTreeSet<u32>, consumed: &BTreeSet<u32>, season: &BTreeSet<u32>) -> bool {
    !known.is_empty() && !season.is_empty() && known.is_subset(consumed) && season.is_subset(consumed)
}
