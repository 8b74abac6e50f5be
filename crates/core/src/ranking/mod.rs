//! Candidate ranking.
//!
//! Torrents are ordered by [`compare_candidates`]; NZBs use the tiered
//! [`select_usenet`] selector. [`RankedCandidates`] hands either kind to the
//! orchestrator one candidate at a time.

mod quality;
mod source;
mod usenet;

pub use quality::{compare_candidates, dedup_by_hash, is_remux, rank, resolution_of, DEFAULT_RESOLUTION};
pub use source::RankedCandidates;
pub use usenet::{rank_usenet, select_usenet, UsenetTier};
