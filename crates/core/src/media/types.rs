//! Types for backlog items and their acquisitions.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a backlog item is a movie or a single episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Episode,
}

/// Transport a release is fetched over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Torrent,
    Usenet,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Torrent => "torrent",
            Protocol::Usenet => "usenet",
        }
    }
}

/// Errors raised when a backlog item breaks the movie/episode invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("item {id} has season {season} and episode {episode}; expected both zero or both positive")]
    AmbiguousKind { id: String, season: u32, episode: u32 },

    #[error("item {0} has an empty title")]
    EmptyTitle(String),
}

/// An entry of the watchlist backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable identifier assigned by the sync layer.
    pub id: String,
    /// Movie or show title.
    pub title: String,
    /// Release year, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Season number (0 for movies).
    #[serde(default)]
    pub season: u32,
    /// Episode number (0 for movies).
    #[serde(default)]
    pub episode: u32,
    /// Set once a direct-access link has been resolved.
    #[serde(default)]
    pub acquired: bool,
    /// Opaque handle to the acquired file (direct link).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition_ref: Option<String>,
    /// Whether the acquisition came out of a season pack.
    #[serde(default)]
    pub season_pack: bool,
    /// When the item entered the backlog.
    pub added_at: DateTime<Utc>,
}

impl MediaItem {
    /// Create a movie item.
    pub fn movie(id: impl Into<String>, title: impl Into<String>, year: Option<u32>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            year,
            season: 0,
            episode: 0,
            acquired: false,
            acquisition_ref: None,
            season_pack: false,
            added_at: Utc::now(),
        }
    }

    /// Create an episode item.
    pub fn episode(
        id: impl Into<String>,
        title: impl Into<String>,
        season: u32,
        episode: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            year: None,
            season,
            episode,
            acquired: false,
            acquisition_ref: None,
            season_pack: false,
            added_at: Utc::now(),
        }
    }

    /// Check the movie/episode invariant.
    pub fn validate(&self) -> Result<MediaKind, MediaError> {
        if self.title.trim().is_empty() {
            return Err(MediaError::EmptyTitle(self.id.clone()));
        }
        match (self.season, self.episode) {
            (0, 0) => Ok(MediaKind::Movie),
            (s, e) if s > 0 && e > 0 => Ok(MediaKind::Episode),
            (season, episode) => Err(MediaError::AmbiguousKind {
                id: self.id.clone(),
                season,
                episode,
            }),
        }
    }

    /// Kind of the item. Invalid items are reported as movies only when both
    /// numbers are zero; callers that care should use [`MediaItem::validate`].
    pub fn kind(&self) -> MediaKind {
        if self.season > 0 && self.episode > 0 {
            MediaKind::Episode
        } else {
            MediaKind::Movie
        }
    }

    pub fn is_episode(&self) -> bool {
        self.kind() == MediaKind::Episode
    }

    /// Normalized show identity used to group episodes of the same series.
    pub fn show_key(&self) -> String {
        show_key(&self.title)
    }

    /// Season pack this item would belong to (episodes only).
    pub fn pack_id(&self) -> Option<PackId> {
        self.is_episode().then(|| PackId::new(&self.title, self.season))
    }

    /// Mark the item acquired with the given direct-access reference.
    pub fn mark_acquired(&mut self, reference: impl Into<String>, season_pack: bool) {
        self.acquired = true;
        self.acquisition_ref = Some(reference.into());
        self.season_pack = season_pack;
    }

    /// Human readable label for logs.
    pub fn label(&self) -> String {
        match self.kind() {
            MediaKind::Movie => match self.year {
                Some(year) => format!("{} ({})", self.title, year),
                None => self.title.clone(),
            },
            MediaKind::Episode => {
                format!("{} S{:02}E{:02}", self.title, self.season, self.episode)
            }
        }
    }
}

/// Lowercase alphanumeric words joined by dots ("The Office (US)" -> "the.office.us").
pub fn show_key(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Identity of a season pack: one show, one season.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackId {
    /// Normalized show key (see [`show_key`]).
    pub show: String,
    pub season: u32,
}

impl PackId {
    pub fn new(title: &str, season: u32) -> Self {
        Self {
            show: show_key(title),
            season,
        }
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/S{:02}", self.show, self.season)
    }
}

/// The engine's record of a selected release for a backlog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    /// Record ID (UUID).
    pub id: String,
    /// Owning backlog item.
    pub media_id: String,
    /// Title of the selected release.
    pub release_title: String,
    /// Release size in bytes.
    pub size_bytes: u64,
    /// Content hash (torrents) or empty.
    #[serde(default)]
    pub info_hash: String,
    #[serde(default)]
    pub protocol: Protocol,
    /// Remote transfer ID; `None` until the upload succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub season_pack: bool,
    /// Normalized show key (empty for movies).
    #[serde(default)]
    pub show_key: String,
    #[serde(default)]
    pub season: u32,
    /// Episode numbers present in the pack.
    #[serde(default)]
    pub episodes: BTreeSet<u32>,
    /// Episode numbers already consumed.
    #[serde(default)]
    pub episodes_consumed: BTreeSet<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AcquisitionRecord {
    /// Create a record for a release just selected for `item`.
    pub fn new(
        item: &MediaItem,
        release_title: impl Into<String>,
        size_bytes: u64,
        protocol: Protocol,
    ) -> Self {
        let now = Utc::now();
        let (show_key, season) = if item.is_episode() {
            (item.show_key(), item.season)
        } else {
            (String::new(), 0)
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            media_id: item.id.clone(),
            release_title: release_title.into(),
            size_bytes,
            info_hash: String::new(),
            protocol,
            remote_id: None,
            failed: false,
            season_pack: false,
            show_key,
            season,
            episodes: BTreeSet::new(),
            episodes_consumed: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_hash(mut self, info_hash: impl Into<String>) -> Self {
        self.info_hash = info_hash.into();
        self
    }

    /// What identifies the submitted release: the info hash, or the release
    /// title for NZBs, which carry none.
    pub fn release_key(&self) -> &str {
        if self.info_hash.is_empty() {
            &self.release_title
        } else {
            &self.info_hash
        }
    }

    /// Pack identity when this record is a season pack.
    pub fn pack_id(&self) -> Option<PackId> {
        self.season_pack.then(|| PackId {
            show: self.show_key.clone(),
            season: self.season,
        })
    }

    /// Remote upload succeeded.
    pub fn mark_submitted(&mut self, remote_id: impl Into<String>) {
        self.remote_id = Some(remote_id.into());
        self.failed = false;
        self.updated_at = Utc::now();
    }

    /// Remote verification failed. The handle is dropped so a retry never
    /// reuses it.
    pub fn mark_failed(&mut self) {
        self.failed = true;
        self.remote_id = None;
        self.updated_at = Utc::now();
    }

    /// Record a linked season pack and the episodes found in its listing.
    pub fn mark_pack(&mut self, episodes: impl IntoIterator<Item = u32>) {
        self.season_pack = true;
        self.episodes.extend(episodes);
        self.updated_at = Utc::now();
    }

    /// Record that an episode of this pack was consumed.
    pub fn mark_consumed(&mut self, episode: u32) -> bool {
        let added = self.episodes_consumed.insert(episode);
        if added {
            self.updated_at = Utc::now();
        }
        added
    }

    /// The remote transfer was released upstream; nothing references it now.
    pub fn mark_released(&mut self) {
        self.remote_id = None;
        self.updated_at = Utc::now();
    }

    /// Whether this record still holds a live remote transfer.
    pub fn is_live(&self) -> bool {
        !self.failed && self.remote_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_movie_and_episode() {
        let movie = MediaItem::movie("m1", "Heat", Some(1995));
        assert_eq!(movie.validate(), Ok(MediaKind::Movie));

        let episode = MediaItem::episode("e1", "Show", 1, 2);
        assert_eq!(episode.validate(), Ok(MediaKind::Episode));
    }

    #[test]
    fn test_validate_rejects_ambiguous() {
        let mut item = MediaItem::episode("e1", "Show", 1, 0);
        assert!(matches!(
            item.validate(),
            Err(MediaError::AmbiguousKind { season: 1, episode: 0, .. })
        ));

        item.season = 0;
        item.episode = 3;
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_title() {
        let item = MediaItem::movie("m1", "  ", None);
        assert_eq!(item.validate(), Err(MediaError::EmptyTitle("m1".to_string())));
    }

    #[test]
    fn test_show_key_normalization() {
        assert_eq!(show_key("The Office (US)"), "the.office.us");
        assert_eq!(show_key("Mr. Robot"), "mr.robot");
        assert_eq!(
            PackId::new("Mr. Robot", 2),
            PackId {
                show: "mr.robot".to_string(),
                season: 2
            }
        );
    }

    #[test]
    fn test_pack_id_only_for_episodes() {
        assert!(MediaItem::movie("m", "Heat", None).pack_id().is_none());
        let pack = MediaItem::episode("e", "Show", 3, 1).pack_id().unwrap();
        assert_eq!(pack.to_string(), "show/S03");
    }

    #[test]
    fn test_record_failure_clears_remote_id() {
        let item = MediaItem::movie("m1", "Heat", Some(1995));
        let mut record = AcquisitionRecord::new(&item, "Heat.1995.1080p", 10, Protocol::Torrent);
        record.mark_submitted("42");
        assert!(record.is_live());

        record.mark_failed();
        assert!(record.failed);
        assert!(record.remote_id.is_none());
        assert!(!record.is_live());
    }

    #[test]
    fn test_release_key_falls_back_to_title() {
        let item = MediaItem::movie("m1", "Heat", Some(1995));
        let nzb = AcquisitionRecord::new(&item, "Heat.1995.1080p", 10, Protocol::Usenet);
        assert_eq!(nzb.release_key(), "Heat.1995.1080p");

        let torrent = AcquisitionRecord::new(&item, "Heat.1995.1080p", 10, Protocol::Torrent)
            .with_hash("abc");
        assert_eq!(torrent.release_key(), "abc");
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let item = MediaItem::episode("e1", "Show", 1, 2);
        let mut record = AcquisitionRecord::new(&item, "Show.S01.1080p", 10, Protocol::Torrent);
        record.mark_pack([1, 2, 3]);

        let json = serde_json::to_string(&record).unwrap();
        let parsed: AcquisitionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.pack_id(), Some(PackId::new("Show", 1)));
    }

    #[test]
    fn test_record_consumption_and_release() {
        let item = MediaItem::episode("e1", "Show", 1, 2);
        let mut record = AcquisitionRecord::new(&item, "Show.S01.1080p", 10, Protocol::Torrent);
        record.mark_submitted("7");
        assert!(record.mark_consumed(2));
        assert!(!record.mark_consumed(2));

        record.mark_released();
        assert!(!record.is_live());
        assert!(!record.failed);
        assert_eq!(record.episodes_consumed.len(), 1);
    }

    #[test]
    fn test_label() {
        assert_eq!(MediaItem::movie("m", "Heat", Some(1995)).label(), "Heat (1995)");
        assert_eq!(MediaItem::episode("e", "Show", 1, 2).label(), "Show S01E02");
    }
}
