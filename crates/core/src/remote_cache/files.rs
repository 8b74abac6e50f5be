//! Playable-file selection and pack episode mapping.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::BTreeMap;

use super::RemoteFile;
use crate::searcher::filter::episode_tags;

static BARE_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:e|ep|episode)[ ._-]?(\d{1,3})\b").expect("valid episode regex")
});

/// Extension allow-list for playable media.
#[derive(Debug, Clone)]
pub struct PlayableFilter {
    extensions: Vec<String>,
}

impl PlayableFilter {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn is_playable(&self, path: &str) -> bool {
        let Some((_, ext)) = path.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }

    /// The single largest playable file.
    pub fn largest<'a>(&self, files: &'a [RemoteFile]) -> Option<&'a RemoteFile> {
        files
            .iter()
            .filter(|f| self.is_playable(&f.path))
            .max_by_key(|f| f.size_bytes)
    }

    /// Map episode numbers of `season` to their (largest) playable file.
    pub fn map_episodes<'a>(&self, files: &'a [RemoteFile], season: u32) -> BTreeMap<u32, &'a RemoteFile> {
        let mut mapped: BTreeMap<u32, &RemoteFile> = BTreeMap::new();
        for file in files.iter().filter(|f| self.is_playable(&f.path)) {
            let Some(episode) = episode_of(file.file_name(), season) else {
                continue;
            };
            let keep = mapped
                .get(&episode)
                .map_or(true, |current| file.size_bytes > current.size_bytes);
            if keep {
                mapped.insert(episode, file);
            }
        }
        mapped
    }
}

/// Episode number of a file name within `season`.
///
/// `SxxEyy` / `NxNN` tags must name the season; a bare `E07` or
/// `Episode 7` is accepted as-is.
pub fn episode_of(file_name: &str, season: u32) -> Option<u32> {
    let tags = episode_tags(file_name);
    if !tags.is_empty() {
        return tags.iter().find(|t| t.season == season).map(|t| t.first);
    }
    BARE_EPISODE
        .captures(file_name)
        .and_then(|caps| caps.get(1)?.as_str().parse().ok())
}
