//! JSON playlist files
//!
//! ```json
//! {
//!   "name": "Demo",
//!   "tracks": [
//!     { "id": "intro", "uri": "file:///music/intro.flac", "title": "Intro",
//!       "artist": "Cadence", "duration_secs": 4 }
//!   ]
//! }
//! ```

use cadence_engine_sim::{Catalog, MediaEntry};
use cadence_playback::{Track, TrackMetadata};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Playlist {
    #[serde(default)]
    pub name: String,

    pub tracks: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub uri: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub artist: String,

    #[serde(default)]
    pub album_title: String,

    #[serde(default)]
    pub artwork_uri: String,

    /// Length reported by the simulated engine
    pub duration_secs: f64,

    /// Simulate a decode failure for this entry
    #[serde(default)]
    pub broken: bool,
}

impl PlaylistEntry {
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_secs).unwrap_or_default()
    }
}

impl Playlist {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let playlist: Playlist = serde_json::from_str(content)?;
        if playlist.tracks.is_empty() {
            anyhow::bail!("playlist '{}' has no tracks", playlist.name);
        }
        Ok(playlist)
    }

    /// Queue items for the controller
    pub fn tracks(&self) -> Vec<Track> {
        self.tracks
            .iter()
            .map(|entry| {
                Track::new(
                    entry.id.clone(),
                    entry.uri.clone(),
                    TrackMetadata {
                        title: entry.title.clone(),
                        artist: entry.artist.clone(),
                        album_title: entry.album_title.clone(),
                        artwork_uri: entry.artwork_uri.clone(),
                    },
                )
            })
            .collect()
    }

    /// Media the simulated engine will find behind each URI
    pub fn catalog(&self) -> Catalog {
        let mut catalog = Catalog::new();
        for entry in &self.tracks {
            let media = if entry.broken {
                MediaEntry::Broken
            } else {
                MediaEntry::Playable(entry.duration())
            };
            catalog.insert(entry.uri.clone(), media);
        }
        catalog
    }

    pub fn duration_of(&self, track_id: &str) -> Duration {
        self.tracks
            .iter()
            .find(|entry| entry.id == track_id)
            .map(PlaylistEntry::duration)
            .unwrap_or_default()
    }
}
