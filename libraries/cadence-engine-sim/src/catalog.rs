//! Media known to the simulated engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// What the engine finds behind a URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEntry {
    /// Decodes fine and lasts this long
    Playable(Duration),
    /// Opens, then fails to decode
    Broken,
}

/// URI -> media lookup table
///
/// Unknown URIs behave like [`MediaEntry::Broken`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, MediaEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a playable item
    #[must_use]
    pub fn with_track(mut self, uri: impl Into<String>, duration: Duration) -> Self {
        self.insert(uri, MediaEntry::Playable(duration));
        self
    }

    /// Add an item that fails once loaded
    #[must_use]
    pub fn with_broken(mut self, uri: impl Into<String>) -> Self {
        self.insert(uri, MediaEntry::Broken);
        self
    }

    pub fn insert(&mut self, uri: impl Into<String>, entry: MediaEntry) {
        self.entries.insert(uri.into(), entry);
    }

    pub fn get(&self, uri: &str) -> MediaEntry {
        self.entries.get(uri).copied().unwrap_or(MediaEntry::Broken)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
