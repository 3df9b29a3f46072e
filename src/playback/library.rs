//! Song library: the playable files in the configured music directory.
//!
//! Listing order is an explicit case-insensitive sort by file name so that
//! `!songs` and `!sr <N>` always agree, whatever order the filesystem
//! returns entries in.

use std::path::{Path, PathBuf};
use tracing::warn;

/// Longest single chat reply produced by [`listing_replies`].
pub const MAX_REPLY_CHARS: usize = 450;

/// One playable audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    /// File name without its extension.
    pub name: String,
}

impl Track {
    /// Build a track from a file path, or `None` if it has no usable name.
    #[must_use]
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_stem()?.to_str()?.to_owned();
        Some(Self { path, name })
    }
}

/// A directory of songs filtered by extension.
#[derive(Debug, Clone)]
pub struct SongLibrary {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl SongLibrary {
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_playable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    /// Current listing in stable order. A missing directory lists nothing.
    #[must_use]
    pub fn tracks(&self) -> Vec<Track> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot read music directory {}: {e}", self.dir.display());
                return Vec::new();
            }
        };

        let mut tracks: Vec<Track> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.is_playable(path))
            .filter_map(Track::from_path)
            .collect();

        tracks.sort_by(|a, b| {
            let (a_file, b_file) = (file_name(&a.path), file_name(&b.path));
            a_file
                .to_lowercase()
                .cmp(&b_file.to_lowercase())
                .then_with(|| a_file.cmp(&b_file))
        });
        tracks
    }

    /// Resolve a song request query against the current listing.
    ///
    /// A digits-only query is a 1-based index; anything else selects the
    /// first track whose name contains the query, ignoring case.
    #[must_use]
    pub fn resolve(&self, query: &str) -> Option<Track> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let tracks = self.tracks();

        if query.bytes().all(|b| b.is_ascii_digit()) {
            let index = query.parse::<usize>().ok()?;
            return index.checked_sub(1).and_then(|i| tracks.get(i)).cloned();
        }

        let needle = query.to_lowercase();
        tracks
            .into_iter()
            .find(|track| track.name.to_lowercase().contains(&needle))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Render `1. first, 2. second, ...`, split into replies no longer than
/// [`MAX_REPLY_CHARS`]. Splits fall between entries; an entry too long for a
/// reply of its own is cut short.
#[must_use]
pub fn listing_replies(tracks: &[Track]) -> Vec<String> {
    let mut replies = Vec::new();
    let mut current = String::new();

    for (i, track) in tracks.iter().enumerate() {
        let mut entry = format!("{}. {}", i + 1, track.name);
        if entry.chars().count() > MAX_REPLY_CHARS {
            entry = entry.chars().take(MAX_REPLY_CHARS).collect();
        }
        if !current.is_empty() && current.chars().count() + 2 + entry.chars().count() > MAX_REPLY_CHARS
        {
            replies.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(", ");
        }
        current.push_str(&entry);
    }

    if !current.is_empty() {
        replies.push(current);
    }
    replies
}
