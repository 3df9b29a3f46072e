//! Per-user voice profiles and their on-disk store.
//!
//! The store is a JSON object mapping username to `[voice_index, rate]`. It
//! is read once when the speech worker starts and overwritten wholesale when
//! it stops.

use crate::error::{BotError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Inclusive range of rates assigned to first-time speakers.
pub const DEFAULT_RATE_RANGE: std::ops::RangeInclusive<u32> = 180..=220;

/// A user's selected voice and speaking rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, u32)", into = "(usize, u32)")]
pub struct VoiceProfile {
    pub voice_index: usize,
    pub rate: u32,
}

impl VoiceProfile {
    #[must_use]
    pub fn new(voice_index: usize, rate: u32) -> Self {
        Self { voice_index, rate }
    }

    /// A fresh profile with a random voice in `0..voice_count` and a random
    /// rate in [`DEFAULT_RATE_RANGE`].
    pub fn random<R: Rng + ?Sized>(rng: &mut R, voice_count: usize) -> Self {
        Self {
            voice_index: random_voice_index(rng, voice_count),
            rate: rng.gen_range(DEFAULT_RATE_RANGE),
        }
    }
}

impl From<(usize, u32)> for VoiceProfile {
    fn from((voice_index, rate): (usize, u32)) -> Self {
        Self { voice_index, rate }
    }
}

impl From<VoiceProfile> for (usize, u32) {
    fn from(profile: VoiceProfile) -> Self {
        (profile.voice_index, profile.rate)
    }
}

fn random_voice_index<R: Rng + ?Sized>(rng: &mut R, voice_count: usize) -> usize {
    if voice_count == 0 {
        0
    } else {
        rng.gen_range(0..voice_count)
    }
}

pub type ProfileMap = HashMap<String, VoiceProfile>;

/// Load the profile store. Any failure means "no prior state".
pub fn load_profiles(path: &Path) -> ProfileMap {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no voice profile store at {}", path.display());
            return ProfileMap::new();
        }
        Err(e) => {
            warn!("cannot read voice profiles from {}: {e}", path.display());
            return ProfileMap::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(profiles) => profiles,
        Err(e) => {
            warn!("cannot parse voice profiles in {}: {e}", path.display());
            ProfileMap::new()
        }
    }
}

/// Overwrite the profile store, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`BotError::Persistence`] if the store cannot be serialized or written.
pub fn save_profiles(path: &Path, profiles: &ProfileMap) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            BotError::Persistence(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    let json = serde_json::to_string_pretty(profiles)
        .map_err(|e| BotError::Persistence(format!("cannot serialize voice profiles: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| BotError::Persistence(format!("cannot write {}: {e}", path.display())))
}

/// Repair loaded profiles for the current catalog and rate bounds.
///
/// Voice indices outside `0..voice_count` are re-randomized (the catalog can
/// differ between machines) and rates are clamped to `bounds`. Returns the
/// number of profiles changed.
pub fn revalidate<R: Rng + ?Sized>(
    profiles: &mut ProfileMap,
    voice_count: usize,
    bounds: (u32, u32),
    rng: &mut R,
) -> usize {
    let mut changed = 0;
    for (username, profile) in profiles.iter_mut() {
        let before = *profile;
        if profile.voice_index >= voice_count {
            profile.voice_index = random_voice_index(rng, voice_count);
        }
        profile.rate = profile.rate.clamp(bounds.0, bounds.1);
        if *profile != before {
            debug!("revalidated voice profile for {username}: {before:?} -> {profile:?}");
            changed += 1;
        }
    }
    changed
}
