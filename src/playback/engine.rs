//! Audio engine seam driven by the playback worker.

use crate::error::Result;
use std::path::Path;

/// Notifications pumped out of an [`AudioEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The loaded track played to its end. Reported once per track.
    TrackEnded,
    /// The engine can no longer play audio; the worker must exit.
    Quit,
}

/// A single-track player.
///
/// At most one track is loaded at a time. Volume is in `0.0..=1.0` and
/// implementations clamp whatever they are given.
pub trait AudioEngine {
    /// Replace the loaded track with `path`, without starting it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BotError::Audio`] if the file cannot be opened or decoded.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Start the loaded track from the beginning.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BotError::Audio`] if nothing is loaded.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Stop the current track. No end notification follows.
    fn stop(&mut self);

    /// Drop the loaded track.
    fn unload(&mut self);

    /// Restart the loaded track from its beginning.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BotError::Audio`] if the track cannot be reopened.
    fn rewind(&mut self) -> Result<()>;

    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32);

    /// Next pending notification, if any. Never blocks.
    fn poll_event(&mut self) -> Option<PlaybackEvent>;

    /// Release the output device.
    fn quit(&mut self);
}

/// Turns "the output has run dry" into a single [`PlaybackEvent::TrackEnded`].
///
/// Armed when a track starts or resumes with audio still queued, disarmed
/// when the track is stopped or replaced.
#[derive(Debug, Default)]
#[cfg_attr(not(feature = "rodio-backend"), allow(dead_code))]
pub(crate) struct TrackEndLatch {
    armed: bool,
}

#[cfg_attr(not(feature = "rodio-backend"), allow(dead_code))]
impl TrackEndLatch {
    pub(crate) fn arm(&mut self) {
        self.armed = true;
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    /// True exactly once per armed track, the first time it is seen drained.
    pub(crate) fn fire(&mut self, drained: bool) -> bool {
        if self.armed && drained {
            self.armed = false;
            return true;
        }
        false
    }
}
