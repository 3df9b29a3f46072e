//! Stateless classification of chat messages into worker destinations.

use crate::chat::protocol::ChatMessage;
use crate::worker::{WorkerCommand, WorkerMailbox};
use tracing::{debug, warn};

/// Song request prefix (takes a query).
pub const SONG_REQUEST_PREFIX: &str = "!sr ";
/// Resume playback.
pub const PLAY_PREFIX: &str = "!play";
/// Pause playback.
pub const PAUSE_PREFIX: &str = "!pause";
/// Skip to the next queued song.
pub const SKIP_PREFIX: &str = "!skip";
/// Restart the current song.
pub const REWIND_PREFIX: &str = "!rewind";
/// Change volume (`up`, `down` or a percentage).
pub const VOLUME_PREFIX: &str = "!vol ";
/// List available songs.
pub const LIST_SONGS_PREFIX: &str = "!songs";

/// Prefixes handled by the playback worker, in match order.
pub const PLAYBACK_PREFIXES: [&str; 7] = [
    SONG_REQUEST_PREFIX,
    PLAY_PREFIX,
    PAUSE_PREFIX,
    SKIP_PREFIX,
    REWIND_PREFIX,
    VOLUME_PREFIX,
    LIST_SONGS_PREFIX,
];

/// Voice change prefix (handled by the speech worker).
pub const VOICE_PREFIX: &str = "!voice ";

/// Where a message should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Speech,
    Playback,
    /// No configured worker wants it.
    Dropped,
}

/// Whether `text` starts with any playback command prefix.
#[must_use]
pub fn is_playback_command(text: &str) -> bool {
    PLAYBACK_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

/// Forwards each chat message to at most one worker.
#[derive(Debug, Clone, Default)]
pub struct CommandRouter {
    speech: Option<WorkerMailbox>,
    playback: Option<WorkerMailbox>,
}

impl CommandRouter {
    #[must_use]
    pub fn new(speech: Option<WorkerMailbox>, playback: Option<WorkerMailbox>) -> Self {
        Self { speech, playback }
    }

    /// Decide where `text` would be routed with the configured workers.
    #[must_use]
    pub fn classify(&self, text: &str) -> Destination {
        if self.playback.is_some() && is_playback_command(text) {
            Destination::Playback
        } else if self.speech.is_some() {
            Destination::Speech
        } else {
            Destination::Dropped
        }
    }

    /// Classify and forward a message. Never blocks.
    pub fn route(&self, message: &ChatMessage) -> Destination {
        let destination = self.classify(&message.text);
        let mailbox = match destination {
            Destination::Playback => self.playback.as_ref(),
            Destination::Speech => self.speech.as_ref(),
            Destination::Dropped => None,
        };

        match mailbox {
            Some(mailbox) => {
                let command = WorkerCommand::new(message.username.clone(), message.text.clone());
                if let Err(e) = mailbox.submit(command) {
                    warn!("cannot route message from {}: {e}", message.username);
                }
            }
            None => debug!("no worker for message from {}", message.username),
        }
        destination
    }

    /// Whether any worker is configured.
    #[must_use]
    pub fn has_workers(&self) -> bool {
        self.speech.is_some() || self.playback.is_some()
    }
}
