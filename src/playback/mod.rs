//! Playback worker: a song request queue in front of a single-track player.
//!
//! Anyone may request songs with `!sr <query>`. Transport, volume and listing
//! commands are limited to editors. The queue and the playing flag belong to
//! the worker thread alone.

pub mod engine;
pub mod library;
#[cfg(feature = "rodio-backend")]
pub mod rodio_engine;

pub use engine::{AudioEngine, PlaybackEvent};
pub use library::{SongLibrary, Track};

use crate::config::BotConfig;
use crate::error::Result;
use crate::reply::ReplySender;
use crate::router::SONG_REQUEST_PREFIX;
use crate::worker::{Worker, WorkerCommand, WorkerHandle};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Worker name used for the thread and logs.
pub const PLAYBACK_WORKER: &str = "playback";

/// Reply for a song request that resolves to nothing.
pub const NOT_FOUND_REPLY: &str = "A matching song was not found.";

/// Reply for `!songs` when the directory has nothing playable.
pub const NO_SONGS_REPLY: &str = "No songs are available.";

/// One volume step for `!vol up` / `!vol down`.
pub const VOLUME_STEP: f32 = 0.1;

/// Settings the playback worker needs, resolved from [`BotConfig`].
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub music_dir: PathBuf,
    pub extensions: Vec<String>,
    pub editors: HashSet<String>,
    pub initial_volume: f32,
}

impl From<&BotConfig> for PlaybackSettings {
    fn from(config: &BotConfig) -> Self {
        Self {
            music_dir: config.playback.music_dir.clone(),
            extensions: config.playback.extensions.clone(),
            editors: config.effective_editors().into_iter().collect(),
            initial_volume: config.playback.initial_volume,
        }
    }
}

/// Owned state of the playback worker.
pub struct PlaybackWorker<A: AudioEngine> {
    engine: A,
    library: SongLibrary,
    editors: HashSet<String>,
    queue: VecDeque<Track>,
    is_playing: bool,
    replies: ReplySender,
}

impl<A: AudioEngine> PlaybackWorker<A> {
    pub fn new(mut engine: A, settings: PlaybackSettings, replies: ReplySender) -> Self {
        engine.set_volume(settings.initial_volume);
        let library = SongLibrary::new(settings.music_dir, &settings.extensions);
        info!(
            "playback worker serving {} with {} editors",
            library.dir().display(),
            settings.editors.len()
        );
        Self {
            engine,
            library,
            editors: settings.editors,
            queue: VecDeque::new(),
            is_playing: false,
            replies,
        }
    }

    /// Tracks waiting to be played, head first.
    #[must_use]
    pub fn queue(&self) -> &VecDeque<Track> {
        &self.queue
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    #[must_use]
    pub fn engine(&self) -> &A {
        &self.engine
    }

    /// Start the next queued track, or leave the engine idle.
    fn advance(&mut self) {
        let Some(track) = self.queue.pop_front() else {
            return;
        };
        let started = self
            .engine
            .load(&track.path)
            .and_then(|()| self.engine.play());
        match started {
            Ok(()) => {
                info!("now playing {}", track.name);
                self.is_playing = true;
            }
            Err(e) => {
                error!("cannot play {}: {e}", track.name);
                self.is_playing = false;
            }
        }
    }

    fn request(&mut self, query: &str) {
        if query.trim().is_empty() {
            debug!("ignoring empty song request");
            return;
        }
        let Some(track) = self.library.resolve(query) else {
            debug!("no song matches {query:?}");
            self.replies.send(NOT_FOUND_REPLY);
            return;
        };
        self.replies
            .send(format!("{} has been added to the queue.", track.name));
        self.queue.push_back(track);
        if !self.is_playing {
            self.advance();
        }
    }

    fn skip(&mut self) {
        if self.queue.is_empty() {
            self.engine.stop();
            self.is_playing = false;
        } else {
            self.advance();
        }
    }

    fn change_volume(&mut self, arg: Option<&str>) {
        let current = self.engine.volume();
        let target = match arg {
            Some("up") => current + VOLUME_STEP,
            Some("down") => current - VOLUME_STEP,
            Some(value) if value.bytes().all(|b| b.is_ascii_digit()) => match value.parse::<u16>() {
                Ok(percent) => f32::from(percent) / 100.0,
                Err(_) => return,
            },
            _ => {
                debug!("ignoring volume argument {arg:?}");
                return;
            }
        };
        self.engine.set_volume(target);
        self.replies
            .send(format!("Volume now set to {}", volume_percent(self.engine.volume())));
    }

    fn list_songs(&self) {
        let replies = library::listing_replies(&self.library.tracks());
        if replies.is_empty() {
            self.replies.send(NO_SONGS_REPLY);
        } else {
            self.replies.send_all(replies);
        }
    }
}

/// Volume as a whole percentage for replies.
#[allow(clippy::cast_possible_truncation)]
fn volume_percent(volume: f32) -> i32 {
    (volume * 100.0).round() as i32
}

impl<A: AudioEngine> Worker for PlaybackWorker<A> {
    fn poll_engine(&mut self) -> bool {
        while let Some(event) = self.engine.poll_event() {
            match event {
                PlaybackEvent::TrackEnded => {
                    self.is_playing = false;
                    self.advance();
                }
                PlaybackEvent::Quit => return false,
            }
        }
        true
    }

    fn process(&mut self, command: WorkerCommand) {
        let WorkerCommand { username, text } = command;
        if let Some(query) = text.strip_prefix(SONG_REQUEST_PREFIX) {
            self.request(query);
            return;
        }

        if !self.editors.contains(&username) {
            debug!("{username} is not an editor; ignoring {text:?}");
            return;
        }

        let mut words = text.split_whitespace();
        match words.next() {
            Some("!play") => self.engine.resume(),
            Some("!pause") => self.engine.pause(),
            Some("!skip") => self.skip(),
            Some("!rewind") => {
                if let Err(e) = self.engine.rewind() {
                    warn!("rewind failed: {e}");
                }
            }
            Some("!vol") => self.change_volume(words.next()),
            Some("!songs") => self.list_songs(),
            _ => debug!("unknown playback command {text:?}"),
        }
    }

    fn shutdown(&mut self) {
        self.engine.stop();
        self.engine.unload();
        self.engine.quit();
        self.is_playing = false;
        if !self.queue.is_empty() {
            info!("dropping {} queued songs", self.queue.len());
        }
    }
}

/// Start a playback worker with an engine built on the worker thread.
///
/// # Errors
///
/// Returns the engine initialization error.
pub fn spawn_with<A, F>(
    make_engine: F,
    settings: PlaybackSettings,
    replies: ReplySender,
) -> Result<WorkerHandle>
where
    A: AudioEngine + 'static,
    F: FnOnce() -> Result<A> + Send + 'static,
{
    WorkerHandle::spawn(PLAYBACK_WORKER, move || {
        let engine = make_engine()?;
        Ok(PlaybackWorker::new(engine, settings, replies))
    })
}

/// Start the playback worker on the default audio output.
///
/// # Errors
///
/// Returns [`crate::BotError::Audio`] if the output device cannot be opened,
/// or if this build has no audio backend.
pub fn spawn(config: &BotConfig, replies: ReplySender) -> Result<WorkerHandle> {
    let settings = PlaybackSettings::from(config);
    #[cfg(feature = "rodio-backend")]
    {
        let volume = settings.initial_volume;
        spawn_with(
            move || rodio_engine::RodioEngine::new(volume),
            settings,
            replies,
        )
    }
    #[cfg(not(feature = "rodio-backend"))]
    {
        drop((settings, replies));
        Err(crate::error::BotError::Audio(
            "built without an audio backend (enable the `rodio-backend` feature)".to_owned(),
        ))
    }
}
