//! Speech worker: speaks chat messages in a per-user voice.
//!
//! Every non-banned chatter gets a [`VoiceProfile`] on first contact. The
//! `!voice <token> [rate]` command changes it; everything else routed here is
//! read aloud. Profiles are owned by the worker thread and persisted when the
//! worker stops.

pub mod engine;
pub mod profiles;
pub mod voices;

pub use engine::{EspeakEngine, SpeechEngine};
pub use profiles::{ProfileMap, VoiceProfile};
pub use voices::{Voice, VoiceCatalog};

use crate::config::SpeechConfig;
use crate::error::{BotError, Result};
use crate::reply::ReplySender;
use crate::router::VOICE_PREFIX;
use crate::worker::{Worker, WorkerCommand, WorkerHandle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Worker name used for the thread and logs.
pub const SPEECH_WORKER: &str = "speech";

/// Settings the speech worker needs, resolved from [`SpeechConfig`].
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub banned: HashSet<String>,
    pub rate_bounds: (u32, u32),
    /// Profile store; `None` keeps profiles in memory only.
    pub profiles_path: Option<PathBuf>,
}

impl From<&SpeechConfig> for SpeechSettings {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            banned: config.banned.iter().cloned().collect(),
            rate_bounds: config.rate_bounds(),
            profiles_path: Some(config.resolved_profiles_path()),
        }
    }
}

/// Owned state of the speech worker.
pub struct SpeechWorker<E: SpeechEngine> {
    engine: E,
    catalog: VoiceCatalog,
    profiles: ProfileMap,
    settings: SpeechSettings,
    rng: StdRng,
    replies: ReplySender,
}

impl<E: SpeechEngine> SpeechWorker<E> {
    /// Build the worker around an initialized engine and load stored profiles.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Tts`] if the engine exposes no voices.
    pub fn new(
        engine: E,
        settings: SpeechSettings,
        replies: ReplySender,
        mut rng: StdRng,
    ) -> Result<Self> {
        let catalog = engine.catalog();
        if catalog.is_empty() {
            return Err(BotError::Tts("voice catalog is empty".to_owned()));
        }

        let mut profiles = settings
            .profiles_path
            .as_deref()
            .map(profiles::load_profiles)
            .unwrap_or_default();
        let repaired = profiles::revalidate(
            &mut profiles,
            catalog.len(),
            settings.rate_bounds,
            &mut rng,
        );
        info!(
            "speech worker has {} voices and {} stored profiles ({repaired} repaired)",
            catalog.len(),
            profiles.len()
        );

        Ok(Self {
            engine,
            catalog,
            profiles,
            settings,
            rng,
            replies,
        })
    }

    /// Stored profile for `username`, if any.
    #[must_use]
    pub fn profile(&self, username: &str) -> Option<VoiceProfile> {
        self.profiles.get(username).copied()
    }

    /// All stored profiles.
    #[must_use]
    pub fn profiles(&self) -> &ProfileMap {
        &self.profiles
    }

    /// The loaded voice catalog.
    #[must_use]
    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    /// The engine, for inspection.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn profile_or_create(&mut self, username: &str) -> VoiceProfile {
        if let Some(profile) = self.profiles.get(username) {
            return *profile;
        }
        let profile = VoiceProfile::random(&mut self.rng, self.catalog.len());
        debug!("new voice profile for {username}: {profile:?}");
        self.profiles.insert(username.to_owned(), profile);
        profile
    }

    fn change_voice(&mut self, username: &str, args: &str, current: VoiceProfile) {
        let tokens: Vec<&str> = args.split_whitespace().collect();

        let voice_index = tokens
            .first()
            .and_then(|token| self.catalog.find(token))
            .unwrap_or(current.voice_index);

        let (min_rate, max_rate) = self.settings.rate_bounds;
        let rate = match tokens.as_slice() {
            [_, .., last] => last
                .parse::<i64>()
                .ok()
                .map(|rate| rate.clamp(i64::from(min_rate), i64::from(max_rate)))
                .and_then(|rate| u32::try_from(rate).ok())
                .unwrap_or(current.rate),
            _ => current.rate,
        };

        let updated = VoiceProfile::new(voice_index, rate);
        self.profiles.insert(username.to_owned(), updated);
        info!("{username} changed voice to {updated:?}");

        let confirmation = format!("{username} has changed voices");
        self.speak(updated, &confirmation);
        self.replies.send(confirmation);
    }

    fn speak(&mut self, profile: VoiceProfile, text: &str) {
        let index = if profile.voice_index < self.catalog.len() {
            profile.voice_index
        } else {
            warn!(
                "voice index {} out of range for {} voices; using voice 0",
                profile.voice_index,
                self.catalog.len()
            );
            0
        };

        let Some(voice) = self.catalog.get(index).cloned() else {
            return;
        };
        if let Err(e) = self.engine.say(&voice, profile.rate, text) {
            if index == 0 {
                error!("speech engine rejected voice {}: {e}", voice.id);
                return;
            }
            warn!("speech engine rejected voice {}: {e}; using voice 0", voice.id);
            if let Some(fallback) = self.catalog.get(0).cloned()
                && let Err(e) = self.engine.say(&fallback, profile.rate, text)
            {
                error!("speech engine rejected fallback voice {}: {e}", fallback.id);
            }
        }
    }

    fn persist(&self) {
        let Some(path) = self.settings.profiles_path.as_deref() else {
            return;
        };
        match profiles::save_profiles(path, &self.profiles) {
            Ok(()) => info!("saved {} voice profiles to {}", self.profiles.len(), path.display()),
            Err(e) => error!("{e}"),
        }
    }
}

impl<E: SpeechEngine> Worker for SpeechWorker<E> {
    fn poll_engine(&mut self) -> bool {
        if let Err(e) = self.engine.tick() {
            warn!("speech engine tick failed: {e}");
        }
        true
    }

    fn process(&mut self, command: WorkerCommand) {
        let WorkerCommand { username, text } = command;
        if self.settings.banned.contains(&username) {
            debug!("ignoring banned user {username}");
            return;
        }

        let profile = self.profile_or_create(&username);
        match text.strip_prefix(VOICE_PREFIX) {
            Some(args) => self.change_voice(&username, args, profile),
            None => self.speak(profile, &text),
        }
    }

    fn shutdown(&mut self) {
        self.persist();
        self.engine.shutdown();
    }
}

/// Start a speech worker on its own thread with an engine built by `make_engine`.
///
/// # Errors
///
/// Returns the engine or catalog initialization error.
pub fn spawn_with<E, F>(
    make_engine: F,
    settings: SpeechSettings,
    replies: ReplySender,
    rng: StdRng,
) -> Result<WorkerHandle>
where
    E: SpeechEngine + 'static,
    F: FnOnce() -> Result<E> + Send + 'static,
{
    WorkerHandle::spawn(SPEECH_WORKER, move || {
        let engine = make_engine()?;
        SpeechWorker::new(engine, settings, replies, rng)
    })
}

/// Start the speech worker backed by the configured command-line synthesizer.
///
/// # Errors
///
/// Returns [`BotError::Tts`] if the synthesizer cannot be initialized.
pub fn spawn(config: &SpeechConfig, replies: ReplySender) -> Result<WorkerHandle> {
    let command = config.command.clone();
    spawn_with(
        move || EspeakEngine::new(&command),
        SpeechSettings::from(config),
        replies,
        StdRng::from_entropy(),
    )
}
