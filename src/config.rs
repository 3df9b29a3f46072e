//! Configuration types for the chat bot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides [`ChatConfig::token`].
pub const TOKEN_ENV_VAR: &str = "CHATVOX_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Chat service connection settings.
    pub chat: ChatConfig,
    /// Speech worker settings.
    pub speech: SpeechConfig,
    /// Playback worker settings.
    pub playback: PlaybackConfig,
    /// Session start policy.
    pub session: SessionConfig,
}

/// Chat service endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// IRC host name.
    pub server: String,
    /// IRC port (plain TCP).
    pub port: u16,
    /// Bot nickname; always treated as a playback editor.
    pub nickname: String,
    /// Credential sent with `PASS`. `CHATVOX_TOKEN` takes precedence.
    pub token: String,
    /// Channel to join, with or without the leading `#`.
    pub channel: String,
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout_ms: u64,
    /// Upper bound on a single read before the ingress loop re-checks stop.
    pub read_timeout_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server: "irc.chat.twitch.tv".to_owned(),
            port: 6667,
            nickname: "bot".to_owned(),
            token: "oauth:TOKENHERE".to_owned(),
            channel: "#channelname".to_owned(),
            connect_timeout_ms: 10_000,
            read_timeout_ms: 500,
        }
    }
}

impl ChatConfig {
    /// Channel name without the leading `#`.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        self.channel.trim().trim_start_matches('#')
    }

    /// Token to authenticate with, preferring the environment override.
    #[must_use]
    pub fn resolved_token(&self) -> String {
        match std::env::var(TOKEN_ENV_VAR) {
            Ok(token) if !token.trim().is_empty() => token,
            _ => self.token.clone(),
        }
    }
}

/// Speech worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether the speech worker is started.
    pub enabled: bool,
    /// Usernames whose messages are never spoken.
    pub banned: Vec<String>,
    /// Lowest rate a `!voice` command may request.
    pub min_rate: u32,
    /// Highest rate a `!voice` command may request.
    pub max_rate: u32,
    /// Voice profile store (None = `data_dir()/voice_profiles.json`).
    pub profiles_path: Option<PathBuf>,
    /// Synthesis executable (looked up on `PATH`).
    pub command: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            banned: Vec::new(),
            min_rate: 100,
            max_rate: 300,
            profiles_path: None,
            command: "espeak-ng".to_owned(),
        }
    }
}

impl SpeechConfig {
    /// Effective voice profile store path.
    #[must_use]
    pub fn resolved_profiles_path(&self) -> PathBuf {
        self.profiles_path
            .clone()
            .unwrap_or_else(crate::app_dirs::voice_profiles_file)
    }

    /// Rate bounds as an ordered `(min, max)` pair.
    #[must_use]
    pub fn rate_bounds(&self) -> (u32, u32) {
        if self.min_rate <= self.max_rate {
            (self.min_rate, self.max_rate)
        } else {
            (self.max_rate, self.min_rate)
        }
    }
}

/// Playback worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Whether the playback worker is started.
    pub enabled: bool,
    /// Directory scanned for playable songs.
    pub music_dir: PathBuf,
    /// Usernames allowed to issue transport, volume and list commands.
    pub editors: Vec<String>,
    /// Recognized audio file extensions (case-insensitive, no dot).
    pub extensions: Vec<String>,
    /// Volume applied when the audio engine starts (0.0..=1.0).
    pub initial_volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            music_dir: PathBuf::from("music"),
            editors: Vec::new(),
            extensions: ["mp3", "wav", "ogg", "flac"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            initial_volume: 0.5,
        }
    }
}

/// Session start policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Abort bot start when any enabled worker fails to initialize.
    pub require_all_workers: bool,
}

impl BotConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::BotError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::BotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }

    /// Playback editors including the bot's own nickname.
    #[must_use]
    pub fn effective_editors(&self) -> Vec<String> {
        let mut editors = self.playback.editors.clone();
        let nickname = self.chat.nickname.trim();
        if !nickname.is_empty() && !editors.iter().any(|e| e == nickname) {
            editors.push(nickname.to_owned());
        }
        editors
    }
}
