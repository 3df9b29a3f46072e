//! Shared helpers for integration tests: recording engines and a loopback
//! chat server.

use chatvox::bot::{SpawnWorker, WorkerSpawners};
use chatvox::chat::SessionSettings;
use chatvox::playback::{AudioEngine, PlaybackEvent, PlaybackSettings};
use chatvox::speech::{SpeechEngine, SpeechSettings, Voice, VoiceCatalog};
use chatvox::{BotConfig, ReplySender, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

pub(crate) const CHANNEL: &str = "streamer";
pub(crate) const NICK: &str = "vox";

/// Everything a recording speech engine has been asked to say.
pub(crate) type SpeechLog = Arc<Mutex<Vec<(String, u32, String)>>>;

/// Names of tracks a recording audio engine has started.
pub(crate) type AudioLog = Arc<Mutex<Vec<String>>>;

pub(crate) struct RecordingSpeech {
    voices: Vec<Voice>,
    log: SpeechLog,
}

impl SpeechEngine for RecordingSpeech {
    fn catalog(&self) -> VoiceCatalog {
        VoiceCatalog::new(self.voices.clone())
    }

    fn say(&mut self, voice: &Voice, rate: u32, text: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push((voice.id.clone(), rate, text.to_owned()));
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) {}
}

pub(crate) struct RecordingAudio {
    loaded: Option<PathBuf>,
    volume: f32,
    log: AudioLog,
}

impl AudioEngine for RecordingAudio {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if let Some(path) = &self.loaded {
            let name = path.file_stem().unwrap().to_string_lossy().into_owned();
            self.log.lock().unwrap().push(name);
        }
        Ok(())
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn stop(&mut self) {}

    fn unload(&mut self) {
        self.loaded = None;
    }

    fn rewind(&mut self) -> Result<()> {
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn poll_event(&mut self) -> Option<PlaybackEvent> {
        None
    }

    fn quit(&mut self) {}
}

pub(crate) fn voices() -> Vec<Voice> {
    vec![
        Voice::new("TTS_MS_FOREIGN_VOICE", "foreign"),
        Voice::new("TTS_MS_EN-US_ZIRA", "en-us"),
        Voice::new("TTS_MS_FR-FR_HORTENSE", "fr-fr"),
    ]
}

/// A config whose playback library is `music_dir` and whose only editor
/// besides the bot is `mod`.
pub(crate) fn config(music_dir: &Path) -> BotConfig {
    let mut config = BotConfig::default();
    config.chat.nickname = NICK.to_owned();
    config.chat.channel = format!("#{CHANNEL}");
    config.playback.music_dir = music_dir.to_path_buf();
    config.playback.editors = vec!["mod".to_owned()];
    config.speech.min_rate = 120;
    config.speech.max_rate = 300;
    config
}

pub(crate) fn speech_spawner(
    config: &BotConfig,
    profiles_path: Option<PathBuf>,
    log: SpeechLog,
) -> SpawnWorker {
    let settings = SpeechSettings {
        banned: config.speech.banned.iter().cloned().collect(),
        rate_bounds: config.speech.rate_bounds(),
        profiles_path,
    };
    Box::new(move |replies: ReplySender| {
        chatvox::speech::spawn_with(
            move || {
                Ok(RecordingSpeech {
                    voices: voices(),
                    log,
                })
            },
            settings,
            replies,
            StdRng::seed_from_u64(7),
        )
    })
}

pub(crate) fn playback_spawner(config: &BotConfig, log: AudioLog) -> SpawnWorker {
    let settings = PlaybackSettings::from(config);
    Box::new(move |replies: ReplySender| {
        chatvox::playback::spawn_with(
            move || {
                Ok(RecordingAudio {
                    loaded: None,
                    volume: 0.0,
                    log,
                })
            },
            settings,
            replies,
        )
    })
}

pub(crate) fn spawners(speech: Option<SpawnWorker>, playback: Option<SpawnWorker>) -> WorkerSpawners {
    WorkerSpawners { speech, playback }
}

/// A music directory holding empty files with the given names.
pub(crate) fn music_dir(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        std::fs::write(dir.path().join(file), b"").unwrap();
    }
    dir
}

/// Loopback stand-in for the chat service.
pub(crate) struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    pub(crate) async fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    pub(crate) fn settings(&self) -> SessionSettings {
        SessionSettings {
            server: "127.0.0.1".to_owned(),
            port: self.listener.local_addr().unwrap().port(),
            nickname: NICK.to_owned(),
            token: "oauth:test".to_owned(),
            channel: CHANNEL.to_owned(),
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_millis(50),
        }
    }

    /// Accept the bot's connection and consume its handshake.
    pub(crate) async fn accept(&self) -> ServerConn {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .expect("bot did not connect")
            .unwrap();
        let mut conn = ServerConn::new(stream);
        assert_eq!(conn.next_line().await.as_deref(), Some("PASS oauth:test"));
        assert_eq!(conn.next_line().await.as_deref(), Some("NICK vox"));
        assert_eq!(conn.next_line().await.as_deref(), Some("JOIN #streamer"));
        conn
    }
}

/// Server side of one accepted connection.
pub(crate) struct ServerConn {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl ServerConn {
    fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            write,
        }
    }

    pub(crate) async fn send_raw(&mut self, line: &str) {
        self.write.write_all(line.as_bytes()).await.unwrap();
        self.write.write_all(b"\r\n").await.unwrap();
    }

    /// Send a channel message as `user`.
    pub(crate) async fn chat(&mut self, user: &str, text: &str) {
        let line = format!(":{user}!{user}@{user}.tmi.twitch.tv PRIVMSG #{CHANNEL} :{text}");
        self.send_raw(&line).await;
    }

    /// Next line from the bot, or `None` once it has closed the connection.
    pub(crate) async fn next_line(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("no line from bot in time")
            .unwrap()
    }

    /// Every remaining line up to the bot closing the connection.
    pub(crate) async fn remaining_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await {
            lines.push(line);
        }
        lines
    }

    pub(crate) fn hang_up(self) {
        drop(self);
    }
}

/// `PRIVMSG` line the bot sends for `text`.
pub(crate) fn reply_line(text: &str) -> String {
    format!("PRIVMSG #{CHANNEL} :{text}")
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub(crate) async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
