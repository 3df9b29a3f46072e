//! [`AudioEngine`] backed by `rodio` on the default output device.

use super::engine::{AudioEngine, PlaybackEvent, TrackEndLatch};
use crate::error::{BotError, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Plays one decoded file at a time through a fresh [`Sink`].
///
/// Holds the output stream, so it must stay on the thread that created it.
pub struct RodioEngine {
    _stream: Option<OutputStream>,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    loaded: Option<PathBuf>,
    volume: f32,
    end: TrackEndLatch,
    quit: bool,
}

impl RodioEngine {
    /// Open the default audio output device.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Audio`] if no output device is available.
    pub fn new(initial_volume: f32) -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| BotError::Audio(format!("failed to open audio output: {e}")))?;
        info!("audio output opened");
        Ok(Self {
            _stream: Some(stream),
            handle,
            sink: None,
            loaded: None,
            volume: initial_volume.clamp(0.0, 1.0),
            end: TrackEndLatch::default(),
            quit: false,
        })
    }

    fn open_sink(&self, path: &Path) -> Result<Sink> {
        let file = File::open(path)
            .map_err(|e| BotError::Audio(format!("cannot open {}: {e}", path.display())))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| BotError::Audio(format!("cannot decode {}: {e}", path.display())))?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| BotError::Audio(format!("failed to create audio sink: {e}")))?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(source);
        Ok(sink)
    }
}

impl AudioEngine for RodioEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.stop();
        let sink = self.open_sink(path)?;
        debug!("loaded {}", path.display());
        self.sink = Some(sink);
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| BotError::Audio("no track loaded".to_owned()))?;
        sink.play();
        self.end.arm();
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
            if !sink.empty() {
                self.end.arm();
            }
        }
    }

    fn stop(&mut self) {
        self.end.disarm();
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn unload(&mut self) {
        self.stop();
        self.loaded = None;
    }

    fn rewind(&mut self) -> Result<()> {
        let Some(path) = self.loaded.clone() else {
            return Ok(());
        };
        let paused = self.sink.as_ref().is_none_or(Sink::is_paused);
        self.load(&path)?;
        if !paused {
            self.play()?;
        }
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn poll_event(&mut self) -> Option<PlaybackEvent> {
        if self.quit {
            return Some(PlaybackEvent::Quit);
        }
        if self.end.fire(self.sink.as_ref().is_none_or(Sink::empty)) {
            return Some(PlaybackEvent::TrackEnded);
        }
        None
    }

    fn quit(&mut self) {
        self.unload();
        self._stream = None;
        self.quit = true;
    }
}
