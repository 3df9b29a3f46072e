//! Speech synthesis engine seam and the `espeak-ng` command-line backend.

use super::voices::{Voice, VoiceCatalog};
use crate::error::{BotError, Result};
use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// A synthesis engine driven cooperatively by the speech worker.
///
/// `say` only queues an utterance; `tick` does one bounded unit of work to
/// advance whatever is in progress and must never block for long.
pub trait SpeechEngine {
    /// The engine's voices, in engine order.
    fn catalog(&self) -> VoiceCatalog;

    /// Queue `text` to be spoken with `voice` at `rate` words per minute.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Tts`] if the engine rejects the voice or text.
    fn say(&mut self, voice: &Voice, rate: u32, text: &str) -> Result<()>;

    /// Advance in-progress utterances.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Tts`] if an utterance could not be started.
    fn tick(&mut self) -> Result<()>;

    /// Abort pending speech and release engine resources.
    fn shutdown(&mut self);
}

#[derive(Debug)]
struct Utterance {
    voice: String,
    rate: u32,
    text: String,
}

/// Speaks through an `espeak-ng` compatible executable, one process per
/// utterance, strictly in queue order.
#[derive(Debug)]
pub struct EspeakEngine {
    program: PathBuf,
    catalog: VoiceCatalog,
    pending: VecDeque<Utterance>,
    current: Option<Child>,
}

impl EspeakEngine {
    /// Locate `command` on `PATH` and load its voice list.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Tts`] if the executable is missing, the voice list
    /// cannot be read, or it is empty.
    pub fn new(command: &str) -> Result<Self> {
        let program = which::which(command)
            .map_err(|e| BotError::Tts(format!("cannot find `{command}`: {e}")))?;
        let output = Command::new(&program)
            .arg("--voices")
            .stderr(Stdio::null())
            .output()
            .map_err(|e| BotError::Tts(format!("cannot list voices: {e}")))?;
        if !output.status.success() {
            return Err(BotError::Tts(format!(
                "`{command} --voices` exited with {}",
                output.status
            )));
        }

        let catalog = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        if catalog.is_empty() {
            return Err(BotError::Tts(format!("`{command}` reported no voices")));
        }
        info!("loaded {} voices from {}", catalog.len(), program.display());

        Ok(Self {
            program,
            catalog,
            pending: VecDeque::new(),
            current: None,
        })
    }

    fn start(&self, utterance: &Utterance) -> Result<Child> {
        let mut child = Command::new(&self.program)
            .arg("-v")
            .arg(&utterance.voice)
            .arg("-s")
            .arg(utterance.rate.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BotError::Tts(format!("cannot start synthesis: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(utterance.text.as_bytes())
                .map_err(|e| BotError::Tts(format!("cannot send text to synthesizer: {e}")))?;
        }
        Ok(child)
    }
}

impl SpeechEngine for EspeakEngine {
    fn catalog(&self) -> VoiceCatalog {
        self.catalog.clone()
    }

    fn say(&mut self, voice: &Voice, rate: u32, text: &str) -> Result<()> {
        if !self.catalog.iter().any(|v| v.engine_name == voice.engine_name) {
            return Err(BotError::Tts(format!("unknown voice `{}`", voice.id)));
        }
        self.pending.push_back(Utterance {
            voice: voice.engine_name.clone(),
            rate,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        if let Some(child) = self.current.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        warn!("synthesizer exited with {status}");
                    }
                    self.current = None;
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    warn!("cannot poll synthesizer: {e}");
                    self.current = None;
                }
            }
        }

        if let Some(next) = self.pending.pop_front() {
            debug!("speaking with {} at {}", next.voice, next.rate);
            self.current = Some(self.start(&next)?);
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.pending.clear();
        if let Some(mut child) = self.current.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Parse `espeak-ng --voices` output into a catalog.
///
/// Columns: `Pty Language Age/Gender VoiceName File [Other Languages]`.
#[must_use]
pub fn parse_voice_list(output: &str) -> VoiceCatalog {
    let voices = output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let _age_gender = cols.next()?;
            let name = cols.next()?;
            Some(Voice::new(format!("{language}_{name}"), language))
        })
        .collect();
    VoiceCatalog::new(voices)
}
