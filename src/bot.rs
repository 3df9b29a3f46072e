//! Bot assembly and the shutdown protocol.
//!
//! Start order: workers (each blocks until serving or failed), then the
//! connection, then the session loops. Shutdown order: ingress stops
//! routing, the speech worker is joined, the playback worker is joined, and
//! finally egress flushes what the workers left behind and the transport is
//! closed.

use crate::chat::{ChatSession, SessionSettings};
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::reply::{ReplySender, reply_channel};
use crate::router::CommandRouter;
use crate::worker::{WorkerHandle, WorkerState};
use tracing::{error, info, warn};

/// Builds a worker that reports into the given reply channel.
pub type SpawnWorker = Box<dyn FnOnce(ReplySender) -> Result<WorkerHandle> + Send>;

/// How to start each worker. `None` means the worker is disabled.
#[derive(Default)]
pub struct WorkerSpawners {
    pub speech: Option<SpawnWorker>,
    pub playback: Option<SpawnWorker>,
}

impl WorkerSpawners {
    /// The real engines, for whichever workers the config enables.
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        let speech: Option<SpawnWorker> = config.speech.enabled.then(|| {
            let speech_config = config.speech.clone();
            Box::new(move |replies: ReplySender| crate::speech::spawn(&speech_config, replies))
                as SpawnWorker
        });
        let playback: Option<SpawnWorker> = config.playback.enabled.then(|| {
            let bot_config = config.clone();
            Box::new(move |replies: ReplySender| crate::playback::spawn(&bot_config, replies))
                as SpawnWorker
        });
        Self { speech, playback }
    }
}

impl std::fmt::Debug for WorkerSpawners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSpawners")
            .field("speech", &self.speech.is_some())
            .field("playback", &self.playback.is_some())
            .finish()
    }
}

/// A running bot: one chat session and its workers.
#[derive(Debug)]
pub struct Bot {
    session: ChatSession,
    speech: Option<WorkerHandle>,
    playback: Option<WorkerHandle>,
}

impl Bot {
    /// Start the bot with the engines selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns a worker init error when `session.require_all_workers` is set,
    /// or [`crate::BotError::Connection`] if the chat service is unreachable.
    pub async fn start(config: &BotConfig) -> Result<Self> {
        Self::start_with(
            config,
            WorkerSpawners::from_config(config),
            SessionSettings::from(&config.chat),
        )
        .await
    }

    /// Start the bot with explicit worker spawners and connection settings.
    ///
    /// # Errors
    ///
    /// See [`Bot::start`].
    pub async fn start_with(
        config: &BotConfig,
        spawners: WorkerSpawners,
        settings: SessionSettings,
    ) -> Result<Self> {
        let require_all = config.session.require_all_workers;
        let (replies, reply_rx) = reply_channel();

        let speech = start_worker("speech", spawners.speech, &replies, require_all).await?;
        let playback =
            match start_worker("playback", spawners.playback, &replies, require_all).await {
                Ok(playback) => playback,
                Err(e) => {
                    stop_worker(speech).await;
                    return Err(e);
                }
            };
        // Only worker-held senders may remain, so egress ends when they stop.
        drop(replies);

        let router = CommandRouter::new(
            speech.as_ref().map(WorkerHandle::mailbox),
            playback.as_ref().map(WorkerHandle::mailbox),
        );

        let session = ChatSession::connect(settings)
            .await
            .and_then(|mut session| session.start(router, reply_rx).map(|()| session));
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                stop_worker(speech).await;
                stop_worker(playback).await;
                return Err(e);
            }
        };
        info!(
            "bot running on #{} (speech: {}, playback: {})",
            session.channel(),
            speech.is_some(),
            playback.is_some()
        );

        Ok(Self {
            session,
            speech,
            playback,
        })
    }

    /// Resolves when the connection has failed and the bot should be shut down.
    pub async fn terminated(&self) {
        self.session.terminated().await;
    }

    #[must_use]
    pub fn speech_state(&self) -> Option<WorkerState> {
        self.speech.as_ref().map(WorkerHandle::state)
    }

    #[must_use]
    pub fn playback_state(&self) -> Option<WorkerState> {
        self.playback.as_ref().map(WorkerHandle::state)
    }

    /// Shut everything down in order. Safe to call more than once.
    ///
    /// Worker failures are logged; the returned error is the transport error
    /// that ended the session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BotError::Connection`] if the session had failed.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("shutting down");
        let ingress = self.session.stop_ingress().await;
        stop_worker(self.speech.take()).await;
        stop_worker(self.playback.take()).await;
        let egress = self.session.finish().await;
        info!("shutdown complete");
        ingress.and(egress)
    }
}

/// Spawn one worker off the async runtime; spawning blocks until the worker
/// is serving or has failed.
async fn start_worker(
    name: &str,
    spawner: Option<SpawnWorker>,
    replies: &ReplySender,
    require_all: bool,
) -> Result<Option<WorkerHandle>> {
    let Some(spawn) = spawner else {
        info!("{name} worker disabled");
        return Ok(None);
    };
    let replies = replies.clone();
    let spawned = tokio::task::spawn_blocking(move || spawn(replies))
        .await
        .map_err(|e| BotError::Channel(format!("{name} worker start failed: {e}")))
        .and_then(|spawned| spawned);
    match spawned {
        Ok(handle) => Ok(Some(handle)),
        Err(e) if require_all => {
            error!("{name} worker failed to start: {e}");
            Err(e)
        }
        Err(e) => {
            warn!("{name} worker failed to start, continuing without it: {e}");
            Ok(None)
        }
    }
}

async fn stop_worker(handle: Option<WorkerHandle>) {
    let Some(mut handle) = handle else {
        return;
    };
    let name = handle.name();
    let joined = tokio::task::spawn_blocking(move || handle.stop()).await;
    match joined {
        Ok(Ok(())) => info!("{name} worker joined"),
        Ok(Err(e)) => error!("{e}"),
        Err(e) => error!("cannot join {name} worker: {e}"),
    }
}
