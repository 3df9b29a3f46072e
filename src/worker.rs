//! Worker lifecycle shared by the speech and playback workers.
//!
//! Each worker runs on its own named thread and owns all of its mutable
//! state. The only thing shared with the rest of the process is the command
//! queue (a `crossbeam-channel` mailbox) and a running flag. Engines are built
//! on the worker thread itself by an init closure, so they never need to be
//! `Send`.
//!
//! ```text
//! Starting ──init ok──▶ Serving ──stop()──▶ Stopping ──shutdown──▶ Stopped
//!     └──init err──────────────────────────────────────────────────▶ Stopped
//! ```

use crate::error::{BotError, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sleep between polls when the command queue is empty.
pub const IDLE_POLL: Duration = Duration::from_millis(10);

/// One routed chat command: who sent it and what they said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub username: String,
    pub text: String,
}

impl WorkerCommand {
    pub fn new(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            text: text.into(),
        }
    }
}

/// Lifecycle state of a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Starting = 0,
    Serving = 1,
    Stopping = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Serving,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// A poll-driven worker: one bounded unit of engine work, then at most one
/// command, per serving iteration.
pub trait Worker {
    /// Drive the engine once (drain notifications, advance utterances).
    ///
    /// Returns `false` when the engine has quit and the loop must exit.
    fn poll_engine(&mut self) -> bool;

    /// Process exactly one command to completion.
    fn process(&mut self, command: WorkerCommand);

    /// Release the engine and persist state. Runs on the worker thread after
    /// the serving loop exits, before `stop()` returns to its caller.
    fn shutdown(&mut self);
}

/// Producer side of a worker's command queue.
#[derive(Debug, Clone)]
pub struct WorkerMailbox {
    name: &'static str,
    tx: Sender<WorkerCommand>,
}

impl WorkerMailbox {
    /// Worker name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue a command without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Channel`] if the worker has exited.
    pub fn submit(&self, command: WorkerCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| BotError::Channel(format!("{} worker is not running", self.name)))
    }

    /// Build a mailbox whose commands land in `tx`. Used by tests that want
    /// to observe routing without a worker thread.
    #[must_use]
    pub fn from_sender(name: &'static str, tx: Sender<WorkerCommand>) -> Self {
        Self { name, tx }
    }
}

/// Owning handle to a running worker thread.
pub struct WorkerHandle {
    name: &'static str,
    mailbox: WorkerMailbox,
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a worker thread and wait until it is serving.
    ///
    /// `init` runs on the new thread; its failure is returned here and the
    /// thread exits without entering the serving state.
    ///
    /// # Errors
    ///
    /// Returns the init error, or [`BotError::Worker`] if the thread could
    /// not be spawned or died during init.
    pub fn spawn<W, F>(name: &'static str, init: F) -> Result<Self>
    where
        W: Worker + 'static,
        F: FnOnce() -> Result<W> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerCommand>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(AtomicU8::new(WorkerState::Starting as u8));

        let thread = {
            let running = Arc::clone(&running);
            let state = Arc::clone(&state);
            std::thread::Builder::new()
                .name(format!("chatvox-{name}"))
                .spawn(move || run_worker(name, init, rx, ready_tx, running, state))
                .map_err(|e| BotError::Worker(format!("cannot spawn {name} worker: {e}")))?
        };

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(BotError::Worker(format!("{name} worker died during init"))));
        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e);
        }

        Ok(Self {
            name,
            mailbox: WorkerMailbox { name, tx },
            running,
            state,
            thread: Some(thread),
        })
    }

    /// Worker name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// A producer handle for the command queue.
    #[must_use]
    pub fn mailbox(&self) -> WorkerMailbox {
        self.mailbox.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Signal the worker to stop and wait for it to finish shutting down.
    ///
    /// Idempotent; a second call returns `Ok(())` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Worker`] if the worker thread panicked.
    pub fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        info!("{} worker stopping", self.name);
        self.running.store(false, Ordering::Release);
        thread
            .join()
            .map_err(|_| BotError::Worker(format!("{} worker panicked", self.name)))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("{e}");
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

fn run_worker<W, F>(
    name: &'static str,
    init: F,
    rx: Receiver<WorkerCommand>,
    ready_tx: Sender<Result<()>>,
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
) where
    W: Worker,
    F: FnOnce() -> Result<W>,
{
    info!("{name} worker is starting");
    let mut worker = match init() {
        Ok(worker) => worker,
        Err(e) => {
            error!("{name} worker failed to start: {e}");
            state.store(WorkerState::Stopped as u8, Ordering::Release);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    state.store(WorkerState::Serving as u8, Ordering::Release);
    let _ = ready_tx.send(Ok(()));
    info!("{name} worker is serving");

    while running.load(Ordering::Acquire) {
        if !worker.poll_engine() {
            warn!("{name} engine quit; leaving serving loop");
            break;
        }
        match rx.try_recv() {
            Ok(command) => {
                debug!("{name} processing command from {}", command.username);
                worker.process(command);
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                std::thread::sleep(IDLE_POLL);
            }
        }
    }

    state.store(WorkerState::Stopping as u8, Ordering::Release);
    worker.shutdown();
    state.store(WorkerState::Stopped as u8, Ordering::Release);
    info!("{name} worker stopped");
}
