//! Chatvox: a chat-command router for streams.
//!
//! The bot keeps one connection to an IRC-style chat service and hands each
//! chat message to one of two workers:
//!
//! - **Speech**: reads chat aloud, one voice and rate per chatter (`!voice`)
//! - **Playback**: song requests (`!sr`) and editor controls (`!play`,
//!   `!pause`, `!skip`, `!rewind`, `!vol`, `!songs`)
//!
//! # Architecture
//!
//! ```text
//! ChatSession.ingress ─▶ CommandRouter ─▶ { SpeechWorker | PlaybackWorker }
//!                                                    │
//! ChatSession.egress ◀──────── ReplyChannel ◀────────┘
//! ```
//!
//! Workers run on their own threads and own all of their state; the router
//! only ever pushes onto their command queues. See [`bot`] for the start and
//! shutdown ordering.

pub mod app_dirs;
pub mod bot;
pub mod chat;
pub mod config;
pub mod error;
pub mod playback;
pub mod reply;
pub mod router;
pub mod speech;
pub mod worker;

pub use bot::{Bot, WorkerSpawners};
pub use chat::ChatSession;
pub use chat::protocol::ChatMessage;
pub use config::BotConfig;
pub use error::{BotError, Result};
pub use reply::{ReplyReceiver, ReplySender, reply_channel};
pub use router::{CommandRouter, Destination};
pub use worker::{WorkerHandle, WorkerState};
