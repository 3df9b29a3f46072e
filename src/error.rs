//! Error types for the chat bot.

/// Top-level error type for the chat-command router.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Transport could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or unexpected protocol line.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Speech synthesis engine or voice catalog error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio engine or song library error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Voice profile load/save error.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Worker thread lifecycle error (spawn, init, join).
    #[error("worker error: {0}")]
    Worker(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;
