//! Reply channel: FIFO hand-off of outbound chat text from workers to the
//! session's egress loop.
//!
//! Senders are cheap to clone and usable from plain threads. The receiver is
//! drained asynchronously; once every sender is dropped and the buffer is
//! empty, [`ReplyReceiver::recv`] returns `None`, which is how the egress loop
//! knows it has flushed everything the workers produced.

use tokio::sync::mpsc;
use tracing::warn;

/// Create a connected sender/receiver pair.
#[must_use]
pub fn reply_channel() -> (ReplySender, ReplyReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReplySender { tx }, ReplyReceiver { rx })
}

/// Producer side, held by workers.
#[derive(Debug, Clone)]
pub struct ReplySender {
    tx: mpsc::UnboundedSender<String>,
}

impl ReplySender {
    /// Queue one reply. Dropped with a warning if the egress side is gone.
    pub fn send(&self, text: impl Into<String>) {
        let text = text.into();
        if self.tx.send(text).is_err() {
            warn!("reply dropped: egress loop is no longer running");
        }
    }

    /// Queue several replies, preserving their order.
    pub fn send_all<I, S>(&self, replies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for reply in replies {
            self.send(reply);
        }
    }

    /// Whether the receiving side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, owned by the egress loop.
#[derive(Debug)]
pub struct ReplyReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ReplyReceiver {
    /// Wait for the next reply; `None` once all senders are gone and the
    /// buffer is drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Take a reply without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Number of replies currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no replies are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
