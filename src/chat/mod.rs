//! Chat session: one connection to the chat service and the two loops that
//! share it.
//!
//! Ingress reads lines, answers keep-alive probes straight away and hands
//! chat messages to the [`CommandRouter`]. Egress drains the reply channel
//! and writes each reply as a channel message. Both loops write through the
//! same locked write half, so a `PONG` never waits behind the reply backlog
//! for longer than one line.

pub mod protocol;

use crate::config::ChatConfig;
use crate::error::{BotError, Result};
use crate::reply::ReplyReceiver;
use crate::router::CommandRouter;
use protocol::InboundLine;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long [`ChatSession::finish`] waits for egress to flush before giving up.
pub const EGRESS_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on shutting the write half down once both loops are gone.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Unpin + Send>>>;

/// Connection settings resolved from [`ChatConfig`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub server: String,
    pub port: u16,
    pub nickname: String,
    pub token: String,
    /// Channel name without the leading `#`.
    pub channel: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl From<&ChatConfig> for SessionSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            server: config.server.clone(),
            port: config.port,
            nickname: config.nickname.clone(),
            token: config.resolved_token(),
            channel: config.channel_name().to_owned(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            read_timeout: Duration::from_millis(config.read_timeout_ms.max(1)),
        }
    }
}

/// One live connection to the chat service.
pub struct ChatSession {
    settings: SessionSettings,
    reader: Option<BoxedReader>,
    writer: SharedWriter,
    /// Stops ingress only; egress keeps draining.
    stop_ingress: CancellationToken,
    /// Ends both loops without draining (transport failure).
    abort: CancellationToken,
    ingress: Option<JoinHandle<Result<()>>>,
    egress: Option<JoinHandle<Result<()>>>,
    closed: bool,
}

impl ChatSession {
    /// Open a TCP connection and perform the handshake.
    ///
    /// Not retried here; reconnecting is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Connection`] if the host is unreachable, the
    /// connect times out, or the handshake cannot be written.
    pub async fn connect(settings: SessionSettings) -> Result<Self> {
        let address = format!("{}:{}", settings.server, settings.port);
        info!("connecting to {address}");
        let stream = tokio::time::timeout(settings.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| BotError::Connection(format!("timed out connecting to {address}")))?
            .map_err(|e| BotError::Connection(format!("cannot connect to {address}: {e}")))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("cannot disable Nagle on chat socket: {e}");
        }
        Self::with_stream(stream, settings).await
    }

    /// Perform the handshake over an already-open stream.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Connection`] if the handshake cannot be written.
    pub async fn with_stream<S>(stream: S, settings: SessionSettings) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(writer)));

        for line in protocol::handshake_lines(&settings.token, &settings.nickname, &settings.channel)
        {
            write_line(&writer, &line)
                .await
                .map_err(|e| BotError::Connection(format!("handshake failed: {e}")))?;
        }
        info!("joined #{} as {}", settings.channel, settings.nickname);

        Ok(Self {
            settings,
            reader: Some(Box::new(reader)),
            writer,
            stop_ingress: CancellationToken::new(),
            abort: CancellationToken::new(),
            ingress: None,
            egress: None,
            closed: false,
        })
    }

    /// Channel this session joined, without `#`.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.settings.channel
    }

    /// Spawn the ingress and egress loops.
    ///
    /// Callers start the session only once every configured worker is
    /// serving, so no early message is routed to a worker that is not there.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Connection`] if the session was already started.
    pub fn start(&mut self, router: CommandRouter, replies: ReplyReceiver) -> Result<()> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| BotError::Connection("session already started".to_owned()))?;

        if !router.has_workers() {
            warn!("no workers are running; chat messages will be dropped");
        }

        self.ingress = Some(tokio::spawn(run_ingress(
            reader,
            Arc::clone(&self.writer),
            router,
            self.settings.read_timeout,
            self.stop_ingress.clone(),
            self.abort.clone(),
        )));
        self.egress = Some(tokio::spawn(run_egress(
            replies,
            Arc::clone(&self.writer),
            self.settings.channel.clone(),
            self.abort.clone(),
        )));
        info!("chat session started");
        Ok(())
    }

    /// Resolves once either loop has hit a transport error.
    pub async fn terminated(&self) {
        self.abort.cancelled().await;
    }

    /// Stop reading and routing, and wait for the ingress loop to exit.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended ingress, if any.
    pub async fn stop_ingress(&mut self) -> Result<()> {
        self.stop_ingress.cancel();
        match self.ingress.take() {
            Some(handle) => join_loop("ingress", handle).await,
            None => Ok(()),
        }
    }

    /// Wait for egress to flush every pending reply, then close the transport.
    ///
    /// Egress finishes once all reply senders are gone, so workers should be
    /// stopped first. If it does not finish within [`EGRESS_DRAIN_TIMEOUT`]
    /// the remaining replies are abandoned.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended egress, if any.
    pub async fn finish(&mut self) -> Result<()> {
        let result = match self.egress.take() {
            Some(mut handle) => {
                match tokio::time::timeout(EGRESS_DRAIN_TIMEOUT, &mut handle).await {
                    Ok(joined) => flatten_join("egress", joined),
                    Err(_) => {
                        warn!("egress did not drain in time; dropping pending replies");
                        self.abort.cancel();
                        join_loop("egress", handle).await
                    }
                }
            }
            None => Ok(()),
        };
        self.close().await;
        result
    }

    /// Stop both loops and close the transport. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns the first transport error either loop ended with.
    pub async fn stop(&mut self) -> Result<()> {
        let ingress = self.stop_ingress().await;
        let egress = self.finish().await;
        ingress.and(egress)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stop_ingress.cancel();
        let writer = Arc::clone(&self.writer);
        let closed = tokio::time::timeout(CLOSE_TIMEOUT, async move {
            writer.lock().await.shutdown().await
        })
        .await;
        match closed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("transport already closed: {e}"),
            Err(_) => warn!("transport did not close in time; dropping it"),
        }
        info!("chat connection closed");
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.stop_ingress.cancel();
        self.abort.cancel();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("channel", &self.settings.channel)
            .field("started", &self.reader.is_none())
            .field("closed", &self.closed)
            .finish()
    }
}

async fn write_line(writer: &SharedWriter, line: &str) -> Result<()> {
    if line.starts_with("PASS ") {
        debug!("> PASS ***");
    } else {
        debug!("> {line}");
    }
    let mut writer = writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn run_ingress(
    reader: BoxedReader,
    writer: SharedWriter,
    router: CommandRouter,
    read_timeout: Duration,
    stop: CancellationToken,
    abort: CancellationToken,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    let result = loop {
        // A timed-out read keeps its partial bytes in `buf`; the next read
        // continues the same line.
        let next = tokio::select! {
            biased;
            () = stop.cancelled() => break Ok(()),
            () = abort.cancelled() => break Ok(()),
            next = tokio::time::timeout(read_timeout, reader.read_until(b'\n', &mut buf)) => next,
        };

        match next {
            Err(_elapsed) => continue,
            Ok(Ok(0)) => {
                break Err(BotError::Connection("server closed the connection".to_owned()));
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => break Err(BotError::Connection(format!("read failed: {e}"))),
        }

        let raw = std::mem::take(&mut buf);
        let Some(line) = decode_line(raw) else {
            continue;
        };

        debug!("< {line}");
        match protocol::parse_line(&line) {
            Ok(InboundLine::Ping) => {
                let written = tokio::select! {
                    biased;
                    () = stop.cancelled() => break Ok(()),
                    () = abort.cancelled() => break Ok(()),
                    written = write_line(&writer, protocol::PONG_LINE) => written,
                };
                if let Err(e) = written {
                    break Err(BotError::Connection(format!("cannot answer PING: {e}")));
                }
            }
            Ok(InboundLine::Message(message)) => {
                router.route(&message);
            }
            Ok(InboundLine::Other) => {}
            Err(e) => warn!("skipping line: {e}"),
        }
    };

    if let Err(e) = &result {
        warn!("ingress stopped: {e}");
        abort.cancel();
    }
    debug!("ingress loop exited");
    result
}

/// Strip the line terminator and decode; a line that is not UTF-8 is skipped.
fn decode_line(mut raw: Vec<u8>) -> Option<String> {
    while matches!(raw.last(), Some(b'\n' | b'\r')) {
        raw.pop();
    }
    match String::from_utf8(raw) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!("skipping line that is not valid UTF-8: {e}");
            None
        }
    }
}

async fn run_egress(
    mut replies: ReplyReceiver,
    writer: SharedWriter,
    channel: String,
    abort: CancellationToken,
) -> Result<()> {
    loop {
        let reply = tokio::select! {
            biased;
            () = abort.cancelled() => {
                if !replies.is_empty() {
                    warn!("dropping {} unsent replies", replies.len());
                }
                return Ok(());
            }
            reply = replies.recv() => reply,
        };

        let Some(text) = reply else {
            debug!("all reply senders gone; egress loop exited");
            return Ok(());
        };
        let line = protocol::encode_reply(&channel, &text);
        let written = tokio::select! {
            biased;
            () = abort.cancelled() => {
                warn!("abandoning a reply mid-write and {} more", replies.len());
                return Ok(());
            }
            written = write_line(&writer, &line) => written,
        };
        if let Err(e) = written {
            warn!("egress stopped: {e}");
            abort.cancel();
            return Err(BotError::Connection(format!("cannot send reply: {e}")));
        }
    }
}

async fn join_loop(name: &str, handle: JoinHandle<Result<()>>) -> Result<()> {
    flatten_join(name, handle.await)
}

fn flatten_join(
    name: &str,
    joined: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    joined.map_err(|e| BotError::Channel(format!("{name} task failed: {e}")))?
}
