//! IRC-style line codec for the chat service.
//!
//! Inbound lines are classified into keep-alive probes, chat messages and
//! everything else. Chat message text is normalized before it leaves this
//! module: emoji become `:name:` tokens and anything that looks like a link is
//! replaced with the literal `web link`.

use crate::error::{BotError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Prefix of a keep-alive probe sent by the server.
pub const PING_PREFIX: &str = "PING";

/// Fixed answer to a keep-alive probe.
pub const PONG_LINE: &str = "PONG :tmi.twitch.tv";

/// Replacement for redacted links.
pub const LINK_PLACEHOLDER: &str = "web link";

/// Longest emoji sequence (in chars) tried during normalization.
const MAX_EMOJI_CHARS: usize = 10;

static PRIVMSG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@\S+ )?:([^!\s]+)![^@\s]*@\S+ PRIVMSG #(\S+) :(.*)$").expect("valid regex")
});

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\S+|\S+\.[a-z]{2,}/\S*").expect("valid regex")
});

/// A decoded chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub username: String,
    pub channel: String,
    pub text: String,
}

/// Classification of one inbound protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// Server keep-alive probe; must be answered with [`PONG_LINE`].
    Ping,
    /// A channel chat message.
    Message(ChatMessage),
    /// Anything else (numerics, JOIN acks, notices).
    Other,
}

/// Classify a raw inbound line.
///
/// # Errors
///
/// Returns [`BotError::Protocol`] for a `PRIVMSG` line that does not match
/// the chat-message wire shape.
pub fn parse_line(raw: &str) -> Result<InboundLine> {
    let line = raw.trim_end_matches(['\r', '\n']);
    if line.starts_with(PING_PREFIX) {
        return Ok(InboundLine::Ping);
    }
    if !line.contains(" PRIVMSG ") {
        return Ok(InboundLine::Other);
    }
    decode(line)
        .map(InboundLine::Message)
        .ok_or_else(|| BotError::Protocol(format!("malformed PRIVMSG line: {line}")))
}

/// Decode a `PRIVMSG` line into a [`ChatMessage`].
///
/// Returns `None` when the line does not have the chat-message shape.
#[must_use]
pub fn decode(line: &str) -> Option<ChatMessage> {
    let line = line.replace('\r', "");
    let caps = PRIVMSG_RE.captures(line.trim_end_matches('\n'))?;
    let username = caps.get(1)?.as_str().to_owned();
    let channel = caps.get(2)?.as_str().to_owned();
    let text = redact_links(&normalize_emoji(caps.get(3)?.as_str()));
    Some(ChatMessage {
        username,
        channel,
        text,
    })
}

/// Replace URL-like substrings with [`LINK_PLACEHOLDER`].
#[must_use]
pub fn redact_links(text: &str) -> String {
    LINK_RE.replace_all(text, LINK_PLACEHOLDER).into_owned()
}

/// Replace each emoji with a `:name:` token so the synthesizer can read it.
#[must_use]
pub fn normalize_emoji(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    'outer: while let Some(first) = rest.chars().next() {
        let second = rest[first.len_utf8()..].chars().next();
        let maybe_keycap = matches!(second, Some('\u{FE0F}' | '\u{20E3}'));
        if first.is_ascii() && !maybe_keycap {
            out.push(first);
            rest = &rest[1..];
            continue;
        }

        let ends: Vec<usize> = rest
            .char_indices()
            .skip(1)
            .map(|(i, _)| i)
            .chain(std::iter::once(rest.len()))
            .take(MAX_EMOJI_CHARS)
            .collect();
        for &end in ends.iter().rev() {
            if let Some(emoji) = emojis::get(&rest[..end]) {
                out.push(':');
                out.push_str(&emoji_token(emoji.name()));
                out.push(':');
                rest = &rest[end..];
                continue 'outer;
            }
        }

        out.push(first);
        rest = &rest[first.len_utf8()..];
    }
    out
}

fn emoji_token(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ':' | ',' | '.'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// The three handshake lines: credential, nickname, join.
#[must_use]
pub fn handshake_lines(token: &str, nickname: &str, channel: &str) -> [String; 3] {
    [
        format!("PASS {token}"),
        format!("NICK {nickname}"),
        format!("JOIN #{}", channel.trim_start_matches('#')),
    ]
}

/// Encode a reply as a channel message line (without terminator).
///
/// Embedded line breaks are flattened so one reply is always one line.
#[must_use]
pub fn encode_reply(channel: &str, text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    format!("PRIVMSG #{} :{flat}", channel.trim_start_matches('#'))
}
