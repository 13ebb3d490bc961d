//! Transport-neutral message types and the adapter trait.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Who sent a message and where replies should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUser {
    /// Reply target: the channel for group messages, the sender's nick for DMs.
    pub platform_id: String,
    /// Sender nick.
    pub nick: String,
    /// Sender host, compared against the configured owner for admin rights.
    pub host: Option<String>,
}

/// One inbound chat message.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub sender: ChannelUser,
    /// The channel (or nick) the message was addressed to.
    pub target: String,
    /// Raw message text.
    pub text: String,
    /// Whether `target` is a channel rather than a direct message.
    pub is_group: bool,
    /// The nick the bot held on this connection when the message arrived.
    /// Addressing is checked against it, so a server-forced rename is
    /// followed.
    pub bot_nick: String,
}

impl ChannelMessage {
    /// Where a reply to this message should be sent.
    pub fn reply_target(&self) -> &str {
        &self.sender.platform_id
    }
}

/// A chat transport.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &str;

    /// Connect and return the stream of inbound messages.
    ///
    /// Configured channels are joined as soon as the connection is registered.
    async fn start(
        &self,
    ) -> Result<Pin<Box<dyn Stream<Item = ChannelMessage> + Send>>, Box<dyn std::error::Error>>;

    /// Send a text message to a channel or nick.
    async fn send(&self, target: &str, text: &str) -> Result<(), Box<dyn std::error::Error>>;

    /// Join an additional channel.
    async fn join(&self, channel: &str) -> Result<(), Box<dyn std::error::Error>>;

    /// Disconnect.
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Split `text` into chunks of at most `max_len` bytes, preferring line and
/// word boundaries and never splitting a UTF-8 character.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > max_len {
        let mut cut = max_len;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let window = &rest[..cut];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(cut);
        chunks.push(&rest[..split_at]);
        rest = rest[split_at..].trim_start_matches(['\n', ' ']);
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }
    chunks
}
