//! IRC channel adapter.
//!
//! Uses raw TCP via `tokio::net::TcpStream` with `tokio::io` buffered I/O for
//! plaintext IRC connections. Implements the part of the protocol the bot
//! needs: NICK, USER, JOIN, PRIVMSG, PING/PONG and CTCP ACTION.

use crate::types::{split_message, ChannelAdapter, ChannelMessage, ChannelUser};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Maximum IRC message length per RFC 2812 (including CRLF).
/// We use 510 for the payload (512 minus CRLF).
const MAX_MESSAGE_LEN: usize = 510;

/// Maximum length for a single PRIVMSG payload, accounting for the
/// `:nick!user@host PRIVMSG #channel :` prefix overhead (~80 chars conservative).
const MAX_PRIVMSG_PAYLOAD: usize = 400;

const MAX_BACKOFF: Duration = Duration::from_secs(60);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// CTCP delimiter.
const CTCP: char = '\x01';

/// IRC adapter: connects, registers, joins the configured channels and
/// streams PRIVMSG events.
pub struct IrcAdapter {
    /// IRC server hostname (e.g., "irc.libera.chat").
    server: String,
    port: u16,
    /// Bot's IRC nickname.
    nick: String,
    /// SECURITY: Optional server password, zeroized on drop.
    password: Option<Zeroizing<String>>,
    /// Channels joined on every (re)connect.
    channels: Vec<String>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    /// Shared write handle, populated by `start()`.
    write_tx: Arc<RwLock<Option<mpsc::Sender<String>>>>,
}

impl IrcAdapter {
    /// Create a new IRC adapter.
    ///
    /// * `channels`: joined on connect (must start with `#` or `&`).
    pub fn new(
        server: String,
        port: u16,
        nick: String,
        password: Option<String>,
        channels: Vec<String>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            server,
            port,
            nick,
            password: password.map(Zeroizing::new),
            channels,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            write_tx: Arc::new(RwLock::new(None)),
        }
    }

    /// Format the server address as `host:port`.
    fn addr(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    async fn write_raw(&self, raw: String) -> Result<(), Box<dyn std::error::Error>> {
        let write_tx = self.write_tx.read().await;
        let write_tx = write_tx
            .as_ref()
            .ok_or("IRC adapter not started, call start() first")?;
        write_tx.send(raw).await.map_err(|e| {
            Box::<dyn std::error::Error>::from(format!("IRC write channel closed: {e}"))
        })
    }
}

/// An IRC protocol line parsed into its components.
#[derive(Debug)]
struct IrcLine {
    /// Optional prefix (e.g., ":nick!user@host").
    prefix: Option<String>,
    /// The IRC command (e.g., "PRIVMSG", "PING", "001").
    command: String,
    params: Vec<String>,
    /// Trailing parameter (after `:` in the params).
    trailing: Option<String>,
}

/// Parse a raw IRC line into structured components.
///
/// IRC line format: `[:prefix] COMMAND [params...] [:trailing]`
fn parse_irc_line(line: &str) -> Option<IrcLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let mut remaining = line.trim_start();
    let prefix = if remaining.starts_with(':') {
        let space = remaining.find(' ')?;
        let pfx = remaining[1..space].to_string();
        remaining = &remaining[space + 1..];
        Some(pfx)
    } else {
        None
    };

    let (main_part, trailing) = if let Some(idx) = remaining.find(" :") {
        let trail = remaining[idx + 2..].to_string();
        (&remaining[..idx], Some(trail))
    } else {
        (remaining, None)
    };

    let mut parts = main_part.split_whitespace();
    let command = parts.next()?.to_string();
    let params: Vec<String> = parts.map(String::from).collect();

    Some(IrcLine {
        prefix,
        command,
        params,
        trailing,
    })
}

/// Extract the nickname from an IRC prefix like "nick!user@host".
fn nick_from_prefix(prefix: &str) -> &str {
    prefix.split('!').next().unwrap_or(prefix)
}

/// Extract the host from an IRC prefix like "nick!user@host".
fn host_from_prefix(prefix: &str) -> Option<&str> {
    prefix.split_once('@').map(|(_, host)| host)
}

/// Parse a PRIVMSG IRC line into a `ChannelMessage`.
fn parse_privmsg(line: &IrcLine, bot_nick: &str) -> Option<ChannelMessage> {
    if line.command != "PRIVMSG" {
        return None;
    }

    let prefix = line.prefix.as_deref()?;
    let sender_nick = nick_from_prefix(prefix);

    // Skip messages from the bot itself
    if sender_nick.eq_ignore_ascii_case(bot_nick) {
        return None;
    }

    let target = line.params.first()?;
    let text = line.trailing.as_deref().unwrap_or("");
    if text.is_empty() {
        return None;
    }
    // CTCP requests (VERSION, PING, ...) are not chat; actions are.
    if text.starts_with(CTCP) && !text.starts_with("\x01ACTION ") {
        return None;
    }

    let is_group = target.starts_with('#') || target.starts_with('&');

    // Replies to DMs go back to the sender.
    let platform_id = if is_group {
        target.to_string()
    } else {
        sender_nick.to_string()
    };

    Some(ChannelMessage {
        sender: ChannelUser {
            platform_id,
            nick: sender_nick.to_string(),
            host: host_from_prefix(prefix).map(String::from),
        },
        target: target.to_string(),
        text: text.to_string(),
        is_group,
        bot_nick: bot_nick.to_string(),
    })
}

/// The body of an action reply, given either as `/me ...` or already
/// framed as CTCP ACTION.
fn action_body(text: &str) -> Option<&str> {
    text.strip_prefix("/me ").or_else(|| {
        text.strip_prefix("\x01ACTION ")
            .map(|body| body.strip_suffix(CTCP).unwrap_or(body))
    })
}

/// PRIVMSG payloads for one reply.
///
/// Plain text is split at line and word boundaries. An action must stay a
/// single CTCP frame, so an overlong one is truncated instead.
fn outgoing_payloads(text: &str) -> Vec<String> {
    match action_body(text) {
        Some(body) => {
            let budget = MAX_PRIVMSG_PAYLOAD - "\x01ACTION \x01".len();
            let mut cut = body.len().min(budget);
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            vec![format!("{CTCP}ACTION {}{CTCP}", &body[..cut])]
        }
        None => split_message(text, MAX_PRIVMSG_PAYLOAD)
            .into_iter()
            .map(String::from)
            .collect(),
    }
}

#[async_trait]
impl ChannelAdapter for IrcAdapter {
    fn name(&self) -> &str {
        "irc"
    }

    async fn start(
        &self,
    ) -> Result<Pin<Box<dyn Stream<Item = ChannelMessage> + Send>>, Box<dyn std::error::Error>>
    {
        let (tx, rx) = mpsc::channel::<ChannelMessage>(256);
        let (write_cmd_tx, mut write_cmd_rx) = mpsc::channel::<String>(64);

        *self.write_tx.write().await = Some(write_cmd_tx.clone());

        let addr = self.addr();
        let nick = self.nick.clone();
        let password = self.password.clone();
        let channels = self.channels.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                info!("Connecting to IRC server at {addr}...");

                let stream = match TcpStream::connect(&addr).await {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("IRC connection failed: {e}, retrying in {backoff:?}");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    }
                };

                backoff = INITIAL_BACKOFF;
                info!("IRC connected to {addr}");

                let (reader, mut writer) = stream.into_split();
                let mut lines = BufReader::new(reader).lines();

                let mut registration = String::new();
                if let Some(ref pass) = password {
                    registration.push_str(&format!("PASS {}\r\n", pass.as_str()));
                }
                registration.push_str(&format!("NICK {nick}\r\n"));
                registration.push_str(&format!("USER {nick} 0 * :Bucket factoid bot\r\n"));

                if let Err(e) = writer.write_all(registration.as_bytes()).await {
                    warn!("IRC registration send failed: {e}");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }

                let mut current_nick = nick.clone();
                let mut joined = false;

                // Inner message loop; returns true if we should reconnect
                let should_reconnect = 'inner: loop {
                    tokio::select! {
                        line_result = lines.next_line() => {
                            let line = match line_result {
                                Ok(Some(l)) => l,
                                Ok(None) => {
                                    info!("IRC connection closed");
                                    break 'inner true;
                                }
                                Err(e) => {
                                    warn!("IRC read error: {e}");
                                    break 'inner true;
                                }
                            };

                            debug!("IRC < {line}");

                            let parsed = match parse_irc_line(&line) {
                                Some(p) => p,
                                None => continue,
                            };

                            match parsed.command.as_str() {
                                "PING" => {
                                    let pong_param = parsed.trailing
                                        .as_deref()
                                        .or(parsed.params.first().map(|s| s.as_str()))
                                        .unwrap_or("");
                                    let pong = format!("PONG :{pong_param}\r\n");
                                    if let Err(e) = writer.write_all(pong.as_bytes()).await {
                                        warn!("IRC PONG send failed: {e}");
                                        break 'inner true;
                                    }
                                }

                                // RPL_WELCOME (001): registration complete, join channels
                                "001" => {
                                    if !joined {
                                        info!("IRC registered as {current_nick}");
                                        for ch in &channels {
                                            let join_cmd = format!("JOIN {ch}\r\n");
                                            if let Err(e) = writer.write_all(join_cmd.as_bytes()).await {
                                                warn!("IRC JOIN send failed: {e}");
                                                break 'inner true;
                                            }
                                            info!("IRC joining {ch}");
                                        }
                                        joined = true;
                                    }
                                }

                                "PRIVMSG" => {
                                    if let Some(msg) = parse_privmsg(&parsed, &current_nick) {
                                        debug!(
                                            "IRC message from {} in {}: {:?}",
                                            msg.sender.nick, msg.target, msg.text
                                        );
                                        if tx.send(msg).await.is_err() {
                                            return;
                                        }
                                    }
                                }

                                // ERR_NICKNAMEINUSE (433): nickname taken
                                "433" => {
                                    warn!("IRC: nickname '{current_nick}' is already in use");
                                    current_nick = format!("{current_nick}_");
                                    let cmd = format!("NICK {current_nick}\r\n");
                                    let _ = writer.write_all(cmd.as_bytes()).await;
                                }

                                "JOIN" => {
                                    if let Some(ref prefix) = parsed.prefix {
                                        let joiner = nick_from_prefix(prefix);
                                        let channel = parsed.trailing
                                            .as_deref()
                                            .or(parsed.params.first().map(|s| s.as_str()))
                                            .unwrap_or("?");
                                        if joiner.eq_ignore_ascii_case(&current_nick) {
                                            info!("IRC joined {channel}");
                                        }
                                    }
                                }

                                _ => {}
                            }
                        }

                        // Outbound message requests from `send()` and `join()`
                        Some(raw_cmd) = write_cmd_rx.recv() => {
                            if let Err(e) = writer.write_all(raw_cmd.as_bytes()).await {
                                warn!("IRC write failed: {e}");
                                break 'inner true;
                            }
                        }

                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!("IRC adapter shutting down");
                                let _ = writer.write_all(b"QUIT :Bucket shutting down\r\n").await;
                                return;
                            }
                        }
                    }
                };

                if !should_reconnect || *shutdown_rx.borrow() {
                    break;
                }

                warn!("IRC: reconnecting in {backoff:?}");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }

            info!("IRC connection loop stopped");
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }

    async fn send(&self, target: &str, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        for chunk in outgoing_payloads(text) {
            let raw = format!("PRIVMSG {target} :{chunk}\r\n");
            if raw.len() > MAX_MESSAGE_LEN + 2 {
                warn!("IRC message exceeds 512 bytes");
            }
            self.write_raw(raw).await?;
        }
        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write_raw(format!("JOIN {channel}\r\n")).await
    }

    async fn stop(&self) -> Result<(), Box<dyn std::error::Error>> {
        let _ = self.shutdown_tx.send(true);
        Ok(())
    }
}
