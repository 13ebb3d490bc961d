//! Routes each channel message to the right channel state and command.

use crate::channel::Channel;
use crate::error::KernelResult;
use crate::factoids::{Rejection, Requester};
use crate::parser::{self, Command, Utterance};
use async_trait::async_trait;
use bucket_channels::bridge::BridgeHandle;
use bucket_channels::types::{ChannelMessage, ChannelUser};
use bucket_memory::Buckets;
use bucket_types::config::BucketConfig;
use bucket_types::factoid::{Key, Verb};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Reply to addressed text that means nothing to us.
const WHAT: &str = "What?";

/// Owns every monitored channel and answers the messages seen in them.
#[derive(Debug)]
pub struct Dispatcher {
    config: BucketConfig,
    channels: HashMap<String, Arc<Channel>>,
}

impl Dispatcher {
    /// Build one `Channel` per configured binding, sharing bucket stores
    /// between channels mapped to the same bucket.
    pub fn new(config: &BucketConfig, buckets: &Buckets) -> KernelResult<Self> {
        let mut channels = HashMap::new();
        for binding in &config.channels {
            let bucket = buckets.get(&binding.bucket)?;
            info!(channel = %binding.channel, bucket = %binding.bucket, "Monitoring channel");
            channels.insert(
                binding.channel.to_lowercase(),
                Arc::new(Channel::new(
                    binding.channel.clone(),
                    bucket,
                    config.history_capacity,
                )),
            );
        }
        Ok(Self {
            config: config.clone(),
            channels,
        })
    }

    /// State of a monitored channel.
    pub fn channel(&self, name: &str) -> Option<&Arc<Channel>> {
        self.channels.get(&name.to_lowercase())
    }

    /// Admin rights belong to whoever connects from the owner host.
    pub fn is_admin(&self, user: &ChannelUser) -> bool {
        match (&self.config.owner, &user.host) {
            (Some(owner), Some(host)) => owner.eq_ignore_ascii_case(host),
            _ => false,
        }
    }

    /// Handle one message; returns at most one reply.
    ///
    /// Addressing is checked against the nick the transport currently holds,
    /// not the configured one.
    pub async fn process(&self, message: &ChannelMessage) -> Option<String> {
        let nick = message.sender.nick.as_str();
        if !message.is_group {
            debug!(nick, "Ignoring direct message");
            return None;
        }
        let channel = self.channel(message.reply_target())?;
        if self.config.is_ignored(nick) {
            debug!(nick, "Ignoring message from ignored nick");
            return None;
        }
        let requester = Requester::new(nick, self.is_admin(&message.sender));

        match parser::parse(&message.text, &message.bot_nick) {
            Utterance::Addressed(command) => {
                debug!(channel = channel.name(), nick, ?command, "Addressed command");
                self.run_command(channel, &requester, command).await
            }
            Utterance::Overheard { key } => {
                if let Some(key) = key {
                    let found = channel
                        .factoids()
                        .retrieve(channel.ledger(), nick, &Key::new(&key), false)
                        .await;
                    if found.is_some() {
                        return found;
                    }
                }
                channel.record_line(nick, &message.text);
                None
            }
        }
    }

    async fn run_command(
        &self,
        channel: &Channel,
        requester: &Requester,
        command: Command,
    ) -> Option<String> {
        let facts = channel.factoids();
        let ledger = channel.ledger();
        match command {
            Command::Teach { key, verb, value } => {
                if verb == Verb::Alias && !requester.is_admin {
                    debug!(nick = %requester.nick, key = %key, "Alias refused for non-admin");
                    return None;
                }
                self.teach(channel, requester, &key, verb, &value, None).await
            }
            Command::Remember { speaker, needle } => match channel.find_line(&speaker, &needle) {
                Some(line) => {
                    let suffix = format!(", remembered {speaker} saying {line}");
                    self.teach(
                        channel,
                        requester,
                        &format!("{speaker} quotes"),
                        Verb::Reply,
                        &format!("<{speaker}> {line}"),
                        Some(suffix),
                    )
                    .await
                }
                None => Some("I don't see it :(".to_string()),
            },
            Command::Combine { key, times } => {
                let key = Key::new(&key);
                let mut parts = Vec::with_capacity(times);
                for _ in 0..times {
                    if let Some(part) = facts.retrieve(ledger, &requester.nick, &key, true).await {
                        parts.push(part);
                    }
                }
                (!parts.is_empty()).then(|| parts.join(" "))
            }
            Command::RecallLast => ledger.what_was(),
            Command::Delete { key, index } => {
                reply(facts.delete(ledger, requester, &Key::new(&key), index).await)
            }
            Command::DeleteAll { key } => {
                reply(facts.delete_all(ledger, requester, &Key::new(&key)).await)
            }
            Command::UndoLast => reply(ledger.undo_last(facts, requester).await),
            Command::Query { key } => Some(
                facts
                    .retrieve(ledger, &requester.nick, &Key::new(&key), false)
                    .await
                    .unwrap_or_else(|| WHAT.to_string()),
            ),
            Command::Empty => Some(WHAT.to_string()),
        }
    }

    /// Teach with the self-edit guard; `suffix` is appended to a successful
    /// confirmation.
    async fn teach(
        &self,
        channel: &Channel,
        requester: &Requester,
        key: &str,
        verb: Verb,
        value: &str,
        suffix: Option<String>,
    ) -> Option<String> {
        let key = Key::new(key);
        if key == Key::new(&requester.nick) || key == Key::quotes_of(&requester.nick) {
            return reply(Err(Rejection::SelfEdit));
        }
        let result = channel
            .factoids()
            .teach(channel.ledger(), &requester.nick, &key, verb, value)
            .await
            .map(|confirmation| match suffix {
                Some(suffix) => confirmation + &suffix,
                None => confirmation,
            });
        reply(result)
    }
}

/// Map an operation outcome to the reply, if any.
fn reply(result: Result<String, Rejection>) -> Option<String> {
    match result {
        Ok(text) => Some(text),
        Err(rejection) => {
            debug!(%rejection, "Command rejected");
            rejection.user_message()
        }
    }
}

#[async_trait]
impl BridgeHandle for Dispatcher {
    async fn handle_message(&self, message: &ChannelMessage) -> Option<String> {
        self.process(message).await
    }
}
