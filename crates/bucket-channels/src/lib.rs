//! Channel bridge layer for the Bucket factoid bot.
//!
//! Converts transport events into `ChannelMessage`s, hands them to the
//! kernel through `BridgeHandle`, and sends the kernel's replies back out
//! through a bot-wide `ReplyThrottle`.

pub mod bridge;
pub mod irc;
pub mod throttle;
pub mod types;
