//! Core kernel for the Bucket factoid bot.
//!
//! Parses channel utterances, teaches and recalls factoids in per-channel
//! buckets, and keeps the per-channel undo ledger and speaker history.

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod factoids;
pub mod history;
pub mod kernel;
pub mod ledger;
pub mod parser;

pub use dispatcher::Dispatcher;
pub use kernel::BucketKernel;
