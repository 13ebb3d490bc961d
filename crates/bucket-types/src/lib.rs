//! Core types for the Bucket factoid bot.
//!
//! This crate defines the data model shared by the storage backends, the
//! channel bridge and the kernel: factoid keys, verbs and entry sets, the
//! typed configuration, and the common error type. It contains no business
//! logic.

pub mod config;
pub mod error;
pub mod factoid;
