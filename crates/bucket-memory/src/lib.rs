//! Bucket storage for the Bucket factoid bot.
//!
//! A bucket is a named key-value namespace holding one `FactSet` per key.
//! Channels are mapped onto buckets by configuration; several channels may
//! share one bucket. Two backends are provided:
//! - **In-memory** (`DashMap`): process-local, used by tests and `backend = "memory"`
//! - **SQLite**: one file holding every bucket, versioned per key
//!
//! The kernel only sees the `FactStore` trait and commits through
//! revision-checked writes, so concurrent edits of one key never interleave.

pub mod in_memory;
pub mod migration;
pub mod sqlite;
pub mod store;

mod registry;
pub use registry::Buckets;
