//! City sensor history storage
//!
//! Keeps a bounded, chronologically ordered log of recent readings per
//! sensor on top of a pluggable key-value backend.
//!
//! # Key Components
//!
//! - **KvStore trait**: minimal `get`/`put` storage contract
//! - **MemoryKvStore**: DashMap backend for tests and ephemeral runs
//! - **FileKvStore**: durable one-file-per-key backend
//! - **HistoryStore**: per-sensor bounded log with single-writer-per-key appends

pub mod traits;

pub mod memory_impl;

pub mod file_impl;

pub mod history;

pub mod keyspace;

pub mod time;

// Re-exports
pub use bytes::Bytes;
pub use traits::KvStore;

pub use memory_impl::MemoryKvStore;

pub use file_impl::FileKvStore;

pub use history::{HistoryEntry, HistoryStore, DEFAULT_HISTORY_CAPACITY};

pub use keyspace::{history_key, sensor_id_from_key, HISTORY_KEY_PREFIX};

pub use time::{FixedTimeProvider, ManualTimeProvider, SystemTimeProvider, TimeProvider};
