//! # rollog
//!
//! rollog is a leveled logging library built around a rotating, buffered file
//! writer. Log files are archived when they would grow past a size threshold,
//! when the calendar hour, day, month or year changes, or both. Archives are
//! named after the period they cover (`app.log.2025-04-01`, or
//! `app.log.2025-04-01-19` for hourly rotation) and get a `.1`, `.2`, ...
//! suffix when several archives fall into the same period. **Writes can happen
//! in the calling thread or be handed to a background thread through a
//! bounded queue**; in the latter case a full queue makes the caller wait
//! rather than dropping records.
//!
//! Each line looks like
//! `server.rs:1207 [W] 2020-05-06 07:40:01.037 - connection reset`. Records
//! are rendered into pooled buffers, so steady state logging does not
//! allocate.
//!
//! ## Example
//!
//! ```rust
//! use rollog::{Config, Cycle, Level, Logger};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = tempfile::tempdir()?;
//!     let logger = Logger::new(&Config {
//!         level: Level::Info,
//!         path: dir.path().join("service.log").to_string_lossy().into_owned(),
//!         rotate_bytes: 64 * 1024 * 1024, // archive before the file passes 64 MiB
//!         rotate_cycle: Cycle::Daily,     // and at least once per day
//!         ..Config::default()
//!     })?;
//!
//!     rollog::info!(logger, "listening on {}", "0.0.0.0:8080");
//!     rollog::debug!(logger, "filtered out by the Info level");
//!     logger.close()?;
//!     Ok(())
//! }
//! ```
//!
//! Applications with several log files usually describe them in one
//! [`Settings`] document and keep the resulting [`Registry`] for the lifetime
//! of the process. The registry also flushes every writer periodically.
pub mod config;
pub mod error;
pub mod header;
pub mod logger;
pub mod policy;
pub mod record;
pub mod registry;
pub mod writer;

pub use {
    config::{expand_path, Config, Cycle, Level, Settings, Target},
    error::LogError,
    header::Timestamp,
    logger::{Logger, FATAL_EXIT_CODE},
    policy::{Bucket, RotationPolicy},
    record::{PooledRecord, Record, RecordPool},
    registry::Registry,
    writer::{open_writer, AsyncWriter, SyncWriter, Writer},
};
