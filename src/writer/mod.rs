//! Rotating writers behind a common [`Writer`] capability.
use {
    crate::{
        config::{Config, Level},
        error::LogError,
        record::PooledRecord,
    },
    std::{any::Any, fmt, panic::Location, sync::Arc},
};

pub mod background;
pub mod rotating;

pub use {background::AsyncWriter, rotating::SyncWriter};

/// Something that persists rendered records.
///
/// Loggers hold an `Arc<dyn Writer>`, so the synchronous and asynchronous
/// writers (or a test double) are interchangeable at construction time.
pub trait Writer: Send + Sync {
    /// Borrow an empty record from the writer's pool.
    fn acquire(&self) -> PooledRecord;

    /// Persist `record` in the calling thread, rotating first if needed.
    fn write(&self, record: PooledRecord) -> Result<(), LogError>;

    /// Hand `record` over for writing. Writers without a background thread
    /// write immediately.
    fn submit(&self, record: PooledRecord) -> Result<(), LogError> {
        self.write(record)
    }

    /// Push buffered bytes to the operating system and sync them to disk.
    fn flush(&self) -> Result<(), LogError>;

    /// Flush and release the underlying file. Further writes fail.
    fn close(&self) -> Result<(), LogError>;

    /// Render a record and submit it.
    fn log(&self, level: Level, location: Option<&Location<'_>>, args: fmt::Arguments<'_>) -> Result<(), LogError> {
        let mut record = self.acquire();
        record.render(level, location, args);
        self.submit(record)
    }
}

/// Open the writer described by `config`: a [`SyncWriter`], or an
/// [`AsyncWriter`] when `async_write` is set.
pub fn open_writer(config: &Config) -> Result<Arc<dyn Writer>, LogError> {
    let config = config.clone().merged();
    if config.async_write {
        Ok(Arc::new(AsyncWriter::open(&config)?))
    } else {
        Ok(Arc::new(SyncWriter::open(&config)?))
    }
}

/// Best effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
