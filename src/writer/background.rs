//! Writing records on a dedicated background thread.
use {
    super::{panic_message, rotating::SyncWriter, Writer},
    crate::{
        config::{Config, Target},
        error::LogError,
        record::PooledRecord,
    },
    crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError},
    std::{
        panic::{self, AssertUnwindSafe},
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex, PoisonError,
        },
        thread::{self, JoinHandle},
        time::{Duration, Instant},
    },
};

/// A [`SyncWriter`] fed through a bounded queue by one consumer thread.
///
/// [`AsyncWriter::submit`] returns as soon as the record is queued. When the
/// queue is full the caller blocks until the consumer catches up; records are
/// never dropped for lack of space. A record that fails to write, or panics
/// while writing, is reported on stderr and the consumer moves on.
#[derive(Debug)]
pub struct AsyncWriter {
    inner: Arc<SyncWriter>,
    records: Sender<PooledRecord>,
    cancel: Mutex<Option<Sender<()>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl AsyncWriter {
    /// Open the underlying file writer and start the consumer thread.
    pub fn open(config: &Config) -> Result<Self, LogError> {
        let inner = Arc::new(SyncWriter::open(config)?);
        Self::with_writer(inner, config.async_queue_size, config.async_close_delay)
    }

    /// Put a consumer thread with a queue of `capacity` records in front of
    /// `inner`. On close, queued records are still written for up to
    /// `close_delay`.
    pub fn with_writer(inner: Arc<SyncWriter>, capacity: usize, close_delay: Duration) -> Result<Self, LogError> {
        let (records, queue) = bounded(capacity.max(1));
        // nothing is ever sent; dropping the sender is the stop signal
        let (cancel, cancelled) = bounded::<()>(0);

        let worker = Arc::clone(&inner);
        let consumer = thread::Builder::new()
            .name(format!("rollog-{}", inner.target()))
            .spawn(move || consume(&worker, &queue, &cancelled, close_delay))?;

        Ok(AsyncWriter {
            inner,
            records,
            cancel: Mutex::new(Some(cancel)),
            consumer: Mutex::new(Some(consumer)),
            closed: AtomicBool::new(false),
        })
    }

    /// Queue `record` for the consumer thread, blocking while the queue is full.
    pub fn submit(&self, record: PooledRecord) -> Result<(), LogError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LogError::WriterClosed(self.inner.target().to_string()));
        }
        self.records
            .send(record)
            .map_err(|_| LogError::WriterClosed(self.inner.target().to_string()))
    }

    /// Write `record` in the calling thread, bypassing the queue.
    pub fn write(&self, record: PooledRecord) -> Result<(), LogError> {
        self.inner.write(record)
    }

    /// Flush what the consumer has written so far. Queued records are not
    /// waited for.
    pub fn flush(&self) -> Result<(), LogError> {
        self.inner.flush()
    }

    /// Stop the consumer, give it `close_delay` to drain the queue, then
    /// close the file. Records still queued after that are lost.
    pub fn close(&self) -> Result<(), LogError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        drop(self.cancel.lock().unwrap_or_else(PoisonError::into_inner).take());
        let consumer = self.consumer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(consumer) = consumer {
            if let Err(panic) = consumer.join() {
                eprintln!(
                    "Log consumer for '{}' terminated abnormally: {}",
                    self.inner.target(),
                    panic_message(panic.as_ref())
                );
            }
        }
        self.inner.close()
    }

    /// The writer the consumer thread writes through.
    pub fn inner(&self) -> &Arc<SyncWriter> {
        &self.inner
    }

    /// Records waiting in the queue.
    pub fn queued(&self) -> usize {
        self.records.len()
    }
}

impl Writer for AsyncWriter {
    fn acquire(&self) -> PooledRecord {
        self.inner.pool().acquire()
    }

    fn write(&self, record: PooledRecord) -> Result<(), LogError> {
        AsyncWriter::write(self, record)
    }

    fn submit(&self, record: PooledRecord) -> Result<(), LogError> {
        AsyncWriter::submit(self, record)
    }

    fn flush(&self) -> Result<(), LogError> {
        AsyncWriter::flush(self)
    }

    fn close(&self) -> Result<(), LogError> {
        AsyncWriter::close(self)
    }
}

impl Drop for AsyncWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            eprintln!("Failed to close log writer '{}': {}", self.inner.target(), err);
        }
    }
}

fn consume(writer: &SyncWriter, queue: &Receiver<PooledRecord>, cancelled: &Receiver<()>, close_delay: Duration) {
    let target = writer.target();
    loop {
        select! {
            recv(queue) -> record => match record {
                Ok(record) => {
                    write_isolated(writer, target, record);
                }
                Err(_) => return,
            },
            recv(cancelled) -> _ => break,
        }
        // select picks at random among ready channels; a stop request wins
        if let Err(TryRecvError::Disconnected) = cancelled.try_recv() {
            break;
        }
    }

    let deadline = Instant::now() + close_delay;
    while Instant::now() < deadline {
        match queue.try_recv() {
            Ok(record) => {
                write_isolated(writer, target, record);
            }
            Err(_) => break,
        }
    }
    if !queue.is_empty() {
        eprintln!(
            "Dropping {} queued log records for '{}' after the close delay",
            queue.len(),
            writer.target()
        );
    }
}

/// Write one record, containing any error or panic to that record. Returns
/// whether the record was written.
fn write_isolated(writer: &dyn Writer, target: &Target, record: PooledRecord) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| writer.write(record))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            eprintln!("Failed to write log record to '{target}': {err}");
            false
        }
        Err(panic) => {
            eprintln!("Log writer for '{target}' panicked: {}", panic_message(panic.as_ref()));
            false
        }
    }
}
