//! Pooled, reusable log records.
//!
//! A [`Record`] holds one fully rendered line plus a small scratch array used
//! while rendering. Records are handed out by a [`RecordPool`] wrapped in a
//! [`PooledRecord`], which puts them back when dropped. Because a writer
//! takes the `PooledRecord` by value, a record can only return to its pool
//! after the writer is done with its bytes.
use {
    crate::{
        config::Level,
        header::{self, Timestamp, SCRATCH_BYTES, UNKNOWN_FILE, UNKNOWN_LINE},
        policy::Bucket,
    },
    crossbeam_queue::ArrayQueue,
    std::{
        fmt,
        io::{self, Write as _},
        ops::{Deref, DerefMut},
        panic::Location,
        sync::Arc,
    },
};

/// Initial capacity of a record buffer.
pub const RECORD_BUFFER_BYTES: usize = 1024;
/// Idle records kept by a pool; further releases are dropped.
pub const POOL_IDLE_RECORDS: usize = 256;
/// Records whose buffer grew beyond this are dropped instead of pooled.
const RETAINED_BUFFER_BYTES: usize = 64 * 1024;

/// One log line and the calendar bucket it was rendered in.
#[derive(Debug, Clone)]
pub struct Record {
    buf: Vec<u8>,
    scratch: [u8; SCRATCH_BYTES],
    bucket: Bucket,
}

impl Record {
    pub fn with_capacity(capacity: usize) -> Self {
        Record {
            buf: Vec::with_capacity(capacity),
            scratch: [0; SCRATCH_BYTES],
            bucket: Bucket::default(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn set_bucket(&mut self, bucket: Bucket) {
        self.bucket = bucket;
    }

    /// Drop the contents but keep the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Borrow the scratch array, e.g. to render an archive suffix.
    pub fn scratch_mut(&mut self) -> &mut [u8; SCRATCH_BYTES] {
        &mut self.scratch
    }

    /// Append the header for `level` at `timestamp` and adopt its bucket.
    pub fn render_header(&mut self, timestamp: &Timestamp, level: Level, location: Option<&Location<'_>>) {
        let (file, line) = location.map_or((UNKNOWN_FILE, UNKNOWN_LINE), |loc| (loc.file(), loc.line()));
        self.bucket = timestamp.bucket();
        header::render_header(&mut self.buf, &mut self.scratch, timestamp, level, file, line);
    }

    /// Render a complete line: header, formatted message and a newline.
    pub fn render(&mut self, level: Level, location: Option<&Location<'_>>, args: fmt::Arguments<'_>) {
        self.render_header(&Timestamp::now(), level, location);
        // writing into a Vec cannot fail
        let _ = self.buf.write_fmt(args);
        self.buf.push(b'\n');
    }
}

impl io::Write for Record {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A bounded, thread safe free list of records.
#[derive(Debug)]
pub struct RecordPool {
    idle: ArrayQueue<Record>,
    record_capacity: usize,
}

impl RecordPool {
    /// Create a pool keeping at most `max_idle` records, each starting with
    /// `record_capacity` bytes.
    pub fn new(max_idle: usize, record_capacity: usize) -> Arc<Self> {
        Arc::new(RecordPool {
            idle: ArrayQueue::new(max_idle.max(1)),
            record_capacity,
        })
    }

    /// Take an empty record out of the pool, allocating one if none is idle.
    pub fn acquire(self: &Arc<Self>) -> PooledRecord {
        let mut record = self
            .idle
            .pop()
            .unwrap_or_else(|| Record::with_capacity(self.record_capacity));
        record.clear();
        PooledRecord {
            record: Some(record),
            pool: Arc::clone(self),
        }
    }

    fn release(&self, mut record: Record) {
        if record.capacity() > RETAINED_BUFFER_BYTES {
            return;
        }
        record.clear();
        // a full pool drops the record
        let _ = self.idle.push(record);
    }

    /// Number of records currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }
}

impl Default for RecordPool {
    fn default() -> Self {
        RecordPool {
            idle: ArrayQueue::new(POOL_IDLE_RECORDS),
            record_capacity: RECORD_BUFFER_BYTES,
        }
    }
}

/// A record on loan from a [`RecordPool`]; returns to it when dropped.
#[derive(Debug)]
pub struct PooledRecord {
    record: Option<Record>,
    pool: Arc<RecordPool>,
}

impl PooledRecord {
    /// Return the record to its pool now. Equivalent to dropping it.
    pub fn release(self) {}
}

impl Deref for PooledRecord {
    type Target = Record;

    fn deref(&self) -> &Record {
        // only `Drop` takes the record out
        self.record.as_ref().unwrap_or_else(|| unreachable!("pooled record used after release"))
    }
}

impl DerefMut for PooledRecord {
    fn deref_mut(&mut self) -> &mut Record {
        self.record.as_mut().unwrap_or_else(|| unreachable!("pooled record used after release"))
    }
}

impl Drop for PooledRecord {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.pool.release(record);
        }
    }
}
