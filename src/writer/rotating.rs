//! The synchronous rotating writer.
//!
//! A [`SyncWriter`] owns one buffered file handle. Every write takes the
//! writer's lock, asks the [`RotationPolicy`] whether the active file has to
//! be archived first, performs the rename-then-reopen sequence if so, and
//! appends the record. Archived files are named after the bucket the active
//! file belonged to, e.g. `app.log.2025-04-01` (daily) or `app.log.2025-04-01-19`
//! (hourly). When that name is taken, `.1`, `.2`, ... is appended.
use {
    super::Writer,
    crate::{
        config::{Config, Target},
        error::LogError,
        header::{self, SCRATCH_BYTES},
        policy::{Bucket, RotationPolicy},
        record::{PooledRecord, RecordPool, POOL_IDLE_RECORDS, RECORD_BUFFER_BYTES},
    },
    std::{
        fs::{self, File},
        io::{self, BufWriter, Write as _},
        path::{Path, PathBuf},
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
};

#[cfg(unix)]
use std::{fs::Permissions, os::unix::fs::PermissionsExt};

/// Highest collision index tried for an archive name.
const MAX_ARCHIVE_INDEX: u64 = 9999;

/// The handle under the buffered stream.
#[derive(Debug)]
enum Sink {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(File),
}

impl Sink {
    /// Ask the OS to persist written data. Process streams have nothing to sync.
    fn sync(&self) -> io::Result<()> {
        match self {
            Sink::File(file) => file.sync_all(),
            Sink::Stdout(_) | Sink::Stderr(_) => Ok(()),
        }
    }
}

impl io::Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(out) => out.write(buf),
            Sink::Stderr(err) => err.write(buf),
            Sink::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(out) => out.flush(),
            Sink::Stderr(err) => err.flush(),
            Sink::File(file) => file.flush(),
        }
    }
}

/// Mutable state, only touched while holding the writer's lock.
#[derive(Debug)]
pub(crate) struct WriterState {
    /// `None` after reopening the file failed; the next write retries.
    stream: Option<BufWriter<Sink>>,
    /// Bytes in the active file.
    bytes: u64,
    /// Bucket the active file belongs to. Only moves forward once `dated`.
    bucket: Bucket,
    /// False until the file holds a record; the first record sets `bucket`.
    dated: bool,
    rotations: u64,
    /// Last collision index used for an archive of `bucket`.
    archive_hint: Option<(Bucket, u64)>,
    closed: bool,
}

/// A buffered log file writer that rotates by size and calendar cycle.
///
/// Writers for `stdout` and `stderr` never rotate and never close the
/// process stream.
///
/// # Examples
/// ```
/// use rollog::{Config, Cycle, Level, SyncWriter, Writer};
///
/// let dir = tempfile::tempdir().unwrap();
/// let writer = SyncWriter::open(&Config {
///     path: dir.path().join("app.log").to_string_lossy().into_owned(),
///     rotate_bytes: 10 * 1024 * 1024,
///     rotate_cycle: Cycle::Daily,
///     ..Config::default()
/// })
/// .unwrap();
/// writer.log(Level::Info, None, format_args!("service started")).unwrap();
/// writer.close().unwrap();
/// ```
#[derive(Debug)]
pub struct SyncWriter {
    target: Target,
    policy: RotationPolicy,
    buffer_size: usize,
    file_mode: Option<u32>,
    pool: Arc<RecordPool>,
    state: Mutex<WriterState>,
}

impl SyncWriter {
    /// Open the writer described by `config`.
    ///
    /// An existing file is appended to; its size and modification time seed
    /// the byte count and the current bucket. If it is already due for
    /// rotation it is archived before the new file is opened. Missing parent
    /// directories are created.
    pub fn open(config: &Config) -> Result<Self, LogError> {
        let target = config.target()?;
        let (policy, sink, bytes, bucket) = match &target {
            Target::Stdout => (RotationPolicy::never(), Sink::Stdout(io::stdout()), 0, Bucket::now()),
            Target::Stderr => (RotationPolicy::never(), Sink::Stderr(io::stderr()), 0, Bucket::now()),
            Target::File(path) => {
                let policy = RotationPolicy::new(config.rotate_bytes, config.rotate_cycle);
                let (bytes, bucket) = Self::resume(path, &policy)?;
                let file = open_log_file(path, config.file_mode)?;
                (policy, Sink::File(file), bytes, bucket)
            }
        };
        let buffer_size = config.writer_buffer_size.max(1);

        Ok(SyncWriter {
            target,
            policy,
            buffer_size,
            file_mode: config.file_mode,
            pool: RecordPool::new(POOL_IDLE_RECORDS, RECORD_BUFFER_BYTES),
            state: Mutex::new(WriterState {
                stream: Some(BufWriter::with_capacity(buffer_size, sink)),
                bytes,
                bucket,
                dated: bytes > 0,
                rotations: 0,
                archive_hint: None,
                closed: false,
            }),
        })
    }

    /// Inspect a log file left by a previous run. Returns the byte count and
    /// bucket to continue with, archiving the file first when it is stale.
    fn resume(path: &Path, policy: &RotationPolicy) -> Result<(u64, Bucket), LogError> {
        let now = Bucket::now();
        let Ok(metadata) = fs::metadata(path) else {
            return Ok((0, now));
        };
        let bytes = metadata.len();
        let bucket = metadata.modified().map(Bucket::from_system_time).unwrap_or(now);
        if bytes == 0 || !policy.should_rotate(&bucket, bytes, &now, 0) {
            return Ok((bytes, bucket));
        }

        let mut scratch = [0u8; SCRATCH_BYTES];
        let (archive, _) = archive_path(path, &bucket, policy.archive_includes_hour(), &mut scratch, 0)?;
        rename_log_file(path, &archive)?;
        Ok((0, now))
    }

    /// Append `record` to the active file, rotating first when the policy
    /// asks for it. The record goes back to its pool once this returns.
    pub fn write(&self, mut record: PooledRecord) -> Result<(), LogError> {
        let size = record.len() as u64;
        let incoming = record.bucket();

        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(LogError::WriterClosed(self.target.to_string()));
        }

        if !state.dated {
            state.bucket = incoming;
            state.dated = true;
        }
        if self.policy.should_rotate(&state.bucket, state.bytes, &incoming, size) {
            if state.bytes == 0 {
                // nothing to archive
                state.bucket = state.bucket.max(incoming);
            } else if let Err(err) = self.rotate(state, incoming, record.scratch_mut()) {
                eprintln!("Failed to rotate log file '{}': {}", self.target, err);
            }
        }

        if let Err(err) = self.ensure_stream(state) {
            drop(guard);
            eprintln!("Log file '{}' is unavailable, writing record to stderr: {}", self.target, err);
            let _ = io::stderr().write_all(record.as_bytes());
            return Err(err);
        }
        if let Some(stream) = state.stream.as_mut() {
            stream.write_all(record.as_bytes())?;
            state.bytes += size;
        }
        Ok(())
    }

    /// Archive the active file and start a new one at the original path.
    ///
    /// A later incoming bucket is adopted even when archiving fails, so a
    /// broken rename is reported once per boundary rather than on every
    /// write. The bucket never moves backwards.
    fn rotate(
        &self,
        state: &mut WriterState,
        incoming: Bucket,
        scratch: &mut [u8; SCRATCH_BYTES],
    ) -> Result<(), LogError> {
        let Some(path) = self.target.path() else {
            return Ok(());
        };

        if let Some(mut stream) = state.stream.take() {
            if let Err(err) = stream.flush() {
                eprintln!("Failed to flush log file '{}' before rotation: {}", path.display(), err);
            }
            let (sink, _unflushed) = stream.into_parts();
            drop(sink);
        }

        let first_index = match state.archive_hint {
            Some((bucket, index)) if bucket == state.bucket => index + 1,
            _ => 0,
        };
        let archived = archive_path(path, &state.bucket, self.policy.archive_includes_hour(), scratch, first_index)
            .and_then(|(archive, index)| rename_log_file(path, &archive).map(|()| index));
        let archived = match archived {
            Ok(index) => {
                state.archive_hint = Some((state.bucket, index));
                state.rotations += 1;
                Ok(())
            }
            Err(err) => Err(err),
        };
        state.bucket = state.bucket.max(incoming);

        let file = open_log_file(path, self.file_mode)?;
        state.bytes = file.metadata().map_or(0, |metadata| metadata.len());
        state.stream = Some(BufWriter::with_capacity(self.buffer_size, Sink::File(file)));
        archived
    }

    /// Reopen the active file after an earlier reopen failed.
    fn ensure_stream(&self, state: &mut WriterState) -> Result<(), LogError> {
        if state.stream.is_some() {
            return Ok(());
        }
        let path = self
            .target
            .path()
            .ok_or_else(|| LogError::InternalError(format!("stream for '{}' is missing", self.target)))?;
        let file = open_log_file(path, self.file_mode)?;
        state.bytes = file.metadata().map_or(0, |metadata| metadata.len());
        state.stream = Some(BufWriter::with_capacity(self.buffer_size, Sink::File(file)));
        Ok(())
    }

    /// Write out buffered bytes and sync the file to disk. Does nothing once
    /// the writer is closed.
    pub fn flush(&self) -> Result<(), LogError> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        if let Some(stream) = state.stream.as_mut() {
            stream.flush()?;
            stream.get_ref().sync()?;
        }
        Ok(())
    }

    /// Flush and close the file. `stdout` and `stderr` stay open. Closing
    /// twice is harmless.
    pub fn close(&self) -> Result<(), LogError> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        if let Some(mut stream) = state.stream.take() {
            let flushed = stream.flush();
            let (sink, _unflushed) = stream.into_parts();
            drop(sink);
            flushed?;
        }
        Ok(())
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn pool(&self) -> &Arc<RecordPool> {
        &self.pool
    }

    /// Bytes in the active file, including data still in the buffer.
    pub fn bytes_written(&self) -> u64 {
        self.lock().bytes
    }

    /// The bucket the active file belongs to.
    pub fn bucket(&self) -> Bucket {
        self.lock().bucket
    }

    /// Number of files archived since the writer was opened.
    pub fn rotations(&self) -> u64 {
        self.lock().rotations
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Writer for SyncWriter {
    fn acquire(&self) -> PooledRecord {
        self.pool.acquire()
    }

    fn write(&self, record: PooledRecord) -> Result<(), LogError> {
        SyncWriter::write(self, record)
    }

    fn flush(&self) -> Result<(), LogError> {
        SyncWriter::flush(self)
    }

    fn close(&self) -> Result<(), LogError> {
        SyncWriter::close(self)
    }
}

/// Each `write` call becomes one record stamped with the current bucket, so
/// the writer can serve as an appender for line oriented formatters such as
/// `tracing_subscriber::fmt`.
impl io::Write for &SyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut record = self.pool.acquire();
        record.set_bucket(Bucket::now());
        record.extend_from_slice(buf);
        SyncWriter::write(*self, record)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        SyncWriter::flush(*self).map_err(Into::into)
    }
}

impl io::Write for SyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared: &SyncWriter = self;
        io::Write::write(&mut shared, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        SyncWriter::flush(self).map_err(Into::into)
    }
}

/// Open `path` for appending, creating it and its parent directories when
/// missing.
fn open_log_file(path: &Path, file_mode: Option<u32>) -> Result<File, LogError> {
    let mut open_options = fs::OpenOptions::new();
    open_options.append(true).create(true);

    let mut open_res = open_options.open(path);
    if open_res.is_err() {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| LogError::CreateDirectoryFailed(parent.to_path_buf(), err.to_string()))?;
            open_res = open_options.open(path);
        }
    }

    let log_file = open_res.map_err(|err| LogError::OpenFileFailed(path.to_path_buf(), err.to_string()))?;
    set_permissions(path, file_mode)?;
    Ok(log_file)
}

/// Apply the configured unix permission bits, if any.
fn set_permissions(path: &Path, file_mode: Option<u32>) -> Result<(), LogError> {
    if let Some(mode) = file_mode {
        #[cfg(unix)]
        {
            fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|err| {
                LogError::SetFilePermissionsError {
                    path: path.to_path_buf(),
                    error: err.to_string(),
                }
            })?
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode);
            eprintln!("Warning: Setting file permissions is not supported on non-Unix platforms");
        }
    }
    Ok(())
}

fn rename_log_file(from: &Path, to: &Path) -> Result<(), LogError> {
    fs::rename(from, to).map_err(|err| LogError::RenameFileError {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error: err.to_string(),
    })
}

/// Pick a free archive name for the file at `path` holding `bucket`.
///
/// Index 0 is the plain `<path>.<date>` name; higher indexes append `.<n>`.
/// Probing starts at `first_index`. The name is free when checked, but
/// another process may still take it before the rename happens.
fn archive_path(
    path: &Path,
    bucket: &Bucket,
    with_hour: bool,
    scratch: &mut [u8; SCRATCH_BYTES],
    first_index: u64,
) -> Result<(PathBuf, u64), LogError> {
    let mut base = path.as_os_str().to_owned();
    base.push(".");
    base.push(String::from_utf8_lossy(header::render_bucket_suffix(scratch, bucket, with_hour)).as_ref());

    if first_index == 0 && is_free(Path::new(&base)) {
        return Ok((PathBuf::from(base), 0));
    }
    for index in first_index.max(1)..=MAX_ARCHIVE_INDEX {
        let mut candidate = base.clone();
        candidate.push(".");
        candidate.push(String::from_utf8_lossy(header::render_decimal(scratch, index)).as_ref());
        let candidate = PathBuf::from(candidate);
        if is_free(&candidate) {
            return Ok((candidate, index));
        }
    }
    Err(LogError::ArchiveNameExhausted(PathBuf::from(base)))
}

fn is_free(path: &Path) -> bool {
    fs::symlink_metadata(path).is_err()
}
