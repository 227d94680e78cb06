//! Application owned collection of named loggers.
//!
//! A [`Registry`] is built once from a list of [`Config`]s (usually from a
//! [`Settings`] document). It keeps one default logger, any number of named
//! loggers, and a daemon thread that periodically flushes every writer so
//! buffered records reach the disk even when the application is quiet.
use {
    crate::{
        config::{Config, Level, Settings, DEFAULT_FLUSH_PERIOD},
        error::LogError,
        logger::{Logger, FATAL_EXIT_CODE},
        writer::{panic_message, Writer},
    },
    crossbeam_channel::{bounded, select, tick, Receiver, Sender},
    std::{
        collections::HashMap,
        fmt,
        panic::{self, AssertUnwindSafe},
        process,
        sync::Arc,
        thread::{self, JoinHandle},
        time::Duration,
    },
};

/// Periodically flushes a fixed set of writers on its own thread.
struct FlushDaemon {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FlushDaemon {
    fn spawn(period: Duration, writers: Vec<Arc<dyn Writer>>) -> Result<Self, LogError> {
        let (cancel, cancelled) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("rollog-flush".to_string())
            .spawn(move || run_daemon(period, &writers, &cancelled))?;
        Ok(FlushDaemon {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                eprintln!("Log flush daemon terminated abnormally: {}", panic_message(panic.as_ref()));
            }
        }
    }
}

fn run_daemon(period: Duration, writers: &[Arc<dyn Writer>], cancelled: &Receiver<()>) {
    let ticker = tick(period);
    loop {
        select! {
            recv(ticker) -> _ => {
                // failures are already reported on stderr
                let _ = flush_all(writers);
            }
            recv(cancelled) -> _ => return,
        }
    }
}

/// Flush every writer, containing failures and panics to the writer that
/// caused them. Returns the first error.
fn flush_all(writers: &[Arc<dyn Writer>]) -> Result<(), LogError> {
    let mut first = None;
    for writer in writers {
        let err = match panic::catch_unwind(AssertUnwindSafe(|| writer.flush())) {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err,
            Err(panic) => LogError::InternalError(format!("flush panicked: {}", panic_message(panic.as_ref()))),
        };
        eprintln!("Failed to flush log writer: {err}");
        first.get_or_insert(err);
    }
    first.map_or(Ok(()), Err)
}

fn close_all(writers: &[Arc<dyn Writer>]) -> Result<(), LogError> {
    let mut first = None;
    for writer in writers {
        if let Err(err) = writer.close() {
            eprintln!("Failed to close log writer: {err}");
            first.get_or_insert(err);
        }
    }
    first.map_or(Ok(()), Err)
}

/// The loggers of one application.
pub struct Registry {
    default: Option<Logger>,
    named: HashMap<String, Logger>,
    writers: Vec<Arc<dyn Writer>>,
    daemon: Option<FlushDaemon>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("default", &self.default)
            .field("named", &self.named)
            .field("writers", &self.writers.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Open a logger for every config and start the flush daemon.
    ///
    /// A config with `is_default` set becomes the default logger; every
    /// name in a (comma separated) `name` maps to its logger. If any logger
    /// fails to open, or the configs conflict, the loggers opened so far
    /// are closed again and the error is returned. A zero `flush_period`
    /// selects [`DEFAULT_FLUSH_PERIOD`].
    pub fn setup<I>(flush_period: Duration, configs: I) -> Result<Self, LogError>
    where
        I: IntoIterator<Item = Config>,
    {
        let mut registry = Registry {
            default: None,
            named: HashMap::new(),
            writers: Vec::new(),
            daemon: None,
        };
        if let Err(err) = registry.open_all(configs) {
            // writers opened so far must not leak their files
            let _ = close_all(&registry.writers);
            registry.writers.clear();
            return Err(err);
        }

        let period = if flush_period.is_zero() {
            DEFAULT_FLUSH_PERIOD
        } else {
            flush_period
        };
        match FlushDaemon::spawn(period, registry.writers.clone()) {
            Ok(daemon) => registry.daemon = Some(daemon),
            Err(err) => {
                let _ = close_all(&registry.writers);
                registry.writers.clear();
                return Err(err);
            }
        }
        Ok(registry)
    }

    /// Build a registry from a loaded settings document.
    pub fn from_settings(settings: Settings) -> Result<Self, LogError> {
        let period = settings.flush_period;
        Self::setup(period, settings.into_configs())
    }

    fn open_all<I: IntoIterator<Item = Config>>(&mut self, configs: I) -> Result<(), LogError> {
        for config in configs {
            let names: Vec<String> = config.names().map(str::to_string).collect();
            for name in &names {
                if self.named.contains_key(name) {
                    return Err(LogError::InvalidConfig(format!("logger '{name}' is configured twice")));
                }
            }
            if config.is_default && self.default.is_some() {
                return Err(LogError::InvalidConfig("more than one default logger".to_string()));
            }

            let logger = Logger::new(&config)?;
            self.writers.push(Arc::clone(logger.writer()));
            for name in names {
                self.named.insert(name, logger.clone());
            }
            if config.is_default {
                self.default = Some(logger);
            }
        }
        Ok(())
    }

    /// The logger registered under `name`; the empty name is the default
    /// logger.
    pub fn get(&self, name: &str) -> Option<&Logger> {
        if name.is_empty() {
            self.default.as_ref()
        } else {
            self.named.get(name)
        }
    }

    pub fn default_logger(&self) -> Option<&Logger> {
        self.default.as_ref()
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    /// Flush every writer now. All writers are attempted; the first failure
    /// is returned.
    pub fn flush(&self) -> Result<(), LogError> {
        flush_all(&self.writers)
    }

    /// Stop the flush daemon and close every writer.
    pub fn close(&mut self) -> Result<(), LogError> {
        if let Some(mut daemon) = self.daemon.take() {
            daemon.stop();
        }
        close_all(&self.writers)
    }

    /// Log at fatal level on the default logger, close every writer and exit
    /// with [`FATAL_EXIT_CODE`].
    #[track_caller]
    pub fn fatal(&self, args: fmt::Arguments<'_>) -> ! {
        if let Some(logger) = &self.default {
            if let Err(err) = logger.log(Level::Fatal, args) {
                eprintln!("Failed to write fatal record: {err}");
            }
        }
        let _ = close_all(&self.writers);
        process::exit(FATAL_EXIT_CODE)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            config::Cycle,
            record::{PooledRecord, RecordPool},
        },
        std::{
            fs,
            sync::atomic::{AtomicUsize, Ordering},
        },
    };

    enum Flush {
        Works,
        Fails,
        Panics,
    }

    struct Counting {
        pool: Arc<RecordPool>,
        mode: Flush,
        flushes: AtomicUsize,
    }

    impl Counting {
        fn new(mode: Flush) -> Arc<Self> {
            Arc::new(Counting {
                pool: Arc::default(),
                mode,
                flushes: AtomicUsize::new(0),
            })
        }

        fn flushes(&self) -> usize {
            self.flushes.load(Ordering::SeqCst)
        }
    }

    impl Writer for Counting {
        fn acquire(&self) -> PooledRecord {
            self.pool.acquire()
        }

        fn write(&self, _record: PooledRecord) -> Result<(), LogError> {
            Ok(())
        }

        fn flush(&self) -> Result<(), LogError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Flush::Works => Ok(()),
                Flush::Fails => Err(LogError::InternalError("disk gone".to_string())),
                Flush::Panics => panic!("flush exploded"),
            }
        }

        fn close(&self) -> Result<(), LogError> {
            Ok(())
        }
    }

    fn file_config(dir: &std::path::Path, name: &str, file: &str) -> Config {
        Config {
            name: name.to_string(),
            path: dir.join(file).to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    #[test]
    fn resolves_default_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let mut main = file_config(dir.path(), "", "main.log");
        main.is_default = true;
        let access = file_config(dir.path(), "access, http", "access.log");

        let registry = Registry::setup(Duration::from_secs(60), vec![main, access]).unwrap();
        assert!(registry.default_logger().is_some());
        assert!(registry.get("").is_some());
        assert!(registry.get("missing").is_none());

        let access = registry.get("access").unwrap();
        let http = registry.get("http").unwrap();
        assert!(Arc::ptr_eq(access.writer(), http.writer()));
        assert_eq!(registry.names().count(), 2);
    }

    #[test]
    fn flush_makes_records_visible() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = file_config(dir.path(), "", "main.log");
        config.is_default = true;
        config.rotate_cycle = Cycle::Daily;
        let registry = Registry::setup(Duration::from_secs(60), vec![config]).unwrap();

        crate::info!(registry.get("").unwrap(), "hello {}", "registry");
        registry.flush().unwrap();
        let contents = fs::read_to_string(dir.path().join("main.log")).unwrap();
        assert!(contents.ends_with(" - hello registry\n"));
    }

    #[test]
    fn daemon_flushes_periodically() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), "quiet", "quiet.log");
        let registry = Registry::setup(Duration::from_millis(20), vec![config]).unwrap();

        registry.get("quiet").unwrap().warn(format_args!("eventually on disk"));
        let path = dir.path().join("quiet.log");
        let mut contents = String::new();
        for _ in 0..100 {
            contents = fs::read_to_string(&path).unwrap();
            if !contents.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(contents.contains(" [W] "));
    }

    #[test]
    fn daemon_survives_failing_and_panicking_writers() {
        let panicking = Counting::new(Flush::Panics);
        let failing = Counting::new(Flush::Fails);
        let healthy = Counting::new(Flush::Works);
        let writers = vec![
            Arc::clone(&panicking) as Arc<dyn Writer>,
            Arc::clone(&failing) as Arc<dyn Writer>,
            Arc::clone(&healthy) as Arc<dyn Writer>,
        ];

        let err = flush_all(&writers).unwrap_err();
        assert!(matches!(err, LogError::InternalError(ref msg) if msg.contains("flush exploded")));
        assert_eq!(healthy.flushes(), 1);

        let mut daemon = FlushDaemon::spawn(Duration::from_millis(10), writers).unwrap();
        for _ in 0..500 {
            if healthy.flushes() >= 4 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        daemon.stop();

        assert!(healthy.flushes() >= 4);
        assert!(panicking.flushes() >= 4);
        assert!(failing.flushes() >= 4);
    }

    #[test]
    fn failed_setup_closes_opened_loggers() {
        let dir = tempfile::tempdir().unwrap();
        let good = file_config(dir.path(), "good", "good.log");
        let bad = Config {
            name: "bad".to_string(),
            path: "/dev/null/cannot/exist.log".to_string(),
            ..Config::default()
        };
        assert!(Registry::setup(Duration::from_secs(1), vec![good, bad]).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let one = file_config(dir.path(), "db", "one.log");
        let two = file_config(dir.path(), "cache,db", "two.log");
        let err = Registry::setup(Duration::from_secs(1), vec![one, two]).unwrap_err();
        assert!(matches!(err, LogError::InvalidConfig(_)));
    }

    #[test]
    fn close_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), "svc", "svc.log");
        let mut registry = Registry::setup(Duration::from_secs(1), vec![config]).unwrap();
        registry.close().unwrap();
        registry.close().unwrap();
        let err = registry.get("svc").unwrap().log(Level::Info, format_args!("late")).unwrap_err();
        assert!(matches!(err, LogError::WriterClosed(_)));
    }

    #[test]
    fn from_settings_document() {
        let dir = tempfile::tempdir().unwrap();
        let json = format!(
            r#"{{ "path": "{}", "exts": {{ "audit": {{ "path": "stderr", "level": "warn" }} }} }}"#,
            dir.path().join("root.log").display()
        );
        let registry = Registry::from_settings(Settings::from_json_str(&json).unwrap()).unwrap();
        assert_eq!(registry.get("audit").unwrap().level(), Level::Warn);
        assert!(registry.default_logger().is_some());
    }
}
