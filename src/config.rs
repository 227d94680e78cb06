//! Logger configuration.
//!
//! A [`Config`] describes one logger: where it writes, how it rotates and
//! whether a background thread performs the writes. Several configs are
//! usually loaded together from a [`Settings`] document, which has the
//! default logger at the top level and named loggers under `exts`:
//!
//! ```json
//! {
//!     "flushPeriod": 5000,
//!     "level": "info",
//!     "path": "${LOG_DIR}/app.log",
//!     "rotateCycle": "daily",
//!     "exts": {
//!         "access,http": { "path": "${LOG_DIR}/access.log", "rotateBytes": 104857600, "async": true }
//!     }
//! }
//! ```
use {
    crate::error::LogError,
    regex::{Captures, Regex},
    serde::{de, Deserialize, Deserializer, Serialize, Serializer},
    std::{
        collections::BTreeMap,
        fmt,
        path::{Path, PathBuf},
        str::FromStr,
        sync::LazyLock,
        time::Duration,
    },
};

/// Default capacity of the buffered stream in front of each log file.
pub const DEFAULT_WRITER_BUFFER_SIZE: usize = 256 * 1024;
/// Default capacity of the asynchronous record queue.
pub const DEFAULT_ASYNC_QUEUE_SIZE: usize = 512;
/// Default upper bound for draining queued records when an asynchronous
/// writer is closed.
pub const DEFAULT_ASYNC_CLOSE_DELAY: Duration = Duration::from_millis(1000);
/// Default interval of the registry flush daemon.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_secs(5);

const STDOUT: &str = "stdout";
const STDERR: &str = "stderr";

// ${NAME} or $NAME
static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:\{([^}]*)\}|([A-Za-z_][A-Za-z0-9_]*))").expect("valid variable pattern"));

/// Severity of a log record, ordered from most to least verbose.
///
/// A logger configured with a given level emits every record at that level
/// or above. [`Level::Off`] silences the logger entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    #[default]
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Off,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Off => "off",
        }
    }

    /// The three byte marker written into each record header.
    pub(crate) fn marker(&self) -> &'static [u8; 3] {
        match self {
            Level::Debug => b"[D]",
            Level::Info => b"[I]",
            Level::Warn => b"[W]",
            Level::Error => b"[E]",
            Level::Fatal => b"[F]",
            Level::Off => b"[O]",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            "off" => Ok(Level::Off),
            _ => Err(LogError::InvalidLevel(s.to_string())),
        }
    }
}

/// How often the active log file is archived regardless of its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cycle {
    /// Never rotate on time. Size based rotation still applies.
    #[default]
    None,
    /// Archive names look like `app.log.2025-04-01-19`.
    Hourly,
    /// Archive names look like `app.log.2025-04-01`.
    Daily,
    Monthly,
    Yearly,
}

impl Cycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cycle::None => "none",
            Cycle::Hourly => "hourly",
            Cycle::Daily => "daily",
            Cycle::Monthly => "monthly",
            Cycle::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cycle {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "never" => Ok(Cycle::None),
            "hourly" => Ok(Cycle::Hourly),
            "daily" => Ok(Cycle::Daily),
            "monthly" => Ok(Cycle::Monthly),
            "yearly" => Ok(Cycle::Yearly),
            _ => Err(LogError::InvalidCycle(s.to_string())),
        }
    }
}

macro_rules! serde_as_str {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                value.parse().map_err(de::Error::custom)
            }
        }
    };
}

serde_as_str!(Level);
serde_as_str!(Cycle);

/// Where a logger writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl Target {
    /// Resolve a configured path. `stdout` and `stderr` (in any case) select
    /// the process streams, an empty path selects stdout, anything else is a
    /// file path with environment variables expanded.
    pub fn parse(path: &str) -> Result<Target, LogError> {
        let trimmed = path.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(STDOUT) {
            Ok(Target::Stdout)
        } else if trimmed.eq_ignore_ascii_case(STDERR) {
            Ok(Target::Stderr)
        } else {
            Ok(Target::File(PathBuf::from(expand_path(trimmed)?)))
        }
    }

    /// Process streams are never rotated and never closed.
    pub fn is_standard_stream(&self) -> bool {
        !matches!(self, Target::File(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Target::File(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Stdout => f.write_str(STDOUT),
            Target::Stderr => f.write_str(STDERR),
            Target::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Expand `${NAME}` and `$NAME` references from the process environment.
///
/// Unset variables expand to nothing. A `${` without its closing brace is
/// kept verbatim.
///
/// # Examples
/// ```
/// std::env::set_var("ROLLOG_DOC_DIR", "/var/log/app");
/// let path = rollog::expand_path("${ROLLOG_DOC_DIR}/main.log").unwrap();
/// assert_eq!(path, "/var/log/app/main.log");
/// ```
pub fn expand_path(path: &str) -> Result<String, LogError> {
    if !path.contains('$') {
        return Ok(path.to_string());
    }
    let expanded = ENV_VAR.replace_all(path, |caps: &Captures| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|name| std::env::var(name.as_str()).ok())
            .unwrap_or_default()
    });
    Ok(expanded.into_owned())
}

mod duration_ms {
    use {
        serde::{Deserialize, Deserializer, Serializer},
        std::time::Duration,
    };

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Settings of a single logger.
///
/// Zero values mean "use the default"; call [`Config::merged`] (loggers do
/// this on construction) to resolve them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Lookup name in a [`crate::Registry`]. Comma separated names register
    /// the same logger several times.
    pub name: String,
    /// Minimum level that gets written.
    pub level: Level,
    /// File path, or `stdout` / `stderr`.
    pub path: String,
    /// Archive the active file before it would grow beyond this many bytes.
    /// Zero disables size based rotation.
    pub rotate_bytes: u64,
    pub rotate_cycle: Cycle,
    /// Capacity of the buffered stream in front of the file.
    #[serde(rename = "bufioWriterSize", alias = "writerBufSize")]
    pub writer_buffer_size: usize,
    /// Unix permission bits applied to log files this crate creates, e.g.
    /// `0o644`. Ignored on other platforms.
    pub file_mode: Option<u32>,
    /// Whether this logger is the registry's default logger.
    #[serde(rename = "default")]
    pub is_default: bool,
    /// Hand records to a background thread instead of writing in the caller.
    #[serde(rename = "async")]
    pub async_write: bool,
    #[serde(alias = "asynChanSize")]
    pub async_queue_size: usize,
    /// Upper bound for draining queued records on close.
    #[serde(with = "duration_ms")]
    pub async_close_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: String::new(),
            level: Level::Debug,
            path: STDOUT.to_string(),
            rotate_bytes: 0,
            rotate_cycle: Cycle::None,
            writer_buffer_size: DEFAULT_WRITER_BUFFER_SIZE,
            file_mode: None,
            is_default: false,
            async_write: false,
            async_queue_size: DEFAULT_ASYNC_QUEUE_SIZE,
            async_close_delay: DEFAULT_ASYNC_CLOSE_DELAY,
        }
    }
}

impl Config {
    /// Create a config writing to `path` with every other setting defaulted.
    pub fn new<S: Into<String>>(path: S) -> Self {
        Config {
            path: path.into(),
            ..Config::default()
        }
    }

    /// Replace unset values with their defaults.
    pub fn merged(mut self) -> Self {
        if self.path.trim().is_empty() {
            self.path = STDOUT.to_string();
        }
        if self.writer_buffer_size == 0 {
            self.writer_buffer_size = DEFAULT_WRITER_BUFFER_SIZE;
        }
        if self.async_queue_size == 0 {
            self.async_queue_size = DEFAULT_ASYNC_QUEUE_SIZE;
        }
        self
    }

    /// Resolve the configured path into a [`Target`].
    pub fn target(&self) -> Result<Target, LogError> {
        Target::parse(&self.path)
    }

    /// The individual names this config registers under.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.name.split(',').map(str::trim).filter(|name| !name.is_empty())
    }
}

/// A document describing every logger of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(with = "duration_ms")]
    pub flush_period: Duration,
    /// The default logger, flattened into the top level of the document.
    #[serde(flatten)]
    pub default: Config,
    /// Named loggers keyed by (comma separated) name.
    pub exts: BTreeMap<String, Config>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            flush_period: DEFAULT_FLUSH_PERIOD,
            default: Config::default(),
            exts: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, LogError> {
        serde_json::from_str(json).map_err(|err| LogError::InvalidConfig(err.to_string()))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LogError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|err| LogError::OpenFileFailed(path.as_ref().to_path_buf(), err.to_string()))?;
        Self::from_json_str(&json)
    }

    /// Flatten into individual logger configs, default logger first.
    pub fn into_configs(self) -> Vec<Config> {
        let mut configs = Vec::with_capacity(self.exts.len() + 1);
        configs.push(Config {
            name: String::new(),
            is_default: true,
            ..self.default
        });
        for (name, config) in self.exts {
            configs.push(Config {
                name,
                is_default: false,
                ..config
            });
        }
        configs
    }
}
