//! When to archive the active log file.
use {
    crate::config::Cycle,
    chrono::{DateTime, Datelike, Local, TimeZone, Timelike},
    std::time::SystemTime,
};

/// The calendar hour a record (or the active log file) belongs to.
///
/// Records capture their bucket when they are rendered so the writer never
/// has to consult the clock while holding its lock.
/// Buckets order chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bucket {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl Bucket {
    pub const fn new(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Bucket { year, month, day, hour }
    }

    /// The bucket of the current local time.
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime<Tz: TimeZone>(datetime: &DateTime<Tz>) -> Self {
        Bucket {
            year: datetime.year(),
            month: datetime.month(),
            day: datetime.day(),
            hour: datetime.hour(),
        }
    }

    /// The local time bucket of a file modification time.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_datetime(&DateTime::<Local>::from(time))
    }

    /// The start of the `cycle` period holding `self`, or `None` when the
    /// cycle never rotates.
    fn period(&self, cycle: Cycle) -> Option<Bucket> {
        match cycle {
            Cycle::None => None,
            Cycle::Hourly => Some(*self),
            Cycle::Daily => Some(Bucket::new(self.year, self.month, self.day, 0)),
            Cycle::Monthly => Some(Bucket::new(self.year, self.month, 0, 0)),
            Cycle::Yearly => Some(Bucket::new(self.year, 0, 0, 0)),
        }
    }
}

/// Size and time thresholds deciding when a writer rotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationPolicy {
    threshold: u64,
    cycle: Cycle,
}

impl RotationPolicy {
    /// A `threshold` of zero disables size based rotation.
    pub const fn new(threshold: u64, cycle: Cycle) -> Self {
        RotationPolicy { threshold, cycle }
    }

    /// The policy of writers that must never rotate, such as stdout.
    pub const fn never() -> Self {
        Self::new(0, Cycle::None)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Archive names carry the hour only for hourly rotation.
    pub fn archive_includes_hour(&self) -> bool {
        self.cycle == Cycle::Hourly
    }

    /// Decide whether the active file has to be archived before a record of
    /// `incoming_size` bytes from bucket `incoming` is appended to it.
    ///
    /// The size and time triggers are independent; either one rotates. An
    /// `incoming` bucket older than `current` never triggers on time.
    pub fn should_rotate(&self, current: &Bucket, current_bytes: u64, incoming: &Bucket, incoming_size: u64) -> bool {
        self.exceeds_threshold(current_bytes, incoming_size) || self.crosses_boundary(current, incoming)
    }

    fn exceeds_threshold(&self, current_bytes: u64, incoming_size: u64) -> bool {
        self.threshold > 0 && current_bytes.saturating_add(incoming_size) > self.threshold
    }

    /// Only a later period rotates. Records rendered just before a boundary
    /// but written after it belong to the file that is already active.
    fn crosses_boundary(&self, current: &Bucket, incoming: &Bucket) -> bool {
        match (current.period(self.cycle), incoming.period(self.cycle)) {
            (Some(current), Some(incoming)) => incoming > current,
            _ => false,
        }
    }
}
