use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone every schedule entry is written in.
pub const NEWSROOM_TZ: Tz = chrono_tz::Asia::Kolkata;

/// Source of "now" for schedule comparisons. Always zone-aware so nothing
/// depends on the host locale.
pub trait Clock: Send + Sync {
    fn zone(&self) -> Tz;

    fn now(&self) -> DateTime<Tz>;

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }

    /// Midnight of the current day in the clock's zone.
    fn start_of_today(&self) -> DateTime<Utc> {
        let now = self.now();
        let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap_or(now.naive_local());
        self.zone()
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    zone: Tz,
}

impl SystemClock {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(NEWSROOM_TZ)
    }
}

impl Clock for SystemClock {
    fn zone(&self) -> Tz {
        self.zone
    }

    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.zone)
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Tz>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Tz>) -> Self {
        Self { instant }
    }

    /// Builds the clock from a wall-clock reading in `zone`. Returns `None` for
    /// readings that do not exist in that zone.
    pub fn at(zone: Tz, date: NaiveDate, hour: u32, minute: u32) -> Option<Self> {
        let local = date.and_hms_opt(hour, minute, 0)?;
        zone.from_local_datetime(&local).earliest().map(Self::new)
    }
}

impl Clock for FixedClock {
    fn zone(&self) -> Tz {
        self.instant.timezone()
    }

    fn now(&self) -> DateTime<Tz> {
        self.instant
    }
}
