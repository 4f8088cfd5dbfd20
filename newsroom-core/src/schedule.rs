use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::article::ArticleStatus;
use crate::error::EntryError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// One platform's planned publish moment for an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub platform: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub is_posted: bool,
}

impl ScheduleEntry {
    pub fn new(platform: impl Into<String>, date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            date: date.into(),
            time: time.into(),
            is_posted: false,
        }
    }

    pub fn posted(mut self) -> Self {
        self.is_posted = true;
        self
    }

    /// Wall-clock date and time of the entry, without a zone attached.
    pub fn local_datetime(&self) -> Result<NaiveDateTime, EntryError> {
        if self.platform.trim().is_empty() {
            return Err(EntryError::BlankPlatform);
        }
        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT)
            .map_err(|_| EntryError::Date(self.date.clone()))?;
        let time = NaiveTime::parse_from_str(self.time.trim(), TIME_FORMAT)
            .map_err(|_| EntryError::Time(self.time.clone()))?;
        Ok(date.and_time(time))
    }

    /// The instant this entry fires, reading date and time in `zone`.
    pub fn target_instant(&self, zone: Tz) -> Result<DateTime<Tz>, EntryError> {
        let local = self.local_datetime()?;
        zone.from_local_datetime(&local)
            .earliest()
            .ok_or_else(|| EntryError::Nonexistent(local.to_string(), zone.name().to_owned()))
    }

    pub fn is_due(&self, now: &DateTime<Tz>) -> Result<bool, EntryError> {
        let target = self.target_instant(now.timezone())?;
        Ok(target <= *now)
    }
}

/// What a single pass of [`ScheduleSet::mark_due`] changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DueOutcome {
    pub posted: Vec<String>,
    pub invalid: Vec<(String, EntryError)>,
}

impl DueOutcome {
    pub fn changed(&self) -> bool {
        !self.posted.is_empty()
    }
}

/// The schedule entries attached to an article, at most one per platform.
///
/// Deserialising collapses duplicate platforms the same way [`ScheduleSet::merge`]
/// does, so sets read back from storage always hold the uniqueness invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ScheduleEntry>", into = "Vec<ScheduleEntry>")]
pub struct ScheduleSet {
    entries: Vec<ScheduleEntry>,
}

impl ScheduleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScheduleEntry> {
        self.entries.iter()
    }

    pub fn get(&self, platform: &str) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.platform == platform)
    }

    pub fn all_posted(&self) -> bool {
        self.entries.iter().all(|e| e.is_posted)
    }

    /// Merges entries keyed by platform. A platform keeps the position of its
    /// first occurrence and takes the value of its last one.
    pub fn merge<I>(&mut self, incoming: I)
    where
        I: IntoIterator<Item = ScheduleEntry>,
    {
        for entry in incoming {
            match self.entries.iter_mut().find(|e| e.platform == entry.platform) {
                Some(slot) => *slot = entry,
                None => self.entries.push(entry),
            }
        }
    }

    /// Removes every entry whose platform is listed. Returns how many were removed.
    pub fn cancel<S: AsRef<str>>(&mut self, platforms: &[S]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !platforms.iter().any(|p| p.as_ref() == e.platform));
        before - self.entries.len()
    }

    /// Status implied by the posted flags alone.
    pub fn derived_status(&self) -> ArticleStatus {
        if self.entries.is_empty() {
            ArticleStatus::Reviewed
        } else if self.all_posted() {
            ArticleStatus::Posted
        } else {
            ArticleStatus::Scheduled
        }
    }

    /// Flags every unposted entry whose target moment is at or before `now`.
    /// Entries that cannot be read as a date/time are left alone and reported.
    pub fn mark_due(&mut self, now: &DateTime<Tz>) -> DueOutcome {
        let mut outcome = DueOutcome::default();
        for entry in self.entries.iter_mut().filter(|e| !e.is_posted) {
            match entry.is_due(now) {
                Ok(true) => {
                    entry.is_posted = true;
                    outcome.posted.push(entry.platform.clone());
                }
                Ok(false) => {}
                Err(err) => outcome.invalid.push((entry.platform.clone(), err)),
            }
        }
        outcome
    }
}

impl From<Vec<ScheduleEntry>> for ScheduleSet {
    fn from(entries: Vec<ScheduleEntry>) -> Self {
        let mut set = ScheduleSet::new();
        set.merge(entries);
        set
    }
}

impl From<ScheduleSet> for Vec<ScheduleEntry> {
    fn from(set: ScheduleSet) -> Self {
        set.entries
    }
}

impl FromIterator<ScheduleEntry> for ScheduleSet {
    fn from_iter<T: IntoIterator<Item = ScheduleEntry>>(iter: T) -> Self {
        let mut set = ScheduleSet::new();
        set.merge(iter);
        set
    }
}

impl<'a> IntoIterator for &'a ScheduleSet {
    type Item = &'a ScheduleEntry;
    type IntoIter = std::slice::Iter<'a, ScheduleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
