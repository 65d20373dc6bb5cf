//! Publication date normalization.
//!
//! Article pages do not always carry a usable date. Rather than letting such
//! records sort to the epoch, a session keeps a high-water mark of the most
//! recent real date it has seen and hands that out as the fallback.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::models::DateOrigin;

/// Year, month and day as matched in an article's date text.
///
/// A zero component means the component was missing; [`DateParts::UNKNOWN`]
/// is the sentinel produced when nothing matched at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateParts {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl DateParts {
    pub const UNKNOWN: DateParts = DateParts {
        year: 0,
        month: 0,
        day: 0,
    };

    pub fn new(year: u32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// The calendar date, if every component is present and valid.
    pub fn to_date(self) -> Option<NaiveDate> {
        if self.year == 0 || self.month == 0 || self.day == 0 {
            return None;
        }
        let year = i32::try_from(self.year).ok()?;
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

/// Session-scoped monotonic clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighWaterMark {
    latest: Option<DateTime<Utc>>,
}

impl HighWaterMark {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current mark, `None` until a real date has been seen.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.latest
    }

    /// Turn matched date parts into a timestamp.
    ///
    /// A complete date becomes midnight UTC of that day and may raise the mark.
    /// Anything else yields the current mark (the Unix epoch while unset),
    /// tagged as [`DateOrigin::Fallback`].
    pub fn normalize(&mut self, parts: DateParts) -> (DateTime<Utc>, DateOrigin) {
        match parts.to_date() {
            Some(date) => {
                let at = date.and_time(chrono::NaiveTime::MIN).and_utc();
                if self.latest.is_none_or(|latest| at > latest) {
                    debug!(%at, "Raised high-water mark");
                    self.latest = Some(at);
                }
                (at, DateOrigin::Parsed)
            }
            None => (
                self.latest.unwrap_or(DateTime::UNIX_EPOCH),
                DateOrigin::Fallback,
            ),
        }
    }
}
