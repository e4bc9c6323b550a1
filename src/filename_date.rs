//! Calendar buckets and filename date extraction.
//!
//! A file's bucket defaults to its modification time. Filenames that carry a
//! date stamp (camera and phone exports, scanned documents) override it,
//! since the stamp usually reflects when the content was created rather than
//! when the file was last touched.
//!
//! # Examples
//!
//! ```
//! use datesort::filename_date::{DateExtractor, DateBucket};
//!
//! let extractor = DateExtractor::default();
//! assert_eq!(
//!     extractor.extract("photo_20150612_party.jpg"),
//!     Some(DateBucket { year: 2015, month: 6 })
//! );
//! assert_eq!(extractor.extract("notes.txt"), None);
//! ```
use chrono::{DateTime, Datelike, Local, Month, NaiveDate};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use std::time::SystemTime;

/// A year/month destination bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateBucket {
    /// Four-digit year.
    pub year: i32,
    /// Month number, 1 through 12.
    pub month: u32,
}

impl DateBucket {
    /// Builds a bucket from a timestamp, interpreted in the local time zone.
    pub fn from_system_time(time: SystemTime) -> Self {
        let local: DateTime<Local> = time.into();
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    /// Builds a bucket from year, month and day, rejecting impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|date| Self {
            year: date.year(),
            month: date.month(),
        })
    }

    /// Full English month name used as the folder name, e.g. `"November"`.
    pub fn month_name(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("Unknown")
    }
}

/// Something that can recognize a date inside a file name.
pub trait DateMatcher: Send + Sync {
    /// Returns the bucket encoded in `file_name`, if any.
    fn extract(&self, file_name: &str) -> Option<DateBucket>;
}

static STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(19\d{2}|20\d{2})([-_.]?)(\d{2})([-_.]?)(\d{2})").expect("Invalid date stamp regex")
});

/// Recognizes `YYYYMMDD` stamps, optionally separated by `-`, `_` or `.`.
///
/// The stamp must not be part of a longer run of digits and must form a real
/// calendar date. Both separators must match, so `2015-0612` is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct StampMatcher;

impl DateMatcher for StampMatcher {
    fn extract(&self, file_name: &str) -> Option<DateBucket> {
        let bytes = file_name.as_bytes();
        let mut start = 0;

        // `captures_at` rather than `captures_iter` so overlapping candidates
        // are still tried after a rejected one.
        while let Some(caps) = STAMP.captures_at(file_name, start) {
            let whole = caps.get(0)?;
            start = whole.start() + 1;

            let digit_before = whole.start() > 0 && bytes[whole.start() - 1].is_ascii_digit();
            let digit_after = bytes.get(whole.end()).is_some_and(u8::is_ascii_digit);
            if digit_before || digit_after || caps[2] != caps[4] {
                continue;
            }

            if let Some(bucket) = bucket_from_stamp(&caps) {
                return Some(bucket);
            }
        }

        None
    }
}

/// A user-supplied regex with named `year` and `month` groups and an
/// optional `day` group.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    /// Wraps `regex`, returning `None` if it lacks the `year` or `month` group.
    pub fn new(regex: Regex) -> Option<Self> {
        let names: Vec<_> = regex.capture_names().flatten().collect();
        if names.contains(&"year") && names.contains(&"month") {
            Some(Self { regex })
        } else {
            None
        }
    }
}

impl DateMatcher for PatternMatcher {
    fn extract(&self, file_name: &str) -> Option<DateBucket> {
        self.regex.captures_iter(file_name).find_map(|caps| {
            let year = caps.name("year")?.as_str().parse().ok()?;
            let month = caps.name("month")?.as_str().parse().ok()?;
            let day = match caps.name("day") {
                Some(day) => day.as_str().parse().ok()?,
                None => 1,
            };
            DateBucket::from_ymd(year, month, day)
        })
    }
}

fn bucket_from_stamp(caps: &Captures<'_>) -> Option<DateBucket> {
    let year = caps[1].parse().ok()?;
    let month = caps[3].parse().ok()?;
    let day = caps[5].parse().ok()?;
    DateBucket::from_ymd(year, month, day)
}

/// Ordered chain of matchers; the first one that recognizes a date wins.
pub struct DateExtractor {
    matchers: Vec<Box<dyn DateMatcher>>,
}

impl DateExtractor {
    /// Creates an extractor from an explicit matcher list.
    pub fn new(matchers: Vec<Box<dyn DateMatcher>>) -> Self {
        Self { matchers }
    }

    /// An extractor that never matches, so modification times always apply.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    /// Adds a matcher that is consulted after the existing ones.
    pub fn push(&mut self, matcher: Box<dyn DateMatcher>) {
        self.matchers.push(matcher);
    }

    pub fn is_enabled(&self) -> bool {
        !self.matchers.is_empty()
    }

    /// Returns the bucket encoded in `file_name`, if any matcher finds one.
    pub fn extract(&self, file_name: &str) -> Option<DateBucket> {
        self.matchers.iter().find_map(|m| m.extract(file_name))
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new(vec![Box::new(StampMatcher)])
    }
}

impl std::fmt::Debug for DateExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateExtractor")
            .field("matchers", &self.matchers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp(name: &str) -> Option<DateBucket> {
        StampMatcher.extract(name)
    }

    #[test]
    fn test_compact_stamp() {
        assert_eq!(
            stamp("photo_20150612_party.jpg"),
            Some(DateBucket { year: 2015, month: 6 })
        );
        assert_eq!(
            stamp("IMG20111103.jpg"),
            Some(DateBucket { year: 2011, month: 11 })
        );
    }

    #[test]
    fn test_separated_stamps() {
        assert_eq!(
            stamp("Scan 2019-02-28 letter.pdf"),
            Some(DateBucket { year: 2019, month: 2 })
        );
        assert_eq!(
            stamp("2003_12_31.png"),
            Some(DateBucket { year: 2003, month: 12 })
        );
        assert_eq!(
            stamp("video.2020.07.04.mp4"),
            Some(DateBucket { year: 2020, month: 7 })
        );
    }

    #[test]
    fn test_mixed_separators_rejected() {
        assert_eq!(stamp("2015-06_12.jpg"), None);
        assert_eq!(stamp("2015-0612.jpg"), None);
    }

    #[test]
    fn test_invalid_calendar_dates_rejected() {
        assert_eq!(stamp("20151301.jpg"), None);
        assert_eq!(stamp("20150230.jpg"), None);
        assert_eq!(stamp("20150600.jpg"), None);
    }

    #[test]
    fn test_longer_digit_runs_rejected() {
        assert_eq!(stamp("1234201506129.jpg"), None);
        assert_eq!(stamp("phone_5552015061200.txt"), None);
    }

    #[test]
    fn test_later_candidate_used_after_rejection() {
        // 20159999 fails validation, the second stamp is valid
        assert_eq!(
            stamp("20159999_20160101.jpg"),
            Some(DateBucket { year: 2016, month: 1 })
        );
    }

    #[test]
    fn test_no_date() {
        assert_eq!(stamp("holiday.jpg"), None);
        assert_eq!(stamp("report_v2.docx"), None);
        assert_eq!(stamp(""), None);
    }

    #[test]
    fn test_pattern_matcher_requires_groups() {
        assert!(PatternMatcher::new(Regex::new(r"(\d{4})").unwrap()).is_none());
        assert!(PatternMatcher::new(Regex::new(r"(?P<year>\d{4})").unwrap()).is_none());
        assert!(
            PatternMatcher::new(Regex::new(r"(?P<year>\d{4})(?P<month>\d{2})").unwrap()).is_some()
        );
    }

    #[test]
    fn test_pattern_matcher_extracts() {
        let matcher =
            PatternMatcher::new(Regex::new(r"WA(?P<month>\d{2})(?P<year>\d{4})").unwrap()).unwrap();
        assert_eq!(
            matcher.extract("WA032018.jpg"),
            Some(DateBucket { year: 2018, month: 3 })
        );
        assert_eq!(matcher.extract("WA132018.jpg"), None);
    }

    #[test]
    fn test_extractor_chain_order() {
        let custom =
            PatternMatcher::new(Regex::new(r"y(?P<year>\d{4})m(?P<month>\d{1,2})").unwrap())
                .unwrap();
        let mut extractor = DateExtractor::new(vec![Box::new(custom)]);
        extractor.push(Box::new(StampMatcher));

        assert_eq!(
            extractor.extract("y1999m4_20150612.jpg"),
            Some(DateBucket { year: 1999, month: 4 })
        );
        assert_eq!(
            extractor.extract("20150612.jpg"),
            Some(DateBucket { year: 2015, month: 6 })
        );
    }

    #[test]
    fn test_disabled_extractor() {
        let extractor = DateExtractor::disabled();
        assert!(!extractor.is_enabled());
        assert_eq!(extractor.extract("photo_20150612_party.jpg"), None);
    }

    #[test]
    fn test_month_names() {
        assert_eq!(DateBucket { year: 2011, month: 11 }.month_name(), "November");
        assert_eq!(DateBucket { year: 2015, month: 6 }.month_name(), "June");
        assert_eq!(DateBucket { year: 2015, month: 1 }.month_name(), "January");
    }

    #[test]
    fn test_from_system_time_uses_local_calendar() {
        let local = Local.with_ymd_and_hms(2011, 11, 3, 12, 0, 0).unwrap();
        let bucket = DateBucket::from_system_time(SystemTime::from(local));
        assert_eq!(bucket, DateBucket { year: 2011, month: 11 });
    }
}
