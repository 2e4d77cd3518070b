// src/clock.rs
// Day boundaries are computed in the configured zone and converted to UTC
// only at the edge; the host process timezone never reaches a query.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::QueueError;

/// Source of "now". Swappable so tests can pin the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Half-open UTC interval `[start, end)` covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Local calendar date of an instant.
pub fn local_day(tz: Tz, at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Window for `date`, or for the local "today" of `now` when no date is given.
pub fn day_window(tz: Tz, date: Option<NaiveDate>, now: DateTime<Utc>) -> DayWindow {
    let day = date.unwrap_or_else(|| local_day(tz, now));
    let next = day.succ_opt().unwrap_or(day);
    DayWindow {
        day,
        start: local_midnight(tz, day),
        end: local_midnight(tz, next),
    }
}

fn local_midnight(tz: Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Midnight skipped by a DST jump: the day starts at the first valid local minute.
        LocalResult::None => (1..=180)
            .find_map(|m| {
                tz.from_local_datetime(&(midnight + Duration::minutes(m)))
                    .earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| {
                let offset = tz.offset_from_utc_datetime(&midnight).fix();
                midnight
                    .checked_sub_offset(offset)
                    .unwrap_or(midnight)
                    .and_utc()
            }),
    }
}

// Calendar years a queue day may fall in.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Accepts `YYYY-MM-DD`, a local `YYYY-MM-DDTHH:MM[:SS]`, or an RFC 3339
/// timestamp (converted into `tz` before taking the date).
pub fn parse_calendar_date(tz: Tz, raw: &str) -> Result<NaiveDate, QueueError> {
    let raw = raw.trim();
    let date = parse_any_date(tz, raw)
        .ok_or_else(|| QueueError::Validation(format!("invalid date format: {raw:?}")))?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(QueueError::Validation(format!(
            "date out of range: {raw:?} (years {MIN_YEAR}..={MAX_YEAR})"
        )));
    }
    Ok(date)
}

fn parse_any_date(tz: Tz, raw: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz).date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .into_iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ndt| ndt.date())
}

/// UTC instant re-expressed with the local offset, for API responses.
pub fn to_local_timestamp(tz: Tz, at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.with_timezone(&tz).fixed_offset()
}

/// Local `YYYY-MM-DD` of an instant, without a time component.
pub fn to_local_date_string(tz: Tz, at: DateTime<Utc>) -> String {
    local_day(tz, at).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
pub struct FixedClock(pub std::sync::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl FixedClock {
    pub fn at(rfc3339: &str) -> Self {
        let at = DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc);
        Self(std::sync::Mutex::new(at))
    }

    pub fn set(&self, rfc3339: &str) {
        *self.0.lock().unwrap() = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc);
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::{America, Asia};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn bangkok_day_maps_to_utc_window() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let w = day_window(Asia::Bangkok, Some(day), utc("2000-01-01T00:00:00Z"));
        assert_eq!(w.day, day);
        assert_eq!(w.start, utc("2026-03-14T17:00:00Z"));
        assert_eq!(w.end, utc("2026-03-15T17:00:00Z"));
    }

    #[test]
    fn today_is_taken_in_the_configured_zone() {
        // 20:00 UTC on the 14th is already the 15th in Bangkok.
        let w = day_window(Asia::Bangkok, None, utc("2026-03-14T20:00:00Z"));
        assert_eq!(w.day, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn late_night_and_early_morning_fall_in_different_windows() {
        let late = utc("2026-03-15T23:59:00+07:00");
        let early = utc("2026-03-16T00:01:00+07:00");
        assert!(early - late < Duration::minutes(3));

        let w_late = day_window(Asia::Bangkok, None, late);
        let w_early = day_window(Asia::Bangkok, None, early);
        assert_ne!(w_late, w_early);
        assert!(w_late.contains(late));
        assert!(!w_late.contains(early));
        assert!(w_early.contains(early));
        assert_eq!(w_late.end, w_early.start);
    }

    #[test]
    fn dst_spring_forward_day_is_23_hours() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let w = day_window(America::New_York, Some(day), Utc::now());
        assert_eq!(w.end - w.start, Duration::hours(23));
    }

    #[test]
    fn midnight_skipped_by_dst_starts_at_first_valid_minute() {
        // Santiago springs forward at local midnight.
        let day = NaiveDate::from_ymd_opt(2025, 9, 7).unwrap();
        let w = day_window(chrono_tz::America::Santiago, Some(day), Utc::now());
        let local_start = w.start.with_timezone(&chrono_tz::America::Santiago);
        assert_eq!(local_start.date_naive(), day);
        assert!(w.start < w.end);
    }

    #[test]
    fn parses_supported_date_shapes() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(parse_calendar_date(Asia::Bangkok, "2026-03-15").unwrap(), d);
        assert_eq!(parse_calendar_date(Asia::Bangkok, " 2026-03-15T09:30 ").unwrap(), d);
        // 18:00 UTC on the 14th is the 15th in Bangkok
        assert_eq!(
            parse_calendar_date(Asia::Bangkok, "2026-03-14T18:00:00Z").unwrap(),
            d
        );
    }

    #[test]
    fn rejects_garbage_dates() {
        for raw in ["", "yesterday", "2026-13-01", "15/03/2026"] {
            assert!(matches!(
                parse_calendar_date(Asia::Bangkok, raw),
                Err(QueueError::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_dates_outside_supported_years() {
        for raw in ["-262143-01-01", "+262142-12-31", "0000-06-01", "+10000-01-01"] {
            assert!(
                matches!(
                    parse_calendar_date(Asia::Bangkok, raw),
                    Err(QueueError::Validation(_))
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn range_edges_still_produce_real_windows() {
        for raw in ["0001-01-01", "9999-12-31"] {
            let day = parse_calendar_date(America::New_York, raw).unwrap();
            let w = day_window(America::New_York, Some(day), Utc::now());
            assert!(w.start < w.end, "{raw}: {w:?}");
        }
    }

    #[test]
    fn renders_local_values() {
        let at = utc("2026-03-14T18:30:00Z");
        assert_eq!(
            to_local_timestamp(Asia::Bangkok, at).to_rfc3339(),
            "2026-03-15T01:30:00+07:00"
        );
        assert_eq!(to_local_date_string(Asia::Bangkok, at), "2026-03-15");
    }
}
