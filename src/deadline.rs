//! Deadline countdowns.
//!
//! Two separately named computations live here:
//!
//! - [`remaining_time`] is the coarse list-view countdown. It works on the
//!   total number of whole minutes left and floors them into days, hours and
//!   minutes.
//! - [`detailed_time_left`] is the detail-view breakdown. Its day count walks
//!   calendar days in the caller's time zone, and its headline
//!   (`days_remaining`) counts the current partial day as well.
//!
//! Both treat `deadline <= now` as overdue. The instant a deadline is reached
//! the task is overdue; "Due now" only shows while less than a minute is left.
//!
//! Everything here is pure: no clock reads, no I/O.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use std::fmt;

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// Coarse remaining time for list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemainingTime {
    NoDeadline,
    Overdue,
    Remaining {
        days: i64,
        hours: i64,
        minutes: i64,
        /// Exactly one whole day left and the task opted into last-day display.
        last_day: bool,
    },
}

/// Compute the coarse countdown from `now` to `deadline`.
pub fn remaining_time(
    now: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    include_last_day: bool,
) -> RemainingTime {
    let Some(deadline) = deadline else {
        return RemainingTime::NoDeadline;
    };

    if deadline <= now {
        return RemainingTime::Overdue;
    }

    // 正区间内 num_minutes 向零截断即向下取整
    let total_minutes = (deadline - now).num_minutes();
    let days = total_minutes / MINUTES_PER_DAY;
    let hours = (total_minutes % MINUTES_PER_DAY) / MINUTES_PER_HOUR;
    let minutes = total_minutes % MINUTES_PER_HOUR;

    RemainingTime::Remaining {
        days,
        hours,
        minutes,
        last_day: include_last_day && days == 1,
    }
}

impl RemainingTime {
    pub fn is_overdue(&self) -> bool {
        matches!(self, RemainingTime::Overdue)
    }

    pub fn is_last_day(&self) -> bool {
        matches!(self, RemainingTime::Remaining { last_day: true, .. })
    }

    /// Label for list rows: the last-day wording replaces the generic one when
    /// the flag is raised.
    pub fn list_label(&self) -> String {
        if self.is_last_day() {
            "1 day remaining (Last Day)".to_string()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RemainingTime::NoDeadline => Ok(()),
            RemainingTime::Overdue => f.write_str("Overdue"),
            RemainingTime::Remaining {
                days: 0,
                hours: 0,
                minutes: 0,
                ..
            } => f.write_str("Due now"),
            RemainingTime::Remaining {
                days: 0,
                hours: 0,
                minutes,
                ..
            } => write!(f, "{}m left", minutes),
            RemainingTime::Remaining {
                days: 0,
                hours,
                minutes,
                ..
            } => write!(f, "{}h {}m left", hours, minutes),
            RemainingTime::Remaining { days, hours, .. } => {
                write!(f, "{}d {}h left", days, hours)
            }
        }
    }
}

/// Breakdown for the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailedTimeLeft {
    NoDeadline,
    Overdue,
    Remaining {
        /// Whole calendar days between now and the deadline.
        full_days: i64,
        /// Headline count, inclusive of the current partial day.
        days_remaining: i64,
        hours: i64,
        minutes: i64,
    },
}

/// Compute the detail-view breakdown in time zone `tz`.
///
/// `full_days` is calendar-aware: it is the largest `n` such that adding `n`
/// calendar days to `now` (in `tz`) does not pass the deadline, so a day that
/// is 23 or 25 hours long around a DST switch still counts as one day.
/// `hours` and `minutes` are what is left after those days.
pub fn detailed_time_left<Tz: TimeZone>(
    now: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    tz: &Tz,
) -> DetailedTimeLeft {
    let Some(deadline) = deadline else {
        return DetailedTimeLeft::NoDeadline;
    };

    if deadline <= now {
        return DetailedTimeLeft::Overdue;
    }

    let local_now = now.with_timezone(tz);
    let local_deadline = deadline.with_timezone(tz);
    let full_days = whole_calendar_days(&local_now, &local_deadline);

    let anchor = add_calendar_days(&local_now, full_days)
        .map(|shifted| shifted.with_timezone(&Utc))
        .unwrap_or_else(|| now + TimeDelta::days(full_days));
    let rest_minutes = (deadline - anchor).num_minutes().max(0);

    DetailedTimeLeft::Remaining {
        full_days,
        days_remaining: full_days + 1,
        hours: rest_minutes / MINUTES_PER_HOUR,
        minutes: rest_minutes % MINUTES_PER_HOUR,
    }
}

impl DetailedTimeLeft {
    pub fn is_overdue(&self) -> bool {
        matches!(self, DetailedTimeLeft::Overdue)
    }

    /// "N days remaining" headline, `None` when there is nothing to count.
    pub fn headline(&self) -> Option<String> {
        match self {
            DetailedTimeLeft::Remaining { days_remaining, .. } => Some(format!(
                "{} {} remaining",
                days_remaining,
                if *days_remaining == 1 { "day" } else { "days" }
            )),
            _ => None,
        }
    }
}

fn add_calendar_days<Tz: TimeZone>(from: &DateTime<Tz>, days: i64) -> Option<DateTime<Tz>> {
    let days = u64::try_from(days).ok()?;
    from.clone().checked_add_days(Days::new(days))
}

fn whole_calendar_days<Tz: TimeZone>(from: &DateTime<Tz>, to: &DateTime<Tz>) -> i64 {
    let mut days = (to.date_naive() - from.date_naive()).num_days();

    // 终点的时刻早于起点时，最后一天不完整
    while days > 0 {
        match add_calendar_days(from, days) {
            Some(shifted) if shifted <= *to => break,
            _ => days -= 1,
        }
    }

    days.max(0)
}

/// List-view deadline date, e.g. `Thu, Jan 8`.
pub fn format_deadline_display<Tz>(deadline: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    deadline.with_timezone(tz).format("%a, %b %-d").to_string()
}

/// Value used to prefill the deadline field of the edit form.
pub fn format_deadline_input<Tz>(deadline: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    deadline.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}

/// Whether `created_at` falls on the same calendar day as `now` in `tz`.
pub fn is_created_today<Tz: TimeZone>(created_at: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> bool {
    created_at.with_timezone(tz).date_naive() == now.with_timezone(tz).date_naive()
}

/// Parse user input into a deadline.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM[:SS]` (local
/// time in `tz`) and a bare `YYYY-MM-DD`, which means the end of that day.
/// Anything else is treated as "no deadline".
pub fn parse_deadline<Tz: TimeZone>(input: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }

    const LOCAL_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return localize(naive, tz);
        }
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    localize(date.and_hms_milli_opt(23, 59, 59, 999)?, tz)
}

fn localize<Tz: TimeZone>(naive: NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn remaining(now: &str, deadline: &str) -> RemainingTime {
        remaining_time(at(now), Some(at(deadline)), true)
    }

    #[test]
    fn test_no_deadline() {
        let result = remaining_time(at("2026-01-05T00:00:00Z"), None, true);
        assert_eq!(result, RemainingTime::NoDeadline);
        assert_eq!(result.to_string(), "");
        assert_eq!(
            detailed_time_left(at("2026-01-05T00:00:00Z"), None, &Utc),
            DetailedTimeLeft::NoDeadline
        );
    }

    #[test]
    fn test_multi_day_breakdown() {
        let result = remaining("2026-01-05T00:00:00Z", "2026-01-08T03:00:00Z");
        assert_eq!(
            result,
            RemainingTime::Remaining {
                days: 3,
                hours: 3,
                minutes: 0,
                last_day: false
            }
        );
        assert_eq!(result.to_string(), "3d 3h left");
    }

    #[test]
    fn test_same_day() {
        let result = remaining("2026-01-05T12:00:00Z", "2026-01-05T15:00:00Z");
        assert_eq!(result.to_string(), "3h 0m left");
    }

    #[test]
    fn test_minutes_only() {
        let result = remaining("2026-01-05T12:00:00Z", "2026-01-05T12:42:30Z");
        assert_eq!(result.to_string(), "42m left");
    }

    #[test]
    fn test_deadline_equal_to_now_is_overdue() {
        let result = remaining("2026-01-05T12:00:00Z", "2026-01-05T12:00:00Z");
        assert_eq!(result, RemainingTime::Overdue);
        assert_eq!(result.to_string(), "Overdue");
        assert!(detailed_time_left(
            at("2026-01-05T12:00:00Z"),
            Some(at("2026-01-05T12:00:00Z")),
            &Utc
        )
        .is_overdue());
    }

    #[test]
    fn test_under_a_minute_is_due_now() {
        let result = remaining("2026-01-05T12:00:00Z", "2026-01-05T12:00:30Z");
        assert_eq!(
            result,
            RemainingTime::Remaining {
                days: 0,
                hours: 0,
                minutes: 0,
                last_day: false
            }
        );
        assert_eq!(result.to_string(), "Due now");
    }

    #[test]
    fn test_past_deadline_is_overdue() {
        let result = remaining("2026-01-05T12:00:00Z", "2026-01-01T00:00:00Z");
        assert!(result.is_overdue());
    }

    #[test]
    fn test_last_day_flag_boundary() {
        let now = "2026-01-06T10:00:00Z";

        // 23 小时：days=0，不属于最后一天分支
        let short = remaining(now, "2026-01-07T09:00:00Z");
        assert!(!short.is_last_day());
        assert_eq!(short.list_label(), "23h 0m left");

        // 25 小时：days=1
        let long = remaining(now, "2026-01-07T11:00:00Z");
        assert!(long.is_last_day());
        assert_eq!(long.list_label(), "1 day remaining (Last Day)");
        assert_eq!(long.to_string(), "1d 1h left");
    }

    #[test]
    fn test_last_day_flag_respects_opt_out() {
        let result = remaining_time(
            at("2026-01-06T10:00:00Z"),
            Some(at("2026-01-07T11:00:00Z")),
            false,
        );
        assert!(!result.is_last_day());
        assert_eq!(result.list_label(), "1d 1h left");
    }

    #[test]
    fn test_components_stay_in_range() {
        let now = at("2026-01-05T00:00:00Z");
        for offset in [1_i64, 59, 60, 61, 3599, 3600, 86_399, 86_400, 86_401, 1_000_000] {
            let deadline = now + TimeDelta::seconds(offset);
            match remaining_time(now, Some(deadline), true) {
                RemainingTime::Remaining {
                    days,
                    hours,
                    minutes,
                    ..
                } => {
                    assert!(days >= 0 && (0..24).contains(&hours) && (0..60).contains(&minutes));
                    assert_eq!(days * 86_400 + hours * 3600 + minutes * 60, offset / 60 * 60);
                }
                other => panic!("expected remaining time for +{}s, got {:?}", offset, other),
            }
        }
    }

    #[test]
    fn test_pure() {
        let a = remaining("2026-01-05T00:00:00Z", "2026-02-01T00:00:00Z");
        let b = remaining("2026-01-05T00:00:00Z", "2026-02-01T00:00:00Z");
        assert_eq!(a, b);
    }

    #[test]
    fn test_detail_headline_counts_current_day() {
        let detail = detailed_time_left(
            at("2026-01-05T00:00:00Z"),
            Some(at("2026-01-08T03:00:00Z")),
            &Utc,
        );
        assert_eq!(
            detail,
            DetailedTimeLeft::Remaining {
                full_days: 3,
                days_remaining: 4,
                hours: 3,
                minutes: 0
            }
        );
        assert_eq!(detail.headline().as_deref(), Some("4 days remaining"));
    }

    #[test]
    fn test_detail_partial_last_day() {
        // 5 号 15:00 到 8 号 12:00 不足 3 整天
        let detail = detailed_time_left(
            at("2026-01-05T15:00:00Z"),
            Some(at("2026-01-08T12:00:00Z")),
            &Utc,
        );
        assert_eq!(
            detail,
            DetailedTimeLeft::Remaining {
                full_days: 2,
                days_remaining: 3,
                hours: 21,
                minutes: 0
            }
        );
    }

    #[test]
    fn test_detail_same_day() {
        let detail = detailed_time_left(
            at("2026-01-05T12:00:00Z"),
            Some(at("2026-01-05T15:00:00Z")),
            &Utc,
        );
        assert_eq!(detail.headline().as_deref(), Some("1 day remaining"));
    }

    #[test]
    fn test_detail_crosses_month_boundary() {
        let detail = detailed_time_left(
            at("2026-01-30T09:00:00Z"),
            Some(at("2026-02-02T09:00:00Z")),
            &Utc,
        );
        assert!(matches!(
            detail,
            DetailedTimeLeft::Remaining {
                full_days: 3,
                hours: 0,
                minutes: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_detail_uses_local_calendar() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        // 本地时间 6 号 05:00 到 7 号 04:00，不足一整天
        let detail = detailed_time_left(
            at("2026-01-05T20:00:00Z"),
            Some(at("2026-01-06T19:00:00Z")),
            &tokyo,
        );
        assert!(matches!(
            detail,
            DetailedTimeLeft::Remaining {
                full_days: 0,
                days_remaining: 1,
                hours: 23,
                minutes: 0
            }
        ));
    }

    #[test]
    fn test_format_deadline_display() {
        assert_eq!(
            format_deadline_display(at("2026-01-08T03:00:00Z"), &Utc),
            "Thu, Jan 8"
        );
        assert_eq!(
            format_deadline_input(at("2026-01-08T03:00:00Z"), &Utc),
            "2026-01-08 03:00"
        );
    }

    #[test]
    fn test_is_created_today() {
        let now = at("2026-01-05T23:00:00Z");
        assert!(is_created_today(at("2026-01-05T00:30:00Z"), now, &Utc));
        assert!(!is_created_today(at("2026-01-04T23:59:00Z"), now, &Utc));

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        // 东二区已经是 6 号
        assert!(!is_created_today(at("2026-01-05T12:00:00Z"), now, &plus_two));
    }

    #[test]
    fn test_parse_deadline_formats() {
        assert_eq!(
            parse_deadline("2026-01-08T03:00:00Z", &Utc),
            Some(at("2026-01-08T03:00:00Z"))
        );
        assert_eq!(
            parse_deadline("2026-01-08 03:00", &Utc),
            Some(at("2026-01-08T03:00:00Z"))
        );
        assert_eq!(
            parse_deadline("2026-01-08T03:00", &Utc),
            Some(at("2026-01-08T03:00:00Z"))
        );

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            parse_deadline("2026-01-08 03:00", &plus_two),
            Some(at("2026-01-08T01:00:00Z"))
        );
    }

    #[test]
    fn test_parse_bare_date_means_end_of_day() {
        assert_eq!(
            parse_deadline("2026-01-08", &Utc),
            Some(at("2026-01-08T23:59:59.999Z"))
        );
    }

    #[test]
    fn test_parse_malformed_is_absent() {
        assert_eq!(parse_deadline("", &Utc), None);
        assert_eq!(parse_deadline("next tuesday", &Utc), None);
        assert_eq!(parse_deadline("2026-13-45", &Utc), None);
    }
}
