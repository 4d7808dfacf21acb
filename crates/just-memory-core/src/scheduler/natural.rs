//! Natural-language schedule phrases: `in N minutes|hours|days|weeks`,
//! `tomorrow [at HH[:MM] [am|pm]]`, `end of day|eod`, `end of week`,
//! `next <weekday>`. All times are interpreted in local time, matching
//! the clock the process runs on.

use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Timelike, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_IN_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^in\s+(\d+)\s+(minute|hour|day|week)s?$").unwrap());
static RE_TOMORROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^tomorrow(?:\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?)?$").unwrap());
static RE_NEXT_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^next\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)$").unwrap()
});

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn local_to_utc(local_naive: chrono::NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&local_naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a natural-language schedule relative to `now` (UTC). Returns
/// `None` when the phrase isn't recognized, letting the caller fall back
/// to ISO-8601 parsing.
pub fn parse_natural_language(schedule: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = schedule.trim();

    if let Some(caps) = RE_IN_UNIT.captures(s) {
        let n: i64 = caps[1].parse().ok()?;
        let unit = caps[2].to_lowercase();
        let delta = match unit.as_str() {
            "minute" => Duration::minutes(n),
            "hour" => Duration::hours(n),
            "day" => Duration::days(n),
            "week" => Duration::weeks(n),
            _ => return None,
        };
        return Some(now + delta);
    }

    if s.eq_ignore_ascii_case("end of day") || s.eq_ignore_ascii_case("eod") {
        let local_now = now.with_timezone(&Local);
        let today_target = local_now.date_naive().and_hms_opt(18, 0, 0)?;
        let target = local_to_utc(today_target)?;
        return Some(if target > now { target } else { target + Duration::days(1) });
    }

    if s.eq_ignore_ascii_case("end of week") {
        let local_now = now.with_timezone(&Local);
        let days_until_friday = (Weekday::Fri.num_days_from_monday() as i64
            - local_now.weekday().num_days_from_monday() as i64
            + 7)
            % 7;
        let friday = local_now.date_naive() + Duration::days(days_until_friday);
        let naive = friday.and_hms_opt(17, 0, 0)?;
        let target = local_to_utc(naive)?;
        return Some(if target > now { target } else { target + Duration::weeks(1) });
    }

    if let Some(caps) = RE_TOMORROW.captures(s) {
        let local_now = now.with_timezone(&Local);
        let tomorrow = local_now.date_naive() + Duration::days(1);
        let (hour, minute) = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(h), minute, ampm) => {
                let mut hour: u32 = h.as_str().parse().ok()?;
                let minute: u32 = minute.and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
                if let Some(ampm) = ampm {
                    let is_pm = ampm.as_str().eq_ignore_ascii_case("pm");
                    if is_pm && hour < 12 {
                        hour += 12;
                    } else if !is_pm && hour == 12 {
                        hour = 0;
                    }
                }
                (hour, minute)
            }
            _ => (9, 0),
        };
        let naive = tomorrow.and_hms_opt(hour, minute, 0)?;
        return local_to_utc(naive);
    }

    if let Some(caps) = RE_NEXT_WEEKDAY.captures(s) {
        let target_weekday = weekday_from_name(&caps[1])?;
        let local_now = now.with_timezone(&Local);
        let days_ahead = (target_weekday.num_days_from_monday() as i64
            - local_now.weekday().num_days_from_monday() as i64
            + 7)
            % 7;
        let days_ahead = if days_ahead == 0 { 7 } else { days_ahead };
        let next_day = local_now.date_naive() + Duration::days(days_ahead);
        let naive = next_day.and_hms_opt(9, 0, 0)?;
        return local_to_utc(naive);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_n_units_adds_duration() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_natural_language("in 5 minutes", now).unwrap(), now + Duration::minutes(5));
        assert_eq!(parse_natural_language("in 2 hours", now).unwrap(), now + Duration::hours(2));
        assert_eq!(parse_natural_language("in 3 days", now).unwrap(), now + Duration::days(3));
        assert_eq!(parse_natural_language("in 1 weeks", now).unwrap(), now + Duration::weeks(1));
    }

    #[test]
    fn unrecognized_phrase_returns_none() {
        let now = Utc::now();
        assert!(parse_natural_language("whenever", now).is_none());
    }

    #[test]
    fn eod_resolves_to_today_or_tomorrow_six_pm_local() {
        let now = Utc::now();
        let resolved = parse_natural_language("eod", now).unwrap();
        assert!(resolved > now);
    }

    #[test]
    fn tomorrow_with_time_parses_am_pm() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let resolved = parse_natural_language("tomorrow at 3pm", now).unwrap();
        let local = resolved.with_timezone(&Local);
        assert_eq!(local.hour(), 15);
    }

    #[test]
    fn next_weekday_is_in_the_future() {
        let now = Utc::now();
        let resolved = parse_natural_language("next monday", now).unwrap();
        assert!(resolved > now);
    }
}
