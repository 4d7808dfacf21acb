//! 5-field POSIX cron (`minute hour day month weekday`), supporting `*`,
//! `N`, `N-M`, `N,M`, and `*/S`. Fields are matched against the candidate's
//! **local** calendar components, matching how `scheduler::natural`
//! interprets its phrases — `0 9 * * *` means 9am on the machine's clock,
//! not 9am UTC. Next-occurrence search is bounded to 366 days to tolerate
//! leap-year-only entries (e.g. `0 0 29 2 *`).

use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Timelike, Utc};

use crate::error::{CoreError, Result};

const SEARCH_BOUND_DAYS: i64 = 366;

#[derive(Debug, Clone)]
struct Field {
    values: Vec<u32>,
}

impl Field {
    fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }
}

fn parse_field(spec: &str, min: u32, max: u32) -> Result<Field> {
    let mut values = Vec::new();
    for part in spec.split(',') {
        if part == "*" {
            values.extend(min..=max);
            continue;
        }
        if let Some(step_spec) = part.strip_prefix("*/") {
            let step: u32 = step_spec
                .parse()
                .map_err(|_| CoreError::validation(format!("invalid cron step: {part}")))?;
            if step == 0 {
                return Err(CoreError::validation("cron step cannot be zero"));
            }
            let mut v = min;
            while v <= max {
                values.push(v);
                v += step;
            }
            continue;
        }
        if let Some((lo, hi)) = part.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| CoreError::validation(format!("invalid cron range: {part}")))?;
            let hi: u32 = hi.parse().map_err(|_| CoreError::validation(format!("invalid cron range: {part}")))?;
            if lo > hi {
                return Err(CoreError::validation(format!("invalid cron range: {part}")));
            }
            values.extend(lo..=hi);
            continue;
        }
        let v: u32 = part.parse().map_err(|_| CoreError::validation(format!("invalid cron field: {part}")))?;
        values.push(v);
    }
    if values.is_empty() || values.iter().any(|v| *v < min || *v > max) {
        return Err(CoreError::validation(format!("cron field out of range [{min},{max}]: {spec}")));
    }
    values.sort_unstable();
    values.dedup();
    Ok(Field { values })
}

struct CronSchedule {
    minute: Field,
    hour: Field,
    day: Field,
    month: Field,
    weekday: Field,
}

fn parse(expr: &str) -> Result<CronSchedule> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(CoreError::validation(format!("cron expression must have 5 fields: {expr}")));
    }
    Ok(CronSchedule {
        minute: parse_field(fields[0], 0, 59)?,
        hour: parse_field(fields[1], 0, 23)?,
        day: parse_field(fields[2], 1, 31)?,
        month: parse_field(fields[3], 1, 12)?,
        weekday: parse_field(fields[4], 0, 6)?,
    })
}

/// Heuristic: a schedule string looks like cron if it has exactly 5
/// whitespace-separated fields each built only of cron-legal characters.
pub fn looks_like_cron(schedule: &str) -> bool {
    let fields: Vec<&str> = schedule.split_whitespace().collect();
    fields.len() == 5
        && fields
            .iter()
            .all(|f| f.chars().all(|c| c.is_ascii_digit() || matches!(c, '*' | '-' | ',' | '/')))
}

pub fn next_cron_occurrence(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let schedule = parse(expr)?;
    let bound = after + Duration::days(SEARCH_BOUND_DAYS);

    let mut candidate = (after + Duration::minutes(1))
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(after + Duration::minutes(1));

    while candidate <= bound {
        let local = candidate.with_timezone(&Local);
        let weekday_num = local.weekday().num_days_from_sunday();
        if schedule.month.matches(local.month())
            && schedule.day.matches(local.day())
            && schedule.weekday.matches(weekday_num)
            && schedule.hour.matches(local.hour())
            && schedule.minute.matches(local.minute())
        {
            return Ok(candidate);
        }
        candidate += Duration::minutes(1);
    }
    Err(CoreError::validation(format!(
        "no cron occurrence for '{expr}' within {SEARCH_BOUND_DAYS} days"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_minute_matches_immediately() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let next = next_cron_occurrence("* * * * *", now).unwrap();
        assert_eq!(next, now + Duration::minutes(1));
    }

    #[test]
    fn daily_at_specific_hour() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let next = next_cron_occurrence("30 9 * * *", now).unwrap().with_timezone(&Local);
        assert_eq!(next.hour(), 9);
        assert_eq!(next.minute(), 30);
        assert_eq!(next.day(), now.with_timezone(&Local).day() + 1);
    }

    #[test]
    fn leap_day_only_schedule_resolves_within_bound() {
        let now = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
        let next = next_cron_occurrence("0 0 29 2 *", now).unwrap().with_timezone(&Local);
        assert_eq!(next.month(), 2);
        assert_eq!(next.day(), 29);
    }

    #[test]
    fn step_field_is_respected() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = next_cron_occurrence("*/15 * * * *", now).unwrap().with_timezone(&Local);
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(parse("bogus").is_err());
    }
}
