use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

use crate::error::AppError;

/// Default cutoff of a highlight: start of the current day.
pub const DEFAULT_AUTO_INSERT: &str = "now/d";

/// Evaluate a highlight `auto_insert` expression.
///
/// Grammar: `now`, then an optional offset `-N<unit>` (`m`, `h`, `d`, `w`),
/// then an optional rounding `/d` or `/w` (down to the start of the day or
/// ISO week in `tz`).
pub fn resolve_auto_insert(
    expr: &str,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<DateTime<Utc>, AppError> {
    let invalid = || AppError::BadRequest(format!("Invalid auto_insert expression '{expr}'"));

    let rest = expr.trim().strip_prefix("now").ok_or_else(invalid)?;
    let (offset, rounding) = match rest.split_once('/') {
        Some((offset, rounding)) => (offset, Some(rounding)),
        None => (rest, None),
    };

    let mut at = now;
    if !offset.is_empty() {
        let amount = offset.strip_prefix('-').ok_or_else(invalid)?;
        let unit = amount.chars().last().ok_or_else(invalid)?;
        let count: i64 = amount[..amount.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;
        let delta = match unit {
            'm' => Duration::try_minutes(count),
            'h' => Duration::try_hours(count),
            'd' => Duration::try_days(count),
            'w' => Duration::try_weeks(count),
            _ => return Err(invalid()),
        }
        .ok_or_else(invalid)?;
        at = at.checked_sub_signed(delta).ok_or_else(invalid)?;
    }

    match rounding {
        None => Ok(at),
        Some("d") => Ok(start_of_day(at, tz)),
        Some("w") => {
            let local = at.with_timezone(&tz);
            let days_back = Duration::days(local.weekday().num_days_from_monday() as i64);
            let monday = at.checked_sub_signed(days_back).ok_or_else(invalid)?;
            Ok(start_of_day(monday, tz))
        }
        Some(_) => Err(invalid()),
    }
}

fn start_of_day(at: DateTime<Utc>, tz: FixedOffset) -> DateTime<Utc> {
    let local_midnight = at.with_timezone(&tz).date_naive().and_time(NaiveTime::MIN);
    // A fixed offset has no gaps, so the local time always maps back.
    tz.from_local_datetime(&local_midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(at)
}
