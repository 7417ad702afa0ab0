//! Best-effort extraction of a time window from casual message text.
//!
//! All day arithmetic happens in the local timezone; the window is returned in
//! UTC for comparison against stored commitments.

use crate::error::ConflictError;
use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use regex::Regex;
use std::sync::LazyLock;

static MERIDIEM_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?m\b\.?").expect("valid time pattern")
});
static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):([0-5]\d)\b").expect("valid time pattern"));
static NAMED_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(noon|midday|midnight)\b").expect("valid time pattern"));
static BARE_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:at|around|by|from|until|till|after|before)\s+(\d{1,2})\b(?:[^:\d]|$)")
        .expect("valid time pattern")
});
static DAY_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(today|tonight|tomorrow|tmrw|tmr|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("valid time pattern")
});
static SCHEDULING_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(free|available|busy|meet|meeting|call|dinner|lunch|breakfast|coffee|drinks|appointment|schedule|plans?|catch up|hang out|come over|join|see you)\b",
    )
    .expect("valid time pattern")
});

/// Candidate interval `[start, end)` a message is talking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayRef {
    Today,
    Tonight,
    Tomorrow,
    Weekday(Weekday),
}

#[derive(Debug, Clone, Copy)]
struct TimeMention {
    position: usize,
    time: NaiveTime,
    /// `midnight` closes the named day rather than opening it.
    next_day: bool,
}

fn day_ref(text: &str) -> Option<DayRef> {
    let word = DAY_WORD.captures(text)?.get(1)?.as_str();
    Some(match word {
        "today" => DayRef::Today,
        "tonight" => DayRef::Tonight,
        "tomorrow" | "tmrw" | "tmr" => DayRef::Tomorrow,
        other => DayRef::Weekday(other.parse().ok()?),
    })
}

fn resolve_day(day: DayRef, today: NaiveDate) -> NaiveDate {
    match day {
        DayRef::Today | DayRef::Tonight => today,
        DayRef::Tomorrow => today + Days::new(1),
        DayRef::Weekday(target) => {
            let ahead = (7 + target.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
            today + Days::new(u64::from(ahead))
        }
    }
}

fn overlaps_any(spans: &[(usize, usize)], start: usize, end: usize) -> bool {
    spans.iter().any(|&(s, e)| start < e && s < end)
}

fn time_mentions(text: &str) -> Vec<TimeMention> {
    let mut mentions = Vec::new();
    let mut spans = Vec::new();

    for caps in MERIDIEM_TIME.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let hour: u32 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let pm = caps.get(3).is_some_and(|m| m.as_str() == "p");
        if !(1..=12).contains(&hour) {
            continue;
        }
        let hour24 = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, false) => h,
            (h, true) => h + 12,
        };
        if let Some(time) = NaiveTime::from_hms_opt(hour24, minute, 0) {
            spans.push((whole.start(), whole.end()));
            mentions.push(TimeMention {
                position: whole.start(),
                time,
                next_day: false,
            });
        }
    }

    for caps in CLOCK_TIME.captures_iter(text) {
        let (Some(whole), Some(hour_match)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if overlaps_any(&spans, whole.start(), whole.end()) {
            continue;
        }
        // "3:30" could be morning or afternoon; only zero-padded or
        // afternoon hours read unambiguously as a 24-hour clock.
        let hour_text = hour_match.as_str();
        let hour: u32 = hour_text.parse().unwrap_or(99);
        if !(hour_text.starts_with('0') || hour >= 13) {
            continue;
        }
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            spans.push((whole.start(), whole.end()));
            mentions.push(TimeMention {
                position: whole.start(),
                time,
                next_day: false,
            });
        }
    }

    for m in NAMED_TIME.find_iter(text) {
        let midnight = m.as_str() == "midnight";
        mentions.push(TimeMention {
            position: m.start(),
            time: if midnight {
                NaiveTime::MIN
            } else {
                NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
            },
            next_day: midnight,
        });
    }

    mentions.sort_by_key(|m| m.position);
    mentions
}

fn has_unqualified_time(text: &str) -> bool {
    BARE_HOUR.is_match(text) || CLOCK_TIME.is_match(text)
}

fn to_utc(date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>, ConflictError> {
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            ConflictError::Ambiguous(format!("{date} {time} does not exist in local time"))
        })
}

fn instant(date: NaiveDate, mention: TimeMention) -> Result<DateTime<Utc>, ConflictError> {
    let date = if mention.next_day {
        date + Days::new(1)
    } else {
        date
    };
    to_utc(date, mention.time)
}

/// Find the window `text` refers to, relative to `now`.
///
/// `Ok(None)` means the text is not about a point in time. A time of day
/// written without am/pm (`at 3`, `3:30`) is reported as
/// [`ConflictError::Ambiguous`].
pub fn extract_window(
    text: &str,
    now: DateTime<Local>,
    default_minutes: i64,
) -> Result<Option<TimeWindow>, ConflictError> {
    let lower = text.to_lowercase();
    let day = day_ref(&lower);
    let mentions = time_mentions(&lower);
    let today = now.date_naive();

    if mentions.is_empty() {
        if has_unqualified_time(&lower) {
            return Err(ConflictError::Ambiguous(format!(
                "time of day without am/pm in {text:?}"
            )));
        }
        let Some(day) = day else {
            return Ok(None);
        };
        if !SCHEDULING_WORD.is_match(&lower) {
            return Ok(None);
        }
        let date = resolve_day(day, today);
        let opens = match day {
            DayRef::Tonight => to_utc(date, NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN))?,
            _ if date == today => now.with_timezone(&Utc),
            _ => to_utc(date, NaiveTime::MIN)?,
        };
        let closes = to_utc(date + Days::new(1), NaiveTime::MIN)?;
        return Ok((opens < closes).then_some(TimeWindow {
            start: opens,
            end: closes,
        }));
    }

    let first = mentions[0];
    let mut date = day.map_or(today, |d| resolve_day(d, today));
    let mut start = instant(date, first)?;
    if day.is_none() && start < now.with_timezone(&Utc) {
        date = date + Days::new(1);
        start = instant(date, first)?;
    }

    let default_end = chrono::Duration::try_minutes(default_minutes.max(1))
        .and_then(|length| start.checked_add_signed(length));
    let end = match mentions.get(1) {
        Some(second) => {
            let candidate = instant(date, *second)?;
            if candidate > start { Some(candidate) } else { default_end }
        }
        None => default_end,
    };

    Ok(end.map(|end| TimeWindow { start, end }))
}
