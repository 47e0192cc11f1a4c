//! Timestamp and duration parsing for date comparisons.
//!
//! Resource values are compared chronologically when both sides look like
//! points in time. A comparison operand is a [`Moment`]: either an absolute
//! date (`2016-09-01`, `"January 2016"`, an RFC 3339 timestamp) or a signed
//! ISO 8601 duration (`-p1y`, `-P2DT3H`) taken relative to the evaluation
//! clock.

use chrono::{
    DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a timestamp or date.
///
/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DD[THH:MM[:SS[.f]]]`
/// timestamps (read as UTC), `YYYY-MM`, `Month YYYY` and `Month D YYYY`.
/// Dates without a time of day are taken at midnight UTC.
pub fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() || !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    // RFC 3339 requires the `T`; accept a space as well.
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt);
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(utc(naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(utc(date.and_time(NaiveTime::MIN)));
    }
    if let Some(date) = parse_year_month(text) {
        return Some(utc(date.and_time(NaiveTime::MIN)));
    }
    parse_month_name_date(text).map(|date| utc(date.and_time(NaiveTime::MIN)))
}

fn utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&naive).fixed_offset()
}

/// Parses `YYYY-MM`.
fn parse_year_month(text: &str) -> Option<NaiveDate> {
    let (year, month) = text.split_once('-')?;
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    let year = year.parse::<i32>().ok()?;
    let month = month.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Parses `Month YYYY`, `Month D YYYY` and `Month D, YYYY`.
fn parse_month_name_date(text: &str) -> Option<NaiveDate> {
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();
    match words.as_slice() {
        [month, year] => {
            let month = parse_month_name(&month.to_lowercase())?;
            NaiveDate::from_ymd_opt(year.parse().ok()?, month, 1)
        }
        [month, day, year] => {
            let month = parse_month_name(&month.to_lowercase())?;
            NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)
        }
        _ => None,
    }
}

/// Returns the month number (1-12) for a short or full English month name.
fn parse_month_name(name: &str) -> Option<u32> {
    match name {
        "jan" | "january" => Some(1),
        "feb" | "february" => Some(2),
        "mar" | "march" => Some(3),
        "apr" | "april" => Some(4),
        "may" => Some(5),
        "jun" | "june" => Some(6),
        "jul" | "july" => Some(7),
        "aug" | "august" => Some(8),
        "sep" | "sept" | "september" => Some(9),
        "oct" | "october" => Some(10),
        "nov" | "november" => Some(11),
        "dec" | "december" => Some(12),
        _ => None,
    }
}

/// Parses a number of seconds since the Unix epoch.
pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// A signed ISO 8601 duration such as `P1Y2M`, `-p1m` or `PT36H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsoDuration {
    /// True for a leading `-`.
    pub negative: bool,
    /// Calendar months, years included.
    pub months: u32,
    /// Whole days, weeks included.
    pub days: i64,
    /// Time of day component in milliseconds.
    pub millis: i64,
}

impl IsoDuration {
    /// Parses an ISO 8601 duration, case-insensitively, with an optional sign.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, rest) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let rest = rest.strip_prefix('p').or_else(|| rest.strip_prefix('P'))?;

        let mut duration = IsoDuration {
            negative,
            ..Default::default()
        };
        let mut in_time = false;
        let mut number = String::new();
        let mut seen_component = false;

        for c in rest.chars() {
            match c {
                '0'..='9' | '.' => number.push(c),
                't' | 'T' if number.is_empty() && !in_time => in_time = true,
                unit => {
                    if number.is_empty() {
                        return None;
                    }
                    let amount: f64 = number.parse().ok()?;
                    number.clear();
                    seen_component = true;
                    match (unit.to_ascii_uppercase(), in_time) {
                        ('Y', false) => {
                            let years = whole(amount)?.checked_mul(12)?;
                            duration.months = duration.months.checked_add(years)?;
                        }
                        ('M', false) => duration.months = duration.months.checked_add(whole(amount)?)?,
                        ('W', false) => {
                            duration.days = duration.days.checked_add(i64::from(whole(amount)?) * 7)?
                        }
                        ('D', false) => {
                            duration.days = duration.days.checked_add(i64::from(whole(amount)?))?
                        }
                        ('H', true) => {
                            duration.millis = duration.millis.checked_add(millis(amount, 3_600_000.0)?)?
                        }
                        ('M', true) => {
                            duration.millis = duration.millis.checked_add(millis(amount, 60_000.0)?)?
                        }
                        ('S', true) => {
                            duration.millis = duration.millis.checked_add(millis(amount, 1_000.0)?)?
                        }
                        _ => return None,
                    }
                }
            }
        }

        if !number.is_empty() || !seen_component {
            return None;
        }
        Some(duration)
    }

    /// Offsets `from` by this duration.
    pub fn offset(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = Months::new(self.months);
        let time = Duration::try_days(self.days)?
            .checked_add(&Duration::try_milliseconds(self.millis)?)?;
        if self.negative {
            from.checked_sub_months(months)?.checked_sub_signed(time)
        } else {
            from.checked_add_months(months)?.checked_add_signed(time)
        }
    }
}

fn whole(amount: f64) -> Option<u32> {
    if amount.fract() != 0.0 || amount < 0.0 || amount > f64::from(u32::MAX) {
        return None;
    }
    Some(amount as u32)
}

/// `amount` units of `unit` milliseconds, or `None` past the `i64` range.
fn millis(amount: f64, unit: f64) -> Option<i64> {
    let millis = (amount * unit).round();
    if !millis.is_finite() || millis < 0.0 || millis >= i64::MAX as f64 {
        return None;
    }
    Some(millis as i64)
}

/// A point in time named by a comparison operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    /// A fixed timestamp.
    Absolute(DateTime<FixedOffset>),
    /// A duration relative to the evaluation clock.
    Relative(IsoDuration),
}

impl Moment {
    /// Parses an operand as a duration or, failing that, as a timestamp.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(duration) = IsoDuration::parse(text) {
            return Some(Moment::Relative(duration));
        }
        parse_datetime(text).map(Moment::Absolute)
    }

    /// Resolves this moment against the evaluation clock.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Moment::Absolute(dt) => Some(dt.with_timezone(&Utc)),
            Moment::Relative(duration) => duration.offset(now),
        }
    }
}
