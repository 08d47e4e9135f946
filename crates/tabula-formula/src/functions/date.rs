//! Date functions
//!
//! All calendar arithmetic happens in UTC. Dates come back as [`CellValue::Date`]; anything
//! that cannot be coerced to a date, and any result outside chrono's range, is null.

use super::{arg, number_arg};
use crate::evaluator::EvaluationContext;
use chrono::{
    DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc,
};
use tabula_core::date::timestamp_ms;
use tabula_core::CellValue;

/// Pattern used by `formatDate` when none is given
pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";

/// Calendar unit accepted by the date functions, singular or plural
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DateUnit {
    /// Parse `"day"`, `"Days"`, ...
    pub fn parse(unit: &str) -> Option<Self> {
        let unit = unit.trim().to_lowercase();
        let singular = unit.strip_suffix('s').unwrap_or(&unit);
        let parsed = match singular {
            "year" => DateUnit::Year,
            "month" => DateUnit::Month,
            "week" => DateUnit::Week,
            "day" => DateUnit::Day,
            "hour" => DateUnit::Hour,
            "minute" => DateUnit::Minute,
            "second" => DateUnit::Second,
            "millisecond" => DateUnit::Millisecond,
            _ => return None,
        };
        Some(parsed)
    }

    /// Length in milliseconds of the fixed-length units
    fn millis(self) -> Option<f64> {
        match self {
            DateUnit::Year | DateUnit::Month => None,
            DateUnit::Week => Some(604_800_000.0),
            DateUnit::Day => Some(86_400_000.0),
            DateUnit::Hour => Some(3_600_000.0),
            DateUnit::Minute => Some(60_000.0),
            DateUnit::Second => Some(1_000.0),
            DateUnit::Millisecond => Some(1.0),
        }
    }
}

fn date_arg(args: &[CellValue], index: usize) -> Option<DateTime<Utc>> {
    arg(args, index).to_date()
}

fn unit_arg(args: &[CellValue], index: usize) -> Option<DateUnit> {
    DateUnit::parse(&arg(args, index).to_text())
}

fn to_value(date: Option<DateTime<Utc>>) -> CellValue {
    date.map_or(CellValue::Null, CellValue::Date)
}

fn midnight(date: DateTime<Utc>) -> Option<DateTime<Utc>> {
    from_naive(date.date_naive().and_hms_opt(0, 0, 0)?)
}

fn from_naive(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&naive))
}

/// Move `date` by `amount` units; calendar units keep the day-of-month where possible and
/// clamp to the end of shorter months
pub fn shift(date: DateTime<Utc>, amount: f64, unit: DateUnit) -> Option<DateTime<Utc>> {
    if !amount.is_finite() {
        return None;
    }

    match unit.millis() {
        Some(unit_ms) => {
            let delta = TimeDelta::try_milliseconds((amount * unit_ms).round() as i64)?;
            date.checked_add_signed(delta)
        }
        None => {
            let months = amount.trunc() * if unit == DateUnit::Year { 12.0 } else { 1.0 };
            if months.abs() > f64::from(u32::MAX) {
                return None;
            }
            let step = Months::new(months.abs() as u32);
            if months >= 0.0 {
                date.checked_add_months(step)
            } else {
                date.checked_sub_months(step)
            }
        }
    }
}

/// `later - earlier` in whole units
///
/// Years and months subtract calendar fields; the other units floor-divide the millisecond
/// difference.
pub fn difference(later: DateTime<Utc>, earlier: DateTime<Utc>, unit: DateUnit) -> f64 {
    let years = f64::from(later.year() - earlier.year());
    match unit {
        DateUnit::Year => years,
        DateUnit::Month => years * 12.0 + f64::from(later.month() as i32 - earlier.month() as i32),
        fixed => {
            let delta = timestamp_ms(&later) - timestamp_ms(&earlier);
            // `millis` is always Some for the remaining units
            (delta / fixed.millis().unwrap_or(1.0)).floor()
        }
    }
}

/// First instant of the unit containing `date` (weeks start on Sunday)
pub fn start_of(date: DateTime<Utc>, unit: DateUnit) -> Option<DateTime<Utc>> {
    let day = date.date_naive();
    let start = match unit {
        DateUnit::Year => NaiveDate::from_ymd_opt(day.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
        DateUnit::Month => NaiveDate::from_ymd_opt(day.year(), day.month(), 1)?.and_hms_opt(0, 0, 0)?,
        DateUnit::Week => {
            let back = i64::from(day.weekday().num_days_from_sunday());
            (day - TimeDelta::try_days(back)?).and_hms_opt(0, 0, 0)?
        }
        DateUnit::Day => day.and_hms_opt(0, 0, 0)?,
        DateUnit::Hour => day.and_hms_opt(date.hour(), 0, 0)?,
        DateUnit::Minute => day.and_hms_opt(date.hour(), date.minute(), 0)?,
        DateUnit::Second => day.and_hms_opt(date.hour(), date.minute(), date.second())?,
        DateUnit::Millisecond => {
            let millis = date.timestamp_subsec_millis();
            day.and_hms_milli_opt(date.hour(), date.minute(), date.second(), millis)?
        }
    };
    from_naive(start)
}

/// Last millisecond of the unit containing `date`
pub fn end_of(date: DateTime<Utc>, unit: DateUnit) -> Option<DateTime<Utc>> {
    let next = shift(start_of(date, unit)?, 1.0, unit)?;
    next.checked_sub_signed(TimeDelta::try_milliseconds(1)?)
}

pub fn fn_now(_args: &[CellValue], ctx: &EvaluationContext) -> CellValue {
    CellValue::Date(ctx.now())
}

pub fn fn_today(_args: &[CellValue], ctx: &EvaluationContext) -> CellValue {
    to_value(midnight(ctx.now()))
}

pub fn fn_date_add(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    add(args, 1.0)
}

pub fn fn_date_subtract(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    add(args, -1.0)
}

fn add(args: &[CellValue], sign: f64) -> CellValue {
    let (Some(date), Some(amount), Some(unit)) =
        (date_arg(args, 0), number_arg(args, 1), unit_arg(args, 2))
    else {
        return CellValue::Null;
    };
    to_value(shift(date, sign * amount, unit))
}

/// `dateBetween(d1, d2, unit)`: positive when `d1` is after `d2`
pub fn fn_date_between(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let (Some(later), Some(earlier), Some(unit)) =
        (date_arg(args, 0), date_arg(args, 1), unit_arg(args, 2))
    else {
        return CellValue::Null;
    };
    CellValue::Number(difference(later, earlier, unit))
}

pub fn fn_format_date(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let Some(date) = date_arg(args, 0) else {
        return CellValue::Null;
    };
    let pattern = if args.len() > 1 {
        arg(args, 1).to_text()
    } else {
        DEFAULT_DATE_FORMAT.to_string()
    };
    CellValue::Text(format_date(date, &pattern))
}

/// Date format tokens, longest first so `YYYY` wins over `YY`
const FORMAT_TOKENS: [&str; 21] = [
    "YYYY", "MMMM", "dddd", "SSS", "MMM", "ddd", "YY", "MM", "DD", "HH", "hh", "mm", "ss", "M",
    "D", "d", "H", "h", "m", "s", "A",
];

/// Render `date` using moment-style tokens (`YYYY-MM-DD HH:mm`, `MMM D, YYYY`, ...);
/// characters that are not tokens are copied through
pub fn format_date(date: DateTime<Utc>, pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;

    while let Some(c) = rest.chars().next() {
        match FORMAT_TOKENS.iter().find(|token| rest.starts_with(*token)) {
            Some(token) => {
                out.push_str(&render_token(date, token));
                rest = &rest[token.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

fn render_token(date: DateTime<Utc>, token: &str) -> String {
    let hour12 = match date.hour() % 12 {
        0 => 12,
        h => h,
    };
    match token {
        "YYYY" => format!("{:04}", date.year()),
        "YY" => format!("{:02}", date.year().rem_euclid(100)),
        "MMMM" => date.format("%B").to_string(),
        "MMM" => date.format("%b").to_string(),
        "MM" => format!("{:02}", date.month()),
        "M" => date.month().to_string(),
        "DD" => format!("{:02}", date.day()),
        "D" => date.day().to_string(),
        "dddd" => date.format("%A").to_string(),
        "ddd" => date.format("%a").to_string(),
        "d" => date.weekday().num_days_from_sunday().to_string(),
        "HH" => format!("{:02}", date.hour()),
        "H" => date.hour().to_string(),
        "hh" => format!("{:02}", hour12),
        "h" => hour12.to_string(),
        "mm" => format!("{:02}", date.minute()),
        "m" => date.minute().to_string(),
        "ss" => format!("{:02}", date.second()),
        "s" => date.second().to_string(),
        "SSS" => format!("{:03}", date.timestamp_subsec_millis()),
        "A" => (if date.hour() < 12 { "AM" } else { "PM" }).to_string(),
        other => other.to_string(),
    }
}

fn component(args: &[CellValue], f: impl Fn(&DateTime<Utc>) -> u32) -> CellValue {
    date_arg(args, 0).map_or(CellValue::Null, |d| CellValue::Number(f64::from(f(&d))))
}

pub fn fn_year(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    date_arg(args, 0).map_or(CellValue::Null, |d| CellValue::Number(f64::from(d.year())))
}

pub fn fn_month(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    component(args, |d| d.month())
}

pub fn fn_day(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    component(args, |d| d.day())
}

/// 0 = Sunday .. 6 = Saturday
pub fn fn_day_of_week(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    component(args, |d| d.weekday().num_days_from_sunday())
}

pub fn fn_hour(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    component(args, |d| d.hour())
}

pub fn fn_minute(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    component(args, |d| d.minute())
}

pub fn fn_second(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    component(args, |d| d.second())
}

/// Epoch milliseconds
pub fn fn_timestamp(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    date_arg(args, 0).map_or(CellValue::Null, |d| CellValue::Number(timestamp_ms(&d)))
}

/// `date(value)` truncates to midnight; `date(year, month, day[, hour, minute, second])`
/// builds a date from parts
pub fn fn_date(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    if args.len() == 1 {
        return to_value(date_arg(args, 0).and_then(midnight));
    }
    to_value(from_parts(args))
}

fn from_parts(args: &[CellValue]) -> Option<DateTime<Utc>> {
    if args.len() < 3 {
        return None;
    }
    let mut parts = [0i64; 6];
    for (slot, value) in parts.iter_mut().zip(args) {
        *slot = value.to_number()?.trunc() as i64;
    }
    let [year, month, day, hour, minute, second] = parts;

    let day = NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?;
    let naive = day.and_hms_opt(
        u32::try_from(hour).ok()?,
        u32::try_from(minute).ok()?,
        u32::try_from(second).ok()?,
    )?;
    from_naive(naive)
}

pub fn fn_parse_date(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    to_value(date_arg(args, 0))
}

pub fn fn_start_of(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    match (date_arg(args, 0), unit_arg(args, 1)) {
        (Some(date), Some(unit)) => to_value(start_of(date, unit)),
        _ => CellValue::Null,
    }
}

pub fn fn_end_of(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    match (date_arg(args, 0), unit_arg(args, 1)) {
        (Some(date), Some(unit)) => to_value(end_of(date, unit)),
        _ => CellValue::Null,
    }
}
