//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::{arg, number_arg};
use crate::evaluator::EvaluationContext;
use lazy_regex::regex_replace_all;
use tabula_core::CellValue;

/// Upper bound on `repeat` counts
pub const MAX_REPEAT: usize = 10_000;

/// Upper bound on `padStart`/`padEnd` target lengths
pub const MAX_PAD_LENGTH: usize = 10_000;

fn text(args: &[CellValue], index: usize) -> String {
    arg(args, index).to_text()
}

pub fn fn_concat(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Text(args.iter().map(CellValue::to_text).collect())
}

pub fn fn_length(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let len = match arg(args, 0) {
        CellValue::MultiSelect(items) => items.len(),
        CellValue::References(refs) => refs.len(),
        other => other.to_text().chars().count(),
    };
    CellValue::Number(len as f64)
}

/// Substring test; on a multi-select, membership of an option
pub fn fn_contains(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let needle = text(args, 1);
    let found = match arg(args, 0) {
        CellValue::MultiSelect(items) => items.iter().any(|item| *item == needle),
        other => other.to_text().contains(&needle),
    };
    CellValue::Boolean(found)
}

pub fn fn_replace(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let (haystack, search, replacement) = (text(args, 0), text(args, 1), text(args, 2));
    if search.is_empty() {
        return CellValue::Text(haystack);
    }
    CellValue::Text(haystack.replace(&search, &replacement))
}

pub fn fn_replace_first(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let (haystack, search, replacement) = (text(args, 0), text(args, 1), text(args, 2));
    if search.is_empty() {
        return CellValue::Text(haystack);
    }
    CellValue::Text(haystack.replacen(&search, &replacement, 1))
}

pub fn fn_lower(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Text(text(args, 0).to_lowercase())
}

pub fn fn_upper(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Text(text(args, 0).to_uppercase())
}

pub fn fn_trim(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Text(text(args, 0).trim().to_string())
}

/// `slice(text, start, end?)`; negative indices count from the end
pub fn fn_slice(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let chars: Vec<char> = text(args, 0).chars().collect();
    let len = chars.len();

    let Some(start) = number_arg(args, 1) else {
        return CellValue::Null;
    };
    let end = if args.len() > 2 {
        match number_arg(args, 2) {
            Some(end) => end,
            None => return CellValue::Null,
        }
    } else {
        len as f64
    };

    let (start, end) = (clamp_index(start, len), clamp_index(end, len));
    if start >= end {
        return CellValue::text("");
    }
    CellValue::Text(chars[start..end].iter().collect())
}

fn clamp_index(index: f64, len: usize) -> usize {
    let index = index.trunc();
    if index < 0.0 {
        (len as f64 + index).max(0.0) as usize
    } else {
        (index as usize).min(len)
    }
}

/// `split(text, separator)` into a list; an empty separator splits into characters
pub fn fn_split(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let (haystack, separator) = (text(args, 0), text(args, 1));
    let parts = if separator.is_empty() {
        haystack.chars().map(String::from).collect()
    } else {
        haystack.split(separator.as_str()).map(String::from).collect()
    };
    CellValue::MultiSelect(parts)
}

pub fn fn_starts_with(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Boolean(text(args, 0).starts_with(&text(args, 1)))
}

pub fn fn_ends_with(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Boolean(text(args, 0).ends_with(&text(args, 1)))
}

/// Character index of the first occurrence, null when absent
pub fn fn_index_of(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let (haystack, needle) = (text(args, 0), text(args, 1));
    match haystack.find(&needle) {
        Some(byte_idx) => CellValue::Number(haystack[..byte_idx].chars().count() as f64),
        None => CellValue::Null,
    }
}

pub fn fn_repeat(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    match count_arg(args, 1, MAX_REPEAT) {
        Some(count) => CellValue::Text(text(args, 0).repeat(count)),
        None => CellValue::Null,
    }
}

pub fn fn_pad_start(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    pad(args, true)
}

pub fn fn_pad_end(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    pad(args, false)
}

fn pad(args: &[CellValue], at_start: bool) -> CellValue {
    let Some(target) = count_arg(args, 1, MAX_PAD_LENGTH) else {
        return CellValue::Null;
    };
    let value = text(args, 0);
    let filler = if args.len() > 2 {
        text(args, 2)
    } else {
        " ".to_string()
    };

    let len = value.chars().count();
    if len >= target || filler.is_empty() {
        return CellValue::Text(value);
    }

    let padding: String = filler.chars().cycle().take(target - len).collect();
    CellValue::Text(if at_start {
        padding + &value
    } else {
        value + &padding
    })
}

/// Non-negative integral argument no larger than `max`
fn count_arg(args: &[CellValue], index: usize, max: usize) -> Option<usize> {
    let n = number_arg(args, index)?.trunc();
    (0.0..=max as f64).contains(&n).then_some(n as usize)
}

/// `format(value)` converts to text; `format(template, a, b, ...)` fills `{0}`, `{1}`, ...
pub fn fn_format(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let template = text(args, 0);
    if args.len() == 1 {
        return CellValue::Text(template);
    }

    let filled = regex_replace_all!(r"\{(\d+)\}", &template, |whole: &str, index: &str| {
        index
            .parse::<usize>()
            .ok()
            .and_then(|i| args.get(i + 1))
            .map_or_else(|| whole.to_string(), CellValue::to_text)
    });
    CellValue::Text(filled.into_owned())
}

pub fn fn_to_number(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    arg(args, 0)
        .to_number()
        .map_or(CellValue::Null, CellValue::Number)
}
