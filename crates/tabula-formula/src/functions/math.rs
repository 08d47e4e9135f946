//! Math functions

use super::{arg, finite, number_arg};
use crate::evaluator::{self, EvaluationContext};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use tabula_core::CellValue;

/// Largest number of decimal places a `Decimal` can carry
const MAX_DECIMAL_PLACES: i32 = 28;

/// Largest power of ten representable as an f64
const MAX_POWER_OF_TEN: i32 = 308;

pub fn fn_add(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    evaluator::add_values(arg(args, 0), arg(args, 1))
}

pub fn fn_subtract(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    evaluator::numeric_op(arg(args, 0), arg(args, 1), |a, b| a - b)
}

pub fn fn_multiply(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    evaluator::numeric_op(arg(args, 0), arg(args, 1), |a, b| a * b)
}

pub fn fn_divide(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    evaluator::divide_values(arg(args, 0), arg(args, 1))
}

pub fn fn_mod(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    evaluator::modulo_values(arg(args, 0), arg(args, 1))
}

pub fn fn_abs(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    unary(args, f64::abs)
}

pub fn fn_floor(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    unary(args, f64::floor)
}

pub fn fn_ceil(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    unary(args, f64::ceil)
}

pub fn fn_sign(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    unary(args, |n| {
        if n > 0.0 {
            1.0
        } else if n < 0.0 {
            -1.0
        } else {
            0.0
        }
    })
}

pub fn fn_round(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    let Some(value) = number_arg(args, 0) else {
        return CellValue::Null;
    };
    let decimals = if args.len() > 1 {
        match number_arg(args, 1) {
            Some(d) => d.trunc() as i32,
            None => return CellValue::Null,
        }
    } else {
        0
    };
    round_half_away(value, decimals).map_or(CellValue::Null, CellValue::Number)
}

/// Round half away from zero to `decimals` places
///
/// Goes through the shortest decimal representation of `value` so that `2.345` rounds to
/// `2.35` even though its binary form sits just below the midpoint. Negative `decimals`
/// round to tens, hundreds and so on.
pub fn round_half_away(value: f64, decimals: i32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }

    if decimals < 0 {
        // Every finite f64 is below half of 10^309
        if decimals < -MAX_POWER_OF_TEN {
            return Some(0.0);
        }
        let factor = 10f64.powi(-decimals);
        let rounded = (value / factor).round() * factor;
        return rounded.is_finite().then_some(rounded);
    }

    let dp = decimals.min(MAX_DECIMAL_PLACES);
    if let Ok(d) = Decimal::from_str(&value.to_string()) {
        let rounded = d.round_dp_with_strategy(dp as u32, RoundingStrategy::MidpointAwayFromZero);
        return rounded.to_string().parse().ok();
    }

    // Outside the Decimal range
    let factor = 10f64.powi(dp);
    let rounded = (value * factor).round() / factor;
    Some(if rounded.is_finite() { rounded } else { value })
}

pub fn fn_min(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    numbers(args)
        .reduce(f64::min)
        .map_or(CellValue::Null, CellValue::Number)
}

pub fn fn_max(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    numbers(args)
        .reduce(f64::max)
        .map_or(CellValue::Null, CellValue::Number)
}

pub fn fn_pow(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    evaluator::numeric_op(arg(args, 0), arg(args, 1), f64::powf)
}

pub fn fn_sqrt(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    match number_arg(args, 0) {
        Some(n) if n >= 0.0 => finite(n.sqrt()),
        _ => CellValue::Null,
    }
}

pub fn fn_ln(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    match number_arg(args, 0) {
        Some(n) if n > 0.0 => finite(n.ln()),
        _ => CellValue::Null,
    }
}

pub fn fn_log10(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    match number_arg(args, 0) {
        Some(n) if n > 0.0 => finite(n.log10()),
        _ => CellValue::Null,
    }
}

pub fn fn_exp(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    unary(args, f64::exp)
}

fn unary(args: &[CellValue], f: impl Fn(f64) -> f64) -> CellValue {
    number_arg(args, 0).map_or(CellValue::Null, |n| finite(f(n)))
}

/// Numeric values among the arguments; multi-select items are considered individually and
/// anything non-numeric is skipped
fn numbers(args: &[CellValue]) -> impl Iterator<Item = f64> + '_ {
    args.iter().flat_map(|value| match value {
        CellValue::MultiSelect(items) => items
            .iter()
            .filter_map(|item| item.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .collect::<Vec<_>>(),
        other => other.to_number().into_iter().collect(),
    })
}
