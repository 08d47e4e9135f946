//! Logical and comparison functions

use super::arg;
use crate::evaluator::{self, EvaluationContext};
use std::cmp::Ordering;
use tabula_core::CellValue;

/// `if(cond, then, else?)`
///
/// Both branches have already been evaluated by the time this runs; use the `? :` operator
/// when only the taken branch should be evaluated.
pub fn fn_if(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    if arg(args, 0).to_boolean() {
        arg(args, 1).clone()
    } else {
        arg(args, 2).clone()
    }
}

pub fn fn_and(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Boolean(args.iter().all(CellValue::to_boolean))
}

pub fn fn_or(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Boolean(args.iter().any(CellValue::to_boolean))
}

pub fn fn_not(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Boolean(!arg(args, 0).to_boolean())
}

pub fn fn_empty(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Boolean(arg(args, 0).is_empty())
}

/// First argument that is not null
pub fn fn_coalesce(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    args.iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(CellValue::Null)
}

pub fn fn_equal(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Boolean(evaluator::values_equal(arg(args, 0), arg(args, 1)))
}

pub fn fn_unequal(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    CellValue::Boolean(!evaluator::values_equal(arg(args, 0), arg(args, 1)))
}

pub fn fn_larger(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    compare(args, Ordering::is_gt)
}

pub fn fn_smaller(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    compare(args, Ordering::is_lt)
}

pub fn fn_larger_eq(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    compare(args, Ordering::is_ge)
}

pub fn fn_smaller_eq(args: &[CellValue], _ctx: &EvaluationContext) -> CellValue {
    compare(args, Ordering::is_le)
}

fn compare(args: &[CellValue], pred: fn(Ordering) -> bool) -> CellValue {
    CellValue::Boolean(evaluator::compare_values(arg(args, 0), arg(args, 1)).map_or(false, pred))
}
