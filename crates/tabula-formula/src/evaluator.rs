//! Formula evaluator
//!
//! Walks an AST against one row. Value-level problems (bad coercions, division by zero,
//! invalid dates) produce null; only unknown properties, unknown functions, wrong argument
//! counts and runaway nesting are errors.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{self, CustomFunctions};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tabula_core::{CellValue, Column, Row};

/// Default nesting limit for evaluation
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Everything an expression can see while it is being evaluated
pub struct EvaluationContext<'a> {
    row: &'a Row,
    columns_by_name: AHashMap<String, &'a Column>,
    columns_by_id: AHashMap<&'a str, &'a Column>,
    now: DateTime<Utc>,
    max_depth: usize,
    custom_functions: Option<&'a CustomFunctions>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context for `row` with the table's columns
    ///
    /// Column names are matched case-insensitively; on a clash the first column wins.
    pub fn new(row: &'a Row, columns: &'a [Column]) -> Self {
        let mut columns_by_name = AHashMap::with_capacity(columns.len());
        let mut columns_by_id = AHashMap::with_capacity(columns.len());
        for column in columns {
            columns_by_name
                .entry(column.name.to_lowercase())
                .or_insert(column);
            columns_by_id.entry(column.id.as_str()).or_insert(column);
        }

        Self {
            row,
            columns_by_name,
            columns_by_id,
            now: Utc::now(),
            max_depth: DEFAULT_MAX_DEPTH,
            custom_functions: None,
        }
    }

    /// Pin the instant `now()` and `today()` observe
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Make engine-scoped functions callable; they shadow built-ins of the same name
    pub fn with_custom_functions(mut self, functions: &'a CustomFunctions) -> Self {
        self.custom_functions = Some(functions);
        self
    }

    pub fn row(&self) -> &'a Row {
        self.row
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve a column by display name (case-insensitive), falling back to its id
    pub fn column(&self, name: &str) -> Option<&'a Column> {
        self.columns_by_name
            .get(&name.to_lowercase())
            .copied()
            .or_else(|| self.column_by_id(name))
    }

    /// Resolve a column by its exact id
    pub fn column_by_id(&self, id: &str) -> Option<&'a Column> {
        self.columns_by_id.get(id).copied()
    }

    fn property(&self, name: &str) -> FormulaResult<CellValue> {
        let column = self
            .column(name)
            .ok_or_else(|| FormulaError::UnknownProperty(name.to_string()))?;
        Ok(self.row.value_for(column).clone())
    }
}

/// Evaluate an expression against a context
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<CellValue> {
    eval_node(expr, ctx, 1)
}

fn eval_node(expr: &FormulaExpr, ctx: &EvaluationContext, depth: usize) -> FormulaResult<CellValue> {
    if depth > ctx.max_depth {
        return Err(FormulaError::MaxDepthExceeded(ctx.max_depth));
    }

    match expr {
        FormulaExpr::Number(n) => Ok(CellValue::Number(*n)),
        FormulaExpr::String(s) => Ok(CellValue::Text(s.clone())),
        FormulaExpr::Boolean(b) => Ok(CellValue::Boolean(*b)),
        FormulaExpr::Property(name) => ctx.property(name),

        FormulaExpr::Binary { op, left, right } => {
            let left = eval_node(left, ctx, depth + 1)?;
            let right = eval_node(right, ctx, depth + 1)?;
            Ok(binary_op(*op, &left, &right))
        }

        FormulaExpr::Unary { op, operand } => {
            let value = eval_node(operand, ctx, depth + 1)?;
            Ok(unary_op(*op, &value))
        }

        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx, depth),

        FormulaExpr::Conditional {
            condition,
            consequent,
            alternate,
        } => {
            // Only the taken branch is evaluated
            if eval_node(condition, ctx, depth + 1)?.to_boolean() {
                eval_node(consequent, ctx, depth + 1)
            } else {
                eval_node(alternate, ctx, depth + 1)
            }
        }
    }
}

fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
    depth: usize,
) -> FormulaResult<CellValue> {
    let key = name.to_lowercase();

    if let Some(custom) = ctx.custom_functions.and_then(|f| f.get(&key)) {
        check_arity(name, custom.min_args, custom.max_args, args.len())?;
        let values = evaluate_args(args, ctx, depth)?;
        return Ok((custom.implementation)(&values));
    }

    let def = functions::registry()
        .get(&key)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
    check_arity(def.name, def.min_args, def.max_args, args.len())?;
    let values = evaluate_args(args, ctx, depth)?;
    Ok((def.implementation)(&values, ctx))
}

fn evaluate_args(
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
    depth: usize,
) -> FormulaResult<Vec<CellValue>> {
    args.iter()
        .map(|arg| eval_node(arg, ctx, depth + 1))
        .collect()
}

fn check_arity(
    function: &str,
    min_args: usize,
    max_args: Option<usize>,
    actual: usize,
) -> FormulaResult<()> {
    let too_few = actual < min_args;
    let too_many = max_args.map_or(false, |max| actual > max);
    if !too_few && !too_many {
        return Ok(());
    }

    let expected = match max_args {
        Some(max) if max == min_args => min_args.to_string(),
        Some(max) => format!("{} to {}", min_args, max),
        None => format!("at least {}", min_args),
    };
    Err(FormulaError::ArgumentCount {
        function: function.to_string(),
        expected,
        actual,
    })
}

// === Operators ===

fn binary_op(op: BinaryOperator, left: &CellValue, right: &CellValue) -> CellValue {
    match op {
        BinaryOperator::Add => add_values(left, right),
        BinaryOperator::Subtract => numeric_op(left, right, |a, b| a - b),
        BinaryOperator::Multiply => numeric_op(left, right, |a, b| a * b),
        BinaryOperator::Divide => divide_values(left, right),
        BinaryOperator::Modulo => modulo_values(left, right),
        BinaryOperator::Equal => CellValue::Boolean(values_equal(left, right)),
        BinaryOperator::NotEqual => CellValue::Boolean(!values_equal(left, right)),
        BinaryOperator::LessThan => compare_with(left, right, Ordering::is_lt),
        BinaryOperator::LessEqual => compare_with(left, right, Ordering::is_le),
        BinaryOperator::GreaterThan => compare_with(left, right, Ordering::is_gt),
        BinaryOperator::GreaterEqual => compare_with(left, right, Ordering::is_ge),
        BinaryOperator::And => CellValue::Boolean(left.to_boolean() && right.to_boolean()),
        BinaryOperator::Or => CellValue::Boolean(left.to_boolean() || right.to_boolean()),
    }
}

fn unary_op(op: UnaryOperator, value: &CellValue) -> CellValue {
    match op {
        UnaryOperator::Not => CellValue::Boolean(!value.to_boolean()),
        UnaryOperator::Negate => value
            .to_number()
            .map_or(CellValue::Null, |n| CellValue::Number(-n)),
        UnaryOperator::Plus => value.to_number().map_or(CellValue::Null, CellValue::Number),
    }
}

fn compare_with(left: &CellValue, right: &CellValue, pred: fn(Ordering) -> bool) -> CellValue {
    CellValue::Boolean(compare_values(left, right).map_or(false, pred))
}

/// `+`: concatenation when either side is text, numeric addition otherwise
pub fn add_values(left: &CellValue, right: &CellValue) -> CellValue {
    if matches!(left, CellValue::Text(_)) || matches!(right, CellValue::Text(_)) {
        let mut s = left.to_text();
        s.push_str(&right.to_text());
        return CellValue::Text(s);
    }
    numeric_op(left, right, |a, b| a + b)
}

/// Apply `f` to both operands as numbers; null when either is not numeric or the result
/// is not finite
pub fn numeric_op(left: &CellValue, right: &CellValue, f: impl Fn(f64, f64) -> f64) -> CellValue {
    match (left.to_number(), right.to_number()) {
        (Some(a), Some(b)) => functions::finite(f(a, b)),
        _ => CellValue::Null,
    }
}

/// Division; null on a zero divisor
pub fn divide_values(left: &CellValue, right: &CellValue) -> CellValue {
    match right.to_number() {
        Some(b) if b == 0.0 => CellValue::Null,
        _ => numeric_op(left, right, |a, b| a / b),
    }
}

/// Remainder (sign follows the dividend); null on a zero divisor
pub fn modulo_values(left: &CellValue, right: &CellValue) -> CellValue {
    match right.to_number() {
        Some(b) if b == 0.0 => CellValue::Null,
        _ => numeric_op(left, right, |a, b| a % b),
    }
}

/// Loose equality shared by `==`, `!=`, `equal()` and `unequal()`
///
/// Null equals only null. A date compares against anything coercible to a date and a
/// number against a boolean (as 0/1); other pairs must match exactly.
pub fn values_equal(left: &CellValue, right: &CellValue) -> bool {
    match (left, right) {
        (CellValue::Null, CellValue::Null) => true,
        (CellValue::Null, _) | (_, CellValue::Null) => false,
        (CellValue::Date(a), other) | (other, CellValue::Date(a)) => {
            other.to_date().map_or(false, |b| *a == b)
        }
        (CellValue::Number(n), CellValue::Boolean(b))
        | (CellValue::Boolean(b), CellValue::Number(n)) => *n == if *b { 1.0 } else { 0.0 },
        _ => left == right,
    }
}

/// Ordering used by the relational operators
///
/// Dates compare chronologically when either side is a date; everything else compares
/// numerically. `None` when the operands cannot be ordered.
pub fn compare_values(left: &CellValue, right: &CellValue) -> Option<Ordering> {
    if matches!(left, CellValue::Date(_)) || matches!(right, CellValue::Date(_)) {
        let (a, b) = (left.to_date()?, right.to_date()?);
        return Some(a.cmp(&b));
    }
    let (a, b) = (left.to_number()?, right.to_number()?);
    a.partial_cmp(&b)
}
