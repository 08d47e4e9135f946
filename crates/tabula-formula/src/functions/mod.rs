//! Built-in formula functions
//!
//! Functions never fail on bad argument values: anything that cannot be coerced resolves to
//! null. Only the argument count is enforced, by the evaluator, before the call.

pub mod date;
pub mod logical;
pub mod math;
pub mod text;

use crate::evaluator::EvaluationContext;
use ahash::AHashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tabula_core::CellValue;

/// Function implementation signature
///
/// Functions can consult the evaluation context (e.g. the evaluation clock for `now()`).
pub type FunctionImpl = fn(&[CellValue], &EvaluationContext) -> CellValue;

/// Implementation of a function registered on a single engine instance
pub type CustomFunctionImpl = Arc<dyn Fn(&[CellValue]) -> CellValue + Send + Sync>;

/// Function definition
#[derive(Debug, Clone, Copy)]
pub struct FunctionDef {
    /// Function name as documented (e.g. `replaceFirst`)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

/// User-supplied function, scoped to one engine
#[derive(Clone)]
pub struct CustomFunction {
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub implementation: CustomFunctionImpl,
}

impl fmt::Debug for CustomFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFunction")
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

/// Custom functions keyed by lowercase name
pub type CustomFunctions = AHashMap<String, CustomFunction>;

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_text_functions();
        registry.register_logical_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_lowercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_lowercase(), def);
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Documented names of all functions, sorted case-insensitively
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.functions.values().map(|d| d.name).collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }

    fn add(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
        });
    }

    fn register_math_functions(&mut self) {
        self.add("add", 2, Some(2), math::fn_add);
        self.add("subtract", 2, Some(2), math::fn_subtract);
        self.add("multiply", 2, Some(2), math::fn_multiply);
        self.add("divide", 2, Some(2), math::fn_divide);
        self.add("mod", 2, Some(2), math::fn_mod);
        self.add("abs", 1, Some(1), math::fn_abs);
        self.add("round", 1, Some(2), math::fn_round);
        self.add("floor", 1, Some(1), math::fn_floor);
        self.add("ceil", 1, Some(1), math::fn_ceil);
        self.add("min", 1, None, math::fn_min);
        self.add("max", 1, None, math::fn_max);
        self.add("pow", 2, Some(2), math::fn_pow);
        self.add("sqrt", 1, Some(1), math::fn_sqrt);
        self.add("sign", 1, Some(1), math::fn_sign);
        self.add("ln", 1, Some(1), math::fn_ln);
        self.add("log10", 1, Some(1), math::fn_log10);
        self.add("exp", 1, Some(1), math::fn_exp);
    }

    fn register_text_functions(&mut self) {
        self.add("concat", 1, None, text::fn_concat);
        self.add("length", 1, Some(1), text::fn_length);
        self.add("contains", 2, Some(2), text::fn_contains);
        self.add("replace", 3, Some(3), text::fn_replace);
        self.add("replaceFirst", 3, Some(3), text::fn_replace_first);
        self.add("lower", 1, Some(1), text::fn_lower);
        self.add("upper", 1, Some(1), text::fn_upper);
        self.add("trim", 1, Some(1), text::fn_trim);
        self.add("slice", 2, Some(3), text::fn_slice);
        self.add("split", 2, Some(2), text::fn_split);
        self.add("startsWith", 2, Some(2), text::fn_starts_with);
        self.add("endsWith", 2, Some(2), text::fn_ends_with);
        self.add("indexOf", 2, Some(2), text::fn_index_of);
        self.add("repeat", 2, Some(2), text::fn_repeat);
        self.add("padStart", 2, Some(3), text::fn_pad_start);
        self.add("padEnd", 2, Some(3), text::fn_pad_end);
        self.add("format", 1, None, text::fn_format);
        self.add("toNumber", 1, Some(1), text::fn_to_number);
    }

    fn register_logical_functions(&mut self) {
        self.add("if", 2, Some(3), logical::fn_if);
        self.add("and", 1, None, logical::fn_and);
        self.add("or", 1, None, logical::fn_or);
        self.add("not", 1, Some(1), logical::fn_not);
        self.add("empty", 1, Some(1), logical::fn_empty);
        self.add("coalesce", 1, None, logical::fn_coalesce);
        self.add("equal", 2, Some(2), logical::fn_equal);
        self.add("unequal", 2, Some(2), logical::fn_unequal);
        self.add("larger", 2, Some(2), logical::fn_larger);
        self.add("smaller", 2, Some(2), logical::fn_smaller);
        self.add("largerEq", 2, Some(2), logical::fn_larger_eq);
        self.add("smallerEq", 2, Some(2), logical::fn_smaller_eq);
    }

    fn register_date_functions(&mut self) {
        self.add("now", 0, Some(0), date::fn_now);
        self.add("today", 0, Some(0), date::fn_today);
        self.add("dateAdd", 3, Some(3), date::fn_date_add);
        self.add("dateSubtract", 3, Some(3), date::fn_date_subtract);
        self.add("dateBetween", 3, Some(3), date::fn_date_between);
        self.add("formatDate", 1, Some(2), date::fn_format_date);
        self.add("year", 1, Some(1), date::fn_year);
        self.add("month", 1, Some(1), date::fn_month);
        self.add("day", 1, Some(1), date::fn_day);
        self.add("dayOfWeek", 1, Some(1), date::fn_day_of_week);
        self.add("hour", 1, Some(1), date::fn_hour);
        self.add("minute", 1, Some(1), date::fn_minute);
        self.add("second", 1, Some(1), date::fn_second);
        self.add("timestamp", 1, Some(1), date::fn_timestamp);
        self.add("date", 1, Some(6), date::fn_date);
        self.add("parseDate", 1, Some(1), date::fn_parse_date);
        self.add("startOf", 2, Some(2), date::fn_start_of);
        self.add("endOf", 2, Some(2), date::fn_end_of);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The built-in function table
pub fn registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Documented names of all built-in functions
pub fn builtin_names() -> Vec<&'static str> {
    registry().names()
}

static NULL: CellValue = CellValue::Null;

/// Argument at `index`, null when missing
pub(crate) fn arg(args: &[CellValue], index: usize) -> &CellValue {
    args.get(index).unwrap_or(&NULL)
}

/// Argument at `index` coerced to a number
pub(crate) fn number_arg(args: &[CellValue], index: usize) -> Option<f64> {
    arg(args, index).to_number()
}

/// Wrap a numeric result, mapping NaN/infinity to null
pub(crate) fn finite(n: f64) -> CellValue {
    if n.is_finite() {
        CellValue::Number(n)
    } else {
        CellValue::Null
    }
}

/// Invoke a built-in directly against an empty row
#[cfg(test)]
pub(crate) fn call(f: FunctionImpl, args: &[CellValue]) -> CellValue {
    let row = tabula_core::Row::new("test");
    let ctx = EvaluationContext::new(&row, &[]);
    f(args, &ctx)
}
