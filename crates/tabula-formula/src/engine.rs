//! Formula engine
//!
//! The engine owns the parsed-AST cache and any engine-scoped functions. One engine is
//! meant to be shared across all the rows of a table: a formula text is parsed once and the
//! AST is reused for every row.

use crate::ast::FormulaExpr;
use crate::error::{FormulaResult, ParseError};
use crate::evaluator::{self, EvaluationContext, DEFAULT_MAX_DEPTH};
use crate::functions::{self, CustomFunction, CustomFunctions};
use crate::parser::parse_formula;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tabula_core::{CellValue, Column, Row};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Maximum expression nesting during evaluation
    pub max_depth: usize,
    /// Keep parsed ASTs keyed by formula text
    pub cache_enabled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            cache_enabled: true,
        }
    }
}

/// Result of [`FormulaEngine::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Character offset of the syntax error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

/// Result of [`FormulaEngine::evaluate_with_result`]: never an `Err`, the failure is folded
/// into `error` and `value` is null
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub value: CellValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Parses, caches and evaluates formulas
#[derive(Debug)]
pub struct FormulaEngine {
    options: EngineOptions,
    cache: RwLock<AHashMap<String, Arc<FormulaExpr>>>,
    parse_count: AtomicU64,
    custom_functions: CustomFunctions,
}

impl FormulaEngine {
    /// Create an engine with default options
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            options,
            cache: RwLock::new(AHashMap::new()),
            parse_count: AtomicU64::new(0),
            custom_functions: CustomFunctions::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // === Parsing ===

    /// Parse a formula, reusing the cached AST when the same text was parsed before
    pub fn parse(&self, formula: &str) -> Result<Arc<FormulaExpr>, ParseError> {
        if self.options.cache_enabled {
            if let Some(expr) = self.read_cache().get(formula) {
                return Ok(Arc::clone(expr));
            }
        }

        self.parse_count.fetch_add(1, Ordering::Relaxed);
        let expr = match parse_formula(formula) {
            Ok(expr) => Arc::new(expr),
            Err(e) => {
                tracing::debug!("Failed to parse formula {formula:?}: {e}");
                return Err(e);
            }
        };

        if self.options.cache_enabled {
            let mut cache = self.write_cache();
            let cached = Arc::clone(
                cache
                    .entry(formula.to_string())
                    .or_insert_with(|| Arc::clone(&expr)),
            );
            tracing::trace!("Cached AST for {formula:?} ({} entries)", cache.len());
            return Ok(cached);
        }
        Ok(expr)
    }

    /// Check a formula for syntax errors without evaluating it
    pub fn validate(&self, formula: &str) -> Validation {
        match self.parse(formula) {
            Ok(_) => Validation {
                is_valid: true,
                error: None,
                position: None,
            },
            Err(e) => e.into(),
        }
    }

    /// Number of times the parser actually ran (cache misses and uncached parses)
    pub fn parse_count(&self) -> u64 {
        self.parse_count.load(Ordering::Relaxed)
    }

    /// Number of cached ASTs
    pub fn cache_len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn clear_cache(&self) {
        let mut cache = self.write_cache();
        tracing::debug!("Clearing formula cache ({} entries)", cache.len());
        cache.clear();
    }

    // === Evaluation ===

    /// Evaluate `formula` against `row`
    ///
    /// # Example
    /// ```rust
    /// use tabula_core::{CellValue, Column, ColumnType, Row};
    /// use tabula_formula::FormulaEngine;
    ///
    /// let engine = FormulaEngine::new();
    /// let columns = vec![Column::new("c1", "Price", ColumnType::Number)];
    /// let row = Row::new("r1").with_cell("c1", 12.5);
    ///
    /// let value = engine.evaluate("prop(\"Price\") * 2", &row, &columns).unwrap();
    /// assert_eq!(value, CellValue::Number(25.0));
    /// ```
    pub fn evaluate(&self, formula: &str, row: &Row, columns: &[Column]) -> FormulaResult<CellValue> {
        self.evaluate_at(formula, row, columns, Utc::now())
    }

    /// Evaluate with a fixed clock for `now()` and `today()`
    pub fn evaluate_at(
        &self,
        formula: &str,
        row: &Row,
        columns: &[Column],
        now: DateTime<Utc>,
    ) -> FormulaResult<CellValue> {
        let expr = self.parse(formula)?;
        self.evaluate_expr_at(&expr, row, columns, now)
    }

    /// Evaluate an already parsed expression
    pub fn evaluate_expr(
        &self,
        expr: &FormulaExpr,
        row: &Row,
        columns: &[Column],
    ) -> FormulaResult<CellValue> {
        self.evaluate_expr_at(expr, row, columns, Utc::now())
    }

    pub fn evaluate_expr_at(
        &self,
        expr: &FormulaExpr,
        row: &Row,
        columns: &[Column],
        now: DateTime<Utc>,
    ) -> FormulaResult<CellValue> {
        let ctx = EvaluationContext::new(row, columns)
            .with_now(now)
            .with_max_depth(self.options.max_depth)
            .with_custom_functions(&self.custom_functions);
        evaluator::evaluate(expr, &ctx)
    }

    /// Evaluate without failing: errors are logged and reported in the outcome
    pub fn evaluate_with_result(
        &self,
        formula: &str,
        row: &Row,
        columns: &[Column],
    ) -> EvaluationOutcome {
        self.outcome(formula, &row.id, self.evaluate(formula, row, columns))
    }

    /// [`evaluate_with_result`](Self::evaluate_with_result) with a fixed clock
    pub fn evaluate_with_result_at(
        &self,
        formula: &str,
        row: &Row,
        columns: &[Column],
        now: DateTime<Utc>,
    ) -> EvaluationOutcome {
        self.outcome(formula, &row.id, self.evaluate_at(formula, row, columns, now))
    }

    fn outcome(
        &self,
        formula: &str,
        row_id: &str,
        result: FormulaResult<CellValue>,
    ) -> EvaluationOutcome {
        match result {
            Ok(value) => EvaluationOutcome { value, error: None },
            Err(e) => {
                tracing::warn!("Formula {formula:?} failed on row {row_id}: {e}");
                EvaluationOutcome {
                    value: CellValue::Null,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    // === Custom functions ===

    /// Register a function on this engine only
    ///
    /// Custom functions shadow built-ins with the same (case-insensitive) name. Cached ASTs
    /// stay valid since calls are resolved at evaluation time.
    pub fn register_function<F>(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: F,
    ) where
        F: Fn(&[CellValue]) -> CellValue + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if functions::registry().get(&key).is_some() {
            tracing::debug!("Custom function {name} shadows a built-in");
        }
        self.custom_functions.insert(
            key,
            CustomFunction {
                min_args,
                max_args,
                implementation: Arc::new(implementation),
            },
        );
    }

    /// Remove a custom function; returns whether it existed
    pub fn unregister_function(&mut self, name: &str) -> bool {
        self.custom_functions.remove(&name.to_lowercase()).is_some()
    }

    /// Whether `name` resolves to a custom or built-in function
    pub fn has_function(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        self.custom_functions.contains_key(&key) || functions::registry().get(&key).is_some()
    }

    // === Helpers ===

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, AHashMap<String, Arc<FormulaExpr>>> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, AHashMap<String, Arc<FormulaExpr>>> {
        self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ParseError> for Validation {
    fn from(e: ParseError) -> Self {
        Validation {
            is_valid: false,
            error: Some(e.to_string()),
            position: Some(e.position),
        }
    }
}
