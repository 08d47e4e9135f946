//! End-to-end tests for formula evaluation through the facade

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tabula::prelude::*;
use tabula::{parse_formula, EvaluationOutcome};

fn columns() -> Vec<Column> {
    vec![
        Column::new("c1", "X", ColumnType::Number),
        Column::new("c2", "Score", ColumnType::Number),
        Column::new("c3", "Name", ColumnType::Text),
        Column::new("c4", "Due", ColumnType::Date),
        Column::formula("c5", "Double", "prop(\"X\") * 2"),
    ]
}

fn row() -> Row {
    Row::new("r1")
        .with_cell("c1", 5)
        .with_cell("c3", "World")
        .with_cell("c4", Utc.with_ymd_and_hms(2024, 1, 31, 9, 30, 0).unwrap())
}

fn eval(formula: &str) -> CellValue {
    FormulaEngine::new()
        .evaluate(formula, &row(), &columns())
        .unwrap()
}

#[test]
fn test_parse_is_deterministic() {
    let formula =
        "if(prop(\"Score\") >= 50 and not empty(prop(\"Name\")), round(prop(\"X\") / 3, 2), -1)";
    assert_eq!(parse_formula(formula).unwrap(), parse_formula(formula).unwrap());
}

#[test]
fn test_property_arithmetic() {
    assert_eq!(eval("prop(\"X\") + prop(\"X\")"), CellValue::Number(10.0));
    assert_eq!(eval("prop(\"x\") * -2"), CellValue::Number(-10.0));
}

#[test]
fn test_plus_concatenates_strings() {
    assert_eq!(eval("\"a\" + 1"), CellValue::text("a1"));
    assert_eq!(eval("1 + 2"), CellValue::Number(3.0));
}

#[test]
fn test_division_by_zero_is_null() {
    assert_eq!(eval("1 / 0"), CellValue::Null);
    assert_eq!(eval("10 % 0"), CellValue::Null);
}

#[test]
fn test_if_with_missing_score() {
    let engine = FormulaEngine::new();
    let formula = "if(prop(\"Score\") > 50, \"Pass\", \"Fail\")";

    let passing = row().with_cell("c2", 75);
    assert_eq!(
        engine.evaluate(formula, &passing, &columns()).unwrap(),
        CellValue::text("Pass")
    );
    assert_eq!(
        engine.evaluate(formula, &row(), &columns()).unwrap(),
        CellValue::text("Fail")
    );
}

#[test]
fn test_concat() {
    assert_eq!(
        eval("concat(\"Hello, \", prop(\"Name\"))"),
        CellValue::text("Hello, World")
    );
}

#[test]
fn test_unknown_property_is_an_error() {
    let result = FormulaEngine::new().evaluate("prop(\"DoesNotExist\")", &row(), &columns());
    assert_eq!(
        result,
        Err(FormulaError::UnknownProperty("DoesNotExist".to_string()))
    );

    let outcome =
        FormulaEngine::new().evaluate_with_result("prop(\"DoesNotExist\")", &row(), &columns());
    assert_eq!(outcome.value, CellValue::Null);
    assert!(outcome.error.unwrap().contains("DoesNotExist"));
}

#[test]
fn test_round_half_away_from_zero() {
    assert_eq!(eval("round(2.345, 2)"), CellValue::Number(2.35));
    assert_eq!(eval("round(-2.5, 0)"), CellValue::Number(-3.0));
    assert_eq!(eval("round(2.5)"), CellValue::Number(3.0));
    assert_eq!(eval("round(1234, -2)"), CellValue::Number(1200.0));
}

#[test]
fn test_date_between_months_is_calendar_aware() {
    assert_eq!(
        eval("dateBetween(date(2024, 2, 1), date(2024, 1, 31), \"months\")"),
        CellValue::Number(1.0)
    );
    assert_eq!(
        eval("dateBetween(date(2024, 2, 1), date(2024, 1, 31), \"days\")"),
        CellValue::Number(1.0)
    );
    assert_eq!(
        eval("formatDate(dateAdd(prop(\"Due\"), 1, \"month\"), \"YYYY-MM-DD\")"),
        CellValue::text("2024-02-29")
    );
}

#[test]
fn test_computed_values_are_preferred() {
    let columns = columns();
    let engine = FormulaEngine::new();

    // without a cached value the formula column reads its raw (absent) cell
    assert_eq!(
        engine.evaluate("prop(\"Double\")", &row(), &columns).unwrap(),
        CellValue::Null
    );
    let cached = row().with_computed("c5", 10);
    assert_eq!(
        engine.evaluate("prop(\"Double\") + 1", &cached, &columns).unwrap(),
        CellValue::Number(11.0)
    );
}

#[test]
fn test_ast_cache_parses_once_for_many_rows() {
    let engine = FormulaEngine::new();
    let columns = columns();
    let formula = "prop(\"X\") * 2 + 1";

    for i in 0..1000 {
        let row = Row::new(format!("r{i}")).with_cell("c1", i);
        let value = engine.evaluate(formula, &row, &columns).unwrap();
        assert_eq!(value, CellValue::Number(f64::from(i) * 2.0 + 1.0));
    }
    assert_eq!(engine.parse_count(), 1);
    assert_eq!(engine.cache_len(), 1);

    engine.clear_cache();
    engine.evaluate(formula, &row(), &columns).unwrap();
    assert_eq!(engine.parse_count(), 2);
}

#[test]
fn test_max_depth() {
    let engine = FormulaEngine::with_options(EngineOptions {
        max_depth: 5,
        ..EngineOptions::default()
    });
    let nested = "abs(abs(abs(abs(abs(abs(1))))))";
    assert_eq!(
        engine.evaluate(nested, &row(), &columns()),
        Err(FormulaError::MaxDepthExceeded(5))
    );
    assert_eq!(
        FormulaEngine::new().evaluate(nested, &row(), &columns()),
        Ok(CellValue::Number(1.0))
    );
}

#[test]
fn test_argument_count_is_an_error() {
    let outcome: EvaluationOutcome =
        FormulaEngine::new().evaluate_with_result("abs(1, 2)", &row(), &columns());
    assert!(!outcome.is_ok());
    assert!(matches!(
        FormulaEngine::new().evaluate("abs(1, 2)", &row(), &columns()),
        Err(FormulaError::ArgumentCount { actual: 2, .. })
    ));
}

#[test]
fn test_validate_reports_position() {
    let engine = FormulaEngine::new();
    assert!(engine.validate("1 + (2 * 3)").is_valid);

    let invalid = engine.validate("1 + (2 * 3");
    assert!(!invalid.is_valid);
    assert!(invalid.error.is_some());
    assert!(invalid.position.is_some());
}

#[test]
fn test_custom_function_shadows_builtin() {
    let mut engine = FormulaEngine::new();
    engine.register_function("Double", 1, Some(1), |args: &[CellValue]| {
        args[0]
            .to_number()
            .map_or(CellValue::Null, |n| CellValue::Number(n * 2.0))
    });
    engine.register_function("upper", 1, Some(1), |_: &[CellValue]| CellValue::text("shadowed"));

    assert_eq!(
        engine.evaluate("double(prop(\"X\"))", &row(), &columns()).unwrap(),
        CellValue::Number(10.0)
    );
    assert_eq!(
        engine.evaluate("upper(\"a\")", &row(), &columns()).unwrap(),
        CellValue::text("shadowed")
    );

    assert!(engine.unregister_function("UPPER"));
    assert_eq!(
        engine.evaluate("upper(\"a\")", &row(), &columns()).unwrap(),
        CellValue::text("A")
    );
}

#[test]
fn test_fixed_clock() {
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 18, 45, 0).unwrap();
    let engine = FormulaEngine::new();
    let value = engine
        .evaluate_at("formatDate(today(), \"YYYY-MM-DD HH:mm\")", &row(), &columns(), now)
        .unwrap();
    assert_eq!(value, CellValue::text("2024-03-15 00:00"));
}

#[test]
fn test_deep_nesting_is_rejected() {
    let engine = FormulaEngine::new();
    for formula in [
        format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000)),
        format!("{}1", "-".repeat(10_000)),
    ] {
        assert!(matches!(
            engine.evaluate(&formula, &row(), &columns()),
            Err(FormulaError::Parse(_))
        ));
        assert!(!engine.validate(&formula).is_valid);
    }
    assert_eq!(eval("round(5, -1e10)"), CellValue::Number(0.0));
}
