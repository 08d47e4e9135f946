//! Value extraction and aggregation dispatch

use crate::result::RollupResult;
use ahash::AHashSet;
use tabula_core::date::{timestamp_ms, to_iso_string};
use tabula_core::value::format_number;
use tabula_core::{CellValue, Column, ColumnType, RollupConfig, RollupFunction, Row};

/// Values pulled out of the related rows for one target column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// Number of related rows
    pub row_count: usize,
    /// One entry per row, or per option for multi-select targets
    pub values: Vec<CellValue>,
}

impl Extracted {
    pub fn non_empty(&self) -> impl Iterator<Item = &CellValue> {
        self.values.iter().filter(|v| !v.is_empty())
    }

    pub fn non_empty_count(&self) -> usize {
        self.non_empty().count()
    }

    pub fn empty_count(&self) -> usize {
        self.values.len() - self.non_empty_count()
    }
}

/// Read the target column from every related row
///
/// Multi-select targets are flattened into one text entry per option; a row with no
/// options contributes a single null so it still counts as empty. Formula and rollup
/// targets read the row's computed value when one is present.
pub fn extract_values<'a, I>(rows: I, target: &Column) -> Extracted
where
    I: IntoIterator<Item = &'a Row>,
{
    let flatten = target.column_type == ColumnType::MultiSelect;
    let mut extracted = Extracted::default();

    for row in rows {
        extracted.row_count += 1;
        let value = row.value_for(target);
        match value {
            CellValue::MultiSelect(items) if flatten => {
                if items.is_empty() {
                    extracted.values.push(CellValue::Null);
                } else {
                    extracted
                        .values
                        .extend(items.iter().map(|item| CellValue::Text(item.clone())));
                }
            }
            other => extracted.values.push(other.clone()),
        }
    }
    extracted
}

/// Aggregate the target column of `rows` as configured
pub fn calculate<'a, I>(config: &RollupConfig, rows: I, target: &Column) -> RollupResult
where
    I: IntoIterator<Item = &'a Row>,
{
    let extracted = extract_values(rows, target);
    tracing::trace!(
        "Rollup {} over {} rows ({} values) of column {}",
        config.function,
        extracted.row_count,
        extracted.values.len(),
        target.id
    );
    aggregate(config.function, &extracted, target.column_type.is_date())
}

fn aggregate(function: RollupFunction, extracted: &Extracted, date_target: bool) -> RollupResult {
    match function {
        RollupFunction::Count => count(extracted.row_count),
        RollupFunction::CountValues | RollupFunction::CountNotEmpty => {
            count(extracted.non_empty_count())
        }
        RollupFunction::CountEmpty => count(extracted.empty_count()),
        RollupFunction::CountUnique => {
            let keys: AHashSet<String> = extracted.values.iter().map(unique_key).collect();
            count(keys.len())
        }

        RollupFunction::Sum => RollupResult::Number(numbers(extracted, false).sum()),
        RollupFunction::Average => {
            let (total, n) = numbers(extracted, false).fold((0.0, 0usize), |(t, n), v| (t + v, n + 1));
            if n == 0 {
                RollupResult::Null
            } else {
                RollupResult::Number(total / n as f64)
            }
        }
        RollupFunction::Min => numbers(extracted, date_target)
            .reduce(f64::min)
            .map_or(RollupResult::Null, RollupResult::Number),
        RollupFunction::Max => numbers(extracted, date_target)
            .reduce(f64::max)
            .map_or(RollupResult::Null, RollupResult::Number),

        RollupFunction::PercentEmpty => percent(extracted.empty_count(), extracted.values.len()),
        RollupFunction::PercentNotEmpty => {
            percent(extracted.non_empty_count(), extracted.values.len())
        }

        RollupFunction::ShowOriginal => {
            RollupResult::Values(extracted.non_empty().cloned().collect())
        }
        RollupFunction::ShowUnique => {
            let mut seen = AHashSet::new();
            let values = extracted
                .non_empty()
                .filter(|v| seen.insert(unique_key(v)))
                .cloned()
                .collect();
            RollupResult::Values(values)
        }
    }
}

fn count(n: usize) -> RollupResult {
    RollupResult::Number(n as f64)
}

fn percent(part: usize, total: usize) -> RollupResult {
    if total == 0 {
        return RollupResult::Number(0.0);
    }
    RollupResult::Number(part as f64 / total as f64 * 100.0)
}

/// Numeric view of the values; dates compare by epoch milliseconds when `as_dates` is set
fn numbers(extracted: &Extracted, as_dates: bool) -> impl Iterator<Item = f64> + '_ {
    extracted.values.iter().filter_map(move |v| {
        if as_dates {
            v.to_date().map(|d| timestamp_ms(&d))
        } else {
            v.to_number()
        }
    })
}

/// Canonical form used to decide whether two values are the same for `countUnique` and
/// `showUnique`
///
/// The kind prefix keeps `1` and `"1"` apart.
pub fn unique_key(value: &CellValue) -> String {
    match value {
        CellValue::Null => "\u{0}null".to_string(),
        CellValue::Text(s) => format!("s:{s}"),
        CellValue::Number(n) => format!("n:{}", format_number(*n)),
        CellValue::Boolean(b) => format!("b:{b}"),
        CellValue::Date(d) => format!("d:{}", to_iso_string(d)),
        CellValue::MultiSelect(_) | CellValue::References(_) => {
            format!("j:{}", serde_json::to_string(value).unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tabula_core::Reference;

    fn config(function: RollupFunction) -> RollupConfig {
        RollupConfig {
            relation_column_id: "rel".into(),
            target_column_id: "t".into(),
            function,
        }
    }

    fn number_column() -> Column {
        Column::new("t", "Amount", ColumnType::Number)
    }

    fn rows_with(values: Vec<CellValue>) -> Vec<Row> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let row = Row::new(format!("r{i}"));
                if v.is_null() {
                    row
                } else {
                    row.with_cell("t", v)
                }
            })
            .collect()
    }

    fn run(function: RollupFunction, rows: &[Row], target: &Column) -> RollupResult {
        calculate(&config(function), rows, target)
    }

    #[test]
    fn test_empty_relation() {
        let col = number_column();
        assert_eq!(run(RollupFunction::Count, &[], &col), RollupResult::Number(0.0));
        assert_eq!(run(RollupFunction::Sum, &[], &col), RollupResult::Number(0.0));
        assert_eq!(run(RollupFunction::Average, &[], &col), RollupResult::Null);
        assert_eq!(run(RollupFunction::Min, &[], &col), RollupResult::Null);
        assert_eq!(run(RollupFunction::Max, &[], &col), RollupResult::Null);
        assert_eq!(run(RollupFunction::PercentEmpty, &[], &col), RollupResult::Number(0.0));
        assert_eq!(run(RollupFunction::ShowOriginal, &[], &col), RollupResult::Values(vec![]));
    }

    #[test]
    fn test_counting() {
        let col = number_column();
        let rows = rows_with(vec![
            CellValue::Number(1.0),
            CellValue::Null,
            CellValue::text("  "),
            CellValue::Number(2.0),
        ]);
        assert_eq!(run(RollupFunction::Count, &rows, &col), RollupResult::Number(4.0));
        assert_eq!(run(RollupFunction::CountValues, &rows, &col), RollupResult::Number(2.0));
        assert_eq!(run(RollupFunction::CountNotEmpty, &rows, &col), RollupResult::Number(2.0));
        assert_eq!(run(RollupFunction::CountEmpty, &rows, &col), RollupResult::Number(2.0));
    }

    #[test]
    fn test_count_unique_keeps_kinds_apart() {
        let col = number_column();
        let rows = rows_with(vec![
            CellValue::Number(1.0),
            CellValue::text("1"),
            CellValue::Number(1.0),
        ]);
        assert_eq!(run(RollupFunction::CountUnique, &rows, &col), RollupResult::Number(2.0));
    }

    #[test]
    fn test_count_unique_counts_null_once() {
        let col = number_column();
        let rows = rows_with(vec![CellValue::Null, CellValue::Null, CellValue::Number(3.0)]);
        assert_eq!(run(RollupFunction::CountUnique, &rows, &col), RollupResult::Number(2.0));
    }

    #[test]
    fn test_numeric_aggregations_skip_non_numeric() {
        let col = number_column();
        let rows = rows_with(vec![
            CellValue::Number(4.0),
            CellValue::text("6"),
            CellValue::text("n/a"),
            CellValue::Null,
            CellValue::Boolean(true),
        ]);
        assert_eq!(run(RollupFunction::Sum, &rows, &col), RollupResult::Number(11.0));
        assert_eq!(
            run(RollupFunction::Average, &rows, &col),
            RollupResult::Number(11.0 / 3.0)
        );
        assert_eq!(run(RollupFunction::Min, &rows, &col), RollupResult::Number(1.0));
        assert_eq!(run(RollupFunction::Max, &rows, &col), RollupResult::Number(6.0));

        let rows = rows_with(vec![CellValue::text("x")]);
        assert_eq!(run(RollupFunction::Sum, &rows, &col), RollupResult::Number(0.0));
        assert_eq!(run(RollupFunction::Average, &rows, &col), RollupResult::Null);
    }

    #[test]
    fn test_percentages() {
        let col = number_column();
        let rows = rows_with(vec![
            CellValue::Number(1.0),
            CellValue::Null,
            CellValue::Number(2.0),
            CellValue::Number(3.0),
        ]);
        assert_eq!(run(RollupFunction::PercentEmpty, &rows, &col), RollupResult::Number(25.0));
        assert_eq!(
            run(RollupFunction::PercentNotEmpty, &rows, &col),
            RollupResult::Number(75.0)
        );
    }

    #[test]
    fn test_date_min_max() {
        let col = Column::new("t", "Due", ColumnType::Date);
        let early = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let rows = rows_with(vec![
            CellValue::Date(late),
            CellValue::text("2024-01-05"),
            CellValue::text("someday"),
        ]);
        assert_eq!(
            run(RollupFunction::Min, &rows, &col),
            RollupResult::Number(timestamp_ms(&early))
        );
        assert_eq!(
            run(RollupFunction::Max, &rows, &col),
            RollupResult::Number(timestamp_ms(&late))
        );
    }

    #[test]
    fn test_multi_select_flattening() {
        let col = Column::new("t", "Tags", ColumnType::MultiSelect);
        let rows = rows_with(vec![
            CellValue::MultiSelect(vec!["a".into(), "b".into()]),
            CellValue::MultiSelect(vec![]),
            CellValue::MultiSelect(vec!["b".into(), "c".into()]),
            CellValue::Null,
        ]);

        let extracted = extract_values(&rows, &col);
        assert_eq!(extracted.row_count, 4);
        assert_eq!(extracted.values.len(), 6);

        assert_eq!(run(RollupFunction::Count, &rows, &col), RollupResult::Number(4.0));
        assert_eq!(run(RollupFunction::CountValues, &rows, &col), RollupResult::Number(4.0));
        assert_eq!(run(RollupFunction::CountEmpty, &rows, &col), RollupResult::Number(2.0));
        assert_eq!(
            run(RollupFunction::ShowUnique, &rows, &col),
            RollupResult::Values(vec![
                CellValue::text("a"),
                CellValue::text("b"),
                CellValue::text("c"),
            ])
        );
        let pct = run(RollupFunction::PercentEmpty, &rows, &col).as_number().unwrap();
        assert!((pct - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_show_original_and_unique() {
        let col = Column::new("t", "Name", ColumnType::Text);
        let rows = rows_with(vec![
            CellValue::text("x"),
            CellValue::Null,
            CellValue::text("y"),
            CellValue::text("x"),
        ]);
        assert_eq!(
            run(RollupFunction::ShowOriginal, &rows, &col),
            RollupResult::Values(vec![
                CellValue::text("x"),
                CellValue::text("y"),
                CellValue::text("x"),
            ])
        );
        assert_eq!(
            run(RollupFunction::ShowUnique, &rows, &col),
            RollupResult::Values(vec![CellValue::text("x"), CellValue::text("y")])
        );
    }

    #[test]
    fn test_derived_target_prefers_computed() {
        let col = Column::formula("t", "Total", "1");
        let rows = vec![
            Row::new("a").with_cell("t", 100).with_computed("t", 1),
            Row::new("b").with_computed("t", 2),
        ];
        assert_eq!(run(RollupFunction::Sum, &rows, &col), RollupResult::Number(3.0));
    }

    #[test]
    fn test_unique_key() {
        assert_ne!(unique_key(&CellValue::Number(1.0)), unique_key(&CellValue::text("1")));
        assert_eq!(unique_key(&CellValue::Number(-0.0)), unique_key(&CellValue::Number(0.0)));
        assert_eq!(
            unique_key(&CellValue::References(vec![Reference::relation("r1")])),
            unique_key(&CellValue::References(vec![Reference::relation("r1")]))
        );
    }

    #[test]
    fn test_every_function_is_total() {
        let col = number_column();
        let rows = rows_with(vec![CellValue::Number(1.0), CellValue::text("a")]);
        for function in RollupFunction::ALL {
            let _ = run(function, &rows, &col);
        }
    }
}
