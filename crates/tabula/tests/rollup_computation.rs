//! End-to-end tests for rollups and row computation

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tabula::prelude::*;
use tabula::tabula_rollup::calculate;

fn config(function: RollupFunction) -> RollupConfig {
    RollupConfig {
        relation_column_id: "tasks".to_string(),
        target_column_id: "value".to_string(),
        function,
    }
}

fn target(column_type: ColumnType) -> Column {
    Column::new("value", "Value", column_type)
}

fn rows(values: Vec<CellValue>) -> Vec<Row> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| Row::new(format!("t{i}")).with_cell("value", v))
        .collect()
}

#[test]
fn test_empty_related_rows() {
    let number = target(ColumnType::Number);
    let none: Vec<Row> = Vec::new();

    assert_eq!(
        calculate(&config(RollupFunction::Count), &none, &number),
        RollupResult::Number(0.0)
    );
    assert_eq!(
        calculate(&config(RollupFunction::Sum), &none, &number),
        RollupResult::Number(0.0)
    );
    assert_eq!(
        calculate(&config(RollupFunction::Average), &none, &number),
        RollupResult::Null
    );
    assert_eq!(
        calculate(&config(RollupFunction::PercentEmpty), &none, &number),
        RollupResult::Number(0.0)
    );
}

#[test]
fn test_count_unique_keeps_numbers_and_text_apart() {
    let related = rows(vec![
        CellValue::Number(1.0),
        CellValue::text("1"),
        CellValue::Number(1.0),
    ]);
    assert_eq!(
        calculate(
            &config(RollupFunction::CountUnique),
            &related,
            &target(ColumnType::Number)
        ),
        RollupResult::Number(2.0)
    );
}

#[test]
fn test_numeric_rollups_skip_non_numbers() {
    let related = rows(vec![
        CellValue::Number(4.0),
        CellValue::text("n/a"),
        CellValue::text(" 8 "),
        CellValue::Null,
    ]);
    let number = target(ColumnType::Number);

    assert_eq!(
        calculate(&config(RollupFunction::Sum), &related, &number),
        RollupResult::Number(12.0)
    );
    assert_eq!(
        calculate(&config(RollupFunction::Average), &related, &number),
        RollupResult::Number(6.0)
    );
    assert_eq!(
        calculate(&config(RollupFunction::CountEmpty), &related, &number),
        RollupResult::Number(1.0)
    );
    assert_eq!(
        calculate(&config(RollupFunction::PercentNotEmpty), &related, &number),
        RollupResult::Number(75.0)
    );
}

#[test]
fn test_date_min_max() {
    let early = Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let related = rows(vec![CellValue::Date(late), CellValue::Date(early)]);
    let date = target(ColumnType::Date);

    assert_eq!(
        calculate(&config(RollupFunction::Min), &related, &date),
        RollupResult::Number(early.timestamp_millis() as f64)
    );
    assert_eq!(
        calculate(&config(RollupFunction::Max), &related, &date),
        RollupResult::Number(late.timestamp_millis() as f64)
    );
}

#[test]
fn test_multi_select_is_flattened() {
    let related = rows(vec![
        CellValue::MultiSelect(vec!["red".into(), "blue".into()]),
        CellValue::MultiSelect(vec!["red".into()]),
        CellValue::MultiSelect(Vec::new()),
    ]);
    let tags = target(ColumnType::MultiSelect);

    assert_eq!(
        calculate(&config(RollupFunction::Count), &related, &tags),
        RollupResult::Number(3.0)
    );
    assert_eq!(
        calculate(&config(RollupFunction::CountValues), &related, &tags),
        RollupResult::Number(3.0)
    );
    assert_eq!(
        calculate(&config(RollupFunction::ShowUnique), &related, &tags),
        RollupResult::Values(vec![CellValue::text("red"), CellValue::text("blue")])
    );
}

#[test]
fn test_row_computer_end_to_end() {
    let tasks = Table::new(
        "tasks",
        vec![
            Column::new("value", "Hours", ColumnType::Number),
            Column::new("status", "Status", ColumnType::Select),
        ],
        vec![
            Row::new("t1").with_cell("value", 2).with_cell("status", "done"),
            Row::new("t2").with_cell("value", 6),
            Row::new("t3").with_cell("value", 4).with_cell("status", "done"),
        ],
    );
    let columns = vec![
        Column::new("tasks", "Tasks", ColumnType::Relation).with_config(ColumnConfig::Relation(
            RelationConfig {
                target_table_id: Some("tasks".to_string()),
            },
        )),
        Column::rollup("hours", "Hours", config(RollupFunction::Sum)),
        Column::rollup(
            "done",
            "Done",
            RollupConfig {
                relation_column_id: "tasks".to_string(),
                target_column_id: "status".to_string(),
                function: RollupFunction::PercentNotEmpty,
            },
        ),
        Column::formula(
            "summary",
            "Summary",
            "format(\"{0}h, {1}% done\", prop(\"Hours\"), round(prop(\"Done\")))",
        ),
    ];
    let mut projects = vec![
        Row::new("p1").with_cell(
            "tasks",
            CellValue::References(vec![
                Reference::relation("t1"),
                Reference::relation("t2"),
                Reference::relation("t3"),
            ]),
        ),
        Row::new("p2"),
    ];

    let tables = TableSet::new().with_table(tasks);
    let computer = RowComputer::new();
    let stats = computer.apply_all(&mut projects, &columns, &tables);

    assert_eq!(stats.rollups_calculated, 4);
    assert_eq!(stats.formulas_evaluated, 2);
    assert_eq!(stats.errors, 0);
    assert_eq!(
        projects[0].computed_value("summary"),
        Some(&CellValue::text("12h, 67% done"))
    );
    assert_eq!(
        projects[1].computed_value("hours"),
        Some(&CellValue::Number(0.0))
    );
    assert_eq!(
        projects[1].computed_value("summary"),
        Some(&CellValue::text("0h, 0% done"))
    );
}
