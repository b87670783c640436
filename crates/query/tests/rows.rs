//! Row construction and ordering, as relied on by multiset comparison.

use acidcheck_query::{row, QueryResult, Row, Value};

#[test]
fn row_macro_converts_each_literal() {
    let r = row![11, 100_i64, "Fred", true];
    assert_eq!(
        r.values(),
        &[
            Value::Int(11),
            Value::Int(100),
            Value::Text("Fred".to_string()),
            Value::Bool(true),
        ]
    );
}

#[test]
fn empty_row_macro() {
    assert!(row![].is_empty());
}

#[test]
fn rows_sort_by_cells_left_to_right() {
    let mut rows = vec![row![2, "a"], row![1, "b"], row![1, "a"]];
    rows.sort();
    assert_eq!(rows, vec![row![1, "a"], row![1, "b"], row![2, "a"]]);
}

#[test]
fn row_display_is_tuple_like() {
    assert_eq!(row![23, "WA", None::<i32>].to_string(), "(23, 'WA', NULL)");
}

#[test]
fn query_result_collects_rows() {
    let result: QueryResult = vec![row![1], row![2]].into_iter().collect();
    assert_eq!(result.row_count(), 2);
    assert!(result.columns().is_empty());
    assert_eq!(result.row(1), Some(&row![2]));
    assert_eq!(result.row(2), None::<&Row>);
}
