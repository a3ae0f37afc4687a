//! End-to-end tests for statements the remote dialect cannot run.

mod common;

use serde_json::json;

use common::*;
use sheet_query::fallback::LocalTable;
use sheet_query::remote::Payload;
use sheet_query::{ColumnType, Config, Error, Value};

fn from_sheet(select: &str, rest: &str) -> String {
    format!("{} FROM \"{}\" {}", select, SHEET, rest)
}

fn sales_payload() -> Payload {
    serde_json::from_value(ok_payload(sales_cols(), sales_rows())).unwrap()
}

// ============================================================
// Unsupported shapes run locally
// ============================================================

#[test]
fn fallback_having_matches_local_engine() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let sql = from_sheet(
        "SELECT country, SUM(cnt) AS total",
        "GROUP BY country HAVING SUM(cnt) > 3 ORDER BY country",
    );
    let mut cursor = conn.execute(&sql, None).unwrap();
    let rows = cursor.fetchall().unwrap();

    let expected = LocalTable::materialize(SHEET, &sales_payload())
        .unwrap()
        .query(&sql)
        .unwrap();
    assert_eq!(rows, expected.rows);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("country"), Some(&Value::String("BR".into())));
    assert_eq!(rows[0].get("total"), Some(&Value::Number(4.0)));
    assert_eq!(rows[1].get("country"), Some(&Value::String("US".into())));
    assert_eq!(rows[1].get("total"), Some(&Value::Number(10.0)));

    let description = cursor.description().unwrap().unwrap();
    assert_eq!(description[0].name, "country");
    assert_eq!(description[0].type_code, ColumnType::String);
    assert_eq!(description[1].type_code, ColumnType::Number);

    // probe, then the untransformed fetch; no translated query is sent
    assert_eq!(mock.urls().len(), 2);
    assert!(mock.requested(ENDPOINT, "SELECT *"));
}

#[test]
fn fallback_after_remote_rejection() {
    let mock = sales_sheet();
    mock.answer(
        ENDPOINT,
        "SELECT A WHERE B > 2",
        json!({"status": "error", "errors": [{"reason": "invalid_query", "message": "INVALID_QUERY"}]}),
    );
    let mut conn = connection(&mock);
    let mut cursor = conn
        .execute(&from_sheet("SELECT country", "WHERE cnt > 2"), None)
        .unwrap();

    let countries: Vec<Value> = cursor
        .fetchall()
        .unwrap()
        .into_iter()
        .flat_map(|row| row.into_values())
        .collect();
    assert_eq!(
        countries,
        vec![Value::String("BR".into()), Value::String("US".into())]
    );
    assert!(mock.requested(ENDPOINT, "SELECT A WHERE B > 2"));
    assert!(mock.requested(ENDPOINT, "SELECT *"));
}

#[test]
fn fallback_count_star_with_star_select() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let mut cursor = conn
        .execute(&from_sheet("SELECT *, COUNT(*) AS n", "GROUP BY country, cnt"), None)
        .unwrap();
    assert_eq!(cursor.rowcount().unwrap(), 4);
    let description = cursor.description().unwrap().unwrap();
    assert_eq!(description.len(), 3);
    assert_eq!(description[2].name, "n");
}

#[test]
fn fallback_disabled_returns_unsupported() {
    let mock = sales_sheet();
    let config = Config {
        fallback: false,
        ..Config::default()
    };
    let mut conn = connection_with(&mock, config);
    let err = conn
        .execute(
            &from_sheet("SELECT country", "GROUP BY country HAVING SUM(cnt) > 3"),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedQuery(_)), "got {:?}", err);
    assert!(!mock.requested(ENDPOINT, "SELECT *"));
}

#[test]
fn fallback_is_not_used_for_transport_errors() {
    let mock = MockTransport::new();
    mock.answer(ENDPOINT, "SELECT * LIMIT 0", ok_payload(sales_cols(), json!([])));
    mock.route(
        &sheet_query::remote::executor::query_url(ENDPOINT, "SELECT A"),
        503,
        "unavailable",
    );
    let mut conn = connection(&mock);
    let err = conn
        .execute(&from_sheet("SELECT country", ""), None)
        .unwrap_err();
    assert!(matches!(err, Error::Remote(_)));
    assert!(!mock.requested(ENDPOINT, "SELECT *"));
}
