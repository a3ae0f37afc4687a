//! End-to-end error propagation tests.
//!
//! Every failure class has to reach the caller as the right `Error`
//! variant, and failures before the probe must not touch the network.

mod common;

use serde_json::json;

use common::*;
use sheet_query::error::Position;
use sheet_query::{Config, Error, Parameters};

// ============================================================
// Helpers
// ============================================================

fn from_sheet(select: &str) -> String {
    format!("{} FROM \"{}\"", select, SHEET)
}

fn no_fallback() -> Config {
    Config {
        fallback: false,
        ..Config::default()
    }
}

// ============================================================
// 1. Failures before any request
// ============================================================

#[test]
fn error_syntax_makes_no_requests() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let err = conn.execute("SELECT ))) FROM t", None).unwrap_err();
    match &err {
        Error::Syntax { diagnostic, .. } => {
            assert_eq!(diagnostic.original, "SELECT ))) FROM t");
            assert_eq!(diagnostic.translated, None);
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
    assert!(mock.urls().is_empty());
}

#[test]
fn error_bare_table_name_is_unsupported() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let err = conn.execute("SELECT a FROM t", None).unwrap_err();
    assert!(matches!(err, Error::UnsupportedQuery(_)), "got {:?}", err);
    assert!(mock.urls().is_empty());
}

#[test]
fn error_join_is_unsupported() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let sql = format!("SELECT * FROM \"{0}\" JOIN \"{0}\" ON 1 = 1", SHEET);
    let err = conn.execute(&sql, None).unwrap_err();
    assert!(matches!(err, Error::UnsupportedQuery(_)));
    assert!(mock.urls().is_empty());
}

#[test]
fn error_non_select_statement() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let err = conn
        .execute(&format!("DELETE FROM \"{}\"", SHEET), None)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedQuery(_)));
    assert!(mock.urls().is_empty());
}

#[test]
fn error_missing_parameter() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let err = conn
        .execute(
            &(from_sheet("SELECT country") + " WHERE country = %(name)s"),
            Some(&Parameters::new()),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Programming { diagnostic: None, .. }));
    assert!(mock.urls().is_empty());
}

// ============================================================
// 2. Remote failures
// ============================================================

#[test]
fn error_probe_server_error_is_remote() {
    let mock = MockTransport::new();
    mock.route(
        &sheet_query::remote::executor::query_url(ENDPOINT, "SELECT * LIMIT 0"),
        500,
        "Internal Server Error",
    );
    let mut conn = connection(&mock);
    let err = conn.execute(&from_sheet("SELECT country"), None).unwrap_err();
    match err {
        Error::Remote(body) => assert!(body.contains("Internal Server Error")),
        other => panic!("expected remote error, got {:?}", other),
    }
    assert_eq!(mock.urls().len(), 1);
}

#[test]
fn error_probe_error_payload_is_remote() {
    let mock = MockTransport::new();
    mock.answer(ENDPOINT, "SELECT * LIMIT 0", error_payload("Access denied"));
    let mut conn = connection(&mock);
    let err = conn.execute(&from_sheet("SELECT country"), None).unwrap_err();
    assert!(matches!(err, Error::Remote(_)), "got {:?}", err);
}

#[test]
fn error_undecodable_body_is_remote() {
    let mock = sales_sheet();
    mock.route(
        &sheet_query::remote::executor::query_url(ENDPOINT, "SELECT A"),
        200,
        "<html>sign in</html>",
    );
    let mut conn = connection(&mock);
    let err = conn.execute(&from_sheet("SELECT country"), None).unwrap_err();
    assert!(matches!(err, Error::Remote(_)), "got {:?}", err);
}

#[test]
fn error_rejected_query_without_fallback() {
    let mock = sales_sheet();
    mock.answer(
        ENDPOINT,
        "SELECT A",
        error_payload("Column [A] is not valid here."),
    );
    let mut conn = connection_with(&mock, no_fallback());
    let err = conn.execute(&from_sheet("SELECT country"), None).unwrap_err();

    let Error::Programming { message, diagnostic } = &err else {
        panic!("expected programming error, got {:?}", err);
    };
    assert!(message.starts_with("Original query:\n"));
    assert!(message.contains("Translated query:\nSELECT A\n"));
    assert!(message.ends_with("Error:\nColumn [A] is not valid here."));
    let diagnostic = diagnostic.as_ref().unwrap();
    assert_eq!(diagnostic.translated.as_deref(), Some("SELECT A"));
    assert_eq!(diagnostic.position, None);
}

#[test]
fn error_rejected_query_points_at_position() {
    let mock = sales_sheet();
    mock.answer(
        ENDPOINT,
        "SELECT A",
        error_payload("Encountered \"A\" at line 1, column 8."),
    );
    let mut conn = connection_with(&mock, no_fallback());
    let err = conn.execute(&from_sheet("SELECT country"), None).unwrap_err();

    assert_eq!(
        err.diagnostic().and_then(|d| d.position),
        Some(Position { line: 1, column: 8 })
    );
    assert!(err
        .to_string()
        .ends_with("SELECT A\n       ^\nEncountered \"A\" at line 1, column 8."));
}

// ============================================================
// 3. Fallback failures
// ============================================================

#[test]
fn error_in_fallback_is_local() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let err = conn
        .execute(
            &(from_sheet("SELECT country") + " GROUP BY country HAVING missing > 1"),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Local(_)), "got {:?}", err);
    assert!(mock.requested(ENDPOINT, "SELECT *"));
}

#[test]
fn error_fallback_fetch_rejected() {
    let mock = MockTransport::new();
    mock.answer(ENDPOINT, "SELECT * LIMIT 0", ok_payload(sales_cols(), json!([])));
    mock.answer(ENDPOINT, "SELECT *", error_payload("Sheet is gone."));
    let mut conn = connection(&mock);
    let err = conn
        .execute(
            &(from_sheet("SELECT country") + " GROUP BY country HAVING SUM(cnt) > 3"),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Programming { .. }), "got {:?}", err);
}

// ============================================================
// 4. Cursor protocol
// ============================================================

#[test]
fn error_executemany_not_supported() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let mut cursor = conn.cursor().unwrap();
    let err = cursor
        .executemany(&from_sheet("SELECT country"), &[Parameters::new()])
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert!(mock.urls().is_empty());
}

#[test]
fn error_fetch_before_execute() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let mut cursor = conn.cursor().unwrap();
    assert!(matches!(cursor.fetchone(), Err(Error::Interface(_))));
    assert!(matches!(cursor.fetchmany(Some(2)), Err(Error::Interface(_))));
    assert_eq!(cursor.description().unwrap(), None);
}

#[test]
fn error_closed_cursor() {
    let mock = sales_sheet();
    let mut conn = connection(&mock);
    let mut cursor = conn.cursor().unwrap();
    cursor.close().unwrap();
    let err = cursor
        .execute(&from_sheet("SELECT country"), None)
        .unwrap_err();
    assert_eq!(err.to_string(), "Cursor already closed");
    assert!(mock.urls().is_empty());
}
