//! Local fallback engine.
//!
//! When the remote dialect cannot run a statement, the whole source table is
//! fetched untransformed, loaded into a throwaway in-memory SQLite database
//! under a table named after the locator, and the original statement runs
//! there unchanged. Nothing is shared between executions.
//!
//! Storage encoding: dates as ISO text, datetimes as
//! `YYYY-MM-DD HH:MM:SS[.ffffff]`, booleans as 0/1, and time of day as an
//! integer count of microseconds since midnight. Result columns whose name
//! matches a source column are decoded back to that column's type.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};

use crate::convert::{convert_rows, field_names, ColumnDescription, ResultSet, Row, Value};
use crate::error::Result;
use crate::remote::executor::{check_payload, Executor};
use crate::remote::{Column, ColumnType, Payload};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_FRACTION_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Declared SQLite type for a remote column type.
pub fn sqlite_type(kind: ColumnType) -> &'static str {
    match kind {
        ColumnType::String => "text",
        ColumnType::Number => "real",
        ColumnType::Boolean => "boolean",
        ColumnType::Date => "date",
        ColumnType::Datetime => "timestamp",
        ColumnType::Timeofday => "timeofday",
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// An in-memory SQLite copy of one remote table.
pub struct LocalTable {
    conn: Connection,
    columns: Vec<Column>,
}

impl LocalTable {
    /// Create `table` from the payload's columns and load its rows.
    pub fn materialize(table: &str, payload: &Payload) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        let columns = payload.table.cols.clone();

        let defs: Vec<String> = columns
            .iter()
            .map(|col| format!("{} {}", quote_ident(col.name()), sqlite_type(col.kind)))
            .collect();
        let create = format!("CREATE TABLE {} ({})", quote_ident(table), defs.join(", "));
        tracing::info!(sql = %create, "fallback create");
        conn.execute(&create, [])?;

        let rows = convert_rows(&columns, &payload.table.rows)?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!("INSERT INTO {} VALUES ({})", quote_ident(table), placeholders);
        tracing::info!(sql = %insert, rows = rows.len(), "fallback insert");

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in &rows {
                stmt.execute(params_from_iter(row.values().iter().map(to_sql)))?;
            }
        }
        tx.commit()?;

        Ok(LocalTable { conn, columns })
    }

    /// Run `sql` against the local copy.
    pub fn query(&self, sql: &str) -> Result<ResultSet> {
        tracing::info!(sql, "fallback query");
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let source: Vec<Option<ColumnType>> = names
            .iter()
            .map(|n| self.columns.iter().find(|c| c.name() == n).map(|c| c.kind))
            .collect();

        let mut values: Vec<Vec<Value>> = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let decoded = source
                .iter()
                .enumerate()
                .map(|(i, kind)| Ok(from_sql(row.get_ref(i)?, *kind)))
                .collect::<Result<Vec<_>>>()?;
            values.push(decoded);
        }

        let description = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let kind = source[i]
                    .or_else(|| values.iter().find_map(|r| r[i].column_type()))
                    .unwrap_or(ColumnType::String);
                ColumnDescription::new(name.clone(), kind)
            })
            .collect();

        let fields = field_names(names.iter().map(String::as_str));
        let rows = values
            .into_iter()
            .map(|v| Row::new(fields.clone(), v))
            .collect();
        Ok(ResultSet { rows, description })
    }
}

/// Fetch the full table behind `endpoint` and run `original` over it.
pub fn run_fallback(
    executor: &Executor<'_>,
    endpoint: &str,
    locator: &str,
    original: &str,
) -> Result<ResultSet> {
    let payload = executor.run_query(endpoint, "SELECT *")?;
    let payload = check_payload(payload, original, "SELECT *")?;
    tracing::info!(
        locator,
        columns = payload.table.cols.len(),
        rows = payload.table.rows.len(),
        "materializing source for local fallback"
    );
    LocalTable::materialize(locator, &payload)?.query(original)
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Number(n) => SqlValue::Real(*n),
        Value::Integer(n) => SqlValue::Integer(*n),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => SqlValue::Text(format_datetime(dt)),
        Value::TimeOfDay(t) => SqlValue::Integer(timeofday_micros(t)),
    }
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format(DATETIME_FORMAT).to_string()
    } else {
        dt.format(DATETIME_FRACTION_FORMAT).to_string()
    }
}

pub fn timeofday_micros(t: &NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight()) * 1_000_000 + i64::from(t.nanosecond() / 1_000)
}

pub fn micros_timeofday(micros: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

/// Decode a stored value, using the source column type when there is one.
/// Values that do not decode as that type (an aggregate reusing the column
/// name, say) come back in their generic form.
fn from_sql(value: ValueRef<'_>, kind: Option<ColumnType>) -> Value {
    let typed = match (kind, value) {
        (_, ValueRef::Null) => Some(Value::Null),
        (Some(ColumnType::Number), ValueRef::Integer(n)) => Some(Value::Number(n as f64)),
        (Some(ColumnType::Boolean), ValueRef::Integer(n)) => Some(Value::Boolean(n != 0)),
        (Some(ColumnType::Date), ValueRef::Text(t)) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(Value::Date),
        (Some(ColumnType::Datetime), ValueRef::Text(t)) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
            .map(Value::DateTime),
        (Some(ColumnType::Timeofday), ValueRef::Integer(n)) => {
            micros_timeofday(n).map(Value::TimeOfDay)
        }
        _ => None,
    };
    typed.unwrap_or_else(|| match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Integer(n),
        ValueRef::Real(x) => Value::Number(x),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    })
}
