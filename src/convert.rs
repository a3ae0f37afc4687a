//! Typed values, result rows, and conversion from payload cells.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};
use crate::remote::{Cell, Column, ColumnType, Payload, TableRow};

/// A canonical scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Number(f64),
    /// Only produced by the local fallback engine.
    Integer(i64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    TimeOfDay(NaiveTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The closest remote column type, `None` for null.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(ColumnType::String),
            Value::Number(_) | Value::Integer(_) => Some(ColumnType::Number),
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Date(_) => Some(ColumnType::Date),
            Value::DateTime(_) => Some(ColumnType::Datetime),
            Value::TimeOfDay(_) => Some(ColumnType::Timeofday),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::String(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::TimeOfDay(t) => write!(f, "{}", t),
        }
    }
}

/// One result row. Field names are shared by every row of a result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(fields: Arc<[String]>, values: Vec<Value>) -> Self {
        Row { fields, values }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Value of the field named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .position(|f| f == name)
            .and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// One entry of a cursor description. Only `name`, `type_code` and
/// `null_ok` are ever populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub type_code: ColumnType,
    pub display_size: Option<usize>,
    pub internal_size: Option<usize>,
    pub precision: Option<usize>,
    pub scale: Option<usize>,
    pub null_ok: bool,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, type_code: ColumnType) -> Self {
        ColumnDescription {
            name: name.into(),
            type_code,
            display_size: None,
            internal_size: None,
            precision: None,
            scale: None,
            null_ok: true,
        }
    }
}

pub fn describe(cols: &[Column]) -> Vec<ColumnDescription> {
    cols.iter()
        .map(|col| ColumnDescription::new(col.label.clone(), col.kind))
        .collect()
}

/// Row field names from column labels.
///
/// Whitespace becomes `_`. A name that is empty, is not an identifier,
/// starts with `_` or a digit, or repeats an earlier name is replaced by
/// `_<position>`.
pub fn field_names<'a>(labels: impl IntoIterator<Item = &'a str>) -> Arc<[String]> {
    let mut seen = std::collections::HashSet::new();
    labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let name: String = label
                .chars()
                .map(|c| if c.is_whitespace() { '_' } else { c })
                .collect();
            let valid = name
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic())
                && name.chars().all(|c| c.is_alphanumeric() || c == '_');
            if valid && seen.insert(name.clone()) {
                name
            } else {
                format!("_{}", i)
            }
        })
        .collect()
}

/// Parse a remote date literal `Date(Y,M,D[,h,m,s[,ms]])` into its
/// components with a one-based month.
fn date_components(literal: &str) -> Result<Vec<i64>> {
    let inner = literal
        .trim()
        .strip_prefix("Date(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::remote(format!("malformed date literal: {}", literal)))?;
    let mut parts = inner
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::remote(format!("malformed date literal: {}", literal)))?;
    if !(3..=7).contains(&parts.len()) {
        return Err(Error::remote(format!("malformed date literal: {}", literal)));
    }
    parts[1] = parts[1]
        .checked_add(1)
        .ok_or_else(|| Error::remote(format!("malformed date literal: {}", literal)))?;
    Ok(parts)
}

pub fn parse_date_literal(literal: &str) -> Result<NaiveDate> {
    let parts = date_components(literal)?;
    ymd(&parts, literal)
}

pub fn parse_datetime_literal(literal: &str) -> Result<NaiveDateTime> {
    let parts = date_components(literal)?;
    let date = ymd(&parts, literal)?;
    let part = |i: usize| parts.get(i).copied().unwrap_or(0);
    let time = u32_parts(&[part(3), part(4), part(5), part(6)])
        .and_then(|[h, m, s, ms]| NaiveTime::from_hms_milli_opt(h, m, s, ms))
        .ok_or_else(|| Error::remote(format!("invalid time in date literal: {}", literal)))?;
    Ok(date.and_time(time))
}

fn ymd(parts: &[i64], literal: &str) -> Result<NaiveDate> {
    let year = i32::try_from(parts[0]).ok();
    let md = u32_parts(&[parts[1], parts[2]]);
    year.zip(md)
        .and_then(|(y, [m, d])| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| Error::remote(format!("invalid date literal: {}", literal)))
}

fn u32_parts<const N: usize>(parts: &[i64; N]) -> Option<[u32; N]> {
    let mut out = [0u32; N];
    for (o, p) in out.iter_mut().zip(parts) {
        *o = u32::try_from(*p).ok()?;
    }
    Some(out)
}

/// Render `[year, month0, day, hour, minute, second]` as a remote date
/// literal. The month stays zero-based.
pub fn format_date_literal(components: &[i64; 6]) -> String {
    let parts: Vec<String> = components.iter().map(|c| c.to_string()).collect();
    format!("Date({})", parts.join(","))
}

/// Interpret `[h, m, s]` or `[h, m, s, ms]`.
pub fn parse_timeofday(value: &serde_json::Value) -> Result<NaiveTime> {
    let malformed = || Error::remote(format!("malformed timeofday: {}", value));
    let parts = value
        .as_array()
        .ok_or_else(malformed)?
        .iter()
        .map(|v| v.as_f64().map(|n| n as i64))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(malformed)?;
    if !(3..=4).contains(&parts.len()) {
        return Err(malformed());
    }
    let part = |i: usize| parts.get(i).copied().unwrap_or(0);
    u32_parts(&[part(0), part(1), part(2), part(3)])
        .and_then(|[h, m, s, ms]| NaiveTime::from_hms_milli_opt(h, m, s, ms))
        .ok_or_else(malformed)
}

/// Convert one cell according to its column's declared type.
pub fn convert_cell(kind: ColumnType, cell: Option<&Cell>) -> Result<Value> {
    let v = match cell.and_then(|c| c.v.as_ref()) {
        None | Some(serde_json::Value::Null) => return Ok(Value::Null),
        Some(v) => v,
    };
    let mismatch = || Error::remote(format!("value {} does not match column type {}", v, kind));
    match kind {
        ColumnType::String => Ok(Value::String(match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })),
        ColumnType::Number => v.as_f64().map(Value::Number).ok_or_else(mismatch),
        ColumnType::Boolean => v.as_bool().map(Value::Boolean).ok_or_else(mismatch),
        ColumnType::Date => parse_date_literal(v.as_str().ok_or_else(mismatch)?).map(Value::Date),
        ColumnType::Datetime => {
            parse_datetime_literal(v.as_str().ok_or_else(mismatch)?).map(Value::DateTime)
        }
        ColumnType::Timeofday => parse_timeofday(v).map(Value::TimeOfDay),
    }
}

/// Convert payload rows into typed rows named after the column labels.
pub fn convert_rows(cols: &[Column], rows: &[TableRow]) -> Result<Vec<Row>> {
    let fields = field_names(cols.iter().map(|c| c.label.as_str()));
    rows.iter()
        .map(|row| {
            if row.c.len() > cols.len() {
                return Err(Error::remote(format!(
                    "row has {} cells for {} columns",
                    row.c.len(),
                    cols.len()
                )));
            }
            let values = cols
                .iter()
                .enumerate()
                .map(|(i, col)| convert_cell(col.kind, row.c.get(i).and_then(|c| c.as_ref())))
                .collect::<Result<Vec<_>>>()?;
            Ok(Row::new(fields.clone(), values))
        })
        .collect()
}

/// Typed rows plus their description, as produced by either engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    pub description: Vec<ColumnDescription>,
}

impl ResultSet {
    /// Rows and description of a successful payload.
    pub fn from_payload(payload: &Payload) -> Result<Self> {
        Ok(ResultSet {
            rows: convert_rows(&payload.table.cols, &payload.table.rows)?,
            description: describe(&payload.table.cols),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_date_literal_increments_month() {
        assert_eq!(
            parse_date_literal("Date(2018,0,1)").unwrap(),
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
        );
        assert_eq!(
            parse_datetime_literal("Date(2018,8,1,13,5,9)").unwrap(),
            NaiveDate::from_ymd_opt(2018, 9, 1)
                .unwrap()
                .and_hms_opt(13, 5, 9)
                .unwrap()
        );
    }

    #[test]
    fn test_datetime_from_three_components() {
        assert_eq!(
            parse_datetime_literal("Date(2020,11,31)").unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_malformed_date_literal() {
        assert!(matches!(parse_date_literal("2018-01-01"), Err(Error::Remote(_))));
        assert!(matches!(parse_date_literal("Date(2018)"), Err(Error::Remote(_))));
        assert!(matches!(parse_date_literal("Date(2018,12,1)"), Err(Error::Remote(_))));
        let overflow = format!("Date(2018,{},1)", i64::MAX);
        assert!(matches!(parse_date_literal(&overflow), Err(Error::Remote(_))));
        assert!(matches!(parse_datetime_literal(&overflow), Err(Error::Remote(_))));
    }

    #[test]
    fn test_format_date_literal() {
        assert_eq!(format_date_literal(&[2018, 0, 1, 12, 30, 5]), "Date(2018,0,1,12,30,5)");
    }

    #[test]
    fn test_parse_timeofday() {
        assert_eq!(
            parse_timeofday(&json!([0, 1, 2, 3])).unwrap(),
            NaiveTime::from_hms_milli_opt(0, 1, 2, 3).unwrap()
        );
        assert_eq!(
            parse_timeofday(&json!([12, 0, 0])).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap()
        );
        assert!(parse_timeofday(&json!("12:00")).is_err());
    }

    #[test]
    fn test_convert_rows() {
        let cols = vec![
            Column::new("A", "datetime", ColumnType::Datetime),
            Column::new("B", "number", ColumnType::Number),
            Column::new("C", "boolean", ColumnType::Boolean),
            Column::new("D", "date", ColumnType::Date),
            Column::new("E", "timeofday", ColumnType::Timeofday),
            Column::new("F", "string", ColumnType::String),
        ];
        let rows = vec![
            TableRow {
                c: vec![
                    Some(Cell::value("Date(2018,8,1,0,0,0)")),
                    Some(Cell::value(1.0)),
                    Some(Cell::value(true)),
                    Some(Cell::value("Date(2018,0,1)")),
                    Some(Cell::value(json!([17, 0, 0, 0]))),
                    Some(Cell::value("test")),
                ],
            },
            TableRow {
                c: vec![None, None, None, None, None, None],
            },
        ];

        let result = convert_rows(&cols, &rows).unwrap();
        assert_eq!(result.len(), 2);
        let first = &result[0];
        assert_eq!(
            first.get("datetime"),
            Some(&Value::DateTime(
                NaiveDate::from_ymd_opt(2018, 9, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            ))
        );
        assert_eq!(first.get("number"), Some(&Value::Number(1.0)));
        assert_eq!(first.get("boolean"), Some(&Value::Boolean(true)));
        assert_eq!(
            first.get("date"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()))
        );
        assert_eq!(
            first.get("timeofday"),
            Some(&Value::TimeOfDay(NaiveTime::from_hms_opt(17, 0, 0).unwrap()))
        );
        assert_eq!(first.get("string"), Some(&Value::String("test".into())));
        assert!(result[1].values().iter().all(Value::is_null));
    }

    #[test]
    fn test_field_names() {
        let names = field_names(["country", "net sales", "", "2019", "_x", "country", "a-b"]);
        assert_eq!(
            &names[..],
            &["country", "net_sales", "_2", "_3", "_4", "_5", "_6"]
        );
    }

    #[test]
    fn test_type_mismatch_is_remote_error() {
        let err = convert_cell(ColumnType::Number, Some(&Cell::value("x"))).unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[test]
    fn test_describe() {
        let desc = describe(&[Column::new("A", "country", ColumnType::String)]);
        assert_eq!(desc, vec![ColumnDescription::new("country", ColumnType::String)]);
        assert!(desc[0].null_ok);
        assert_eq!(desc[0].display_size, None);
    }
}
