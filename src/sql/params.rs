//! `%(name)s` parameter substitution.
//!
//! Substitution is textual and happens before parsing. Values are escaped
//! into SQL literals; `%%` renders a literal `%`.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Param>),
}

pub type Parameters = BTreeMap<String, Param>;

impl fmt::Display for Param {
    /// The escaped SQL literal for this value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Str(s) if s == "*" => write!(f, "*"),
            Param::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Param::Int(n) => write!(f, "{}", n),
            Param::Float(x) => write!(f, "{:?}", x),
            Param::Bool(true) => write!(f, "TRUE"),
            Param::Bool(false) => write!(f, "FALSE"),
            Param::List(items) => {
                let items: Vec<String> = items.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", items.join(", "))
            }
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Str(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Str(s)
    }
}

impl From<i64> for Param {
    fn from(n: i64) -> Self {
        Param::Int(n)
    }
}

impl From<i32> for Param {
    fn from(n: i32) -> Self {
        Param::Int(n.into())
    }
}

impl From<f64> for Param {
    fn from(x: f64) -> Self {
        Param::Float(x)
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Bool(b)
    }
}

impl<T: Into<Param>> From<Vec<T>> for Param {
    fn from(items: Vec<T>) -> Self {
        Param::List(items.into_iter().map(Into::into).collect())
    }
}

/// Substitute every `%(name)s` placeholder in `operation`.
///
/// A placeholder naming a key absent from `params`, or a `%` that starts
/// neither a placeholder nor `%%`, is a programming error.
pub fn apply_parameters(operation: &str, params: &Parameters) -> Result<String> {
    let mut out = String::with_capacity(operation.len());
    let mut rest = operation;

    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx + 1..];

        if let Some(after) = tail.strip_prefix('%') {
            out.push('%');
            rest = after;
            continue;
        }

        let placeholder = tail
            .strip_prefix('(')
            .and_then(|t| t.find(")s").map(|end| (&t[..end], &t[end + 2..])));
        let Some((name, after)) = placeholder else {
            return Err(programming(format!(
                "unsupported format character at byte {} of query",
                idx
            )));
        };
        let value = params
            .get(name)
            .ok_or_else(|| programming(format!("missing parameter: {}", name)))?;
        out.push_str(&value.to_string());
        rest = after;
    }
    out.push_str(rest);
    Ok(out)
}

fn programming(message: String) -> Error {
    Error::Programming {
        message,
        diagnostic: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: Vec<(&str, Param)>) -> Parameters {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_escape_string() {
        let p = params(vec![("name", "O'Malley's".into())]);
        let sql = apply_parameters("SELECT * FROM t WHERE name=%(name)s", &p).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE name='O''Malley''s'");
    }

    #[test]
    fn test_escape_list() {
        let p = params(vec![("ids", vec![1i64, 2].into())]);
        let sql = apply_parameters("SELECT * FROM t WHERE id IN %(ids)s", &p).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id IN (1, 2)");
    }

    #[test]
    fn test_escape_scalars() {
        assert_eq!(Param::Bool(true).to_string(), "TRUE");
        assert_eq!(Param::Bool(false).to_string(), "FALSE");
        assert_eq!(Param::Int(-3).to_string(), "-3");
        assert_eq!(Param::Float(1.5).to_string(), "1.5");
        assert_eq!(Param::Float(2.0).to_string(), "2.0");
        assert_eq!(Param::from("*").to_string(), "*");
    }

    #[test]
    fn test_nested_list_escapes_elements() {
        let p = Param::List(vec!["a'b".into(), Param::Bool(true), 3i64.into()]);
        assert_eq!(p.to_string(), "('a''b', TRUE, 3)");
    }

    #[test]
    fn test_star_passes_through() {
        let p = params(vec![("cols", "*".into())]);
        let sql = apply_parameters("SELECT %(cols)s FROM t", &p).unwrap();
        assert_eq!(sql, "SELECT * FROM t");
    }

    #[test]
    fn test_percent_escape() {
        let p = params(vec![("p", "a%".into())]);
        let sql = apply_parameters("SELECT * WHERE a LIKE %(p)s AND b = '100%%'", &p).unwrap();
        assert_eq!(sql, "SELECT * WHERE a LIKE 'a%' AND b = '100%'");
    }

    #[test]
    fn test_missing_parameter() {
        let err = apply_parameters("SELECT %(x)s", &Parameters::new()).unwrap_err();
        assert!(matches!(err, Error::Programming { .. }));
        assert!(err.to_string().contains("x"));
    }

    #[test]
    fn test_stray_percent_is_rejected() {
        let err = apply_parameters("SELECT 5 % 2", &Parameters::new()).unwrap_err();
        assert!(matches!(err, Error::Programming { .. }));
    }
}
