//! Source locator: the quoted URL in a statement's FROM clause, and the
//! query endpoint derived from it.
//!
//! Endpoint parameters resolve with later sources winning:
//! explicit argument < URL query string < URL fragment (`#gid=<n>`).

use sqlparser::ast::{self as sp, TableFactor};
use url::form_urlencoded;
use url::Url;

use super::parser::{parse_statement, select_body};
use crate::error::{Error, Result};

/// Path appended to the locator to reach the query endpoint.
pub const QUERY_PATH: &str = "gviz/tq";

/// Extract the locator from a parsed statement.
///
/// The FROM clause must name exactly one source written as a quoted string;
/// joins, subqueries and bare identifiers are rejected.
pub fn extract_locator(query: &sp::Query) -> Result<String> {
    let select = select_body(query)?;
    let [table] = select.from.as_slice() else {
        return Err(Error::unsupported(
            "FROM must reference exactly one quoted source URL",
        ));
    };
    if !table.joins.is_empty() {
        return Err(Error::unsupported("JOINs not supported"));
    }

    match &table.relation {
        TableFactor::Table { name, .. } => match name.0.as_slice() {
            [ident] if ident.quote_style.is_some() && !ident.value.is_empty() => {
                Ok(ident.value.clone())
            }
            _ => Err(Error::unsupported(format!(
                "FROM must be a quoted source URL, got {}",
                name
            ))),
        },
        other => Err(Error::unsupported(format!(
            "FROM must be a quoted source URL, got {}",
            other
        ))),
    }
}

/// Parse `sql` and extract its locator.
pub fn locator_from_sql(sql: &str) -> Result<String> {
    extract_locator(&parse_statement(sql)?)
}

/// Sheet selection: a named sheet wins over a numeric gid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointOptions {
    pub headers: u32,
    pub gid: String,
    pub sheet: Option<String>,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        EndpointOptions {
            headers: 0,
            gid: "0".to_string(),
            sheet: None,
        }
    }
}

/// Build the query endpoint URL for `locator`.
///
/// A trailing `/edit` path segment is removed, the query path is appended,
/// and the parameters are encoded as `headers` (only when positive) followed
/// by exactly one of `sheet` or `gid`.
pub fn endpoint_url(locator: &str, options: &EndpointOptions) -> Result<String> {
    let mut url = Url::parse(locator)
        .map_err(|e| Error::unsupported(format!("invalid source URL '{}': {}", locator, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::unsupported(format!(
            "invalid source URL '{}': not a hierarchical URL",
            locator
        )));
    }

    let mut headers = options.headers;
    let mut gid = options.gid.clone();
    let mut sheet = options.sheet.clone();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "headers" => {
                headers = value.parse().map_err(|_| {
                    Error::unsupported(format!("invalid headers value in URL: {}", value))
                })?
            }
            "gid" => gid = value.into_owned(),
            "sheet" => sheet = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(fragment_gid) = url.fragment().and_then(|f| f.strip_prefix("gid=")) {
        gid = fragment_gid.to_string();
    }

    let path = url.path();
    let path = path.strip_suffix("/edit").unwrap_or(path);
    let path = format!("{}/{}", path.trim_end_matches('/'), QUERY_PATH);

    let mut params = form_urlencoded::Serializer::new(String::new());
    if headers > 0 {
        params.append_pair("headers", &headers.to_string());
    }
    match &sheet {
        Some(sheet) => params.append_pair("sheet", sheet),
        None => params.append_pair("gid", &gid),
    };

    url.set_path(&path);
    url.set_query(Some(&params.finish()));
    url.set_fragment(None);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(headers: u32, gid: &str) -> EndpointOptions {
        EndpointOptions {
            headers,
            gid: gid.to_string(),
            sheet: None,
        }
    }

    #[test]
    fn test_extract_locator() {
        let locator = locator_from_sql(r#"SELECT * FROM "http://docs.google.com""#).unwrap();
        assert_eq!(locator, "http://docs.google.com");
    }

    #[test]
    fn test_extract_locator_rejects_bare_identifier() {
        let err = locator_from_sql("SELECT * FROM sales").unwrap_err();
        assert!(matches!(err, Error::UnsupportedQuery(_)));
    }

    #[test]
    fn test_extract_locator_rejects_join_and_subquery() {
        assert!(matches!(
            locator_from_sql(r#"SELECT * FROM "http://a" JOIN "http://b" ON a.x = b.x"#),
            Err(Error::UnsupportedQuery(_))
        ));
        assert!(matches!(
            locator_from_sql(r#"SELECT * FROM (SELECT * FROM "http://a") t"#),
            Err(Error::UnsupportedQuery(_))
        ));
        assert!(matches!(
            locator_from_sql("SELECT 1"),
            Err(Error::UnsupportedQuery(_))
        ));
    }

    #[test]
    fn test_endpoint_url() {
        let url = endpoint_url("http://docs.google.com", &opts(1, "10")).unwrap();
        assert_eq!(url, "http://docs.google.com/gviz/tq?headers=1&gid=10");
    }

    #[test]
    fn test_endpoint_url_removes_edit_and_reads_fragment() {
        let url = endpoint_url("http://docs.google.com/edit#gid=0", &opts(1, "10")).unwrap();
        assert_eq!(url, "http://docs.google.com/gviz/tq?headers=1&gid=0");
    }

    #[test]
    fn test_endpoint_url_query_string_overrides_arguments() {
        let url = endpoint_url("http://docs.google.com/?gid=0", &opts(1, "10")).unwrap();
        assert_eq!(url, "http://docs.google.com/gviz/tq?headers=1&gid=0");

        let url = endpoint_url("http://docs.google.com/?gid=0&headers=2", &opts(1, "10")).unwrap();
        assert_eq!(url, "http://docs.google.com/gviz/tq?headers=2&gid=0");
    }

    #[test]
    fn test_endpoint_url_fragment_beats_query_string() {
        let url = endpoint_url("http://docs.google.com/?gid=3#gid=7", &opts(0, "0")).unwrap();
        assert_eq!(url, "http://docs.google.com/gviz/tq?gid=7");
    }

    #[test]
    fn test_endpoint_url_sheet_wins_over_gid() {
        let url =
            endpoint_url("http://docs.google.com/?gid=0&headers=2&sheet=table", &opts(1, "10"))
                .unwrap();
        assert_eq!(url, "http://docs.google.com/gviz/tq?headers=2&sheet=table");
    }

    #[test]
    fn test_endpoint_url_spreadsheet_path() {
        let url = endpoint_url(
            "https://docs.google.com/spreadsheets/d/abc123/edit#gid=42",
            &EndpointOptions::default(),
        )
        .unwrap();
        assert_eq!(
            url,
            "https://docs.google.com/spreadsheets/d/abc123/gviz/tq?gid=42"
        );
    }

    #[test]
    fn test_endpoint_url_rejects_non_url() {
        assert!(matches!(
            endpoint_url("sales", &EndpointOptions::default()),
            Err(Error::UnsupportedQuery(_))
        ));
    }
}
