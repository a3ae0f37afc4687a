//! Shared fixtures: an in-memory transport and a small sales sheet.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value as Json};

use sheet_query::error::Result;
use sheet_query::remote::executor::{query_url, LEADING};
use sheet_query::remote::{HttpResponse, Transport};
use sheet_query::{Config, Connection, Session};

pub const SHEET: &str = "http://docs.google.com/";
pub const ENDPOINT: &str = "http://docs.google.com/gviz/tq?gid=0";

/// Records every request and answers from a URL-keyed table. Unknown URLs
/// get a 404.
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
    requests: Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.into()));
    }

    /// Answer `query` against `endpoint` with a JSON payload, prefixed the
    /// way the real endpoint does.
    pub fn answer(&self, endpoint: &str, query: &str, payload: Json) {
        self.route(
            &query_url(endpoint, query),
            200,
            format!("{}{}", LEADING, payload),
        );
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn headers(&self, index: usize) -> Vec<(String, String)> {
        self.requests.lock().unwrap()[index].1.clone()
    }

    pub fn requested(&self, endpoint: &str, query: &str) -> bool {
        self.urls().contains(&query_url(endpoint, query))
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push((
            url.to_string(),
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));
        let routes = self.routes.lock().unwrap();
        let (status, body) = routes
            .get(url)
            .cloned()
            .unwrap_or((404, format!("no route: {}", url)));
        Ok(HttpResponse { status, body })
    }
}

pub fn connection(mock: &MockTransport) -> Connection {
    connection_with(mock, Config::default())
}

pub fn connection_with(mock: &MockTransport, config: Config) -> Connection {
    Connection::new(Session::with_transport(config, mock.clone()))
}

pub fn ok_payload(cols: Json, rows: Json) -> Json {
    json!({
        "version": "0.6",
        "reqId": "0",
        "status": "ok",
        "sig": "1453301915",
        "table": { "cols": cols, "rows": rows, "parsedNumHeaders": 1 }
    })
}

pub fn error_payload(detailed_message: &str) -> Json {
    json!({
        "version": "0.6",
        "reqId": "0",
        "status": "error",
        "errors": [{
            "reason": "invalid_query",
            "message": "INVALID_QUERY",
            "detailed_message": detailed_message
        }]
    })
}

pub fn sales_cols() -> Json {
    json!([
        {"id": "A", "label": "country", "type": "string"},
        {"id": "B", "label": "cnt", "type": "number", "pattern": "General"}
    ])
}

pub fn sales_rows() -> Json {
    json!([
        {"c": [{"v": "BR"}, {"v": 1.0, "f": "1"}]},
        {"c": [{"v": "IN"}, {"v": 2.0, "f": "2"}]},
        {"c": [{"v": "BR"}, {"v": 3.0, "f": "3"}]},
        {"c": [{"v": "US"}, {"v": 10.0, "f": "10"}]}
    ])
}

/// A mock serving the sales sheet: the column probe and the full-table
/// fetch used by the fallback engine.
pub fn sales_sheet() -> MockTransport {
    let mock = MockTransport::new();
    mock.answer(ENDPOINT, "SELECT * LIMIT 0", ok_payload(sales_cols(), json!([])));
    mock.answer(ENDPOINT, "SELECT *", ok_payload(sales_cols(), sales_rows()));
    mock
}
