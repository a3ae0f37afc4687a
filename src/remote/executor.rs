//! Runs remote dialect text against a query endpoint.

use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use super::payload::{Payload, PayloadError, Status};
use super::transport::{Authorizer, Transport};
use crate::error::{caret_diagnostic, Diagnostic, Error, Position, Result};

/// Anti-hijacking prefix the endpoint may put before the JSON body.
pub const LEADING: &str = ")]}'\n";

/// Characters escaped in the `tq` parameter: everything except unreserved
/// characters and `/`, `(`, `)`.
const TQ_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/')
    .remove(b'(')
    .remove(b')');

static REMOTE_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"line (\d+), column (\d+)").expect("static regex"));

pub struct Executor<'a> {
    transport: &'a dyn Transport,
    authorizer: Option<&'a dyn Authorizer>,
}

impl<'a> Executor<'a> {
    pub fn new(transport: &'a dyn Transport, authorizer: Option<&'a dyn Authorizer>) -> Self {
        Executor {
            transport,
            authorizer,
        }
    }

    /// GET `<endpoint>&tq=<query>` and decode the payload.
    ///
    /// The payload's own `status` is not inspected here; see
    /// [`check_payload`].
    pub fn run_query(&self, endpoint: &str, query: &str) -> Result<Payload> {
        let url = query_url(endpoint, query);
        tracing::debug!(%url, "remote query");

        let mut headers = vec![("X-DataSource-Auth", "true".to_string())];
        if let Some(authorizer) = self.authorizer {
            headers.push(("Authorization", authorizer.authorization()?));
        }

        let response = self.transport.get(&url, &headers)?;
        if !response.is_success() {
            return Err(Error::Remote(response.body));
        }
        decode_payload(&response.body)
    }
}

pub fn query_url(endpoint: &str, query: &str) -> String {
    format!(
        "{}&tq={}",
        endpoint,
        utf8_percent_encode(query, TQ_ENCODE_SET)
    )
}

/// Decode a response body, stripping [`LEADING`] when present.
pub fn decode_payload(body: &str) -> Result<Payload> {
    let json = body.strip_prefix(LEADING).unwrap_or(body);
    serde_json::from_str(json).map_err(|e| Error::remote(format!("invalid payload: {}", e)))
}

/// Turn an error payload into a programming error carrying both query texts.
pub fn check_payload(payload: Payload, original: &str, translated: &str) -> Result<Payload> {
    if payload.status != Status::Error {
        return Ok(payload);
    }
    let position = payload.errors.iter().find_map(|e| find_position(e.text()));
    Err(Error::Programming {
        message: format_remote_error(original, translated, &payload.errors),
        diagnostic: Some(Diagnostic {
            original: original.to_string(),
            translated: Some(translated.to_string()),
            position,
        }),
    })
}

fn find_position(message: &str) -> Option<Position> {
    let caps = REMOTE_POSITION.captures(message)?;
    Some(Position {
        line: caps.get(1)?.as_str().parse().ok()?,
        column: caps.get(2)?.as_str().parse().ok()?,
    })
}

pub fn format_remote_error(original: &str, translated: &str, errors: &[PayloadError]) -> String {
    let messages: Vec<String> = errors
        .iter()
        .map(|e| {
            let text = e.text();
            match find_position(text) {
                Some(position) => caret_diagnostic(translated, position, text),
                None => text.to_string(),
            }
        })
        .collect();
    format!(
        "Original query:\n{}\n\nTranslated query:\n{}\n\nError{}:\n{}",
        original,
        translated,
        if errors.len() > 1 { "s" } else { "" },
        messages.join("\n")
    )
}
