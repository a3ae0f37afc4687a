//! Blocking HTTP transport and request authorization.

use std::time::Duration;

use crate::error::{Error, Result};

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests. Non-2xx statuses are responses, not errors; only
/// failures to complete the exchange are returned as `Err`.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse>;
}

/// Supplies the `Authorization` header value for a request, standing in for
/// whatever credential provider the caller uses.
pub trait Authorizer: Send + Sync {
    fn authorization(&self) -> Result<String>;
}

/// A fixed OAuth bearer token.
#[derive(Clone)]
pub struct BearerToken(pub String);

impl Authorizer for BearerToken {
    fn authorization(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.0))
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

/// `ureq`-backed transport. No timeout is configured unless the caller
/// supplies one.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        UreqTransport {
            agent: builder.build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        UreqTransport::new(concat!("sheet-query/", env!("CARGO_PKG_VERSION")), None)
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(e)) => {
                return Err(Error::remote(format!("request to {} failed: {}", url, e)))
            }
        };
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| Error::remote(format!("failed to read response body: {}", e)))?;
        Ok(HttpResponse { status, body })
    }
}
