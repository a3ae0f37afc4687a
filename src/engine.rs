//! Statement execution: the remote attempt and the local fallback.
//!
//! ```text
//! parse -> locator -> column probe -> try_remote ─ok──────────> ResultSet
//!                                        └─unsupported─> run_fallback
//! ```
//!
//! Syntax, locator and transport failures end the statement. Only a
//! query-shape failure (something the remote dialect cannot express, or
//! dialect text the remote side rejected) moves it to the fallback engine,
//! and a failure there is returned as is.

use std::sync::Arc;

use sqlparser::ast as sp;

use crate::config::Config;
use crate::convert::ResultSet;
use crate::error::{Error, Result};
use crate::fallback::run_fallback;
use crate::remote::executor::check_payload;
use crate::remote::{Authorizer, ColumnMap, Executor, Transport, UreqTransport};
use crate::sql::locator::{endpoint_url, extract_locator};
use crate::sql::parser::parse_statement;
use crate::sql::processors;
use crate::sql::translator::translate;
use crate::sql::types::QueryTree;

/// Everything a statement needs besides its text. Shared by a connection
/// and its cursors.
pub struct Session {
    pub config: Config,
    transport: Box<dyn Transport>,
    authorizer: Option<Box<dyn Authorizer>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let transport = UreqTransport::new(&config.user_agent, config.timeout());
        Session {
            config,
            transport: Box::new(transport),
            authorizer: None,
        }
    }

    pub fn with_transport(config: Config, transport: impl Transport + 'static) -> Self {
        Session {
            config,
            transport: Box::new(transport),
            authorizer: None,
        }
    }

    pub fn authorize(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Some(Box::new(authorizer));
        self
    }

    pub fn executor(&self) -> Executor<'_> {
        Executor::new(self.transport.as_ref(), self.authorizer.as_deref())
    }

    pub fn into_shared(self) -> Arc<Session> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("authorized", &self.authorizer.is_some())
            .finish()
    }
}

/// Outcome of the remote attempt that is not a hard failure.
#[derive(Debug)]
pub enum Attempt {
    Done(ResultSet),
    /// The remote dialect cannot run the statement as written.
    Unsupported(Error),
}

/// Return early with `Attempt::Unsupported` on a query-shape failure and
/// with `Err` on any other.
macro_rules! shape {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) if e.is_query_shape() => return Ok(Attempt::Unsupported(e)),
            Err(e) => return Err(e),
        }
    };
}

/// Execute one statement (parameters already applied).
pub fn execute(session: &Session, sql: &str, headers: Option<u32>) -> Result<ResultSet> {
    let query = parse_statement(sql)?;
    let locator = extract_locator(&query)?;
    let endpoint = endpoint_url(&locator, &session.config.endpoint_options(headers))?;
    tracing::debug!(%locator, %endpoint, "resolved source");

    let executor = session.executor();
    let columns = ColumnMap::probe(&executor, &endpoint)?;

    match try_remote(&executor, &endpoint, &query, sql, &columns)? {
        Attempt::Done(result) => Ok(result),
        Attempt::Unsupported(err) if session.config.fallback => {
            tracing::warn!(error = %err, "remote dialect cannot run query, using local fallback");
            run_fallback(&executor, &endpoint, &locator, sql)
        }
        Attempt::Unsupported(err) => Err(err),
    }
}

/// Translate and run `query` remotely, then rebuild the requested shape.
pub fn try_remote(
    executor: &Executor<'_>,
    endpoint: &str,
    query: &sp::Query,
    original: &str,
    columns: &ColumnMap,
) -> Result<Attempt> {
    let tree = shape!(QueryTree::from_ast(query));
    let aliases = tree.aliases();

    let (tree, applied) = shape!(processors::pre_process(tree, columns));
    let translated = shape!(translate(&tree, columns));
    tracing::debug!(%translated, "translated query");

    let payload = executor.run_query(endpoint, &translated)?;
    let payload = shape!(check_payload(payload, original, &translated));
    let mut payload = processors::post_process(payload, &applied)?;

    for (alias, col) in aliases.into_iter().zip(payload.table.cols.iter_mut()) {
        if let Some(alias) = alias {
            col.label = alias;
        }
    }

    ResultSet::from_payload(&payload).map(Attempt::Done)
}
