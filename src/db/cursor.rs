//! DB-API style cursor.
//!
//! A cursor is fresh until a statement succeeds, then holds a buffer of rows
//! that fetches consume. Closing is terminal: every later call except
//! `close` itself fails with an interface error.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::convert::{ColumnDescription, Row};
use crate::engine::{self, Session};
use crate::error::{Error, Result};
use crate::sql::params::{apply_parameters, Parameters};

pub struct Cursor {
    session: Arc<Session>,
    closed: Arc<AtomicBool>,
    results: Option<VecDeque<Row>>,
    description: Option<Vec<ColumnDescription>>,
    /// Rows returned by `fetchmany(None)`.
    pub arraysize: usize,
}

impl Cursor {
    pub(crate) fn new(session: Arc<Session>, closed: Arc<AtomicBool>) -> Self {
        Cursor {
            session,
            closed,
            results: None,
            description: None,
            arraysize: 1,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_closed(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::interface("Cursor already closed"));
        }
        Ok(())
    }

    fn results(&mut self) -> Result<&mut VecDeque<Row>> {
        self.check_closed()?;
        self.results
            .as_mut()
            .ok_or_else(|| Error::interface("Called before `execute`"))
    }

    /// Run `operation`, substituting `params` first when given.
    pub fn execute(&mut self, operation: &str, params: Option<&Parameters>) -> Result<&mut Self> {
        self.run(operation, params, None)
    }

    /// Like [`execute`](Self::execute), with an explicit header-row count.
    pub fn execute_with_headers(
        &mut self,
        operation: &str,
        params: Option<&Parameters>,
        headers: u32,
    ) -> Result<&mut Self> {
        self.run(operation, params, Some(headers))
    }

    fn run(
        &mut self,
        operation: &str,
        params: Option<&Parameters>,
        headers: Option<u32>,
    ) -> Result<&mut Self> {
        self.check_closed()?;
        self.description = None;
        self.results = None;

        let sql = match params {
            Some(params) => apply_parameters(operation, params)?,
            None => operation.to_string(),
        };
        let result = engine::execute(&self.session, &sql, headers)?;

        self.description = Some(result.description);
        self.results = Some(result.rows.into());
        Ok(self)
    }

    pub fn executemany(&mut self, _operation: &str, _seq_of_params: &[Parameters]) -> Result<()> {
        self.check_closed()?;
        Err(Error::NotSupported(
            "`executemany` is not supported, use `execute` instead".to_string(),
        ))
    }

    /// Next row, or `None` when the buffer is exhausted.
    pub fn fetchone(&mut self) -> Result<Option<Row>> {
        Ok(self.results()?.pop_front())
    }

    /// Up to `size` rows (`arraysize` when `None`).
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        let size = size.unwrap_or(self.arraysize);
        let results = self.results()?;
        let n = size.min(results.len());
        Ok(results.drain(..n).collect())
    }

    /// All remaining rows.
    pub fn fetchall(&mut self) -> Result<Vec<Row>> {
        Ok(self.results()?.drain(..).collect())
    }

    /// Rows still in the buffer.
    pub fn rowcount(&mut self) -> Result<usize> {
        Ok(self.results()?.len())
    }

    /// Column descriptions of the last successful statement.
    pub fn description(&self) -> Result<Option<&[ColumnDescription]>> {
        self.check_closed()?;
        Ok(self.description.as_deref())
    }

    pub fn close(&mut self) -> Result<()> {
        self.check_closed()?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    pub fn set_input_sizes(&self, _sizes: &[usize]) -> Result<()> {
        self.check_closed()
    }

    pub fn set_output_sizes(&self, _size: usize, _column: Option<usize>) -> Result<()> {
        self.check_closed()
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("closed", &self.is_closed())
            .field("rows", &self.results.as_ref().map(VecDeque::len))
            .field("arraysize", &self.arraysize)
            .finish()
    }
}
