use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::cursor::Cursor;
use crate::config::Config;
use crate::engine::Session;
use crate::error::{Error, Result};
use crate::sql::params::Parameters;

/// Connection to spreadsheet sources.
///
/// Owns the session shared by its cursors and the closed flag of every
/// cursor it handed out, so closing the connection closes them all.
#[derive(Debug)]
pub struct Connection {
    session: Arc<Session>,
    closed: bool,
    cursors: Vec<Arc<AtomicBool>>,
}

impl Connection {
    pub fn new(session: Session) -> Self {
        Connection {
            session: Arc::new(session),
            closed: false,
            cursors: Vec::new(),
        }
    }

    pub fn with_config(config: Config) -> Self {
        Connection::new(Session::new(config))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            return Err(Error::interface("Connection already closed"));
        }
        Ok(())
    }

    /// Close the connection and every cursor it owns. Cursors closed
    /// earlier are skipped.
    pub fn close(&mut self) -> Result<()> {
        self.check_closed()?;
        self.closed = true;
        for flag in self.cursors.drain(..) {
            flag.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// No transactions; only checks the connection is open.
    pub fn commit(&self) -> Result<()> {
        self.check_closed()
    }

    pub fn cursor(&mut self) -> Result<Cursor> {
        self.check_closed()?;
        // Closed or dropped cursors need no cascade.
        self.cursors
            .retain(|f| !f.load(Ordering::Acquire) && Arc::strong_count(f) > 1);
        let flag = Arc::new(AtomicBool::new(false));
        self.cursors.push(flag.clone());
        Ok(Cursor::new(self.session.clone(), flag))
    }

    /// Open a new cursor and run `operation` on it.
    pub fn execute(&mut self, operation: &str, params: Option<&Parameters>) -> Result<Cursor> {
        let mut cursor = self.cursor()?;
        cursor.execute(operation, params)?;
        Ok(cursor)
    }

    pub fn execute_with_headers(
        &mut self,
        operation: &str,
        params: Option<&Parameters>,
        headers: u32,
    ) -> Result<Cursor> {
        let mut cursor = self.cursor()?;
        cursor.execute_with_headers(operation, params, headers)?;
        Ok(cursor)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Connection::with_config(Config::default())
    }
}
