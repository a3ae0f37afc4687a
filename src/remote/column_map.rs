//! Label to remote-identifier mapping for one source.

use super::executor::Executor;
use crate::error::{Error, Result};

/// Ordered `label -> id` pairs with unique labels, sorted by label.
///
/// Built from a zero-row probe on every execution; never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    entries: Vec<(String, String)>,
}

impl ColumnMap {
    /// Build a map from `(label, id)` pairs. Entries are sorted by label and
    /// a repeated label keeps its first id.
    pub fn new<L, I>(pairs: impl IntoIterator<Item = (L, I)>) -> Self
    where
        L: Into<String>,
        I: Into<String>,
    {
        let mut entries: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(l, i)| (l.into(), i.into()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|later, earlier| later.0 == earlier.0);
        ColumnMap { entries }
    }

    /// Probe `endpoint` with `SELECT * LIMIT 0`.
    ///
    /// Any failure, including an error payload, is a remote error: the
    /// source itself is unreachable, so the statement cannot fall back.
    pub fn probe(executor: &Executor<'_>, endpoint: &str) -> Result<Self> {
        let payload = executor
            .run_query(endpoint, "SELECT * LIMIT 0")
            .map_err(|e| match e {
                Error::Remote(_) => e,
                other => Error::remote(format!("column probe failed: {}", other)),
            })?;
        if payload.status == super::payload::Status::Error {
            let messages: Vec<&str> = payload.errors.iter().map(|e| e.text()).collect();
            return Err(Error::remote(format!(
                "column probe failed: {}",
                messages.join("; ")
            )));
        }
        Ok(ColumnMap::new(
            payload
                .table
                .cols
                .into_iter()
                .map(|col| (col.label, col.id)),
        ))
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .binary_search_by(|(l, _)| l.as_str().cmp(label))
            .ok()
            .map(|i| self.entries[i].1.as_str())
    }

    /// Labels in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
