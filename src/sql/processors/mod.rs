//! Rewrite rules for SQL idioms the remote dialect lacks.
//!
//! Each rule rewrites the tree before translation and reverses its rewrite
//! on the returned payload. Rules run in a fixed order on the way in and in
//! reverse order on the way out, so each post stage sees exactly the columns
//! its own pre stage produced. A rule keeps no state of its own: what it
//! needs to reverse the rewrite is returned as a [`Rewrite`] and handed back
//! to its post stage.

pub mod count_star;
pub mod date_trunc;

use super::types::{Expr, QueryTree};
use crate::error::{Error, Result};
use crate::remote::{Column, ColumnMap, Payload};

pub use count_star::CountStar;
pub use date_trunc::DateTrunc;

/// One output column a rule removed from the select list and must restore.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    /// Index of the item in the select list before the rewrite.
    pub position: usize,
    pub alias: Option<String>,
    pub expr: Expr,
    /// Indexes, in the rewritten select list, of the columns the restored
    /// value is computed from.
    pub sources: Vec<usize>,
}

/// What a rule's pre stage did, threaded into its post stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rewrite {
    pub restored: Vec<Restored>,
}

pub trait Processor: Send + Sync {
    /// Alias prefix marking select items this rule injected.
    fn namespace(&self) -> &'static str;

    fn matches(&self, tree: &QueryTree) -> bool;

    fn pre_process(&self, tree: QueryTree, columns: &ColumnMap) -> Result<(QueryTree, Rewrite)>;

    /// `aliases` are the select aliases as this rule's pre stage left them,
    /// positionally aligned with the payload's columns.
    fn post_process(
        &self,
        payload: Payload,
        aliases: &[Option<String>],
        rewrite: &Rewrite,
    ) -> Result<Payload>;

    fn is_injected(&self, alias: &Option<String>) -> bool {
        alias
            .as_deref()
            .is_some_and(|a| a.starts_with(self.namespace()))
    }
}

static PROCESSORS: [&dyn Processor; 2] = [&CountStar, &DateTrunc];

/// A rule that matched, with the record needed to reverse it.
pub struct Applied {
    processor: &'static dyn Processor,
    rewrite: Rewrite,
    aliases: Vec<Option<String>>,
}

impl Applied {
    pub fn namespace(&self) -> &'static str {
        self.processor.namespace()
    }
}

impl std::fmt::Debug for Applied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Applied")
            .field("processor", &self.processor.namespace())
            .field("rewrite", &self.rewrite)
            .field("aliases", &self.aliases)
            .finish()
    }
}

/// Run every matching rule's pre stage, in order.
pub fn pre_process(mut tree: QueryTree, columns: &ColumnMap) -> Result<(QueryTree, Vec<Applied>)> {
    let mut applied = Vec::new();
    for processor in PROCESSORS.iter().copied() {
        if !processor.matches(&tree) {
            continue;
        }
        let (rewritten, rewrite) = processor.pre_process(tree, columns)?;
        tracing::debug!(processor = processor.namespace(), rewritten = %rewritten, "pre-processed");
        applied.push(Applied {
            processor,
            rewrite,
            aliases: rewritten.aliases(),
        });
        tree = rewritten;
    }
    Ok((tree, applied))
}

/// Run the post stages of `applied`, last rule first.
pub fn post_process(mut payload: Payload, applied: &[Applied]) -> Result<Payload> {
    for step in applied.iter().rev() {
        payload = step
            .processor
            .post_process(payload, &step.aliases, &step.rewrite)?;
    }
    Ok(payload)
}

/// Split the payload's columns into kept columns and the injected mask,
/// failing if the payload does not line up with the select list.
pub(crate) fn injected_mask(
    processor: &dyn Processor,
    payload: &Payload,
    aliases: &[Option<String>],
) -> Result<Vec<bool>> {
    if payload.table.cols.len() != aliases.len() {
        return Err(Error::remote(format!(
            "payload has {} columns, query selected {}",
            payload.table.cols.len(),
            aliases.len()
        )));
    }
    Ok(aliases.iter().map(|a| processor.is_injected(a)).collect())
}

/// Drop masked entries, then insert `(position, item)` pairs in ascending
/// position order.
pub(crate) fn splice<T>(items: Vec<T>, mask: &[bool], mut inserts: Vec<(usize, T)>) -> Vec<T> {
    let mut kept: Vec<T> = items
        .into_iter()
        .zip(mask.iter().chain(std::iter::repeat(&false)))
        .filter(|(_, injected)| !**injected)
        .map(|(item, _)| item)
        .collect();
    inserts.sort_by_key(|(position, _)| *position);
    for (position, item) in inserts {
        let position = position.min(kept.len());
        kept.insert(position, item);
    }
    kept
}

/// Replace the payload's columns, keeping their order otherwise.
pub(crate) fn splice_columns(
    payload: &mut Payload,
    mask: &[bool],
    inserts: Vec<(usize, Column)>,
) {
    let cols = std::mem::take(&mut payload.table.cols);
    payload.table.cols = splice(cols, mask, inserts);
}

/// True when `expr` calls `name`, case-insensitively.
pub(crate) fn is_call(expr: &Expr, name: &str) -> bool {
    matches!(expr, Expr::Function { name: n, .. } if n.eq_ignore_ascii_case(name))
}
