//! Renders a Query Tree as remote dialect text.
//!
//! The remote endpoint addresses columns by identifier and labels result
//! columns itself, so translation replaces labels with identifiers and drops
//! every select alias. Callers keep [`QueryTree::aliases`] to reattach them
//! to the result.

use super::types::{Expr, Literal, OrderItem, QueryTree, SelectItem};
use crate::error::{Error, Result};
use crate::remote::ColumnMap;

/// Translate `tree` into remote dialect text. Pure: the same tree and map
/// always produce the same text.
pub fn translate(tree: &QueryTree, columns: &ColumnMap) -> Result<String> {
    if tree.having.is_some() {
        return Err(Error::unsupported("HAVING is not supported by the remote dialect"));
    }

    let unquotable = tree
        .select
        .iter()
        .map(|item| &item.expr)
        .chain(tree.selection.iter())
        .chain(tree.group_by.iter())
        .chain(tree.order_by.iter().map(|o| &o.expr))
        .find_map(|e| e.find_literal(&|lit: &Literal| !lit.is_quotable()));
    if let Some(lit) = unquotable {
        return Err(Error::unsupported(format!(
            "string literal mixes both quote characters: {:?}",
            lit
        )));
    }

    let to_id = |name: String| match columns.get(&name) {
        Some(id) => id.to_string(),
        None => name,
    };

    let mut remote = QueryTree::new(tree.from.clone());
    remote.select = tree
        .select
        .iter()
        .map(|item| SelectItem::new(item.expr.clone().map_columns(&to_id)))
        .collect();
    remote.selection = tree.selection.clone().map(|e| e.map_columns(&to_id));
    remote.group_by = tree
        .group_by
        .iter()
        .map(|e| e.clone().map_columns(&to_id))
        .collect();
    remote.order_by = tree
        .order_by
        .iter()
        .map(|o| OrderItem {
            expr: resolve_alias(&o.expr, &tree.select).map_columns(&to_id),
            direction: o.direction,
        })
        .collect();
    remote.limit = tree.limit;
    remote.offset = tree.offset;

    Ok(remote.to_string())
}

/// An ORDER BY entry that is exactly a select alias becomes the aliased
/// expression. Aliases nested inside larger expressions are left alone.
fn resolve_alias(expr: &Expr, select: &[SelectItem]) -> Expr {
    if let Expr::Column(name) = expr {
        if let Some(item) = select
            .iter()
            .find(|item| item.alias.as_deref() == Some(name.as_str()))
        {
            return item.expr.clone();
        }
    }
    expr.clone()
}
