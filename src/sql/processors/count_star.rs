//! `COUNT(*)` emulation.
//!
//! The remote dialect only counts non-null values of a named column. The
//! pre stage replaces each `COUNT(*)` item with one `COUNT(<label>)` per
//! known column; the post stage takes the largest of those counts as the
//! row count. That is exact only when some column is non-null in every row.

use super::{injected_mask, is_call, splice, splice_columns, Processor, Restored, Rewrite};
use crate::error::{Error, Result};
use crate::remote::{Cell, Column, ColumnMap, ColumnType, Payload, TableRow};
use crate::sql::types::{Expr, QueryTree, SelectItem};

pub const COUNT_STAR_ID: &str = "count-star";
pub const COUNT_STAR_LABEL: &str = "count star";

pub struct CountStar;

fn is_count_star(expr: &Expr) -> bool {
    is_call(expr, "count") && matches!(expr, Expr::Function { args, .. } if args.as_slice() == [Expr::Star])
}

impl Processor for CountStar {
    fn namespace(&self) -> &'static str {
        "__CountStar__"
    }

    fn matches(&self, tree: &QueryTree) -> bool {
        tree.select.iter().any(|item| is_count_star(&item.expr))
    }

    fn pre_process(&self, mut tree: QueryTree, columns: &ColumnMap) -> Result<(QueryTree, Rewrite)> {
        tracing::warn!("COUNT(*) is emulated and only exact if at least one column has no nulls");

        if tree.has_star() {
            return Err(Error::unsupported("COUNT(*) cannot be combined with *"));
        }
        if columns.is_empty() {
            return Err(Error::unsupported("COUNT(*) on a source with no columns"));
        }

        let mut rewrite = Rewrite::default();
        let mut select = Vec::with_capacity(tree.select.len() + columns.len());
        for (position, item) in std::mem::take(&mut tree.select).into_iter().enumerate() {
            if is_count_star(&item.expr) {
                rewrite.restored.push(Restored {
                    position,
                    alias: item.alias,
                    expr: item.expr,
                    sources: Vec::new(),
                });
            } else {
                select.push(item);
            }
        }

        let first = select.len();
        for label in columns.labels() {
            select.push(SelectItem::aliased(
                Expr::function("COUNT", vec![Expr::column(label)]),
                format!("{}{}", self.namespace(), label),
            ));
        }
        let sources: Vec<usize> = (first..select.len()).collect();
        for restored in &mut rewrite.restored {
            restored.sources = sources.clone();
        }

        tree.select = select;
        Ok((tree, rewrite))
    }

    fn post_process(
        &self,
        mut payload: Payload,
        aliases: &[Option<String>],
        rewrite: &Rewrite,
    ) -> Result<Payload> {
        let mask = injected_mask(self, &payload, aliases)?;

        let columns = rewrite
            .restored
            .iter()
            .map(|r| {
                let label = r.alias.clone().unwrap_or_else(|| COUNT_STAR_LABEL.to_string());
                (r.position, Column::new(COUNT_STAR_ID, label, ColumnType::Number))
            })
            .collect();
        splice_columns(&mut payload, &mask, columns);

        let rows = std::mem::take(&mut payload.table.rows);
        payload.table.rows = rows
            .into_iter()
            .map(|row| {
                let count = row_count(&row, &mask)?;
                let inserts = rewrite
                    .restored
                    .iter()
                    .map(|r| (r.position, Some(Cell::value(count))))
                    .collect();
                Ok(TableRow {
                    c: splice(row.c, &mask, inserts),
                })
            })
            .collect::<Result<_>>()?;

        // Zero counts are omitted remotely, so an empty payload still
        // reports one row counting zero. Other cells stay absent.
        if payload.table.rows.is_empty() {
            let c = payload
                .table
                .cols
                .iter()
                .map(|col| (col.id == COUNT_STAR_ID).then(|| Cell::value(0)))
                .collect();
            payload.table.rows.push(TableRow { c });
        }

        Ok(payload)
    }
}

/// Largest injected count in `row`; absent cells count as zero.
fn row_count(row: &TableRow, mask: &[bool]) -> Result<u64> {
    let mut max = 0u64;
    for (cell, _) in row.c.iter().zip(mask).filter(|(_, injected)| **injected) {
        let value = match cell.as_ref().and_then(|c| c.v.as_ref()) {
            None | Some(serde_json::Value::Null) => 0,
            Some(v) => v
                .as_f64()
                .filter(|n| *n >= 0.0)
                .map(|n| n as u64)
                .ok_or_else(|| Error::remote(format!("non-numeric count: {}", v)))?,
        };
        max = max.max(value);
    }
    Ok(max)
}
