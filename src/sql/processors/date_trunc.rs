//! `datetrunc('<granularity>', column)` emulation.
//!
//! ```text
//! SELECT time, datetrunc('month', time) FROM "http://example.com"
//! ```
//!
//! is sent as
//!
//! ```text
//! SELECT time, year(time), month(time)
//! ```
//!
//! and the post stage rebuilds `Date(Y,M,1,0,0,0)` from the extracted
//! components, padding everything below the requested granularity.

use super::{injected_mask, is_call, splice, splice_columns, Processor, Restored, Rewrite};
use crate::convert::format_date_literal;
use crate::error::{Error, Result};
use crate::remote::{Cell, Column, ColumnMap, ColumnType, Payload, TableRow};
use crate::sql::types::{Expr, Literal, OrderItem, QueryTree, SelectItem};

pub const GRANULARITIES: [&str; 6] = ["year", "month", "day", "hour", "minute", "second"];

/// Value used for each component below the requested granularity. Month is
/// zero-based, like the remote extraction function.
const LOWER_BOUNDS: [i64; 6] = [0, 0, 1, 0, 0, 0];

pub struct DateTrunc;

/// A validated `datetrunc` call: granularity index and column label.
#[derive(Debug, Clone, PartialEq)]
struct TruncCall {
    level: usize,
    column: String,
}

impl TruncCall {
    fn granularity(&self) -> &'static str {
        GRANULARITIES[self.level]
    }

    fn id(&self) -> String {
        format!("datetrunc-{}-{}", self.column, self.granularity())
    }

    /// One extraction call per level, from `year` down to the requested one.
    fn extractions(&self) -> impl Iterator<Item = (&'static str, Expr)> + '_ {
        GRANULARITIES[..=self.level]
            .iter()
            .map(|g| (*g, Expr::function(*g, vec![Expr::column(&self.column)])))
    }
}

/// `Ok(None)` when `expr` is not a `datetrunc` call at all.
fn trunc_call(expr: &Expr) -> Result<Option<TruncCall>> {
    if !is_call(expr, "datetrunc") {
        return Ok(None);
    }
    let Expr::Function { args, .. } = expr else {
        return Ok(None);
    };
    match args.as_slice() {
        [Expr::Literal(Literal::String(granularity)), Expr::Column(column)] => {
            let level = GRANULARITIES
                .iter()
                .position(|g| g.eq_ignore_ascii_case(granularity))
                .ok_or_else(|| {
                    Error::unsupported(format!("invalid datetrunc granularity: '{}'", granularity))
                })?;
            Ok(Some(TruncCall {
                level,
                column: column.clone(),
            }))
        }
        _ => Err(Error::unsupported(format!(
            "datetrunc expects a granularity literal and a column, got {}",
            expr
        ))),
    }
}

impl Processor for DateTrunc {
    fn namespace(&self) -> &'static str {
        "__DateTrunc__"
    }

    fn matches(&self, tree: &QueryTree) -> bool {
        let is_trunc = |e: &Expr| is_call(e, "datetrunc");
        tree.select.iter().any(|item| is_trunc(&item.expr))
            || tree.group_by.iter().any(is_trunc)
            || tree.order_by.iter().any(|o| is_trunc(&o.expr))
    }

    fn pre_process(&self, mut tree: QueryTree, _columns: &ColumnMap) -> Result<(QueryTree, Rewrite)> {
        let mut rewrite = Rewrite::default();

        // ORDER BY may name a truncated column by its alias.
        let trunc_aliases: Vec<(String, Expr)> = tree
            .select
            .iter()
            .filter(|item| is_call(&item.expr, "datetrunc"))
            .filter_map(|item| Some((item.alias.clone()?, item.expr.clone())))
            .collect();

        let mut select: Vec<SelectItem> = Vec::with_capacity(tree.select.len());
        for (position, item) in std::mem::take(&mut tree.select).into_iter().enumerate() {
            let Some(call) = trunc_call(&item.expr)? else {
                select.push(item);
                continue;
            };
            let mut sources = Vec::with_capacity(call.level + 1);
            for (granularity, expr) in call.extractions() {
                let index = match select.iter().position(|s| s.expr == expr) {
                    Some(existing) => existing,
                    None => {
                        let alias =
                            format!("{}{}__{}", self.namespace(), granularity, call.column);
                        select.push(SelectItem::aliased(expr, alias));
                        select.len() - 1
                    }
                };
                sources.push(index);
            }
            rewrite.restored.push(Restored {
                position,
                alias: item.alias,
                expr: item.expr,
                sources,
            });
        }
        tree.select = select;

        let mut group_by: Vec<Expr> = Vec::with_capacity(tree.group_by.len());
        for expr in std::mem::take(&mut tree.group_by) {
            let expanded = match trunc_call(&expr)? {
                Some(call) => call.extractions().map(|(_, e)| e).collect(),
                None => vec![expr],
            };
            for expr in expanded {
                if !group_by.contains(&expr) {
                    group_by.push(expr);
                }
            }
        }
        tree.group_by = group_by;

        let mut order_by: Vec<OrderItem> = Vec::with_capacity(tree.order_by.len());
        for item in std::mem::take(&mut tree.order_by) {
            let resolved = match &item.expr {
                Expr::Column(name) => trunc_aliases
                    .iter()
                    .find(|(alias, _)| alias == name)
                    .map(|(_, e)| e.clone()),
                _ => None,
            };
            let expr = resolved.unwrap_or(item.expr);
            match trunc_call(&expr)? {
                Some(call) => order_by.extend(call.extractions().map(|(_, e)| OrderItem {
                    expr: e,
                    direction: item.direction,
                })),
                None => order_by.push(OrderItem {
                    expr,
                    direction: item.direction,
                }),
            }
        }
        tree.order_by = order_by;

        Ok((tree, rewrite))
    }

    fn post_process(
        &self,
        mut payload: Payload,
        aliases: &[Option<String>],
        rewrite: &Rewrite,
    ) -> Result<Payload> {
        let mask = injected_mask(self, &payload, aliases)?;

        let calls = rewrite
            .restored
            .iter()
            .map(|r| {
                trunc_call(&r.expr)?
                    .ok_or_else(|| Error::unsupported(format!("not a datetrunc call: {}", r.expr)))
            })
            .collect::<Result<Vec<_>>>()?;

        let columns = rewrite
            .restored
            .iter()
            .zip(&calls)
            .map(|(r, call)| {
                let id = call.id();
                let label = r.alias.clone().unwrap_or_else(|| id.clone());
                (r.position, Column::new(id, label, ColumnType::Datetime))
            })
            .collect();
        splice_columns(&mut payload, &mask, columns);

        let rows = std::mem::take(&mut payload.table.rows);
        payload.table.rows = rows
            .into_iter()
            .map(|row| {
                let inserts = rewrite
                    .restored
                    .iter()
                    .zip(&calls)
                    .map(|(r, call)| Ok((r.position, truncated_value(&row, &r.sources, call)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TableRow {
                    c: splice(row.c, &mask, inserts),
                })
            })
            .collect::<Result<_>>()?;

        Ok(payload)
    }
}

/// Rebuild the six-component date literal for one row. Any missing
/// component makes the whole value absent.
fn truncated_value(row: &TableRow, sources: &[usize], call: &TruncCall) -> Result<Option<Cell>> {
    let mut components = LOWER_BOUNDS;
    for (level, &index) in sources.iter().enumerate().take(call.level + 1) {
        let value = row.c.get(index).and_then(|c| c.as_ref()).and_then(|c| c.v.as_ref());
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let number = value.as_f64().ok_or_else(|| {
            Error::remote(format!(
                "non-numeric {} component for {}: {}",
                GRANULARITIES[level], call.column, value
            ))
        })?;
        components[level] = number as i64;
    }
    Ok(Some(Cell::value(format_date_literal(&components))))
}
