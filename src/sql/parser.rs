//! SQL parser wrapping `sqlparser-rs`.
//!
//! Converts a SQL string into a [`QueryTree`]. Parsing happens in two steps
//! so the caller can tell them apart:
//!
//! - [`parse_statement`] runs the grammar. Failure is a syntax error with a
//!   caret rendered into the original text.
//! - [`QueryTree::from_ast`] converts the AST. Failure means the statement is
//!   valid SQL but uses a shape the tree cannot model (CASE, subqueries,
//!   DISTINCT, ...), reported as [`Error::UnsupportedQuery`].

use std::sync::LazyLock;

use regex::Regex;
use sqlparser::ast::{
    self as sp, DataType, Expr as SpExpr, FunctionArg, FunctionArgExpr, GroupByExpr,
    SelectItem as SpSelectItem, SetExpr, Statement, TableFactor,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::types::{
    BinaryOperator, Expr, Literal, OrderItem, QueryTree, SelectItem, SortDirection,
    UnaryOperator,
};
use crate::error::{caret_diagnostic, Diagnostic, Error, Position, Result};

static PARSER_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Line: (\d+), Column: (\d+)").expect("static regex"));

/// Parse a SQL string into a Query Tree.
pub fn parse_query(sql: &str) -> Result<QueryTree> {
    let query = parse_statement(sql)?;
    QueryTree::from_ast(&query)
}

/// Run the grammar over `sql`, requiring exactly one SELECT statement.
pub fn parse_statement(sql: &str) -> Result<sp::Query> {
    let dialect = GenericDialect {};
    let mut statements = Parser::parse_sql(&dialect, sql).map_err(|e| syntax_error(sql, &e.to_string()))?;

    if statements.len() != 1 {
        return Err(syntax_error(
            sql,
            &format!("expected exactly one statement, got {}", statements.len()),
        ));
    }

    match statements.remove(0) {
        Statement::Query(query) => Ok(*query),
        _ => Err(Error::unsupported("only SELECT statements are supported")),
    }
}

fn syntax_error(sql: &str, message: &str) -> Error {
    let position = PARSER_POSITION.captures(message).and_then(|caps| {
        let line = caps.get(1)?.as_str().parse().ok()?;
        let column = caps.get(2)?.as_str().parse().ok()?;
        Some(Position { line, column })
    });
    let rendered = match position {
        Some(position) => caret_diagnostic(sql, position, message),
        None => message.to_string(),
    };
    Error::Syntax {
        message: rendered,
        diagnostic: Diagnostic {
            original: sql.to_string(),
            translated: None,
            position,
        },
    }
}

/// The SELECT body of a query, rejecting set operations.
pub(crate) fn select_body(query: &sp::Query) -> Result<&sp::Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Ok(select.as_ref()),
        _ => Err(Error::unsupported(
            "only simple SELECT queries are supported (no UNION, INTERSECT, etc.)",
        )),
    }
}

impl QueryTree {
    /// Convert a sqlparser query into a Query Tree.
    pub fn from_ast(query: &sp::Query) -> Result<QueryTree> {
        if query.with.is_some() {
            return Err(Error::unsupported("WITH clauses are not supported"));
        }
        let select = select_body(query)?;
        if select.distinct.is_some() {
            return Err(Error::unsupported("DISTINCT is not supported"));
        }

        let mut tree = QueryTree::new(extract_table_name(select)?);
        tree.select = convert_select_items(&select.projection)?;
        tree.selection = select.selection.as_ref().map(convert_expr).transpose()?;
        tree.group_by = convert_group_by(&select.group_by)?;
        tree.having = select.having.as_ref().map(convert_expr).transpose()?;

        if let Some(order_by) = &query.order_by {
            tree.order_by = order_by
                .exprs
                .iter()
                .map(|o| {
                    let direction = o.asc.map(|asc| {
                        if asc {
                            SortDirection::Asc
                        } else {
                            SortDirection::Desc
                        }
                    });
                    Ok(OrderItem {
                        expr: convert_expr(&o.expr)?,
                        direction,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
        }

        if let Some(limit) = &query.limit {
            tree.limit = Some(extract_count(limit, "LIMIT")?);
        }
        if let Some(offset) = &query.offset {
            tree.offset = Some(extract_count(&offset.value, "OFFSET")?);
        }

        Ok(tree)
    }
}

/// Extract the single source name from the FROM clause.
fn extract_table_name(select: &sp::Select) -> Result<String> {
    if select.from.is_empty() {
        return Err(Error::unsupported("missing FROM clause"));
    }
    if select.from.len() > 1 {
        return Err(Error::unsupported("multiple FROM tables (joins) not supported"));
    }

    let table_with_joins = &select.from[0];
    if !table_with_joins.joins.is_empty() {
        return Err(Error::unsupported("JOINs not supported"));
    }

    match &table_with_joins.relation {
        TableFactor::Table { name, .. } => {
            let parts: Vec<String> = name.0.iter().map(|ident| ident.value.clone()).collect();
            Ok(parts.join("."))
        }
        _ => Err(Error::unsupported(
            "only simple table references are supported in FROM",
        )),
    }
}

fn convert_select_items(items: &[SpSelectItem]) -> Result<Vec<SelectItem>> {
    items
        .iter()
        .map(|item| match item {
            SpSelectItem::UnnamedExpr(expr) => Ok(SelectItem::new(convert_expr(expr)?)),
            SpSelectItem::ExprWithAlias { expr, alias } => {
                Ok(SelectItem::aliased(convert_expr(expr)?, alias.value.clone()))
            }
            SpSelectItem::Wildcard(_) => Ok(SelectItem::new(Expr::Star)),
            SpSelectItem::QualifiedWildcard(_, _) => {
                Err(Error::unsupported("qualified wildcards are not supported"))
            }
        })
        .collect()
}

fn convert_group_by(group_by: &GroupByExpr) -> Result<Vec<Expr>> {
    match group_by {
        GroupByExpr::All(_) => Err(Error::unsupported("GROUP BY ALL not supported")),
        GroupByExpr::Expressions(exprs, _modifiers) => exprs.iter().map(convert_expr).collect(),
    }
}

/// Convert a sqlparser expression to our Expr type.
fn convert_expr(expr: &SpExpr) -> Result<Expr> {
    let boxed = |e: &SpExpr| convert_expr(e).map(Box::new);
    match expr {
        SpExpr::Identifier(ident) => Ok(Expr::Column(ident.value.clone())),

        // Qualified column (t.col): the source is implicit, keep the last part
        SpExpr::CompoundIdentifier(parts) => parts
            .last()
            .map(|i| Expr::Column(i.value.clone()))
            .ok_or_else(|| Error::unsupported("empty compound identifier")),

        SpExpr::Value(val) => convert_value(val).map(Expr::Literal),

        SpExpr::TypedString {
            data_type, value, ..
        } => {
            let literal = match data_type {
                DataType::Date => Literal::Date(value.clone()),
                DataType::Datetime(_) | DataType::Timestamp(_, _) => Literal::DateTime(value.clone()),
                DataType::Time(_, _) => Literal::TimeOfDay(value.clone()),
                other => {
                    return Err(Error::unsupported(format!(
                        "typed literal not supported: {}",
                        other
                    )))
                }
            };
            Ok(Expr::Literal(literal))
        }

        SpExpr::UnaryOp { op, expr: inner } => {
            let op = match op {
                sp::UnaryOperator::Not => UnaryOperator::Not,
                sp::UnaryOperator::Minus => UnaryOperator::Minus,
                sp::UnaryOperator::Plus => UnaryOperator::Plus,
                other => {
                    return Err(Error::unsupported(format!(
                        "unary operator not supported: {}",
                        other
                    )))
                }
            };
            Ok(Expr::UnaryOp {
                op,
                expr: boxed(inner)?,
            })
        }

        SpExpr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
            left: boxed(left)?,
            op: convert_binop(op)?,
            right: boxed(right)?,
        }),

        SpExpr::IsNull(inner) => Ok(Expr::IsNull {
            expr: boxed(inner)?,
            negated: false,
        }),
        SpExpr::IsNotNull(inner) => Ok(Expr::IsNull {
            expr: boxed(inner)?,
            negated: true,
        }),

        SpExpr::InList {
            expr: inner,
            list,
            negated,
            ..
        } => Ok(Expr::InList {
            expr: boxed(inner)?,
            list: list.iter().map(convert_expr).collect::<Result<_>>()?,
            negated: *negated,
        }),

        SpExpr::Between {
            expr: inner,
            negated,
            low,
            high,
            ..
        } => Ok(Expr::Between {
            expr: boxed(inner)?,
            low: boxed(low)?,
            high: boxed(high)?,
            negated: *negated,
        }),

        SpExpr::Like {
            negated,
            expr: inner,
            pattern,
            escape_char,
            ..
        } => {
            if escape_char.is_some() {
                return Err(Error::unsupported("LIKE ... ESCAPE is not supported"));
            }
            Ok(Expr::Like {
                expr: boxed(inner)?,
                pattern: boxed(pattern)?,
                negated: *negated,
            })
        }

        SpExpr::Function(func) => convert_function(func),

        SpExpr::Nested(inner) => Ok(Expr::Nested(boxed(inner)?)),

        other => Err(Error::unsupported(format!(
            "expression not supported: {}",
            other
        ))),
    }
}

fn convert_value(val: &sp::Value) -> Result<Literal> {
    match val {
        sp::Value::Number(s, _) => Ok(Literal::Number(s.clone())),
        sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
            Ok(Literal::String(s.clone()))
        }
        sp::Value::Boolean(b) => Ok(Literal::Boolean(*b)),
        sp::Value::Null => Ok(Literal::Null),
        other => Err(Error::unsupported(format!("value not supported: {}", other))),
    }
}

fn convert_binop(op: &sp::BinaryOperator) -> Result<BinaryOperator> {
    match op {
        sp::BinaryOperator::Plus => Ok(BinaryOperator::Plus),
        sp::BinaryOperator::Minus => Ok(BinaryOperator::Minus),
        sp::BinaryOperator::Multiply => Ok(BinaryOperator::Multiply),
        sp::BinaryOperator::Divide => Ok(BinaryOperator::Divide),
        sp::BinaryOperator::Modulo => Ok(BinaryOperator::Modulo),
        sp::BinaryOperator::Eq => Ok(BinaryOperator::Eq),
        sp::BinaryOperator::NotEq => Ok(BinaryOperator::NotEq),
        sp::BinaryOperator::Lt => Ok(BinaryOperator::Lt),
        sp::BinaryOperator::LtEq => Ok(BinaryOperator::LtEq),
        sp::BinaryOperator::Gt => Ok(BinaryOperator::Gt),
        sp::BinaryOperator::GtEq => Ok(BinaryOperator::GtEq),
        sp::BinaryOperator::And => Ok(BinaryOperator::And),
        sp::BinaryOperator::Or => Ok(BinaryOperator::Or),
        other => Err(Error::unsupported(format!(
            "binary operator not supported: {}",
            other
        ))),
    }
}

fn convert_function(func: &sp::Function) -> Result<Expr> {
    if func.over.is_some() || func.filter.is_some() || !func.within_group.is_empty() {
        return Err(Error::unsupported(format!(
            "window or filtered aggregate not supported: {}",
            func
        )));
    }

    let name = func
        .name
        .0
        .iter()
        .map(|i| i.value.clone())
        .collect::<Vec<_>>()
        .join(".");

    let args = match &func.args {
        sp::FunctionArguments::None => vec![],
        sp::FunctionArguments::Subquery(_) => {
            return Err(Error::unsupported("subquery arguments not supported"));
        }
        sp::FunctionArguments::List(arg_list) => {
            if arg_list.duplicate_treatment.is_some() {
                return Err(Error::unsupported(format!(
                    "DISTINCT/ALL inside {} is not supported",
                    name
                )));
            }
            arg_list
                .args
                .iter()
                .map(|arg| match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => Ok(Expr::Star),
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => convert_expr(expr),
                    _ => Err(Error::unsupported(format!(
                        "argument not supported in {}: {}",
                        name, arg
                    ))),
                })
                .collect::<Result<Vec<_>>>()?
        }
    };

    Ok(Expr::Function { name, args })
}

/// LIMIT / OFFSET must be non-negative integer literals.
fn extract_count(expr: &SpExpr, clause: &str) -> Result<u64> {
    match expr {
        SpExpr::Value(sp::Value::Number(s, _)) => s
            .parse::<u64>()
            .map_err(|_| Error::unsupported(format!("invalid {} value: {}", clause, s))),
        _ => Err(Error::unsupported(format!(
            "{} must be a literal integer",
            clause
        ))),
    }
}
